//! Concrete collaborators for the engine.
//!
//! Payment provider protocols, email delivery and the storefront's pricing admin all live outside this service. These
//! implementations are the thin seams where they plug in.
pub mod audit_hooks;
pub mod file_pricing;
pub mod log_notifier;
pub mod deferred_payments;

pub use audit_hooks::create_audit_event_handlers;
pub use deferred_payments::DeferredPaymentProvider;
pub use file_pricing::FilePricingConfig;
pub use log_notifier::LogNotifier;
