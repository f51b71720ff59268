//! # Backend and collaborator contracts
//!
//! The engine is written against these traits rather than against a particular database or vendor.
//!
//! * [`LifecycleDatabase`] stores orders, line items, amendments, payments and reminder claims, and composes them into
//!   atomic units of work.
//! * [`InventoryManagement`] is the inventory ledger, with atomic reserve, release and adjust operations.
//! * [`DiscountCodeStore`] holds referral and rebate codes.
//! * [`IntegrityChecks`] provides the read-only queries behind the integrity report.
//!
//! The external collaborators are [`PaymentProvider`], [`NotificationSender`] and [`PricingConfigSource`].
mod data_objects;
mod discount_codes;
mod integrity_checks;
mod inventory_management;
mod lifecycle_database;
mod notifications;
mod payment_provider;
mod pricing_config;

pub use data_objects::{IntegrityIssue, IntegrityIssueKind, PaymentSettlement, PaymentUpdate};
pub use discount_codes::DiscountCodeStore;
pub use integrity_checks::IntegrityChecks;
pub use inventory_management::InventoryManagement;
pub use lifecycle_database::{LifecycleDatabase, LifecycleError};
pub use notifications::{Notification, NotificationError, NotificationSender, NotificationTemplate};
pub use payment_provider::{
    ChargeRequest,
    ChargeResult,
    PaymentProvider,
    ProviderError,
    RefundRequest,
    RefundResult,
    RefundStatus,
};
pub use pricing_config::PricingConfigSource;
