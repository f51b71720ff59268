//! Farm Order Engine
//!
//! The reservation and payment lifecycle engine behind a direct-from-farm shop selling pig boxes, hatching eggs and
//! live chickens. Customers reserve a share of a finite resource, pay a deposit up front and the remainder before
//! fulfillment, and may amend their order in between. Unpaid remainders are forfeited on a schedule and their
//! inventory goes back on sale.
//!
//! The library is divided into these main sections:
//! 1. Pure business rules: the Pricing Resolver ([`mod@pricing`]), status derivation from the payment ledger
//!    ([`mod@state_machine`]) and amendment planning ([`mod@amendment_plan`]).
//! 2. Storage contracts ([`mod@traits`]) and their SQLite implementation ([`SqliteDatabase`]). You should never need to
//!    access the database directly. Instead, use the public API. The exception is the data types used in the database,
//!    which are defined in the `db_types` module and are public.
//! 3. The public API ([`OrderFlowApi`], [`AmendmentApi`], [`ForfeitureApi`], [`InventoryApi`], [`IntegrityApi`]).
//!
//! The engine also emits events when orders are created, paid in full, amended, and cancelled or forfeited. See
//! [`mod@events`] for how to hook into them.
pub mod amendment_plan;
pub mod db_types;
mod engine_api;
pub mod events;
pub mod helpers;
pub mod pricing;
pub mod state_machine;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use engine_api::{
    order_objects,
    policy::{DecreasePolicy, LifecyclePolicy},
    AmendmentApi,
    ForfeitureApi,
    IntegrityApi,
    InventoryApi,
    OrderFlowApi,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{LifecycleError, PricingConfigSource};
