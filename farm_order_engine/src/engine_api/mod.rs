//! # Engine API
//!
//! The public face of the order engine. Each API wraps a storage backend (and whichever external collaborators it
//! needs) and composes the pure building blocks in [`crate::pricing`], [`crate::amendment_plan`] and
//! [`crate::state_machine`] into complete lifecycle operations.
//!
//! * [`OrderFlowApi`] handles checkout, payments, refunds and the admin status transitions.
//! * [`AmendmentApi`] applies customer edits to existing orders.
//! * [`ForfeitureApi`] runs the daily reminder and forfeiture sweep.
//! * [`InventoryApi`] manages inventory units and discount codes.
//! * [`IntegrityApi`] reports on the health of the stored data.
mod amendment_api;
mod forfeiture_api;
mod integrity_api;
mod inventory_api;
mod order_flow_api;

pub mod order_objects;
pub mod policy;

pub use amendment_api::AmendmentApi;
pub use forfeiture_api::ForfeitureApi;
pub use integrity_api::IntegrityApi;
pub use inventory_api::InventoryApi;
pub use order_flow_api::OrderFlowApi;

use crate::{
    db_types::{Order, OrderStatusType},
    events::{EventProducers, OrderAnnulledEvent, OrderPaidEvent},
};

/// Emits the hooks implied by a status change from `old` to `new`.
pub(crate) async fn publish_status_events(producers: &EventProducers, old: &Order, new: &Order) {
    if old.status == new.status {
        return;
    }
    match new.status {
        OrderStatusType::FullyPaid => producers.publish_order_paid(OrderPaidEvent::new(new.clone())).await,
        OrderStatusType::Cancelled | OrderStatusType::Forfeited => {
            producers.publish_order_annulled(OrderAnnulledEvent::new(new.clone())).await
        },
        _ => {},
    }
}
