use farm_order_engine::events::{EventHandlers, EventHooks, OrderAnnulledEvent, OrderModifiedEvent};
use log::*;

pub const AUDIT_EVENT_BUFFER_SIZE: usize = 25;

/// Logs every lifecycle event, so that the shop has a trail of what happened to each order and when.
pub fn create_audit_event_handlers() -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_order_created(|ev| {
        let order = ev.order;
        Box::pin(async move {
            info!(
                "📬️ Order {} created for {}. Total {}, deposit {}",
                order.order_number, order.customer_ref, order.total_amount, order.deposit_amount
            );
        })
    });
    hooks.on_order_paid(|ev| {
        let order = ev.order;
        Box::pin(async move {
            info!("📬️ Order {} is fully paid ({})", order.order_number, order.total_amount);
        })
    });
    hooks.on_order_modified(|ev| {
        let OrderModifiedEvent { old_order, new_order } = ev;
        Box::pin(async move {
            info!(
                "📬️ Order {} amended. Total {} -> {}, remainder {} -> {}",
                new_order.order_number,
                old_order.total_amount,
                new_order.total_amount,
                old_order.remainder_amount,
                new_order.remainder_amount
            );
        })
    });
    hooks.on_order_annulled(|ev| {
        let OrderAnnulledEvent { order, status } = ev;
        Box::pin(async move {
            let reason = order.status_reason.unwrap_or_else(|| "no reason given".to_string());
            info!("📬️ Order {} is {status}. Reason: {reason}", order.order_number);
        })
    });
    EventHandlers::new(AUDIT_EVENT_BUFFER_SIZE, hooks)
}
