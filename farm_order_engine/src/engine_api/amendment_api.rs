use std::fmt::Debug;

use chrono::{NaiveDate, Utc};
use log::*;

use crate::{
    amendment_plan::{plan_amendments, LatePricing, RequestedAmendment},
    db_types::{Order, OrderNumber},
    engine_api::{policy::LifecyclePolicy, publish_status_events},
    events::{EventProducers, OrderModifiedEvent},
    state_machine::{check_action, OrderAction},
    traits::{InventoryManagement, LifecycleDatabase, LifecycleError, PricingConfigSource},
};

/// Customer edits to an existing order.
///
/// An edit always carries the complete desired set of amendments. Quantity that was already committed keeps the price
/// it was added at; only the increase is priced at today's price (with the late-addition multiplier inside the late
/// window). Inventory is adjusted by the net change per unit in the same transaction that swaps the rows.
pub struct AmendmentApi<B, C> {
    db: B,
    pricing: C,
    policy: LifecyclePolicy,
    producers: EventProducers,
}

impl<B, C> Debug for AmendmentApi<B, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AmendmentApi")
    }
}

impl<B, C> AmendmentApi<B, C> {
    pub fn new(db: B, pricing: C, policy: LifecyclePolicy, producers: EventProducers) -> Self {
        Self { db, pricing, policy, producers }
    }
}

impl<B, C> AmendmentApi<B, C>
where
    B: LifecycleDatabase + InventoryManagement,
    C: PricingConfigSource,
{
    /// Replaces the order's amendments with `requested`.
    ///
    /// If `expected_version` is given and the order has moved on since, the edit is refused with
    /// [`LifecycleError::ConcurrentModification`]. Without it, the version read here is used, which still protects
    /// against an edit racing between this read and the write.
    pub async fn amend(
        &self,
        order_number: &OrderNumber,
        expected_version: Option<i64>,
        requested: Vec<RequestedAmendment>,
        today: NaiveDate,
    ) -> Result<Order, LifecycleError> {
        let order = self
            .db
            .fetch_order(order_number)
            .await?
            .ok_or_else(|| LifecycleError::OrderNotFound(order_number.to_string()))?;
        check_action(&order, OrderAction::Amend)?;
        if let Some(expected) = expected_version {
            if expected != order.version {
                debug!("✏️ Order {order_number} is at version {}, but the edit expected {expected}", order.version);
                return Err(LifecycleError::ConcurrentModification(order_number.clone()));
            }
        }
        self.check_units(&order, &requested).await?;
        let existing = self.db.fetch_amendments(order.id).await?;
        let config = self.pricing.pricing_config().await?;
        let days_to_fulfillment = (order.fulfillment_date - today).num_days();
        let late = LatePricing {
            in_late_window: self.policy.is_late_addition(days_to_fulfillment),
            multiplier_pct: self.policy.late_addition_multiplier_pct,
        };
        let plan = plan_amendments(&existing, &requested, &config, late, Utc::now())?;
        if plan.is_noop(&existing) {
            debug!("✏️ Amendment to order {order_number} changes nothing");
            return Ok(order);
        }
        if plan.decreased {
            let policy = self.policy.decrease_policy(order.product_line);
            if let Some(reason) = policy.refusal(order.status, days_to_fulfillment) {
                info!("✏️ Refused to reduce quantities on order {order_number} ({policy}). {reason}");
                return Err(LifecycleError::DecreaseNotAllowed(reason));
            }
        }
        trace!("✏️ Amendment plan for {order_number}: {plan:?}");
        let due_date = self.policy.remainder_due_date(order.fulfillment_date, today);
        let updated = self.db.apply_amendment_plan(order.id, order.version, plan, due_date).await?;
        info!(
            "✏️ Order {order_number} amended. Amendments total {} -> {}. Remainder {} -> {}. Status {} -> {}",
            order.amendments_total,
            updated.amendments_total,
            order.remainder_amount,
            updated.remainder_amount,
            order.status,
            updated.status
        );
        self.producers.publish_order_modified(OrderModifiedEvent::new(order.clone(), updated.clone())).await;
        publish_status_events(&self.producers, &order, &updated).await;
        Ok(updated)
    }

    /// Switches the order to another delivery method at today's fee for it. The difference lands on the remainder.
    ///
    /// Delivery fees are collected with the deposit, so a cheaper method can only be taken while the remainder still
    /// covers the saving. Beyond that the money has already been collected, and the change is refused with
    /// [`LifecycleError::DecreaseNotAllowed`].
    pub async fn change_delivery_method(
        &self,
        order_number: &OrderNumber,
        expected_version: Option<i64>,
        delivery_method: &str,
        today: NaiveDate,
    ) -> Result<Order, LifecycleError> {
        let order = self
            .db
            .fetch_order(order_number)
            .await?
            .ok_or_else(|| LifecycleError::OrderNotFound(order_number.to_string()))?;
        check_action(&order, OrderAction::Amend)?;
        if let Some(expected) = expected_version {
            if expected != order.version {
                debug!("🚚️ Order {order_number} is at version {}, but the change expected {expected}", order.version);
                return Err(LifecycleError::ConcurrentModification(order_number.clone()));
            }
        }
        if order.delivery_method == delivery_method {
            debug!("🚚️ Order {order_number} is already on {delivery_method} delivery");
            return Ok(order);
        }
        let config = self.pricing.pricing_config().await?;
        let fee = config.delivery_fee_with_handling(order.product_line, delivery_method, order.fresh)?;
        let new_total = order.total_amount - order.delivery_fee + fee;
        if new_total < order.deposit_amount {
            let reason = format!(
                "Switching to {delivery_method} saves {}, but only {} is still outstanding",
                order.delivery_fee - fee,
                order.remainder_amount
            );
            info!("🚚️ Refused to change delivery on order {order_number}. {reason}");
            return Err(LifecycleError::DecreaseNotAllowed(reason));
        }
        let due_date = self.policy.remainder_due_date(order.fulfillment_date, today);
        let updated =
            self.db.apply_delivery_change(order.id, order.version, delivery_method, fee, due_date).await?;
        info!(
            "🚚️ Order {order_number} moved from {} to {} delivery. Fee {} -> {}. Remainder {} -> {}",
            order.delivery_method,
            updated.delivery_method,
            order.delivery_fee,
            updated.delivery_fee,
            order.remainder_amount,
            updated.remainder_amount
        );
        self.producers.publish_order_modified(OrderModifiedEvent::new(order.clone(), updated.clone())).await;
        publish_status_events(&self.producers, &order, &updated).await;
        Ok(updated)
    }

    async fn check_units(&self, order: &Order, requested: &[RequestedAmendment]) -> Result<(), LifecycleError> {
        for r in requested {
            let Some(unit_id) = r.inventory_unit_id else { continue };
            let unit = self
                .db
                .fetch_unit(unit_id)
                .await?
                .ok_or_else(|| LifecycleError::InventoryUnitNotFound(unit_id.to_string()))?;
            if let (Some(ours), Some(theirs)) = (&order.delivery_week, &unit.delivery_week) {
                if ours != theirs {
                    return Err(LifecycleError::MixedDeliveryWeeks(format!(
                        "Order {} is delivered in {ours}, but {} is delivered in {theirs}",
                        order.order_number, unit.code
                    )));
                }
            }
        }
        Ok(())
    }
}
