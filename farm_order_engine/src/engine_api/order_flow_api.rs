use std::fmt::Debug;

use chrono::NaiveDate;
use farm_common::MinorUnits;
use log::*;

use crate::{
    db_types::{
        Discount,
        LineItemKind,
        NewOrder,
        NewOrderItem,
        NewPayment,
        Order,
        OrderNumber,
        OrderStatusType,
        PaymentStatus,
        PaymentType,
    },
    engine_api::{
        order_objects::{CheckoutItem, CheckoutRequest, OrderDetails, OrderPaymentResult, RefundOrderPayment},
        policy::LifecyclePolicy,
        publish_status_events,
    },
    events::{EventProducers, OrderCreatedEvent},
    helpers::new_order_number,
    pricing::{resolve_price, LinePrice, LineSelection, PricingRequest},
    state_machine::{check_action, LedgerSummary, OrderAction},
    traits::{
        ChargeRequest,
        DiscountCodeStore,
        InventoryManagement,
        LifecycleDatabase,
        LifecycleError,
        PaymentProvider,
        PaymentSettlement,
        PaymentUpdate,
        PricingConfigSource,
        ProviderError,
        RefundRequest,
        RefundResult,
    },
};

const MAX_ORDER_NUMBER_ATTEMPTS: usize = 5;

/// `OrderFlowApi` is the primary API for the order lifecycle: checkout, deposit and remainder charges, payment
/// webhooks, refunds, and the admin status transitions.
pub struct OrderFlowApi<B, P, C> {
    db: B,
    provider: P,
    pricing: C,
    policy: LifecyclePolicy,
    producers: EventProducers,
}

impl<B, P, C> Debug for OrderFlowApi<B, P, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B, P, C> OrderFlowApi<B, P, C> {
    pub fn new(db: B, provider: P, pricing: C, policy: LifecyclePolicy, producers: EventProducers) -> Self {
        Self { db, provider, pricing, policy, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn policy(&self) -> &LifecyclePolicy {
        &self.policy
    }
}

impl<B, P, C> OrderFlowApi<B, P, C>
where
    B: LifecycleDatabase + InventoryManagement + DiscountCodeStore,
    P: PaymentProvider,
    C: PricingConfigSource,
{
    /// Places a new order and charges its deposit.
    ///
    /// 1. The request is validated: it must have at least one item, every referenced inventory unit must exist, and
    ///    all units must share one delivery week.
    /// 2. The discount code, if any, is resolved and the order is priced against the pricing configuration as it is
    ///    right now.
    /// 3. Inventory is reserved and the order saved in one transaction. If any unit has insufficient inventory the
    ///    whole checkout fails and nothing is reserved.
    /// 4. The deposit is charged. A timeout or an unavailable provider leaves the payment `pending` and the order in
    ///    `draft`, holding its reservation, until the provider's webhook arrives. A declined deposit cancels the order
    ///    and releases its inventory.
    pub async fn checkout(&self, request: CheckoutRequest, today: NaiveDate) -> Result<OrderPaymentResult, LifecycleError> {
        if request.items.is_empty() {
            return Err(LifecycleError::EmptyOrder);
        }
        if request.customer_ref.trim().is_empty() {
            return Err(LifecycleError::InvalidRequest("A customer reference is required".into()));
        }
        let days_to_fulfillment = (request.fulfillment_date - today).num_days();
        if days_to_fulfillment < 0 {
            return Err(LifecycleError::InvalidRequest(format!(
                "Fulfillment date {} is in the past",
                request.fulfillment_date
            )));
        }
        let delivery_week = self.common_delivery_week(request.items.iter().chain(request.extras.iter())).await?;
        let discount = self.resolve_discount(request.discount_code.as_deref()).await?;
        let config = self.pricing.pricing_config().await?;
        let pricing_request = PricingRequest {
            product_line: request.product_line,
            base_items: request.items.iter().map(selection).collect(),
            extras: request.extras.iter().map(selection).collect(),
            delivery_method: request.delivery_method.clone(),
            fresh: request.fresh,
            discount: discount.clone(),
            days_to_fulfillment,
        };
        let price = resolve_price(&config, &pricing_request, self.policy.full_payment_cutoff_days)?;
        trace!("🔄️ Priced checkout for {}: {price:?}", request.customer_ref);
        let mut items = line_items(LineItemKind::Base, &request.items, &price.base_lines);
        items.extend(line_items(LineItemKind::Extra, &request.extras, &price.extra_lines));
        let remainder_due_date = if price.full_payment_required {
            None
        } else {
            Some(self.policy.remainder_due_date(request.fulfillment_date, today))
        };
        let discount = match discount {
            Discount::Referral { code, .. } => Discount::Referral { code, amount: price.discount_amount },
            Discount::Rebate { code, .. } => Discount::Rebate { code, amount: price.discount_amount },
            Discount::None => Discount::None,
        };
        let mut new_order = NewOrder {
            order_number: new_order_number(),
            customer_ref: request.customer_ref.clone(),
            product_line: request.product_line,
            delivery_method: request.delivery_method.clone(),
            fresh: request.fresh,
            delivery_week,
            fulfillment_date: request.fulfillment_date,
            subtotal: price.subtotal,
            delivery_fee: price.delivery_fee,
            extras_total: price.extras_total,
            discount,
            deposit_amount: price.deposit_amount,
            remainder_amount: price.remainder_amount,
            total_amount: price.total_amount,
            remainder_due_date,
            items,
        };
        let mut attempts = 0;
        let order = loop {
            attempts += 1;
            match self.db.insert_order_with_reservations(new_order.clone()).await {
                Err(LifecycleError::OrderNumberCollision(n)) if attempts < MAX_ORDER_NUMBER_ATTEMPTS => {
                    debug!("🔄️ Order number {n} is taken. Trying another one.");
                    new_order.order_number = new_order_number();
                },
                result => break result?,
            }
        };
        info!(
            "🔄️ Order {} created for {}. Deposit {}, remainder {}, total {}",
            order.order_number, order.customer_ref, order.deposit_amount, order.remainder_amount, order.total_amount
        );
        self.producers.publish_order_created(OrderCreatedEvent::new(order.clone())).await;
        let amount = order.deposit_amount;
        self.charge(order, PaymentType::Deposit, amount).await
    }

    /// Charges whatever part of the remainder has not been collected yet.
    pub async fn pay_remainder(&self, order_number: &OrderNumber) -> Result<OrderPaymentResult, LifecycleError> {
        let order = self.fetch_existing_order(order_number).await?;
        check_action(&order, OrderAction::PayRemainder)?;
        let payments = self.db.fetch_payments(order.id).await?;
        if payments.iter().any(|p| p.payment_type == PaymentType::Remainder && p.status == PaymentStatus::Pending) {
            return Err(LifecycleError::InvalidStateTransition(format!(
                "A remainder payment for order {order_number} is already pending"
            )));
        }
        let outstanding = LedgerSummary::from_payments(&payments).outstanding_remainder(order.remainder_amount);
        if !outstanding.is_positive() {
            return Err(LifecycleError::InvalidStateTransition(format!(
                "Order {order_number} has no outstanding remainder"
            )));
        }
        self.charge(order, PaymentType::Remainder, outstanding).await
    }

    /// Applies a payment outcome reported by the provider's webhook.
    ///
    /// Webhooks may be delivered more than once; replays are recognised by the provider reference and change nothing.
    /// If the update completes a second deposit on one order, the payment is still recorded (the money has moved) but
    /// a [`LifecycleError::DataIntegrityViolation`] is returned for manual follow-up.
    pub async fn apply_payment_update(&self, update: PaymentUpdate) -> Result<PaymentSettlement, LifecycleError> {
        trace!("🔄️💰️ Applying payment update for {}: {}", update.reference(), update.status);
        let settlement = self.db.settle_payment(update).await?;
        self.after_settlement(&settlement).await;
        if settlement.duplicate_deposit {
            return Err(LifecycleError::DataIntegrityViolation(format!(
                "Order {} has more than one completed deposit (latest: {})",
                settlement.order.order_number, settlement.payment.payment_ref
            )));
        }
        Ok(settlement)
    }

    /// Refunds (part of) a completed payment through the provider. Refunds never touch inventory or amendments.
    pub async fn refund_payment(&self, refund: RefundOrderPayment) -> Result<RefundResult, LifecycleError> {
        let payment = self
            .db
            .fetch_payment_by_ref(&refund.payment_ref)
            .await?
            .ok_or_else(|| LifecycleError::PaymentNotFound(refund.payment_ref.clone()))?;
        if payment.status != PaymentStatus::Completed {
            return Err(LifecycleError::InvalidStateTransition(format!(
                "Payment {} is {} and cannot be refunded",
                payment.payment_ref, payment.status
            )));
        }
        if !refund.amount.is_positive() || refund.amount > payment.amount {
            return Err(LifecycleError::InvalidRequest(format!(
                "Refund amount must be between 0 and {}, but was {}",
                payment.amount, refund.amount
            )));
        }
        let provider_ref = payment.provider_ref.clone().ok_or_else(|| {
            LifecycleError::InvalidRequest(format!("Payment {} has no provider reference", payment.payment_ref))
        })?;
        let request = RefundRequest { provider_ref, amount: refund.amount, reason: refund.reason.clone() };
        match tokio::time::timeout(self.policy.provider_timeout, self.provider.refund(request)).await {
            Ok(Ok(result)) => {
                info!(
                    "🔄️💸️ Refund of {} on payment {} ({}) is {:?}",
                    refund.amount, payment.payment_ref, refund.reason, result.status
                );
                Ok(result)
            },
            Ok(Err(e)) => {
                warn!("🔄️💸️ Refund of {} on payment {} failed. {e}", refund.amount, payment.payment_ref);
                Err(LifecycleError::ProviderError(e.to_string()))
            },
            Err(_) => {
                warn!("🔄️💸️ Refund of {} on payment {} timed out", refund.amount, payment.payment_ref);
                Err(LifecycleError::ProviderTimeout(payment.payment_ref))
            },
        }
    }

    pub async fn fetch_order_details(&self, order_number: &OrderNumber) -> Result<OrderDetails, LifecycleError> {
        let order = self.fetch_existing_order(order_number).await?;
        let items = self.db.fetch_order_items(order.id).await?;
        let amendments = self.db.fetch_amendments(order.id).await?;
        let payments = self.db.fetch_payments(order.id).await?;
        let sent_reminders = self.db.fetch_sent_reminders(order.id).await?;
        let outstanding_remainder = LedgerSummary::from_payments(&payments).outstanding_remainder(order.remainder_amount);
        Ok(OrderDetails { order, items, amendments, payments, outstanding_remainder, sent_reminders })
    }

    /// Freezes the order for fulfillment. Locked orders cannot be amended, cancelled or forfeited.
    pub async fn lock_order(&self, order_number: &OrderNumber) -> Result<Order, LifecycleError> {
        let order = self.fetch_existing_order(order_number).await?;
        check_action(&order, OrderAction::Lock)?;
        if order.is_locked() {
            return Ok(order);
        }
        let order = self.db.set_locked(order.id, order.version, true).await?;
        info!("🔄️🔒️ Order {order_number} is locked for fulfillment");
        Ok(order)
    }

    pub async fn unlock_order(&self, order_number: &OrderNumber) -> Result<Order, LifecycleError> {
        let order = self.fetch_existing_order(order_number).await?;
        check_action(&order, OrderAction::Unlock)?;
        if !order.is_locked() {
            return Ok(order);
        }
        let order = self.db.set_locked(order.id, order.version, false).await?;
        info!("🔄️🔓️ Order {order_number} is unlocked");
        Ok(order)
    }

    pub async fn mark_ready_for_pickup(&self, order_number: &OrderNumber) -> Result<Order, LifecycleError> {
        self.manual_transition(order_number, OrderAction::MarkReady, OrderStatusType::ReadyForPickup, "ready for pickup")
            .await
    }

    pub async fn mark_completed(&self, order_number: &OrderNumber) -> Result<Order, LifecycleError> {
        self.manual_transition(order_number, OrderAction::MarkCompleted, OrderStatusType::Completed, "picked up")
            .await
    }

    /// Cancels the order and releases all of its inventory. Money already collected is not refunded automatically;
    /// use [`Self::refund_payment`] for that.
    pub async fn cancel_order(&self, order_number: &OrderNumber, reason: &str) -> Result<Order, LifecycleError> {
        self.manual_transition(order_number, OrderAction::Cancel, OrderStatusType::Cancelled, reason).await
    }

    async fn manual_transition(
        &self,
        order_number: &OrderNumber,
        action: OrderAction,
        status: OrderStatusType,
        reason: &str,
    ) -> Result<Order, LifecycleError> {
        let old = self.fetch_existing_order(order_number).await?;
        check_action(&old, action)?;
        let release = !status.holds_inventory();
        let order = self.db.set_manual_status(old.id, old.version, status, reason, release).await?;
        info!("🔄️ Order {order_number} moved from {} to {} ({reason})", old.status, order.status);
        publish_status_events(&self.producers, &old, &order).await;
        Ok(order)
    }

    async fn fetch_existing_order(&self, order_number: &OrderNumber) -> Result<Order, LifecycleError> {
        self.db.fetch_order(order_number).await?.ok_or_else(|| LifecycleError::OrderNotFound(order_number.to_string()))
    }

    async fn common_delivery_week<'a, I>(&self, items: I) -> Result<Option<String>, LifecycleError>
    where I: Iterator<Item = &'a CheckoutItem> {
        let mut week: Option<String> = None;
        for item in items {
            let Some(unit_id) = item.inventory_unit_id else { continue };
            let unit = self
                .db
                .fetch_unit(unit_id)
                .await?
                .ok_or_else(|| LifecycleError::InventoryUnitNotFound(unit_id.to_string()))?;
            match (&week, unit.delivery_week) {
                (Some(w), Some(u)) if *w != u => {
                    return Err(LifecycleError::MixedDeliveryWeeks(format!("{} is delivered in {u}, not {w}", unit.code)));
                },
                (None, Some(u)) => week = Some(u),
                _ => {},
            }
        }
        Ok(week)
    }

    async fn resolve_discount(&self, code: Option<&str>) -> Result<Discount, LifecycleError> {
        let Some(code) = code.map(str::trim).filter(|c| !c.is_empty()) else {
            return Ok(Discount::None);
        };
        let found = self.db.lookup_code(code).await?.ok_or_else(|| LifecycleError::InvalidDiscountCode(code.into()))?;
        Ok(found.to_discount())
    }

    /// Records a pending payment, then asks the provider to charge it, and applies whatever definitive answer comes
    /// back.
    async fn charge(
        &self,
        order: Order,
        payment_type: PaymentType,
        amount: MinorUnits,
    ) -> Result<OrderPaymentResult, LifecycleError> {
        let payment_ref = format!("{}-{payment_type}-{:08x}", order.order_number, rand::random::<u32>());
        let payment = self.db.insert_payment(NewPayment::new(order.id, payment_ref.clone(), payment_type, amount)).await?;
        if amount.is_zero() {
            debug!("🔄️💰️ Nothing to charge for the {payment_type} of order {}", order.order_number);
            let update = PaymentUpdate::for_payment_ref(&payment_ref, PaymentStatus::Completed);
            let settlement = self.apply_payment_update(update).await?;
            return Ok(OrderPaymentResult { order: settlement.order, payment: settlement.payment });
        }
        let request = ChargeRequest {
            order_number: order.order_number.clone(),
            payment_ref: payment_ref.clone(),
            amount,
            payment_type,
        };
        let update = match tokio::time::timeout(self.policy.provider_timeout, self.provider.charge(request)).await {
            Err(_) => {
                warn!(
                    "🔄️💰️ The {payment_type} charge {payment_ref} for order {} timed out. It stays pending until the \
                     provider reports back.",
                    order.order_number
                );
                return Ok(OrderPaymentResult { order, payment });
            },
            Ok(Err(ProviderError::Unavailable(e))) => {
                warn!("🔄️💰️ The outcome of {payment_type} charge {payment_ref} is unknown. {e}");
                return Ok(OrderPaymentResult { order, payment });
            },
            Ok(Err(ProviderError::Rejected(reason))) => {
                info!("🔄️💰️ The {payment_type} charge {payment_ref} was rejected. {reason}");
                PaymentUpdate::for_payment_ref(&payment_ref, PaymentStatus::Failed)
            },
            Ok(Ok(result)) => {
                let update = PaymentUpdate::for_payment_ref(&payment_ref, result.status);
                match result.provider_ref {
                    Some(provider_ref) => update.with_provider_ref(provider_ref),
                    None => update,
                }
            },
        };
        let status = update.status;
        let settlement = self.apply_payment_update(update).await?;
        if status == PaymentStatus::Failed {
            return Err(LifecycleError::ProviderError(format!(
                "The {payment_type} payment for order {} was declined",
                settlement.order.order_number
            )));
        }
        Ok(OrderPaymentResult { order: settlement.order, payment: settlement.payment })
    }

    async fn after_settlement(&self, settlement: &PaymentSettlement) {
        if settlement.changed {
            publish_status_events(&self.producers, &settlement.old_order, &settlement.order).await;
        }
    }
}

fn selection(item: &CheckoutItem) -> LineSelection {
    LineSelection::new(item.product_code.clone(), item.quantity)
}

fn line_items(kind: LineItemKind, requested: &[CheckoutItem], priced: &[LinePrice]) -> Vec<NewOrderItem> {
    requested
        .iter()
        .zip(priced)
        .map(|(item, price)| NewOrderItem {
            kind,
            product_code: item.product_code.clone(),
            inventory_unit_id: item.inventory_unit_id,
            quantity: item.quantity,
            unit_price: price.unit_price,
            subtotal: price.subtotal,
        })
        .collect()
}
