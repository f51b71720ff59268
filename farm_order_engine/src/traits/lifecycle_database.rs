use chrono::NaiveDate;
use farm_common::MinorUnits;
use thiserror::Error;

use crate::{
    amendment_plan::AmendmentPlan,
    db_types::{
        Amendment,
        NewOrder,
        NewPayment,
        Order,
        OrderItem,
        OrderNumber,
        OrderStatusType,
        Payment,
        ReminderMilestone,
    },
    pricing::PricingError,
    traits::data_objects::{PaymentSettlement, PaymentUpdate},
};

/// The storage contract for the order aggregate and the payment ledger.
///
/// Every method that changes more than one row does so inside a single database transaction. Implementations must
/// route all inventory changes through the same atomic reserve/release/adjust statements that
/// [`crate::traits::InventoryManagement`] exposes.
#[allow(async_fn_in_trait)]
pub trait LifecycleDatabase: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Reserves inventory for every line item and inserts the order, its line items and the discount usage in one
    /// transaction. If any reservation fails, nothing is written.
    ///
    /// Returns [`LifecycleError::OrderNumberCollision`] if the order number is already taken, in which case the caller
    /// should generate a new number and try again.
    async fn insert_order_with_reservations(&self, order: NewOrder) -> Result<Order, LifecycleError>;

    async fn fetch_order(&self, order_number: &OrderNumber) -> Result<Option<Order>, LifecycleError>;

    async fn fetch_order_by_id(&self, id: i64) -> Result<Option<Order>, LifecycleError>;

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, LifecycleError>;

    async fn fetch_amendments(&self, order_id: i64) -> Result<Vec<Amendment>, LifecycleError>;

    async fn fetch_payments(&self, order_id: i64) -> Result<Vec<Payment>, LifecycleError>;

    /// Appends a new `pending` payment to the ledger.
    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, LifecycleError>;

    async fn fetch_payment_by_ref(&self, payment_ref: &str) -> Result<Option<Payment>, LifecycleError>;

    /// Applies a payment outcome to the ledger, and in the same transaction
    /// * releases the reservation and cancels the order if a deposit failed before any deposit completed,
    /// * recomputes the order status.
    ///
    /// Completed payments are never modified, so applying the same update twice is a no-op.
    async fn settle_payment(&self, update: PaymentUpdate) -> Result<PaymentSettlement, LifecycleError>;

    /// Replaces the order's amendments with the planned set. The order version is claimed as the first write, so a
    /// stale `expected_version` fails with [`LifecycleError::ConcurrentModification`] and nothing is changed.
    ///
    /// `remainder_due_date` only applies to an order that had no remainder due date and owes one after the change.
    async fn apply_amendment_plan(
        &self,
        order_id: i64,
        expected_version: i64,
        plan: AmendmentPlan,
        remainder_due_date: NaiveDate,
    ) -> Result<Order, LifecycleError>;

    /// Switches the order to `delivery_method`, replacing the delivery fee in its totals with `delivery_fee` and
    /// re-running the status derivation. Versioning and the remainder due date work as in
    /// [`apply_amendment_plan`](Self::apply_amendment_plan).
    async fn apply_delivery_change(
        &self,
        order_id: i64,
        expected_version: i64,
        delivery_method: &str,
        delivery_fee: MinorUnits,
        remainder_due_date: NaiveDate,
    ) -> Result<Order, LifecycleError>;

    /// Sets or clears the fulfillment freeze.
    async fn set_locked(&self, order_id: i64, expected_version: i64, locked: bool) -> Result<Order, LifecycleError>;

    /// Moves the order to a sticky status. If `release_inventory` is set, every reservation held by the order's line
    /// items and amendments is released in the same transaction.
    async fn set_manual_status(
        &self,
        order_id: i64,
        expected_version: i64,
        status: OrderStatusType,
        reason: &str,
        release_inventory: bool,
    ) -> Result<Order, LifecycleError>;

    /// Orders in `deposit_paid` whose remainder due date is strictly before `today`, and which are not locked.
    async fn fetch_overdue_orders(&self, today: NaiveDate) -> Result<Vec<Order>, LifecycleError>;

    /// Forfeits the order if, and only if, it is still unlocked, still `deposit_paid`, and its remainder is overdue
    /// relative to `today`. Releases all of its inventory in the same transaction.
    ///
    /// Returns `None` if the order no longer qualifies (e.g. another sweep got there first).
    async fn forfeit_order(&self, order_id: i64, today: NaiveDate, reason: &str)
        -> Result<Option<Order>, LifecycleError>;

    /// Orders in `deposit_paid` whose remainder due date falls in `[today, today + horizon_days]`.
    async fn fetch_reminder_candidates(&self, today: NaiveDate, horizon_days: i64)
        -> Result<Vec<Order>, LifecycleError>;

    /// Fully paid (or ready) orders whose fulfillment date falls in `[today, today + 1]`.
    async fn fetch_pre_fulfillment_candidates(&self, today: NaiveDate) -> Result<Vec<Order>, LifecycleError>;

    /// Atomically claims a reminder milestone for an order. Returns `false` if it had already been claimed.
    async fn claim_reminder(&self, order_id: i64, milestone: ReminderMilestone) -> Result<bool, LifecycleError>;

    /// Gives back a claim after the notification could not be sent, so that the next sweep retries it.
    async fn unclaim_reminder(&self, order_id: i64, milestone: ReminderMilestone) -> Result<(), LifecycleError>;

    async fn fetch_sent_reminders(&self, order_id: i64) -> Result<Vec<ReminderMilestone>, LifecycleError>;
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Not enough inventory remaining in {unit}: {requested} requested, but only {remaining} left")]
    InsufficientInventory { unit: String, requested: i64, remaining: i64 },
    #[error("Invalid state transition. {0}")]
    InvalidStateTransition(String),
    #[error("Order {0} is locked for fulfillment and cannot be modified")]
    OrderLocked(OrderNumber),
    #[error("Data integrity violation. {0}")]
    DataIntegrityViolation(String),
    #[error("The payment provider did not answer in time. The payment {0} is pending until the provider confirms it.")]
    ProviderTimeout(String),
    #[error("The payment provider could not process the request. {0}")]
    ProviderError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(String),
    #[error("The requested inventory unit {0} does not exist")]
    InventoryUnitNotFound(String),
    #[error("The requested payment {0} does not exist")]
    PaymentNotFound(String),
    #[error("Cannot insert payment, since it already exists with reference {0}")]
    PaymentAlreadyExists(String),
    #[error("Order number {0} is already taken")]
    OrderNumberCollision(OrderNumber),
    #[error("Order {0} was modified by another request. Reload the order and try again.")]
    ConcurrentModification(OrderNumber),
    #[error("Quantities cannot be reduced on this order any more. {0}")]
    DecreaseNotAllowed(String),
    #[error("All items in an order must be delivered in the same week. {0}")]
    MixedDeliveryWeeks(String),
    #[error("The discount code {0} is not valid")]
    InvalidDiscountCode(String),
    #[error("An order must contain at least one item")]
    EmptyOrder,
    #[error("Notification could not be delivered. {0}")]
    NotificationFailed(String),
    #[error("Invalid request. {0}")]
    InvalidRequest(String),
    #[error("{0}")]
    Pricing(#[from] PricingError),
    #[error("We have an internal database engine (configuration/uptime etc.) error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for LifecycleError {
    fn from(e: sqlx::Error) -> Self {
        LifecycleError::DatabaseError(e.to_string())
    }
}
