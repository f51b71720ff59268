use chrono::{DateTime, NaiveDate, Utc};
use farm_common::MinorUnits;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Amendment, Order, OrderItem, OrderNumber, Payment, ProductLine, ReminderMilestone},
    traits::IntegrityIssue,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutItem {
    pub product_code: String,
    #[serde(default)]
    pub inventory_unit_id: Option<i64>,
    pub quantity: i64,
}

impl CheckoutItem {
    pub fn new<S: Into<String>>(product_code: S, inventory_unit_id: Option<i64>, quantity: i64) -> Self {
        Self { product_code: product_code.into(), inventory_unit_id, quantity }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// How the customer is reached for notifications, e.g. an email address
    pub customer_ref: String,
    pub product_line: ProductLine,
    pub items: Vec<CheckoutItem>,
    #[serde(default)]
    pub extras: Vec<CheckoutItem>,
    pub delivery_method: String,
    #[serde(default)]
    pub fresh: bool,
    pub fulfillment_date: NaiveDate,
    #[serde(default)]
    pub discount_code: Option<String>,
}

impl CheckoutRequest {
    pub fn new<S: Into<String>>(customer_ref: S, product_line: ProductLine, fulfillment_date: NaiveDate) -> Self {
        Self {
            customer_ref: customer_ref.into(),
            product_line,
            items: vec![],
            extras: vec![],
            delivery_method: "pickup".to_string(),
            fresh: false,
            fulfillment_date,
            discount_code: None,
        }
    }

    pub fn with_item(mut self, item: CheckoutItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn with_extra(mut self, item: CheckoutItem) -> Self {
        self.extras.push(item);
        self
    }

    pub fn with_delivery_method<S: Into<String>>(mut self, method: S) -> Self {
        self.delivery_method = method.into();
        self
    }

    pub fn with_discount_code<S: Into<String>>(mut self, code: S) -> Self {
        self.discount_code = Some(code.into());
        self
    }
}

/// An order together with the payment that was just attempted for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaymentResult {
    pub order: Order,
    pub payment: Payment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetails {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub amendments: Vec<Amendment>,
    pub payments: Vec<Payment>,
    /// Remainder not yet covered by completed remainder payments
    pub outstanding_remainder: MinorUnits,
    pub sent_reminders: Vec<ReminderMilestone>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepStage {
    Forfeiture,
    Reminder,
    PreFulfillment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepFailure {
    /// `None` if the failure happened before any particular order was selected
    pub order_number: Option<OrderNumber>,
    pub stage: SweepStage,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderSent {
    pub order_number: OrderNumber,
    pub milestone: ReminderMilestone,
}

/// What a single scheduler sweep did. Failures are per order and never stop the rest of the sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub reminders: Vec<ReminderSent>,
    pub forfeited: Vec<OrderNumber>,
    pub pre_fulfillment: Vec<OrderNumber>,
    pub failures: Vec<SweepFailure>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.reminders.is_empty() && self.forfeited.is_empty() && self.pre_fulfillment.is_empty() && self.failures.is_empty()
    }

    pub(crate) fn fail<E: ToString>(&mut self, order_number: Option<&OrderNumber>, stage: SweepStage, error: E) {
        self.failures.push(SweepFailure { order_number: order_number.cloned(), stage, error: error.to_string() });
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub checked_at: DateTime<Utc>,
    pub issues: Vec<IntegrityIssue>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundOrderPayment {
    pub payment_ref: String,
    pub amount: MinorUnits,
    pub reason: String,
}
