use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use farm_common::MinorUnits;
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

use crate::helpers::order_number::is_valid_order_number;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

impl ConversionError {
    pub fn new<S: Into<String>>(msg: S) -> Self {
        Self(msg.into())
    }
}

/// Implements `Display` and `FromStr` for the unit-only enums below, using the same snake_case names that are stored in
/// the database.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($text),)+
                }
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    s => Err(ConversionError(format!("{} is not a valid {}", s, stringify!($name)))),
                }
            }
        }
    };
}

//--------------------------------------     ProductLine       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProductLine {
    PigBox,
    HatchingEggs,
    LiveChickens,
}

text_enum!(ProductLine { PigBox => "pig_box", HatchingEggs => "hatching_eggs", LiveChickens => "live_chickens" });

//--------------------------------------    InventoryKind      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InventoryKind {
    /// Seasonal limit for a pig box preset, counted in boxes
    BoxPreset,
    /// A weekly incubation batch, counted in eggs
    EggBatch,
    /// Female birds from one hatch
    HatchHens,
    /// Male birds from one hatch
    HatchRoosters,
}

text_enum!(InventoryKind {
    BoxPreset => "box_preset",
    EggBatch => "egg_batch",
    HatchHens => "hatch_hens",
    HatchRoosters => "hatch_roosters",
});

//--------------------------------------     UnitStatus        ---------------------------------------------------------
/// Display status of an inventory unit. Advisory only: the reserve/release arithmetic never reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Open,
    SoldOut,
}

text_enum!(UnitStatus { Open => "open", SoldOut => "sold_out" });

//--------------------------------------    InventoryUnit      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct InventoryUnit {
    pub id: i64,
    pub code: String,
    pub kind: InventoryKind,
    pub description: String,
    pub capacity: i64,
    pub allocated: i64,
    pub status: UnitStatus,
    /// ISO week (e.g. `2026-W14`) in which this unit is delivered. Only set for egg batches and hatches.
    pub delivery_week: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryUnit {
    pub fn remaining(&self) -> i64 {
        self.capacity - self.allocated
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInventoryUnit {
    pub code: String,
    pub kind: InventoryKind,
    #[serde(default)]
    pub description: String,
    pub capacity: i64,
    #[serde(default)]
    pub delivery_week: Option<String>,
}

impl NewInventoryUnit {
    pub fn new<S: Into<String>>(code: S, kind: InventoryKind, capacity: i64) -> Self {
        Self { code: code.into(), kind, description: String::new(), capacity, delivery_week: None }
    }

    pub fn with_delivery_week<S: Into<String>>(mut self, week: S) -> Self {
        self.delivery_week = Some(week.into());
        self
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// The order exists and holds its reservation, but no deposit has completed yet.
    Draft,
    /// The deposit has been collected. The remainder is outstanding.
    DepositPaid,
    /// Completed remainder payments cover the current remainder.
    FullyPaid,
    /// Set by an admin once the order has been prepared.
    ReadyForPickup,
    /// The customer has collected the order.
    Completed,
    /// Cancelled by an admin, or because the deposit charge failed.
    Cancelled,
    /// The remainder was not paid by its due date and the reservation was released.
    Forfeited,
}

text_enum!(OrderStatusType {
    Draft => "draft",
    DepositPaid => "deposit_paid",
    FullyPaid => "fully_paid",
    ReadyForPickup => "ready_for_pickup",
    Completed => "completed",
    Cancelled => "cancelled",
    Forfeited => "forfeited",
});

impl OrderStatusType {
    /// Sticky statuses are never overwritten by automatic recomputation.
    pub fn is_sticky(&self) -> bool {
        matches!(self, Self::ReadyForPickup | Self::Completed | Self::Cancelled | Self::Forfeited)
    }

    /// Terminal statuses accept no further transitions at all.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Forfeited)
    }

    /// Whether the order still holds its inventory reservation in this status.
    pub fn holds_inventory(&self) -> bool {
        !matches!(self, Self::Cancelled | Self::Forfeited)
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Draft");
            OrderStatusType::Draft
        })
    }
}

//--------------------------------------     OrderNumber       ---------------------------------------------------------
/// The short, human-readable order reference handed to customers, e.g. `FB-7K3Q2X`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderNumber(pub String);

impl FromStr for OrderNumber {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_uppercase();
        if is_valid_order_number(&s) {
            Ok(Self(s))
        } else {
            Err(ConversionError(format!("{s} is not a valid order number")))
        }
    }
}

impl Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl OrderNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------       Discount        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    Referral,
    Rebate,
}

text_enum!(DiscountKind { Referral => "referral", Rebate => "rebate" });

/// At most one discount applies to an order. Referral and rebate codes never stack.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Discount {
    #[default]
    None,
    Referral { code: String, amount: MinorUnits },
    Rebate { code: String, amount: MinorUnits },
}

impl Discount {
    pub fn amount(&self) -> MinorUnits {
        match self {
            Discount::None => MinorUnits::zero(),
            Discount::Referral { amount, .. } | Discount::Rebate { amount, .. } => *amount,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            Discount::None => None,
            Discount::Referral { code, .. } | Discount::Rebate { code, .. } => Some(code.as_str()),
        }
    }

    pub fn kind(&self) -> Option<DiscountKind> {
        match self {
            Discount::None => None,
            Discount::Referral { .. } => Some(DiscountKind::Referral),
            Discount::Rebate { .. } => Some(DiscountKind::Rebate),
        }
    }

    /// The same discount, capped at `max`. Used when the discount exceeds the deposit component it applies to.
    pub fn capped_at(&self, max: MinorUnits) -> MinorUnits {
        self.amount().min(max).floor_zero()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct DiscountCode {
    pub id: i64,
    pub code: String,
    pub kind: DiscountKind,
    pub discount_amount: MinorUnits,
    pub owner_ref: Option<String>,
    pub usage_count: i64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl DiscountCode {
    pub fn to_discount(&self) -> Discount {
        let code = self.code.clone();
        let amount = self.discount_amount;
        match self.kind {
            DiscountKind::Referral => Discount::Referral { code, amount },
            DiscountKind::Rebate => Discount::Rebate { code, amount },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDiscountCode {
    pub code: String,
    pub kind: DiscountKind,
    pub discount_amount: MinorUnits,
    #[serde(default)]
    pub owner_ref: Option<String>,
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_number: OrderNumber,
    pub customer_ref: String,
    pub product_line: ProductLine,
    pub delivery_method: String,
    pub fresh: bool,
    pub delivery_week: Option<String>,
    pub fulfillment_date: NaiveDate,
    /// Base product price before any discount
    pub subtotal: MinorUnits,
    pub delivery_fee: MinorUnits,
    pub extras_total: MinorUnits,
    pub discount_kind: Option<DiscountKind>,
    pub discount_code: Option<String>,
    pub discount_amount: MinorUnits,
    /// The order total at checkout, i.e. before any amendments
    pub base_total: MinorUnits,
    pub amendments_total: MinorUnits,
    pub deposit_amount: MinorUnits,
    pub remainder_amount: MinorUnits,
    pub total_amount: MinorUnits,
    /// `None` when full payment was required at checkout
    pub remainder_due_date: Option<NaiveDate>,
    pub status: OrderStatusType,
    /// Set for admin-driven and terminal statuses. Automatic recomputation never overrides it.
    pub manual_status: Option<OrderStatusType>,
    pub status_reason: Option<String>,
    pub locked_at: Option<DateTime<Utc>>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_locked(&self) -> bool {
        self.locked_at.is_some()
    }

    pub fn discount(&self) -> Discount {
        match (self.discount_kind, self.discount_code.clone()) {
            (Some(DiscountKind::Referral), Some(code)) => Discount::Referral { code, amount: self.discount_amount },
            (Some(DiscountKind::Rebate), Some(code)) => Discount::Rebate { code, amount: self.discount_amount },
            _ => Discount::None,
        }
    }

    pub fn is_balanced(&self) -> bool {
        self.total_amount == self.deposit_amount + self.remainder_amount
    }
}

//--------------------------------------      OrderItem        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LineItemKind {
    Base,
    Extra,
}

text_enum!(LineItemKind { Base => "base", Extra => "extra" });

/// A line item captured at checkout.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub kind: LineItemKind,
    pub product_code: String,
    pub inventory_unit_id: Option<i64>,
    pub quantity: i64,
    pub unit_price: MinorUnits,
    pub subtotal: MinorUnits,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub kind: LineItemKind,
    pub product_code: String,
    pub inventory_unit_id: Option<i64>,
    pub quantity: i64,
    pub unit_price: MinorUnits,
    pub subtotal: MinorUnits,
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
/// A fully priced order, ready to be persisted together with its inventory reservations.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: OrderNumber,
    pub customer_ref: String,
    pub product_line: ProductLine,
    pub delivery_method: String,
    pub fresh: bool,
    pub delivery_week: Option<String>,
    pub fulfillment_date: NaiveDate,
    pub subtotal: MinorUnits,
    pub delivery_fee: MinorUnits,
    pub extras_total: MinorUnits,
    pub discount: Discount,
    pub deposit_amount: MinorUnits,
    pub remainder_amount: MinorUnits,
    pub total_amount: MinorUnits,
    pub remainder_due_date: Option<NaiveDate>,
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    /// Quantity reserved per inventory unit by this order's line items.
    pub fn reservations(&self) -> Vec<(i64, i64)> {
        let mut result: Vec<(i64, i64)> = Vec::new();
        for item in &self.items {
            if let Some(unit) = item.inventory_unit_id {
                match result.iter_mut().find(|(id, _)| *id == unit) {
                    Some((_, qty)) => *qty += item.quantity,
                    None => result.push((unit, item.quantity)),
                }
            }
        }
        result
    }
}

//--------------------------------------       Amendment       ---------------------------------------------------------
/// A line item added after checkout. Rows are replaced wholesale on every edit.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Amendment {
    pub id: i64,
    pub order_id: i64,
    pub product_code: String,
    pub inventory_unit_id: Option<i64>,
    pub quantity: i64,
    pub unit_price: MinorUnits,
    pub subtotal: MinorUnits,
    pub late_addition: bool,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAmendment {
    pub product_code: String,
    pub inventory_unit_id: Option<i64>,
    pub quantity: i64,
    pub unit_price: MinorUnits,
    pub subtotal: MinorUnits,
    pub late_addition: bool,
    pub added_at: DateTime<Utc>,
}

//--------------------------------------        Payment        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    Deposit,
    Remainder,
}

text_enum!(PaymentType { Deposit => "deposit", Remainder => "remainder" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

text_enum!(PaymentStatus { Pending => "pending", Completed => "completed", Failed => "failed" });

/// One charge attempt. Completed payments are never modified.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub order_id: i64,
    /// The engine's own reference for the charge, handed to the provider as the idempotency key
    pub payment_ref: String,
    /// The provider's reference, once known
    pub provider_ref: Option<String>,
    pub payment_type: PaymentType,
    pub amount: MinorUnits,
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub order_id: i64,
    pub payment_ref: String,
    pub payment_type: PaymentType,
    pub amount: MinorUnits,
}

impl NewPayment {
    pub fn new<S: Into<String>>(order_id: i64, payment_ref: S, payment_type: PaymentType, amount: MinorUnits) -> Self {
        Self { order_id, payment_ref: payment_ref.into(), payment_type, amount }
    }
}

//--------------------------------------   ReminderMilestone   ---------------------------------------------------------
/// A notification that must be sent at most once per order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderMilestone {
    /// Remainder reminder, the given number of days before the remainder due date
    RemainderDue(i64),
    /// One-shot reminder the day before fulfillment, for fully paid orders
    PreFulfillment,
}

impl Display for ReminderMilestone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReminderMilestone::RemainderDue(days) => write!(f, "remainder_due_{days}"),
            ReminderMilestone::PreFulfillment => f.write_str("pre_fulfillment"),
        }
    }
}

impl FromStr for ReminderMilestone {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "pre_fulfillment" {
            return Ok(Self::PreFulfillment);
        }
        s.strip_prefix("remainder_due_")
            .and_then(|d| d.parse::<i64>().ok())
            .map(Self::RemainderDue)
            .ok_or_else(|| ConversionError(format!("{s} is not a valid reminder milestone")))
    }
}
