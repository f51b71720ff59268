//! # Pricing resolver
//!
//! A pure function from a product selection to the money breakdown of an order. Nothing in here touches the database
//! or the clock; the caller supplies the pricing configuration as it was at the time of the call, and the number of
//! days until fulfillment.
//!
//! The rules are:
//! * The deposit is a fixed percentage of the *base product price only*, less any discount. Percentages are rounded
//!   half-up as soon as they are computed.
//! * The remainder is the base price less the *undiscounted* deposit.
//! * Delivery fees and extras are always collected with the deposit.
//! * A discount never exceeds the undiscounted deposit, and never touches delivery fees or extras.
//! * If fulfillment is closer than the cutoff, the whole amount is due immediately and the remainder is zero.
use std::collections::HashMap;

use farm_common::MinorUnits;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{Discount, ProductLine};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("Unknown product code: {0}")]
    UnknownProduct(String),
    #[error("Unknown delivery method: {0}")]
    UnknownDeliveryMethod(String),
    #[error("No deposit percentage is configured for {0}")]
    MissingDepositPercentage(ProductLine),
    #[error("Deposit percentage for {0} must be between 0 and 100, but was {1}")]
    InvalidDepositPercentage(ProductLine, i64),
    #[error("Quantity for {0} must be positive, but was {1}")]
    InvalidQuantity(String, i64),
    #[error("The amount for {0} is too large to represent")]
    AmountOverflow(String),
    #[error("Pricing configuration is unavailable: {0}")]
    ConfigUnavailable(String),
}

/// The pricing configuration, as supplied by a [`crate::traits::PricingConfigSource`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Unit price of every base product, keyed by product code
    pub base_prices: HashMap<String, MinorUnits>,
    /// Unit price of add-ons (extra cuts, packaging, etc.), keyed by product code
    #[serde(default)]
    pub extra_prices: HashMap<String, MinorUnits>,
    /// Deposit percentage, per product line
    pub deposit_percentages: HashMap<ProductLine, i64>,
    /// Default fee per delivery method
    pub delivery_fees: HashMap<String, MinorUnits>,
    /// Fee overrides, keyed by `"{product_line}/{delivery_method}"`, e.g. `"live_chickens/courier"`
    #[serde(default)]
    pub fee_overrides: HashMap<String, MinorUnits>,
    /// Added to the delivery fee when fresh (rush) handling is requested
    #[serde(default)]
    pub fresh_surcharge: MinorUnits,
}

impl PricingConfig {
    /// The current unit price of any product, base or extra.
    pub fn unit_price(&self, code: &str) -> Result<MinorUnits, PricingError> {
        self.base_prices
            .get(code)
            .or_else(|| self.extra_prices.get(code))
            .copied()
            .ok_or_else(|| PricingError::UnknownProduct(code.to_string()))
    }

    pub fn delivery_fee(&self, line: ProductLine, method: &str) -> Result<MinorUnits, PricingError> {
        let key = format!("{line}/{method}");
        self.fee_overrides
            .get(&key)
            .or_else(|| self.delivery_fees.get(method))
            .copied()
            .ok_or_else(|| PricingError::UnknownDeliveryMethod(method.to_string()))
    }

    /// The delivery fee for `method`, including the fresh surcharge if fresh handling was requested.
    pub fn delivery_fee_with_handling(
        &self,
        line: ProductLine,
        method: &str,
        fresh: bool,
    ) -> Result<MinorUnits, PricingError> {
        let fee = self.delivery_fee(line, method)?;
        Ok(if fresh { fee + self.fresh_surcharge } else { fee })
    }

    pub fn deposit_percentage(&self, line: ProductLine) -> Result<i64, PricingError> {
        let pct = *self.deposit_percentages.get(&line).ok_or(PricingError::MissingDepositPercentage(line))?;
        if !(0..=100).contains(&pct) {
            return Err(PricingError::InvalidDepositPercentage(line, pct));
        }
        Ok(pct)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSelection {
    pub product_code: String,
    pub quantity: i64,
}

impl LineSelection {
    pub fn new<S: Into<String>>(product_code: S, quantity: i64) -> Self {
        Self { product_code: product_code.into(), quantity }
    }
}

#[derive(Debug, Clone)]
pub struct PricingRequest {
    pub product_line: ProductLine,
    pub base_items: Vec<LineSelection>,
    pub extras: Vec<LineSelection>,
    pub delivery_method: String,
    pub fresh: bool,
    pub discount: Discount,
    /// Whole days from today until the scheduled fulfillment date
    pub days_to_fulfillment: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinePrice {
    pub product_code: String,
    pub quantity: i64,
    pub unit_price: MinorUnits,
    pub subtotal: MinorUnits,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub subtotal: MinorUnits,
    pub delivery_fee: MinorUnits,
    pub extras_total: MinorUnits,
    /// The discount actually applied, after capping at the undiscounted deposit
    pub discount_amount: MinorUnits,
    pub deposit_amount: MinorUnits,
    pub remainder_amount: MinorUnits,
    pub total_amount: MinorUnits,
    pub full_payment_required: bool,
    pub base_lines: Vec<LinePrice>,
    pub extra_lines: Vec<LinePrice>,
}

fn price_lines(config: &PricingConfig, lines: &[LineSelection]) -> Result<Vec<LinePrice>, PricingError> {
    lines
        .iter()
        .map(|line| {
            if line.quantity <= 0 {
                return Err(PricingError::InvalidQuantity(line.product_code.clone(), line.quantity));
            }
            let unit_price = config.unit_price(&line.product_code)?;
            let subtotal = unit_price
                .checked_mul(line.quantity)
                .ok_or_else(|| PricingError::AmountOverflow(line.product_code.clone()))?;
            Ok(LinePrice { product_code: line.product_code.clone(), quantity: line.quantity, unit_price, subtotal })
        })
        .collect()
}

/// Computes the full money breakdown for an order.
///
/// `full_payment_cutoff_days`: orders placed fewer than this many days before fulfillment must be paid in full.
pub fn resolve_price(
    config: &PricingConfig,
    request: &PricingRequest,
    full_payment_cutoff_days: i64,
) -> Result<PriceBreakdown, PricingError> {
    let base_lines = price_lines(config, &request.base_items)?;
    let extra_lines = price_lines(config, &request.extras)?;
    let subtotal = MinorUnits::checked_sum(base_lines.iter().map(|l| l.subtotal))
        .ok_or_else(|| PricingError::AmountOverflow("the order subtotal".into()))?;
    let extras_total = MinorUnits::checked_sum(extra_lines.iter().map(|l| l.subtotal))
        .ok_or_else(|| PricingError::AmountOverflow("the extras".into()))?;
    let delivery_fee = config.delivery_fee_with_handling(request.product_line, &request.delivery_method, request.fresh)?;
    let pct = config.deposit_percentage(request.product_line)?;
    let undiscounted_deposit = subtotal.percent(pct);
    let discount_amount = request.discount.capped_at(undiscounted_deposit);
    let full_payment_required = request.days_to_fulfillment < full_payment_cutoff_days;
    let (due_now, remainder_amount) = if full_payment_required {
        (subtotal - discount_amount, MinorUnits::zero())
    } else {
        (undiscounted_deposit - discount_amount, subtotal - undiscounted_deposit)
    };
    let deposit_amount = MinorUnits::checked_sum([due_now, delivery_fee, extras_total])
        .ok_or_else(|| PricingError::AmountOverflow("the deposit".into()))?;
    let total_amount = deposit_amount
        .checked_add(remainder_amount)
        .ok_or_else(|| PricingError::AmountOverflow("the order total".into()))?;
    Ok(PriceBreakdown {
        subtotal,
        delivery_fee,
        extras_total,
        discount_amount,
        deposit_amount,
        remainder_amount,
        total_amount,
        full_payment_required,
        base_lines,
        extra_lines,
    })
}
