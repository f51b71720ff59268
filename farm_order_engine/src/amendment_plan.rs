//! # Amendment planning
//!
//! Customers submit the complete list of amendments they want on their order, not a diff. The planner turns that list
//! into
//! * the full replacement set of amendment rows, and
//! * the signed inventory delta for every unit touched by either the old or the new set.
//!
//! Previously committed quantity keeps the price it was added at. Only quantity beyond what was already committed is
//! priced at today's price, with the late-addition multiplier applied if the order is inside the late window.
//!
//! Planning is pure. Applying the plan (version claim, inventory adjustments, row swap, total recomputation) happens
//! in one transaction in the storage backend.
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use farm_common::MinorUnits;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Amendment, NewAmendment},
    pricing::{PricingConfig, PricingError},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedAmendment {
    pub product_code: String,
    /// The inventory unit this addition draws from. `None` for items that are not inventory-tracked.
    #[serde(default)]
    pub inventory_unit_id: Option<i64>,
    pub quantity: i64,
}

impl RequestedAmendment {
    pub fn new<S: Into<String>>(product_code: S, inventory_unit_id: Option<i64>, quantity: i64) -> Self {
        Self { product_code: product_code.into(), inventory_unit_id, quantity }
    }
}

/// Pricing inputs for quantity that is new in this edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatePricing {
    pub in_late_window: bool,
    pub multiplier_pct: i64,
}

impl LatePricing {
    pub fn regular() -> Self {
        Self { in_late_window: false, multiplier_pct: 100 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmendmentPlan {
    pub rows: Vec<NewAmendment>,
    /// Non-zero `(unit_id, delta)` pairs, sorted by unit id
    pub inventory_deltas: Vec<(i64, i64)>,
    pub amendments_total: MinorUnits,
    /// True if any line's quantity went down compared to what was previously committed
    pub decreased: bool,
}

impl AmendmentPlan {
    pub fn is_noop(&self, existing: &[Amendment]) -> bool {
        self.inventory_deltas.is_empty() &&
            !self.decreased &&
            self.rows.len() == existing.len() &&
            self.rows.iter().zip(existing).all(|(new, old)| {
                new.product_code == old.product_code &&
                    new.inventory_unit_id == old.inventory_unit_id &&
                    new.quantity == old.quantity &&
                    new.unit_price == old.unit_price
            })
    }
}

type LineKey = (String, Option<i64>);

pub fn plan_amendments(
    existing: &[Amendment],
    requested: &[RequestedAmendment],
    config: &PricingConfig,
    late: LatePricing,
    now: DateTime<Utc>,
) -> Result<AmendmentPlan, PricingError> {
    let mut wanted: BTreeMap<LineKey, i64> = BTreeMap::new();
    for r in requested {
        if r.quantity < 0 {
            return Err(PricingError::InvalidQuantity(r.product_code.clone(), r.quantity));
        }
        let total = wanted.entry((r.product_code.clone(), r.inventory_unit_id)).or_default();
        *total = total
            .checked_add(r.quantity)
            .ok_or_else(|| PricingError::InvalidQuantity(r.product_code.clone(), r.quantity))?;
    }
    let mut sorted_existing: Vec<&Amendment> = existing.iter().collect();
    sorted_existing.sort_by_key(|a| a.id);
    let mut committed: BTreeMap<LineKey, Vec<&Amendment>> = BTreeMap::new();
    for a in sorted_existing {
        committed.entry((a.product_code.clone(), a.inventory_unit_id)).or_default().push(a);
    }

    let mut rows = Vec::new();
    let mut decreased = false;
    let mut unit_deltas: BTreeMap<i64, i64> = BTreeMap::new();
    let keys: Vec<LineKey> = wanted.keys().chain(committed.keys()).cloned().collect();
    let mut seen = std::collections::BTreeSet::new();
    for key in keys {
        if !seen.insert(key.clone()) {
            continue;
        }
        let requested_qty = wanted.get(&key).copied().unwrap_or(0);
        let previous = committed.get(&key).map(Vec::as_slice).unwrap_or(&[]);
        let previous_qty: i64 = previous.iter().map(|a| a.quantity).sum();
        if requested_qty < previous_qty {
            decreased = true;
        }
        if let Some(unit) = key.1 {
            *unit_deltas.entry(unit).or_default() += requested_qty - previous_qty;
        }
        let mut to_place = requested_qty;
        for old in previous {
            if to_place == 0 {
                break;
            }
            let quantity = old.quantity.min(to_place);
            rows.push(NewAmendment {
                product_code: old.product_code.clone(),
                inventory_unit_id: old.inventory_unit_id,
                quantity,
                unit_price: old.unit_price,
                subtotal: line_subtotal(&old.product_code, old.unit_price, quantity)?,
                late_addition: old.late_addition,
                added_at: old.added_at,
            });
            to_place -= quantity;
        }
        if to_place > 0 {
            let list_price = config.unit_price(&key.0)?;
            let unit_price = if late.in_late_window { list_price.percent(late.multiplier_pct) } else { list_price };
            rows.push(NewAmendment {
                product_code: key.0.clone(),
                inventory_unit_id: key.1,
                quantity: to_place,
                unit_price,
                subtotal: line_subtotal(&key.0, unit_price, to_place)?,
                late_addition: late.in_late_window,
                added_at: now,
            });
        }
    }
    let amendments_total = MinorUnits::checked_sum(rows.iter().map(|r| r.subtotal))
        .ok_or_else(|| PricingError::AmountOverflow("the amendments".into()))?;
    let inventory_deltas = unit_deltas.into_iter().filter(|(_, d)| *d != 0).collect();
    Ok(AmendmentPlan { rows, inventory_deltas, amendments_total, decreased })
}

fn line_subtotal(product_code: &str, unit_price: MinorUnits, quantity: i64) -> Result<MinorUnits, PricingError> {
    unit_price.checked_mul(quantity).ok_or_else(|| PricingError::AmountOverflow(product_code.to_string()))
}
