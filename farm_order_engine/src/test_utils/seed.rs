//! Canned inventory, discount codes and pricing for tests.
use farm_common::MinorUnits;

use crate::{
    db_types::{DiscountCode, DiscountKind, InventoryKind, InventoryUnit, NewDiscountCode, NewInventoryUnit, ProductLine},
    pricing::PricingConfig,
    traits::{DiscountCodeStore, InventoryManagement},
};

/// Prices used throughout the tests:
/// * a 10 kg pig box at 100.00 with a 50 % deposit,
/// * Marans hatching eggs at 3.00 each with a 30 % deposit,
/// * point-of-lay hens at 25.00 with a 20 % deposit,
/// * sausages and bacon as extras,
/// * free pickup, and courier delivery at 8.00 (4.50 for eggs).
pub fn test_pricing_config() -> PricingConfig {
    let mut config = PricingConfig::default();
    config.base_prices.insert("pig_box_10kg".into(), MinorUnits::from(10_000));
    config.base_prices.insert("egg_marans".into(), MinorUnits::from(300));
    config.base_prices.insert("hen_pol".into(), MinorUnits::from(2_500));
    config.extra_prices.insert("sausages".into(), MinorUnits::from(2_000));
    config.extra_prices.insert("bacon".into(), MinorUnits::from(1_200));
    config.deposit_percentages.insert(ProductLine::PigBox, 50);
    config.deposit_percentages.insert(ProductLine::HatchingEggs, 30);
    config.deposit_percentages.insert(ProductLine::LiveChickens, 20);
    config.delivery_fees.insert("pickup".into(), MinorUnits::zero());
    config.delivery_fees.insert("courier".into(), MinorUnits::from(800));
    config.fee_overrides.insert("hatching_eggs/courier".into(), MinorUnits::from(450));
    config.fresh_surcharge = MinorUnits::from(300);
    config
}

pub async fn seed_unit<B: InventoryManagement>(
    db: &B,
    code: &str,
    kind: InventoryKind,
    capacity: i64,
    delivery_week: Option<&str>,
) -> InventoryUnit {
    let mut unit = NewInventoryUnit::new(code, kind, capacity);
    if let Some(week) = delivery_week {
        unit = unit.with_delivery_week(week);
    }
    db.create_unit(unit).await.expect("Error creating inventory unit")
}

pub async fn seed_discount_code<B: DiscountCodeStore>(
    db: &B,
    code: &str,
    kind: DiscountKind,
    amount: i64,
) -> DiscountCode {
    let code =
        NewDiscountCode { code: code.to_string(), kind, discount_amount: MinorUnits::from(amount), owner_ref: None };
    db.create_code(code).await.expect("Error creating discount code")
}
