use cucumber::given;
use farm_order_engine::db_types::{DiscountKind, InventoryKind};

use crate::{cucumber::FarmWorld, support::TestSystem};

#[given("a fresh install")]
async fn fresh_database(world: &mut FarmWorld) {
    world.system = Some(TestSystem::new().await);
}

#[given(expr = "a pig box preset {string} with capacity {int}")]
async fn box_preset(world: &mut FarmWorld, code: String, capacity: i64) {
    let unit = world.system().unit(&code, InventoryKind::BoxPreset, capacity, None).await;
    world.units.insert(code, unit.id);
}

#[given(expr = "an egg batch {string} for week {string} with capacity {int}")]
async fn egg_batch(world: &mut FarmWorld, code: String, week: String, capacity: i64) {
    let unit = world.system().unit(&code, InventoryKind::EggBatch, capacity, Some(&week)).await;
    world.units.insert(code, unit.id);
}

#[given(expr = "a referral code {string} worth {int}")]
async fn referral_code(world: &mut FarmWorld, code: String, amount: i64) {
    world.system().discount_code(&code, DiscountKind::Referral, amount).await;
}
