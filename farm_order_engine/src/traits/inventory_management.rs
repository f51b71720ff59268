use crate::{
    db_types::{InventoryUnit, NewInventoryUnit},
    traits::LifecycleError,
};

/// The inventory ledger.
///
/// `allocated` is the only hot shared counter in the system. Backends must implement `reserve` and positive `adjust`
/// as a single conditional update, never as read-check-write, so that concurrent callers cannot oversell a unit.
#[allow(async_fn_in_trait)]
pub trait InventoryManagement {
    async fn create_unit(&self, unit: NewInventoryUnit) -> Result<InventoryUnit, LifecycleError>;

    async fn fetch_unit(&self, id: i64) -> Result<Option<InventoryUnit>, LifecycleError>;

    async fn fetch_unit_by_code(&self, code: &str) -> Result<Option<InventoryUnit>, LifecycleError>;

    async fn fetch_units(&self) -> Result<Vec<InventoryUnit>, LifecycleError>;

    /// Increments `allocated` by `quantity`, failing with [`LifecycleError::InsufficientInventory`] if fewer than
    /// `quantity` units remain.
    async fn reserve(&self, unit_id: i64, quantity: i64) -> Result<InventoryUnit, LifecycleError>;

    /// Decrements `allocated` by `quantity`, floored at zero.
    async fn release(&self, unit_id: i64, quantity: i64) -> Result<InventoryUnit, LifecycleError>;

    /// Signed reserve/release. Positive deltas are subject to the same capacity check as `reserve`.
    async fn adjust(&self, unit_id: i64, delta: i64) -> Result<InventoryUnit, LifecycleError>;

    /// Changes the capacity of a unit. The capacity can never drop below what is already allocated.
    async fn set_capacity(&self, unit_id: i64, capacity: i64) -> Result<InventoryUnit, LifecycleError>;
}
