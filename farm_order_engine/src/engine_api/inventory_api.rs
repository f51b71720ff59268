use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{DiscountCode, InventoryUnit, NewDiscountCode, NewInventoryUnit},
    traits::{DiscountCodeStore, InventoryManagement, LifecycleError},
};

/// Administration of inventory units and discount codes.
///
/// Allocation is never set directly from here. It only moves through the reservations that orders make and release.
pub struct InventoryApi<B> {
    db: B,
}

impl<B> Debug for InventoryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InventoryApi")
    }
}

impl<B> InventoryApi<B>
where B: InventoryManagement + DiscountCodeStore
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn create_unit(&self, unit: NewInventoryUnit) -> Result<InventoryUnit, LifecycleError> {
        if unit.code.trim().is_empty() {
            return Err(LifecycleError::InvalidRequest("An inventory unit needs a code".into()));
        }
        if unit.capacity < 0 {
            return Err(LifecycleError::InvalidRequest(format!("Capacity cannot be negative, but was {}", unit.capacity)));
        }
        let unit = self.db.create_unit(unit).await?;
        info!("📦️ Created inventory unit {} ({}) with capacity {}", unit.code, unit.kind, unit.capacity);
        Ok(unit)
    }

    pub async fn units(&self) -> Result<Vec<InventoryUnit>, LifecycleError> {
        self.db.fetch_units().await
    }

    pub async fn unit(&self, id: i64) -> Result<InventoryUnit, LifecycleError> {
        self.db.fetch_unit(id).await?.ok_or_else(|| LifecycleError::InventoryUnitNotFound(id.to_string()))
    }

    pub async fn unit_by_code(&self, code: &str) -> Result<InventoryUnit, LifecycleError> {
        self.db.fetch_unit_by_code(code).await?.ok_or_else(|| LifecycleError::InventoryUnitNotFound(code.to_string()))
    }

    /// Changes the sellable capacity of a unit. Fails if the new capacity is below what is already allocated.
    pub async fn set_capacity(&self, id: i64, capacity: i64) -> Result<InventoryUnit, LifecycleError> {
        if capacity < 0 {
            return Err(LifecycleError::InvalidRequest(format!("Capacity cannot be negative, but was {capacity}")));
        }
        let unit = self.db.set_capacity(id, capacity).await?;
        info!("📦️ Capacity of {} is now {} ({} allocated)", unit.code, unit.capacity, unit.allocated);
        Ok(unit)
    }

    pub async fn create_discount_code(&self, code: NewDiscountCode) -> Result<DiscountCode, LifecycleError> {
        if code.code.trim().is_empty() {
            return Err(LifecycleError::InvalidRequest("A discount code cannot be empty".into()));
        }
        if !code.discount_amount.is_positive() {
            return Err(LifecycleError::InvalidRequest(format!(
                "A discount must be positive, but was {}",
                code.discount_amount
            )));
        }
        let code = self.db.create_code(code).await?;
        info!("📦️ Created {} code {} worth {}", code.kind, code.code, code.discount_amount);
        Ok(code)
    }

    pub async fn discount_codes(&self) -> Result<Vec<DiscountCode>, LifecycleError> {
        self.db.fetch_codes().await
    }
}
