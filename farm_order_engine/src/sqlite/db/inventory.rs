//! The inventory ledger.
//!
//! `allocated` is only ever changed by the conditional updates in this module. The capacity check is part of the
//! `WHERE` clause of a single statement, so two connections racing for the last unit cannot both succeed.
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{InventoryUnit, NewInventoryUnit},
    traits::LifecycleError,
};

pub async fn insert_unit(unit: NewInventoryUnit, conn: &mut SqliteConnection) -> Result<InventoryUnit, LifecycleError> {
    if unit.capacity < 0 {
        return Err(LifecycleError::InvalidRequest(format!("Capacity for {} cannot be negative", unit.code)));
    }
    let status = if unit.capacity == 0 { "sold_out" } else { "open" };
    let unit: InventoryUnit = sqlx::query_as(
        r#"
            INSERT INTO inventory_units (code, kind, description, capacity, status, delivery_week)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(unit.code)
    .bind(unit.kind.to_string())
    .bind(unit.description)
    .bind(unit.capacity)
    .bind(status)
    .bind(unit.delivery_week)
    .fetch_one(conn)
    .await?;
    debug!("📦️ Inventory unit {} ({}) created with capacity {}", unit.code, unit.kind, unit.capacity);
    Ok(unit)
}

pub async fn fetch_unit(id: i64, conn: &mut SqliteConnection) -> Result<Option<InventoryUnit>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM inventory_units WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_unit_by_code(code: &str, conn: &mut SqliteConnection) -> Result<Option<InventoryUnit>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM inventory_units WHERE code = $1").bind(code).fetch_optional(conn).await
}

pub async fn fetch_units(conn: &mut SqliteConnection) -> Result<Vec<InventoryUnit>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM inventory_units ORDER BY id ASC").fetch_all(conn).await
}

/// Atomically increments `allocated`, provided at least `quantity` units remain.
pub async fn reserve(unit_id: i64, quantity: i64, conn: &mut SqliteConnection) -> Result<InventoryUnit, LifecycleError> {
    if quantity <= 0 {
        return Err(LifecycleError::InvalidRequest(format!("Cannot reserve {quantity} units")));
    }
    let result: Option<InventoryUnit> = sqlx::query_as(
        r#"
            UPDATE inventory_units SET
                allocated = allocated + $1,
                status = CASE WHEN allocated + $1 >= capacity THEN 'sold_out' ELSE 'open' END,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $2 AND capacity - allocated >= $1
            RETURNING *;
        "#,
    )
    .bind(quantity)
    .bind(unit_id)
    .fetch_optional(&mut *conn)
    .await?;
    match result {
        Some(unit) => {
            trace!("📦️ Reserved {quantity} of {}. {} remaining", unit.code, unit.remaining());
            Ok(unit)
        },
        None => Err(insufficient(unit_id, quantity, conn).await),
    }
}

/// Decrements `allocated`, floored at zero. Releasing more than is allocated is not an error.
pub async fn release(unit_id: i64, quantity: i64, conn: &mut SqliteConnection) -> Result<InventoryUnit, LifecycleError> {
    if quantity < 0 {
        return Err(LifecycleError::InvalidRequest(format!("Cannot release {quantity} units")));
    }
    let result: Option<InventoryUnit> = sqlx::query_as(
        r#"
            UPDATE inventory_units SET
                allocated = MAX(0, allocated - $1),
                status = CASE WHEN MAX(0, allocated - $1) >= capacity THEN 'sold_out' ELSE 'open' END,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $2
            RETURNING *;
        "#,
    )
    .bind(quantity)
    .bind(unit_id)
    .fetch_optional(conn)
    .await?;
    let unit = result.ok_or_else(|| LifecycleError::InventoryUnitNotFound(unit_id.to_string()))?;
    trace!("📦️ Released {quantity} of {}. {} remaining", unit.code, unit.remaining());
    Ok(unit)
}

/// Signed reserve/release.
pub async fn adjust(unit_id: i64, delta: i64, conn: &mut SqliteConnection) -> Result<InventoryUnit, LifecycleError> {
    match delta {
        0 => fetch_unit(unit_id, conn).await?.ok_or_else(|| LifecycleError::InventoryUnitNotFound(unit_id.to_string())),
        d if d > 0 => reserve(unit_id, d, conn).await,
        d => release(unit_id, -d, conn).await,
    }
}

pub async fn set_capacity(
    unit_id: i64,
    capacity: i64,
    conn: &mut SqliteConnection,
) -> Result<InventoryUnit, LifecycleError> {
    let result: Option<InventoryUnit> = sqlx::query_as(
        r#"
            UPDATE inventory_units SET
                capacity = $1,
                status = CASE WHEN allocated >= $1 THEN 'sold_out' ELSE 'open' END,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $2 AND allocated <= $1
            RETURNING *;
        "#,
    )
    .bind(capacity)
    .bind(unit_id)
    .fetch_optional(&mut *conn)
    .await?;
    match result {
        Some(unit) => {
            debug!("📦️ Capacity of {} set to {capacity}", unit.code);
            Ok(unit)
        },
        None => {
            let unit = fetch_unit(unit_id, conn)
                .await?
                .ok_or_else(|| LifecycleError::InventoryUnitNotFound(unit_id.to_string()))?;
            Err(LifecycleError::InvalidRequest(format!(
                "Capacity of {} cannot be set to {capacity}, since {} units are already allocated",
                unit.code, unit.allocated
            )))
        },
    }
}

async fn insufficient(unit_id: i64, requested: i64, conn: &mut SqliteConnection) -> LifecycleError {
    match fetch_unit(unit_id, conn).await {
        Ok(Some(unit)) => {
            debug!("📦️ Cannot reserve {requested} of {}. Only {} remaining", unit.code, unit.remaining());
            LifecycleError::InsufficientInventory { unit: unit.code.clone(), requested, remaining: unit.remaining() }
        },
        Ok(None) => LifecycleError::InventoryUnitNotFound(unit_id.to_string()),
        Err(e) => e.into(),
    }
}
