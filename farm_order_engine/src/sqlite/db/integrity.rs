//! Read-only queries behind the integrity report.
use sqlx::SqliteConnection;

use crate::traits::{IntegrityIssue, IntegrityIssueKind};

pub async fn duplicate_deposits(conn: &mut SqliteConnection) -> Result<Vec<IntegrityIssue>, sqlx::Error> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        r#"
            SELECT o.order_number, COUNT(*) AS deposits
            FROM payments p JOIN orders o ON o.id = p.order_id
            WHERE p.payment_type = 'deposit' AND p.status = 'completed'
            GROUP BY o.id
            HAVING COUNT(*) > 1
            ORDER BY o.id;
        "#,
    )
    .fetch_all(conn)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(order, n)| {
            IntegrityIssue::new(IntegrityIssueKind::DuplicateDeposit, order, format!("{n} completed deposit payments"))
        })
        .collect())
}

pub async fn total_mismatches(conn: &mut SqliteConnection) -> Result<Vec<IntegrityIssue>, sqlx::Error> {
    let rows: Vec<(String, i64, i64, i64, i64, i64)> = sqlx::query_as(
        r#"
            SELECT order_number, total_amount, deposit_amount, remainder_amount, base_total, amendments_total
            FROM orders
            WHERE total_amount <> deposit_amount + remainder_amount
               OR total_amount <> base_total + amendments_total
            ORDER BY id;
        "#,
    )
    .fetch_all(conn)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(order, total, deposit, remainder, base, amendments)| {
            IntegrityIssue::new(
                IntegrityIssueKind::TotalMismatch,
                order,
                format!(
                    "total {total} does not match deposit {deposit} + remainder {remainder}, or base {base} + \
                     amendments {amendments}"
                ),
            )
        })
        .collect())
}

pub async fn allocation_out_of_bounds(conn: &mut SqliteConnection) -> Result<Vec<IntegrityIssue>, sqlx::Error> {
    let rows: Vec<(String, i64, i64)> = sqlx::query_as(
        "SELECT code, capacity, allocated FROM inventory_units WHERE allocated < 0 OR allocated > capacity ORDER BY id",
    )
    .fetch_all(conn)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(code, capacity, allocated)| {
            IntegrityIssue::new(
                IntegrityIssueKind::AllocationOutOfBounds,
                code,
                format!("allocated {allocated} is outside [0, {capacity}]"),
            )
        })
        .collect())
}

/// Compares each unit's `allocated` counter with the reservations actually held by orders that have not been
/// cancelled or forfeited.
pub async fn allocation_drift(conn: &mut SqliteConnection) -> Result<Vec<IntegrityIssue>, sqlx::Error> {
    let rows: Vec<(String, i64, i64)> = sqlx::query_as(
        r#"
            SELECT u.code, u.allocated, COALESCE(h.held, 0) AS held
            FROM inventory_units u
            LEFT JOIN (
                SELECT unit_id, SUM(quantity) AS held FROM (
                    SELECT i.inventory_unit_id AS unit_id, i.quantity AS quantity
                    FROM order_items i JOIN orders o ON o.id = i.order_id
                    WHERE i.inventory_unit_id IS NOT NULL AND o.status NOT IN ('cancelled', 'forfeited')
                    UNION ALL
                    SELECT a.inventory_unit_id AS unit_id, a.quantity AS quantity
                    FROM amendments a JOIN orders o ON o.id = a.order_id
                    WHERE a.inventory_unit_id IS NOT NULL AND o.status NOT IN ('cancelled', 'forfeited')
                )
                GROUP BY unit_id
            ) h ON h.unit_id = u.id
            WHERE u.allocated <> COALESCE(h.held, 0)
            ORDER BY u.id;
        "#,
    )
    .fetch_all(conn)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(code, allocated, held)| {
            IntegrityIssue::new(
                IntegrityIssueKind::AllocationDrift,
                code,
                format!("ledger shows {allocated} allocated, but active orders hold {held}"),
            )
        })
        .collect())
}
