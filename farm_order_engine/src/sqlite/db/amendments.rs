use sqlx::SqliteConnection;

use crate::db_types::{Amendment, NewAmendment};

pub async fn fetch_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Amendment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM amendments WHERE order_id = $1 ORDER BY id ASC").bind(order_id).fetch_all(conn).await
}

/// Amendment rows are never patched. Every edit deletes the whole set and inserts the replacement.
pub async fn replace_for_order(
    order_id: i64,
    rows: &[NewAmendment],
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM amendments WHERE order_id = $1").bind(order_id).execute(&mut *conn).await?;
    for row in rows {
        sqlx::query(
            r#"
                INSERT INTO amendments
                    (order_id, product_code, inventory_unit_id, quantity, unit_price, subtotal, late_addition, added_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8);
            "#,
        )
        .bind(order_id)
        .bind(&row.product_code)
        .bind(row.inventory_unit_id)
        .bind(row.quantity)
        .bind(row.unit_price)
        .bind(row.subtotal)
        .bind(row.late_addition)
        .bind(row.added_at)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}
