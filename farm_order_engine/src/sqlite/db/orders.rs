use chrono::{NaiveDate, Utc};
use farm_common::MinorUnits;
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrder, NewOrderItem, Order, OrderItem, OrderNumber, OrderStatusType},
    sqlite::db::{amendments, inventory},
    traits::LifecycleError,
};

/// Inserts a new order row. This is not atomic with anything else. Embed the call inside a transaction, and pass
/// `&mut *tx` as the connection argument, if you need that.
pub async fn insert_order(order: &NewOrder, conn: &mut SqliteConnection) -> Result<Order, LifecycleError> {
    let discount = &order.discount;
    let base_total = order.deposit_amount + order.remainder_amount;
    let result = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_number,
                customer_ref,
                product_line,
                delivery_method,
                fresh,
                delivery_week,
                fulfillment_date,
                subtotal,
                delivery_fee,
                extras_total,
                discount_kind,
                discount_code,
                discount_amount,
                base_total,
                amendments_total,
                deposit_amount,
                remainder_amount,
                total_amount,
                remainder_due_date,
                status
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, 0, $15, $16, $17, $18, 'draft')
            RETURNING *;
        "#,
    )
    .bind(order.order_number.as_str())
    .bind(&order.customer_ref)
    .bind(order.product_line.to_string())
    .bind(&order.delivery_method)
    .bind(order.fresh)
    .bind(&order.delivery_week)
    .bind(order.fulfillment_date)
    .bind(order.subtotal)
    .bind(order.delivery_fee)
    .bind(order.extras_total)
    .bind(discount.kind().map(|k| k.to_string()))
    .bind(discount.code())
    .bind(discount.amount())
    .bind(base_total)
    .bind(order.deposit_amount)
    .bind(order.remainder_amount)
    .bind(order.total_amount)
    .bind(order.remainder_due_date)
    .fetch_one(conn)
    .await;
    match result {
        Ok(order) => Ok(order),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(LifecycleError::OrderNumberCollision(order.order_number.clone()))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn insert_item(order_id: i64, item: &NewOrderItem, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO order_items (order_id, kind, product_code, inventory_unit_id, quantity, unit_price, subtotal)
            VALUES ($1, $2, $3, $4, $5, $6, $7);
        "#,
    )
    .bind(order_id)
    .bind(item.kind.to_string())
    .bind(&item.product_code)
    .bind(item.inventory_unit_id)
    .bind(item.quantity)
    .bind(item.unit_price)
    .bind(item.subtotal)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_order_by_number(
    order_number: &OrderNumber,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE order_number = $1")
        .bind(order_number.as_str())
        .fetch_optional(conn)
        .await
}

pub async fn fetch_order_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_items(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id ASC").bind(order_id).fetch_all(conn).await
}

/// Bumps the order version, provided it still equals `expected_version`. This is the first write of every
/// order-modifying transaction, so it also takes SQLite's write lock before anything is read.
pub async fn claim_version(
    order_id: i64,
    expected_version: i64,
    conn: &mut SqliteConnection,
) -> Result<Order, LifecycleError> {
    let result: Option<Order> = sqlx::query_as(
        "UPDATE orders SET version = version + 1, updated_at = CURRENT_TIMESTAMP WHERE id = $1 AND version = $2 \
         RETURNING *",
    )
    .bind(order_id)
    .bind(expected_version)
    .fetch_optional(&mut *conn)
    .await?;
    match result {
        Some(order) => Ok(order),
        None => match fetch_order_by_id(order_id, conn).await? {
            Some(order) => {
                debug!("🗃️ Order {} is at version {}, not {expected_version}", order.order_number, order.version);
                Err(LifecycleError::ConcurrentModification(order.order_number))
            },
            None => Err(LifecycleError::OrderNotFound(format!("#{order_id}"))),
        },
    }
}

/// Stores new totals after an amendment. The remainder absorbs the whole change, and never goes below zero. An
/// order that had nothing left to pay and now owes a remainder takes `due_date` as its remainder due date.
pub async fn update_totals(
    order_id: i64,
    amendments_total: MinorUnits,
    due_date: NaiveDate,
    conn: &mut SqliteConnection,
) -> Result<Order, LifecycleError> {
    let result: Option<Order> = sqlx::query_as(
        r#"
            UPDATE orders SET
                amendments_total = $1,
                total_amount = base_total + $1,
                remainder_amount = MAX(0, base_total + $1 - deposit_amount),
                remainder_due_date = CASE
                    WHEN remainder_due_date IS NULL AND base_total + $1 > deposit_amount THEN $3
                    ELSE remainder_due_date
                END,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $2
            RETURNING *;
        "#,
    )
    .bind(amendments_total)
    .bind(order_id)
    .bind(due_date)
    .fetch_optional(conn)
    .await?;
    result.ok_or_else(|| LifecycleError::OrderNotFound(format!("#{order_id}")))
}

/// Switches the delivery method and swaps the old delivery fee out of the checkout total for `delivery_fee`. Every
/// right-hand side reads the row as it was before the update.
pub async fn update_delivery(
    order_id: i64,
    delivery_method: &str,
    delivery_fee: MinorUnits,
    due_date: NaiveDate,
    conn: &mut SqliteConnection,
) -> Result<Order, LifecycleError> {
    let result: Option<Order> = sqlx::query_as(
        r#"
            UPDATE orders SET
                delivery_method = $1,
                delivery_fee = $2,
                base_total = base_total - delivery_fee + $2,
                total_amount = base_total - delivery_fee + $2 + amendments_total,
                remainder_amount = MAX(0, base_total - delivery_fee + $2 + amendments_total - deposit_amount),
                remainder_due_date = CASE
                    WHEN remainder_due_date IS NULL
                        AND base_total - delivery_fee + $2 + amendments_total > deposit_amount THEN $3
                    ELSE remainder_due_date
                END,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $4
            RETURNING *;
        "#,
    )
    .bind(delivery_method)
    .bind(delivery_fee)
    .bind(due_date)
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    result.ok_or_else(|| LifecycleError::OrderNotFound(format!("#{order_id}")))
}

pub async fn update_status(
    order_id: i64,
    status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Order, LifecycleError> {
    let result: Option<Order> =
        sqlx::query_as("UPDATE orders SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *")
            .bind(status.to_string())
            .bind(order_id)
            .fetch_optional(conn)
            .await?;
    result.ok_or_else(|| LifecycleError::OrderNotFound(format!("#{order_id}")))
}

pub async fn set_manual_status(
    order_id: i64,
    status: OrderStatusType,
    reason: &str,
    conn: &mut SqliteConnection,
) -> Result<Order, LifecycleError> {
    let result: Option<Order> = sqlx::query_as(
        "UPDATE orders SET status = $1, manual_status = $1, status_reason = $2, updated_at = CURRENT_TIMESTAMP WHERE \
         id = $3 RETURNING *",
    )
    .bind(status.to_string())
    .bind(reason)
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    result.ok_or_else(|| LifecycleError::OrderNotFound(format!("#{order_id}")))
}

pub async fn set_locked(order_id: i64, locked: bool, conn: &mut SqliteConnection) -> Result<Order, LifecycleError> {
    let locked_at = locked.then(Utc::now);
    let result: Option<Order> = sqlx::query_as(
        "UPDATE orders SET locked_at = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *",
    )
    .bind(locked_at)
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    result.ok_or_else(|| LifecycleError::OrderNotFound(format!("#{order_id}")))
}

/// Marks the order as forfeited if it still qualifies. The conditions are re-checked in the `WHERE` clause, so
/// concurrent or repeated sweeps forfeit an order exactly once.
pub async fn forfeit_if_overdue(
    order_id: i64,
    today: NaiveDate,
    reason: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE orders SET
                status = 'forfeited',
                manual_status = 'forfeited',
                status_reason = $1,
                version = version + 1,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $2
                AND status = 'deposit_paid'
                AND manual_status IS NULL
                AND locked_at IS NULL
                AND remainder_due_date IS NOT NULL
                AND remainder_due_date < $3
            RETURNING *;
        "#,
    )
    .bind(reason)
    .bind(order_id)
    .bind(today)
    .fetch_optional(conn)
    .await
}

pub async fn fetch_overdue(today: NaiveDate, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT * FROM orders
            WHERE status = 'deposit_paid'
                AND manual_status IS NULL
                AND locked_at IS NULL
                AND remainder_due_date IS NOT NULL
                AND remainder_due_date < $1
            ORDER BY remainder_due_date ASC, id ASC;
        "#,
    )
    .bind(today)
    .fetch_all(conn)
    .await
}

pub async fn fetch_due_within(
    today: NaiveDate,
    horizon: NaiveDate,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT * FROM orders
            WHERE status = 'deposit_paid'
                AND remainder_due_date IS NOT NULL
                AND remainder_due_date >= $1
                AND remainder_due_date <= $2
            ORDER BY remainder_due_date ASC, id ASC;
        "#,
    )
    .bind(today)
    .bind(horizon)
    .fetch_all(conn)
    .await
}

pub async fn fetch_fulfilled_between(
    from: NaiveDate,
    to: NaiveDate,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT * FROM orders
            WHERE status IN ('fully_paid', 'ready_for_pickup')
                AND fulfillment_date >= $1
                AND fulfillment_date <= $2
            ORDER BY fulfillment_date ASC, id ASC;
        "#,
    )
    .bind(from)
    .bind(to)
    .fetch_all(conn)
    .await
}

/// Releases every reservation held by the order: its checkout line items and all of its amendments.
pub async fn release_order_inventory(order_id: i64, conn: &mut SqliteConnection) -> Result<(), LifecycleError> {
    let mut held: Vec<(i64, i64)> = fetch_items(order_id, conn)
        .await?
        .into_iter()
        .filter_map(|item| item.inventory_unit_id.map(|unit| (unit, item.quantity)))
        .collect();
    held.extend(
        amendments::fetch_for_order(order_id, conn)
            .await?
            .into_iter()
            .filter_map(|a| a.inventory_unit_id.map(|unit| (unit, a.quantity))),
    );
    held.sort_by_key(|(unit, _)| *unit);
    for (unit, quantity) in held {
        inventory::release(unit, quantity, conn).await?;
    }
    trace!("🗃️ All inventory for order #{order_id} has been released");
    Ok(())
}
