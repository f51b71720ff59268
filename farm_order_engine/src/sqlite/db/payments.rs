use chrono::{DateTime, Utc};
use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewPayment, Payment, PaymentStatus},
    traits::LifecycleError,
};

pub async fn insert_payment(payment: NewPayment, conn: &mut SqliteConnection) -> Result<Payment, LifecycleError> {
    let result = sqlx::query_as(
        r#"
            INSERT INTO payments (order_id, payment_ref, payment_type, amount, status)
            VALUES ($1, $2, $3, $4, 'pending')
            RETURNING *;
        "#,
    )
    .bind(payment.order_id)
    .bind(&payment.payment_ref)
    .bind(payment.payment_type.to_string())
    .bind(payment.amount)
    .fetch_one(conn)
    .await;
    match result {
        Ok(p) => {
            trace!("💰️ Payment {} for {} recorded as pending", payment.payment_ref, payment.amount);
            Ok(p)
        },
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(LifecycleError::PaymentAlreadyExists(payment.payment_ref))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_by_ref(payment_ref: &str, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payments WHERE payment_ref = $1").bind(payment_ref).fetch_optional(conn).await
}

pub async fn fetch_by_provider_ref(
    provider_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payments WHERE provider_ref = $1").bind(provider_ref).fetch_optional(conn).await
}

pub async fn fetch_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Payment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payments WHERE order_id = $1 ORDER BY id ASC").bind(order_id).fetch_all(conn).await
}

/// Records the outcome of a charge. Completed payments are excluded by the `WHERE` clause (and by a trigger), so this
/// returns `None` for them.
pub async fn update_outcome(
    id: i64,
    status: PaymentStatus,
    provider_ref: Option<&str>,
    paid_at: Option<DateTime<Utc>>,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE payments SET
                status = $1,
                provider_ref = COALESCE($2, provider_ref),
                paid_at = COALESCE($3, paid_at),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $4 AND status <> 'completed'
            RETURNING *;
        "#,
    )
    .bind(status.to_string())
    .bind(provider_ref)
    .bind(paid_at)
    .bind(id)
    .fetch_optional(conn)
    .await
}
