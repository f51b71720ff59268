use sqlx::SqliteConnection;

use crate::{
    db_types::{DiscountCode, NewDiscountCode},
    traits::LifecycleError,
};

pub async fn lookup_active(code: &str, conn: &mut SqliteConnection) -> Result<Option<DiscountCode>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM discount_codes WHERE code = $1 AND active = 1").bind(code).fetch_optional(conn).await
}

pub async fn insert_code(code: NewDiscountCode, conn: &mut SqliteConnection) -> Result<DiscountCode, LifecycleError> {
    let result = sqlx::query_as(
        r#"
            INSERT INTO discount_codes (code, kind, discount_amount, owner_ref)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(&code.code)
    .bind(code.kind.to_string())
    .bind(code.discount_amount)
    .bind(&code.owner_ref)
    .fetch_one(conn)
    .await;
    match result {
        Ok(c) => Ok(c),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(LifecycleError::InvalidRequest(format!("Discount code {} already exists", code.code)))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_codes(conn: &mut SqliteConnection) -> Result<Vec<DiscountCode>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM discount_codes ORDER BY id ASC").fetch_all(conn).await
}

/// Records one use of the code. The code itself is not otherwise touched.
pub async fn record_usage(code: &str, conn: &mut SqliteConnection) -> Result<(), LifecycleError> {
    let result = sqlx::query("UPDATE discount_codes SET usage_count = usage_count + 1 WHERE code = $1 AND active = 1")
        .bind(code)
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(LifecycleError::InvalidDiscountCode(code.to_string()));
    }
    Ok(())
}
