use log::warn;
use sqlx::SqliteConnection;

use crate::db_types::ReminderMilestone;

/// Claims the milestone. Returns `false` if somebody else already has.
pub async fn claim(order_id: i64, milestone: ReminderMilestone, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("INSERT OR IGNORE INTO order_reminders (order_id, milestone) VALUES ($1, $2)")
        .bind(order_id)
        .bind(milestone.to_string())
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn unclaim(order_id: i64, milestone: ReminderMilestone, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM order_reminders WHERE order_id = $1 AND milestone = $2")
        .bind(order_id)
        .bind(milestone.to_string())
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn fetch_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<ReminderMilestone>, sqlx::Error> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT milestone FROM order_reminders WHERE order_id = $1 ORDER BY sent_at ASC, milestone ASC")
            .bind(order_id)
            .fetch_all(conn)
            .await?;
    let milestones = rows
        .into_iter()
        .filter_map(|(m,)| match m.parse() {
            Ok(m) => Some(m),
            Err(e) => {
                warn!("🗃️ Ignoring unknown reminder milestone for order #{order_id}. {e}");
                None
            },
        })
        .collect();
    Ok(milestones)
}
