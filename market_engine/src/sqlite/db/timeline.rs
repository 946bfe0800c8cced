use chrono::Utc;
use sqlx::SqliteConnection;

use crate::db_types::{LogisticsEntry, NewLogisticsEntry, OrderId};

/// Appends an entry to the order's timeline. Timeline entries are never modified or removed.
pub async fn append_entry(
    order_id: &OrderId,
    entry: NewLogisticsEntry,
    conn: &mut SqliteConnection,
) -> Result<LogisticsEntry, sqlx::Error> {
    let entry = sqlx::query_as(
        r#"
            INSERT INTO order_timeline (order_id, status, description, location, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(order_id.as_str())
    .bind(entry.status)
    .bind(entry.description)
    .bind(entry.location)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    Ok(entry)
}

/// The order's timeline, oldest entry first.
pub async fn fetch_timeline(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<LogisticsEntry>, sqlx::Error> {
    let entries = sqlx::query_as("SELECT * FROM order_timeline WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(entries)
}
