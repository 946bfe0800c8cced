use chrono::Utc;
use sqlx::SqliteConnection;

use crate::db_types::{NewUser, UserAccount};

pub async fn insert_user(user: NewUser, conn: &mut SqliteConnection) -> Result<UserAccount, sqlx::Error> {
    let now = Utc::now();
    let user = sqlx::query_as(
        r#"
            INSERT INTO users (name, email, phone, role, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING *;
        "#,
    )
    .bind(user.name)
    .bind(user.email)
    .bind(user.phone)
    .bind(user.role)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(user)
}

pub async fn fetch_user(user_id: i64, conn: &mut SqliteConnection) -> Result<Option<UserAccount>, sqlx::Error> {
    let user = sqlx::query_as("SELECT * FROM users WHERE id = $1").bind(user_id).fetch_optional(conn).await?;
    Ok(user)
}

/// Adjusts the seller aggregates by the given (possibly negative) deltas.
pub async fn adjust_seller_totals(
    seller_id: i64,
    orders_delta: i64,
    sales_delta: i64,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            UPDATE users SET
                total_orders = total_orders + $1,
                total_sales = total_sales + $2,
                updated_at = $3
            WHERE id = $4
        "#,
    )
    .bind(orders_delta)
    .bind(sales_delta)
    .bind(Utc::now())
    .bind(seller_id)
    .execute(conn)
    .await?;
    Ok(())
}
