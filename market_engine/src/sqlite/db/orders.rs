use chrono::{DateTime, Utc};
use log::debug;
use sqlx::{types::Json, SqliteConnection};

use crate::db_types::{LineItem, NewLineItem, NewOrder, Order, OrderId, OrderStatus, PaymentCapture};

/// Inserts the order header using the given connection. This is not atomic. Embed the call inside a transaction,
/// together with the line items, stock updates and timeline entry.
pub async fn insert_order(order: &NewOrder, conn: &mut SqliteConnection) -> Result<Order, sqlx::Error> {
    let order: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                buyer_id,
                buyer_name,
                buyer_email,
                buyer_phone,
                shipping_address,
                subtotal,
                tax,
                shipping,
                total_amount,
                currency,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)
            RETURNING *;
        "#,
    )
    .bind(order.order_id.as_str())
    .bind(order.buyer_id)
    .bind(&order.buyer_name)
    .bind(&order.buyer_email)
    .bind(&order.buyer_phone)
    .bind(Json(&order.shipping_address))
    .bind(order.subtotal)
    .bind(order.tax)
    .bind(order.shipping)
    .bind(order.total_amount)
    .bind(&order.currency)
    .bind(order.created_at)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Order [{}] inserted with id {}", order.order_id, order.id);
    Ok(order)
}

pub async fn insert_line_item(
    order_id: &OrderId,
    item: &NewLineItem,
    conn: &mut SqliteConnection,
) -> Result<LineItem, sqlx::Error> {
    let item = sqlx::query_as(
        r#"
            INSERT INTO order_items (
                order_id,
                product_id,
                seller_id,
                product_name,
                product_image,
                farm_name,
                unit_price,
                quantity,
                line_total
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *;
        "#,
    )
    .bind(order_id.as_str())
    .bind(item.product_id)
    .bind(item.seller_id)
    .bind(&item.product_name)
    .bind(&item.product_image)
    .bind(&item.farm_name)
    .bind(item.unit_price)
    .bind(item.quantity)
    .bind(item.line_total())
    .fetch_one(conn)
    .await?;
    Ok(item)
}

pub async fn fetch_line_items(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<LineItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(items)
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_by_gateway_order_id(
    gateway_order_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE gateway_order_id = $1")
        .bind(gateway_order_id)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub async fn fetch_order_by_gateway_payment_id(
    gateway_payment_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE gateway_payment_id = $1")
        .bind(gateway_payment_id)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

/// All orders for the buyer, most recent first.
pub async fn fetch_orders_for_buyer(buyer_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as("SELECT * FROM orders WHERE buyer_id = $1 ORDER BY created_at DESC, id DESC")
        .bind(buyer_id)
        .fetch_all(conn)
        .await?;
    Ok(orders)
}

/// Sets the order status to `to`, provided that it is currently `from`. Returns `false` if the order was not in
/// status `from`.
pub async fn update_status_if(
    order_id: &OrderId,
    from: OrderStatus,
    to: OrderStatus,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let now = Utc::now();
    let delivered_at = (to == OrderStatus::Delivered).then_some(now);
    let result = sqlx::query(
        r#"
            UPDATE orders SET status = $1, delivered_at = COALESCE($2, delivered_at), updated_at = $3
            WHERE order_id = $4 AND status = $5
        "#,
    )
    .bind(to)
    .bind(delivered_at)
    .bind(now)
    .bind(order_id.as_str())
    .bind(from)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Marks the order as cancelled, provided that it is not already delivered or cancelled.
pub async fn cancel_if_open(order_id: &OrderId, reason: &str, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
            UPDATE orders SET status = 'Cancelled', cancelled_at = $1, cancellation_reason = $2, updated_at = $1
            WHERE order_id = $3 AND status NOT IN ('Delivered', 'Cancelled')
        "#,
    )
    .bind(now)
    .bind(reason)
    .bind(order_id.as_str())
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Links the gateway order, provided that payment has not been captured and no gateway order is linked yet.
pub async fn set_gateway_order_id(
    order_id: &OrderId,
    gateway_order_id: &str,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE orders SET gateway_order_id = $1, updated_at = $2
            WHERE order_id = $3 AND payment_status IN ('Pending', 'Failed') AND gateway_order_id IS NULL
        "#,
    )
    .bind(gateway_order_id)
    .bind(Utc::now())
    .bind(order_id.as_str())
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Records the captured payment, provided that the payment is `Pending` or `Failed`. A `Pending` order is moved to
/// `Confirmed` in the same statement.
pub async fn mark_paid_if_unpaid(
    order_id: &OrderId,
    capture: &PaymentCapture,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE orders SET
                payment_status = 'Paid',
                status = CASE WHEN status = 'Pending' THEN 'Confirmed' ELSE status END,
                gateway_payment_id = $1,
                payment_id = $2,
                updated_at = $3
            WHERE order_id = $4 AND payment_status IN ('Pending', 'Failed')
        "#,
    )
    .bind(&capture.gateway_payment_id)
    .bind(&capture.payment_id)
    .bind(Utc::now())
    .bind(order_id.as_str())
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Marks the payment as failed, provided that it is still `Pending`.
pub async fn mark_failed_if_pending(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE orders SET payment_status = 'Failed', updated_at = $1
            WHERE order_id = $2 AND payment_status = 'Pending'
        "#,
    )
    .bind(Utc::now())
    .bind(order_id.as_str())
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Marks the payment as refunded, provided that it is currently `Paid`.
pub async fn mark_refunded_if_paid(
    order_id: &OrderId,
    refund_id: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE orders SET payment_status = 'Refunded', refund_id = COALESCE($1, refund_id), updated_at = $2
            WHERE order_id = $3 AND payment_status = 'Paid'
        "#,
    )
    .bind(refund_id)
    .bind(Utc::now())
    .bind(order_id.as_str())
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// `Pending` orders whose payment is `Pending` or `Failed`, and that have not been updated since `cutoff`.
/// Oldest first.
pub async fn fetch_stale_unpaid_orders(
    cutoff: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as(
        r#"
            SELECT * FROM orders
            WHERE status = 'Pending' AND payment_status IN ('Pending', 'Failed') AND updated_at < $1
            ORDER BY updated_at ASC
        "#,
    )
    .bind(cutoff)
    .fetch_all(conn)
    .await?;
    Ok(orders)
}
