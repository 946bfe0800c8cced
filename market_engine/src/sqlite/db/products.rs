use chrono::Utc;
use log::trace;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::db_types::{Money, NewProduct, Product, ProductStatus};

pub async fn insert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, sqlx::Error> {
    let now = Utc::now();
    let product = sqlx::query_as(
        r#"
            INSERT INTO products (seller_id, name, image, farm_name, price, stock, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING *;
        "#,
    )
    .bind(product.seller_id)
    .bind(product.name)
    .bind(product.image)
    .bind(product.farm_name)
    .bind(product.price)
    .bind(product.stock)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(product)
}

pub async fn fetch_product(product_id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    let product =
        sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(product_id).fetch_optional(conn).await?;
    Ok(product)
}

pub async fn fetch_products(product_ids: &[i64], conn: &mut SqliteConnection) -> Result<Vec<Product>, sqlx::Error> {
    if product_ids.is_empty() {
        return Ok(vec![]);
    }
    let mut builder = QueryBuilder::new("SELECT * FROM products WHERE id IN (");
    let mut ids = builder.separated(", ");
    for id in product_ids {
        ids.push_bind(*id);
    }
    ids.push_unseparated(") ORDER BY id");
    trace!("🗃️ Executing query: {}", builder.sql());
    let products = builder.build_query_as::<Product>().fetch_all(conn).await?;
    Ok(products)
}

pub async fn update_status(
    product_id: i64,
    status: ProductStatus,
    rejection_reason: Option<String>,
    conn: &mut SqliteConnection,
) -> Result<Option<Product>, sqlx::Error> {
    let product = sqlx::query_as(
        "UPDATE products SET status = $1, rejection_reason = $2, updated_at = $3 WHERE id = $4 RETURNING *",
    )
    .bind(status)
    .bind(rejection_reason)
    .bind(Utc::now())
    .bind(product_id)
    .fetch_optional(conn)
    .await?;
    Ok(product)
}

pub async fn update_availability(
    product_id: i64,
    is_available: bool,
    conn: &mut SqliteConnection,
) -> Result<Option<Product>, sqlx::Error> {
    let product =
        sqlx::query_as("UPDATE products SET is_available = $1, updated_at = $2 WHERE id = $3 RETURNING *")
            .bind(is_available)
            .bind(Utc::now())
            .bind(product_id)
            .fetch_optional(conn)
            .await?;
    Ok(product)
}

/// Takes `quantity` units out of stock and adds them to the sales counter.
///
/// The update only happens if the product is still approved, available, priced at `quoted_price` and has enough
/// stock. Returns `false` if any of these conditions fail, in which case nothing is changed.
pub async fn reserve_stock(
    product_id: i64,
    quantity: i64,
    quoted_price: Money,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE products SET stock = stock - $1, sales = sales + $1, updated_at = $2
            WHERE id = $3 AND status = 'Approved' AND is_available = 1 AND price = $4 AND stock >= $1
        "#,
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(product_id)
    .bind(quoted_price)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Returns `quantity` units to stock and reverses the matching sales.
pub async fn release_stock(product_id: i64, quantity: i64, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE products SET stock = stock + $1, sales = sales - $1, updated_at = $2 WHERE id = $3")
        .bind(quantity)
        .bind(Utc::now())
        .bind(product_id)
        .execute(conn)
        .await?;
    trace!("🗃️ Released {quantity} units of product #{product_id} back into stock");
    Ok(())
}
