//! `SqliteDatabase` is a concrete implementation of a marketplace engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module. Every state change runs inside a single transaction, and uses guarded `UPDATE` statements so that a change
//! is only applied if the row is still in the state that was observed.
use std::{collections::BTreeMap, fmt::Debug};

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{SqliteConnection, SqlitePool};

use super::db::{db_url, new_pool, orders, products, timeline, user_accounts};
use crate::{
    db_types::{
        FullOrder,
        NewLineItem,
        NewLogisticsEntry,
        NewOrder,
        NewProduct,
        NewUser,
        Order,
        OrderId,
        OrderStatus,
        PaymentCapture,
        PaymentStatus,
        Product,
        ProductStatus,
        RefundRecord,
        UserAccount,
    },
    traits::{AccountManagement, CatalogManagement, MarketplaceDatabase, MarketplaceError, PaymentUpdate},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

async fn full_order(order: Order, conn: &mut SqliteConnection) -> Result<FullOrder, sqlx::Error> {
    let items = orders::fetch_line_items(&order.order_id, &mut *conn).await?;
    let timeline = timeline::fetch_timeline(&order.order_id, &mut *conn).await?;
    Ok(FullOrder { order, items, timeline })
}

async fn fetch_full_order(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<FullOrder, MarketplaceError> {
    let order = orders::fetch_order_by_order_id(order_id, &mut *conn)
        .await?
        .ok_or_else(|| MarketplaceError::OrderNotFound(order_id.clone()))?;
    Ok(full_order(order, conn).await?)
}

/// Units sold per seller
fn units_per_seller<I: IntoIterator<Item = (i64, i64)>>(items: I) -> BTreeMap<i64, i64> {
    items.into_iter().fold(BTreeMap::new(), |mut acc, (seller_id, quantity)| {
        *acc.entry(seller_id).or_insert(0) += quantity;
        acc
    })
}

/// Works out why a stock reservation was refused.
fn reservation_failure(item: &NewLineItem, product: Option<Product>) -> MarketplaceError {
    match product {
        None => MarketplaceError::ProductNotFound(item.product_id),
        Some(p) if !p.is_purchasable() => MarketplaceError::ProductUnavailable(p.id),
        Some(p) if p.price != item.unit_price => MarketplaceError::PriceChanged(p.id),
        Some(p) => {
            MarketplaceError::InsufficientStock { product_id: p.id, requested: item.quantity, available: p.stock }
        },
    }
}

/// Returns the stock held by the order's line items, and reverses the seller aggregates.
async fn release_order_items(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    let items = orders::fetch_line_items(order_id, &mut *conn).await?;
    for item in &items {
        products::release_stock(item.product_id, item.quantity, &mut *conn).await?;
    }
    for (seller_id, units) in units_per_seller(items.iter().map(|i| (i.seller_id, i.quantity))) {
        user_accounts::adjust_seller_totals(seller_id, -1, -units, &mut *conn).await?;
    }
    debug!("🗃️ Stock and seller totals restored for {} line items of order [{order_id}]", items.len());
    Ok(())
}

impl MarketplaceDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn create_order(&self, order: NewOrder) -> Result<FullOrder, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        for item in &order.items {
            if !products::reserve_stock(item.product_id, item.quantity, item.unit_price, &mut tx).await? {
                let product = products::fetch_product(item.product_id, &mut tx).await?;
                // Dropping the transaction rolls back any reservations already made
                return Err(reservation_failure(item, product));
            }
        }
        let header = orders::insert_order(&order, &mut tx).await?;
        let mut items = Vec::with_capacity(order.items.len());
        for item in &order.items {
            items.push(orders::insert_line_item(&header.order_id, item, &mut tx).await?);
        }
        for (seller_id, units) in units_per_seller(order.items.iter().map(|i| (i.seller_id, i.quantity))) {
            user_accounts::adjust_seller_totals(seller_id, 1, units, &mut tx).await?;
        }
        let entry = timeline::append_entry(&header.order_id, NewLogisticsEntry::order_placed(), &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order [{}] created with {} line items", header.order_id, items.len());
        Ok(FullOrder { order: header, items, timeline: vec![entry] })
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<FullOrder>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        match orders::fetch_order_by_order_id(order_id, &mut conn).await? {
            Some(order) => Ok(Some(full_order(order, &mut conn).await?)),
            None => Ok(None),
        }
    }

    async fn fetch_order_by_gateway_order_id(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<FullOrder>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        match orders::fetch_order_by_gateway_order_id(gateway_order_id, &mut conn).await? {
            Some(order) => Ok(Some(full_order(order, &mut conn).await?)),
            None => Ok(None),
        }
    }

    async fn fetch_order_by_gateway_payment_id(
        &self,
        gateway_payment_id: &str,
    ) -> Result<Option<FullOrder>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        match orders::fetch_order_by_gateway_payment_id(gateway_payment_id, &mut conn).await? {
            Some(order) => Ok(Some(full_order(order, &mut conn).await?)),
            None => Ok(None),
        }
    }

    async fn update_order_status(
        &self,
        order_id: &OrderId,
        from: OrderStatus,
        to: OrderStatus,
        entry: NewLogisticsEntry,
    ) -> Result<FullOrder, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        if !orders::update_status_if(order_id, from, to, &mut tx).await? {
            let current = orders::fetch_order_by_order_id(order_id, &mut tx)
                .await?
                .ok_or_else(|| MarketplaceError::OrderNotFound(order_id.clone()))?;
            debug!("🗃️ Order [{order_id}] is {} rather than {from}. Status not updated", current.status);
            return Err(MarketplaceError::InvalidStatusTransition { from: current.status, to });
        }
        timeline::append_entry(order_id, entry, &mut tx).await?;
        let order = fetch_full_order(order_id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order [{order_id}] moved from {from} to {to}");
        Ok(order)
    }

    async fn cancel_order(&self, order_id: &OrderId, reason: &str) -> Result<FullOrder, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        if !orders::cancel_if_open(order_id, reason, &mut tx).await? {
            let current = orders::fetch_order_by_order_id(order_id, &mut tx)
                .await?
                .ok_or_else(|| MarketplaceError::OrderNotFound(order_id.clone()))?;
            return Err(MarketplaceError::InvalidState(format!(
                "Order {order_id} is {} and can no longer be cancelled",
                current.status
            )));
        }
        release_order_items(order_id, &mut tx).await?;
        timeline::append_entry(order_id, NewLogisticsEntry::cancelled(reason), &mut tx).await?;
        let order = fetch_full_order(order_id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order [{order_id}] cancelled. {reason}");
        Ok(order)
    }

    async fn attach_gateway_order(
        &self,
        order_id: &OrderId,
        gateway_order_id: &str,
    ) -> Result<FullOrder, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        if !orders::set_gateway_order_id(order_id, gateway_order_id, &mut tx).await? {
            let current = fetch_full_order(order_id, &mut tx).await?;
            return match current.order.payment_status {
                PaymentStatus::Pending | PaymentStatus::Failed => Ok(current),
                PaymentStatus::Paid | PaymentStatus::Refunded => Err(MarketplaceError::AlreadyPaid(order_id.clone())),
            };
        }
        let order = fetch_full_order(order_id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order [{order_id}] linked to gateway order {gateway_order_id}");
        Ok(order)
    }

    async fn mark_order_paid(
        &self,
        order_id: &OrderId,
        capture: PaymentCapture,
    ) -> Result<PaymentUpdate, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        if !orders::mark_paid_if_unpaid(order_id, &capture, &mut tx).await? {
            let current = fetch_full_order(order_id, &mut tx).await?;
            return match current.order.payment_status {
                PaymentStatus::Paid => {
                    if current.order.gateway_payment_id.as_deref() != Some(capture.gateway_payment_id.as_str()) {
                        warn!(
                            "🗃️ Order [{order_id}] is already paid with {:?}, but another payment {} was captured for \
                             it. This payment needs to be refunded manually.",
                            current.order.gateway_payment_id, capture.gateway_payment_id
                        );
                    }
                    Ok(PaymentUpdate::Unchanged(current))
                },
                status => Err(MarketplaceError::InvalidState(format!(
                    "Cannot record a payment for order {order_id}, since its payment status is {status}"
                ))),
            };
        }
        timeline::append_entry(order_id, NewLogisticsEntry::payment_confirmed(), &mut tx).await?;
        let order = fetch_full_order(order_id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Payment {} recorded for order [{order_id}]", capture.gateway_payment_id);
        Ok(PaymentUpdate::Applied(order))
    }

    async fn mark_payment_failed(&self, order_id: &OrderId, reason: &str) -> Result<PaymentUpdate, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        if !orders::mark_failed_if_pending(order_id, &mut tx).await? {
            let current = fetch_full_order(order_id, &mut tx).await?;
            trace!("🗃️ Payment failure for order [{order_id}] ignored. Payment is {}", current.order.payment_status);
            return Ok(PaymentUpdate::Unchanged(current));
        }
        timeline::append_entry(order_id, NewLogisticsEntry::payment_failed(reason), &mut tx).await?;
        let order = fetch_full_order(order_id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Payment for order [{order_id}] failed. {reason}");
        Ok(PaymentUpdate::Applied(order))
    }

    async fn mark_order_refunded(
        &self,
        order_id: &OrderId,
        refund: RefundRecord,
    ) -> Result<PaymentUpdate, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        if !orders::mark_refunded_if_paid(order_id, refund.refund_id.as_deref(), &mut tx).await? {
            let current = fetch_full_order(order_id, &mut tx).await?;
            return match current.order.payment_status {
                PaymentStatus::Refunded => Ok(PaymentUpdate::Unchanged(current)),
                _ => Err(MarketplaceError::MissingPayment(order_id.clone())),
            };
        }
        // A refund appends a single timeline entry, which also covers the cancellation
        let cancelled = orders::cancel_if_open(order_id, &refund.reason, &mut tx).await?;
        if cancelled {
            release_order_items(order_id, &mut tx).await?;
            debug!("🗃️ Order [{order_id}] cancelled following a refund");
        }
        let entry = NewLogisticsEntry::payment_refunded(&refund.reason, cancelled);
        timeline::append_entry(order_id, entry, &mut tx).await?;
        let order = fetch_full_order(order_id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Payment for order [{order_id}] refunded");
        Ok(PaymentUpdate::Applied(order))
    }

    async fn fetch_stale_unpaid_orders(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_stale_unpaid_orders(cutoff, &mut conn).await?;
        Ok(orders)
    }

    async fn close(&mut self) -> Result<(), MarketplaceError> {
        self.pool.close().await;
        Ok(())
    }
}

impl CatalogManagement for SqliteDatabase {
    async fn insert_product(&self, product: NewProduct) -> Result<Product, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::insert_product(product, &mut conn).await?;
        debug!("🗃️ Product #{} ({}) added to the catalog", product.id, product.name);
        Ok(product)
    }

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::fetch_product(product_id, &mut conn).await?;
        Ok(product)
    }

    async fn fetch_products(&self, product_ids: &[i64]) -> Result<Vec<Product>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let products = products::fetch_products(product_ids, &mut conn).await?;
        Ok(products)
    }

    async fn set_product_status(
        &self,
        product_id: i64,
        status: ProductStatus,
        rejection_reason: Option<String>,
    ) -> Result<Product, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let reason = rejection_reason.filter(|_| status == ProductStatus::Rejected);
        products::update_status(product_id, status, reason, &mut conn)
            .await?
            .ok_or(MarketplaceError::ProductNotFound(product_id))
    }

    async fn set_product_availability(
        &self,
        product_id: i64,
        is_available: bool,
    ) -> Result<Product, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        products::update_availability(product_id, is_available, &mut conn)
            .await?
            .ok_or(MarketplaceError::ProductNotFound(product_id))
    }
}

impl AccountManagement for SqliteDatabase {
    async fn insert_user(&self, user: NewUser) -> Result<UserAccount, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let email = user.email.clone();
        match user_accounts::insert_user(user, &mut conn).await {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(MarketplaceError::ValidationError(format!("A user with email {email} already exists")))
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn fetch_user(&self, user_id: i64) -> Result<Option<UserAccount>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let user = user_accounts::fetch_user(user_id, &mut conn).await?;
        Ok(user)
    }

    async fn fetch_orders_for_buyer(&self, buyer_id: i64) -> Result<Vec<Order>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_orders_for_buyer(buyer_id, &mut conn).await?;
        Ok(orders)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object, using the URL in `MKT_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date.
    pub async fn migrate(&self) -> Result<(), MarketplaceError> {
        sqlx::migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| MarketplaceError::DatabaseError(format!("Could not run migrations. {e}")))?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
