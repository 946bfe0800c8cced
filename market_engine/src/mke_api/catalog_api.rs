use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Caller, NewProduct, Product, ProductStatus, Role},
    traits::{AccountManagement, CatalogManagement, MarketplaceError},
};

/// Product listings and moderation. Only approved, available products can be ordered.
pub struct CatalogApi<B> {
    db: B,
}

impl<B: Debug> Debug for CatalogApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CatalogApi ({:?})", self.db)
    }
}

impl<B> CatalogApi<B>
where B: CatalogManagement + AccountManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Lists a new product. Farmers may only list products for themselves. New listings await moderation.
    pub async fn create_product(&self, caller: &Caller, product: NewProduct) -> Result<Product, MarketplaceError> {
        if !matches!(caller.role, Role::Farmer | Role::Admin) {
            return Err(MarketplaceError::Forbidden("Only farmers can list products".into()));
        }
        if !caller.is_self_or_admin(product.seller_id) {
            return Err(MarketplaceError::Forbidden("You can only list products for yourself".into()));
        }
        if product.name.trim().is_empty() {
            return Err(MarketplaceError::ValidationError("Product name is required".into()));
        }
        if product.price.is_negative() {
            return Err(MarketplaceError::ValidationError("Price cannot be negative".into()));
        }
        if product.stock < 0 {
            return Err(MarketplaceError::ValidationError("Stock cannot be negative".into()));
        }
        let seller =
            self.db.fetch_user(product.seller_id).await?.ok_or(MarketplaceError::UserNotFound(product.seller_id))?;
        if seller.role != Role::Farmer {
            return Err(MarketplaceError::ValidationError(format!("User #{} is not a farmer", seller.id)));
        }
        let product = self.db.insert_product(product).await?;
        info!("💻️ Product #{} listed by farmer #{}", product.id, product.seller_id);
        Ok(product)
    }

    pub async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, MarketplaceError> {
        self.db.fetch_product(product_id).await
    }

    pub async fn approve_product(&self, caller: &Caller, product_id: i64) -> Result<Product, MarketplaceError> {
        if !caller.is_admin() {
            return Err(MarketplaceError::Forbidden("Only admins can moderate products".into()));
        }
        let product = self.db.set_product_status(product_id, ProductStatus::Approved, None).await?;
        info!("💻️ Product #{product_id} approved by admin #{}", caller.user_id);
        Ok(product)
    }

    /// Rejects a product. Rejected products are also taken off sale.
    pub async fn reject_product(
        &self,
        caller: &Caller,
        product_id: i64,
        reason: String,
    ) -> Result<Product, MarketplaceError> {
        if !caller.is_admin() {
            return Err(MarketplaceError::Forbidden("Only admins can moderate products".into()));
        }
        if reason.trim().is_empty() {
            return Err(MarketplaceError::ValidationError("A rejection reason is required".into()));
        }
        self.db.set_product_status(product_id, ProductStatus::Rejected, Some(reason)).await?;
        let product = self.db.set_product_availability(product_id, false).await?;
        info!("💻️ Product #{product_id} rejected by admin #{}", caller.user_id);
        Ok(product)
    }

    /// Puts a product on or off sale. Only the farmer who listed it, or an admin, may do this.
    pub async fn set_availability(
        &self,
        caller: &Caller,
        product_id: i64,
        is_available: bool,
    ) -> Result<Product, MarketplaceError> {
        let product = self.db.fetch_product(product_id).await?.ok_or(MarketplaceError::ProductNotFound(product_id))?;
        if !caller.is_self_or_admin(product.seller_id) {
            return Err(MarketplaceError::Forbidden(format!("Product #{product_id} does not belong to you")));
        }
        let product = self.db.set_product_availability(product_id, is_available).await?;
        debug!("💻️ Product #{product_id} availability set to {is_available}");
        Ok(product)
    }
}
