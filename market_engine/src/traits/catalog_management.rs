use crate::{
    db_types::{NewProduct, Product, ProductStatus},
    traits::MarketplaceError,
};

/// Management of the product catalog. Stock and sales counters are only changed by the order flows.
#[allow(async_fn_in_trait)]
pub trait CatalogManagement {
    /// Stores a new product. New products start in the `Pending` moderation state.
    async fn insert_product(&self, product: NewProduct) -> Result<Product, MarketplaceError>;

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, MarketplaceError>;

    /// Fetches the products with the given ids. Ids that do not exist are silently skipped.
    async fn fetch_products(&self, product_ids: &[i64]) -> Result<Vec<Product>, MarketplaceError>;

    /// Sets the moderation status of a product. A rejection reason is only stored for `Rejected` products.
    async fn set_product_status(
        &self,
        product_id: i64,
        status: ProductStatus,
        rejection_reason: Option<String>,
    ) -> Result<Product, MarketplaceError>;

    async fn set_product_availability(&self, product_id: i64, is_available: bool)
        -> Result<Product, MarketplaceError>;
}
