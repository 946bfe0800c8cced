use crate::{
    db_types::{NewUser, Order, UserAccount},
    traits::MarketplaceError,
};

/// The `AccountManagement` trait defines behaviour for managing user accounts.
///
/// Sellers carry two aggregates, `total_orders` and `total_sales`. These are maintained by the
/// [`crate::traits::MarketplaceDatabase`] order flows and are never written directly.
#[allow(async_fn_in_trait)]
pub trait AccountManagement {
    async fn insert_user(&self, user: NewUser) -> Result<UserAccount, MarketplaceError>;

    /// Fetches the user account with the given id. If no account exists, `None` is returned.
    async fn fetch_user(&self, user_id: i64) -> Result<Option<UserAccount>, MarketplaceError>;

    /// All orders placed by the given buyer, most recent first.
    async fn fetch_orders_for_buyer(&self, buyer_id: i64) -> Result<Vec<Order>, MarketplaceError>;
}
