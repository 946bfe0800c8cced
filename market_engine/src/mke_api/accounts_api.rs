//! Unified API for accessing user accounts.
use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Caller, NewUser, Order, UserAccount},
    traits::{AccountManagement, MarketplaceError},
};

/// The `AccountApi` provides a unified API for accessing accounts.
pub struct AccountApi<B> {
    db: B,
}

impl<B: Debug> Debug for AccountApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccountApi ({:?})", self.db)
    }
}

impl<B> AccountApi<B>
where B: AccountManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn create_user(&self, user: NewUser) -> Result<UserAccount, MarketplaceError> {
        if user.name.trim().is_empty() {
            return Err(MarketplaceError::ValidationError("Name is required".into()));
        }
        let email = user.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(MarketplaceError::ValidationError(format!("'{email}' is not a valid email address")));
        }
        let user = self.db.insert_user(user).await?;
        debug!("👤️ Created {} account #{}", user.role, user.id);
        Ok(user)
    }

    /// Fetches the user account for the given id. If no account exists, `None` is returned.
    pub async fn fetch_user(&self, user_id: i64) -> Result<Option<UserAccount>, MarketplaceError> {
        self.db.fetch_user(user_id).await
    }

    /// The buyer's orders, most recent first.
    pub async fn orders_for_buyer(&self, caller: &Caller, buyer_id: i64) -> Result<Vec<Order>, MarketplaceError> {
        if !caller.is_self_or_admin(buyer_id) {
            return Err(MarketplaceError::Forbidden("You can only view your own orders".into()));
        }
        let orders = self.db.fetch_orders_for_buyer(buyer_id).await?;
        trace!("👤️ {} orders found for buyer #{buyer_id}", orders.len());
        Ok(orders)
    }
}
