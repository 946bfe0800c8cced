//! Marketplace Engine
//!
//! The marketplace engine holds the core logic of a farm-produce marketplace: it owns the order lifecycle and keeps
//! orders, payments and product stock mutually consistent. It is independent of any HTTP framework.
//!
//! The library is divided into these main sections:
//! 1. Backend contracts ([`mod@traits`]). Database backends implement [`MarketplaceDatabase`] and its supporting
//!    traits; payment providers implement [`PaymentGateway`]. SQLite is the bundled backend ([`SqliteDatabase`]).
//! 2. The public API ([`mke_api`]). Order flow, payment reconciliation, catalog and accounts. Each API is generic over
//!    the backend traits it needs.
//! 3. Events ([`mod@events`]). A simple pub-sub hook system that is notified when orders are created, paid, moved or
//!    cancelled.
//!
//! The data types used by the APIs and the backends are defined in [`db_types`].
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod mke_api;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use mke_api::{
    accounts_api::AccountApi,
    catalog_api::CatalogApi,
    order_flow_api::{OrderFlowApi, UNPAID_EXPIRY_REASON},
    order_objects,
    payment_api::{PaymentApi, REFUND_REASON},
    payment_objects,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{
    AccountManagement,
    CatalogManagement,
    MarketplaceDatabase,
    MarketplaceError,
    PaymentGateway,
    PaymentGatewayError,
    PaymentUpdate,
};
