//! # Marketplace engine public API
//!
//! The `mke_api` module exposes the programmatic API of the marketplace engine. The API is modular, so that clients
//! can pick and choose the functionality they want.
//!
//! * [`order_flow_api`] owns the order lifecycle: placement, fulfilment status changes, cancellation and expiry.
//! * [`payment_api`] reconciles the order lifecycle with the external payment gateway.
//! * [`catalog_api`] manages product listings and moderation.
//! * [`accounts_api`] provides access to user accounts and order histories.
//!
//! # API usage
//!
//! An API instance is created by supplying a database backend that implements the backend traits required by the API.
//!
//! ```rust,ignore
//! use market_engine::{db_types::Caller, events::EventProducers, OrderFlowApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/market.db", 5).await?;
//! let api = OrderFlowApi::new(db, EventProducers::default());
//! let order = api.fetch_order(&caller, &order_id).await?;
//! ```
pub mod accounts_api;
pub mod catalog_api;
pub mod order_flow_api;
pub mod order_objects;
pub mod payment_api;
pub mod payment_objects;
