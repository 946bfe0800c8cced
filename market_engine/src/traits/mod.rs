//! #  Backend contracts
//!
//! This module defines the behaviour that database backends and payment gateways need to expose in order to drive
//! the marketplace engine.
//!
//! * [`MarketplaceDatabase`] is the highest level of behaviour for a database backend. Every order and payment state
//!   change goes through it, and each of its mutating methods is atomic.
//! * [`CatalogManagement`] manages the products that buyers can order.
//! * [`AccountManagement`] provides access to user accounts and the orders that belong to them.
//! * [`PaymentGateway`] is the seam to the external payment provider (order creation and refunds).
mod account_management;
mod catalog_management;
mod data_objects;
mod marketplace_database;
mod payment_gateway;

pub use account_management::AccountManagement;
pub use catalog_management::CatalogManagement;
pub use data_objects::{ExpiryResult, PaymentUpdate};
pub use marketplace_database::{MarketplaceDatabase, MarketplaceError};
pub use payment_gateway::{GatewayOrder, GatewayRefund, NewGatewayOrder, PaymentGateway, PaymentGatewayError};
