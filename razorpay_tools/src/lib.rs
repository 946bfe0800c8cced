//! # Razorpay tools
//!
//! A thin client for the parts of the Razorpay REST API that the marketplace needs:
//! * creating gateway-side orders that the buyer then pays against, and
//! * refunding captured payments.
//!
//! Signature verification for checkout confirmations and webhooks is *not* done here. It only needs the shared
//! secrets and lives with the payment reconciliation logic in `market_engine`.
mod api;
mod config;
mod data_objects;
mod error;

pub use api::RazorpayApi;
pub use config::RazorpayConfig;
pub use data_objects::{NewRazorpayOrder, NewRefund, RazorpayOrder, RazorpayRefund};
pub use error::RazorpayApiError;
