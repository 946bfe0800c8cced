use std::collections::HashMap;

use mkt_common::Secret;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{db_types::Money, traits::MarketplaceError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewGatewayOrder {
    pub amount: Money,
    pub currency: String,
    /// Our own order id
    pub receipt: String,
    pub notes: HashMap<String, String>,
}

/// An order created on the payment gateway. The client uses this to open the gateway's checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: Money,
    pub currency: String,
    pub receipt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayRefund {
    pub id: String,
    pub payment_id: String,
    pub amount: Money,
}

#[derive(Debug, Clone, Error)]
pub enum PaymentGatewayError {
    #[error("The payment gateway is not configured")]
    NotConfigured,
    #[error("The payment gateway rejected the request. {0}")]
    Rejected(String),
    #[error("Could not communicate with the payment gateway. {0}")]
    CommunicationError(String),
}

impl From<PaymentGatewayError> for MarketplaceError {
    fn from(e: PaymentGatewayError) -> Self {
        match e {
            PaymentGatewayError::NotConfigured => MarketplaceError::PaymentGatewayUnavailable,
            e => MarketplaceError::GatewayError(e.to_string()),
        }
    }
}

/// The seam between the engine and an external payment provider.
///
/// Implementations are expected to be cheap to clone (e.g. wrapping a shared HTTP client).
#[allow(async_fn_in_trait)]
pub trait PaymentGateway: Clone {
    /// The public key id, handed to clients so that they can open the checkout.
    fn key_id(&self) -> String;

    /// The secret used to sign checkout callbacks.
    fn key_secret(&self) -> Secret<String>;

    async fn create_order(&self, order: NewGatewayOrder) -> Result<GatewayOrder, PaymentGatewayError>;

    /// Refunds `amount` of the captured payment `gateway_payment_id`.
    async fn refund_payment(
        &self,
        gateway_payment_id: &str,
        amount: Money,
        notes: HashMap<String, String>,
    ) -> Result<GatewayRefund, PaymentGatewayError>;
}
