use serde::{Deserialize, Serialize};

use crate::db_types::{Money, OrderId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentOrderRequest {
    pub order_id: OrderId,
    /// If given, must equal the order total. Written in major units, e.g. `395.5`.
    #[serde(default)]
    pub amount: Option<Money>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// Everything a client needs to open the gateway's checkout. The key secret is never included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentOrderResponse {
    pub order_id: OrderId,
    pub gateway_order_id: String,
    pub amount: Money,
    pub currency: String,
    pub key_id: String,
}

/// The checkout callback, as posted back by the client after a successful payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyPaymentRequest {
    pub order_id: OrderId,
    #[serde(alias = "razorpay_order_id")]
    pub gateway_order_id: String,
    #[serde(alias = "razorpay_payment_id")]
    pub gateway_payment_id: String,
    #[serde(alias = "razorpay_signature")]
    pub signature: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefundRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

//--------------------------------------    Webhook payloads   ---------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub payload: WebhookPayload,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub payment: Option<Entity<PaymentEntity>>,
    #[serde(default)]
    pub refund: Option<Entity<RefundEntity>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity<T> {
    pub entity: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEntity {
    pub id: String,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    /// The notes given when the gateway order was created. The gateway sends an empty array when there are none.
    #[serde(default)]
    pub notes: Option<serde_json::Value>,
}

impl PaymentEntity {
    pub fn note(&self, key: &str) -> Option<&str> {
        self.notes.as_ref()?.get(key)?.as_str()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundEntity {
    pub id: String,
    #[serde(default)]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub amount: Option<i64>,
}

/// What happened to a webhook event whose signature checked out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WebhookOutcome {
    /// The event changed the state of the order
    Applied(OrderId),
    /// The event had already been applied
    Unchanged(OrderId),
    /// An event type we don't act on
    Ignored(String),
    /// The event could not be processed. The reason has been logged.
    Failed(String),
}
