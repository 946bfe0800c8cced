use serde::{Deserialize, Serialize};

use crate::db_types::{FullOrder, OrderStatus};

/// A new order was placed and its stock reserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    pub order: FullOrder,
}

impl OrderCreatedEvent {
    pub fn new(order: FullOrder) -> Self {
        Self { order }
    }
}

/// Payment for an order was captured. Emitted exactly once per order, no matter how many times the gateway reports
/// the capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order: FullOrder,
}

impl OrderPaidEvent {
    pub fn new(order: FullOrder) -> Self {
        Self { order }
    }
}

/// The fulfilment status of an order moved forward (e.g. `Confirmed` to `Shipped`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusChangedEvent {
    pub order: FullOrder,
    pub old_status: OrderStatus,
}

impl OrderStatusChangedEvent {
    pub fn new(order: FullOrder, old_status: OrderStatus) -> Self {
        Self { order, old_status }
    }
}

/// An order was cancelled, by a user, a refund, or because it expired unpaid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAnnulledEvent {
    pub order: FullOrder,
    pub reason: String,
}

impl OrderAnnulledEvent {
    pub fn new(order: FullOrder, reason: &str) -> Self {
        Self { order, reason: reason.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRefundedEvent {
    pub order: FullOrder,
}

impl PaymentRefundedEvent {
    pub fn new(order: FullOrder) -> Self {
        Self { order }
    }
}
