use serde::{Deserialize, Serialize};

use crate::db_types::{FullOrder, OrderId};

/// The result of a payment state change.
///
/// Gateway callbacks and webhooks can be delivered more than once. A change that has already been applied is
/// reported as `Unchanged`, and must not trigger any side effects (timeline entries, events).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PaymentUpdate {
    Applied(FullOrder),
    Unchanged(FullOrder),
}

impl PaymentUpdate {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    pub fn order(&self) -> &FullOrder {
        match self {
            Self::Applied(o) | Self::Unchanged(o) => o,
        }
    }

    pub fn into_order(self) -> FullOrder {
        match self {
            Self::Applied(o) | Self::Unchanged(o) => o,
        }
    }
}

/// The outcome of an unpaid-order expiry sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpiryResult {
    pub cancelled: Vec<OrderId>,
    /// Orders that were selected for expiry but could not be cancelled, with the reason.
    pub failed: Vec<(OrderId, String)>,
}

impl ExpiryResult {
    pub fn is_empty(&self) -> bool {
        self.cancelled.is_empty() && self.failed.is_empty()
    }
}
