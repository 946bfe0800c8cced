use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{
        FullOrder,
        NewLogisticsEntry,
        NewOrder,
        Order,
        OrderId,
        OrderStatus,
        PaymentCapture,
        RefundRecord,
    },
    traits::{data_objects::PaymentUpdate, AccountManagement, CatalogManagement},
};

/// This trait defines the highest level of behaviour for backends supporting the marketplace engine.
///
/// Every mutating method is a single atomic unit of work: either all of its effects (order row, line items, stock,
/// seller aggregates, timeline) are persisted, or none are.
///
/// Status changes are compare-and-set operations. A backend must only apply a change if the order is still in the
/// state the caller observed, so that concurrent requests (e.g. a checkout callback racing a webhook) can never both
/// apply the same transition.
#[allow(async_fn_in_trait)]
pub trait MarketplaceDatabase: Clone + CatalogManagement + AccountManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Takes a priced order, and in a single atomic transaction:
    /// * decrements stock (and increments sales) for every line item, failing if any product is no longer approved,
    ///   available, priced as quoted, or has insufficient stock,
    /// * stores the order and its line items with `Pending`/`Pending` status,
    /// * increments `total_orders` once for every distinct seller and `total_sales` by the units sold,
    /// * appends the "Order Placed" timeline entry.
    async fn create_order(&self, order: NewOrder) -> Result<FullOrder, MarketplaceError>;

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<FullOrder>, MarketplaceError>;

    /// Fetches the order linked to the given gateway order reference.
    async fn fetch_order_by_gateway_order_id(&self, gateway_order_id: &str)
        -> Result<Option<FullOrder>, MarketplaceError>;

    /// Fetches the order whose payment was captured with the given gateway payment reference.
    async fn fetch_order_by_gateway_payment_id(
        &self,
        gateway_payment_id: &str,
    ) -> Result<Option<FullOrder>, MarketplaceError>;

    /// Moves an order from `from` to `to` and appends `entry` to its timeline.
    ///
    /// This does not validate the transition table. That is the job of the caller. It does guarantee that the order
    /// is still in status `from`. If it is not, [`MarketplaceError::InvalidStatusTransition`] is returned with the
    /// current status. Moving to `Delivered` stamps `delivered_at`.
    ///
    /// Cancellation has side effects, so must go through [`Self::cancel_order`] instead.
    async fn update_order_status(
        &self,
        order_id: &OrderId,
        from: OrderStatus,
        to: OrderStatus,
        entry: NewLogisticsEntry,
    ) -> Result<FullOrder, MarketplaceError>;

    /// Cancels an order, in a single atomic transaction:
    /// * the order must not be `Delivered` or `Cancelled` ([`MarketplaceError::InvalidState`] otherwise),
    /// * status becomes `Cancelled`, with `cancelled_at` and `cancellation_reason` set,
    /// * stock is returned and sales reversed for every line item,
    /// * seller aggregates are reversed,
    /// * a "Cancelled" entry is appended to the timeline.
    ///
    /// The payment status is left unchanged.
    async fn cancel_order(&self, order_id: &OrderId, reason: &str) -> Result<FullOrder, MarketplaceError>;

    /// Links a gateway order to this order. An order keeps the first gateway order linked to it, so if one is already
    /// linked, the order is returned unchanged. Fails with [`MarketplaceError::AlreadyPaid`] if the payment has already
    /// been captured or refunded.
    async fn attach_gateway_order(
        &self,
        order_id: &OrderId,
        gateway_order_id: &str,
    ) -> Result<FullOrder, MarketplaceError>;

    /// Records a captured payment.
    ///
    /// Only applies when the payment status is `Pending` or `Failed`. Sets the payment status to `Paid` and stores the
    /// payment references. If the order is still `Pending` it moves to `Confirmed`. A "Payment Confirmed" entry is
    /// appended to the timeline.
    ///
    /// Returns `Unchanged` if the payment was already recorded. It is an error to capture a payment for an order that
    /// has been refunded.
    async fn mark_order_paid(
        &self,
        order_id: &OrderId,
        capture: PaymentCapture,
    ) -> Result<PaymentUpdate, MarketplaceError>;

    /// Records a failed payment attempt.
    ///
    /// Only applies when the payment status is `Pending`. A failure never demotes a `Paid` or `Refunded` payment, and
    /// repeated failures do not append further timeline entries.
    async fn mark_payment_failed(&self, order_id: &OrderId, reason: &str) -> Result<PaymentUpdate, MarketplaceError>;

    /// Records a refund, in a single atomic transaction.
    ///
    /// Only applies when the payment status is `Paid`. The payment becomes `Refunded` and the refund reference is
    /// stored. An order that is not yet delivered or cancelled is cancelled, with the same side effects as
    /// [`Self::cancel_order`]. A "Payment Refunded" entry is appended to the timeline.
    ///
    /// Returns `Unchanged` if the payment has already been refunded.
    async fn mark_order_refunded(
        &self,
        order_id: &OrderId,
        refund: RefundRecord,
    ) -> Result<PaymentUpdate, MarketplaceError>;

    /// Orders in `Pending` status, with a `Pending` or `Failed` payment, that have not been updated since `cutoff`.
    async fn fetch_stale_unpaid_orders(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, MarketplaceError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), MarketplaceError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum MarketplaceError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("Invalid request. {0}")]
    ValidationError(String),
    #[error("The requested product {0} does not exist")]
    ProductNotFound(i64),
    #[error("Product {0} is not available for purchase")]
    ProductUnavailable(i64),
    #[error("Insufficient stock for product {product_id}. Requested {requested}, but only {available} available")]
    InsufficientStock { product_id: i64, requested: i64, available: i64 },
    #[error("The price of product {0} has changed. Please review your order and try again")]
    PriceChanged(i64),
    #[error("The requested user {0} does not exist")]
    UserNotFound(i64),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("No order is linked to the gateway reference {0}")]
    GatewayReferenceNotFound(String),
    #[error("Insufficient permissions. {0}")]
    Forbidden(String),
    #[error("Cannot change order status from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },
    #[error("The requested order change would result in a no-op.")]
    OrderModificationNoOp,
    #[error("{0}")]
    InvalidState(String),
    #[error("Order {0} has already been paid")]
    AlreadyPaid(OrderId),
    #[error("Order {0} does not have a captured payment")]
    MissingPayment(OrderId),
    #[error("Payment signature verification failed")]
    InvalidSignature,
    #[error("The payment gateway is not configured")]
    PaymentGatewayUnavailable,
    #[error("Payment gateway error. {0}")]
    GatewayError(String),
    #[error("Invalid webhook payload. {0}")]
    InvalidWebhookPayload(String),
}

impl From<sqlx::Error> for MarketplaceError {
    fn from(e: sqlx::Error) -> Self {
        MarketplaceError::DatabaseError(e.to_string())
    }
}
