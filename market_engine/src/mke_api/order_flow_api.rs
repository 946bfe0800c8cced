use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;
use mkt_common::DEFAULT_CURRENCY_CODE;

use crate::{
    db_types::{
        Caller,
        FullOrder,
        NewLineItem,
        NewLogisticsEntry,
        NewOrder,
        OrderId,
        OrderStatus,
        PaymentStatus,
        Role,
    },
    events::{EventProducers, OrderAnnulledEvent, OrderCreatedEvent, OrderStatusChangedEvent},
    helpers::OrderTotals,
    mke_api::order_objects::{NewOrderRequest, UpdateStatusRequest},
    traits::{ExpiryResult, MarketplaceDatabase, MarketplaceError},
};

/// The cancellation reason recorded by the expiry worker
pub const UNPAID_EXPIRY_REASON: &str = "Payment not received in time";

/// `OrderFlowApi` is the primary API for the order lifecycle: placing orders, moving them through fulfilment, and
/// cancelling them.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
    currency: String,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers, currency: DEFAULT_CURRENCY_CODE.to_string() }
    }

    /// Sets the currency that new orders are priced in.
    pub fn with_currency<S: Into<String>>(mut self, currency: S) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}

impl<B> OrderFlowApi<B>
where B: MarketplaceDatabase
{
    /// Places a new order.
    ///
    /// All requested products must exist, be approved and available, and have enough stock. Otherwise the whole
    /// order is rejected. Prices are snapshotted from the catalog, and stock is reserved in the same transaction that
    /// stores the order.
    pub async fn create_order(&self, caller: &Caller, request: NewOrderRequest) -> Result<FullOrder, MarketplaceError> {
        if !caller.is_self_or_admin(request.buyer_id) {
            return Err(MarketplaceError::Forbidden("You can only place orders for yourself".into()));
        }
        if request.items.is_empty() {
            return Err(MarketplaceError::ValidationError("An order must contain at least one item".into()));
        }
        if let Some(item) = request.items.iter().find(|i| i.quantity < 1) {
            return Err(MarketplaceError::ValidationError(format!(
                "Quantity for product {} must be at least 1",
                item.product_id
            )));
        }
        let missing = request.shipping_address.missing_fields();
        if !missing.is_empty() {
            return Err(MarketplaceError::ValidationError(format!(
                "Shipping address is incomplete. Missing: {}",
                missing.join(", ")
            )));
        }
        let buyer =
            self.db.fetch_user(request.buyer_id).await?.ok_or(MarketplaceError::UserNotFound(request.buyer_id))?;
        if !matches!(buyer.role, Role::Buyer | Role::Admin) {
            return Err(MarketplaceError::Forbidden(format!("A {} account cannot place orders", buyer.role)));
        }

        let requested = request.merged_items()?;
        let ids = requested.iter().map(|i| i.product_id).collect::<Vec<_>>();
        let products = self.db.fetch_products(&ids).await?;
        let mut items = Vec::with_capacity(requested.len());
        for item in &requested {
            let product = products.iter().find(|p| p.id == item.product_id).ok_or_else(|| {
                MarketplaceError::ValidationError(format!("Product {} does not exist", item.product_id))
            })?;
            if !product.is_purchasable() {
                return Err(MarketplaceError::ProductUnavailable(product.id));
            }
            if item.quantity > product.stock {
                return Err(MarketplaceError::InsufficientStock {
                    product_id: product.id,
                    requested: item.quantity,
                    available: product.stock,
                });
            }
            items.push(NewLineItem::from_product(product, item.quantity));
        }

        let totals = OrderTotals::for_items(&items);
        let order = NewOrder {
            order_id: OrderId::generate(),
            buyer_id: buyer.id,
            buyer_name: buyer.name,
            buyer_email: buyer.email,
            buyer_phone: buyer.phone,
            shipping_address: request.shipping_address,
            items,
            subtotal: totals.subtotal,
            tax: totals.tax,
            shipping: totals.shipping,
            total_amount: totals.total,
            currency: self.currency.clone(),
            created_at: Utc::now(),
        };
        let order = self.db.create_order(order).await?;
        info!(
            "🔄️📦️ Order [{}] placed by buyer #{} for {} {}",
            order.order_id(),
            order.order.buyer_id,
            order.order.total_amount,
            order.order.currency
        );
        self.producers.publish_order_created(OrderCreatedEvent::new(order.clone())).await;
        Ok(order)
    }

    /// Fetches an order. Only the buyer and admins may see it.
    pub async fn fetch_order(&self, caller: &Caller, order_id: &OrderId) -> Result<FullOrder, MarketplaceError> {
        let order = self.db.fetch_order(order_id).await?.ok_or_else(|| MarketplaceError::OrderNotFound(order_id.clone()))?;
        if !caller.is_self_or_admin(order.order.buyer_id) {
            return Err(MarketplaceError::Forbidden(format!("Order {order_id} does not belong to you")));
        }
        Ok(order)
    }

    /// Moves an order to a new fulfilment status, appending an entry to its timeline.
    ///
    /// Only transitions in the [`OrderStatus`] transition table are allowed. A request to move to `Cancelled` is
    /// handled by [`Self::cancel_order`], so that stock is released.
    pub async fn update_order_status(
        &self,
        caller: &Caller,
        order_id: &OrderId,
        request: UpdateStatusRequest,
    ) -> Result<FullOrder, MarketplaceError> {
        let order = self.fetch_order(caller, order_id).await?;
        let current = order.order.status;
        let next = request.status;
        if current == next {
            return Err(MarketplaceError::OrderModificationNoOp);
        }
        if !current.can_transition_to(next) {
            return Err(MarketplaceError::InvalidStatusTransition { from: current, to: next });
        }
        if next == OrderStatus::Cancelled {
            return self.cancel_order(caller, order_id, request.description).await;
        }
        let entry = NewLogisticsEntry::for_status(next, request.description, request.location);
        let updated = self.db.update_order_status(order_id, current, next, entry).await?;
        info!("🔄️📦️ Order [{order_id}] moved from {current} to {next}");
        self.producers.publish_status_changed(OrderStatusChangedEvent::new(updated.clone(), current)).await;
        Ok(updated)
    }

    /// Cancels an order and returns its stock to the catalog.
    ///
    /// Delivered and cancelled orders cannot be cancelled. The payment status is not touched. If the order has been
    /// paid, a refund must be issued separately.
    pub async fn cancel_order(
        &self,
        caller: &Caller,
        order_id: &OrderId,
        reason: Option<String>,
    ) -> Result<FullOrder, MarketplaceError> {
        let order = self.fetch_order(caller, order_id).await?;
        if order.order.status.is_terminal() {
            return Err(MarketplaceError::InvalidState(format!(
                "Order {order_id} is {} and can no longer be cancelled",
                order.order.status
            )));
        }
        let reason = reason.filter(|r| !r.trim().is_empty()).unwrap_or_else(|| match caller.role {
            Role::Admin => "Cancelled by admin".to_string(),
            _ => "Cancelled by buyer".to_string(),
        });
        if order.order.payment_status == PaymentStatus::Paid {
            warn!("🔄️📦️ Order [{order_id}] is being cancelled, but it has been paid. A refund is outstanding.");
        }
        let cancelled = self.db.cancel_order(order_id, &reason).await?;
        info!("🔄️📦️ Order [{order_id}] cancelled by user #{}. {reason}", caller.user_id);
        self.producers.publish_order_annulled(OrderAnnulledEvent::new(cancelled.clone(), &reason)).await;
        Ok(cancelled)
    }

    /// Cancels orders that are still awaiting payment and have not been touched for longer than `timeout`.
    ///
    /// Each order is cancelled in its own transaction, so one failure does not hold up the rest.
    pub async fn expire_unpaid_orders(&self, timeout: Duration) -> Result<ExpiryResult, MarketplaceError> {
        let cutoff = Utc::now() - timeout;
        let stale = self.db.fetch_stale_unpaid_orders(cutoff).await?;
        let mut result = ExpiryResult::default();
        for order in stale {
            match self.db.cancel_order(&order.order_id, UNPAID_EXPIRY_REASON).await {
                Ok(cancelled) => {
                    debug!("🔄️📦️ Unpaid order [{}] expired", order.order_id);
                    self.producers.publish_order_annulled(OrderAnnulledEvent::new(cancelled, UNPAID_EXPIRY_REASON)).await;
                    result.cancelled.push(order.order_id);
                },
                Err(e) => {
                    warn!("🔄️📦️ Could not expire order [{}]. {e}", order.order_id);
                    result.failed.push((order.order_id, e.to_string()));
                },
            }
        }
        Ok(result)
    }
}
