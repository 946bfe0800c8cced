//! Payment reconciliation.
//!
//! Payments reach us on two paths that can race each other:
//! 1. The synchronous checkout callback ([`PaymentApi::verify_payment`]), posted by the buyer's client.
//! 2. Asynchronous gateway webhooks ([`PaymentApi::handle_webhook`]), which may be delivered late, out of order or
//!    more than once.
//!
//! Both paths funnel into the same compare-and-set payment transitions on the backend, so whichever arrives second is
//! reported as [`PaymentUpdate::Unchanged`] and has no side effects.
use std::{collections::HashMap, fmt::Debug};

use log::*;
use mkt_common::Secret;

use crate::{
    db_types::{Caller, FullOrder, OrderId, OrderStatus, PaymentCapture, PaymentStatus, RefundRecord},
    events::{EventProducers, OrderAnnulledEvent, OrderPaidEvent, PaymentRefundedEvent},
    helpers::{generate_payment_id, verify_payment_signature, verify_webhook_signature},
    mke_api::payment_objects::{
        CreatePaymentOrderRequest,
        PaymentEntity,
        PaymentOrderResponse,
        VerifyPaymentRequest,
        WebhookEvent,
        WebhookOutcome,
    },
    traits::{MarketplaceDatabase, MarketplaceError, NewGatewayOrder, PaymentGateway, PaymentUpdate},
};

pub const REFUND_REASON: &str = "Payment refunded";
const DEFAULT_FAILURE_REASON: &str = "Payment failed at the gateway";

pub struct PaymentApi<B, G> {
    db: B,
    gateway: Option<G>,
    webhook_secret: Option<Secret<String>>,
    producers: EventProducers,
}

impl<B, G> Debug for PaymentApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentApi (gateway configured: {})", self.gateway.is_some())
    }
}

impl<B, G> PaymentApi<B, G> {
    /// Creates a new payment API. If `gateway` is `None`, every payment operation fails with
    /// [`MarketplaceError::PaymentGatewayUnavailable`].
    pub fn new(db: B, gateway: Option<G>, producers: EventProducers) -> Self {
        Self { db, gateway, webhook_secret: None, producers }
    }

    /// Sets the secret used to authenticate webhook deliveries. Empty secrets are ignored.
    pub fn with_webhook_secret(mut self, secret: Secret<String>) -> Self {
        self.webhook_secret = Some(secret).filter(|s| !s.is_empty());
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    fn gateway(&self) -> Result<&G, MarketplaceError> {
        self.gateway.as_ref().ok_or(MarketplaceError::PaymentGatewayUnavailable)
    }
}

impl<B, G> PaymentApi<B, G>
where
    B: MarketplaceDatabase,
    G: PaymentGateway,
{
    async fn owned_order(&self, caller: &Caller, order_id: &OrderId) -> Result<FullOrder, MarketplaceError> {
        let order = self.db.fetch_order(order_id).await?.ok_or_else(|| MarketplaceError::OrderNotFound(order_id.clone()))?;
        if !caller.is_self_or_admin(order.order.buyer_id) {
            return Err(MarketplaceError::Forbidden(format!("Order {order_id} does not belong to you")));
        }
        Ok(order)
    }

    /// Creates the gateway-side order for a local order, so that the buyer can pay for it.
    ///
    /// The amount is always the order total. A client-supplied amount is only accepted if it matches.
    ///
    /// An order only ever has one gateway order. Once it has been created, repeated checkouts get the same gateway
    /// order back, so that a payment made through any of them can be matched to this order.
    pub async fn create_payment_order(
        &self,
        caller: &Caller,
        request: CreatePaymentOrderRequest,
    ) -> Result<PaymentOrderResponse, MarketplaceError> {
        let gateway = self.gateway()?;
        let order_id = request.order_id;
        let order = self.owned_order(caller, &order_id).await?.order;
        match order.payment_status {
            PaymentStatus::Paid => return Err(MarketplaceError::AlreadyPaid(order_id)),
            PaymentStatus::Refunded => {
                return Err(MarketplaceError::InvalidState(format!("Order {order_id} has already been refunded")))
            },
            PaymentStatus::Pending | PaymentStatus::Failed => {},
        }
        if order.status == OrderStatus::Cancelled {
            return Err(MarketplaceError::InvalidState(format!("Order {order_id} has been cancelled")));
        }
        if let Some(amount) = request.amount {
            if amount != order.total_amount {
                return Err(MarketplaceError::ValidationError(format!(
                    "Payment amount {amount} does not match the order total of {}",
                    order.total_amount
                )));
            }
        }
        let currency = request.currency.unwrap_or_else(|| order.currency.clone());
        if currency != order.currency {
            return Err(MarketplaceError::ValidationError(format!(
                "Order {order_id} is priced in {}, not {currency}",
                order.currency
            )));
        }
        if let Some(gateway_order_id) = order.gateway_order_id {
            debug!("💰️ Reusing gateway order {gateway_order_id} for order [{order_id}]");
            return Ok(PaymentOrderResponse {
                order_id,
                gateway_order_id,
                amount: order.total_amount,
                currency: order.currency,
                key_id: gateway.key_id(),
            });
        }
        let notes = HashMap::from([
            ("order_id".to_string(), order_id.to_string()),
            ("buyer_id".to_string(), order.buyer_id.to_string()),
        ]);
        let new_order =
            NewGatewayOrder { amount: order.total_amount, currency, receipt: order_id.to_string(), notes };
        let gateway_order = gateway.create_order(new_order).await.map_err(|e| {
            error!("💰️ Could not create gateway order for [{order_id}]. {e}");
            MarketplaceError::from(e)
        })?;
        let linked = self.db.attach_gateway_order(&order_id, &gateway_order.id).await?;
        let gateway_order_id = match linked.order.gateway_order_id {
            Some(id) if id != gateway_order.id => {
                warn!(
                    "💰️ Order [{order_id}] was linked to gateway order {id} by a concurrent checkout. Gateway order {} \
                     will not be used.",
                    gateway_order.id
                );
                id
            },
            _ => {
                info!("💰️ Gateway order {} created for order [{order_id}]", gateway_order.id);
                gateway_order.id
            },
        };
        Ok(PaymentOrderResponse {
            order_id,
            gateway_order_id,
            amount: gateway_order.amount,
            currency: gateway_order.currency,
            key_id: gateway.key_id(),
        })
    }

    /// Verifies the checkout callback and records the payment.
    ///
    /// The signature must be valid, and it must have been issued for the gateway order that is linked to this order.
    /// Verifying an order that has already been paid returns the order unchanged.
    pub async fn verify_payment(
        &self,
        caller: &Caller,
        request: VerifyPaymentRequest,
    ) -> Result<FullOrder, MarketplaceError> {
        let gateway = self.gateway()?;
        let order_id = request.order_id;
        let order = self.owned_order(caller, &order_id).await?;
        if order.order.gateway_order_id.as_deref() != Some(request.gateway_order_id.as_str()) {
            warn!(
                "💰️ Payment verification for [{order_id}] quoted gateway order {}, which is not linked to this order",
                request.gateway_order_id
            );
            return Err(MarketplaceError::ValidationError(
                "The gateway order does not belong to this order".to_string(),
            ));
        }
        let secret = gateway.key_secret();
        if !verify_payment_signature(secret.reveal(), &request.gateway_order_id, &request.gateway_payment_id, &request.signature)
        {
            warn!("💰️ Invalid payment signature received for order [{order_id}]");
            return Err(MarketplaceError::InvalidSignature);
        }
        let update = self.record_capture(&order_id, request.gateway_payment_id).await?;
        Ok(update.into_order())
    }

    /// Refunds the full amount of a captured payment.
    ///
    /// Only admins may issue refunds. The order is cancelled and its stock released, unless it has already been
    /// delivered.
    pub async fn refund_payment(
        &self,
        caller: &Caller,
        order_id: &OrderId,
        reason: Option<String>,
    ) -> Result<FullOrder, MarketplaceError> {
        let gateway = self.gateway()?;
        if !caller.is_admin() {
            return Err(MarketplaceError::Forbidden("Only admins can issue refunds".into()));
        }
        let order = self.owned_order(caller, order_id).await?.order;
        if order.payment_status != PaymentStatus::Paid {
            return Err(MarketplaceError::InvalidState(format!(
                "Order {order_id} cannot be refunded, since its payment status is {}",
                order.payment_status
            )));
        }
        let payment_id = order.gateway_payment_id.ok_or_else(|| MarketplaceError::MissingPayment(order_id.clone()))?;
        let reason = reason.filter(|r| !r.trim().is_empty()).unwrap_or_else(|| REFUND_REASON.to_string());
        let notes = HashMap::from([("order_id".to_string(), order_id.to_string()), ("reason".to_string(), reason.clone())]);
        let refund = gateway.refund_payment(&payment_id, order.total_amount, notes).await.map_err(|e| {
            error!("💰️ Refund of payment {payment_id} for [{order_id}] failed. {e}");
            MarketplaceError::from(e)
        })?;
        info!("💰️ Refund {} of {} issued for order [{order_id}]", refund.id, refund.amount);
        let record = RefundRecord { refund_id: Some(refund.id), reason };
        let update = self.record_refund(order_id, record).await?;
        Ok(update.into_order())
    }

    /// Authenticates and processes a gateway webhook delivery.
    ///
    /// Returns an error only if the webhook secret is not configured, or the signature is invalid. Once the signature
    /// checks out, problems processing the event are logged and reported as [`WebhookOutcome::Failed`], so that the
    /// gateway does not keep retrying a delivery that can never succeed.
    pub async fn handle_webhook(&self, raw_body: &[u8], signature: &str) -> Result<WebhookOutcome, MarketplaceError> {
        let secret = self.webhook_secret.as_ref().ok_or(MarketplaceError::PaymentGatewayUnavailable)?;
        if !verify_webhook_signature(secret.reveal(), raw_body, signature) {
            warn!("🪝️ Webhook delivery with an invalid signature rejected");
            return Err(MarketplaceError::InvalidSignature);
        }
        match self.process_webhook(raw_body).await {
            Ok(outcome) => {
                debug!("🪝️ Webhook processed. {outcome:?}");
                Ok(outcome)
            },
            Err(e) => {
                error!("🪝️ Error processing webhook. {e}");
                Ok(WebhookOutcome::Failed(e.to_string()))
            },
        }
    }

    async fn process_webhook(&self, raw_body: &[u8]) -> Result<WebhookOutcome, MarketplaceError> {
        let event = serde_json::from_slice::<WebhookEvent>(raw_body)
            .map_err(|e| MarketplaceError::InvalidWebhookPayload(e.to_string()))?;
        trace!("🪝️ Received {} webhook", event.event);
        match event.event.as_str() {
            "payment.captured" => {
                let payment = event
                    .payload
                    .payment
                    .ok_or_else(|| MarketplaceError::InvalidWebhookPayload("Missing payment entity".into()))?
                    .entity;
                let order = self.order_for_payment(&payment).await?;
                let update = self.record_capture(order.order_id(), payment.id).await?;
                Ok(outcome(order.order_id(), &update))
            },
            "payment.failed" => {
                let payment = event
                    .payload
                    .payment
                    .ok_or_else(|| MarketplaceError::InvalidWebhookPayload("Missing payment entity".into()))?
                    .entity;
                let order = self.order_for_payment(&payment).await?;
                let reason = payment.error_description.unwrap_or_else(|| DEFAULT_FAILURE_REASON.to_string());
                let update = self.db.mark_payment_failed(order.order_id(), &reason).await?;
                if update.is_applied() {
                    info!("🪝️ Payment {} for order [{}] failed. {reason}", payment.id, order.order_id());
                }
                Ok(outcome(order.order_id(), &update))
            },
            "refund.processed" => {
                let refund = event.payload.refund.map(|r| r.entity);
                let payment_id = refund
                    .as_ref()
                    .and_then(|r| r.payment_id.clone())
                    .or_else(|| event.payload.payment.map(|p| p.entity.id))
                    .ok_or_else(|| MarketplaceError::InvalidWebhookPayload("Missing refunded payment id".into()))?;
                let order = self
                    .db
                    .fetch_order_by_gateway_payment_id(&payment_id)
                    .await?
                    .ok_or(MarketplaceError::GatewayReferenceNotFound(payment_id))?;
                let record = RefundRecord { refund_id: refund.map(|r| r.id), reason: REFUND_REASON.to_string() };
                let update = self.record_refund(order.order_id(), record).await?;
                Ok(outcome(order.order_id(), &update))
            },
            other => {
                debug!("🪝️ Ignoring {other} webhook");
                Ok(WebhookOutcome::Ignored(other.to_string()))
            },
        }
    }

    /// Finds the order a gateway payment belongs to. The gateway order id is tried first, then the `order_id` note that
    /// was attached when the gateway order was created.
    async fn order_for_payment(&self, payment: &PaymentEntity) -> Result<FullOrder, MarketplaceError> {
        if let Some(gateway_order_id) = payment.order_id.as_deref() {
            if let Some(order) = self.db.fetch_order_by_gateway_order_id(gateway_order_id).await? {
                return Ok(order);
            }
        }
        if let Some(order_id) = payment.note("order_id").map(OrderId::from) {
            if let Some(order) = self.db.fetch_order(&order_id).await? {
                info!(
                    "🪝️ Payment {} (gateway order {}) matched to order [{order_id}] by its notes",
                    payment.id,
                    payment.order_id.as_deref().unwrap_or("none")
                );
                return Ok(order);
            }
        }
        match payment.order_id.as_deref() {
            Some(gateway_order_id) => Err(MarketplaceError::GatewayReferenceNotFound(gateway_order_id.to_string())),
            None => Err(MarketplaceError::InvalidWebhookPayload("Payment is not linked to an order".into())),
        }
    }

    async fn record_capture(
        &self,
        order_id: &OrderId,
        gateway_payment_id: String,
    ) -> Result<PaymentUpdate, MarketplaceError> {
        let capture = PaymentCapture { gateway_payment_id, payment_id: generate_payment_id() };
        let update = self.db.mark_order_paid(order_id, capture).await?;
        match &update {
            PaymentUpdate::Applied(order) => {
                if order.order.status == OrderStatus::Cancelled {
                    warn!("💰️ Payment captured for cancelled order [{order_id}]. The payment needs to be refunded.");
                }
                info!("💰️ Payment for order [{order_id}] confirmed");
                self.producers.publish_order_paid(OrderPaidEvent::new(order.clone())).await;
            },
            PaymentUpdate::Unchanged(_) => {
                debug!("💰️ Payment for order [{order_id}] was already recorded");
            },
        }
        Ok(update)
    }

    async fn record_refund(&self, order_id: &OrderId, refund: RefundRecord) -> Result<PaymentUpdate, MarketplaceError> {
        let reason = refund.reason.clone();
        let status_before = self.db.fetch_order(order_id).await?.map(|o| o.order.status);
        let update = self.db.mark_order_refunded(order_id, refund).await?;
        if let PaymentUpdate::Applied(order) = &update {
            info!("💰️ Payment for order [{order_id}] refunded");
            self.producers.publish_payment_refunded(PaymentRefundedEvent::new(order.clone())).await;
            let newly_cancelled = order.order.status == OrderStatus::Cancelled
                && status_before.map(|s| s != OrderStatus::Cancelled).unwrap_or(false);
            if newly_cancelled {
                self.producers.publish_order_annulled(OrderAnnulledEvent::new(order.clone(), &reason)).await;
            }
        }
        Ok(update)
    }
}

fn outcome(order_id: &OrderId, update: &PaymentUpdate) -> WebhookOutcome {
    if update.is_applied() {
        WebhookOutcome::Applied(order_id.clone())
    } else {
        WebhookOutcome::Unchanged(order_id.clone())
    }
}
