//! Marketplace event hooks.
//!
//! The server subscribes to the engine's order events and reports them. Each hook runs on its own task, so slow
//! subscribers never hold up a request.
//!
//! 1. OrderPaidEvent: the sellers whose products are in the order can start fulfilment.
//! 2. OrderAnnulledEvent: the order was cancelled, expired or refunded, and its stock is back on sale.
//! 3. PaymentRefundedEvent: money has been returned to the buyer.
use std::{collections::BTreeSet, future::Future, pin::Pin};

use log::*;
use market_engine::{
    db_types::FullOrder,
    events::{EventHandlers, EventHooks},
};

pub const EVENT_BUFFER_SIZE: usize = 25;

fn sellers(order: &FullOrder) -> String {
    order
        .items
        .iter()
        .map(|i| i.seller_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|id| format!("#{id}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn done() -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(async {})
}

pub fn create_notification_handlers() -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_order_created(|ev| {
        debug!("📬️ New order [{}] for {}", ev.order.order_id(), ev.order.order.total_amount);
        done()
    });
    // --- On OrderPaid Handler ---
    hooks.on_order_paid(|ev| {
        info!(
            "📬️ Order [{}] has been paid. Sellers {} can start fulfilment.",
            ev.order.order_id(),
            sellers(&ev.order)
        );
        done()
    });
    hooks.on_status_changed(|ev| {
        info!("📬️ Order [{}] is now {} (was {})", ev.order.order_id(), ev.order.order.status, ev.old_status);
        done()
    });
    // --- On OrderAnnulled Handler ---
    hooks.on_order_annulled(|ev| {
        info!("📬️ Order [{}] was cancelled. {}", ev.order.order_id(), ev.reason);
        done()
    });
    hooks.on_payment_refunded(|ev| {
        info!(
            "📬️ {} refunded to buyer #{} for order [{}]",
            ev.order.order.total_amount,
            ev.order.order.buyer_id,
            ev.order.order_id()
        );
        done()
    });
    EventHandlers::new(EVENT_BUFFER_SIZE, hooks)
}
