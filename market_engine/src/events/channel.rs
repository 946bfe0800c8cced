//! Fan-out of order lifecycle events to notification hooks.
//!
//! Every order event the engine emits (order placed, paid, status changed, annulled, refunded) travels over its own
//! bounded channel. The engine holds an [`EventProducer`] for each channel and publishes after a state change has been
//! committed. An [`EventHandler`] owns the receiving end and runs the registered hook for every event as its own task,
//! so a slow notification never holds up the order flow.
//!
//! Hooks only see the event payload. A hook that panics is logged and does not stop the handler.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::{
    sync::mpsc,
    task::{JoinError, JoinSet},
};

/// An async callback that reacts to one order event.
pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// The receiving end of an order event channel, paired with the hook that consumes it.
pub struct EventHandler<E: Send + Sync + 'static> {
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size);
        Self { listener: receiver, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    /// Dispatches events to the hook until every producer has been dropped, then waits for running hooks to finish.
    pub async fn start_handler(mut self) {
        debug!("📬️ Starting order event handler");
        // The handler must not keep its own channel open
        drop(self.sender);
        let mut running = JoinSet::new();
        loop {
            tokio::select! {
                event = self.listener.recv() => match event {
                    Some(event) => {
                        trace!("📬️ Dispatching order event");
                        running.spawn((self.handler)(event));
                    },
                    None => break,
                },
                Some(done) = running.join_next(), if !running.is_empty() => report_hook_result(done),
            }
        }
        if !running.is_empty() {
            debug!("📬️ Waiting for {} order event hooks to complete", running.len());
        }
        while let Some(done) = running.join_next().await {
            report_hook_result(done);
        }
        debug!("📬️ Order event handler has shut down");
    }
}

fn report_hook_result(result: Result<(), JoinError>) {
    if let Err(e) = result {
        error!("📬️ An order event hook did not complete: {e}");
    }
}

/// Publishes order events to a single [`EventHandler`].
#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    /// Waits for buffer space if the handler is behind. Events published after the handler has shut down are dropped.
    pub async fn publish_event(&self, event: E) {
        if self.sender.send(event).await.is_err() {
            error!("📬️ The order event handler has shut down. Event dropped.");
        }
    }
}
