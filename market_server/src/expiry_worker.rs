use chrono::Duration;
use log::*;
use market_engine::{events::EventProducers, traits::ExpiryResult, OrderFlowApi, SqliteDatabase};
use tokio::task::JoinHandle;

const EXPIRY_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

/// Starts the expiry worker. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_expiry_worker(db: SqliteDatabase, producers: EventProducers, unpaid_expiry: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(EXPIRY_INTERVAL);
        let api = OrderFlowApi::new(db, producers);
        info!("🕰️ Unpaid order expiry worker started. Orders expire after {} hrs.", unpaid_expiry.num_hours());
        loop {
            timer.tick().await;
            trace!("🕰️ Running unpaid order expiry job");
            match api.expire_unpaid_orders(unpaid_expiry).await {
                Ok(result) if result.is_empty() => trace!("🕰️ No orders expired"),
                Ok(result) => {
                    info!("🕰️ {} unpaid orders expired", result.cancelled.len());
                    debug!("🕰️ {}", summary(&result));
                },
                Err(e) => {
                    error!("🕰️ Error running unpaid order expiry job: {e}");
                },
            }
        }
    })
}

fn summary(result: &ExpiryResult) -> String {
    let cancelled = result.cancelled.iter().map(|id| id.to_string()).collect::<Vec<String>>().join(", ");
    let failed = result.failed.iter().map(|(id, e)| format!("{id} ({e})")).collect::<Vec<String>>().join(", ");
    format!("Expired: [{cancelled}]. Failed: [{failed}]")
}
