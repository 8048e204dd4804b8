//! Background purge of expired threshold events.
//!
//! Readers already skip rows past `expires_at`, so a missed or failed pass
//! costs disk space only and is picked up on the next tick. Nothing is
//! purged until the store has applied its schema in this process.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::store::PgEventStore;

pub const PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Purge on every [`PURGE_INTERVAL`] tick until `cancel` fires.
///
/// The first tick is immediate.
pub async fn run(store: Arc<PgEventStore>, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(PURGE_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => purge_once(&store).await,
        }
    }

    tracing::debug!("Threshold event purge task stopped");
}

async fn purge_once(store: &PgEventStore) {
    match store.purge_expired(Utc::now()).await {
        Ok(None) => tracing::debug!("Event schema not applied yet, purge skipped"),
        Ok(Some(0)) => {}
        Ok(Some(purged)) => tracing::info!(purged, "Purged expired threshold events"),
        Err(e) => tracing::warn!(error = %e, "Threshold event purge failed"),
    }
}
