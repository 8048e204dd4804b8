//! Transition event recording.
//!
//! [`EventRecorder::record`] writes each [`TransitionEvent`] to the durable
//! store (when one is configured) and mirrors it as a line on the
//! `udm_monitor::transitions` tracing target, which the file layer writes
//! to the rotating text log.
//!
//! Store failures are logged as warnings and swallowed. `record` has no
//! error path, so a dead store can never hold back a transition.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use udm_core::event::TransitionEvent;

/// Upper bound on one durable-store write, including schema setup.
const STORE_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Tracing target for the mirrored text-log line.
pub const TRANSITION_LOG_TARGET: &str = "udm_monitor::transitions";

#[derive(Debug, thiserror::Error)]
pub enum LogStoreError {
    #[error("Event store query failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Event store migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Event store write timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Event store unavailable: {0}")]
    Unavailable(String),
}

/// Durable, expiring append log for transition events.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn append(&self, event: &TransitionEvent) -> Result<(), LogStoreError>;
}

/// Best-effort writer for transition events.
#[derive(Clone, Default)]
pub struct EventRecorder {
    store: Option<Arc<dyn EventStore>>,
}

impl EventRecorder {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store: Some(store) }
    }

    /// Recorder that only writes the text log.
    pub fn text_only() -> Self {
        Self::default()
    }

    pub async fn record(&self, event: &TransitionEvent) {
        if let Some(store) = &self.store {
            let result = tokio::time::timeout(STORE_WRITE_TIMEOUT, store.append(event))
                .await
                .unwrap_or(Err(LogStoreError::Timeout(STORE_WRITE_TIMEOUT)));

            match result {
                Ok(()) => {
                    tracing::info!(key = %event.key(), action = %event.action, "Event logged to store");
                }
                Err(e) => {
                    tracing::warn!(error = %e, key = %event.key(), "Event store write failed");
                }
            }
        }

        tracing::info!(
            target: TRANSITION_LOG_TARGET,
            timestamp = %event.timestamp.to_rfc3339(),
            action = %event.action,
            client_count = event.client_count,
            threshold = event.threshold,
            "Threshold event: {} - Clients: {}/{}",
            event.action,
            event.client_count,
            event.threshold,
        );
    }
}
