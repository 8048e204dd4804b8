//! PostgreSQL-backed [`EventStore`].
//!
//! The pool connects lazily and migrations run on the first write that
//! reaches the database, so the monitor starts and keeps running while the
//! store is down and picks it up once it comes back.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use udm_core::event::TransitionEvent;
use udm_core::types::Timestamp;
use udm_db::models::threshold_event::{CreateThresholdEvent, ThresholdEvent};
use udm_db::repositories::ThresholdEventRepo;
use udm_db::DbPool;

use crate::recorder::{EventStore, LogStoreError};

pub struct PgEventStore {
    pool: DbPool,
    schema_ready: AtomicBool,
}

impl PgEventStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            schema_ready: AtomicBool::new(false),
        }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Apply migrations once per process, retrying after failures.
    async fn ensure_schema(&self) -> Result<(), LogStoreError> {
        if self.schema_ready.load(Ordering::Acquire) {
            return Ok(());
        }
        udm_db::run_migrations(&self.pool).await?;
        self.schema_ready.store(true, Ordering::Release);
        tracing::info!("Event store migrations applied");
        Ok(())
    }

    /// Startup check: connectivity, schema, and the latest stored transition.
    ///
    /// Never fatal. The caller logs the error and carries on.
    pub async fn startup_check(&self) -> Result<Option<ThresholdEvent>, LogStoreError> {
        udm_db::health_check(&self.pool).await?;
        self.ensure_schema().await?;
        let latest = ThresholdEventRepo::list_active(&self.pool, Utc::now(), 1).await?;
        Ok(latest.into_iter().next())
    }

    /// Delete rows that expired before `now`.
    ///
    /// Returns `None` without touching the database until migrations have
    /// been applied in this process. Before that the table may not exist.
    pub async fn purge_expired(&self, now: Timestamp) -> Result<Option<u64>, LogStoreError> {
        if !self.schema_ready.load(Ordering::Acquire) {
            return Ok(None);
        }
        let purged = ThresholdEventRepo::delete_expired(&self.pool, now).await?;
        Ok(Some(purged))
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn append(&self, event: &TransitionEvent) -> Result<(), LogStoreError> {
        self.ensure_schema().await?;
        let row = ThresholdEventRepo::upsert(&self.pool, &CreateThresholdEvent::from(event)).await?;
        tracing::debug!(id = row.id, key = %row.event_key, expires_at = %row.expires_at, "Stored threshold event");
        Ok(())
    }
}
