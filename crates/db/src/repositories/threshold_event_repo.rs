//! Repository for the `threshold_events` table (append-only, expiring).

use sqlx::PgPool;
use udm_core::types::Timestamp;

use crate::models::threshold_event::{CreateThresholdEvent, ThresholdEvent};

/// Column list for `threshold_events` queries.
const COLUMNS: &str = "\
    id, event_key, client_count, threshold, action, \
    recorded_at, expires_at, created_at";

/// Provides query operations for recorded bonding transitions.
pub struct ThresholdEventRepo;

impl ThresholdEventRepo {
    /// Insert an event, overwriting any row stored under the same key.
    pub async fn upsert(
        pool: &PgPool,
        event: &CreateThresholdEvent,
    ) -> Result<ThresholdEvent, sqlx::Error> {
        let query = format!(
            "INSERT INTO threshold_events \
                 (event_key, client_count, threshold, action, recorded_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (event_key) DO UPDATE SET \
                 client_count = EXCLUDED.client_count, \
                 threshold = EXCLUDED.threshold, \
                 action = EXCLUDED.action, \
                 recorded_at = EXCLUDED.recorded_at, \
                 expires_at = EXCLUDED.expires_at \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ThresholdEvent>(&query)
            .bind(&event.event_key)
            .bind(event.client_count)
            .bind(event.threshold)
            .bind(event.action)
            .bind(event.recorded_at)
            .bind(event.expires_at)
            .fetch_one(pool)
            .await
    }

    /// Most recent events that have not yet expired, newest first.
    pub async fn list_active(
        pool: &PgPool,
        now: Timestamp,
        limit: i64,
    ) -> Result<Vec<ThresholdEvent>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM threshold_events \
             WHERE expires_at > $1 \
             ORDER BY recorded_at DESC \
             LIMIT $2"
        );
        sqlx::query_as::<_, ThresholdEvent>(&query)
            .bind(now)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Delete events whose expiry has passed. Returns the number removed.
    pub async fn delete_expired(pool: &PgPool, now: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM threshold_events WHERE expires_at <= $1")
            .bind(now)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
