//! Readings and transition events.

use chrono::Utc;
use serde::Serialize;

use crate::bonding::BondingAction;
use crate::types::Timestamp;

/// Prefix of every durable event key.
pub const EVENT_KEY_PREFIX: &str = "udm_monitor";

/// How long a transition event is kept in the durable store.
pub const EVENT_RETENTION_DAYS: i64 = 7;

/// One connected-client count taken from the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading {
    pub count: u32,
    pub observed_at: Timestamp,
}

impl Reading {
    /// A reading observed now.
    pub fn now(count: u32) -> Self {
        Self {
            count,
            observed_at: Utc::now(),
        }
    }
}

/// Audit record of an attempted bonding transition.
///
/// Written before the webhook is called, so it records intent rather than
/// confirmed success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionEvent {
    pub timestamp: Timestamp,
    pub client_count: u32,
    pub threshold: u32,
    pub action: BondingAction,
}

impl TransitionEvent {
    pub fn new(reading: &Reading, threshold: u32, action: BondingAction) -> Self {
        Self {
            timestamp: reading.observed_at,
            client_count: reading.count,
            threshold,
            action,
        }
    }

    /// Durable store key: `udm_monitor:<rfc3339 timestamp>`.
    pub fn key(&self) -> String {
        format!("{EVENT_KEY_PREFIX}:{}", self.timestamp.to_rfc3339())
    }

    /// Instant after which the stored record is no longer visible.
    pub fn expires_at(&self) -> Timestamp {
        self.timestamp + chrono::Duration::days(EVENT_RETENTION_DAYS)
    }
}
