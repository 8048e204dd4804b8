//! Threshold event models (append-only, expiring).

use serde::Serialize;
use sqlx::FromRow;
use udm_core::bonding::BondingAction;
use udm_core::error::CoreError;
use udm_core::event::TransitionEvent;
use udm_core::types::Timestamp;

/// A stored bonding transition.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ThresholdEvent {
    pub id: i64,
    pub event_key: String,
    pub client_count: i64,
    pub threshold: i64,
    pub action: String,
    pub recorded_at: Timestamp,
    pub expires_at: Timestamp,
    pub created_at: Timestamp,
}

impl ThresholdEvent {
    /// Convert the row back into a domain event.
    pub fn to_event(&self) -> Result<TransitionEvent, CoreError> {
        Ok(TransitionEvent {
            timestamp: self.recorded_at,
            client_count: to_u32("client_count", self.client_count)?,
            threshold: to_u32("threshold", self.threshold)?,
            action: self.action.parse::<BondingAction>()?,
        })
    }
}

fn to_u32(field: &'static str, value: i64) -> Result<u32, CoreError> {
    u32::try_from(value).map_err(|_| CoreError::OutOfRange { field, value })
}

/// DTO for inserting a new threshold event row.
#[derive(Debug, Clone)]
pub struct CreateThresholdEvent {
    pub event_key: String,
    pub client_count: i64,
    pub threshold: i64,
    pub action: &'static str,
    pub recorded_at: Timestamp,
    pub expires_at: Timestamp,
}

impl From<&TransitionEvent> for CreateThresholdEvent {
    fn from(event: &TransitionEvent) -> Self {
        Self {
            event_key: event.key(),
            client_count: i64::from(event.client_count),
            threshold: i64::from(event.threshold),
            action: event.action.as_str(),
            recorded_at: event.timestamp,
            expires_at: event.expires_at(),
        }
    }
}
