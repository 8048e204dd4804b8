//! Threshold state machine.
//!
//! Owns the single [`BondingState`] and drives the notifier and recorder
//! when a reading crosses the threshold relative to that state.
//!
//! Ordering for a crossing reading:
//! 1. build and record the [`TransitionEvent`] (intent, not outcome)
//! 2. call the notifier
//! 3. only on success, move to the target state
//!
//! A failed notification leaves the state untouched. The level condition
//! still holds on the next cycle, so the same transition is retried then.

use std::sync::Arc;

use udm_core::bonding::{required_action, BondingAction, BondingState};
use udm_core::event::{Reading, TransitionEvent};

use crate::notifier::{Notifier, NotifyError};
use crate::recorder::EventRecorder;

/// Outcome of feeding one reading to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Reading is on the same side as the current state.
    Unchanged,
    /// Webhook confirmed the action and the state moved.
    Transitioned(BondingAction),
}

/// The webhook did not confirm a transition. State was left as it was.
#[derive(Debug, thiserror::Error)]
#[error("{action} was not confirmed by the webhook: {source}")]
pub struct TransitionError {
    pub action: BondingAction,
    #[source]
    pub source: NotifyError,
}

pub struct ThresholdMachine {
    threshold: u32,
    state: BondingState,
    notifier: Arc<dyn Notifier>,
    recorder: EventRecorder,
}

impl ThresholdMachine {
    /// New machine in the initial `ENABLED` state.
    pub fn new(threshold: u32, notifier: Arc<dyn Notifier>, recorder: EventRecorder) -> Self {
        Self {
            threshold,
            state: BondingState::default(),
            notifier,
            recorder,
        }
    }

    /// Override the starting state.
    pub fn with_state(mut self, state: BondingState) -> Self {
        self.state = state;
        self
    }

    pub fn state(&self) -> BondingState {
        self.state
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Evaluate a reading and act on it if it crosses the threshold.
    pub async fn observe(&mut self, reading: &Reading) -> Result<Decision, TransitionError> {
        let Some(action) = required_action(self.state, reading.count, self.threshold) else {
            tracing::debug!(
                state = %self.state,
                clients = reading.count,
                threshold = self.threshold,
                "No threshold crossing"
            );
            return Ok(Decision::Unchanged);
        };

        let event = TransitionEvent::new(reading, self.threshold, action);
        self.recorder.record(&event).await;

        if let Err(source) = self.notifier.notify(action.webhook_state()).await {
            tracing::error!(
                %action,
                clients = reading.count,
                threshold = self.threshold,
                error = %source,
                "Webhook call failed, bonding state unchanged"
            );
            return Err(TransitionError { action, source });
        }

        self.state = action.target_state();
        tracing::info!(
            state = %self.state,
            clients = reading.count,
            threshold = self.threshold,
            "Bonding {}",
            self.state,
        );
        Ok(Decision::Transitioned(action))
    }
}
