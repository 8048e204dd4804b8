//! Polling loop.
//!
//! One cycle is authenticate → fetch → decide/act, run to completion before
//! the next one starts. Sleeps between cycles are the only points where
//! cancellation is observed. Once the token fires, no new cycle starts.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use udm_core::bonding::BondingAction;
use udm_core::event::Reading;

use crate::controller::Controller;
use crate::machine::{Decision, ThresholdMachine};

/// Delay after an authentication failure or a panicked cycle.
pub const ERROR_BACKOFF: Duration = Duration::from_secs(60);

/// What a single cycle ended with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    AuthFailed,
    /// Count could not be read; no decision was made.
    FetchFailed,
    Evaluated(Decision),
    /// A crossing was detected but the webhook did not confirm it.
    TransitionFailed(BondingAction),
    Panicked,
}

impl CycleOutcome {
    /// How long to wait before the next cycle.
    pub fn next_delay(self, interval: Duration) -> Duration {
        match self {
            Self::AuthFailed | Self::Panicked => ERROR_BACKOFF,
            Self::FetchFailed | Self::Evaluated(_) | Self::TransitionFailed(_) => interval,
        }
    }
}

pub struct Poller {
    controller: Arc<dyn Controller>,
    machine: ThresholdMachine,
    interval: Duration,
}

impl Poller {
    pub fn new(controller: Arc<dyn Controller>, machine: ThresholdMachine, interval: Duration) -> Self {
        Self {
            controller,
            machine,
            interval,
        }
    }

    pub fn machine(&self) -> &ThresholdMachine {
        &self.machine
    }

    /// Run one authenticate → fetch → decide cycle.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let session = match self.controller.authenticate().await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    retry_in_secs = ERROR_BACKOFF.as_secs(),
                    "Controller authentication failed"
                );
                return CycleOutcome::AuthFailed;
            }
        };

        let count = match self.controller.fetch_connected_client_count(&session).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch connected client count, will retry");
                return CycleOutcome::FetchFailed;
            }
        };

        tracing::info!(clients = count, "Connected clients");
        match self.machine.observe(&Reading::now(count)).await {
            Ok(decision) => CycleOutcome::Evaluated(decision),
            Err(e) => CycleOutcome::TransitionFailed(e.action),
        }
    }

    /// Run a cycle, turning a panic anywhere inside it into [`CycleOutcome::Panicked`].
    async fn guarded_cycle(&mut self) -> CycleOutcome {
        match AssertUnwindSafe(self.run_cycle()).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(
                    error = %message,
                    retry_in_secs = ERROR_BACKOFF.as_secs(),
                    "Unexpected error in monitoring cycle"
                );
                CycleOutcome::Panicked
            }
        }
    }

    /// Poll until `cancel` fires.
    pub async fn run(&mut self, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            threshold = self.machine.threshold(),
            "Starting monitoring loop"
        );

        while !cancel.is_cancelled() {
            let outcome = self.guarded_cycle().await;
            let delay = outcome.next_delay(self.interval);
            tracing::debug!(?outcome, delay_secs = delay.as_secs(), "Waiting for next poll");

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        tracing::info!(state = %self.machine.state(), "Monitoring loop stopped");
    }
}
