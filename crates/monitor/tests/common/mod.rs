//! In-memory collaborators for driving the monitor without a network.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use udm_core::bonding::{BondingAction, WebhookState};
use udm_core::event::TransitionEvent;

use udm_monitor::controller::{AuthError, Controller, ControllerSession, FetchError};
use udm_monitor::machine::ThresholdMachine;
use udm_monitor::notifier::{Notifier, NotifyError};
use udm_monitor::poller::Poller;
use udm_monitor::recorder::{EventRecorder, EventStore, LogStoreError};

pub const THRESHOLD: u32 = 30;
pub const INTERVAL: Duration = Duration::from_secs(300);

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// One scripted poll cycle.
#[derive(Debug, Clone, Copy)]
pub enum Step {
    Count(u32),
    AuthFails,
    FetchFails,
    Panic,
}

/// Plays back a script of cycles, cancelling `done` once it runs dry.
pub struct ScriptedController {
    steps: Mutex<VecDeque<Step>>,
    done: CancellationToken,
    pub auth_calls: Mutex<u32>,
    pub fetch_calls: Mutex<u32>,
}

impl ScriptedController {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            done: CancellationToken::new(),
            auth_calls: Mutex::new(0),
            fetch_calls: Mutex::new(0),
        }
    }

    pub fn done_token(&self) -> CancellationToken {
        self.done.clone()
    }

    pub fn auth_calls(&self) -> u32 {
        *self.auth_calls.lock().unwrap()
    }

    pub fn fetch_calls(&self) -> u32 {
        *self.fetch_calls.lock().unwrap()
    }

    fn take_front(&self) -> Option<Step> {
        let mut steps = self.steps.lock().unwrap();
        let step = steps.pop_front();
        if steps.is_empty() {
            self.done.cancel();
        }
        step
    }

    fn peek(&self) -> Option<Step> {
        self.steps.lock().unwrap().front().copied()
    }
}

#[async_trait]
impl Controller for ScriptedController {
    async fn authenticate(&self) -> Result<ControllerSession, AuthError> {
        *self.auth_calls.lock().unwrap() += 1;
        match self.peek() {
            Some(Step::AuthFails) => {
                self.take_front();
                Err(AuthError::Rejected {
                    status: 401,
                    body: "unauthorized".into(),
                })
            }
            Some(Step::Panic) => {
                self.take_front();
                panic!("controller exploded");
            }
            _ => Ok(ControllerSession::anonymous(reqwest::Client::new())),
        }
    }

    async fn fetch_connected_client_count(
        &self,
        _session: &ControllerSession,
    ) -> Result<u32, FetchError> {
        *self.fetch_calls.lock().unwrap() += 1;
        match self.take_front() {
            Some(Step::Count(count)) => Ok(count),
            _ => Err(FetchError::HttpStatus {
                status: 500,
                body: "station list unavailable".into(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

/// Records every call. Fails the first `failures` calls with HTTP 503.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<WebhookState>>,
    failures: Mutex<u32>,
}

impl RecordingNotifier {
    pub fn failing(failures: u32) -> Self {
        Self {
            failures: Mutex::new(failures),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<WebhookState> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, state: WebhookState) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(state);
        let mut failures = self.failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(NotifyError::HttpStatus {
                status: 503,
                body: "receiver busy".into(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Event stores
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStore {
    events: Mutex<Vec<TransitionEvent>>,
}

impl MemoryStore {
    pub fn events(&self) -> Vec<TransitionEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn actions(&self) -> Vec<BondingAction> {
        self.events().iter().map(|e| e.action).collect()
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn append(&self, event: &TransitionEvent) -> Result<(), LogStoreError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Store that is permanently down.
pub struct UnavailableStore;

#[async_trait]
impl EventStore for UnavailableStore {
    async fn append(&self, _event: &TransitionEvent) -> Result<(), LogStoreError> {
        Err(LogStoreError::Unavailable("connection refused".into()))
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

pub struct Harness {
    pub controller: Arc<ScriptedController>,
    pub notifier: Arc<RecordingNotifier>,
    pub store: Arc<MemoryStore>,
    pub poller: Poller,
}

pub fn harness(steps: impl IntoIterator<Item = Step>, notifier: RecordingNotifier) -> Harness {
    let controller = Arc::new(ScriptedController::new(steps));
    let notifier = Arc::new(notifier);
    let store = Arc::new(MemoryStore::default());
    let machine = ThresholdMachine::new(
        THRESHOLD,
        notifier.clone(),
        EventRecorder::new(store.clone()),
    );
    let poller = Poller::new(controller.clone(), machine, INTERVAL);
    Harness {
        controller,
        notifier,
        store,
        poller,
    }
}
