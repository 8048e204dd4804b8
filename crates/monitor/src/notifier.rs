//! Webhook notifier for bonding state changes.
//!
//! [`WebhookNotifier`] sends `{"state": "UP" | "DOWN"}` to the configured
//! URL in a single request. There is no retry in here. The receiver
//! treats the call as idempotent and the threshold machine re-issues it
//! on the next qualifying reading.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::Serialize;
use udm_core::bonding::WebhookState;

use crate::config::{WebhookConfig, WebhookMethod};

/// HTTP request timeout for a single webhook call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// User agent sent with every webhook call.
pub const MONITOR_USER_AGENT: &str = "UDM-Threshold-Monitor/1.0";

/// Status codes the receiver uses to acknowledge a state change.
const ACCEPTED_STATUSES: [u16; 3] = [200, 201, 202];

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The receiver answered with a status outside 200/201/202.
    #[error("Webhook returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },
}

// ---------------------------------------------------------------------------
// Notifier trait
// ---------------------------------------------------------------------------

/// Sink for bonding state changes.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, state: WebhookState) -> Result<(), NotifyError>;
}

#[derive(Debug, Serialize)]
struct StatePayload {
    state: WebhookState,
}

// ---------------------------------------------------------------------------
// WebhookNotifier
// ---------------------------------------------------------------------------

pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    method: WebhookMethod,
}

impl WebhookNotifier {
    pub fn new(config: &WebhookConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
            method: config.method,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, state: WebhookState) -> Result<(), NotifyError> {
        tracing::info!(
            url = %self.url,
            method = %self.method.as_http(),
            %state,
            "Sending webhook"
        );

        let response = self
            .client
            .request(self.method.as_http(), &self.url)
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, MONITOR_USER_AGENT)
            .json(&StatePayload { state })
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        if !ACCEPTED_STATUSES.contains(&status) {
            return Err(NotifyError::HttpStatus { status, body });
        }

        tracing::info!(status, "Webhook accepted");
        tracing::debug!(response = %body, "Webhook response body");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
