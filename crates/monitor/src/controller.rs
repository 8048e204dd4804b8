//! UniFi controller API client.
//!
//! [`UnifiController`] logs in with the configured credentials and counts
//! the connected stations. Each [`ControllerSession`] owns its own cookie
//! jar, so the caller can drop a session and authenticate again at will.
//!
//! Controllers ship self-signed certificates, so certificate validation is
//! disabled for this client only.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::ControllerConfig;

/// Request timeout for every controller call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Header UniFi OS uses to hand out the CSRF token on login.
const CSRF_HEADER: &str = "x-csrf-token";

/// Number of counted stations echoed to the debug log per fetch.
const DEBUG_STATION_SAMPLE: usize = 5;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The login request never produced a response (network, TLS, timeout).
    #[error("Controller login request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Controller login rejected ({status}): {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Station list request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Station list returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Station list payload is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// One entry of the `stat/sta` active-station list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Station {
    #[serde(rename = "_is_guest_by_uap", default)]
    pub is_guest: bool,
    #[serde(default)]
    pub is_wired: bool,
    #[serde(default)]
    pub is_wireless: bool,
    pub hostname: Option<String>,
    pub mac: Option<String>,
    pub ip: Option<String>,
}

impl Station {
    /// Non-guest stations on either medium are counted.
    pub fn is_counted(&self) -> bool {
        !self.is_guest && (self.is_wired || self.is_wireless)
    }
}

#[derive(Debug, Deserialize)]
struct StationList {
    #[serde(default)]
    data: Vec<Station>,
}

#[derive(Debug, serde::Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    remember: bool,
}

// ---------------------------------------------------------------------------
// Controller trait
// ---------------------------------------------------------------------------

/// An authenticated controller session.
///
/// Holds the cookie-carrying HTTP client. Dropping it discards the session.
#[derive(Debug, Clone)]
pub struct ControllerSession {
    client: reqwest::Client,
    csrf_token: Option<String>,
}

impl ControllerSession {
    /// Session that carries no cookies, for controllers that need none.
    pub fn anonymous(client: reqwest::Client) -> Self {
        Self {
            client,
            csrf_token: None,
        }
    }
}

/// Source of connected-client counts.
#[async_trait]
pub trait Controller: Send + Sync {
    async fn authenticate(&self) -> Result<ControllerSession, AuthError>;

    async fn fetch_connected_client_count(
        &self,
        session: &ControllerSession,
    ) -> Result<u32, FetchError>;
}

// ---------------------------------------------------------------------------
// UnifiController
// ---------------------------------------------------------------------------

pub struct UnifiController {
    base_url: String,
    site: String,
    username: String,
    password: String,
}

impl UnifiController {
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            base_url: config.base_url(),
            site: config.site.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        }
    }

    fn login_url(&self) -> String {
        format!("{}/api/auth/login", self.base_url)
    }

    fn stations_url(&self) -> String {
        format!("{}/proxy/network/api/s/{}/stat/sta", self.base_url, self.site)
    }

    /// Fresh client with an empty cookie jar for one session.
    fn session_client() -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .cookie_store(true)
            .danger_accept_invalid_certs(true)
            .build()
    }
}

#[async_trait]
impl Controller for UnifiController {
    async fn authenticate(&self) -> Result<ControllerSession, AuthError> {
        let client = Self::session_client()?;
        let body = LoginRequest {
            username: &self.username,
            password: &self.password,
            remember: false,
        };

        let response = client.post(self.login_url()).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let csrf_token = response
            .headers()
            .get(CSRF_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        tracing::info!(controller = %self.base_url, "Authenticated to controller");
        Ok(ControllerSession { client, csrf_token })
    }

    async fn fetch_connected_client_count(
        &self,
        session: &ControllerSession,
    ) -> Result<u32, FetchError> {
        let mut request = session.client.get(self.stations_url());
        if let Some(token) = &session.csrf_token {
            request = request.header(CSRF_HEADER, token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        let stations: StationList = serde_json::from_slice(&bytes)?;
        Ok(count_connected(&stations.data))
    }
}

/// Count the stations that qualify as connected clients.
pub fn count_connected(stations: &[Station]) -> u32 {
    let counted: Vec<&Station> = stations.iter().filter(|s| s.is_counted()).collect();

    tracing::debug!(
        total = stations.len(),
        counted = counted.len(),
        "Evaluated station list"
    );
    for station in counted.iter().take(DEBUG_STATION_SAMPLE) {
        tracing::debug!(
            hostname = station.hostname.as_deref().unwrap_or("unknown"),
            mac = station.mac.as_deref().unwrap_or("unknown"),
            ip = station.ip.as_deref().unwrap_or("unknown"),
            "Connected station"
        );
    }

    u32::try_from(counted.len()).unwrap_or(u32::MAX)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
