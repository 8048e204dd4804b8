//! Monitor configuration loaded from environment variables.
//!
//! Everything except the controller password has a default. Validation is
//! a single pass: missing variables and unparsable values come back
//! together in one [`ConfigError`], each named by its variable.
//!
//! | Env Var              | Default                                                     |
//! |----------------------|-------------------------------------------------------------|
//! | `UDM_HOST`           | `192.168.1.1` (`localhost` on the controller itself)        |
//! | `UDM_USERNAME`       | `admin` (`root` on the controller itself)                   |
//! | `UDM_PASSWORD`       | required                                                    |
//! | `UDM_SITE`           | `default`                                                   |
//! | `WEBHOOK_URL`        | `http://localhost:3000/api/webhook/servers/main-server/states` |
//! | `WEBHOOK_METHOD`     | `PUT`                                                       |
//! | `CLIENT_THRESHOLD`   | `30`                                                        |
//! | `POLLING_INTERVAL`   | `300`                                                       |
//! | `LOG_STORE_ENABLED`  | `true`                                                      |
//! | `LOG_STORE_HOST`     | `localhost`                                                 |
//! | `LOG_STORE_PORT`     | `5432`                                                      |
//! | `LOG_STORE_DB`       | `udm_monitor`                                               |
//! | `LOG_STORE_USER`     | `postgres`                                                  |
//! | `LOG_STORE_PASSWORD` | unset                                                       |
//! | `LOG_LEVEL`          | `RUST_LOG`, then `info`                                     |
//! | `LOG_DIR`            | `logs`                                                      |

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::PgConnectOptions;
use tracing_subscriber::EnvFilter;
use udm_core::bonding::DEFAULT_THRESHOLD;

const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;
const DEFAULT_WEBHOOK_URL: &str = "http://localhost:3000/api/webhook/servers/main-server/states";
const DEFAULT_SITE: &str = "default";
const DEFAULT_STORE_PORT: u16 = 5432;

/// Files and directories that only exist on a UniFi console.
const CONTROLLER_MARKERS: [&str; 3] = ["/usr/bin/ubnt-device-info", "/mnt/data", "/data/unifi"];

/// Printed to stderr when configuration fails to load.
pub const USAGE: &str = "\
Example configuration:
  export UDM_HOST='192.168.1.1'
  export UDM_USERNAME='admin'
  export UDM_PASSWORD='your_password'
  export WEBHOOK_URL='http://your-server:3000/api/webhook/servers/main-server/states'
  export CLIENT_THRESHOLD='30'
  export POLLING_INTERVAL='300'";

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// A variable that was present but could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidVar {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

impl fmt::Display for InvalidVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={:?} ({})", self.var, self.value, self.reason)
    }
}

/// Fatal startup error. At least one of the two lists is non-empty.
#[derive(Debug, thiserror::Error)]
#[error("{}", describe(.missing, .invalid))]
pub struct ConfigError {
    pub missing: Vec<&'static str>,
    pub invalid: Vec<InvalidVar>,
}

fn describe(missing: &[&'static str], invalid: &[InvalidVar]) -> String {
    let mut lines = Vec::new();
    if !missing.is_empty() {
        lines.push(format!(
            "Missing required environment variables: {}",
            missing.join(", ")
        ));
    }
    if !invalid.is_empty() {
        let vars: Vec<String> = invalid.iter().map(ToString::to_string).collect();
        lines.push(format!("Invalid configuration: {}", vars.join("; ")));
    }
    lines.join("\n")
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Connection details for the network controller.
#[derive(Clone)]
pub struct ControllerConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    pub site: String,
}

impl ControllerConfig {
    /// Base URL for API calls. Bare hosts are reached over https.
    pub fn base_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{host}")
        }
    }
}

impl fmt::Debug for ControllerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerConfig")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("site", &self.site)
            .finish()
    }
}

/// HTTP method used for webhook calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WebhookMethod {
    #[default]
    Put,
    Post,
}

impl WebhookMethod {
    pub fn as_http(self) -> reqwest::Method {
        match self {
            Self::Put => reqwest::Method::PUT,
            Self::Post => reqwest::Method::POST,
        }
    }
}

impl FromStr for WebhookMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PUT" => Ok(Self::Put),
            "POST" => Ok(Self::Post),
            _ => Err("expected PUT or POST".to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: String,
    pub method: WebhookMethod,
}

/// Decision parameters. Immutable after startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdConfig {
    pub threshold: u32,
    pub poll_interval_secs: u64,
}

impl ThresholdConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Durable event store (PostgreSQL).
#[derive(Clone)]
pub struct StoreConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: Option<String>,
}

impl StoreConfig {
    pub fn connect_options(&self) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.username)
            .application_name("udm-monitor");
        match &self.password {
            Some(password) => options.password(password),
            None => options,
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("enabled", &self.enabled)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Validated `LOG_LEVEL` directive, e.g. `warn` or `udm_monitor=debug`.
    /// `None` defers to `RUST_LOG`.
    pub level: Option<String>,
    /// Directory holding the rotating `udm_monitor.log`.
    pub dir: PathBuf,
}

// ---------------------------------------------------------------------------
// MonitorConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub controller: ControllerConfig,
    pub webhook: WebhookConfig,
    pub threshold: ThresholdConfig,
    pub store: StoreConfig,
    pub log: LogConfig,
    /// Whether the process was detected to be running on the controller.
    pub on_controller: bool,
}

impl MonitorConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok(), running_on_controller())
    }

    /// Load using `lookup` for variable access.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F, on_controller: bool) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut missing = Vec::new();
        let mut invalid = Vec::new();

        let (default_host, default_user) = if on_controller {
            ("localhost", "root")
        } else {
            ("192.168.1.1", "admin")
        };

        let password = get("UDM_PASSWORD").unwrap_or_else(|| {
            missing.push("UDM_PASSWORD");
            String::new()
        });

        let controller = ControllerConfig {
            host: get("UDM_HOST").unwrap_or_else(|| default_host.into()),
            username: get("UDM_USERNAME").unwrap_or_else(|| default_user.into()),
            password,
            site: get("UDM_SITE").unwrap_or_else(|| DEFAULT_SITE.into()),
        };

        let webhook = WebhookConfig {
            url: get("WEBHOOK_URL").unwrap_or_else(|| DEFAULT_WEBHOOK_URL.into()),
            method: parse_var(&get, "WEBHOOK_METHOD", WebhookMethod::default(), &mut invalid),
        };

        let threshold = ThresholdConfig {
            threshold: parse_positive(&get, "CLIENT_THRESHOLD", DEFAULT_THRESHOLD, &mut invalid),
            poll_interval_secs: parse_positive(
                &get,
                "POLLING_INTERVAL",
                DEFAULT_POLL_INTERVAL_SECS,
                &mut invalid,
            ),
        };

        let store = StoreConfig {
            enabled: parse_var(&get, "LOG_STORE_ENABLED", true, &mut invalid),
            host: get("LOG_STORE_HOST").unwrap_or_else(|| "localhost".into()),
            port: parse_var(&get, "LOG_STORE_PORT", DEFAULT_STORE_PORT, &mut invalid),
            database: get("LOG_STORE_DB").unwrap_or_else(|| "udm_monitor".into()),
            username: get("LOG_STORE_USER").unwrap_or_else(|| "postgres".into()),
            password: get("LOG_STORE_PASSWORD"),
        };

        let log = LogConfig {
            level: get("LOG_LEVEL").and_then(|raw| match parse_log_level(&raw) {
                Ok(level) => Some(level),
                Err(reason) => {
                    invalid.push(InvalidVar {
                        var: "LOG_LEVEL",
                        value: raw,
                        reason,
                    });
                    None
                }
            }),
            dir: get("LOG_DIR").map_or_else(|| PathBuf::from("logs"), PathBuf::from),
        };

        if !missing.is_empty() || !invalid.is_empty() {
            return Err(ConfigError { missing, invalid });
        }

        Ok(Self {
            controller,
            webhook,
            threshold,
            store,
            log,
            on_controller,
        })
    }

    /// Log the effective configuration. Credentials are never logged.
    pub fn log_summary(&self) {
        tracing::info!(
            on_controller = self.on_controller,
            controller = %self.controller.base_url(),
            site = %self.controller.site,
            threshold = self.threshold.threshold,
            poll_interval_secs = self.threshold.poll_interval_secs,
            webhook_url = %self.webhook.url,
            webhook_method = %self.webhook.method.as_http(),
            store_enabled = self.store.enabled,
            "Loaded monitor configuration",
        );
    }
}

fn parse_var<G, T>(get: &G, var: &'static str, default: T, invalid: &mut Vec<InvalidVar>) -> T
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match get(var) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(e) => {
                invalid.push(InvalidVar {
                    var,
                    value: raw,
                    reason: e.to_string(),
                });
                default
            }
        },
    }
}

fn parse_positive<G, T>(get: &G, var: &'static str, default: T, invalid: &mut Vec<InvalidVar>) -> T
where
    G: Fn(&str) -> Option<String>,
    T: FromStr + PartialOrd + Default + Copy,
    T::Err: fmt::Display,
{
    let before = invalid.len();
    let value = parse_var(get, var, default, invalid);
    if invalid.len() == before && value <= T::default() {
        invalid.push(InvalidVar {
            var,
            value: get(var).unwrap_or_default(),
            reason: "must be greater than zero".to_string(),
        });
        return default;
    }
    value
}

/// Normalise `LOG_LEVEL` to a filter directive.
///
/// Takes a level name (`WARNING` and `CRITICAL` included, any case) or a
/// directive list with at least one `target=level` entry. A bare unknown
/// word is rejected because `EnvFilter` would read it as a target name.
fn parse_log_level(raw: &str) -> Result<String, String> {
    let raw = raw.trim();
    if raw.contains('=') {
        return EnvFilter::try_new(raw)
            .map(|_| raw.to_string())
            .map_err(|e| e.to_string());
    }
    let level = match raw.to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "info" => "info",
        "warn" | "warning" => "warn",
        "error" | "critical" => "error",
        "off" => "off",
        _ => {
            return Err(
                "expected trace, debug, info, warn, error, off or target=level directives".into(),
            )
        }
    };
    Ok(level.to_string())
}

/// Detect whether this process runs on the UniFi console itself.
pub fn running_on_controller() -> bool {
    CONTROLLER_MARKERS.iter().any(|p| Path::new(p).exists())
        || std::fs::read_to_string("/etc/hostname")
            .map(|name| name.to_ascii_lowercase().contains("ubnt"))
            .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn load(vars: &[(&str, &str)], on_controller: bool) -> Result<MonitorConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        MonitorConfig::from_lookup(|key| map.get(key).cloned(), on_controller)
    }

    #[test]
    fn defaults_apply_when_only_password_is_set() {
        let config = load(&[("UDM_PASSWORD", "secret")], false).unwrap();
        assert_eq!(config.controller.host, "192.168.1.1");
        assert_eq!(config.controller.username, "admin");
        assert_eq!(config.controller.site, "default");
        assert_eq!(config.webhook.url, DEFAULT_WEBHOOK_URL);
        assert_eq!(config.webhook.method, WebhookMethod::Put);
        assert_eq!(config.threshold.threshold, 30);
        assert_eq!(config.threshold.poll_interval(), Duration::from_secs(300));
        assert!(config.store.enabled);
        assert_eq!(config.store.port, 5432);
        assert_eq!(config.log.level, None);
    }

    #[test]
    fn on_controller_defaults_to_local_root() {
        let config = load(&[("UDM_PASSWORD", "secret")], true).unwrap();
        assert_eq!(config.controller.host, "localhost");
        assert_eq!(config.controller.username, "root");
    }

    #[test]
    fn missing_password_is_reported() {
        let err = load(&[], false).unwrap_err();
        assert_eq!(err.missing, ["UDM_PASSWORD"]);
        assert!(err.invalid.is_empty());
    }

    #[test]
    fn empty_password_counts_as_missing() {
        assert_matches!(
            load(&[("UDM_PASSWORD", "  ")], false),
            Err(ConfigError { missing, .. }) if missing == ["UDM_PASSWORD"]
        );
    }

    #[test]
    fn missing_and_invalid_are_reported_together() {
        let err = load(&[("CLIENT_THRESHOLD", "lots")], false).unwrap_err();

        assert_eq!(err.missing, ["UDM_PASSWORD"]);
        let names: Vec<_> = err.invalid.iter().map(|v| v.var).collect();
        assert_eq!(names, ["CLIENT_THRESHOLD"]);

        let message = err.to_string();
        assert!(message.contains("UDM_PASSWORD"), "{message}");
        assert!(message.contains("CLIENT_THRESHOLD=\"lots\""), "{message}");
    }

    #[test]
    fn every_invalid_value_is_listed() {
        let err = load(
            &[
                ("UDM_PASSWORD", "secret"),
                ("CLIENT_THRESHOLD", "lots"),
                ("POLLING_INTERVAL", "0"),
                ("WEBHOOK_METHOD", "PATCH"),
                ("LOG_LEVEL", "verbose"),
            ],
            false,
        )
        .unwrap_err();
        assert!(err.missing.is_empty());
        let names: Vec<_> = err.invalid.iter().map(|v| v.var).collect();
        assert_eq!(
            names,
            ["WEBHOOK_METHOD", "CLIENT_THRESHOLD", "POLLING_INTERVAL", "LOG_LEVEL"]
        );
    }

    #[test]
    fn log_level_accepts_python_style_names() {
        let level = |raw: &str| {
            load(&[("UDM_PASSWORD", "secret"), ("LOG_LEVEL", raw)], false)
                .unwrap()
                .log
                .level
        };
        assert_eq!(level("WARNING").as_deref(), Some("warn"));
        assert_eq!(level("CRITICAL").as_deref(), Some("error"));
        assert_eq!(level("Debug").as_deref(), Some("debug"));
        assert_eq!(
            level("warn,udm_monitor=debug").as_deref(),
            Some("warn,udm_monitor=debug")
        );
    }

    #[test]
    fn bare_unknown_log_level_is_invalid() {
        let err = load(&[("UDM_PASSWORD", "secret"), ("LOG_LEVEL", "NOTICE")], false).unwrap_err();
        assert_eq!(err.invalid.len(), 1);
        assert_eq!(err.invalid[0].var, "LOG_LEVEL");
        assert_eq!(err.invalid[0].value, "NOTICE");
    }

    #[test]
    fn directive_with_bad_level_is_invalid() {
        let err = load(
            &[("UDM_PASSWORD", "secret"), ("LOG_LEVEL", "udm_monitor=loud")],
            false,
        )
        .unwrap_err();
        assert_eq!(err.invalid[0].var, "LOG_LEVEL");
    }

    #[test]
    fn overrides_are_parsed() {
        let config = load(
            &[
                ("UDM_PASSWORD", "secret"),
                ("UDM_HOST", "10.0.0.1"),
                ("CLIENT_THRESHOLD", "12"),
                ("POLLING_INTERVAL", "60"),
                ("WEBHOOK_METHOD", "post"),
                ("LOG_STORE_ENABLED", "false"),
            ],
            false,
        )
        .unwrap();
        assert_eq!(config.controller.host, "10.0.0.1");
        assert_eq!(config.threshold.threshold, 12);
        assert_eq!(config.threshold.poll_interval_secs, 60);
        assert_eq!(config.webhook.method, WebhookMethod::Post);
        assert!(!config.store.enabled);
    }

    #[test]
    fn base_url_adds_https_to_bare_hosts() {
        let mut controller = load(&[("UDM_PASSWORD", "secret")], false).unwrap().controller;
        assert_eq!(controller.base_url(), "https://192.168.1.1");
        controller.host = "http://127.0.0.1:8443/".into();
        assert_eq!(controller.base_url(), "http://127.0.0.1:8443");
    }

    #[test]
    fn debug_output_hides_password() {
        let config = load(&[("UDM_PASSWORD", "hunter2")], false).unwrap();
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
