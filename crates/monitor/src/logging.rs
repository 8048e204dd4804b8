//! Tracing subscriber setup: stdout plus a daily-rotating log file.

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConfig;
use crate::recorder::TRANSITION_LOG_TARGET;

/// File name prefix inside `LOG_DIR`. The appender adds a date suffix.
pub const LOG_FILE_NAME: &str = "udm_monitor.log";

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must be kept
/// alive for the life of the process.
pub fn init(config: &LogConfig) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(&config.dir)
        .with_context(|| format!("failed to create log directory {}", config.dir.display()))?;

    let appender = tracing_appender::rolling::daily(&config.dir, LOG_FILE_NAME);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(build_filter(config.level.as_deref()))
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(guard)
}

/// `LOG_LEVEL` when set, otherwise a non-empty `RUST_LOG`, otherwise `info`.
///
/// Transition lines are let through at `info` whatever the base level.
fn build_filter(level: Option<&str>) -> EnvFilter {
    let base = level
        .map(str::to_string)
        .or_else(|| {
            std::env::var(EnvFilter::DEFAULT_ENV)
                .ok()
                .filter(|v| !v.trim().is_empty())
        })
        .unwrap_or_else(|| "info".to_string());
    let transitions = format!("{TRANSITION_LOG_TARGET}=info");

    EnvFilter::try_new(format!("{base},{transitions}"))
        .unwrap_or_else(|_| EnvFilter::new(format!("info,{transitions}")))
}
