//! `udm-monitor` -- connected-client threshold monitor.
//!
//! Polls a UniFi controller for the number of connected clients and flips
//! the downstream bonding feature through a webhook when the count crosses
//! `CLIENT_THRESHOLD`. Each transition is logged to PostgreSQL (7-day
//! retention) and to the rotating text log.
//!
//! See [`udm_monitor::config`] for the environment variables.
//!
//! Exit codes: `0` after a SIGINT/SIGTERM shutdown, `1` on configuration or
//! startup failure.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use udm_monitor::config::{MonitorConfig, USAGE};
use udm_monitor::controller::UnifiController;
use udm_monitor::machine::ThresholdMachine;
use udm_monitor::notifier::WebhookNotifier;
use udm_monitor::poller::Poller;
use udm_monitor::recorder::EventRecorder;
use udm_monitor::store::PgEventStore;
use udm_monitor::{logging, retention};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // --- Configuration ---
    let config = match MonitorConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}\n\n{USAGE}");
            return ExitCode::FAILURE;
        }
    };

    // --- Tracing ---
    let _log_guard = match logging::init(&config.log) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = ?e, "Startup failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: MonitorConfig) -> anyhow::Result<()> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting udm-monitor");
    config.log_summary();

    let cancel = CancellationToken::new();

    // --- Event store ---
    let (recorder, retention_handle) = if config.store.enabled {
        let pool = udm_db::create_lazy_pool(config.store.connect_options());
        let store = Arc::new(PgEventStore::new(pool));

        match store.startup_check().await {
            Ok(Some(latest)) => match latest.to_event() {
                Ok(event) => tracing::info!(
                    action = %event.action,
                    clients = event.client_count,
                    recorded_at = %event.timestamp,
                    "Event store connected, last recorded transition loaded"
                ),
                Err(e) => tracing::warn!(error = %e, key = %latest.event_key, "Unreadable stored event"),
            },
            Ok(None) => tracing::info!("Event store connected, no recorded transitions"),
            Err(e) => tracing::warn!(
                error = %e,
                "Event store unavailable, transitions go to the text log until it recovers"
            ),
        }

        let handle = tokio::spawn(retention::run(store.clone(), cancel.clone()));
        (EventRecorder::new(store), Some(handle))
    } else {
        tracing::info!("Durable event store disabled, logging transitions to file only");
        (EventRecorder::text_only(), None)
    };

    // --- Collaborators ---
    let notifier =
        Arc::new(WebhookNotifier::new(&config.webhook).context("failed to build webhook client")?);
    let controller = Arc::new(UnifiController::new(&config.controller));
    let machine = ThresholdMachine::new(config.threshold.threshold, notifier, recorder);
    let mut poller = Poller::new(controller, machine, config.threshold.poll_interval());

    // --- Shutdown ---
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_cancel.cancel();
    });

    poller.run(cancel.clone()).await;

    cancel.cancel();
    if let Some(handle) = retention_handle {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    tracing::info!("Monitoring stopped");
    Ok(())
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), stopping after the current cycle");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, stopping after the current cycle");
        }
    }
}
