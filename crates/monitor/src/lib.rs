//! `udm-monitor` library crate.
//!
//! Re-exports internal modules for integration testing. The binary
//! entrypoint lives in `main.rs`.

pub mod config;
pub mod controller;
pub mod logging;
pub mod machine;
pub mod notifier;
pub mod poller;
pub mod recorder;
pub mod retention;
pub mod store;
