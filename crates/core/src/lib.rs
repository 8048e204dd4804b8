//! Domain types and pure decision logic for the UDM threshold monitor.
//!
//! Nothing in this crate performs I/O. The monitor crate feeds readings in
//! and acts on the decisions that come out.

pub mod bonding;
pub mod error;
pub mod event;
pub mod types;
