//! Queries over the event log tables, grouped per table.

pub mod threshold_event_repo;

pub use threshold_event_repo::ThresholdEventRepo;
