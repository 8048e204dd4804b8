//! Row structs and insert DTOs.

pub mod threshold_event;
