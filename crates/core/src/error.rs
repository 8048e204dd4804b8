#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Unknown bonding action: {0}")]
    UnknownAction(String),

    #[error("Unknown webhook state: {0}")]
    UnknownState(String),

    #[error("Value out of range for {field}: {value}")]
    OutOfRange { field: &'static str, value: i64 },
}
