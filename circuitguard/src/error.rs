//! Error type for loading and scheduling.
//!
//! Validation findings are never errors; only table/config loading and
//! awaiting a debounced request can fail.

#[derive(Debug, thiserror::Error)]
pub enum CircuitGuardError {
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid reference tables: {0}")]
    InvalidTables(String),
    #[error("Validation for '{key}' was cancelled")]
    Cancelled { key: String },
}
