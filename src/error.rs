// src/error.rs
// Standardized error types for Cortex

use thiserror::Error;

/// Main error type for the Cortex library.
///
/// Adapter and registry failures never surface through this type (they are
/// captured as `AdapterStats`, see `crate::registry`); only failures that
/// the orchestrator cannot route around reach a caller as `Err`.
#[derive(Error, Debug)]
pub enum CortexError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("config missing at {0}")]
    ConfigMissing(String),

    #[error("config invalid: {0}")]
    ConfigInvalid(String),

    #[error("storage read failed: {0}")]
    StorageReadFailed(String),

    #[error("storage write failed: {0}")]
    StorageWriteFailed(String),

    #[error("lock timeout after {waited_ms}ms for resource {resource}")]
    LockTimeout { resource: String, waited_ms: u64 },

    #[error("adapter {0} unavailable")]
    AdapterUnavailable(String),

    #[error("adapter {0} timed out")]
    AdapterTimeout(String),

    #[error("adapter {adapter} error: {message}")]
    AdapterError { adapter: String, message: String },

    #[error("encryption error: {0}")]
    Encryption(String),

    #[error("queue capacity exceeded for resource {0}")]
    QueueFull(String),

    #[error("unknown storage resource: {0}")]
    UnknownResource(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("task cancelled")]
    Cancelled,

    #[error("unknown error: {0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Convenience type alias for Result using CortexError
pub type Result<T> = std::result::Result<T, CortexError>;

impl CortexError {
    pub fn to_user_string(&self) -> String {
        self.to_string()
    }
}

impl From<String> for CortexError {
    fn from(s: String) -> Self {
        CortexError::Other(s)
    }
}

impl From<tokio::task::JoinError> for CortexError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_cancelled() {
            CortexError::Cancelled
        } else {
            CortexError::Other(err.to_string())
        }
    }
}

impl From<CortexError> for String {
    fn from(err: CortexError) -> Self {
        err.to_string()
    }
}
