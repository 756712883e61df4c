//! Store error types

use std::path::PathBuf;
use thiserror::Error;

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to load index file {}: {source}", path.display())]
    IndexLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("index is not writable")]
    IndexUnwritable,

    #[error("append offset mismatch: expected {expected}, got {got}")]
    OffsetMismatch { expected: i64, got: i64 },

    #[error("offset {offset} out of range [{min}, {max})")]
    OffsetOutOfRange { offset: i64, min: i64, max: i64 },

    #[error("shutdown in progress")]
    ShuttingDown,
}

impl StoreError {
    /// Check if this error is fatal for broker startup
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::IndexLoad { .. })
    }
}
