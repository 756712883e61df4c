//! Replication error types

use forgemq_store::StoreError;
use thiserror::Error;

/// Result type for replication operations
pub type Result<T> = std::result::Result<T, HaError>;

/// Replication errors
#[derive(Debug, Error)]
pub enum HaError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("master silent for {silent_ms} ms")]
    MasterSilent { silent_ms: u64 },

    #[error("replication stream diverged: slave at {slave_offset}, master frame at {master_offset}")]
    Diverged {
        slave_offset: i64,
        master_offset: i64,
    },

    #[error("invalid transfer frame: {0}")]
    InvalidFrame(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl HaError {
    /// A fatal error means the slave cannot resynchronize by
    /// reconnecting; it must be rebuilt from a snapshot.
    pub fn is_fatal(&self) -> bool {
        matches!(self, HaError::Diverged { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_divergence_is_fatal() {
        let err = HaError::Diverged {
            slave_offset: 500,
            master_offset: 600,
        };
        assert!(err.is_fatal());
        assert!(!HaError::ConnectionClosed.is_fatal());
        assert!(!HaError::MasterSilent { silent_ms: 21_000 }.is_fatal());
    }
}
