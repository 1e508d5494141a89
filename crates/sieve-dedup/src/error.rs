//! Deduplication error types.

use thiserror::Error;

/// Errors that can occur while configuring or restoring deduplication state.
#[derive(Debug, Error)]
pub enum DedupError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Snapshot was produced with different fingerprint parameters
    #[error("Snapshot mismatch: {0}")]
    SnapshotMismatch(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
