//! Error types shared across the topic-sieve crates.

use thiserror::Error;

/// Errors raised by shared domain types.
#[derive(Debug, Error)]
pub enum SieveError {
    /// Input record could not be accepted
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An internal invariant was violated (programming error)
    #[error("Invariant violated: {0}")]
    Invariant(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
