//! Service error types.

use thiserror::Error;

use sieve_dedup::DedupError;
use sieve_storage::StorageError;
use sieve_text::{CacheError, TextServiceError};
use sieve_topics::TopicsError;
use sieve_types::SieveError;

/// Errors surfaced by the orchestration service.
///
/// Remote text service failures inside a run are converted to fallbacks and
/// recorded in the run report; they only appear here when construction fails.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Invalid or unloadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal invariant violation
    #[error("Invariant violated: {0}")]
    Invariant(String),

    #[error("Deduplication error: {0}")]
    Dedup(#[from] DedupError),

    #[error("Topic error: {0}")]
    Topics(#[from] TopicsError),

    #[error("Text service error: {0}")]
    TextService(#[from] TextServiceError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Blocking worker panicked or was cancelled
    #[error("Worker task failed: {0}")]
    Task(String),
}

impl From<SieveError> for ServiceError {
    fn from(err: SieveError) -> Self {
        match err {
            SieveError::Invariant(msg) => ServiceError::Invariant(msg),
            SieveError::InvalidInput(msg) => ServiceError::InvalidInput(msg),
            other => ServiceError::InvalidInput(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for ServiceError {
    fn from(err: tokio::task::JoinError) -> Self {
        ServiceError::Task(err.to_string())
    }
}
