//! Topic error types.

use thiserror::Error;

/// Errors that can occur during vectorization, clustering or labeling.
#[derive(Debug, Error)]
pub enum TopicsError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
