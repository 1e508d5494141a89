//! Error types for remote text service calls and the response cache.

use thiserror::Error;

/// Error type for remote text service operations.
#[derive(Debug, Error)]
pub enum TextServiceError {
    /// Transport-level failure (connection refused, DNS, TLS)
    #[error("API request failed: {0}")]
    Api(String),

    /// Non-success HTTP status other than 429
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Timeout waiting for response")]
    Timeout,

    /// Response could not be parsed or violated the expected schema
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Remote service is switched off
    #[error("Text service disabled")]
    Disabled,

    #[error("{operation} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last_error: String,
    },
}

impl TextServiceError {
    /// Whether another attempt could succeed.
    ///
    /// Transport failures, 429s, 5xx responses, timeouts and malformed
    /// responses are retried. Configuration problems, a disabled service
    /// and other client errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            TextServiceError::Api(_)
            | TextServiceError::RateLimited
            | TextServiceError::Timeout
            | TextServiceError::MalformedResponse(_) => true,
            TextServiceError::Http { status, .. } => *status >= 500,
            TextServiceError::Config(_)
            | TextServiceError::Disabled
            | TextServiceError::RetriesExhausted { .. } => false,
        }
    }
}

/// Error type for cache backends.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
