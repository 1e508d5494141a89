//! Remote text service configuration.

use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::TextServiceError;

/// Backend that serves text operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// No remote service; every call fails with `Disabled`
    #[default]
    Disabled,
    /// OpenAI-compatible chat completions endpoint
    OpenAi,
    /// Anthropic messages endpoint
    Anthropic,
    /// Deterministic in-process service
    Mock,
}

impl Provider {
    /// Default API base URL, if the provider talks HTTP.
    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Provider::OpenAi => Some("https://api.openai.com/v1"),
            Provider::Anthropic => Some("https://api.anthropic.com/v1"),
            Provider::Disabled | Provider::Mock => None,
        }
    }

    /// Whether calls go over the network.
    pub fn is_remote(&self) -> bool {
        self.default_base_url().is_some()
    }
}

/// Remote text service settings.
///
/// The API key is only deserialized, never serialized back out.
#[derive(Debug, Clone, Deserialize)]
pub struct TextServiceConfig {
    #[serde(default)]
    pub provider: Provider,

    /// Model to use (e.g., "gpt-4o-mini", "claude-3-haiku-20240307")
    #[serde(default = "default_model")]
    pub model: String,

    /// API key; required for remote providers
    #[serde(default)]
    pub api_key: Option<SecretString>,

    /// Override for the provider's base URL
    #[serde(default)]
    pub base_url: Option<String>,

    /// Per-call timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts per operation, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Lifetime of cached responses
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Characters of document text sent for extraction
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,

    /// Characters of document text sent for language detection
    #[serde(default = "default_language_prefix_chars")]
    pub language_prefix_chars: usize,

    /// Upper bound on in-flight remote requests
    #[serde(default = "default_max_concurrent_calls")]
    pub max_concurrent_calls: usize,
}

impl Default for TextServiceConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            model: default_model(),
            api_key: None,
            base_url: None,
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            cache_ttl_secs: default_cache_ttl_secs(),
            max_input_chars: default_max_input_chars(),
            language_prefix_chars: default_language_prefix_chars(),
            max_concurrent_calls: default_max_concurrent_calls(),
        }
    }
}

impl TextServiceConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), TextServiceError> {
        if self.max_attempts == 0 {
            return Err(TextServiceError::Config(
                "max_attempts must be >= 1".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(TextServiceError::Config(
                "timeout_secs must be > 0".to_string(),
            ));
        }
        if self.max_concurrent_calls == 0 {
            return Err(TextServiceError::Config(
                "max_concurrent_calls must be > 0".to_string(),
            ));
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(TextServiceError::Config(format!(
                "initial_backoff_ms ({}) exceeds max_backoff_ms ({})",
                self.initial_backoff_ms, self.max_backoff_ms
            )));
        }
        if self.max_input_chars == 0 || self.language_prefix_chars == 0 {
            return Err(TextServiceError::Config(
                "input character limits must be > 0".to_string(),
            ));
        }
        if self.provider.is_remote() && self.model.trim().is_empty() {
            return Err(TextServiceError::Config(format!(
                "model is required for provider {:?}",
                self.provider
            )));
        }
        Ok(())
    }

    /// Base URL to use: the override, else the provider default.
    pub fn effective_base_url(&self) -> Option<String> {
        self.base_url
            .clone()
            .or_else(|| self.provider.default_base_url().map(str::to_string))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_attempts() -> u32 {
    3
}
fn default_initial_backoff_ms() -> u64 {
    200
}
fn default_max_backoff_ms() -> u64 {
    2000
}
fn default_cache_ttl_secs() -> u64 {
    14 * 24 * 60 * 60
}
fn default_max_input_chars() -> usize {
    4000
}
fn default_language_prefix_chars() -> usize {
    1000
}
fn default_max_concurrent_calls() -> usize {
    8
}
