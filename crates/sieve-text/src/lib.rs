//! # sieve-text
//!
//! Client for the remote language-model service used to detect languages,
//! synthesize cluster labels and extract entities and keywords.
//!
//! The remote service is the only networked, fallible and billable
//! dependency of the pipeline. Every provider sits behind the
//! [`TextService`] capability trait; [`CachedTextService`] adds input
//! truncation, a TTL cache, per-call timeouts and bounded retries on top of
//! any implementation.
//!
//! ## Implementations
//! - [`ApiTextService`]: OpenAI-compatible or Anthropic HTTP APIs
//! - [`MockTextService`]: deterministic, no network
//! - [`DisabledTextService`]: fails every call, for offline runs

pub mod api;
pub mod cache;
pub mod cached;
pub mod config;
pub mod error;
pub mod mock;
pub mod service;

pub use api::ApiTextService;
pub use cache::{CacheEntry, CacheStore, MemoryCache};
pub use cached::{CachedTextService, TextServiceMetrics, TextServiceMetricsSnapshot};
pub use config::{Provider, TextServiceConfig};
pub use error::{CacheError, TextServiceError};
pub use mock::{DisabledTextService, MockTextService};
pub use service::{build_text_service, Extraction, LanguageGuess, Operation, TextService};
