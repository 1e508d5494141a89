//! Caching, retrying wrapper around any [`TextService`].
//!
//! Each operation goes through the same path:
//! 1. Truncate the input to its configured bound
//! 2. Return a fresh cache entry if one exists
//! 3. Call the inner service under a per-call timeout
//! 4. Retry retryable failures with capped exponential backoff
//! 5. Cache the successful result
//!
//! Cache failures are logged and never fail the call. The `*_with` variants
//! take a [`CancellationToken`]: once it fires, no further retry is issued
//! and the last error is returned.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use xxhash_rust::xxh3::xxh3_64;

use crate::cache::{CacheEntry, CacheStore};
use crate::config::TextServiceConfig;
use crate::error::TextServiceError;
use crate::service::{Extraction, LanguageGuess, Operation, TextService};

/// Counters for remote text service usage.
#[derive(Debug, Default)]
pub struct TextServiceMetrics {
    /// Operations that missed the cache and went to the inner service
    pub calls: AtomicU64,
    pub cache_hits: AtomicU64,
    /// Extra attempts after a retryable failure
    pub retries: AtomicU64,
    /// Operations that ended in an error
    pub failures: AtomicU64,
}

impl TextServiceMetrics {
    /// Get all counts as a snapshot.
    pub fn snapshot(&self) -> TextServiceMetricsSnapshot {
        TextServiceMetricsSnapshot {
            calls: self.calls.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of text service metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextServiceMetricsSnapshot {
    pub calls: u64,
    pub cache_hits: u64,
    pub retries: u64,
    pub failures: u64,
}

/// [`TextService`] decorator adding truncation, caching, timeouts and retries.
pub struct CachedTextService<S> {
    inner: S,
    cache: Arc<dyn CacheStore>,
    config: TextServiceConfig,
    metrics: Arc<TextServiceMetrics>,
}

impl<S: TextService> CachedTextService<S> {
    /// Wrap `inner`. Fails on invalid configuration.
    pub fn new(
        inner: S,
        cache: Arc<dyn CacheStore>,
        config: TextServiceConfig,
    ) -> Result<Self, TextServiceError> {
        config.validate()?;
        Ok(Self {
            inner,
            cache,
            config,
            metrics: Arc::new(TextServiceMetrics::default()),
        })
    }

    /// Get metrics for this service.
    pub fn metrics(&self) -> Arc<TextServiceMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Get configuration.
    pub fn config(&self) -> &TextServiceConfig {
        &self.config
    }

    /// [`TextService::detect_language`] that stops retrying once `cancel` fires.
    pub async fn detect_language_with(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<LanguageGuess, TextServiceError> {
        let prefix = truncate_chars(text, self.config.language_prefix_chars);
        let key_input = normalize(prefix);
        self.cached_call(Operation::DetectLanguage, &key_input, cancel, || {
            self.inner.detect_language(prefix)
        })
        .await
    }

    /// [`TextService::synthesize_label`] that stops retrying once `cancel` fires.
    pub async fn synthesize_label_with(
        &self,
        candidates: &[String],
        cancel: &CancellationToken,
    ) -> Result<String, TextServiceError> {
        let truncated: Vec<String> = candidates
            .iter()
            .map(|c| truncate_chars(c, self.config.max_input_chars).to_string())
            .filter(|c| !c.trim().is_empty())
            .collect();
        if truncated.is_empty() {
            return Err(TextServiceError::Config(
                "no candidate strings to label".to_string(),
            ));
        }
        let key_input = truncated
            .iter()
            .map(|c| normalize(c))
            .collect::<Vec<_>>()
            .join("\n");
        self.cached_call(Operation::SynthesizeLabel, &key_input, cancel, || {
            self.inner.synthesize_label(&truncated)
        })
        .await
    }

    /// [`TextService::extract_entities`] that stops retrying once `cancel` fires.
    pub async fn extract_entities_with(
        &self,
        text: &str,
        language: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Extraction, TextServiceError> {
        let truncated = truncate_chars(text, self.config.max_input_chars);
        let key_input = format!("{}\n{}", language.unwrap_or("-"), normalize(truncated));
        self.cached_call(Operation::ExtractEntities, &key_input, cancel, || {
            self.inner.extract_entities(truncated, language)
        })
        .await
    }

    async fn cached_call<T, F, Fut>(
        &self,
        operation: Operation,
        key_input: &str,
        cancel: &CancellationToken,
        call: F,
    ) -> Result<T, TextServiceError>
    where
        T: Serialize + DeserializeOwned + Send,
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = Result<T, TextServiceError>> + Send,
    {
        let key = cache_key(operation, key_input);
        if let Some(value) = self.lookup::<T>(&key) {
            self.metrics.cache_hits.fetch_add(1, Ordering::Relaxed);
            debug!(operation = %operation, key = %key, "Text service cache hit");
            return Ok(value);
        }

        self.metrics.calls.fetch_add(1, Ordering::Relaxed);
        let value = self.call_with_retry(operation, cancel, call).await?;
        self.store(&key, &value);
        Ok(value)
    }

    async fn call_with_retry<T, F, Fut>(
        &self,
        operation: Operation,
        cancel: &CancellationToken,
        call: F,
    ) -> Result<T, TextServiceError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, TextServiceError>>,
    {
        let max_backoff = self.config.max_backoff();
        let mut backoff = ExponentialBackoff {
            initial_interval: self.config.initial_backoff(),
            max_interval: max_backoff,
            max_elapsed_time: None,
            ..Default::default()
        };
        backoff.reset();

        let mut attempts = 0;
        loop {
            attempts += 1;
            let result = match timeout(self.config.timeout(), call()).await {
                Ok(result) => result,
                Err(_) => Err(TextServiceError::Timeout),
            };

            let err = match result {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !err.is_retryable() {
                self.metrics.failures.fetch_add(1, Ordering::Relaxed);
                warn!(operation = %operation, error = %err, "Text service call failed");
                return Err(err);
            }

            if attempts >= self.config.max_attempts {
                self.metrics.failures.fetch_add(1, Ordering::Relaxed);
                error!(operation = %operation, attempts, error = %err, "Max retries exceeded");
                return Err(TextServiceError::RetriesExhausted {
                    operation: operation.to_string(),
                    attempts,
                    last_error: err.to_string(),
                });
            }

            if cancel.is_cancelled() {
                self.metrics.failures.fetch_add(1, Ordering::Relaxed);
                warn!(operation = %operation, attempts, error = %err, "Cancelled, not retrying");
                return Err(err);
            }

            let delay = backoff
                .next_backoff()
                .unwrap_or(max_backoff)
                .min(max_backoff);
            warn!(
                operation = %operation,
                attempt = attempts,
                error = %err,
                retry_in_ms = delay.as_millis() as u64,
                "Text service call failed, retrying"
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => {
                    self.metrics.failures.fetch_add(1, Ordering::Relaxed);
                    warn!(operation = %operation, attempts, error = %err, "Cancelled during backoff");
                    return Err(err);
                }
            }
            self.metrics.retries.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn lookup<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = match self.cache.get(key) {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed");
                return None;
            }
        };
        if entry.is_expired(Utc::now()) {
            debug!(key = %key, "Ignoring expired cache entry");
            return None;
        }
        match serde_json::from_value(entry.payload) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding unreadable cache entry");
                None
            }
        }
    }

    fn store<T: Serialize>(&self, key: &str, value: &T) {
        let payload = match serde_json::to_value(value) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(key = %key, error = %e, "Cannot serialize result for cache");
                return;
            }
        };
        if let Err(e) = self
            .cache
            .put(CacheEntry::new(key, payload, self.config.cache_ttl_secs))
        {
            warn!(key = %key, error = %e, "Cache write failed");
        }
    }
}

#[async_trait]
impl<S: TextService> TextService for CachedTextService<S> {
    async fn detect_language(&self, text: &str) -> Result<LanguageGuess, TextServiceError> {
        self.detect_language_with(text, &CancellationToken::new())
            .await
    }

    async fn synthesize_label(&self, candidates: &[String]) -> Result<String, TextServiceError> {
        self.synthesize_label_with(candidates, &CancellationToken::new())
            .await
    }

    async fn extract_entities(
        &self,
        text: &str,
        language: Option<&str>,
    ) -> Result<Extraction, TextServiceError> {
        self.extract_entities_with(text, language, &CancellationToken::new())
            .await
    }
}

/// `"<operation>:<xxh3 hex>"`.
pub fn cache_key(operation: Operation, normalized_input: &str) -> String {
    format!(
        "{}:{:016x}",
        operation.as_str(),
        xxh3_64(normalized_input.as_bytes())
    )
}

/// Longest prefix of at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::cache::MemoryCache;
    use crate::mock::{DisabledTextService, MockTextService};

    /// Fails according to a script, then succeeds. Records inputs.
    #[derive(Default)]
    struct ScriptedService {
        script: Mutex<VecDeque<TextServiceError>>,
        inputs: Mutex<Vec<String>>,
        calls: AtomicU64,
    }

    impl ScriptedService {
        fn failing_with(errors: Vec<TextServiceError>) -> Self {
            Self {
                script: Mutex::new(errors.into()),
                ..Default::default()
            }
        }

        fn next(&self, input: &str) -> Result<(), TextServiceError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.inputs.lock().unwrap().push(input.to_string());
            match self.script.lock().unwrap().pop_front() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl TextService for ScriptedService {
        async fn detect_language(&self, text: &str) -> Result<LanguageGuess, TextServiceError> {
            self.next(text)?;
            Ok(LanguageGuess {
                code: "en".to_string(),
                confidence: 0.9,
            })
        }

        async fn synthesize_label(&self, candidates: &[String]) -> Result<String, TextServiceError> {
            self.next(&candidates.join("|"))?;
            Ok("scripted label".to_string())
        }

        async fn extract_entities(
            &self,
            text: &str,
            _language: Option<&str>,
        ) -> Result<Extraction, TextServiceError> {
            self.next(text)?;
            Ok(Extraction::default())
        }
    }

    struct SlowService;

    #[async_trait]
    impl TextService for SlowService {
        async fn detect_language(&self, _text: &str) -> Result<LanguageGuess, TextServiceError> {
            tokio::time::sleep(Duration::from_secs(600)).await;
            Err(TextServiceError::Disabled)
        }

        async fn synthesize_label(&self, _c: &[String]) -> Result<String, TextServiceError> {
            Err(TextServiceError::Disabled)
        }

        async fn extract_entities(
            &self,
            _text: &str,
            _language: Option<&str>,
        ) -> Result<Extraction, TextServiceError> {
            Err(TextServiceError::Disabled)
        }
    }

    fn fast_config() -> TextServiceConfig {
        TextServiceConfig {
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
            ..Default::default()
        }
    }

    fn wrap<S: TextService>(inner: S, config: TextServiceConfig) -> CachedTextService<S> {
        CachedTextService::new(inner, Arc::new(MemoryCache::new()), config).unwrap()
    }

    #[tokio::test]
    async fn test_cache_hit_skips_inner() {
        let inner = Arc::new(MockTextService::new());
        let service = wrap(Arc::clone(&inner), fast_config());

        let a = service.detect_language("Hello  world").await.unwrap();
        let b = service.detect_language("Hello world").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(inner.calls(), 1);

        let metrics = service.metrics().snapshot();
        assert_eq!(metrics.calls, 1);
        assert_eq!(metrics.cache_hits, 1);
    }

    #[tokio::test]
    async fn test_operations_do_not_share_cache_keys() {
        let inner = Arc::new(MockTextService::new());
        let service = wrap(Arc::clone(&inner), fast_config());
        service.detect_language("Rust borrow checker").await.unwrap();
        service
            .extract_entities("Rust borrow checker", None)
            .await
            .unwrap();
        assert_eq!(inner.calls(), 2);
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let inner = Arc::new(ScriptedService::failing_with(vec![
            TextServiceError::RateLimited,
            TextServiceError::Http {
                status: 502,
                body: String::new(),
            },
        ]));
        let service = wrap(Arc::clone(&inner), fast_config());

        let label = service
            .synthesize_label(&["one".to_string(), "two".to_string()])
            .await
            .unwrap();
        assert_eq!(label, "scripted label");
        assert_eq!(inner.calls.load(Ordering::Relaxed), 3);

        let metrics = service.metrics().snapshot();
        assert_eq!(metrics.retries, 2);
        assert_eq!(metrics.failures, 0);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let inner = Arc::new(MockTextService::failing());
        let service = wrap(Arc::clone(&inner), fast_config());

        let err = service.detect_language("anything").await.unwrap_err();
        match err {
            TextServiceError::RetriesExhausted {
                operation,
                attempts,
                ..
            } => {
                assert_eq!(operation, "detect_language");
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(inner.calls(), 3);
        assert_eq!(service.metrics().snapshot().failures, 1);
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_retries() {
        let inner = Arc::new(ScriptedService::failing_with(vec![
            TextServiceError::RateLimited,
            TextServiceError::RateLimited,
        ]));
        let service = wrap(Arc::clone(&inner), fast_config());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = service
            .extract_entities_with("text", None, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, TextServiceError::RateLimited));
        assert_eq!(inner.calls.load(Ordering::Relaxed), 1);

        let metrics = service.metrics().snapshot();
        assert_eq!(metrics.retries, 0);
        assert_eq!(metrics.failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff_returns_last_error() {
        let inner = Arc::new(ScriptedService::failing_with(vec![
            TextServiceError::RateLimited,
            TextServiceError::RateLimited,
        ]));
        let config = TextServiceConfig {
            initial_backoff_ms: 60_000,
            max_backoff_ms: 60_000,
            ..Default::default()
        };
        let service = wrap(Arc::clone(&inner), config);
        let cancel = CancellationToken::new();

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                cancel.cancel();
            })
        };
        let err = service
            .detect_language_with("text", &cancel)
            .await
            .unwrap_err();
        canceller.await.unwrap();

        assert!(matches!(err, TextServiceError::RateLimited));
        assert_eq!(inner.calls.load(Ordering::Relaxed), 1);
        assert_eq!(service.metrics().snapshot().retries, 0);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_fast() {
        let service = wrap(DisabledTextService, fast_config());
        let err = service.extract_entities("text", None).await.unwrap_err();
        assert!(matches!(err, TextServiceError::Disabled));
        let metrics = service.metrics().snapshot();
        assert_eq!(metrics.retries, 0);
        assert_eq!(metrics.failures, 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let inner = Arc::new(ScriptedService::failing_with(vec![TextServiceError::Disabled]));
        let service = wrap(Arc::clone(&inner), fast_config());
        assert!(service.detect_language("text").await.is_err());
        assert!(service.detect_language("text").await.is_ok());
        assert_eq!(inner.calls.load(Ordering::Relaxed), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let config = TextServiceConfig {
            timeout_secs: 1,
            max_attempts: 1,
            ..fast_config()
        };
        let service = wrap(SlowService, config);
        let err = service.detect_language("slow").await.unwrap_err();
        match err {
            TextServiceError::RetriesExhausted { last_error, .. } => {
                assert_eq!(last_error, TextServiceError::Timeout.to_string());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_input_truncation() {
        let inner = Arc::new(ScriptedService::default());
        let config = TextServiceConfig {
            language_prefix_chars: 5,
            max_input_chars: 8,
            ..fast_config()
        };
        let service = wrap(Arc::clone(&inner), config);

        service.detect_language("héllo wörld").await.unwrap();
        service.extract_entities("ünïcödé text here", None).await.unwrap();

        let inputs = inner.inputs.lock().unwrap().clone();
        assert_eq!(inputs, vec!["héllo".to_string(), "ünïcödé ".to_string()]);
    }

    #[tokio::test]
    async fn test_expired_entries_ignored() {
        let inner = Arc::new(MockTextService::new());
        let config = TextServiceConfig {
            cache_ttl_secs: 0,
            ..fast_config()
        };
        let service = wrap(Arc::clone(&inner), config);
        service.detect_language("same text").await.unwrap();
        service.detect_language("same text").await.unwrap();
        assert_eq!(inner.calls(), 2);
    }

    #[tokio::test]
    async fn test_empty_candidates_rejected() {
        let inner = Arc::new(MockTextService::new());
        let service = wrap(Arc::clone(&inner), fast_config());
        assert!(service.synthesize_label(&["  ".to_string()]).await.is_err());
        assert_eq!(inner.calls(), 0);
    }

    #[test]
    fn test_cache_key_format() {
        let key = cache_key(Operation::SynthesizeLabel, "abc");
        assert!(key.starts_with("synthesize_label:"));
        assert_eq!(key.len(), "synthesize_label:".len() + 16);
        assert_eq!(key, cache_key(Operation::SynthesizeLabel, "abc"));
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abc", 5), "abc");
        assert_eq!(truncate_chars("日本語テキスト", 2), "日本");
        assert_eq!(truncate_chars("", 2), "");
    }
}
