//! In-process text services: a deterministic mock and a disabled stub.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::error::TextServiceError;
use crate::service::{Extraction, LanguageGuess, TextService};

/// Mock text service that produces deterministic results.
///
/// Useful for testing and dry runs without making API calls. A failing
/// variant returns a retryable error from every call.
pub struct MockTextService {
    language: String,
    fail: bool,
    calls: AtomicU64,
}

impl MockTextService {
    /// Mock that reports English for every text.
    pub fn new() -> Self {
        Self::with_language("en")
    }

    /// Mock that reports the given language for every text.
    pub fn with_language(code: impl Into<String>) -> Self {
        Self {
            language: code.into(),
            fail: false,
            calls: AtomicU64::new(0),
        }
    }

    /// Mock whose every call fails with a retryable API error.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    /// Number of calls received so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    fn record_call(&self) -> Result<(), TextServiceError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.fail {
            return Err(TextServiceError::Api("simulated failure".to_string()));
        }
        Ok(())
    }
}

impl Default for MockTextService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextService for MockTextService {
    async fn detect_language(&self, _text: &str) -> Result<LanguageGuess, TextServiceError> {
        self.record_call()?;
        Ok(LanguageGuess {
            code: self.language.clone(),
            confidence: 0.99,
        })
    }

    async fn synthesize_label(&self, candidates: &[String]) -> Result<String, TextServiceError> {
        self.record_call()?;
        let words = top_words(candidates.iter().map(String::as_str), 3);
        if words.is_empty() {
            return Err(TextServiceError::MalformedResponse("empty label".to_string()));
        }
        Ok(words.join(" "))
    }

    async fn extract_entities(
        &self,
        text: &str,
        _language: Option<&str>,
    ) -> Result<Extraction, TextServiceError> {
        self.record_call()?;
        let entities: BTreeSet<String> = text
            .split_whitespace()
            .skip(1)
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|w| w.chars().next().is_some_and(char::is_uppercase))
            .map(str::to_string)
            .collect();
        let keywords = top_words(std::iter::once(text), 5).into_iter().collect();
        Ok(Extraction { entities, keywords })
    }
}

/// Most frequent lower-cased words longer than four characters, ties by word.
fn top_words<'a>(texts: impl Iterator<Item = &'a str>, n: usize) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for text in texts {
        for word in text.split(|c: char| !c.is_alphanumeric()) {
            if word.chars().count() > 4 {
                *counts.entry(word.to_lowercase()).or_insert(0) += 1;
            }
        }
    }
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(n).map(|(w, _)| w).collect()
}

/// Text service used when no remote backend is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledTextService;

#[async_trait]
impl TextService for DisabledTextService {
    async fn detect_language(&self, _text: &str) -> Result<LanguageGuess, TextServiceError> {
        Err(TextServiceError::Disabled)
    }

    async fn synthesize_label(&self, _candidates: &[String]) -> Result<String, TextServiceError> {
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
