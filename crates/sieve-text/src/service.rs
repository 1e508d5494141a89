//! Text service capability trait and result types.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::api::ApiTextService;
use crate::config::{Provider, TextServiceConfig};
use crate::error::TextServiceError;
use crate::mock::{DisabledTextService, MockTextService};

/// Detected language of a text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageGuess {
    /// ISO 639-1 code, lower-case
    pub code: String,
    /// Confidence in [0.0, 1.0]
    pub confidence: f32,
}

/// Entities and keywords extracted from a text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub entities: BTreeSet<String>,
    pub keywords: BTreeSet<String>,
}

/// Remote operation kinds. Used for cache keys, logs and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    DetectLanguage,
    SynthesizeLabel,
    ExtractEntities,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::DetectLanguage => "detect_language",
            Operation::SynthesizeLabel => "synthesize_label",
            Operation::ExtractEntities => "extract_entities",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remote language-model capabilities.
///
/// Callers never branch on which backend is behind this trait.
#[async_trait]
pub trait TextService: Send + Sync {
    /// Identify the language of `text`.
    async fn detect_language(&self, text: &str) -> Result<LanguageGuess, TextServiceError>;

    /// Produce a short topic label from representative strings.
    async fn synthesize_label(&self, candidates: &[String]) -> Result<String, TextServiceError>;

    /// Extract named entities and keywords from `text`.
    async fn extract_entities(
        &self,
        text: &str,
        language: Option<&str>,
    ) -> Result<Extraction, TextServiceError>;
}

#[async_trait]
impl<T: TextService + ?Sized> TextService for Arc<T> {
    async fn detect_language(&self, text: &str) -> Result<LanguageGuess, TextServiceError> {
        (**self).detect_language(text).await
    }

    async fn synthesize_label(&self, candidates: &[String]) -> Result<String, TextServiceError> {
        (**self).synthesize_label(candidates).await
    }

    async fn extract_entities(
        &self,
        text: &str,
        language: Option<&str>,
    ) -> Result<Extraction, TextServiceError> {
        (**self).extract_entities(text, language).await
    }
}

/// Construct the backend named by `config.provider`.
pub fn build_text_service(
    config: &TextServiceConfig,
) -> Result<Arc<dyn TextService>, TextServiceError> {
    config.validate()?;
    Ok(match config.provider {
        Provider::Disabled => Arc::new(DisabledTextService),
        Provider::Mock => Arc::new(MockTextService::new()),
        Provider::OpenAi | Provider::Anthropic => Arc::new(ApiTextService::new(config)?),
    })
}
