//! Document records.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SieveError;

/// A unique identifier for a document (ULID).
pub type DocumentId = String;

/// Processing status of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Just harvested, nothing applied yet
    #[default]
    Raw,
    /// Survived deduplication
    Deduped,
    /// Clustered and enriched with entities/keywords
    Processed,
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentStatus::Raw => write!(f, "raw"),
            DocumentStatus::Deduped => write!(f, "deduped"),
            DocumentStatus::Processed => write!(f, "processed"),
        }
    }
}

/// A harvested text document.
///
/// Mutated in place as it traverses the pipeline: the deduplicator fills in
/// `canonical_url` and moves it to `Deduped`, enrichment fills `language`,
/// `entities` and `keywords` and moves it to `Processed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier
    pub id: DocumentId,
    /// Origin identifier as supplied by the source (may be malformed)
    pub origin_url: Option<String>,
    /// Normalized origin, set during deduplication
    #[serde(default)]
    pub canonical_url: Option<String>,
    /// Full text content
    pub content: String,
    /// ISO 639-1 language code, when known
    #[serde(default)]
    pub language: Option<String>,
    /// Pipeline status
    #[serde(default)]
    pub status: DocumentStatus,
    /// Named entities
    #[serde(default)]
    pub entities: BTreeSet<String>,
    /// Keywords
    #[serde(default)]
    pub keywords: BTreeSet<String>,
    /// When the document entered the pipeline
    pub timestamp: DateTime<Utc>,
}

impl Document {
    /// Create a raw document with a fresh ULID.
    pub fn new(origin_url: Option<String>, content: String, language: Option<String>) -> Self {
        Self::with_id(ulid::Ulid::new().to_string(), origin_url, content, language)
    }

    /// Create a raw document with a caller-supplied id.
    pub fn with_id(
        id: impl Into<String>,
        origin_url: Option<String>,
        content: String,
        language: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            origin_url,
            canonical_url: None,
            content,
            language,
            status: DocumentStatus::Raw,
            entities: BTreeSet::new(),
            keywords: BTreeSet::new(),
            timestamp: Utc::now(),
        }
    }

    /// Serialize to JSON bytes for storage
    pub fn to_bytes(&self) -> Result<Vec<u8>, SieveError> {
        serde_json::to_vec(self).map_err(SieveError::from)
    }

    /// Deserialize from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SieveError> {
        serde_json::from_slice(bytes).map_err(SieveError::from)
    }
}

/// A document as supplied by a document source.
///
/// Sources give no uniqueness or well-formedness guarantee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    /// Origin URL, if any
    #[serde(default, alias = "url")]
    pub origin_url: Option<String>,
    /// Text content
    #[serde(default, alias = "text")]
    pub content: String,
    /// Language hint
    #[serde(default)]
    pub language: Option<String>,
}

impl SourceDocument {
    /// Parse one JSON-lines record.
    pub fn parse_line(line: &str) -> Result<Self, SieveError> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Err(SieveError::InvalidInput("empty line".to_string()));
        }
        Ok(serde_json::from_str(trimmed)?)
    }

    /// Convert into a raw pipeline document.
    pub fn into_document(self) -> Document {
        let language = self
            .language
            .map(|l| l.trim().to_lowercase())
            .filter(|l| !l.is_empty());
        Document::new(self.origin_url, self.content, language)
    }
}
