//! Batch deduplication.
//!
//! Stable order, first occurrence wins. Each document is checked against
//! the canonical-URL set first (no fingerprinting on a hit), then against
//! the near-duplicate index. Detection never destroys data on failure:
//! unparsable URLs and empty content fall through to "keep".

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use sieve_types::{Document, DocumentId, DocumentStatus};

use crate::canonical::canonicalize;
use crate::config::DedupConfig;
use crate::error::DedupError;
use crate::fingerprint::Fingerprinter;
use crate::index::{IndexSnapshot, NearDuplicateIndex};

/// Why a document was removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKind {
    /// Same canonical URL as an earlier document
    ExactUrl,
    /// Content within the similarity threshold of an earlier document
    NearDuplicate,
}

/// Record of a removed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateRecord {
    /// Removed document
    pub doc_id: DocumentId,
    /// Surviving document it duplicates
    pub duplicate_of: DocumentId,
    /// Detection path
    pub kind: DuplicateKind,
    /// Estimated similarity (near-duplicates only)
    pub similarity: Option<f64>,
}

/// Statistics for one deduplication batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DedupStats {
    /// Documents submitted
    pub total_input: usize,
    /// Documents kept
    pub unique: usize,
    /// Removed by canonical-URL match
    pub exact_url_duplicates: usize,
    /// Removed by content similarity
    pub near_duplicates: usize,
    /// Documents with no content to fingerprint
    pub empty_content: usize,
    /// Origins that could not be canonicalized
    pub url_fallbacks: usize,
    /// One record per removed document
    pub duplicates: Vec<DuplicateRecord>,
}

impl DedupStats {
    /// Total documents removed.
    pub fn duplicates_removed(&self) -> usize {
        self.exact_url_duplicates + self.near_duplicates
    }

    /// Fraction of the input that was removed.
    pub fn duplicate_rate(&self) -> f64 {
        if self.total_input == 0 {
            return 0.0;
        }
        self.duplicates_removed() as f64 / self.total_input as f64
    }

    fn record(&mut self, doc_id: &str, duplicate_of: &str, kind: DuplicateKind, similarity: Option<f64>) {
        match kind {
            DuplicateKind::ExactUrl => self.exact_url_duplicates += 1,
            DuplicateKind::NearDuplicate => self.near_duplicates += 1,
        }
        self.duplicates.push(DuplicateRecord {
            doc_id: doc_id.to_string(),
            duplicate_of: duplicate_of.to_string(),
            kind,
            similarity,
        });
    }
}

/// Filters document batches down to a unique subset.
///
/// Owns its [`NearDuplicateIndex`], which grows across batches for the
/// lifetime of the instance. Not safe for concurrent use; callers that share
/// one must serialize access.
pub struct Deduplicator {
    config: DedupConfig,
    fingerprinter: Fingerprinter,
    index: NearDuplicateIndex,
}

impl Deduplicator {
    /// Create a deduplicator with an empty index.
    pub fn new(config: DedupConfig) -> Result<Self, DedupError> {
        let index = NearDuplicateIndex::new(&config)?;
        Ok(Self {
            fingerprinter: Fingerprinter::new(&config),
            config,
            index,
        })
    }

    /// Create a deduplicator from a persisted index snapshot.
    pub fn restore(config: DedupConfig, snapshot: IndexSnapshot) -> Result<Self, DedupError> {
        let index = NearDuplicateIndex::restore(&config, snapshot)?;
        Ok(Self {
            fingerprinter: Fingerprinter::new(&config),
            config,
            index,
        })
    }

    /// The backing index.
    pub fn index(&self) -> &NearDuplicateIndex {
        &self.index
    }

    /// Capture the index state for persistence.
    pub fn snapshot(&self) -> IndexSnapshot {
        self.index.snapshot()
    }

    /// Configuration in use.
    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    /// Filter `documents` to those not already seen.
    ///
    /// Survivors keep input order, gain a `canonical_url` and move to
    /// [`DocumentStatus::Deduped`]. A document already indexed under its own
    /// id is recognized as itself, so re-submitting a unique batch returns it
    /// unchanged. A second copy of an id within the same batch is removed.
    pub fn deduplicate(&mut self, documents: Vec<Document>) -> (Vec<Document>, DedupStats) {
        let mut stats = DedupStats {
            total_input: documents.len(),
            ..Default::default()
        };
        let mut unique = Vec::with_capacity(documents.len());
        let mut kept: HashSet<DocumentId> = HashSet::new();

        for mut doc in documents {
            let canonical = canonicalize(doc.origin_url.as_deref(), &self.config.tracking_params);
            if canonical.is_fallback() {
                stats.url_fallbacks += 1;
            }
            let url_key = canonical.match_key().map(str::to_string);
            doc.canonical_url = canonical.into_recorded();

            // Repeat of a document already kept from this batch
            if kept.contains(&doc.id) {
                debug!(doc_id = %doc.id, "Document repeated within batch");
                let (kind, similarity) = match url_key {
                    Some(_) => (DuplicateKind::ExactUrl, None),
                    None => (DuplicateKind::NearDuplicate, Some(1.0)),
                };
                stats.record(&doc.id, &doc.id, kind, similarity);
                continue;
            }

            // Cheap path: canonical URL already claimed by another document
            if let Some(url) = url_key.as_deref() {
                if let Some(owner) = self.index.canonical_url_owner(url) {
                    if owner != doc.id {
                        debug!(doc_id = %doc.id, duplicate_of = owner, url, "Exact URL duplicate");
                        let owner = owner.to_string();
                        stats.record(&doc.id, &owner, DuplicateKind::ExactUrl, None);
                        continue;
                    }
                }
            }

            let fingerprint = self.fingerprinter.fingerprint(&doc.content);
            if fingerprint.is_empty() {
                debug!(doc_id = %doc.id, "No content to fingerprint, keeping document");
                stats.empty_content += 1;
            } else if let Some((owner, similarity)) = self.index.query_with_similarity(&fingerprint) {
                if owner != doc.id {
                    debug!(
                        doc_id = %doc.id,
                        duplicate_of = owner,
                        similarity,
                        "Near-duplicate content"
                    );
                    let owner = owner.to_string();
                    if let Some(url) = url_key {
                        self.index.remember_canonical_url(url, owner.clone());
                    }
                    stats.record(&doc.id, &owner, DuplicateKind::NearDuplicate, Some(similarity));
                    continue;
                }
            }

            if !fingerprint.is_empty() && !self.index.contains_document(&doc.id) {
                self.index.insert(doc.id.clone(), fingerprint);
            }
            if let Some(url) = url_key {
                self.index.remember_canonical_url(url, doc.id.clone());
            }
            doc.status = DocumentStatus::Deduped;
            kept.insert(doc.id.clone());
            unique.push(doc);
        }

        stats.unique = unique.len();
        info!(
            total = stats.total_input,
            unique = stats.unique,
            exact_url = stats.exact_url_duplicates,
            near_duplicate = stats.near_duplicates,
            rate = stats.duplicate_rate(),
            "Deduplication batch complete"
        );
        (unique, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn doc(id: &str, url: Option<&str>, content: &str) -> Document {
        Document::with_id(id, url.map(String::from), content.to_string(), None)
    }

    fn dedup() -> Deduplicator {
        Deduplicator::new(DedupConfig::default()).unwrap()
    }

    #[test]
    fn test_exact_url_precedence_over_content() {
        let mut d = dedup();
        let docs = vec![
            doc("a", Some("https://example.com/post"), "volcanic activity rises on the island chain"),
            doc("b", Some("https://www.example.com/post/?utm_source=x"), "a recipe for sourdough bread with rye"),
        ];
        let (unique, stats) = d.deduplicate(docs);
        assert_eq!(unique.len(), 1);
        assert_eq!(unique[0].id, "a");
        assert_eq!(stats.exact_url_duplicates, 1);
        assert_eq!(stats.near_duplicates, 0);
        assert_eq!(stats.duplicates[0].kind, DuplicateKind::ExactUrl);
        assert_eq!(stats.duplicates[0].duplicate_of, "a");
    }

    #[test]
    fn test_near_duplicate_content() {
        let mut d = dedup();
        let base = "the city council approved a new budget for public transit expansion \
                    including three new tram lines and an upgraded bus fleet for the northern districts";
        let variant = "the city council approved a new budget for public transit expansion \
                       including three new tram lines and an upgraded bus fleet for the southern districts";
        let (unique, stats) = d.deduplicate(vec![doc("a", None, base), doc("b", None, variant)]);
        assert_eq!(unique.len(), 1);
        assert_eq!(stats.near_duplicates, 1);
        assert!(stats.duplicates[0].similarity.unwrap() >= 0.7);
    }

    #[test]
    fn test_survivors_marked_and_canonicalized() {
        let mut d = dedup();
        let (unique, _) = d.deduplicate(vec![doc("a", Some("https://WWW.Site.org/x/"), "some content here")]);
        assert_eq!(unique[0].status, DocumentStatus::Deduped);
        assert_eq!(unique[0].canonical_url.as_deref(), Some("https://site.org/x"));
    }

    #[test]
    fn test_empty_content_kept_and_not_matched() {
        let mut d = dedup();
        let (unique, stats) = d.deduplicate(vec![doc("a", None, ""), doc("b", None, "   ")]);
        assert_eq!(unique.len(), 2);
        assert_eq!(stats.empty_content, 2);
        assert_eq!(stats.duplicates_removed(), 0);
    }

    #[test]
    fn test_empty_content_resolved_by_url() {
        let mut d = dedup();
        let (unique, stats) = d.deduplicate(vec![
            doc("a", Some("https://a.io/p"), ""),
            doc("b", Some("https://a.io/p/"), ""),
        ]);
        assert_eq!(unique.len(), 1);
        assert_eq!(stats.exact_url_duplicates, 1);
    }

    #[test]
    fn test_malformed_url_degrades_to_content() {
        let mut d = dedup();
        let (unique, stats) = d.deduplicate(vec![
            doc("a", Some("n/a"), "glacier retreat measured across alpine valleys"),
            doc("b", Some("n/a"), "a review of three budget mechanical keyboards"),
        ]);
        assert_eq!(unique.len(), 2);
        assert_eq!(stats.url_fallbacks, 2);
        assert_eq!(unique[0].canonical_url.as_deref(), Some("n/a"));
    }

    #[test]
    fn test_rerun_same_instance_is_idempotent() {
        let mut d = dedup();
        let docs = vec![
            doc("a", Some("https://a.io/1"), "first article about ocean currents and climate"),
            doc("b", Some("https://a.io/2"), "second article about quantum error correction codes"),
        ];
        let (first, _) = d.deduplicate(docs);
        let (second, stats) = d.deduplicate(first.clone());
        assert_eq!(first, second);
        assert_eq!(stats.duplicates_removed(), 0);
    }

    #[test]
    fn test_repeated_document_in_batch_kept_once() {
        let mut d = dedup();
        let a = doc("a", Some("https://example.com/x"), "tidal energy pilots expand along the northern coast");
        let (unique, stats) = d.deduplicate(vec![a.clone(), a]);
        assert_eq!(unique.len(), 1);
        assert_eq!(unique[0].id, "a");
        assert_eq!(stats.exact_url_duplicates, 1);
        assert_eq!(stats.duplicates[0].doc_id, "a");
        assert_eq!(stats.duplicates[0].duplicate_of, "a");

        // Resubmitted alone in a later batch it is still itself
        let (again, stats) = d.deduplicate(unique.clone());
        assert_eq!(again, unique);
        assert_eq!(stats.duplicates_removed(), 0);
    }

    #[test]
    fn test_repeated_document_without_url_or_content() {
        let mut d = dedup();
        let blank = doc("a", None, "");
        let (unique, stats) = d.deduplicate(vec![blank.clone(), blank]);
        assert_eq!(unique.len(), 1);
        assert_eq!(stats.near_duplicates, 1);
        assert_eq!(stats.empty_content, 1);
    }

    #[test]
    fn test_index_persists_across_batches() {
        let mut d = dedup();
        let text = "markets rallied after the announcement of lower energy tariffs for industry";
        d.deduplicate(vec![doc("a", None, text)]);
        let (unique, stats) = d.deduplicate(vec![doc("b", None, text)]);
        assert!(unique.is_empty());
        assert_eq!(stats.near_duplicates, 1);
        assert_eq!(stats.duplicates[0].duplicate_of, "a");
    }

    #[test]
    fn test_duplicate_rate() {
        let stats = DedupStats {
            total_input: 4,
            exact_url_duplicates: 1,
            near_duplicates: 1,
            ..Default::default()
        };
        assert!((stats.duplicate_rate() - 0.5).abs() < f64::EPSILON);
        assert_eq!(DedupStats::default().duplicate_rate(), 0.0);
    }

    #[test]
    fn test_restore_continues_detection() {
        let mut d = dedup();
        let text = "wildfire season starts early after a dry and unusually warm spring";
        d.deduplicate(vec![doc("a", Some("https://n.io/fire"), text)]);
        let snapshot = d.snapshot();

        let mut restored = Deduplicator::restore(DedupConfig::default(), snapshot).unwrap();
        let (unique, stats) = restored.deduplicate(vec![
            doc("b", Some("https://n.io/fire?utm_medium=social"), "different body"),
            doc("c", None, text),
        ]);
        assert!(unique.is_empty());
        assert_eq!(stats.exact_url_duplicates, 1);
        assert_eq!(stats.near_duplicates, 1);
    }
}
