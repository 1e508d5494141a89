//! LSH-banded near-duplicate index.
//!
//! The P min-hash values of a fingerprint are split into B bands of R rows.
//! Two fingerprints sharing any full band are candidates; candidates are
//! confirmed with the estimate over the complete fingerprint, so no match is
//! reported below the threshold.
//!
//! Matching is inclusive (`similarity >= threshold`) and the earliest
//! inserted candidate wins. The index is single-writer: wrap it in a lock if
//! it must be shared.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64_with_seed;

use crate::config::DedupConfig;
use crate::error::DedupError;
use crate::fingerprint::ContentFingerprint;

/// Tolerance applied to the inclusive threshold comparison.
const SIMILARITY_EPSILON: f64 = 1e-9;

/// An indexed fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct IndexEntry {
    doc_id: String,
    fingerprint: ContentFingerprint,
}

/// Approximate-duplicate index over content fingerprints and canonical URLs.
#[derive(Debug, Clone)]
pub struct NearDuplicateIndex {
    bands: usize,
    rows_per_band: usize,
    num_permutations: usize,
    shingle_size: usize,
    seed: u64,
    threshold: f64,
    /// Insertion-ordered entries; positions are the tie-break order
    entries: Vec<IndexEntry>,
    /// Ids of indexed documents
    doc_ids: HashSet<String>,
    /// Per band: band hash -> entry positions, ascending
    buckets: Vec<HashMap<u64, Vec<usize>>>,
    /// Canonical URL -> id of the document that owns it
    url_owners: BTreeMap<String, String>,
}

/// Serializable checkpoint of a [`NearDuplicateIndex`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    /// Snapshot format version
    pub version: u32,
    /// Permutations the fingerprints were built with
    pub num_permutations: usize,
    /// Words per shingle the fingerprints were built with
    pub shingle_size: usize,
    /// Permutation seed the fingerprints were built with
    pub seed: u64,
    entries: Vec<IndexEntry>,
    url_owners: BTreeMap<String, String>,
}

impl IndexSnapshot {
    const VERSION: u32 = 1;

    /// Number of indexed fingerprints.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot holds no fingerprints.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize to JSON bytes for storage
    pub fn to_bytes(&self) -> Result<Vec<u8>, DedupError> {
        serde_json::to_vec(self).map_err(DedupError::from)
    }

    /// Deserialize from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DedupError> {
        serde_json::from_slice(bytes).map_err(DedupError::from)
    }
}

impl NearDuplicateIndex {
    /// Create an empty index.
    pub fn new(config: &DedupConfig) -> Result<Self, DedupError> {
        config.validate()?;
        Ok(Self {
            bands: config.bands,
            rows_per_band: config.rows_per_band,
            num_permutations: config.num_permutations,
            shingle_size: config.shingle_size,
            seed: config.seed,
            threshold: config.similarity_threshold,
            entries: Vec::new(),
            doc_ids: HashSet::new(),
            buckets: vec![HashMap::new(); config.bands],
            url_owners: BTreeMap::new(),
        })
    }

    /// Rebuild an index from a snapshot.
    ///
    /// Fails if the snapshot's fingerprints were computed with different
    /// `(k, P, seed)`. Banding and threshold come from `config`.
    pub fn restore(config: &DedupConfig, snapshot: IndexSnapshot) -> Result<Self, DedupError> {
        if snapshot.version != IndexSnapshot::VERSION {
            return Err(DedupError::SnapshotMismatch(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        if snapshot.num_permutations != config.num_permutations
            || snapshot.shingle_size != config.shingle_size
            || snapshot.seed != config.seed
        {
            return Err(DedupError::SnapshotMismatch(format!(
                "snapshot built with P={} k={} seed={}, config has P={} k={} seed={}",
                snapshot.num_permutations,
                snapshot.shingle_size,
                snapshot.seed,
                config.num_permutations,
                config.shingle_size,
                config.seed
            )));
        }

        let mut index = Self::new(config)?;
        index.url_owners = snapshot.url_owners;
        for entry in snapshot.entries {
            index.insert(entry.doc_id, entry.fingerprint);
        }
        Ok(index)
    }

    /// Capture the index state for persistence.
    pub fn snapshot(&self) -> IndexSnapshot {
        IndexSnapshot {
            version: IndexSnapshot::VERSION,
            num_permutations: self.num_permutations,
            shingle_size: self.shingle_size,
            seed: self.seed,
            entries: self.entries.clone(),
            url_owners: self.url_owners.clone(),
        }
    }

    /// Find the first-inserted document whose fingerprint is at least
    /// `threshold` similar to `fingerprint`.
    pub fn query(&self, fingerprint: &ContentFingerprint) -> Option<&str> {
        self.query_with_similarity(fingerprint).map(|(id, _)| id)
    }

    /// Like [`query`](Self::query), also returning the estimated similarity.
    pub fn query_with_similarity(&self, fingerprint: &ContentFingerprint) -> Option<(&str, f64)> {
        if fingerprint.is_empty() || fingerprint.len() != self.num_permutations {
            return None;
        }

        let candidates: BTreeSet<usize> = self
            .band_keys(fingerprint)
            .enumerate()
            .filter_map(|(band, key)| self.buckets[band].get(&key))
            .flatten()
            .copied()
            .collect();

        candidates.into_iter().find_map(|position| {
            let entry = &self.entries[position];
            let similarity = entry.fingerprint.similarity(fingerprint);
            (similarity + SIMILARITY_EPSILON >= self.threshold)
                .then_some((entry.doc_id.as_str(), similarity))
        })
    }

    /// Add a fingerprint. Empty fingerprints are not indexed.
    pub fn insert(&mut self, doc_id: impl Into<String>, fingerprint: ContentFingerprint) {
        if fingerprint.is_empty() || fingerprint.len() != self.num_permutations {
            return;
        }
        let doc_id = doc_id.into();
        let position = self.entries.len();
        let keys: Vec<u64> = self.band_keys(&fingerprint).collect();
        for (band, key) in keys.into_iter().enumerate() {
            self.buckets[band].entry(key).or_default().push(position);
        }
        self.doc_ids.insert(doc_id.clone());
        self.entries.push(IndexEntry {
            doc_id,
            fingerprint,
        });
    }

    /// Whether a canonical URL has been seen.
    pub fn contains_canonical_url(&self, url: &str) -> bool {
        self.url_owners.contains_key(url)
    }

    /// Id of the document that first claimed a canonical URL.
    pub fn canonical_url_owner(&self, url: &str) -> Option<&str> {
        self.url_owners.get(url).map(String::as_str)
    }

    /// Record a canonical URL as seen. The first owner is kept.
    pub fn remember_canonical_url(&mut self, url: impl Into<String>, doc_id: impl Into<String>) {
        self.url_owners.entry(url.into()).or_insert_with(|| doc_id.into());
    }

    /// Whether a document id has an indexed fingerprint.
    pub fn contains_document(&self, doc_id: &str) -> bool {
        self.doc_ids.contains(doc_id)
    }

    /// Number of indexed fingerprints.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no fingerprints are indexed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of remembered canonical URLs.
    pub fn url_count(&self) -> usize {
        self.url_owners.len()
    }

    /// Similarity threshold in use.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    fn band_keys<'a>(&'a self, fingerprint: &'a ContentFingerprint) -> impl Iterator<Item = u64> + 'a {
        fingerprint
            .values()
            .chunks(self.rows_per_band)
            .take(self.bands)
            .enumerate()
            .map(|(band, rows)| {
                let bytes: Vec<u8> = rows.iter().flat_map(|v| v.to_le_bytes()).collect();
                xxh3_64_with_seed(&bytes, band as u64)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::Fingerprinter;

    /// Ten permutations in five bands of two rows.
    fn small_config(threshold: f64) -> DedupConfig {
        DedupConfig {
            num_permutations: 10,
            bands: 5,
            rows_per_band: 2,
            similarity_threshold: threshold,
            ..Default::default()
        }
    }

    fn fp(values: &[u64]) -> ContentFingerprint {
        ContentFingerprint::from_values(values.to_vec())
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let mut index = NearDuplicateIndex::new(&small_config(0.7)).unwrap();
        index.insert("base", fp(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]));

        // 7 of 10 positions agree: exactly at threshold -> duplicate
        let at = fp(&[1, 2, 3, 4, 5, 6, 7, 80, 90, 100]);
        assert_eq!(index.query_with_similarity(&at), Some(("base", 0.7)));

        // 6 of 10 positions agree: below threshold -> unique
        let below = fp(&[1, 2, 3, 4, 5, 6, 70, 80, 90, 100]);
        assert_eq!(index.query(&below), None);
    }

    #[test]
    fn test_first_inserted_wins() {
        let mut index = NearDuplicateIndex::new(&small_config(0.5)).unwrap();
        index.insert("first", fp(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]));
        index.insert("second", fp(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]));
        assert_eq!(index.query(&fp(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10])), Some("first"));
    }

    #[test]
    fn test_no_shared_band_no_candidate() {
        let mut index = NearDuplicateIndex::new(&small_config(0.1)).unwrap();
        index.insert("a", fp(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]));
        // Agrees on every other position, so no full band is shared
        let probe = fp(&[1, 0, 3, 0, 5, 0, 7, 0, 9, 0]);
        assert_eq!(index.query(&probe), None);
    }

    #[test]
    fn test_empty_fingerprint_never_matches() {
        let mut index = NearDuplicateIndex::new(&small_config(0.7)).unwrap();
        index.insert("empty", ContentFingerprint::empty());
        assert!(index.is_empty());
        assert_eq!(index.query(&ContentFingerprint::empty()), None);
    }

    #[test]
    fn test_canonical_urls() {
        let mut index = NearDuplicateIndex::new(&DedupConfig::default()).unwrap();
        assert!(!index.contains_canonical_url("https://a.io/x"));
        index.remember_canonical_url("https://a.io/x", "doc-1");
        index.remember_canonical_url("https://a.io/x", "doc-2");
        assert!(index.contains_canonical_url("https://a.io/x"));
        assert_eq!(index.canonical_url_owner("https://a.io/x"), Some("doc-1"));
        assert_eq!(index.url_count(), 1);
    }

    #[test]
    fn test_snapshot_roundtrip_preserves_queries() {
        let config = DedupConfig::default();
        let fingerprinter = Fingerprinter::new(&config);
        let mut index = NearDuplicateIndex::new(&config).unwrap();
        let texts = [
            "solar panel efficiency improves with new perovskite cell designs this year",
            "central bank signals rate pause as inflation cools across the euro area",
            "new rust release stabilizes async closures and improves compile times",
        ];
        for (i, text) in texts.iter().enumerate() {
            index.insert(format!("doc-{i}"), fingerprinter.fingerprint(text));
        }
        index.remember_canonical_url("https://news.io/rust", "doc-2");

        let bytes = index.snapshot().to_bytes().unwrap();
        let restored =
            NearDuplicateIndex::restore(&config, IndexSnapshot::from_bytes(&bytes).unwrap()).unwrap();

        assert_eq!(restored.len(), 3);
        assert!(restored.contains_canonical_url("https://news.io/rust"));
        for text in texts {
            let probe = fingerprinter.fingerprint(text);
            assert_eq!(index.query(&probe), restored.query(&probe));
        }
        let unseen = fingerprinter.fingerprint("an unrelated probe about migratory birds in autumn");
        assert_eq!(restored.query(&unseen), None);
    }

    #[test]
    fn test_restore_rejects_parameter_mismatch() {
        let config = DedupConfig::default();
        let snapshot = NearDuplicateIndex::new(&config).unwrap().snapshot();
        let other = DedupConfig {
            seed: 7,
            ..Default::default()
        };
        assert!(matches!(
            NearDuplicateIndex::restore(&other, snapshot),
            Err(DedupError::SnapshotMismatch(_))
        ));
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = DedupConfig {
            bands: 3,
            ..Default::default()
        };
        assert!(NearDuplicateIndex::new(&config).is_err());
    }
}
