//! Min-hash content fingerprints.
//!
//! Text is lower-cased and whitespace-collapsed, cut into overlapping
//! k-word shingles, and each of P seeded hash functions keeps its minimum
//! value over the shingle set. The fraction of positions on which two
//! fingerprints agree estimates the Jaccard similarity of their shingle sets.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::{xxh3_64, xxh3_64_with_seed};

use crate::config::DedupConfig;

/// Fixed-size min-hash sketch of a document's text.
///
/// The empty fingerprint stands for "no content" and is never similar to
/// anything, including another empty fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentFingerprint {
    values: Vec<u64>,
}

impl ContentFingerprint {
    /// The degenerate "no content" fingerprint.
    pub fn empty() -> Self {
        Self { values: Vec::new() }
    }

    /// Build a fingerprint from precomputed min-hash values.
    pub fn from_values(values: Vec<u64>) -> Self {
        Self { values }
    }

    /// Whether this is the "no content" fingerprint.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Min-hash values, one per permutation.
    pub fn values(&self) -> &[u64] {
        &self.values
    }

    /// Number of permutations.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Estimated Jaccard similarity in [0.0, 1.0].
    ///
    /// Symmetric. Returns 0.0 when either side is empty or the sizes differ.
    pub fn similarity(&self, other: &ContentFingerprint) -> f64 {
        if self.is_empty() || other.is_empty() || self.len() != other.len() {
            return 0.0;
        }
        let matches = self
            .values
            .iter()
            .zip(other.values.iter())
            .filter(|(a, b)| a == b)
            .count();
        matches as f64 / self.values.len() as f64
    }
}

/// Computes [`ContentFingerprint`]s for a fixed `(k, P, seed)`.
#[derive(Debug, Clone)]
pub struct Fingerprinter {
    shingle_size: usize,
    num_permutations: usize,
    seed: u64,
}

impl Fingerprinter {
    /// Create a fingerprinter from configuration.
    pub fn new(config: &DedupConfig) -> Self {
        Self {
            shingle_size: config.shingle_size.max(1),
            num_permutations: config.num_permutations,
            seed: config.seed,
        }
    }

    /// Fingerprint a document's text.
    pub fn fingerprint(&self, text: &str) -> ContentFingerprint {
        let shingles = self.shingles(text);
        if shingles.is_empty() {
            return ContentFingerprint::empty();
        }

        let values = (0..self.num_permutations as u64)
            .map(|i| {
                let seed = self.seed.wrapping_add(i);
                shingles
                    .iter()
                    .map(|shingle| xxh3_64_with_seed(&shingle.to_le_bytes(), seed))
                    .min()
                    .unwrap_or(u64::MAX)
            })
            .collect();

        ContentFingerprint { values }
    }

    /// Hashed k-word shingles of the normalized text.
    ///
    /// Text shorter than k words yields a single shingle of all its words.
    fn shingles(&self, text: &str) -> HashSet<u64> {
        let words = normalize_words(text);
        if words.is_empty() {
            return HashSet::new();
        }
        if words.len() < self.shingle_size {
            return std::iter::once(xxh3_64(words.join(" ").as_bytes())).collect();
        }
        words
            .windows(self.shingle_size)
            .map(|window| xxh3_64(window.join(" ").as_bytes()))
            .collect()
    }
}

/// Lower-case and split on whitespace runs.
fn normalize_words(text: &str) -> Vec<String> {
    text.split_whitespace().map(|w| w.to_lowercase()).collect()
}
