//! TF-IDF keyword scoring over a small corpus.
//!
//! Used for cluster keywords and fallback labels. The feature vectorizer
//! shares [`tokenize`] but keeps its own per-document weighting.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::stopwords::StopWords;

/// TF-IDF calculator for keyword extraction.
///
/// Computes term importance based on frequency within the corpus and rarity
/// across its documents.
pub struct TfIdf {
    /// Term -> document count (how many documents contain this term)
    doc_frequencies: HashMap<String, usize>,
    /// Term -> total frequency across all documents
    term_frequencies: HashMap<String, usize>,
    /// Number of documents
    doc_count: usize,
}

impl TfIdf {
    /// Build from raw texts using English stop words.
    pub fn new(documents: &[&str]) -> Self {
        let stop = StopWords::builtin();
        let english = stop.for_language("en");
        Self::from_tokens(documents.iter().map(|doc| tokenize(doc, english)).collect())
    }

    /// Build from pre-tokenized documents.
    pub fn from_tokens(documents: Vec<Vec<String>>) -> Self {
        let mut doc_frequencies: HashMap<String, usize> = HashMap::new();
        let mut term_frequencies: HashMap<String, usize> = HashMap::new();
        let doc_count = documents.len();

        for terms in documents {
            let unique_terms: HashSet<&String> = terms.iter().collect();
            for term in unique_terms {
                *doc_frequencies.entry(term.clone()).or_insert(0) += 1;
            }
            for term in terms {
                *term_frequencies.entry(term).or_insert(0) += 1;
            }
        }

        Self {
            doc_frequencies,
            term_frequencies,
            doc_count,
        }
    }

    /// TF-IDF score for a term.
    ///
    /// TF is the term's share of all tokens; IDF is smoothed:
    /// `ln((N + 1) / (df + 1)) + 1`.
    pub fn score(&self, term: &str) -> f32 {
        self.term_frequency(term) * self.inverse_document_frequency(term)
    }

    fn term_frequency(&self, term: &str) -> f32 {
        let count = *self.term_frequencies.get(term).unwrap_or(&0) as f32;
        let total: usize = self.term_frequencies.values().sum();
        if total == 0 {
            return 0.0;
        }
        count / total as f32
    }

    fn inverse_document_frequency(&self, term: &str) -> f32 {
        let df = *self.doc_frequencies.get(term).unwrap_or(&0) as f32;
        if df == 0.0 {
            return 0.0;
        }
        let n = self.doc_count as f32;
        ((n + 1.0) / (df + 1.0)).ln() + 1.0
    }

    /// Top N terms by score, highest first. Equal scores order by term.
    pub fn top_terms(&self, n: usize) -> Vec<(String, f32)> {
        let mut scores: Vec<(String, f32)> = self
            .term_frequencies
            .keys()
            .map(|term| (term.clone(), self.score(term)))
            .filter(|(_, score)| *score > 0.0)
            .collect();

        scores.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scores.truncate(n);
        scores
    }

    /// Number of documents.
    pub fn doc_count(&self) -> usize {
        self.doc_count
    }

    /// Number of distinct terms.
    pub fn term_count(&self) -> usize {
        self.term_frequencies.len()
    }
}

/// Tokenize text into lowercase words.
///
/// Splits on any non-alphanumeric character and drops single-character
/// tokens, all-digit tokens and, when given, stop words.
pub fn tokenize(text: &str, stop_words: Option<&HashSet<String>>) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| s.chars().count() > 1)
        .filter(|s| !s.chars().all(|c| c.is_numeric()))
        .filter(|s| stop_words.map_or(true, |stop| !stop.contains(*s)))
        .map(String::from)
        .collect()
}
