//! TF-IDF feature vectorization.
//!
//! The vocabulary is fitted per call: every invocation sees only the texts
//! it is given, so results never depend on earlier batches.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use tracing::{debug, warn};

use crate::config::VectorizerConfig;
use crate::error::TopicsError;
use crate::similarity::SparseVector;
use crate::stopwords::StopWords;
use crate::tfidf::tokenize;

/// Label used for documents whose language is not known.
const UNKNOWN_LANGUAGE: &str = "unknown";

/// Output of [`FeatureVectorizer::fit_transform`].
#[derive(Debug, Clone, Default)]
pub struct Vectorized {
    /// One L2-normalized vector per input text, in input order
    pub vectors: Vec<SparseVector>,
    /// Feature index -> term
    pub vocabulary: Vec<String>,
    /// Languages that had no stop word list and were left unfiltered
    pub unfiltered_languages: BTreeSet<String>,
}

impl Vectorized {
    /// Number of vectors.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Whether there are no vectors.
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Highest-weighted terms of one vector, ties by term.
    pub fn top_terms(&self, position: usize, n: usize) -> Vec<&str> {
        let Some(vector) = self.vectors.get(position) else {
            return Vec::new();
        };
        let mut weighted: Vec<(&str, f64)> = vector
            .indices()
            .iter()
            .zip(vector.values())
            .filter_map(|(i, w)| self.vocabulary.get(*i).map(|t| (t.as_str(), *w)))
            .collect();
        weighted.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        weighted.into_iter().take(n).map(|(t, _)| t).collect()
    }
}

/// Turns texts into sparse TF-IDF vectors.
pub struct FeatureVectorizer {
    config: VectorizerConfig,
    stop_words: StopWords,
}

impl FeatureVectorizer {
    /// Create a vectorizer. Fails on invalid configuration.
    pub fn new(config: VectorizerConfig, stop_words: StopWords) -> Result<Self, TopicsError> {
        config.validate()?;
        Ok(Self { config, stop_words })
    }

    /// Fit a vocabulary on `texts` and vectorize them.
    ///
    /// `languages` is aligned with `texts`; `None` falls back to the
    /// configured default language. A language with no stop word list is
    /// processed without filtering and reported in
    /// [`Vectorized::unfiltered_languages`].
    pub fn fit_transform(
        &self,
        texts: &[&str],
        languages: &[Option<&str>],
    ) -> Result<Vectorized, TopicsError> {
        if texts.len() != languages.len() {
            return Err(TopicsError::InvalidInput(format!(
                "got {} texts but {} languages",
                texts.len(),
                languages.len()
            )));
        }
        if texts.is_empty() {
            return Ok(Vectorized::default());
        }

        let mut unfiltered_languages = BTreeSet::new();
        let documents: Vec<Vec<String>> = texts
            .iter()
            .zip(languages)
            .map(|(text, language)| {
                let language = language
                    .map(str::to_string)
                    .or_else(|| self.config.default_language.clone());
                let stop = language.as_deref().and_then(|l| self.stop_words.for_language(l));
                if stop.is_none() {
                    let label = language.unwrap_or_else(|| UNKNOWN_LANGUAGE.to_string());
                    if unfiltered_languages.insert(label.clone()) {
                        warn!(language = %label, "No stop words for language, skipping filtering");
                    }
                }
                self.features(text, stop)
            })
            .collect();

        let vocabulary = self.fit_vocabulary(&documents);
        let mut doc_frequencies = vec![0usize; vocabulary.len()];
        let counted: Vec<BTreeMap<usize, usize>> = {
            let index: HashMap<&str, usize> = vocabulary
                .iter()
                .enumerate()
                .map(|(i, term)| (term.as_str(), i))
                .collect();
            documents
                .iter()
                .map(|terms| {
                    let mut counts = BTreeMap::new();
                    for term in terms {
                        if let Some(&i) = index.get(term.as_str()) {
                            *counts.entry(i).or_insert(0) += 1;
                        }
                    }
                    for i in counts.keys() {
                        doc_frequencies[*i] += 1;
                    }
                    counts
                })
                .collect()
        };

        let n = texts.len() as f64;
        let vectors = counted
            .into_iter()
            .map(|counts| {
                let mut vector = SparseVector::from_pairs(
                    counts
                        .into_iter()
                        .map(|(i, count)| {
                            let df = doc_frequencies[i] as f64;
                            let idf = ((n + 1.0) / (df + 1.0)).ln() + 1.0;
                            (i, count as f64 * idf)
                        })
                        .collect(),
                );
                vector.normalize();
                vector
            })
            .collect();

        debug!(
            documents = texts.len(),
            features = vocabulary.len(),
            unfiltered = unfiltered_languages.len(),
            "Vectorized documents"
        );

        Ok(Vectorized {
            vectors,
            vocabulary,
            unfiltered_languages,
        })
    }

    /// Unigrams plus, if enabled, bigrams of adjacent kept tokens.
    fn features(&self, text: &str, stop: Option<&HashSet<String>>) -> Vec<String> {
        let tokens = tokenize(text, stop);
        let mut features = tokens.clone();
        if self.config.use_bigrams {
            features.extend(tokens.windows(2).map(|pair| pair.join(" ")));
        }
        features
    }

    /// Apply document-frequency cutoffs and the feature cap.
    ///
    /// Returned terms are sorted, so feature indices are lexicographic.
    fn fit_vocabulary(&self, documents: &[Vec<String>]) -> Vec<String> {
        let mut doc_frequencies: HashMap<&str, usize> = HashMap::new();
        let mut totals: HashMap<&str, usize> = HashMap::new();
        for terms in documents {
            let unique: BTreeSet<&str> = terms.iter().map(String::as_str).collect();
            for term in unique {
                *doc_frequencies.entry(term).or_insert(0) += 1;
            }
            for term in terms {
                *totals.entry(term.as_str()).or_insert(0) += 1;
            }
        }

        let max_df = self.config.max_df_ratio as f64 * documents.len() as f64;
        let mut kept: Vec<(&str, usize)> = doc_frequencies
            .into_iter()
            .filter(|(_, df)| *df >= self.config.min_df && (*df as f64) <= max_df + 1e-9)
            .map(|(term, _)| (term, totals.get(term).copied().unwrap_or(0)))
            .collect();

        if kept.len() > self.config.max_features {
            kept.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
            kept.truncate(self.config.max_features);
        }

        let mut vocabulary: Vec<String> = kept.into_iter().map(|(t, _)| t.to_string()).collect();
        vocabulary.sort();
        vocabulary
    }
}
