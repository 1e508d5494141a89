//! # sieve-topics
//!
//! Unsupervised topic grouping for deduplicated documents.
//!
//! Texts are turned into sparse TF-IDF vectors over a per-call vocabulary,
//! then grouped with density-based clustering over cosine distance. No
//! cluster count is fixed in advance; points in no dense neighbourhood are
//! reported as noise.
//!
//! ## Features
//! - Unigram + bigram TF-IDF with vocabulary cap and document-frequency cutoffs
//! - Language-aware stop words that degrade to no filtering (and say so)
//! - Deterministic DBSCAN-style clustering with a minimum cluster size
//! - Keyword-based fallback labels that never require a remote service

pub mod cluster;
pub mod config;
pub mod error;
pub mod labeling;
pub mod similarity;
pub mod stopwords;
pub mod tfidf;
pub mod vectorizer;

pub use cluster::{ClusterResult, DensityClusterer};
pub use config::{ClusterConfig, LabelingConfig, TopicsConfig, VectorizerConfig};
pub use error::TopicsError;
pub use labeling::{
    candidate_strings, truncate_at_word, ClusterDocument, KeywordLabeler, TopicLabel, UNKNOWN_TOPIC,
};
pub use similarity::{cosine_similarity, pairwise_distances, SparseVector};
pub use stopwords::StopWords;
pub use tfidf::{tokenize, TfIdf};
pub use vectorizer::{FeatureVectorizer, Vectorized};
