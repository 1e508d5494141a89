//! Shared fixtures for service integration tests.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;

use sieve_service::{Settings, SieveService};
use sieve_text::{MemoryCache, TextService};
use sieve_topics::ClusterConfig;
use sieve_types::{Document, TopicCluster};

pub const TOPICS: [[&str; 10]; 3] = [
    [
        "galaxy", "nebula", "quasar", "pulsar", "comet", "asteroid", "telescope", "orbit",
        "supernova", "meteor",
    ],
    [
        "saffron", "risotto", "braise", "marinade", "skillet", "paprika", "sourdough", "ferment",
        "caramel", "basil",
    ],
    [
        "compiler", "borrow", "lifetime", "trait", "macro", "cargo", "crate", "ownership",
        "closure", "iterator",
    ],
];

pub const DOCS_PER_TOPIC: usize = 15;
pub const OUTLIERS: usize = 5;

pub fn service(text: Arc<dyn TextService>) -> SieveService {
    service_with(Settings::default(), text)
}

pub fn service_with(settings: Settings, text: Arc<dyn TextService>) -> SieveService {
    SieveService::new(settings, text, Arc::new(MemoryCache::new())).unwrap()
}

/// Settings that keep retries fast.
pub fn fast_retry_settings() -> Settings {
    let mut settings = Settings::default();
    settings.text.max_attempts = 2;
    settings.text.initial_backoff_ms = 1;
    settings.text.max_backoff_ms = 2;
    settings
}

pub fn cluster_config() -> ClusterConfig {
    ClusterConfig {
        min_cluster_size: 5,
        min_samples: 3,
        epsilon: 0.6,
    }
}

pub fn doc(id: &str, url: Option<&str>, content: &str) -> Document {
    Document::with_id(id, url.map(String::from), content.to_string(), Some("en".to_string()))
}

/// 3 topics x 15 documents, then 5 outliers with vocabulary of their own.
///
/// Each topic document is an 8-word window over a 10-word ring, so any two
/// documents of a topic share at least 6 words and no two topics share any.
pub fn topic_corpus() -> Vec<Document> {
    let mut docs = Vec::new();
    for (t, words) in TOPICS.iter().enumerate() {
        for j in 0..DOCS_PER_TOPIC {
            let text: Vec<&str> = (0..8).map(|i| words[(j + i) % words.len()]).collect();
            docs.push(doc(&format!("t{t}-{j:02}"), None, &text.join(" ")));
        }
    }
    for o in 0..OUTLIERS {
        let text: Vec<String> = (0..8).map(|k| format!("lone{o}word{k}")).collect();
        docs.push(doc(&format!("outlier-{o}"), None, &text.join(" ")));
    }
    docs
}

/// Expected membership of topic `t`.
pub fn topic_ids(t: usize) -> BTreeSet<String> {
    (0..DOCS_PER_TOPIC).map(|j| format!("t{t}-{j:02}")).collect()
}

pub fn outlier_ids() -> BTreeSet<String> {
    (0..OUTLIERS).map(|o| format!("outlier-{o}")).collect()
}

/// Member groups as sets, ignoring numeric cluster ids.
pub fn member_groups(clusters: &[TopicCluster]) -> BTreeSet<BTreeSet<String>> {
    clusters
        .iter()
        .filter(|c| !c.is_noise())
        .map(|c| c.member_document_ids.iter().cloned().collect())
        .collect()
}
