//! Run reports.
//!
//! A run always completes. Anything that could not be done remotely is
//! listed here, so no document or cluster is degraded without record.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use sieve_text::Operation;
use sieve_types::{ClusterId, Document, DocumentId, TopicCluster};

/// What a degraded item refers to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum DegradedTarget {
    Document(DocumentId),
    Cluster(ClusterId),
}

/// A remote operation that failed or was skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradedItem {
    pub target: DegradedTarget,
    pub operation: Operation,
    pub reason: String,
}

/// Outcome counters and degraded items for one cluster-and-label run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Remote calls issued
    pub attempted_calls: usize,
    /// Issued calls that ended in an error
    pub failed_calls: usize,
    /// Calls not issued because the run was cancelled
    pub skipped_calls: usize,
    /// Clusters labeled by the remote service
    pub remote_labels: usize,
    /// Clusters labeled by keyword fallback
    pub fallback_labels: usize,
    /// Set when cancellation left work undone
    pub partial: bool,
    /// Real clusters, noise excluded
    pub cluster_count: usize,
    /// Documents assigned to a real cluster
    pub clustered_documents: usize,
    pub noise_count: usize,
    /// Languages vectorized without stop-word filtering
    pub unfiltered_languages: BTreeSet<String>,
    pub degraded: Vec<DegradedItem>,
}

impl RunReport {
    /// Fraction of clustered documents that landed in noise.
    pub fn noise_ratio(&self) -> f64 {
        let total = self.clustered_documents + self.noise_count;
        if total == 0 {
            return 0.0;
        }
        self.noise_count as f64 / total as f64
    }

    pub(crate) fn record_failure(&mut self, target: DegradedTarget, operation: Operation, reason: String) {
        self.failed_calls += 1;
        self.degraded.push(DegradedItem {
            target,
            operation,
            reason,
        });
    }

    pub(crate) fn record_skip(&mut self, target: DegradedTarget, operation: Operation) {
        self.skipped_calls += 1;
        self.partial = true;
        self.degraded.push(DegradedItem {
            target,
            operation,
            reason: "cancelled before the call was issued".to_string(),
        });
    }
}

/// Result of cluster-and-label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledRun {
    /// Real clusters in discovery order, then the noise pseudo-cluster if any
    pub clusters: Vec<TopicCluster>,
    /// Input documents, enriched and marked processed
    pub documents: Vec<Document>,
    pub report: RunReport,
}

impl LabeledRun {
    /// Real clusters only.
    pub fn topics(&self) -> impl Iterator<Item = &TopicCluster> {
        self.clusters.iter().filter(|c| !c.is_noise())
    }

    /// The noise pseudo-cluster, when non-empty.
    pub fn noise(&self) -> Option<&TopicCluster> {
        self.clusters.iter().find(|c| c.is_noise())
    }
}
