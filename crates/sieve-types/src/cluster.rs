//! Topic cluster records.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::document::DocumentId;
use crate::error::SieveError;

/// Identifier of a topic cluster.
///
/// Real clusters are numbered from zero in discovery order. The reserved
/// [`ClusterId::NOISE`] id marks the bucket of documents that belong to no
/// sufficiently dense group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(i32);

impl ClusterId {
    /// Sentinel id of the noise pseudo-cluster.
    pub const NOISE: ClusterId = ClusterId(-1);

    /// Id of the `index`-th real cluster.
    pub fn topic(index: usize) -> Self {
        Self(i32::try_from(index).unwrap_or(i32::MAX))
    }

    /// Whether this is the noise sentinel.
    pub fn is_noise(&self) -> bool {
        *self == Self::NOISE
    }

    /// Raw numeric value.
    pub fn value(&self) -> i32 {
        self.0
    }
}

impl std::fmt::Display for ClusterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_noise() {
            write!(f, "noise")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Where a cluster label came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LabelSource {
    /// Not labeled (plain clustering, or the noise bucket)
    #[default]
    Unlabeled,
    /// Synthesized by the remote text service
    Remote,
    /// Deterministic keyword fallback
    Fallback,
}

/// A group of documents sharing a topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicCluster {
    /// Cluster id, or [`ClusterId::NOISE`]
    pub cluster_id: ClusterId,
    /// Human-readable label
    pub label: Option<String>,
    /// Origin of `label`
    #[serde(default)]
    pub label_source: LabelSource,
    /// Top keywords of the member texts
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Member document ids in input order
    pub member_document_ids: Vec<DocumentId>,
    /// Number of members
    pub size: usize,
}

impl TopicCluster {
    /// Create an unlabeled cluster.
    pub fn new(cluster_id: ClusterId, member_document_ids: Vec<DocumentId>) -> Self {
        let size = member_document_ids.len();
        Self {
            cluster_id,
            label: None,
            label_source: LabelSource::Unlabeled,
            keywords: Vec::new(),
            member_document_ids,
            size,
        }
    }

    /// Create the noise pseudo-cluster.
    pub fn noise(member_document_ids: Vec<DocumentId>) -> Self {
        Self::new(ClusterId::NOISE, member_document_ids)
    }

    /// Whether this is the noise pseudo-cluster.
    pub fn is_noise(&self) -> bool {
        self.cluster_id.is_noise()
    }

    /// Attach a label.
    pub fn set_label(&mut self, label: String, source: LabelSource) {
        self.label = Some(label);
        self.label_source = source;
    }

    /// Check every member references a document in `known`.
    pub fn ensure_members_within(&self, known: &HashSet<&str>) -> Result<(), SieveError> {
        if self.size != self.member_document_ids.len() {
            return Err(SieveError::Invariant(format!(
                "cluster {} reports size {} but has {} members",
                self.cluster_id,
                self.size,
                self.member_document_ids.len()
            )));
        }
        match self
            .member_document_ids
            .iter()
            .find(|id| !known.contains(id.as_str()))
        {
            Some(stray) => Err(SieveError::Invariant(format!(
                "cluster {} references unknown document {}",
                self.cluster_id, stray
            ))),
            None => Ok(()),
        }
    }
}
