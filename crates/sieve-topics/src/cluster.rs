//! Density-based clustering over cosine distance.
//!
//! DBSCAN with one extra rule: any cluster smaller than `min_cluster_size`
//! is dissolved back into noise. Points are visited in input order and
//! clusters numbered in discovery order, so the same input always yields
//! the same assignment.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ClusterConfig;
use crate::error::TopicsError;
use crate::similarity::{pairwise_distances, SparseVector};

/// Slack on the epsilon comparison for floating-point rounding.
const EPSILON_SLACK: f64 = 1e-12;

/// Cluster assignment for one clustering call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterResult {
    /// Cluster index per input position; `None` is noise
    pub assignments: Vec<Option<usize>>,
    /// Number of real clusters
    pub cluster_count: usize,
    /// Number of noise points
    pub noise_count: usize,
}

impl ClusterResult {
    fn all_noise(n: usize) -> Self {
        Self {
            assignments: vec![None; n],
            cluster_count: 0,
            noise_count: n,
        }
    }

    /// Fraction of points labeled noise.
    pub fn noise_ratio(&self) -> f64 {
        if self.assignments.is_empty() {
            return 0.0;
        }
        self.noise_count as f64 / self.assignments.len() as f64
    }

    /// Input positions assigned to a cluster, ascending.
    pub fn members(&self, cluster: usize) -> Vec<usize> {
        self.assignments
            .iter()
            .enumerate()
            .filter(|(_, a)| **a == Some(cluster))
            .map(|(i, _)| i)
            .collect()
    }

    /// Input positions labeled noise, ascending.
    pub fn noise(&self) -> Vec<usize> {
        self.assignments
            .iter()
            .enumerate()
            .filter(|(_, a)| a.is_none())
            .map(|(i, _)| i)
            .collect()
    }
}

/// Deterministic DBSCAN-style clusterer.
#[derive(Debug, Clone)]
pub struct DensityClusterer {
    config: ClusterConfig,
}

impl DensityClusterer {
    /// Create a clusterer. Fails on invalid configuration.
    pub fn new(config: ClusterConfig) -> Result<Self, TopicsError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Configuration in use.
    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Assign each vector to a cluster or to noise.
    pub fn cluster(&self, vectors: &[SparseVector]) -> ClusterResult {
        let n = vectors.len();
        if n < self.config.min_cluster_size {
            debug!(
                points = n,
                min_cluster_size = self.config.min_cluster_size,
                "Too few points to cluster"
            );
            return ClusterResult::all_noise(n);
        }

        let distances = pairwise_distances(vectors);
        let neighbours: Vec<Vec<usize>> = (0..n)
            .map(|i| self.region_query(i, vectors, &distances))
            .collect();
        let is_core = |i: usize| neighbours[i].len() >= self.config.min_samples;

        let mut labels: Vec<Option<usize>> = vec![None; n];
        let mut visited = vec![false; n];
        let mut next_cluster = 0usize;

        for i in 0..n {
            if visited[i] {
                continue;
            }
            visited[i] = true;
            if !is_core(i) {
                continue;
            }

            let cluster = next_cluster;
            next_cluster += 1;
            labels[i] = Some(cluster);

            let mut queue: VecDeque<usize> = neighbours[i].iter().copied().collect();
            while let Some(j) = queue.pop_front() {
                if labels[j].is_none() {
                    labels[j] = Some(cluster);
                }
                if visited[j] {
                    continue;
                }
                visited[j] = true;
                if is_core(j) {
                    queue.extend(neighbours[j].iter().copied());
                }
            }
        }

        let result = self.dissolve_small(labels, next_cluster);
        info!(
            points = n,
            clusters = result.cluster_count,
            noise = result.noise_count,
            "Clustering complete"
        );
        result
    }

    /// Points within epsilon of `i`, ascending, including `i` itself.
    ///
    /// Zero vectors have no neighbours and are nobody's neighbour.
    fn region_query(&self, i: usize, vectors: &[SparseVector], distances: &[Vec<f64>]) -> Vec<usize> {
        if vectors[i].is_zero() {
            return Vec::new();
        }
        distances[i]
            .iter()
            .enumerate()
            .filter(|(j, d)| {
                !vectors[*j].is_zero() && **d <= self.config.epsilon + EPSILON_SLACK
            })
            .map(|(j, _)| j)
            .collect()
    }

    /// Send undersized clusters to noise and renumber the rest.
    fn dissolve_small(&self, labels: Vec<Option<usize>>, found: usize) -> ClusterResult {
        let mut sizes = vec![0usize; found];
        for cluster in labels.iter().flatten() {
            sizes[*cluster] += 1;
        }

        let mut remap: Vec<Option<usize>> = vec![None; found];
        let mut cluster_count = 0;
        for (cluster, size) in sizes.iter().enumerate() {
            if *size >= self.config.min_cluster_size {
                remap[cluster] = Some(cluster_count);
                cluster_count += 1;
            } else {
                debug!(cluster, size, "Dissolving undersized cluster");
            }
        }

        let assignments: Vec<Option<usize>> = labels
            .into_iter()
            .map(|label| label.and_then(|c| remap[c]))
            .collect();
        let noise_count = assignments.iter().filter(|a| a.is_none()).count();

        ClusterResult {
            assignments,
            cluster_count,
            noise_count,
        }
    }
}
