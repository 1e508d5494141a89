//! Sparse vectors and cosine similarity.

use serde::{Deserialize, Serialize};

/// Sparse feature vector with strictly increasing indices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    indices: Vec<usize>,
    values: Vec<f64>,
}

impl SparseVector {
    /// Build from `(index, value)` pairs.
    ///
    /// Pairs are sorted by index, duplicate indices are summed and zero
    /// values dropped.
    pub fn from_pairs(mut pairs: Vec<(usize, f64)>) -> Self {
        pairs.sort_by_key(|(i, _)| *i);
        let mut indices: Vec<usize> = Vec::with_capacity(pairs.len());
        let mut values: Vec<f64> = Vec::with_capacity(pairs.len());
        for (index, value) in pairs {
            if indices.last() == Some(&index) {
                if let Some(last) = values.last_mut() {
                    *last += value;
                }
            } else {
                indices.push(index);
                values.push(value);
            }
        }
        let (indices, values) = indices
            .into_iter()
            .zip(values)
            .filter(|(_, v)| *v != 0.0)
            .unzip();
        Self { indices, values }
    }

    /// Feature indices with non-zero weight.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Weights aligned with [`indices`](Self::indices).
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of non-zero entries.
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    /// Whether every weight is zero.
    pub fn is_zero(&self) -> bool {
        self.indices.is_empty()
    }

    /// Weight at a feature index.
    pub fn get(&self, index: usize) -> f64 {
        self.indices
            .binary_search(&index)
            .map(|pos| self.values[pos])
            .unwrap_or(0.0)
    }

    /// Dot product via a merge over both index lists.
    pub fn dot(&self, other: &SparseVector) -> f64 {
        let (mut i, mut j, mut sum) = (0, 0, 0.0);
        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += self.values[i] * other.values[j];
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }

    /// Euclidean norm.
    pub fn norm(&self) -> f64 {
        self.values.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    /// Scale to unit length in place. Zero vectors are left unchanged.
    pub fn normalize(&mut self) {
        let norm = self.norm();
        if norm > 0.0 {
            for v in self.values.iter_mut() {
                *v /= norm;
            }
        }
    }
}

/// Cosine similarity in [-1.0, 1.0]; 0.0 if either vector is zero.
pub fn cosine_similarity(a: &SparseVector, b: &SparseVector) -> f64 {
    let norm_a = a.norm();
    let norm_b = b.norm();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    a.dot(b) / (norm_a * norm_b)
}

/// Cosine distance `1 - similarity`, clamped to [0.0, 2.0].
///
/// A zero vector is at distance 1.0 from everything, itself included.
pub fn cosine_distance(a: &SparseVector, b: &SparseVector) -> f64 {
    (1.0 - cosine_similarity(a, b)).clamp(0.0, 2.0)
}

/// Symmetric pairwise cosine distance matrix.
///
/// The diagonal is 0.0 except for zero vectors, which stay at 1.0 so they
/// never count as their own dense neighbourhood.
pub fn pairwise_distances(vectors: &[SparseVector]) -> Vec<Vec<f64>> {
    let n = vectors.len();
    let mut distances = vec![vec![0.0f64; n]; n];

    for i in 0..n {
        if vectors[i].is_zero() {
            distances[i][i] = 1.0;
        }
        for j in (i + 1)..n {
            let dist = cosine_distance(&vectors[i], &vectors[j]);
            distances[i][j] = dist;
            distances[j][i] = dist;
        }
    }

    distances
}
