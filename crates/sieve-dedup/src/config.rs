//! Deduplication configuration.

use serde::{Deserialize, Serialize};

use crate::error::DedupError;

/// Configuration for URL canonicalization and content fingerprinting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Words per shingle
    #[serde(default = "default_shingle_size")]
    pub shingle_size: usize,

    /// Number of min-hash permutations (P)
    #[serde(default = "default_num_permutations")]
    pub num_permutations: usize,

    /// Number of LSH bands (B)
    #[serde(default = "default_bands")]
    pub bands: usize,

    /// Rows per LSH band (R); B x R must equal P
    #[serde(default = "default_rows_per_band")]
    pub rows_per_band: usize,

    /// Estimated Jaccard similarity at or above which content is a duplicate
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Base seed for the permutation hashes
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Query parameters removed during canonicalization.
    /// A trailing `*` matches any parameter with that prefix.
    #[serde(default = "default_tracking_params")]
    pub tracking_params: Vec<String>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            shingle_size: default_shingle_size(),
            num_permutations: default_num_permutations(),
            bands: default_bands(),
            rows_per_band: default_rows_per_band(),
            similarity_threshold: default_similarity_threshold(),
            seed: default_seed(),
            tracking_params: default_tracking_params(),
        }
    }
}

fn default_shingle_size() -> usize {
    3
}
fn default_num_permutations() -> usize {
    128
}
fn default_bands() -> usize {
    32
}
fn default_rows_per_band() -> usize {
    4
}
fn default_similarity_threshold() -> f64 {
    0.7
}
fn default_seed() -> u64 {
    0x5eed
}
fn default_tracking_params() -> Vec<String> {
    [
        "utm_*", "fbclid", "gclid", "dclid", "msclkid", "mc_cid", "mc_eid", "ref", "ref_src",
        "igshid", "yclid", "_hsenc", "_hsmi",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

impl DedupConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), DedupError> {
        if self.shingle_size == 0 {
            return Err(DedupError::InvalidConfig(
                "shingle_size must be >= 1".to_string(),
            ));
        }
        if self.num_permutations == 0 {
            return Err(DedupError::InvalidConfig(
                "num_permutations must be >= 1".to_string(),
            ));
        }
        if self.bands * self.rows_per_band != self.num_permutations {
            return Err(DedupError::InvalidConfig(format!(
                "bands ({}) x rows_per_band ({}) must equal num_permutations ({})",
                self.bands, self.rows_per_band, self.num_permutations
            )));
        }
        if !(self.similarity_threshold > 0.0 && self.similarity_threshold <= 1.0) {
            return Err(DedupError::InvalidConfig(format!(
                "similarity_threshold must be in (0.0, 1.0], got {}",
                self.similarity_threshold
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_valid() {
        let config = DedupConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.num_permutations, 128);
        assert_eq!(config.bands * config.rows_per_band, 128);
        assert!((config.similarity_threshold - 0.7).abs() < f64::EPSILON);
        assert!(config.tracking_params.iter().any(|p| p == "utm_*"));
    }

    #[test]
    fn test_band_mismatch_rejected() {
        let config = DedupConfig {
            bands: 10,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(DedupError::InvalidConfig(_))));
    }

    #[test]
    fn test_threshold_bounds() {
        for bad in [0.0, -0.1, 1.5, f64::NAN] {
            let config = DedupConfig {
                similarity_threshold: bad,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "threshold {bad} accepted");
        }
        let config = DedupConfig {
            similarity_threshold: 1.0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_shingle_rejected() {
        let config = DedupConfig {
            shingle_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_deserialization_uses_defaults() {
        let config: DedupConfig = serde_json::from_str(r#"{"similarity_threshold": 0.8}"#).unwrap();
        assert!((config.similarity_threshold - 0.8).abs() < f64::EPSILON);
        assert_eq!(config.shingle_size, 3);
    }
}
