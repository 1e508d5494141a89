//! Topic configuration.

use serde::{Deserialize, Serialize};

use crate::error::TopicsError;

/// Master configuration for vectorization, clustering and labeling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopicsConfig {
    /// Vectorizer settings
    #[serde(default)]
    pub vectorizer: VectorizerConfig,

    /// Clustering settings
    #[serde(default)]
    pub cluster: ClusterConfig,

    /// Labeling settings
    #[serde(default)]
    pub labeling: LabelingConfig,
}

impl TopicsConfig {
    /// Validate all sections.
    pub fn validate(&self) -> Result<(), TopicsError> {
        self.vectorizer.validate()?;
        self.cluster.validate()?;
        self.labeling.validate()
    }
}

/// Feature vectorizer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorizerConfig {
    /// Maximum vocabulary size
    #[serde(default = "default_max_features")]
    pub max_features: usize,

    /// Minimum number of documents a term must appear in
    #[serde(default = "default_min_df")]
    pub min_df: usize,

    /// Maximum fraction of documents a term may appear in
    #[serde(default = "default_max_df_ratio")]
    pub max_df_ratio: f32,

    /// Include adjacent-word bigrams as features
    #[serde(default = "default_true")]
    pub use_bigrams: bool,

    /// Language assumed for documents without one
    #[serde(default)]
    pub default_language: Option<String>,
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        Self {
            max_features: default_max_features(),
            min_df: default_min_df(),
            max_df_ratio: default_max_df_ratio(),
            use_bigrams: default_true(),
            default_language: None,
        }
    }
}

impl VectorizerConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), TopicsError> {
        if self.max_features == 0 {
            return Err(TopicsError::InvalidConfig(
                "max_features must be > 0".to_string(),
            ));
        }
        if self.min_df == 0 {
            return Err(TopicsError::InvalidConfig("min_df must be >= 1".to_string()));
        }
        if !(self.max_df_ratio > 0.0 && self.max_df_ratio <= 1.0) {
            return Err(TopicsError::InvalidConfig(format!(
                "max_df_ratio must be in (0.0, 1.0], got {}",
                self.max_df_ratio
            )));
        }
        Ok(())
    }
}

fn default_max_features() -> usize {
    5000
}
fn default_min_df() -> usize {
    1
}
fn default_max_df_ratio() -> f32 {
    1.0
}
fn default_true() -> bool {
    true
}

/// Density clustering configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Smallest group reported as a cluster
    #[serde(default = "default_min_cluster_size")]
    pub min_cluster_size: usize,

    /// Points (including itself) within `epsilon` for a point to be core
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    /// Neighbourhood radius in cosine distance
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            min_cluster_size: default_min_cluster_size(),
            min_samples: default_min_samples(),
            epsilon: default_epsilon(),
        }
    }
}

impl ClusterConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), TopicsError> {
        if self.min_cluster_size < 2 {
            return Err(TopicsError::InvalidConfig(format!(
                "min_cluster_size must be >= 2, got {}",
                self.min_cluster_size
            )));
        }
        if self.min_samples == 0 {
            return Err(TopicsError::InvalidConfig(
                "min_samples must be >= 1".to_string(),
            ));
        }
        if !(self.epsilon > 0.0 && self.epsilon <= 1.0) {
            return Err(TopicsError::InvalidConfig(format!(
                "epsilon must be in (0.0, 1.0], got {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}

fn default_min_cluster_size() -> usize {
    5
}
fn default_min_samples() -> usize {
    3
}
fn default_epsilon() -> f64 {
    0.6
}

/// Topic labeling configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelingConfig {
    /// Maximum label length in characters
    #[serde(default = "default_max_label_length")]
    pub max_label_length: usize,

    /// Number of top keywords to extract
    #[serde(default = "default_top_keywords")]
    pub top_keywords: usize,

    /// Representative strings sent for remote label synthesis
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    /// Characters kept per representative string
    #[serde(default = "default_max_candidate_chars")]
    pub max_candidate_chars: usize,
}

impl Default for LabelingConfig {
    fn default() -> Self {
        Self {
            max_label_length: default_max_label_length(),
            top_keywords: default_top_keywords(),
            max_candidates: default_max_candidates(),
            max_candidate_chars: default_max_candidate_chars(),
        }
    }
}

impl LabelingConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), TopicsError> {
        if self.max_label_length == 0 || self.top_keywords == 0 || self.max_candidates == 0 {
            return Err(TopicsError::InvalidConfig(
                "max_label_length, top_keywords and max_candidates must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_max_label_length() -> usize {
    50
}
fn default_top_keywords() -> usize {
    5
}
fn default_max_candidates() -> usize {
    8
}
fn default_max_candidate_chars() -> usize {
    200
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_valid() {
        assert!(TopicsConfig::default().validate().is_ok());
    }

    #[test]
    fn test_vectorizer_defaults() {
        let config = VectorizerConfig::default();
        assert_eq!(config.max_features, 5000);
        assert_eq!(config.min_df, 1);
        assert!(config.use_bigrams);
        assert!(config.default_language.is_none());
    }

    #[test]
    fn test_cluster_defaults() {
        let config = ClusterConfig::default();
        assert_eq!(config.min_cluster_size, 5);
        assert_eq!(config.min_samples, 3);
        assert!((config.epsilon - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn test_invalid_cluster_config() {
        let config = ClusterConfig {
            min_cluster_size: 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ClusterConfig {
            epsilon: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_vectorizer_config() {
        let config = VectorizerConfig {
            max_df_ratio: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = VectorizerConfig {
            min_df: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = TopicsConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: TopicsConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.cluster, parsed.cluster);
        assert_eq!(config.vectorizer, parsed.vectorizer);
    }
}
