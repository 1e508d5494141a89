//! Configuration loading for topic-sieve.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at `<config dir>/topic-sieve/config.toml`.

use std::path::PathBuf;

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::Deserialize;

use sieve_dedup::DedupConfig;
use sieve_text::TextServiceConfig;
use sieve_topics::TopicsConfig;

use crate::error::ServiceError;

const APP_NAME: &str = "topic-sieve";

/// Complete service settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Path to the RocksDB directory
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub dedup: DedupConfig,

    /// Vectorizer, cluster and labeling sections
    #[serde(default)]
    pub topics: TopicsConfig,

    /// Remote text service
    #[serde(default)]
    pub text: TextServiceConfig,
}

fn default_db_path() -> String {
    ProjectDirs::from("", "", APP_NAME)
        .map(|p| p.data_local_dir().join("db"))
        .unwrap_or_else(|| PathBuf::from("./data"))
        .to_string_lossy()
        .to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            log_level: default_log_level(),
            dedup: DedupConfig::default(),
            topics: TopicsConfig::default(),
            text: TextServiceConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Default config file (if it exists)
    /// 3. CLI-specified config file (must exist)
    /// 4. Environment variables (`SIEVE_*`, `__` between nested keys)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, ServiceError> {
        let config_dir = ProjectDirs::from("", "", APP_NAME)
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("db_path", default_db_path())
            .map_err(|e| ServiceError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| ServiceError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // SIEVE_DB_PATH, SIEVE_TEXT__PROVIDER, SIEVE_TOPICS__CLUSTER__EPSILON, etc.
        builder = builder.add_source(
            Environment::with_prefix("SIEVE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder
            .build()
            .map_err(|e| ServiceError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| ServiceError::Config(e.to_string()))?;
        Ok(settings)
    }

    /// Validate every section. Called before any processing starts.
    pub fn validate(&self) -> Result<(), ServiceError> {
        self.dedup.validate()?;
        self.topics.validate()?;
        self.text.validate()?;
        if self.db_path.trim().is_empty() {
            return Err(ServiceError::Config("db_path must not be empty".to_string()));
        }
        Ok(())
    }
}
