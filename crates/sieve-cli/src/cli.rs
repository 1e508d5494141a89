//! CLI argument parsing for topic-sieve.
//!
//! CLI flags override all other config sources.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// topic-sieve
///
/// Near-duplicate filtering and topic clustering for harvested documents.
#[derive(Parser, Debug)]
#[command(name = "topic-sieve")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/topic-sieve/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Override database path
    #[arg(long, global = true)]
    pub db_path: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Remove duplicate documents from a JSON-lines file
    Dedup {
        /// Input file, one JSON document per line
        #[arg(short, long)]
        input: PathBuf,

        /// Write unique documents here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Restore and save the index checkpoint in the database
        #[arg(long)]
        persist: bool,
    },

    /// Deduplicate, then print unlabeled topic clusters
    Cluster {
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        cluster: ClusterArgs,
    },

    /// Deduplicate, cluster, then label and enrich with the text service
    Label {
        #[arg(short, long)]
        input: PathBuf,

        /// Do not contact the text service; use fallbacks only
        #[arg(long)]
        offline: bool,

        #[command(flatten)]
        cluster: ClusterArgs,
    },

    /// Show index and cache statistics from the database
    Stats,
}

/// Overrides for the clustering section of the config.
#[derive(Args, Debug, Clone, Default)]
pub struct ClusterArgs {
    /// Smallest group reported as a cluster
    #[arg(long)]
    pub min_cluster_size: Option<usize>,

    /// Neighbours (including itself) a document needs to be a core point
    #[arg(long)]
    pub min_samples: Option<usize>,

    /// Neighbourhood radius in cosine distance
    #[arg(long)]
    pub epsilon: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_dedup() {
        let cli = Cli::parse_from([
            "topic-sieve",
            "dedup",
            "--input",
            "docs.jsonl",
            "-o",
            "out.jsonl",
            "--persist",
        ]);
        match cli.command {
            Commands::Dedup {
                input,
                output,
                persist,
            } => {
                assert_eq!(input, PathBuf::from("docs.jsonl"));
                assert_eq!(output, Some(PathBuf::from("out.jsonl")));
                assert!(persist);
            }
            _ => panic!("Expected Dedup command"),
        }
    }

    #[test]
    fn test_cli_cluster_overrides() {
        let cli = Cli::parse_from([
            "topic-sieve",
            "cluster",
            "-i",
            "docs.jsonl",
            "--min-cluster-size",
            "4",
            "--epsilon",
            "0.45",
        ]);
        match cli.command {
            Commands::Cluster { cluster, .. } => {
                assert_eq!(cluster.min_cluster_size, Some(4));
                assert_eq!(cluster.min_samples, None);
                assert_eq!(cluster.epsilon, Some(0.45));
            }
            _ => panic!("Expected Cluster command"),
        }
    }

    #[test]
    fn test_cli_label_offline_with_globals() {
        let cli = Cli::parse_from([
            "topic-sieve",
            "label",
            "-i",
            "docs.jsonl",
            "--offline",
            "--config",
            "/path/to/config.toml",
            "--log-level",
            "debug",
        ]);
        assert_eq!(cli.config, Some("/path/to/config.toml".to_string()));
        assert_eq!(cli.log_level, Some("debug".to_string()));
        assert!(matches!(cli.command, Commands::Label { offline: true, .. }));
    }

    #[test]
    fn test_cli_stats() {
        let cli = Cli::parse_from(["topic-sieve", "--db-path", "/tmp/db", "stats"]);
        assert_eq!(cli.db_path, Some("/tmp/db".to_string()));
        assert!(matches!(cli.command, Commands::Stats));
    }
}
