//! topic-sieve
//!
//! Deduplicate harvested documents and group them into topics.
//!
//! # Usage
//!
//! ```bash
//! topic-sieve dedup --input docs.jsonl [--output unique.jsonl] [--persist]
//! topic-sieve cluster --input docs.jsonl [--min-cluster-size N] [--epsilon X]
//! topic-sieve label --input docs.jsonl [--offline]
//! topic-sieve stats
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/topic-sieve/config.toml)
//! 3. Environment variables (SIEVE_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use sieve_cli::{run_cluster, run_dedup, run_label, run_stats, Cli, Commands, Context};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let ctx = Context::init(
        cli.config.as_deref(),
        cli.log_level.as_deref(),
        cli.db_path.as_deref(),
    )?;

    match cli.command {
        Commands::Dedup {
            input,
            output,
            persist,
        } => {
            run_dedup(&ctx, &input, output.as_deref(), persist)?;
        }
        Commands::Cluster { input, cluster } => {
            run_cluster(&ctx, &input, &cluster)?;
        }
        Commands::Label {
            input,
            offline,
            cluster,
        } => {
            run_label(&ctx, &input, offline, &cluster).await?;
        }
        Commands::Stats => {
            run_stats(&ctx)?;
        }
    }

    Ok(())
}
