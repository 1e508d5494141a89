//! topic-sieve command-line library.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (dedup, cluster, label, stats)

pub mod cli;
pub mod commands;

pub use cli::{Cli, ClusterArgs, Commands};
pub use commands::{run_cluster, run_dedup, run_label, run_stats, Context};
