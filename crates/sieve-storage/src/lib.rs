//! Storage layer for topic-sieve.
//!
//! Provides RocksDB-backed key/value storage with:
//! - Column family isolation per record kind
//! - Index checkpoints for cross-session deduplication
//! - Remote-response cache entries
//! - Processed documents and the latest run's clusters

pub mod column_families;
pub mod db;
pub mod error;

pub use db::{Storage, StorageStats};
pub use error::StorageError;
