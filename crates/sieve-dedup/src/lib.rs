//! # sieve-dedup
//!
//! Near-duplicate filtering for harvested documents.
//!
//! Documents pass two gates, cheapest first:
//! 1. Canonical URL: origins that normalize to the same string are duplicates
//!    no matter what their content says.
//! 2. Content: a min-hash fingerprint over word shingles is looked up in an
//!    LSH-banded index, and candidates are confirmed against the full
//!    fingerprint before a match is declared.
//!
//! ## Features
//! - Tracking-parameter stripping with prefix patterns (`utm_*`)
//! - Deterministic fingerprints for fixed `(k, P, seed)`
//! - Inclusive similarity threshold, first-inserted document wins
//! - Serializable index snapshots for cross-session persistence
//! - Safe degradation: malformed URLs fall back to content-only checks

pub mod canonical;
pub mod config;
pub mod dedup;
pub mod error;
pub mod fingerprint;
pub mod index;

pub use canonical::{canonicalize, Canonical};
pub use config::DedupConfig;
pub use dedup::{DedupStats, Deduplicator, DuplicateKind, DuplicateRecord};
pub use error::DedupError;
pub use fingerprint::{ContentFingerprint, Fingerprinter};
pub use index::{IndexSnapshot, NearDuplicateIndex};
