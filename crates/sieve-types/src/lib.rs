//! # sieve-types
//!
//! Shared domain types for the topic-sieve engine.
//!
//! This crate defines the records that flow through the pipeline:
//! - Documents: harvested text, mutated in place as it is deduplicated and processed
//! - Topic clusters: groups of document ids, including the distinguished noise bucket
//! - Source records: the loosely-typed input supplied by document sources
//!
//! ## Usage
//!
//! ```rust
//! use sieve_types::{Document, DocumentStatus};
//!
//! let doc = Document::new(Some("https://example.com/a".into()), "text".into(), None);
//! assert_eq!(doc.status, DocumentStatus::Raw);
//! ```

pub mod cluster;
pub mod document;
pub mod error;

pub use cluster::{ClusterId, LabelSource, TopicCluster};
pub use document::{Document, DocumentId, DocumentStatus, SourceDocument};
pub use error::SieveError;
