//! # sieve-service
//!
//! Orchestration for the topic-sieve pipeline.
//!
//! ## Operations
//! - `deduplicate_and_index`: canonical-URL and near-duplicate filtering
//!   against an index that grows for the lifetime of the service
//! - `cluster`: TF-IDF vectorization and density clustering, unlabeled
//! - `cluster_and_label`: clustering plus remote label synthesis and
//!   per-document language, entity and keyword enrichment
//!
//! CPU-bound work runs on a blocking worker. Remote calls fan out with a
//! bounded number in flight and honour cooperative cancellation. Every run
//! returns a [`RunReport`] listing what fell back and why.

pub mod error;
pub mod persistence;
pub mod report;
pub mod service;
pub mod settings;

pub use error::ServiceError;
pub use persistence::{save_run, StorageCache, INDEX_CHECKPOINT};
pub use report::{DegradedItem, DegradedTarget, LabeledRun, RunReport};
pub use service::SieveService;
pub use settings::Settings;

pub use tokio_util::sync::CancellationToken;
