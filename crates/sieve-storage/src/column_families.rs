//! Column family definitions for RocksDB.
//!
//! - checkpoints: near-duplicate index snapshots
//! - cache: remote text service responses (Zstd, many small JSON values)
//! - documents: processed documents by id
//! - clusters: topic clusters of the most recent labeled run

use rocksdb::{ColumnFamilyDescriptor, Options};

/// Column family name for index checkpoints
pub const CF_CHECKPOINTS: &str = "checkpoints";

/// Column family name for cached remote responses
pub const CF_CACHE: &str = "cache";

/// Column family name for processed documents
pub const CF_DOCUMENTS: &str = "documents";

/// Column family name for topic clusters
pub const CF_CLUSTERS: &str = "clusters";

/// All column family names
pub const ALL_CF_NAMES: &[&str] = &[CF_CHECKPOINTS, CF_CACHE, CF_DOCUMENTS, CF_CLUSTERS];

fn compressed_options() -> Options {
    let mut opts = Options::default();
    opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
    opts
}

/// Build all column family descriptors
pub fn build_cf_descriptors() -> Vec<ColumnFamilyDescriptor> {
    vec![
        ColumnFamilyDescriptor::new(CF_CHECKPOINTS, Options::default()),
        ColumnFamilyDescriptor::new(CF_CACHE, compressed_options()),
        ColumnFamilyDescriptor::new(CF_DOCUMENTS, compressed_options()),
        ColumnFamilyDescriptor::new(CF_CLUSTERS, Options::default()),
    ]
}
