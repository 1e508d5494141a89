//! RocksDB wrapper for topic-sieve storage.
//!
//! Provides:
//! - Database open with column family setup
//! - Checkpoint and cache get/put by string key
//! - Document and cluster records as JSON values
//! - Atomic replacement of the stored cluster set

use std::path::Path;

use rocksdb::{IteratorMode, Options, WriteBatch, DB};
use sieve_types::{Document, TopicCluster};
use tracing::{debug, info, instrument};

use crate::column_families::{
    build_cf_descriptors, CF_CACHE, CF_CHECKPOINTS, CF_CLUSTERS, CF_DOCUMENTS,
};
use crate::error::StorageError;

/// Main storage interface for topic-sieve
pub struct Storage {
    db: DB,
}

impl Storage {
    /// Open storage at the given path, creating if necessary
    #[instrument(fields(path = %path.display()), skip(path))]
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        info!("Opening storage");

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_max_background_jobs(4);

        let db = DB::open_cf_descriptors(&db_opts, path, build_cf_descriptors())?;
        Ok(Self { db })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily, StorageError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(name.to_string()))
    }

    // ===== Checkpoints =====

    /// Store a checkpoint under a fixed name
    pub fn put_checkpoint(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let cf = self.cf(CF_CHECKPOINTS)?;
        self.db.put_cf(cf, name.as_bytes(), bytes)?;
        debug!(checkpoint = %name, bytes = bytes.len(), "Stored checkpoint");
        Ok(())
    }

    /// Get a checkpoint by name
    pub fn get_checkpoint(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let cf = self.cf(CF_CHECKPOINTS)?;
        Ok(self.db.get_cf(cf, name.as_bytes())?)
    }

    // ===== Cache =====

    /// Store a cache entry
    pub fn put_cache(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let cf = self.cf(CF_CACHE)?;
        self.db.put_cf(cf, key.as_bytes(), bytes)?;
        Ok(())
    }

    /// Get a cache entry
    pub fn get_cache(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let cf = self.cf(CF_CACHE)?;
        Ok(self.db.get_cf(cf, key.as_bytes())?)
    }

    /// Delete a cache entry
    pub fn delete_cache(&self, key: &str) -> Result<(), StorageError> {
        let cf = self.cf(CF_CACHE)?;
        self.db.delete_cf(cf, key.as_bytes())?;
        Ok(())
    }

    /// Number of cache entries, expired ones included
    pub fn count_cache_entries(&self) -> Result<u64, StorageError> {
        self.count_cf_entries(self.cf(CF_CACHE)?)
    }

    // ===== Documents =====

    /// Store a document under its id, replacing any previous version
    pub fn put_document(&self, document: &Document) -> Result<(), StorageError> {
        let cf = self.cf(CF_DOCUMENTS)?;
        self.db
            .put_cf(cf, document.id.as_bytes(), document.to_bytes()?)?;
        Ok(())
    }

    /// Store several documents atomically
    pub fn put_documents(&self, documents: &[Document]) -> Result<(), StorageError> {
        let cf = self.cf(CF_DOCUMENTS)?;
        let mut batch = WriteBatch::default();
        for document in documents {
            batch.put_cf(cf, document.id.as_bytes(), document.to_bytes()?);
        }
        self.db.write(batch)?;
        debug!(count = documents.len(), "Stored documents");
        Ok(())
    }

    /// Get a document by id
    pub fn get_document(&self, id: &str) -> Result<Option<Document>, StorageError> {
        let cf = self.cf(CF_DOCUMENTS)?;
        match self.db.get_cf(cf, id.as_bytes())? {
            Some(bytes) => Ok(Some(Document::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    // ===== Clusters =====

    /// Replace the stored cluster set with `clusters` in one write
    pub fn replace_clusters(&self, clusters: &[TopicCluster]) -> Result<(), StorageError> {
        let cf = self.cf(CF_CLUSTERS)?;
        let mut batch = WriteBatch::default();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, _) = item?;
            batch.delete_cf(cf, key);
        }
        for cluster in clusters {
            batch.put_cf(
                cf,
                cluster_key(cluster).as_bytes(),
                serde_json::to_vec(cluster)?,
            );
        }
        self.db.write(batch)?;
        debug!(count = clusters.len(), "Replaced clusters");
        Ok(())
    }

    /// Get a cluster by id value (`-1` is the noise bucket)
    pub fn get_cluster(&self, cluster_id: i32) -> Result<Option<TopicCluster>, StorageError> {
        let cf = self.cf(CF_CLUSTERS)?;
        match self.db.get_cf(cf, cluster_id.to_string().as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All stored clusters, ordered by id with noise last
    pub fn list_clusters(&self) -> Result<Vec<TopicCluster>, StorageError> {
        let cf = self.cf(CF_CLUSTERS)?;
        let mut clusters = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            clusters.push(serde_json::from_slice::<TopicCluster>(&value)?);
        }
        clusters.sort_by_key(|c| (c.is_noise(), c.cluster_id));
        Ok(clusters)
    }

    // ===== Admin =====

    /// Flush all memtables to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        for name in [CF_CHECKPOINTS, CF_CACHE, CF_DOCUMENTS, CF_CLUSTERS] {
            self.db.flush_cf(self.cf(name)?)?;
        }
        Ok(())
    }

    /// Get database statistics.
    pub fn get_stats(&self) -> Result<StorageStats, StorageError> {
        Ok(StorageStats {
            checkpoint_count: self.count_cf_entries(self.cf(CF_CHECKPOINTS)?)?,
            cache_entry_count: self.count_cf_entries(self.cf(CF_CACHE)?)?,
            document_count: self.count_cf_entries(self.cf(CF_DOCUMENTS)?)?,
            cluster_count: self.count_cf_entries(self.cf(CF_CLUSTERS)?)?,
        })
    }

    fn count_cf_entries(&self, cf: &rocksdb::ColumnFamily) -> Result<u64, StorageError> {
        let mut count = 0u64;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            item?;
            count += 1;
        }
        Ok(count)
    }
}

fn cluster_key(cluster: &TopicCluster) -> String {
    cluster.cluster_id.value().to_string()
}

/// Statistics about the storage.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StorageStats {
    pub checkpoint_count: u64,
    pub cache_entry_count: u64,
    pub document_count: u64,
    pub cluster_count: u64,
}
