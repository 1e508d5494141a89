//! Persistence adapters over [`Storage`].
//!
//! - [`StorageCache`]: the remote-response cache in the `cache` column family
//! - Index checkpoints: save/restore of the near-duplicate index
//! - Run results: documents and clusters by id

use std::sync::Arc;

use tracing::{debug, info, instrument};

use sieve_dedup::{Deduplicator, IndexSnapshot};
use sieve_storage::Storage;
use sieve_text::{CacheEntry, CacheError, CacheStore};

use crate::error::ServiceError;
use crate::report::LabeledRun;
use crate::service::SieveService;

/// Checkpoint key of the near-duplicate index snapshot.
pub const INDEX_CHECKPOINT: &str = "dedup_index";

/// [`CacheStore`] backed by RocksDB. Survives restarts.
pub struct StorageCache {
    storage: Arc<Storage>,
}

impl StorageCache {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

impl CacheStore for StorageCache {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let bytes = self
            .storage
            .get_cache(key)
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        match bytes {
            Some(bytes) => Ok(Some(CacheEntry::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put(&self, entry: CacheEntry) -> Result<(), CacheError> {
        self.storage
            .put_cache(&entry.key, &entry.to_bytes()?)
            .map_err(|e| CacheError::Backend(e.to_string()))
    }
}

impl SieveService {
    /// Write the current index snapshot. Returns the number of indexed documents.
    #[instrument(skip_all)]
    pub fn save_index(&self, storage: &Storage) -> Result<usize, ServiceError> {
        let snapshot = self.lock_deduplicator()?.snapshot();
        let bytes = snapshot.to_bytes()?;
        storage.put_checkpoint(INDEX_CHECKPOINT, &bytes)?;
        info!(documents = snapshot.len(), bytes = bytes.len(), "Saved index checkpoint");
        Ok(snapshot.len())
    }

    /// Replace the session index with the stored checkpoint, if one exists.
    ///
    /// Returns whether a checkpoint was loaded. A checkpoint taken with
    /// different fingerprint parameters is rejected.
    #[instrument(skip_all)]
    pub fn load_index(&self, storage: &Storage) -> Result<bool, ServiceError> {
        let Some(bytes) = storage.get_checkpoint(INDEX_CHECKPOINT)? else {
            debug!("No index checkpoint stored");
            return Ok(false);
        };
        let snapshot = IndexSnapshot::from_bytes(&bytes)?;
        let documents = snapshot.len();
        let restored = Deduplicator::restore(self.settings.dedup.clone(), snapshot)?;
        *self.lock_deduplicator()? = restored;
        info!(documents, "Restored index checkpoint");
        Ok(true)
    }
}

/// Store the documents and clusters of a run, replacing earlier clusters.
#[instrument(skip_all)]
pub fn save_run(storage: &Storage, run: &LabeledRun) -> Result<(), ServiceError> {
    storage.put_documents(&run.documents)?;
    storage.replace_clusters(&run.clusters)?;
    info!(
        documents = run.documents.len(),
        clusters = run.clusters.len(),
        "Saved run"
    );
    Ok(())
}
