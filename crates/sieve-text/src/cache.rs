//! Response cache abstraction.
//!
//! Any key-value store can back the cache by implementing [`CacheStore`].
//! Expiry is judged by the reader, so stores only need get and put.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CacheError;

/// A cached remote response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// `"<operation>:<input hash>"`
    pub key: String,
    /// Result payload as JSON
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub ttl_secs: u64,
}

impl CacheEntry {
    /// Create an entry stamped with the current time.
    pub fn new(key: impl Into<String>, payload: serde_json::Value, ttl_secs: u64) -> Self {
        Self {
            key: key.into(),
            payload,
            created_at: Utc::now(),
            ttl_secs,
        }
    }

    /// Whether the entry has outlived its TTL at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let expires_at = i64::try_from(self.ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|ttl| self.created_at.checked_add_signed(ttl));
        match expires_at {
            Some(expires_at) => now >= expires_at,
            None => false,
        }
    }

    /// Serialize to JSON bytes for storage.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CacheError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CacheError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Get/put-by-key storage for cache entries.
///
/// Implementations must tolerate concurrent readers.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError>;

    fn put(&self, entry: CacheEntry) -> Result<(), CacheError>;
}

/// In-memory cache. Lost on restart.
///
/// Expired entries are dropped whenever a new entry is stored.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, CacheError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| CacheError::Backend("cache lock poisoned".to_string()))?;
        Ok(retain_fresh(&mut entries, Utc::now()))
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| CacheError::Backend("cache lock poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, entry: CacheEntry) -> Result<(), CacheError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| CacheError::Backend("cache lock poisoned".to_string()))?;
        let removed = retain_fresh(&mut entries, Utc::now());
        if removed > 0 {
            debug!(removed, "Evicted expired cache entries");
        }
        entries.insert(entry.key.clone(), entry);
        Ok(())
    }
}

fn retain_fresh(entries: &mut HashMap<String, CacheEntry>, now: DateTime<Utc>) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| !entry.is_expired(now));
    before - entries.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_expiry() {
        let entry = CacheEntry::new("k", json!("v"), 60);
        assert!(!entry.is_expired(entry.created_at));
        assert!(!entry.is_expired(entry.created_at + Duration::seconds(59)));
        assert!(entry.is_expired(entry.created_at + Duration::seconds(60)));
    }

    #[test]
    fn test_huge_ttl_never_expires() {
        let entry = CacheEntry::new("k", json!(1), u64::MAX);
        assert!(!entry.is_expired(Utc::now() + Duration::days(365 * 100)));
    }

    #[test]
    fn test_memory_cache_roundtrip() {
        let cache = MemoryCache::new();
        assert!(cache.is_empty());
        cache
            .put(CacheEntry::new("detect_language:abc", json!({"code": "en"}), 10))
            .unwrap();
        let entry = cache.get("detect_language:abc").unwrap().unwrap();
        assert_eq!(entry.payload, json!({"code": "en"}));
        assert!(cache.get("missing").unwrap().is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_put_evicts_expired_entries() {
        let cache = MemoryCache::new();
        cache.put(CacheEntry::new("stale:1", json!(1), 0)).unwrap();
        cache.put(CacheEntry::new("stale:2", json!(2), 0)).unwrap();
        cache.put(CacheEntry::new("fresh", json!(3), 60)).unwrap();

        assert_eq!(cache.len(), 1);
        assert!(cache.get("stale:1").unwrap().is_none());
        assert!(cache.get("fresh").unwrap().is_some());
    }

    #[test]
    fn test_purge_expired() {
        let cache = MemoryCache::new();
        cache.put(CacheEntry::new("fresh", json!(1), 60)).unwrap();
        cache.put(CacheEntry::new("stale", json!(2), 0)).unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.purge_expired().unwrap(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.purge_expired().unwrap(), 0);
    }

    #[test]
    fn test_entry_bytes() {
        let entry = CacheEntry::new("k", json!([1, 2]), 5);
        let restored = CacheEntry::from_bytes(&entry.to_bytes().unwrap()).unwrap();
        assert_eq!(entry, restored);
    }
}
