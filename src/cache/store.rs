//! Cache entry storage.
//!
//! Storage is a seam: the read-through layer treats every storage failure as
//! a miss, so a backend that can fail (a remote cache, a bounded store that is
//! full) plugs in without changing request behaviour.

use std::sync::Arc;
use std::time::Instant;

use dashmap::{DashMap, mapref::entry::Entry};
use serde_json::Value;
use thiserror::Error;

use super::config::Ttl;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub value: Arc<Value>,
    pub stored_at_version: i64,
    pub stored_at: Instant,
    pub ttl: Ttl,
}

/// Why an entry may or may not be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Expired,
    Superseded,
}

impl CacheEntry {
    /// An entry is servable only while the data version it was stamped with
    /// is still current and, for finite TTLs, its age is below the TTL.
    pub fn freshness(&self, now: Instant, current_version: i64) -> Freshness {
        if self.stored_at_version != current_version {
            return Freshness::Superseded;
        }
        if !self.ttl.admits(now.saturating_duration_since(self.stored_at)) {
            return Freshness::Expired;
        }
        Freshness::Fresh
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("cache storage unavailable: {0}")]
    Unavailable(String),
    #[error("cache storage is full ({limit} entries)")]
    Full { limit: usize },
}

pub trait CacheStorage: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<CacheEntry>, StorageError>;

    /// Insert or overwrite the entry under `entry.key`.
    fn store(&self, entry: CacheEntry) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;

    fn clear(&self) -> Result<(), StorageError>;

    /// Drop every entry that can no longer be served at `current_version`.
    /// Returns how many were removed. Stores that expire entries on their
    /// own may leave this as a no-op.
    fn retain_fresh(&self, _now: Instant, _current_version: i64) -> Result<usize, StorageError> {
        Ok(0)
    }

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process storage sharded by key, so readers and writers of different
/// keys do not contend on one lock.
pub struct MemoryStorage {
    entries: DashMap<String, CacheEntry>,
    max_entries: usize,
}

impl MemoryStorage {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: max_entries.max(1),
        }
    }
}

impl CacheStorage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<CacheEntry>, StorageError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn store(&self, entry: CacheEntry) -> Result<(), StorageError> {
        // Checked before taking the shard lock; concurrent inserts may
        // overshoot the limit by at most the number of writers.
        let full = self.entries.len() >= self.max_entries;
        match self.entries.entry(entry.key.clone()) {
            Entry::Occupied(mut occupied) => {
                occupied.insert(entry);
                Ok(())
            }
            Entry::Vacant(_) if full => Err(StorageError::Full {
                limit: self.max_entries,
            }),
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
                Ok(())
            }
        }
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.entries.clear();
        Ok(())
    }

    fn retain_fresh(&self, now: Instant, current_version: i64) -> Result<usize, StorageError> {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.freshness(now, current_version) == Freshness::Fresh);
        Ok(before.saturating_sub(self.entries.len()))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
