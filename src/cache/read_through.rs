//! Version-gated read-through cache.

use std::future::Future;
use std::sync::Arc;

use metrics::{counter, gauge};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, instrument, warn};

use crate::application::repos::MetadataRepo;

use super::clock::Clock;
use super::config::{CacheConfig, Ttl, TtlClass};
use super::keys::CacheKey;
use super::store::{CacheEntry, CacheStorage, Freshness, StorageError};
use super::version::VersionGate;

const TARGET: &str = "trove::cache";

/// Result of a lookup: the cached value, if any, and the data version the
/// lookup was judged against.
struct Lookup<T> {
    value: Option<T>,
    version: Option<i64>,
}

pub struct ReadThroughCache {
    config: CacheConfig,
    storage: Arc<dyn CacheStorage>,
    versions: VersionGate,
    clock: Arc<dyn Clock>,
}

impl ReadThroughCache {
    pub fn new(
        config: CacheConfig,
        storage: Arc<dyn CacheStorage>,
        reader: Arc<dyn MetadataRepo>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let versions = VersionGate::new(reader, clock.clone(), config.version_ttl);
        Self {
            config,
            storage,
            versions,
            clock,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn versions(&self) -> &VersionGate {
        &self.versions
    }

    pub fn ttl(&self, class: TtlClass) -> Ttl {
        self.config.ttl(class)
    }

    /// Cached value for `key` if it is still valid. Never touches the data
    /// source beyond the version check, and never fails: anything that goes
    /// wrong is reported as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        self.lookup(key).await.value
    }

    /// Store `value` stamped with the current data version. Skipped when the
    /// version is unknown, since such an entry could never be served.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &CacheKey, value: &T, ttl: Ttl) {
        match self.versions.current().await {
            Some(version) => self.store_at(key, value, ttl, version),
            None => skip_store(key, "version_unknown"),
        }
    }

    pub fn invalidate(&self, key: &CacheKey) {
        if let Err(err) = self.storage.remove(key.as_str()) {
            warn!(target: TARGET, key = %key, error = %err, "cache invalidation failed");
            return;
        }
        debug!(target: TARGET, key = %key, "cache entry invalidated");
        self.record_size();
    }

    /// Drop every entry and the cached version answer.
    pub fn clear(&self) {
        self.versions.reset();
        if let Err(err) = self.storage.clear() {
            warn!(target: TARGET, error = %err, "cache clear failed");
            return;
        }
        counter!("trove_cache_purge_total").increment(1);
        self.record_size();
    }

    /// Reclaim entries that can no longer be served. Returns how many were
    /// dropped; nothing is dropped while the version is unknown.
    pub async fn purge_stale(&self) -> usize {
        let Some(version) = self.versions.current().await else {
            return 0;
        };
        self.sweep(version)
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Serve `key` from cache, or run `load` and cache its result.
    ///
    /// The result is stamped with the version observed before loading, so a
    /// version bump that lands mid-load makes the new entry stale rather than
    /// passing old rows off as current. Loader errors are returned unchanged
    /// and nothing is stored.
    #[instrument(level = "debug", skip_all, fields(key = %key))]
    pub async fn fetch<T, E, F, Fut>(&self, key: CacheKey, class: TtlClass, load: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let lookup = self.lookup::<T>(&key).await;
        if let Some(value) = lookup.value {
            return Ok(value);
        }

        let value = load().await?;
        match lookup.version {
            Some(version) => self.store_at(&key, &value, self.ttl(class), version),
            None => skip_store(&key, "version_unknown"),
        }
        Ok(value)
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &CacheKey) -> Lookup<T> {
        let Some(version) = self.versions.current().await else {
            record_miss(key, "version_unknown");
            return Lookup {
                value: None,
                version: None,
            };
        };

        let miss = |reason: &'static str| {
            record_miss(key, reason);
            Lookup {
                value: None,
                version: Some(version),
            }
        };

        let entry = match self.storage.load(key.as_str()) {
            Ok(Some(entry)) => entry,
            Ok(None) => return miss("absent"),
            Err(err) => {
                warn!(target: TARGET, key = %key, error = %err, "cache lookup failed");
                return miss("unavailable");
            }
        };

        match entry.freshness(self.clock.now(), version) {
            Freshness::Fresh => {}
            Freshness::Expired => return miss("expired"),
            Freshness::Superseded => return miss("superseded"),
        }

        match T::deserialize(entry.value.as_ref()) {
            Ok(value) => {
                counter!("trove_cache_hit_total").increment(1);
                debug!(target: TARGET, key = %key, version, "cache hit");
                Lookup {
                    value: Some(value),
                    version: Some(version),
                }
            }
            Err(err) => {
                warn!(target: TARGET, key = %key, error = %err, "cached payload could not be decoded");
                miss("decode")
            }
        }
    }

    fn store_at<T: Serialize + ?Sized>(&self, key: &CacheKey, value: &T, ttl: Ttl, version: i64) {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(err) => {
                warn!(target: TARGET, key = %key, error = %err, "value could not be encoded for cache");
                skip_store(key, "encode");
                return;
            }
        };

        let entry = CacheEntry {
            key: key.as_str().to_string(),
            value: Arc::new(value),
            stored_at_version: version,
            stored_at: self.clock.now(),
            ttl,
        };

        let stored = match self.storage.store(entry.clone()) {
            // A full store may be holding only dead entries.
            Err(StorageError::Full { .. }) if self.sweep(version) > 0 => self.storage.store(entry),
            result => result,
        };

        match stored {
            Ok(()) => {
                counter!("trove_cache_store_total").increment(1);
                debug!(target: TARGET, key = %key, version, "cache entry stored");
                self.record_size();
            }
            Err(err) => {
                warn!(target: TARGET, key = %key, error = %err, "cache store failed");
                skip_store(key, "storage");
            }
        }
    }

    fn sweep(&self, version: i64) -> usize {
        match self.storage.retain_fresh(self.clock.now(), version) {
            Ok(0) => 0,
            Ok(removed) => {
                debug!(target: TARGET, removed, version, "stale cache entries reclaimed");
                self.record_size();
                removed
            }
            Err(err) => {
                warn!(target: TARGET, error = %err, "stale cache sweep failed");
                0
            }
        }
    }

    fn record_size(&self) {
        gauge!("trove_cache_entries").set(self.storage.len() as f64);
    }
}

fn record_miss(key: &CacheKey, reason: &'static str) {
    counter!("trove_cache_miss_total", "reason" => reason).increment(1);
    debug!(target: TARGET, key = %key, reason, "cache miss");
}

fn skip_store(key: &CacheKey, reason: &'static str) {
    counter!("trove_cache_store_skipped_total", "reason" => reason).increment(1);
    debug!(target: TARGET, key = %key, reason, "cache store skipped");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::application::repos::RepoError;
    use crate::cache::{ManualClock, MemoryStorage};
    use crate::domain::entities::VersionRecord;

    struct FixedVersion(AtomicI64);

    #[async_trait]
    impl MetadataRepo for FixedVersion {
        async fn data_version(&self) -> Result<Option<VersionRecord>, RepoError> {
            Ok(Some(VersionRecord {
                id: "global".to_string(),
                version: self.0.load(Ordering::SeqCst),
                last_synced_at: None,
            }))
        }
    }

    fn cache() -> (ReadThroughCache, Arc<FixedVersion>, Arc<ManualClock>) {
        let reader = Arc::new(FixedVersion(AtomicI64::new(1)));
        let clock = Arc::new(ManualClock::new());
        let cache = ReadThroughCache::new(
            CacheConfig::default(),
            Arc::new(MemoryStorage::new(64)),
            reader.clone(),
            clock.clone(),
        );
        (cache, reader, clock)
    }

    #[tokio::test]
    async fn fetch_loads_once_then_serves_from_cache() {
        let (cache, _, _) = cache();
        let loads = AtomicUsize::new(0);

        for _ in 0..3 {
            let rows: Vec<String> = cache
                .fetch(CacheKey::items(), TtlClass::Long, || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, RepoError>(vec!["anvil".to_string()])
                })
                .await
                .expect("fetch");
            assert_eq!(rows, vec!["anvil".to_string()]);
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fetch_propagates_loader_errors_without_storing() {
        let (cache, _, _) = cache();
        let result: Result<Vec<String>, RepoError> = cache
            .fetch(CacheKey::items(), TtlClass::Long, || async {
                Err(RepoError::data_access("permission denied for view items"))
            })
            .await;

        let err = result.expect_err("loader error");
        assert_eq!(err.to_string(), "permission denied for view items");
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn mismatched_payload_type_is_a_miss() {
        let (cache, _, _) = cache();
        cache
            .set(&CacheKey::items(), &vec!["anvil"], Ttl::Infinite)
            .await;

        let decoded: Option<Vec<u64>> = cache.get(&CacheKey::items()).await;
        assert!(decoded.is_none());
        let decoded: Option<Vec<String>> = cache.get(&CacheKey::items()).await;
        assert_eq!(decoded, Some(vec!["anvil".to_string()]));
    }

    #[tokio::test]
    async fn version_bump_mid_load_leaves_the_entry_stale() {
        let (cache, reader, clock) = cache();

        let _: Vec<u8> = cache
            .fetch(CacheKey::items(), TtlClass::Long, || async {
                // The sync job lands while the view is being read.
                reader.0.store(2, Ordering::SeqCst);
                cache.versions().reset();
                Ok::<_, RepoError>(vec![1])
            })
            .await
            .expect("fetch");

        clock.advance(Duration::from_secs(1));
        assert!(cache.get::<Vec<u8>>(&CacheKey::items()).await.is_none());
    }
}
