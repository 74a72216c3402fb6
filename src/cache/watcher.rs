//! Background purge of entries superseded by a data version bump.
//!
//! Reads already refuse stale entries; the watcher only reclaims their
//! memory and logs when the upstream data moved. Between bumps it sweeps out
//! finite entries that outlived their TTL.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use super::read_through::ReadThroughCache;

pub struct VersionWatcher {
    cache: Arc<ReadThroughCache>,
    last_seen: Option<i64>,
}

impl VersionWatcher {
    pub fn new(cache: Arc<ReadThroughCache>) -> Self {
        Self {
            cache,
            last_seen: None,
        }
    }

    /// Check the version once. Returns true when a bump was observed and the
    /// cache was purged.
    pub async fn poll(&mut self) -> bool {
        let Some(current) = self.cache.versions().current().await else {
            return false;
        };

        let previous = self.last_seen.replace(current);
        match previous {
            Some(previous) if previous != current => {
                let purged = self.cache.len();
                self.cache.clear();
                info!(
                    target: "trove::cache::watcher",
                    previous,
                    current,
                    purged,
                    "data version changed; cache purged"
                );
                true
            }
            _ => {
                self.cache.purge_stale().await;
                false
            }
        }
    }

    /// Poll on the VERSION TTL cadence until the task is aborted.
    pub fn spawn(mut self) -> JoinHandle<()> {
        let period = self.cache.config().version_ttl;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                self.poll().await;
            }
        })
    }
}
