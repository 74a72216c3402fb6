//! Data version lookups with bounded staleness.
//!
//! Every cache read needs the current data version. Reading the metadata row
//! on each request would double upstream traffic, so the last answer is kept
//! for the VERSION TTL and re-read after it lapses.

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use metrics::counter;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::application::repos::{MetadataRepo, RepoError};
use crate::domain::entities::VersionRecord;

use super::clock::Clock;
use super::lock::{rw_read, rw_write};

const TARGET: &str = "trove::cache::version";

#[derive(Clone)]
struct Snapshot {
    record: Option<VersionRecord>,
    /// `None` once reset: the record is kept as the floor for later reads
    /// but is no longer served.
    read_at: Option<Instant>,
}

pub struct VersionGate {
    reader: Arc<dyn MetadataRepo>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    snapshot: RwLock<Option<Snapshot>>,
    refresh: Mutex<()>,
}

impl VersionGate {
    pub fn new(reader: Arc<dyn MetadataRepo>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            reader,
            clock,
            ttl,
            snapshot: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    /// Current version record, re-read when the cached answer is older than
    /// the VERSION TTL. Read failures propagate and leave the previous
    /// snapshot untouched.
    ///
    /// Refreshes are single-flight: concurrent callers at expiry wait for
    /// one read instead of each hitting the metadata row. The version never
    /// moves backwards; a read older than the snapshot keeps the newer record.
    pub async fn record(&self) -> Result<Option<VersionRecord>, RepoError> {
        if let Some(snapshot) = self.fresh_snapshot() {
            return Ok(snapshot.record);
        }

        let _refresh = self.refresh.lock().await;
        if let Some(snapshot) = self.fresh_snapshot() {
            return Ok(snapshot.record);
        }

        counter!("trove_version_read_total").increment(1);
        let read = self.reader.data_version().await?;

        let mut slot = rw_write(&self.snapshot, "version.store");
        let floor = slot.as_ref().and_then(|snapshot| snapshot.record.clone());
        let record = match (floor, read) {
            (Some(floor), Some(read)) if read.version < floor.version => {
                warn!(
                    target: TARGET,
                    current = floor.version,
                    read = read.version,
                    "ignoring data version older than the current one"
                );
                Some(floor)
            }
            (_, read) => read,
        };
        debug!(
            target: TARGET,
            version = record.as_ref().map(|r| r.version),
            "data version read"
        );

        *slot = Some(Snapshot {
            record: record.clone(),
            read_at: Some(self.clock.now()),
        });
        Ok(record)
    }

    /// Version number to gate cache entries on. `None` when the row is absent
    /// or could not be read; callers must treat that as a miss.
    pub async fn current(&self) -> Option<i64> {
        match self.record().await {
            Ok(record) => record.map(|record| record.version),
            Err(err) => {
                counter!("trove_version_read_error_total").increment(1);
                warn!(
                    target: TARGET,
                    error = %err,
                    "data version unavailable; forcing cache miss"
                );
                None
            }
        }
    }

    /// Force the next lookup to read the row.
    pub fn reset(&self) {
        if let Some(snapshot) = rw_write(&self.snapshot, "version.reset").as_mut() {
            snapshot.read_at = None;
        }
    }

    fn fresh_snapshot(&self) -> Option<Snapshot> {
        let guard = rw_read(&self.snapshot, "version.load");
        let snapshot = guard.as_ref()?;
        let age = self
            .clock
            .now()
            .saturating_duration_since(snapshot.read_at?);
        (age < self.ttl).then(|| snapshot.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::cache::clock::ManualClock;

    #[derive(Default)]
    struct CountingReader {
        version: AtomicI64,
        reads: AtomicUsize,
        fail: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl MetadataRepo for CountingReader {
        async fn data_version(&self) -> Result<Option<VersionRecord>, RepoError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(RepoError::data_access("metadata view offline"));
            }
            let version = self.version.load(Ordering::SeqCst);
            Ok((version > 0).then(|| VersionRecord {
                id: "global".to_string(),
                version,
                last_synced_at: None,
            }))
        }
    }

    fn gate(reader: Arc<CountingReader>, clock: Arc<ManualClock>) -> VersionGate {
        VersionGate::new(reader, clock, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn reads_at_most_once_per_ttl() {
        let reader = Arc::new(CountingReader::default());
        reader.version.store(3, Ordering::SeqCst);
        let clock = Arc::new(ManualClock::new());
        let gate = gate(reader.clone(), clock.clone());

        assert_eq!(gate.current().await, Some(3));
        reader.version.store(4, Ordering::SeqCst);
        clock.advance(Duration::from_secs(59));
        assert_eq!(gate.current().await, Some(3));
        assert_eq!(reader.reads.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_secs(1));
        assert_eq!(gate.current().await, Some(4));
        assert_eq!(reader.reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn absent_row_is_unknown() {
        let reader = Arc::new(CountingReader::default());
        let gate = gate(reader, Arc::new(ManualClock::new()));
        assert_eq!(gate.current().await, None);
        assert_eq!(gate.record().await.expect("read succeeds"), None);
    }

    #[tokio::test]
    async fn read_failure_is_unknown_and_not_cached() {
        let reader = Arc::new(CountingReader::default());
        reader.version.store(9, Ordering::SeqCst);
        reader.fail.store(true, Ordering::SeqCst);
        let gate = gate(reader.clone(), Arc::new(ManualClock::new()));

        assert_eq!(gate.current().await, None);
        assert!(gate.record().await.is_err());

        reader.fail.store(false, Ordering::SeqCst);
        assert_eq!(gate.current().await, Some(9));
        assert_eq!(reader.reads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn reset_forces_a_fresh_read() {
        let reader = Arc::new(CountingReader::default());
        reader.version.store(1, Ordering::SeqCst);
        let gate = gate(reader.clone(), Arc::new(ManualClock::new()));

        assert_eq!(gate.current().await, Some(1));
        reader.version.store(2, Ordering::SeqCst);
        gate.reset();
        assert_eq!(gate.current().await, Some(2));
    }

    /// Reader whose first call parks until released, returning the version
    /// it saw on entry.
    struct ParkedReader {
        version: AtomicI64,
        reads: AtomicUsize,
        release: tokio::sync::Notify,
        park_first: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl MetadataRepo for ParkedReader {
        async fn data_version(&self) -> Result<Option<VersionRecord>, RepoError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            let version = self.version.load(Ordering::SeqCst);
            if self.park_first.swap(false, Ordering::SeqCst) {
                self.release.notified().await;
            }
            Ok(Some(VersionRecord {
                id: "global".to_string(),
                version,
                last_synced_at: None,
            }))
        }
    }

    #[tokio::test]
    async fn concurrent_refreshes_share_one_read() {
        let reader = Arc::new(ParkedReader {
            version: AtomicI64::new(1),
            reads: AtomicUsize::new(0),
            release: tokio::sync::Notify::new(),
            park_first: std::sync::atomic::AtomicBool::new(true),
        });
        let gate = Arc::new(VersionGate::new(
            reader.clone(),
            Arc::new(ManualClock::new()),
            Duration::from_secs(60),
        ));

        let slow = tokio::spawn({
            let gate = gate.clone();
            async move { gate.current().await }
        });
        tokio::task::yield_now().await;

        // The sync job lands while the first read is in flight.
        reader.version.store(2, Ordering::SeqCst);
        let fast = tokio::spawn({
            let gate = gate.clone();
            async move { gate.current().await }
        });
        tokio::task::yield_now().await;

        reader.release.notify_one();
        let slow = slow.await.expect("slow task");
        let fast = fast.await.expect("fast task");

        assert_eq!(slow, Some(1));
        assert_eq!(fast, Some(1));
        assert_eq!(reader.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn version_never_moves_backwards() {
        let reader = Arc::new(CountingReader::default());
        reader.version.store(5, Ordering::SeqCst);
        let gate = gate(reader.clone(), Arc::new(ManualClock::new()));
        assert_eq!(gate.current().await, Some(5));

        // A lagging replica answers with an older row.
        reader.version.store(4, Ordering::SeqCst);
        gate.reset();
        assert_eq!(gate.current().await, Some(5));
        assert_eq!(reader.reads.load(Ordering::SeqCst), 2);

        reader.version.store(6, Ordering::SeqCst);
        gate.reset();
        assert_eq!(gate.current().await, Some(6));
    }
}
