//! Poison-tolerant lock access.
//!
//! Cache state is a re-derivation of upstream data, so a panic while a guard
//! was held never leaves it in a state worth refusing to read.

use std::sync::{
    LockResult, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use tracing::warn;

pub(crate) fn rw_read<'a, T>(lock: &'a RwLock<T>, op: &'static str) -> RwLockReadGuard<'a, T> {
    recover(lock.read(), op, "rwlock.read")
}

pub(crate) fn rw_write<'a, T>(lock: &'a RwLock<T>, op: &'static str) -> RwLockWriteGuard<'a, T> {
    recover(lock.write(), op, "rwlock.write")
}

pub(crate) fn mutex_lock<'a, T>(lock: &'a Mutex<T>, op: &'static str) -> MutexGuard<'a, T> {
    recover(lock.lock(), op, "mutex.lock")
}

fn recover<G>(result: LockResult<G>, op: &'static str, lock_kind: &'static str) -> G {
    result.unwrap_or_else(|poisoned: PoisonError<G>| {
        warn!(
            target: "trove::cache::lock",
            op,
            lock_kind,
            result = "poisoned_recovered",
            "Recovered from poisoned cache lock"
        );
        poisoned.into_inner()
    })
}
