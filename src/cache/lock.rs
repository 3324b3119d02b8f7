use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

const SOURCE: &str = "cache::memory";

pub(crate) fn rw_read<'a, T>(lock: &'a RwLock<T>, op: &'static str) -> RwLockReadGuard<'a, T> {
    lock.read().unwrap_or_else(|poisoned| {
        report_poisoned(op, "rwlock.read");
        poisoned.into_inner()
    })
}

pub(crate) fn rw_write<'a, T>(lock: &'a RwLock<T>, op: &'static str) -> RwLockWriteGuard<'a, T> {
    lock.write().unwrap_or_else(|poisoned| {
        report_poisoned(op, "rwlock.write");
        poisoned.into_inner()
    })
}

fn report_poisoned(op: &'static str, lock_kind: &'static str) {
    warn!(
        op,
        target_module = SOURCE,
        lock_kind,
        result = "poisoned_recovered",
        hint = "entries may be stale after a panic in another task; TTL still bounds them",
        "Recovered from poisoned memory cache lock"
    );
}
