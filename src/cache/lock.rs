use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

fn recover<G>(
    poisoned: PoisonError<G>,
    target: &'static str,
    op: &'static str,
    lock_kind: &'static str,
) -> G {
    warn!(
        op,
        target_module = target,
        lock_kind,
        result = "poisoned_recovered",
        hint = "query entries may be stale after a panic in another thread",
        "Recovered from poisoned query cache lock"
    );
    poisoned.into_inner()
}

pub(crate) fn rw_read<'a, T>(
    lock: &'a RwLock<T>,
    target: &'static str,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    lock.read()
        .unwrap_or_else(|poisoned| recover(poisoned, target, op, "rwlock.read"))
}

pub(crate) fn rw_write<'a, T>(
    lock: &'a RwLock<T>,
    target: &'static str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    lock.write()
        .unwrap_or_else(|poisoned| recover(poisoned, target, op, "rwlock.write"))
}
