//! Lock poisoning helpers
//!
//! A poisoned lock means a panic happened while it was held. Callers turn
//! that into their own error type instead of unwrapping.

use std::sync::{LockResult, MutexGuard, RwLockReadGuard, RwLockWriteGuard};

fn poison_message(kind: &str, detail: impl std::fmt::Debug) -> String {
    format!(
        "Internal synchronisation error ({} poisoned). A panic occurred while the lock was held. PoisonError: {:?}",
        kind, detail
    )
}

/// Map a poisoned `Mutex::lock` into an application error
pub fn handle_mutex_poison<T, E>(
    result: LockResult<MutexGuard<'_, T>>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<MutexGuard<'_, T>, E> {
    result.map_err(|poison_err| error_constructor(poison_message("mutex", poison_err)))
}

/// Map a poisoned `RwLock::read` into an application error
pub fn handle_rwlock_read<T, E>(
    result: LockResult<RwLockReadGuard<'_, T>>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<RwLockReadGuard<'_, T>, E> {
    result.map_err(|poison_err| error_constructor(poison_message("RwLock read", poison_err)))
}

/// Map a poisoned `RwLock::write` into an application error
pub fn handle_rwlock_write<T, E>(
    result: LockResult<RwLockWriteGuard<'_, T>>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<RwLockWriteGuard<'_, T>, E> {
    result.map_err(|poison_err| error_constructor(poison_message("RwLock write", poison_err)))
}
