//! Poison-tolerant locking.
//!
//! Handler callbacks run behind these locks; a panic in one must not
//! poison transport state for the rest of the session.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the guard if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
