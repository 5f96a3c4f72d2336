//! Lock backend for the queue.
//!
//! The standard library primitives poison when a thread panics while holding
//! the lock; that surfaces as [`QueueError::FatalSync`]. With `parking-lot`
//! the primitives cannot fail and these helpers always succeed.

#[cfg(not(feature = "parking-lot"))]
use crate::error::QueueError;
use crate::error::Result;

#[cfg(not(feature = "parking-lot"))]
pub(crate) use std::sync::{Condvar, Mutex, MutexGuard};

#[cfg(feature = "parking-lot")]
pub(crate) use parking_lot::{Condvar, Mutex, MutexGuard};

/// Acquires `mutex`.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    #[cfg(feature = "parking-lot")]
    {
        Ok(mutex.lock())
    }
    #[cfg(not(feature = "parking-lot"))]
    {
        // Dropping the poison error releases the lock it carries.
        mutex.lock().map_err(|_| fatal("lock"))
    }
}

/// Acquires `mutex` for a read-only look, ignoring poisoning.
pub(crate) fn lock_for_inspection<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    #[cfg(feature = "parking-lot")]
    {
        mutex.lock()
    }
    #[cfg(not(feature = "parking-lot"))]
    {
        mutex
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Parks on `condvar` until `blocked` no longer holds.
///
/// The predicate is re-tested after every wake-up, so spurious wake-ups and
/// notifications that raced ahead of the wait are both harmless. The lock is
/// released while parked and held again whenever `blocked` runs.
pub(crate) fn wait_while<'a, T, F>(
    condvar: &Condvar,
    mut guard: MutexGuard<'a, T>,
    mut blocked: F,
) -> Result<MutexGuard<'a, T>>
where
    F: FnMut(&T) -> bool,
{
    while blocked(&*guard) {
        #[cfg(feature = "parking-lot")]
        {
            condvar.wait(&mut guard);
        }
        #[cfg(not(feature = "parking-lot"))]
        {
            guard = condvar.wait(guard).map_err(|_| fatal("wait"))?;
        }
    }
    Ok(guard)
}

/// Consumes `mutex`, returning its contents.
pub(crate) fn into_inner<T>(mutex: Mutex<T>) -> Result<T> {
    #[cfg(feature = "parking-lot")]
    {
        Ok(mutex.into_inner())
    }
    #[cfg(not(feature = "parking-lot"))]
    {
        mutex.into_inner().map_err(|_| fatal("destroy"))
    }
}

#[cfg(not(feature = "parking-lot"))]
#[cold]
fn fatal(context: &'static str) -> QueueError {
    #[cfg(feature = "tracing")]
    tracing::error!("Queue {context} failed: lock poisoned");
    QueueError::FatalSync { context }
}
