use super::{
    ring::Ring,
    sync::{self, Condvar, Mutex},
};
use crate::error::{QueueError, Rejected, Result};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// State guarded by the queue lock. Every read or write happens with the lock
/// held.
pub(crate) struct QueueState<T> {
    pub(crate) ring: Ring<T>,
    pub(crate) shutdown: bool,
}

/// A fixed-capacity, blocking FIFO of connection handles.
///
/// One mutex guards the buffer, the count and the shutdown flag. Two
/// condition variables on that mutex park producers while the queue is full
/// (`not_full`) and consumers while it is empty (`not_empty`).
///
/// ## Occupancy
///
/// | State   | Condition         | `enqueue`       | `dequeue`          |
/// |---------|-------------------|-----------------|--------------------|
/// | Empty   | `len == 0`        | inserts         | blocks / `Drained` |
/// | Partial | `0 < len < C`     | inserts         | removes head       |
/// | Full    | `len == C`        | blocks / `Closed` | removes head     |
///
/// Once [`shutdown`](Self::shutdown) has run, `enqueue` always fails with
/// [`QueueError::Closed`] and `dequeue` keeps returning queued items until
/// none are left, then fails with [`QueueError::Drained`] without blocking.
///
/// The queue does not own the connections semantically: a handle belongs to
/// the producer until `enqueue` succeeds and to the consumer once `dequeue`
/// returns it.
pub struct BoundedConnectionQueue<T> {
    state: Mutex<QueueState<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl<T> BoundedConnectionQueue<T> {
    /// Creates an empty queue holding at most `capacity` handles.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::ZeroCapacity`] if `capacity` is zero, since such
    /// a queue could never accept a handle.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(QueueError::ZeroCapacity);
        }
        Ok(Self {
            state: Mutex::new(QueueState {
                ring: Ring::with_capacity(capacity),
                shutdown: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        })
    }

    /// Appends `item` at the tail, blocking while the queue is full.
    ///
    /// Wakes one parked consumer on success.
    ///
    /// # Errors
    ///
    /// The item is handed back inside [`Rejected`] when:
    /// - the queue is shut down, either before the call or while it was
    ///   blocked ([`QueueError::Closed`]);
    /// - the lock failed ([`QueueError::FatalSync`]).
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip_all))]
    pub fn enqueue(&self, item: T) -> Result<(), Rejected<T>> {
        let guard = match sync::lock(&self.state) {
            Ok(guard) => guard,
            Err(e) => return Err(Rejected::new(item, e)),
        };
        let mut state = match sync::wait_while(&self.not_full, guard, |s| {
            s.ring.is_full() && !s.shutdown
        }) {
            Ok(state) => state,
            Err(e) => return Err(Rejected::new(item, e)),
        };

        if state.shutdown {
            return Err(Rejected::new(item, QueueError::Closed));
        }
        if let Err(item) = state.ring.push_back(item) {
            return Err(Rejected::new(
                item,
                QueueError::FatalSync {
                    context: "enqueue on a full buffer",
                },
            ));
        }
        self.not_empty.notify_one();
        Ok(())
    }

    /// Removes the head, blocking while the queue is empty and not shut down.
    ///
    /// Wakes one parked producer on success.
    ///
    /// # Errors
    ///
    /// - [`QueueError::Drained`] once the queue is shut down and empty. This
    ///   never blocks.
    /// - [`QueueError::FatalSync`] if the lock failed.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip_all))]
    pub fn dequeue(&self) -> Result<T> {
        let guard = sync::lock(&self.state)?;
        let mut state = sync::wait_while(&self.not_empty, guard, |s| {
            s.ring.is_empty() && !s.shutdown
        })?;

        let Some(item) = state.ring.pop_front() else {
            debug_assert!(state.shutdown);
            return Err(QueueError::Drained);
        };
        self.not_full.notify_one();
        Ok(item)
    }

    /// Sets the one-way shutdown flag and wakes **every** parked producer and
    /// consumer.
    ///
    /// Items already queued are kept and remain available to `dequeue`. The
    /// flag is set under the same lock `enqueue` checks it with, so no item
    /// can be inserted once this returns.
    ///
    /// Intended to be called once per queue lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::FatalSync`] if the lock failed.
    pub fn shutdown(&self) -> Result<()> {
        let mut state = sync::lock(&self.state)?;
        state.shutdown = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
        drop(state);

        #[cfg(feature = "tracing")]
        tracing::debug!("Connection queue shut down");
        Ok(())
    }

    /// Tears the queue down, returning any handles still in it.
    ///
    /// Taking `self` by value guarantees no other thread still operates on the
    /// queue. After a clean drain the returned vector is empty.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::FatalSync`] if the lock was poisoned.
    pub fn destroy(self) -> Result<Vec<T>> {
        let mut state = sync::into_inner(self.state)?;
        Ok(state.ring.drain())
    }

    /// The fixed capacity set at construction.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// The number of handles currently queued.
    pub fn len(&self) -> usize {
        sync::lock_for_inspection(&self.state).ring.len()
    }

    /// Returns `true` if no handle is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) has run.
    pub fn is_shutdown(&self) -> bool {
        sync::lock_for_inspection(&self.state).shutdown
    }

    #[cfg(test)]
    pub(crate) const fn state(&self) -> &Mutex<QueueState<T>> {
        &self.state
    }
}

impl<T> core::fmt::Debug for BoundedConnectionQueue<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = sync::lock_for_inspection(&self.state);
        f.debug_struct("BoundedConnectionQueue")
            .field("capacity", &self.capacity)
            .field("len", &state.ring.len())
            .field("shutdown", &state.shutdown)
            .finish()
    }
}
