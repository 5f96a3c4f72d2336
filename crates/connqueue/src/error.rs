//! Error types for the connection queue, the worker pool and the accept
//! coordinator.
//!
//! ## Error Cases
//! - [`QueueError::Closed`]: an enqueue raced with or followed shutdown.
//! - [`QueueError::Drained`]: the queue is shut down and empty; consumers
//!   should stop.
//! - [`QueueError::FatalSync`]: a synchronization primitive failed (a poisoned
//!   lock). The calling thread must stop using the queue.
//! - [`PoolError`] and [`ServerError`] aggregate the above for the worker and
//!   accept threads.

use core::fmt;
use std::io;
use thiserror::Error;

/// A result type defaulting to [`QueueError`].
pub type Result<T, E = QueueError> = core::result::Result<T, E>;

/// Failures reported by [`BoundedConnectionQueue`] operations.
///
/// [`BoundedConnectionQueue`]: crate::BoundedConnectionQueue
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum QueueError {
    /// The queue was constructed with a capacity of zero.
    #[error("queue capacity must be greater than 0")]
    ZeroCapacity,

    /// The queue has been shut down; the item was not inserted.
    #[error("queue is shut down")]
    Closed,

    /// The queue is shut down and empty; no item will ever arrive again.
    #[error("queue is shut down and drained")]
    Drained,

    /// An underlying lock or condition variable failed.
    ///
    /// With the standard library backend this means another thread panicked
    /// while holding the queue lock.
    #[error("synchronization failure during {context}")]
    FatalSync {
        /// The operation that failed (`lock`, `wait`, ...).
        context: &'static str,
    },
}

impl QueueError {
    /// Returns `true` for errors after which the calling thread must abandon
    /// the queue.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::FatalSync { .. })
    }
}

/// An enqueue that did not insert its item.
///
/// Ownership of the item is handed back so the caller can release the
/// connection immediately instead of leaking it.
pub struct Rejected<T> {
    item: T,
    reason: QueueError,
}

impl<T> Rejected<T> {
    pub(crate) const fn new(item: T, reason: QueueError) -> Self {
        Self { item, reason }
    }

    /// Why the item was rejected.
    pub const fn reason(&self) -> QueueError {
        self.reason
    }

    /// Returns the rejected item, discarding the reason.
    pub fn into_inner(self) -> T {
        self.item
    }

    /// Splits the rejection into the item and the reason.
    pub fn into_parts(self) -> (T, QueueError) {
        (self.item, self.reason)
    }
}

impl<T> fmt::Debug for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected")
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Display for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "enqueue rejected: {}", self.reason)
    }
}

impl<T> core::error::Error for Rejected<T> {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        Some(&self.reason)
    }
}

/// Failures reported by [`WorkerPool`].
///
/// [`WorkerPool`]: crate::WorkerPool
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PoolError {
    /// A pool needs at least one worker to ever drain its queue.
    #[error("worker pool requires at least one worker")]
    NoWorkers,

    /// The operating system refused to start a worker thread.
    #[error("failed to spawn worker {worker}: {source}")]
    Spawn { worker: usize, source: io::Error },

    /// A worker stopped because the queue reported a fatal error.
    #[error("worker {worker} stopped: {source}")]
    WorkerFailed { worker: usize, source: QueueError },

    /// A worker thread panicked outside of request handling.
    #[error("worker {worker} panicked")]
    WorkerPanicked { worker: usize },
}

/// The overall outcome of an [`AcceptCoordinator`] run.
///
/// [`AcceptCoordinator`]: crate::AcceptCoordinator
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ServerError {
    /// `accept()` failed with something other than an interrupt.
    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),

    /// The queue failed while enqueuing or shutting down.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// One or more workers did not terminate cleanly.
    #[error(transparent)]
    Pool(#[from] PoolError),
}
