//! Fixed-size pool of worker threads draining a [`BoundedConnectionQueue`].
//!
//! Every worker runs the same loop against the shared queue; the queue is the
//! only point of coordination between them. A worker stops only when the
//! queue is shut down and empty, or when the queue lock fails.

mod worker;
#[cfg(test)]
mod tests;

pub use worker::WorkerStats;

use crate::{
    connection::Connection,
    error::{PoolError, QueueError},
    handler::RequestHandler,
    queue::BoundedConnectionQueue,
};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Totals gathered from every worker when the pool is joined.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolReport {
    /// Number of workers joined.
    pub workers: usize,
    /// Connections handled successfully.
    pub served: u64,
    /// Connections whose handler failed or panicked. Each was still closed.
    pub failed: u64,
}

/// A fixed set of worker threads created once, before accepting begins.
///
/// The pool itself holds only the join handles. Dropping it without calling
/// [`join`](Self::join) detaches the workers.
pub struct WorkerPool {
    workers: Vec<(usize, JoinHandle<Result<WorkerStats, QueueError>>)>,
}

impl WorkerPool {
    /// Starts `num_workers` threads named `worker-{i}`, each draining `queue`
    /// into `handler`.
    ///
    /// # Errors
    ///
    /// - [`PoolError::NoWorkers`] if `num_workers` is zero.
    /// - [`PoolError::Spawn`] if a thread could not be started. The queue is
    ///   then shut down and the workers already running are joined, so none
    ///   is left parked on the queue.
    pub fn spawn<C, H>(
        num_workers: usize,
        queue: Arc<BoundedConnectionQueue<C>>,
        handler: Arc<H>,
    ) -> Result<Self, PoolError>
    where
        C: Connection + 'static,
        H: RequestHandler<C> + 'static,
    {
        if num_workers == 0 {
            return Err(PoolError::NoWorkers);
        }

        let mut workers = Vec::with_capacity(num_workers);
        for worker_id in 0..num_workers {
            let worker_queue = Arc::clone(&queue);
            let worker_handler = Arc::clone(&handler);
            let spawned = thread::Builder::new()
                .name(format!("worker-{worker_id}"))
                .spawn(move || worker::worker_loop(worker_id, &worker_queue, &*worker_handler));

            match spawned {
                Ok(handle) => workers.push((worker_id, handle)),
                Err(source) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!("Failed to spawn worker {worker_id}: {source}");
                    let _ = Self { workers }.abandon(&queue);
                    return Err(PoolError::Spawn {
                        worker: worker_id,
                        source,
                    });
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("Spawned {num_workers} workers");
        Ok(Self { workers })
    }

    /// Number of workers in the pool.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Waits for every worker to terminate.
    ///
    /// Workers only terminate once the queue is shut down and drained, so call
    /// [`BoundedConnectionQueue::shutdown`] first.
    ///
    /// Every worker is joined even if an earlier one failed.
    ///
    /// # Errors
    ///
    /// Returns the first [`PoolError::WorkerFailed`] or
    /// [`PoolError::WorkerPanicked`] encountered, after all joins complete.
    pub fn join(self) -> Result<PoolReport, PoolError> {
        let mut report = PoolReport {
            workers: self.workers.len(),
            ..PoolReport::default()
        };
        let mut first_err = None;

        for (worker, handle) in self.workers {
            match handle.join() {
                Ok(Ok(stats)) => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!("Worker {worker} joined");
                    report.served += stats.served;
                    report.failed += stats.failed;
                }
                Ok(Err(source)) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!("Worker {worker} returned error: {source}");
                    first_err.get_or_insert(PoolError::WorkerFailed { worker, source });
                }
                Err(_) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!("Worker {worker} panicked");
                    first_err.get_or_insert(PoolError::WorkerPanicked { worker });
                }
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// Shuts `queue` down and joins the workers already running on it.
    ///
    /// Used when the pool cannot be completed. Both failures are logged; the
    /// join outcome is returned.
    pub(crate) fn abandon<C>(
        self,
        queue: &BoundedConnectionQueue<C>,
    ) -> Result<PoolReport, PoolError> {
        if let Err(_e) = queue.shutdown() {
            #[cfg(feature = "tracing")]
            tracing::error!("Failed to shut down queue of partial pool: {_e}");
        }
        let joined = self.join();
        if let Err(_e) = &joined {
            #[cfg(feature = "tracing")]
            tracing::error!("Partial pool did not stop cleanly: {_e}");
        }
        joined
    }
}

impl core::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers.len())
            .finish()
    }
}
