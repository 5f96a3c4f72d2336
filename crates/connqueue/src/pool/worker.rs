use crate::{
    connection::{Connection, ConnectionGuard},
    error::QueueError,
    handler::RequestHandler,
    queue::BoundedConnectionQueue,
};
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Per-worker request counters, summed into a [`PoolReport`] on join.
///
/// [`PoolReport`]: crate::PoolReport
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    /// Connections whose handler returned `Ok`.
    pub served: u64,
    /// Connections whose handler returned an error or panicked.
    pub failed: u64,
}

/// Body of a worker thread.
///
/// Dequeues until the queue reports [`QueueError::Drained`], which is the only
/// clean exit. Each connection is handed to `handler` and then closed exactly
/// once, whatever the handler did.
///
/// # Errors
///
/// Returns [`QueueError::FatalSync`] if the queue lock fails. The worker does
/// not retry: a failed lock cannot be trusted.
pub(crate) fn worker_loop<C, H>(
    _worker_id: usize,
    queue: &BoundedConnectionQueue<C>,
    handler: &H,
) -> Result<WorkerStats, QueueError>
where
    C: Connection,
    H: RequestHandler<C>,
{
    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {_worker_id} started");

    let mut stats = WorkerStats::default();

    loop {
        match queue.dequeue() {
            Ok(conn) => serve(_worker_id, conn, handler, &mut stats),
            Err(QueueError::Drained) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Worker {_worker_id} observed drained queue");
                break;
            }
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::error!("Worker {_worker_id} abandoning queue: {e}");
                return Err(e);
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!(
        "Worker {_worker_id} stopped ({} served, {} failed)",
        stats.served,
        stats.failed
    );
    Ok(stats)
}

fn serve<C, H>(_worker_id: usize, conn: C, handler: &H, stats: &mut WorkerStats)
where
    C: Connection,
    H: RequestHandler<C>,
{
    let mut conn = ConnectionGuard::new(conn);

    match catch_unwind(AssertUnwindSafe(|| handler.handle(&mut conn))) {
        Ok(Ok(())) => stats.served += 1,
        Ok(Err(_e)) => {
            #[cfg(feature = "tracing")]
            tracing::warn!("Worker {_worker_id} request failed: {_e}");
            stats.failed += 1;
        }
        Err(_) => {
            #[cfg(feature = "tracing")]
            tracing::error!("Worker {_worker_id} request handler panicked");
            stats.failed += 1;
        }
    }

    if let Err(_e) = conn.close() {
        #[cfg(feature = "tracing")]
        tracing::warn!("Worker {_worker_id} failed to close connection: {_e}");
    }
}
