//! The accept side of the server and its shutdown sequence.
//!
//! [`AcceptCoordinator`] runs on the thread that calls `accept()`. It enqueues
//! every accepted connection until the [`Acceptor`] reports an interrupt, then:
//!
//! 1. stops accepting,
//! 2. shuts the queue down exactly once,
//! 3. joins every worker,
//! 4. tears the queue down.
//!
//! Every step runs even if an earlier one failed; the first failure becomes
//! the overall outcome, in the order above.


use crate::{
    connection::{Connection, ConnectionGuard},
    error::{QueueError, ServerError},
    pool::WorkerPool,
    queue::BoundedConnectionQueue,
};
use std::io;
use std::sync::Arc;

/// What a single `accept()` produced.
#[derive(Debug)]
pub enum Accepted<C> {
    /// A new connection, now owned by the caller.
    Connection(C),
    /// Acceptance was interrupted by a shutdown request.
    Interrupted,
}

/// Source of connections, typically a listening socket.
pub trait Acceptor {
    type Conn: Connection;

    /// Blocks until a connection arrives or shutdown is requested.
    ///
    /// # Errors
    ///
    /// Any error other than an interrupt is fatal for the accept loop.
    fn accept(&mut self) -> io::Result<Accepted<Self::Conn>>;
}

/// Counters describing a completed run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Connections successfully enqueued.
    pub accepted: u64,
    /// Connections the workers handled successfully.
    pub served: u64,
    /// Connections whose handler failed. Each was still closed.
    pub failed: u64,
}

/// Drives the accept loop and sequences shutdown.
pub struct AcceptCoordinator<A: Acceptor> {
    acceptor: A,
    queue: Arc<BoundedConnectionQueue<A::Conn>>,
    pool: WorkerPool,
}

impl<A: Acceptor> AcceptCoordinator<A> {
    /// Takes ownership of the acceptor, the queue handle and a pool already
    /// draining that queue.
    pub const fn new(
        acceptor: A,
        queue: Arc<BoundedConnectionQueue<A::Conn>>,
        pool: WorkerPool,
    ) -> Self {
        Self {
            acceptor,
            queue,
            pool,
        }
    }

    /// Accepts and enqueues until interrupted, then shuts down.
    ///
    /// Connections already queued when shutdown begins are still served.
    ///
    /// # Errors
    ///
    /// - [`ServerError::Accept`] if `accept()` failed.
    /// - [`ServerError::Queue`] if enqueue, shutdown or teardown hit a fatal
    ///   lock failure.
    /// - [`ServerError::Pool`] if a worker failed or panicked.
    pub fn run(self) -> Result<ShutdownReport, ServerError> {
        let Self {
            mut acceptor,
            queue,
            pool,
        } = self;

        let mut accepted = 0;
        let accept_result = accept_loop(&mut acceptor, &queue, &mut accepted);

        #[cfg(feature = "tracing")]
        tracing::info!("Stopped accepting after {accepted} connections, shutting down queue");
        let shutdown_result = queue.shutdown();

        #[cfg(feature = "tracing")]
        tracing::debug!("Waiting for {} workers to drain the queue", pool.len());
        let pool_result = pool.join();

        let teardown_result = teardown(queue);

        accept_result?;
        shutdown_result?;
        let report = pool_result?;
        teardown_result?;

        #[cfg(feature = "tracing")]
        tracing::info!(
            "Shutdown complete: {} served, {} failed",
            report.served,
            report.failed
        );
        Ok(ShutdownReport {
            accepted,
            served: report.served,
            failed: report.failed,
        })
    }
}

fn accept_loop<A: Acceptor>(
    acceptor: &mut A,
    queue: &BoundedConnectionQueue<A::Conn>,
    accepted: &mut u64,
) -> Result<(), ServerError> {
    loop {
        match acceptor.accept() {
            Ok(Accepted::Connection(conn)) => {
                if let Err(rejected) = queue.enqueue(conn) {
                    let (conn, reason) = rejected.into_parts();
                    release(conn);
                    return match reason {
                        QueueError::Closed => Ok(()),
                        other => Err(other.into()),
                    };
                }
                *accepted += 1;
            }
            Ok(Accepted::Interrupted) => {
                #[cfg(feature = "tracing")]
                tracing::info!("Accept interrupted by shutdown request");
                return Ok(());
            }
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::error!("Accept failed: {e}");
                return Err(ServerError::Accept(e));
            }
        }
    }
}

/// Closes a connection that will never be serviced.
fn release<C: Connection>(conn: C) {
    #[cfg(feature = "tracing")]
    tracing::warn!("Closing connection that will never be serviced");
    if let Err(_e) = ConnectionGuard::new(conn).close() {
        #[cfg(feature = "tracing")]
        tracing::debug!("Failed to close rejected connection: {_e}");
    }
}

fn teardown<C: Connection>(queue: Arc<BoundedConnectionQueue<C>>) -> Result<(), QueueError> {
    let Ok(queue) = Arc::try_unwrap(queue) else {
        #[cfg(feature = "tracing")]
        tracing::debug!("Queue still shared, leaving teardown to the last owner");
        return Ok(());
    };
    match queue.destroy() {
        Ok(leftover) => {
            #[cfg(feature = "tracing")]
            {
                if !leftover.is_empty() {
                    tracing::warn!("{} connections left in queue after drain", leftover.len());
                }
            }
            leftover.into_iter().for_each(release);
            Ok(())
        }
        Err(e) => {
            #[cfg(feature = "tracing")]
            tracing::error!("Queue teardown failed: {e}");
            Err(e)
        }
    }
}
