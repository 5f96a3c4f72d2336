//! # connqueue
//!
//! A bounded, blocking connection queue that sits between a single accepting
//! thread and a fixed pool of worker threads.
//!
//! - [`BoundedConnectionQueue`] is a fixed-capacity FIFO guarded by one mutex
//!   and two condition variables (`not_full`, `not_empty`). Producers block
//!   when it is full, consumers block when it is empty.
//! - [`WorkerPool`] owns `N` threads that dequeue connections, hand them to a
//!   [`RequestHandler`], and close each connection exactly once.
//! - [`AcceptCoordinator`] runs the accept loop and, once the [`Acceptor`]
//!   reports an interrupt, shuts the queue down and joins every worker.
//!
//! Shutdown is one-way. Items already queued when [`shutdown`] runs are still
//! handed out; afterwards `enqueue` fails with [`QueueError::Closed`] and an
//! empty queue fails `dequeue` with [`QueueError::Drained`].
//!
//! ## Example
//!
//! ```
//! use connqueue::{BoundedConnectionQueue, QueueError};
//!
//! let queue = BoundedConnectionQueue::new(2).unwrap();
//! queue.enqueue(10).unwrap();
//! queue.enqueue(20).unwrap();
//! queue.shutdown().unwrap();
//!
//! assert_eq!(queue.dequeue(), Ok(10));
//! assert_eq!(queue.dequeue(), Ok(20));
//! assert_eq!(queue.dequeue(), Err(QueueError::Drained));
//! ```
//!
//! ## Features
//!
//! - `parking-lot`: use `parking_lot::{Mutex, Condvar}` instead of the
//!   standard library primitives. These never poison, so
//!   [`QueueError::FatalSync`] cannot be raised by the lock itself.
//! - `tracing`: emit structured logs through the `tracing` crate.
//!
//! [`shutdown`]: BoundedConnectionQueue::shutdown

mod connection;
mod coordinator;
mod error;
mod handler;
mod pool;
mod queue;
mod signal;

pub use crate::connection::*;
pub use crate::coordinator::*;
pub use crate::error::*;
pub use crate::handler::*;
pub use crate::pool::*;
pub use crate::queue::*;
pub use crate::signal::*;
