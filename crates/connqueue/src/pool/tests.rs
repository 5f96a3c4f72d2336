use crate::{BoundedConnectionQueue, Connection, ConnectionGuard, PoolError, WorkerPool};
use std::collections::HashSet;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A fake connection that records how often it was closed.
struct MockConn {
    id: usize,
    closes: Arc<AtomicUsize>,
}

impl Connection for MockConn {
    fn close(&mut self) -> io::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug)]
struct HandlerFailed(usize);

impl std::fmt::Display for HandlerFailed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "request {} failed", self.0)
    }
}

impl std::error::Error for HandlerFailed {}

fn connections(n: usize) -> (Vec<MockConn>, Vec<Arc<AtomicUsize>>) {
    (0..n)
        .map(|id| {
            let closes = Arc::new(AtomicUsize::new(0));
            (
                MockConn {
                    id,
                    closes: Arc::clone(&closes),
                },
                closes,
            )
        })
        .unzip()
}

fn assert_closed_once(counters: &[Arc<AtomicUsize>]) {
    for (id, closes) in counters.iter().enumerate() {
        assert_eq!(closes.load(Ordering::SeqCst), 1, "connection {id}");
    }
}

#[test]
fn zero_workers_is_rejected() {
    let queue = Arc::new(BoundedConnectionQueue::<MockConn>::new(1).unwrap());
    let handler = Arc::new(|_: &mut ConnectionGuard<MockConn>| Ok::<_, HandlerFailed>(()));
    let err = WorkerPool::spawn(0, queue, handler).unwrap_err();
    assert!(matches!(err, PoolError::NoWorkers));
}

#[test]
fn queued_connections_are_served_before_workers_exit() {
    const CONNS: usize = 64;
    let queue = Arc::new(BoundedConnectionQueue::new(4).unwrap());
    let seen = Arc::new(Mutex::new(HashSet::new()));
    let handler = {
        let seen = Arc::clone(&seen);
        Arc::new(move |conn: &mut ConnectionGuard<MockConn>| {
            assert!(seen.lock().unwrap().insert(conn.get_ref().id));
            Ok::<_, HandlerFailed>(())
        })
    };

    let pool = WorkerPool::spawn(4, Arc::clone(&queue), handler).unwrap();
    assert_eq!(pool.len(), 4);

    let (conns, counters) = connections(CONNS);
    for conn in conns {
        queue.enqueue(conn).unwrap();
    }
    queue.shutdown().unwrap();

    let report = pool.join().unwrap();
    assert_eq!(report.workers, 4);
    assert_eq!(report.served, CONNS as u64);
    assert_eq!(report.failed, 0);
    assert_eq!(seen.lock().unwrap().len(), CONNS);
    assert_closed_once(&counters);
}

#[test]
fn handler_that_closes_itself_is_not_closed_twice() {
    let queue = Arc::new(BoundedConnectionQueue::new(8).unwrap());
    let handler = Arc::new(|conn: &mut ConnectionGuard<MockConn>| {
        conn.close().unwrap();
        assert!(conn.is_closed());
        Ok::<_, HandlerFailed>(())
    });
    let pool = WorkerPool::spawn(2, Arc::clone(&queue), handler).unwrap();

    let (conns, counters) = connections(8);
    for conn in conns {
        queue.enqueue(conn).unwrap();
    }
    queue.shutdown().unwrap();

    assert_eq!(pool.join().unwrap().served, 8);
    assert_closed_once(&counters);
}

#[test]
fn handler_errors_are_counted_and_connections_still_closed() {
    let queue = Arc::new(BoundedConnectionQueue::new(8).unwrap());
    let handler = Arc::new(|conn: &mut ConnectionGuard<MockConn>| {
        let id = conn.get_ref().id;
        if id % 2 == 0 {
            // Closing before failing mirrors a handler that gives up early.
            conn.close().unwrap();
            Err(HandlerFailed(id))
        } else {
            Ok(())
        }
    });
    let pool = WorkerPool::spawn(3, Arc::clone(&queue), handler).unwrap();

    let (conns, counters) = connections(8);
    for conn in conns {
        queue.enqueue(conn).unwrap();
    }
    queue.shutdown().unwrap();

    let report = pool.join().unwrap();
    assert_eq!(report.served, 4);
    assert_eq!(report.failed, 4);
    assert_closed_once(&counters);
}

#[test]
fn panicking_handler_does_not_kill_worker() {
    let queue = Arc::new(BoundedConnectionQueue::new(4).unwrap());
    let handler = Arc::new(|conn: &mut ConnectionGuard<MockConn>| {
        if conn.get_ref().id == 0 {
            panic!("handler blew up");
        }
        Ok::<_, HandlerFailed>(())
    });
    // A single worker must survive the panic to serve the rest.
    let pool = WorkerPool::spawn(1, Arc::clone(&queue), handler).unwrap();

    let (conns, counters) = connections(4);
    for conn in conns {
        queue.enqueue(conn).unwrap();
    }
    queue.shutdown().unwrap();

    let report = pool.join().unwrap();
    assert_eq!(report.served, 3);
    assert_eq!(report.failed, 1);
    assert_closed_once(&counters);
}

#[test]
fn idle_workers_exit_once_queue_is_shut_down() {
    let queue = Arc::new(BoundedConnectionQueue::<MockConn>::new(2).unwrap());
    let handler = Arc::new(|_: &mut ConnectionGuard<MockConn>| Ok::<_, HandlerFailed>(()));
    let pool = WorkerPool::spawn(5, Arc::clone(&queue), handler).unwrap();

    std::thread::sleep(std::time::Duration::from_millis(50));
    queue.shutdown().unwrap();

    let report = pool.join().unwrap();
    assert_eq!(report.workers, 5);
    assert_eq!(report.served, 0);
    assert!(queue.is_empty());
}

#[cfg(not(feature = "parking-lot"))]
#[test]
fn poisoned_queue_surfaces_as_worker_failure() {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    let queue = Arc::new(BoundedConnectionQueue::<MockConn>::new(2).unwrap());
    let _ = catch_unwind(AssertUnwindSafe(|| {
        let _guard = queue.state().lock().unwrap();
        panic!("poison the queue lock");
    }));

    let handler = Arc::new(|_: &mut ConnectionGuard<MockConn>| Ok::<_, HandlerFailed>(()));
    let pool = WorkerPool::spawn(2, Arc::clone(&queue), handler).unwrap();

    match pool.join() {
        Err(PoolError::WorkerFailed { worker, source }) => {
            assert_eq!(worker, 0);
            assert!(source.is_fatal());
        }
        other => panic!("expected worker failure, got {other:?}"),
    }
}

#[test]
fn abandoning_a_partial_pool_stops_parked_workers() {
    let queue = Arc::new(BoundedConnectionQueue::<MockConn>::new(2).unwrap());
    let handler = Arc::new(|_: &mut ConnectionGuard<MockConn>| Ok::<_, HandlerFailed>(()));
    let pool = WorkerPool::spawn(3, Arc::clone(&queue), handler).unwrap();

    let report = pool.abandon(&queue).unwrap();
    assert_eq!(report.workers, 3);
    assert_eq!(report.served, 0);
    assert!(queue.is_shutdown());
}

#[cfg(not(feature = "parking-lot"))]
#[test]
fn abandoning_a_pool_on_a_poisoned_queue_reports_worker_failure() {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    let queue = Arc::new(BoundedConnectionQueue::<MockConn>::new(2).unwrap());
    let _ = catch_unwind(AssertUnwindSafe(|| {
        let _guard = queue.state().lock().unwrap();
        panic!("poison the queue lock");
    }));

    let handler = Arc::new(|_: &mut ConnectionGuard<MockConn>| Ok::<_, HandlerFailed>(()));
    let pool = WorkerPool::spawn(1, Arc::clone(&queue), handler).unwrap();

    // The shutdown failure is only logged; the worker failure is returned.
    let err = pool.abandon(&queue).unwrap_err();
    assert!(matches!(err, PoolError::WorkerFailed { worker: 0, .. }));
}
