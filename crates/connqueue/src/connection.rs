use std::io;
use std::net::{Shutdown, TcpStream};

/// An accepted network connection as seen by the queue and its workers.
///
/// The queue never inspects a connection; it only needs a way to release it.
pub trait Connection: Send {
    /// Releases the underlying resource.
    ///
    /// Callers go through [`ConnectionGuard`], which ensures this runs at most
    /// once per connection.
    fn close(&mut self) -> io::Result<()>;
}

impl Connection for TcpStream {
    fn close(&mut self) -> io::Result<()> {
        match self.shutdown(Shutdown::Both) {
            // The peer already tore the connection down.
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            res => res,
        }
    }
}

#[cfg(unix)]
impl Connection for std::os::unix::net::UnixStream {
    fn close(&mut self) -> io::Result<()> {
        match self.shutdown(Shutdown::Both) {
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            res => res,
        }
    }
}

/// Owns a dequeued connection for the duration of one request and closes it
/// exactly once.
///
/// Both the request handler and the worker may call [`close`](Self::close);
/// only the first call reaches the connection. A guard dropped while still
/// open (for example while unwinding out of a handler) closes it best-effort.
///
/// ```
/// use connqueue::{Connection, ConnectionGuard};
///
/// struct Counted(u32);
///
/// impl Connection for Counted {
///     fn close(&mut self) -> std::io::Result<()> {
///         self.0 += 1;
///         Ok(())
///     }
/// }
///
/// let mut guard = ConnectionGuard::new(Counted(0));
/// guard.close().unwrap();
/// guard.close().unwrap();
/// assert_eq!(guard.get_ref().0, 1);
/// ```
#[derive(Debug)]
pub struct ConnectionGuard<C: Connection> {
    conn: C,
    closed: bool,
}

impl<C: Connection> ConnectionGuard<C> {
    /// Wraps an open connection.
    pub const fn new(conn: C) -> Self {
        Self {
            conn,
            closed: false,
        }
    }

    /// Closes the connection if it has not been closed yet.
    ///
    /// The connection counts as closed even if the underlying close fails, so
    /// a failing close is never retried.
    ///
    /// # Errors
    ///
    /// Returns the error from the first, and only, underlying close.
    pub fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.conn.close()
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    pub const fn get_ref(&self) -> &C {
        &self.conn
    }

    pub const fn get_mut(&mut self) -> &mut C {
        &mut self.conn
    }
}

impl<C: Connection> Drop for ConnectionGuard<C> {
    fn drop(&mut self) {
        if let Err(_e) = self.close() {
            #[cfg(feature = "tracing")]
            tracing::debug!("Failed to close dropped connection: {_e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Connection, ConnectionGuard};
    use std::io;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Tracked {
        closes: Arc<AtomicUsize>,
        fail: bool,
    }

    impl Connection for Tracked {
        fn close(&mut self) -> io::Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(io::Error::other("close failed"))
            } else {
                Ok(())
            }
        }
    }

    fn tracked(fail: bool) -> (Tracked, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        (
            Tracked {
                closes: Arc::clone(&closes),
                fail,
            },
            closes,
        )
    }

    #[test]
    fn close_reaches_connection_once() {
        let (conn, closes) = tracked(false);
        let mut guard = ConnectionGuard::new(conn);
        assert!(!guard.is_closed());

        guard.close().unwrap();
        guard.close().unwrap();
        assert!(guard.is_closed());
        drop(guard);

        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_close_is_not_retried() {
        let (conn, closes) = tracked(true);
        let mut guard = ConnectionGuard::new(conn);

        assert!(guard.close().is_err());
        assert!(guard.close().is_ok());
        drop(guard);

        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_closes_open_connection() {
        let (conn, closes) = tracked(false);
        drop(ConnectionGuard::new(conn));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn tcp_close_tolerates_disconnected_peer() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let client = std::net::TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        drop(client);

        let mut guard = ConnectionGuard::new(server);
        assert!(guard.close().is_ok());
        assert!(guard.close().is_ok());
    }
}
