//! Listening socket adapted to [`connqueue::Acceptor`].
//!
//! A blocking `accept()` does not return when a signal arrives, so shutdown
//! is requested in two steps: raise the [`ShutdownSignal`], then open a
//! throwaway connection to the listener. The acceptor observes the flag on
//! its next wake-up and reports [`Accepted::Interrupted`]. The throwaway
//! connection is queued like any other and closed by a worker after sending
//! nothing.

use connqueue::{Accepted, Acceptor, ShutdownSignal};
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

const WAKE_TIMEOUT: Duration = Duration::from_secs(1);

pub struct TcpAcceptor {
    listener: TcpListener,
    signal: ShutdownSignal,
    request_timeout: Option<Duration>,
}

impl TcpAcceptor {
    /// Binds `addr` and ties the acceptor to `signal`.
    ///
    /// # Errors
    ///
    /// Returns the bind error unchanged.
    pub fn bind(addr: impl ToSocketAddrs, signal: ShutdownSignal) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        Ok(Self {
            listener,
            signal,
            request_timeout: None,
        })
    }

    /// Applies `timeout` as the read and write timeout of every accepted
    /// stream, so a stalled client cannot hold a worker indefinitely.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Returns a handle that interrupts this acceptor from another thread.
    pub fn waker(&self) -> io::Result<ShutdownWaker> {
        let addr = self.local_addr()?;
        Ok(ShutdownWaker {
            signal: self.signal.clone(),
            addr: wake_addr(addr),
        })
    }

    fn apply_timeouts(&self, stream: &TcpStream, peer: SocketAddr) {
        let Some(timeout) = self.request_timeout else {
            return;
        };
        let applied = stream
            .set_read_timeout(Some(timeout))
            .and_then(|()| stream.set_write_timeout(Some(timeout)));
        if let Err(e) = applied {
            tracing::warn!("Failed to set timeouts for {peer}: {e}");
        }
    }
}

impl Acceptor for TcpAcceptor {
    type Conn = TcpStream;

    fn accept(&mut self) -> io::Result<Accepted<TcpStream>> {
        loop {
            if self.signal.is_requested() {
                return Ok(Accepted::Interrupted);
            }
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    self.apply_timeouts(&stream, peer);
                    if self.signal.is_requested() {
                        // The wake-up connection, or a client that raced it.
                        // Either way it goes through the queue and is closed.
                        tracing::debug!("Accepted {peer} after shutdown was requested");
                    } else {
                        tracing::trace!("Accepted connection from {peer}");
                    }
                    return Ok(Accepted::Connection(stream));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }
}

/// Requests shutdown and unblocks a parked [`TcpAcceptor`].
#[derive(Clone, Debug)]
pub struct ShutdownWaker {
    signal: ShutdownSignal,
    addr: SocketAddr,
}

impl ShutdownWaker {
    /// Raises the signal and pokes the listener.
    ///
    /// Returns `false` if shutdown had already been requested, in which case
    /// the listener is not poked again.
    pub fn trigger(&self) -> bool {
        if !self.signal.request() {
            return false;
        }
        match TcpStream::connect_timeout(&self.addr, WAKE_TIMEOUT) {
            Ok(_stream) => tracing::debug!("Woke acceptor via {}", self.addr),
            Err(e) => tracing::warn!("Failed to wake acceptor at {}: {e}", self.addr),
        }
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.signal.is_requested()
    }
}

/// A listener bound to the unspecified address is reached via loopback.
fn wake_addr(bound: SocketAddr) -> SocketAddr {
    let ip = match bound.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    SocketAddr::new(ip, bound.port())
}
