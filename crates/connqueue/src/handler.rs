use crate::connection::{Connection, ConnectionGuard};

/// Performs the protocol exchange on one dequeued connection.
///
/// A handler may close the connection itself through the guard; the worker
/// closes it afterwards regardless, and the guard turns the second close into
/// a no-op. Errors are reported by the worker and never stop it.
///
/// Any `Fn(&mut ConnectionGuard<C>) -> Result<(), E>` closure is a handler.
pub trait RequestHandler<C: Connection>: Send + Sync {
    type Error: core::error::Error + Send + 'static;

    fn handle(&self, conn: &mut ConnectionGuard<C>) -> Result<(), Self::Error>;
}

impl<C, F, E> RequestHandler<C> for F
where
    C: Connection,
    F: Fn(&mut ConnectionGuard<C>) -> Result<(), E> + Send + Sync,
    E: core::error::Error + Send + 'static,
{
    type Error = E;

    fn handle(&self, conn: &mut ConnectionGuard<C>) -> Result<(), E> {
        self(conn)
    }
}
