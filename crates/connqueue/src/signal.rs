use portable_atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A one-way, cloneable shutdown indication.
///
/// Handed explicitly to whatever observes it (typically the [`Acceptor`]) and
/// to whatever raises it (typically a signal handler). Once requested it stays
/// requested.
///
/// [`Acceptor`]: crate::Acceptor
#[derive(Clone, Debug, Default)]
pub struct ShutdownSignal {
    requested: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the signal. Returns `true` only for the call that raised it.
    pub fn request(&self) -> bool {
        !self.requested.swap(true, Ordering::AcqRel)
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}
