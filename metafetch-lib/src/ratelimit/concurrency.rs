use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounds the number of operations executing at the same time.
///
/// A thin wrapper around a [`Semaphore`]. Waiters are served in FIFO order,
/// so no caller starves. Slots are returned by dropping the permit.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

impl ConcurrencyGate {
    /// Create a gate with `limit` slots
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    /// Wait for a free slot.
    ///
    /// Returns `None` once the gate has been closed.
    pub async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.semaphore).acquire_owned().await.ok()
    }

    /// Take a free slot without waiting
    #[must_use]
    pub fn try_acquire(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.semaphore).try_acquire_owned().ok()
    }

    /// Stop handing out slots; pending and future calls to
    /// [`ConcurrencyGate::acquire`] return `None`
    pub fn close(&self) {
        self.semaphore.close();
    }

    /// Maximum number of slots
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Number of slots currently held
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.limit - self.semaphore.available_permits()
    }
}
