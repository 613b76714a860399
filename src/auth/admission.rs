//! Bound on concurrently executing gate operations.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

/// Bounds in-flight operations so a request flood degrades into fast
/// refusals instead of unbounded queueing.
pub struct AdmissionLimiter {
    permits: Arc<Semaphore>,
}

/// Held for the duration of one admitted operation; dropping it frees the
/// slot.
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionLimiter {
    /// Create a limiter admitting at most `max_inflight` concurrent
    /// operations.
    pub fn new(max_inflight: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_inflight)),
        }
    }

    /// Try to claim a slot without waiting; `None` when at capacity.
    pub fn try_acquire(&self) -> Option<AdmissionPermit> {
        match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => Some(AdmissionPermit { _permit: permit }),
            Err(TryAcquireError::NoPermits | TryAcquireError::Closed) => None,
        }
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}
