//! # Concurrency Gate
//!
//! Bounds simultaneous handler executions. The gate is ready while at least
//! one slot is free; the dispatcher waits for readiness before pulling more
//! messages so it never holds messages it cannot start.
//!
//! A slot is held by a [`GatePermit`] and released when the permit drops,
//! whichever way the execution ends.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};

/// The gate was closed and hands out no more permits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Concurrency gate is closed")]
pub struct GateClosed;

/// Counting gate over a fixed number of execution slots
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    released: Arc<Notify>,
    capacity: usize,
}

impl ConcurrencyGate {
    /// Create a gate with `capacity` slots
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            released: Arc::new(Notify::new()),
            capacity,
        }
    }

    /// Wait for a free slot and reserve it
    pub async fn acquire(&self) -> Result<GatePermit, GateClosed> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| GateClosed)?;

        Ok(GatePermit {
            permit: Some(permit),
            released: self.released.clone(),
        })
    }

    /// Reserve a slot only if one is free right now
    pub fn try_acquire(&self) -> Option<GatePermit> {
        let permit = self.semaphore.clone().try_acquire_owned().ok()?;
        Some(GatePermit {
            permit: Some(permit),
            released: self.released.clone(),
        })
    }

    /// Wait until at least one slot is free
    ///
    /// Returns immediately when the gate is already ready or closed.
    pub async fn wait_ready(&self) {
        loop {
            let notified = self.released.notified();
            tokio::pin!(notified);
            // Register before checking so a release in between is not missed
            notified.as_mut().enable();

            if self.is_ready() || self.is_closed() {
                return;
            }

            notified.await;
        }
    }

    /// Check whether a slot is free
    pub fn is_ready(&self) -> bool {
        self.semaphore.available_permits() > 0
    }

    /// Number of free slots
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Number of slots currently held
    pub fn in_flight(&self) -> usize {
        self.capacity.saturating_sub(self.available())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    /// Stop handing out permits and wake every readiness waiter
    ///
    /// Permits already held stay valid until dropped.
    pub fn close(&self) {
        self.semaphore.close();
        self.released.notify_waiters();
    }
}

/// A reserved execution slot
#[derive(Debug)]
pub struct GatePermit {
    permit: Option<OwnedSemaphorePermit>,
    released: Arc<Notify>,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        // Return the slot before waking waiters so they observe it
        drop(self.permit.take());
        self.released.notify_waiters();
    }
}

#[cfg(test)]
#[path = "gate_tests.rs"]
mod tests;
