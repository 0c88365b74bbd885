//! Request admission and pacing.
//!
//! Two independent policies guard every network call:
//! - [`AdmissionGate`] caps the number of outstanding requests
//! - [`PacingGate`] spaces successive dispatch starts by a minimum interval
//!
//! [`RequestGate`] composes them in that order. Both use tokio primitives,
//! so they can be driven with a paused clock in tests.

use crate::error::VaultError;
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};
use tokio::time::{Duration, Instant};

/// Bounds simultaneously outstanding requests.
#[derive(Debug)]
pub struct AdmissionGate {
    semaphore: Semaphore,
    capacity: usize,
}

impl AdmissionGate {
    /// Creates a gate admitting at most `capacity` requests (at least 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Semaphore::new(capacity),
            capacity,
        }
    }

    /// Waits for a free slot. The slot is released when the permit drops.
    ///
    /// # Errors
    /// Returns error if the gate has been closed
    pub async fn acquire(&self) -> crate::Result<SemaphorePermit<'_>> {
        self.semaphore
            .acquire()
            .await
            .map_err(|e| VaultError::request_failed("request gate", "admission gate closed", e))
    }

    /// Configured capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Requests currently holding a slot
    pub fn in_flight(&self) -> usize {
        self.capacity
            .saturating_sub(self.semaphore.available_permits())
    }
}

/// Enforces a minimum interval between dispatch starts.
///
/// Each caller reserves the next free slot under a short lock and then
/// sleeps until that slot outside the lock, so waiting callers queue in
/// arrival order without holding the mutex across the sleep.
#[derive(Debug)]
pub struct PacingGate {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl PacingGate {
    /// Creates a gate with the given minimum interval
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Configured interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits until this caller may dispatch; returns the dispatch instant.
    pub async fn wait(&self) -> Instant {
        if self.interval.is_zero() {
            return Instant::now();
        }

        let slot = {
            let mut next_slot = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next_slot {
                Some(reserved) if reserved > now => reserved,
                _ => now,
            };
            *next_slot = Some(slot + self.interval);
            slot
        };

        tokio::time::sleep_until(slot).await;
        slot
    }
}

/// Admission followed by pacing, shared by all calls of one client.
#[derive(Debug)]
pub struct RequestGate {
    admission: AdmissionGate,
    pacing: PacingGate,
}

impl RequestGate {
    /// Creates a gate admitting `concurrency` requests spaced by `delay`
    pub fn new(concurrency: usize, delay: Duration) -> Self {
        Self {
            admission: AdmissionGate::new(concurrency),
            pacing: PacingGate::new(delay),
        }
    }

    /// Passes both gates. The returned permit must be held for the whole
    /// request.
    ///
    /// # Errors
    /// Returns error if the admission gate has been closed
    pub async fn enter(&self) -> crate::Result<SemaphorePermit<'_>> {
        let permit = self.admission.acquire().await?;
        self.pacing.wait().await;
        Ok(permit)
    }

    /// Requests currently in flight
    pub fn in_flight(&self) -> usize {
        self.admission.in_flight()
    }

    /// Admission policy
    pub fn admission(&self) -> &AdmissionGate {
        &self.admission
    }

    /// Pacing policy
    pub fn pacing(&self) -> &PacingGate {
        &self.pacing
    }
}
