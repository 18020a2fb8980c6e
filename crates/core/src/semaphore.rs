// SPDX-License-Identifier: MIT

//! Counting semaphore with batched FIFO admission
//!
//! Permits are acquired and released in batches of k >= 1 per call. A queued
//! request is granted only when its entire batch fits; a large request at
//! the head blocks smaller ones behind it, preserving strict FIFO fairness
//! at the cost of throughput.

use crate::clock::{Clock, SystemClock};
use crate::error::AcquireError;
use crate::waitlist::WaitList;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Debug)]
struct SemaphoreState {
    available: u32,
    waiters: WaitList,
}

/// Asynchronous counting semaphore.
///
/// Invariant: `available` plus the permits granted but not yet released
/// never exceeds `max_permits`; releases beyond the maximum clamp and log.
pub struct Semaphore<C: Clock = SystemClock> {
    state: Mutex<SemaphoreState>,
    max_permits: u32,
    clock: C,
}

impl Semaphore {
    /// Create a semaphore with `max_permits` initially available.
    pub fn new(max_permits: u32) -> Result<Self, AcquireError> {
        Self::with_clock(max_permits, SystemClock)
    }
}

impl<C: Clock> Semaphore<C> {
    pub fn with_clock(max_permits: u32, clock: C) -> Result<Self, AcquireError> {
        if max_permits == 0 {
            return Err(AcquireError::InvalidArgument(
                "max_permits must be a positive number".to_string(),
            ));
        }
        Ok(Self {
            state: Mutex::new(SemaphoreState {
                available: max_permits,
                waiters: WaitList::new(),
            }),
            max_permits,
            clock,
        })
    }

    /// Maximum permits, fixed at construction.
    pub fn max_permits(&self) -> u32 {
        self.max_permits
    }

    /// Acquire `permits` permits, suspending until the full batch is granted.
    ///
    /// Returns the time spent waiting (zero when granted immediately).
    pub async fn acquire(&self, permits: u32) -> Result<Duration, AcquireError> {
        self.validate(permits)?;
        let rx = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            // Immediate grant only when nobody is queued; otherwise a small
            // request would overtake a blocked head.
            if state.waiters.is_empty() && state.available >= permits {
                state.available -= permits;
                return Ok(Duration::ZERO);
            }
            let (_id, rx) = state.waiters.push(permits, self.clock.now());
            rx
        };
        Ok(rx.await.unwrap_or_default())
    }

    /// Acquire with a deadline; see [`Lock::try_acquire`] for the race rules.
    ///
    /// [`Lock::try_acquire`]: crate::lock::Lock::try_acquire
    pub async fn try_acquire(
        &self,
        deadline: Duration,
        permits: u32,
    ) -> Result<Duration, AcquireError> {
        self.validate(permits)?;
        let (id, mut rx) = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if state.waiters.is_empty() && state.available >= permits {
                state.available -= permits;
                return Ok(Duration::ZERO);
            }
            state.waiters.push(permits, self.clock.now())
        };
        match timeout(deadline, &mut rx).await {
            Ok(Ok(waited)) => Ok(waited),
            Ok(Err(_)) => Err(AcquireError::Timeout),
            Err(_) => {
                let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
                if state.waiters.remove(id) {
                    // Removing a blocked head can unblock smaller batches
                    // queued behind it.
                    Self::drain(&mut state, &self.clock);
                    return Err(AcquireError::Timeout);
                }
                drop(state);
                match rx.try_recv() {
                    Ok(waited) => Ok(waited),
                    Err(_) => Err(AcquireError::Timeout),
                }
            }
        }
    }

    /// Return `permits` permits to the pool and grant as many queued waiters
    /// as the new total allows, in arrival order.
    ///
    /// Crediting beyond `max_permits` means callers released more than they
    /// acquired: the count clamps to the maximum and a warning is logged.
    pub fn release(&self, permits: u32) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let credited = state.available.saturating_add(permits);
        if credited > self.max_permits {
            tracing::warn!(
                released = credited,
                max_permits = self.max_permits,
                "total released permits exceeds max_permits, clamping"
            );
            state.available = self.max_permits;
        } else {
            state.available = credited;
        }
        Self::drain(&mut state, &self.clock);
    }

    /// Permits currently available for immediate acquisition.
    pub fn available_permits(&self) -> u32 {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .available
    }

    /// Atomically zero the available count and return what was drained.
    /// Queued waiters are untouched.
    pub fn drain_permits(&self) -> u32 {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut state.available)
    }

    /// Number of requests queued for permits.
    pub fn queue_len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .waiters
            .len()
    }

    fn validate(&self, permits: u32) -> Result<(), AcquireError> {
        if permits == 0 {
            return Err(AcquireError::InvalidArgument(
                "permits must be at least 1".to_string(),
            ));
        }
        if permits > self.max_permits {
            return Err(AcquireError::PermitLimitExceeded {
                requested: permits,
                max: self.max_permits,
            });
        }
        Ok(())
    }

    /// Grant waiters from the head while their full batch fits. Stops at the
    /// first waiter that cannot be satisfied; no partial grants, no
    /// reordering past a blocked head.
    fn drain(state: &mut SemaphoreState, clock: &C) {
        while state
            .waiters
            .front()
            .is_some_and(|w| w.permits() <= state.available)
        {
            let Some(waiter) = state.waiters.pop_front() else {
                break;
            };
            let permits = waiter.permits();
            state.available -= permits;
            if !waiter.grant(clock.now()) {
                // The waiting future was dropped; its batch goes back.
                state.available += permits;
            }
        }
    }
}

#[cfg(test)]
#[path = "semaphore_tests.rs"]
mod tests;
