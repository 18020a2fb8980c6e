// SPDX-License-Identifier: MIT

//! Exclusive lock with a FIFO handoff queue
//!
//! One binary permit, at most one holder at a time. `release` hands the
//! permit directly to the next waiter rather than passing through a free
//! state in between, so waiters are served in strict arrival order.

use crate::clock::{Clock, SystemClock};
use crate::error::AcquireError;
use crate::waitlist::WaitList;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Debug, Default)]
struct LockState {
    held: bool,
    waiters: WaitList,
}

/// Asynchronous exclusive lock.
///
/// Invariant: the queue is non-empty only while the lock is held; the
/// instant the queue empties on release, the lock becomes free.
pub struct Lock<C: Clock = SystemClock> {
    state: Mutex<LockState>,
    clock: C,
}

impl Lock {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for Lock {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> Lock<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            state: Mutex::new(LockState::default()),
            clock,
        }
    }

    /// Acquire the lock, suspending the caller until it is granted.
    ///
    /// Returns the time spent waiting (zero when the lock was free).
    pub async fn acquire(&self) -> Duration {
        let rx = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if !state.held {
                state.held = true;
                return Duration::ZERO;
            }
            let (_id, rx) = state.waiters.push(1, self.clock.now());
            rx
        };
        // The sender stays queued until release() grants it, and the queue
        // cannot outlive `self`, so the channel never closes unresolved.
        rx.await.unwrap_or_default()
    }

    /// Acquire with a deadline.
    ///
    /// If the deadline elapses before the lock is granted, the waiter is
    /// removed from the queue and [`AcquireError::Timeout`] is returned.
    /// Exactly one of grant or timeout takes effect per call.
    pub async fn try_acquire(&self, deadline: Duration) -> Result<Duration, AcquireError> {
        let (id, mut rx) = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if !state.held {
                state.held = true;
                return Ok(Duration::ZERO);
            }
            state.waiters.push(1, self.clock.now())
        };
        match timeout(deadline, &mut rx).await {
            Ok(Ok(waited)) => Ok(waited),
            Ok(Err(_)) => Err(AcquireError::Timeout),
            Err(_) => {
                let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
                if state.waiters.remove(id) {
                    return Err(AcquireError::Timeout);
                }
                drop(state);
                // The grant won the race; the elapsed wait is already
                // buffered in the channel.
                match rx.try_recv() {
                    Ok(waited) => Ok(waited),
                    Err(_) => Err(AcquireError::Timeout),
                }
            }
        }
    }

    /// Release the lock, handing it directly to the next waiter if any.
    ///
    /// Releasing a free lock is a no-op.
    pub fn release(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.held {
            return;
        }
        while let Some(waiter) = state.waiters.pop_front() {
            if waiter.grant(self.clock.now()) {
                return;
            }
            // The waiting future vanished; try the next in line.
        }
        state.held = false;
    }

    /// Number of tasks currently queued for the lock.
    pub fn queue_len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .waiters
            .len()
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
