// SPDX-License-Identifier: MIT

//! FIFO wait list shared by the lock, semaphore, and rate limiter
//!
//! Waiters are appended at the tail and granted from the head; timeout
//! cancellation removes a waiter by identity, which is a no-op if it was
//! already granted. No operation reorders existing entries.
//!
//! Each waiter's completion handle is a one-shot channel sender: delivering
//! the grant consumes it, so a waiter can only ever be resolved once.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// Identity of a queued waiter, used for cancellation by identity rather
/// than by position (positions shift as the queue drains).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WaiterId(u64);

/// One pending request for permits.
#[derive(Debug)]
pub(crate) struct Waiter {
    id: WaiterId,
    permits: u32,
    /// Permits minted toward this waiter so far (rate limiter only).
    minted: u32,
    enqueued_at: Instant,
    resolve: oneshot::Sender<Duration>,
}

impl Waiter {
    pub(crate) fn permits(&self) -> u32 {
        self.permits
    }

    /// Credit one minted permit. Returns true once the full batch is covered.
    pub(crate) fn record_mint(&mut self) -> bool {
        self.minted += 1;
        self.minted >= self.permits
    }

    /// Deliver the grant, consuming the waiter. Returns false if the waiting
    /// future was dropped before the grant arrived.
    pub(crate) fn grant(self, now: Instant) -> bool {
        let waited = now.duration_since(self.enqueued_at);
        self.resolve.send(waited).is_ok()
    }
}

/// Strict-FIFO queue of pending waiters.
#[derive(Debug, Default)]
pub(crate) struct WaitList {
    entries: VecDeque<Waiter>,
    next_id: u64,
}

impl WaitList {
    pub(crate) fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            next_id: 0,
        }
    }

    /// Append a waiter at the tail, returning its identity and the receiver
    /// that resolves with the elapsed wait once granted.
    pub(crate) fn push(
        &mut self,
        permits: u32,
        enqueued_at: Instant,
    ) -> (WaiterId, oneshot::Receiver<Duration>) {
        let id = WaiterId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        let (tx, rx) = oneshot::channel();
        self.entries.push_back(Waiter {
            id,
            permits,
            minted: 0,
            enqueued_at,
            resolve: tx,
        });
        (id, rx)
    }

    pub(crate) fn front(&self) -> Option<&Waiter> {
        self.entries.front()
    }

    pub(crate) fn front_mut(&mut self) -> Option<&mut Waiter> {
        self.entries.front_mut()
    }

    pub(crate) fn pop_front(&mut self) -> Option<Waiter> {
        self.entries.pop_front()
    }

    /// Remove a waiter by identity. Returns false if it is no longer queued
    /// (already granted), in which case nothing changes.
    pub(crate) fn remove(&mut self, id: WaiterId) -> bool {
        match self.entries.iter().position(|w| w.id == id) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "waitlist_tests.rs"]
mod tests;
