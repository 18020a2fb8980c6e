// SPDX-License-Identifier: MIT

//! turnstile-core: cooperative concurrency-control primitives
//!
//! This crate provides:
//! - An exclusive [`Lock`] with FIFO handoff between waiters
//! - A counting [`Semaphore`] with batched permit acquisition
//! - A [`RateLimiter`] that mints permits at a fixed interval
//!
//! All three suspend callers at `.await` points instead of blocking OS
//! threads, and resolve waiters in strict arrival order.

pub mod clock;
pub mod error;

mod waitlist;

pub mod lock;
pub mod rate_limiter;
pub mod semaphore;

// Re-exports
pub use clock::{Clock, FakeClock, SystemClock};
pub use error::AcquireError;
pub use lock::Lock;
pub use rate_limiter::{RateLimiter, RateLimiterConfig};
pub use semaphore::Semaphore;
