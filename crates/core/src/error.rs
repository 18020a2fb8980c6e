// SPDX-License-Identifier: MIT

//! Closed error taxonomy for permit acquisition
//!
//! Callers branch on kind, never on message text. Accounting anomalies are
//! deliberately not represented here: the semaphore clamps the permit count
//! and logs a warning instead of failing (see `Semaphore::release`).

use thiserror::Error;

/// Errors returned by the concurrency primitives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcquireError {
    /// A constructor or call argument was out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A batch request exceeded the semaphore's fixed maximum.
    #[error("requested {requested} permits but the maximum is {max}")]
    PermitLimitExceeded { requested: u32, max: u32 },

    /// The deadline elapsed before the waiter was granted.
    #[error("timed out waiting for permits")]
    Timeout,
}
