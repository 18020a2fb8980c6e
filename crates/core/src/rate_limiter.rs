// SPDX-License-Identifier: MIT

//! Fixed-rate limiter with an on-demand periodic ticker
//!
//! There is no standing permit pool: permits are minted one at a time at a
//! fixed interval and accumulate toward the head waiter only. Requests
//! always queue. The ticker starts with the first request (minting one
//! permit synchronously so an idle limiter serves a single-permit request
//! without waiting a full interval) and shuts itself down once the queue has
//! been empty for the idle threshold.

use crate::clock::{Clock, SystemClock};
use crate::error::AcquireError;
use crate::waitlist::{WaitList, WaiterId};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

/// Default idle period after which the ticker stops itself.
const DEFAULT_IDLE_SHUTDOWN: Duration = Duration::from_secs(7);

/// Rate limiter configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    /// Mint rate in permits per second, in (0, 1000]
    pub permits_per_second: f64,
    /// Idle period after which the ticker shuts down
    #[serde(with = "humantime_serde")]
    pub idle_shutdown: Duration,
}

impl RateLimiterConfig {
    pub fn new(permits_per_second: f64) -> Self {
        Self {
            permits_per_second,
            idle_shutdown: DEFAULT_IDLE_SHUTDOWN,
        }
    }

    pub fn with_idle_shutdown(mut self, idle_shutdown: Duration) -> Self {
        self.idle_shutdown = idle_shutdown;
        self
    }
}

#[derive(Debug)]
struct LimiterState {
    interval: Duration,
    idle_shutdown: Duration,
    waiters: WaitList,
    /// When the queue last became empty; None while waiters are pending.
    idle_since: Option<Instant>,
    ticker: Option<JoinHandle<()>>,
}

/// Outcome of one tick.
enum Tick {
    Continue,
    Shutdown,
}

struct Shared<C> {
    state: Mutex<LimiterState>,
    clock: C,
}

/// Rate limiter minting one permit per interval toward the queue head.
///
/// Invariant: at most one live ticker per instance; the ticker exists only
/// while it is minting toward a pending waiter or has been idle for less
/// than the idle threshold.
pub struct RateLimiter<C: Clock = SystemClock> {
    shared: Arc<Shared<C>>,
}

impl RateLimiter {
    /// Create a limiter minting `permits_per_second` permits; the rate must
    /// be finite and in (0, 1000].
    pub fn new(permits_per_second: f64) -> Result<Self, AcquireError> {
        Self::from_config(RateLimiterConfig::new(permits_per_second))
    }

    pub fn from_config(config: RateLimiterConfig) -> Result<Self, AcquireError> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock + 'static> RateLimiter<C> {
    pub fn with_clock(config: RateLimiterConfig, clock: C) -> Result<Self, AcquireError> {
        let interval = interval_for(config.permits_per_second)?;
        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(LimiterState {
                    interval,
                    idle_shutdown: config.idle_shutdown,
                    waiters: WaitList::new(),
                    idle_since: None,
                    ticker: None,
                }),
                clock,
            }),
        })
    }

    /// Change the mint rate.
    ///
    /// Precondition: call before the first `acquire`. Once a ticker has
    /// started, its in-flight cadence is unaffected by a rate change.
    pub fn set_rate(&mut self, permits_per_second: f64) -> Result<(), AcquireError> {
        let interval = interval_for(permits_per_second)?;
        self.shared
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .interval = interval;
        Ok(())
    }

    /// Current rate in permits per second.
    pub fn rate(&self) -> f64 {
        let interval = self
            .shared
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .interval;
        1.0 / interval.as_secs_f64()
    }

    /// Acquire `permits` permits, suspending until that many have been
    /// minted toward this request.
    ///
    /// Returns the time spent waiting since enqueue.
    pub async fn acquire(&self, permits: u32) -> Result<Duration, AcquireError> {
        let (_id, rx) = self.enqueue(permits)?;
        // The sender stays queued until the ticker grants it, and the ticker
        // outlives every waiter, so the channel never closes unresolved.
        Ok(rx.await.unwrap_or_default())
    }

    /// Acquire with a deadline.
    ///
    /// A timed-out request forfeits the permits already minted toward it;
    /// the next head starts accumulating from zero.
    pub async fn try_acquire(
        &self,
        deadline: Duration,
        permits: u32,
    ) -> Result<Duration, AcquireError> {
        let (id, mut rx) = self.enqueue(permits)?;
        match time::timeout(deadline, &mut rx).await {
            Ok(Ok(waited)) => Ok(waited),
            Ok(Err(_)) => Err(AcquireError::Timeout),
            Err(_) => {
                let mut state = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());
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

    /// Number of requests waiting for mints.
    pub fn queue_len(&self) -> usize {
        self.shared
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .waiters
            .len()
    }

    /// Queue the request and make sure a ticker is minting.
    fn enqueue(
        &self,
        permits: u32,
    ) -> Result<(WaiterId, oneshot::Receiver<Duration>), AcquireError> {
        if permits == 0 {
            return Err(AcquireError::InvalidArgument(
                "permits must be at least 1".to_string(),
            ));
        }
        let mut state = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());
        let entry = state.waiters.push(permits, self.shared.clock.now());
        if state.ticker.is_none() {
            // First mint happens synchronously; the periodic ticker takes
            // over one interval from now.
            let _ = mint(&mut state, self.shared.clock.now());
            state.ticker = Some(spawn_ticker(Arc::clone(&self.shared)));
            tracing::debug!(
                interval_ms = state.interval.as_millis() as u64,
                "rate limiter ticker started"
            );
        }
        Ok(entry)
    }
}

impl<C: Clock> Drop for RateLimiter<C> {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(ticker) = state.ticker.take() {
            ticker.abort();
        }
    }
}

/// One tick: mint a permit toward the head waiter, or track idleness and
/// decide whether the ticker should stop.
///
/// Only the head accumulates mints; a multi-permit request at the head must
/// reach its full count before the next waiter begins accumulating.
fn mint(state: &mut LimiterState, now: Instant) -> Tick {
    if state.waiters.is_empty() {
        match state.idle_since {
            None => state.idle_since = Some(now),
            Some(since) if now.duration_since(since) > state.idle_shutdown => {
                return Tick::Shutdown;
            }
            Some(_) => {}
        }
        return Tick::Continue;
    }
    state.idle_since = None;
    if let Some(head) = state.waiters.front_mut() {
        if head.record_mint() {
            if let Some(waiter) = state.waiters.pop_front() {
                // A dropped future just forfeits its mints.
                let _ = waiter.grant(now);
            }
        }
    }
    Tick::Continue
}

fn spawn_ticker<C: Clock + 'static>(shared: Arc<Shared<C>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = shared
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .interval;
        let mut ticker = time::interval_at(Instant::now() + period, period);
        loop {
            ticker.tick().await;
            let mut state = shared.state.lock().unwrap_or_else(|e| e.into_inner());
            if let Tick::Shutdown = mint(&mut state, shared.clock.now()) {
                state.ticker = None;
                tracing::debug!("rate limiter ticker stopped after idle period");
                return;
            }
        }
    })
}

fn interval_for(permits_per_second: f64) -> Result<Duration, AcquireError> {
    if !permits_per_second.is_finite()
        || permits_per_second <= 0.0
        || permits_per_second > 1000.0
    {
        return Err(AcquireError::InvalidArgument(format!(
            "permits_per_second must be in (0, 1000], got {permits_per_second}"
        )));
    }
    Ok(Duration::from_secs_f64(1.0 / permits_per_second))
}

#[cfg(test)]
#[path = "rate_limiter_tests.rs"]
mod tests;
