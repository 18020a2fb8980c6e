//! Rate limiter specs
//!
//! Verify the minting cadence, deadline behavior, and queue discipline at
//! the public API.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::yield_now;
use tokio::time::Instant;
use turnstile_core::{AcquireError, RateLimiter};

#[tokio::test(start_paused = true)]
async fn one_permit_per_second_paces_consecutive_requests() {
    let limiter = RateLimiter::new(1.0).unwrap();
    let started = Instant::now();

    limiter.acquire(1).await.unwrap();
    limiter.acquire(1).await.unwrap();
    limiter.acquire(1).await.unwrap();

    // First mint is synchronous; the next two arrive a second apart.
    assert!(started.elapsed() >= Duration::from_millis(2000));
    assert!(started.elapsed() < Duration::from_millis(2500));
}

#[tokio::test(start_paused = true)]
async fn deadline_just_past_the_second_mint_succeeds() {
    let limiter = RateLimiter::new(1.0).unwrap();
    let waited = limiter
        .try_acquire(Duration::from_millis(1020), 2)
        .await
        .unwrap();
    assert!(waited >= Duration::from_millis(1000));
}

#[tokio::test(start_paused = true)]
async fn deadline_short_of_the_third_mint_times_out() {
    let limiter = RateLimiter::new(1.0).unwrap();
    let result = limiter.try_acquire(Duration::from_millis(1020), 3).await;
    assert_eq!(result, Err(AcquireError::Timeout));
    assert_eq!(limiter.queue_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn a_slow_head_delays_everyone_behind_it() {
    let limiter = Arc::new(RateLimiter::new(1.0).unwrap());
    let started = Instant::now();

    let big = tokio::spawn({
        let limiter = Arc::clone(&limiter);
        async move { limiter.acquire(3).await }
    });
    yield_now().await;

    let small = tokio::spawn({
        let limiter = Arc::clone(&limiter);
        async move { limiter.acquire(1).await }
    });
    yield_now().await;

    big.await.unwrap().unwrap();
    small.await.unwrap().unwrap();

    // Mints land at 0s, 1s, 2s for the head and 3s for the follower.
    assert!(started.elapsed() >= Duration::from_millis(3000));
}

#[tokio::test(start_paused = true)]
async fn a_timed_out_head_frees_the_cadence_for_the_next_request() {
    let limiter = Arc::new(RateLimiter::new(1.0).unwrap());

    let doomed = tokio::spawn({
        let limiter = Arc::clone(&limiter);
        async move { limiter.try_acquire(Duration::from_millis(500), 5).await }
    });
    yield_now().await;

    let next = tokio::spawn({
        let limiter = Arc::clone(&limiter);
        async move { limiter.acquire(1).await }
    });
    yield_now().await;

    assert_eq!(doomed.await.unwrap(), Err(AcquireError::Timeout));

    // The follower becomes the head and takes the 1s mint.
    let waited = next.await.unwrap().unwrap();
    assert!(waited >= Duration::from_millis(1000));
    assert!(waited < Duration::from_millis(1500));
    assert_eq!(limiter.queue_len(), 0);
}
