//! Semaphore specs
//!
//! Verify batched admission limits concurrency and releases feed the queue.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::yield_now;
use tokio::time::{sleep, Instant};
use turnstile_core::{AcquireError, Semaphore};

#[tokio::test(start_paused = true)]
async fn concurrency_never_exceeds_max_permits() {
    let sem = Arc::new(Semaphore::new(2).unwrap());
    let inside = Arc::new(AtomicU32::new(0));
    let started = Instant::now();

    let mut handles = Vec::new();
    for _ in 0..6 {
        let sem = Arc::clone(&sem);
        let inside = Arc::clone(&inside);
        handles.push(tokio::spawn(async move {
            sem.acquire(1).await.unwrap();
            let now_inside = inside.fetch_add(1, Ordering::SeqCst) + 1;
            assert!(now_inside <= 2);
            sleep(Duration::from_millis(500)).await;
            inside.fetch_sub(1, Ordering::SeqCst);
            sem.release(1);
        }));
        yield_now().await;
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // Six 500ms holders at two abreast take three waves.
    assert!(started.elapsed() >= Duration::from_millis(1500));
    assert_eq!(sem.available_permits(), 2);
}

#[tokio::test(start_paused = true)]
async fn batch_is_granted_whole_or_not_at_all() {
    let sem = Arc::new(Semaphore::new(3).unwrap());
    sem.acquire(2).await.unwrap();

    let batch = tokio::spawn({
        let sem = Arc::clone(&sem);
        async move { sem.acquire(2).await }
    });
    yield_now().await;

    // One permit free is not enough for the batch of two.
    assert_eq!(sem.available_permits(), 1);
    assert_eq!(sem.queue_len(), 1);

    sem.release(1);
    batch.await.unwrap().unwrap();
    assert_eq!(sem.available_permits(), 0);
}

#[tokio::test(start_paused = true)]
async fn requests_beyond_the_maximum_fail_fast() {
    let sem = Semaphore::new(2).unwrap();
    assert_eq!(
        sem.acquire(3).await,
        Err(AcquireError::PermitLimitExceeded {
            requested: 3,
            max: 2
        })
    );
    // The failed request left no trace.
    assert_eq!(sem.queue_len(), 0);
    assert_eq!(sem.available_permits(), 2);
}

#[tokio::test(start_paused = true)]
async fn over_release_clamps_instead_of_inflating_the_pool() {
    let sem = Arc::new(Semaphore::new(2).unwrap());
    sem.acquire(1).await.unwrap();
    sem.release(1);
    sem.release(1); // double release

    assert_eq!(sem.available_permits(), 2);

    // The clamped pool still only admits two at a time.
    sem.acquire(2).await.unwrap();
    assert_eq!(sem.available_permits(), 0);
}

#[tokio::test(start_paused = true)]
async fn drained_pool_blocks_until_permits_return() {
    let sem = Arc::new(Semaphore::new(2).unwrap());
    assert_eq!(sem.drain_permits(), 2);

    let waiter = tokio::spawn({
        let sem = Arc::clone(&sem);
        async move { sem.acquire(1).await }
    });
    yield_now().await;
    assert_eq!(sem.queue_len(), 1);

    sem.release(1);
    waiter.await.unwrap().unwrap();
}
