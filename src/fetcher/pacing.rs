//! Shared outbound pacing across workers and pipeline stages.

use std::sync::{
    Mutex,
    atomic::{AtomicU64, Ordering},
};
use std::time::Duration;
use tokio::time::{Instant, sleep};

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket. Callers reserve a token under the lock and sleep outside it.
#[derive(Debug)]
pub struct RequestPacer {
    rate_per_sec: f64,
    capacity: f64,
    bucket: Mutex<Bucket>,
    granted: AtomicU64,
}

impl RequestPacer {
    pub fn new(rate_per_sec: f64, burst: u32) -> Self {
        let capacity = f64::from(burst.max(1));
        Self {
            rate_per_sec,
            capacity,
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            granted: AtomicU64::new(0),
        }
    }

    /// A non-positive rate disables pacing.
    pub fn unlimited() -> Self {
        Self::new(0.0, 1)
    }

    pub fn is_limited(&self) -> bool {
        self.rate_per_sec > 0.0
    }

    /// Requests let through so far, paced or not.
    pub fn granted(&self) -> u64 {
        self.granted.load(Ordering::Relaxed)
    }

    /// Waits until a request may go out.
    pub async fn acquire(&self) {
        self.granted.fetch_add(1, Ordering::Relaxed);
        let wait = self.reserve();
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }

    /// Takes a token, possibly borrowing against the future, and returns how long to wait.
    fn reserve(&self) -> Duration {
        if !self.is_limited() {
            return Duration::ZERO;
        }
        let Ok(mut bucket) = self.bucket.lock() else {
            return Duration::ZERO;
        };
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rate_per_sec).min(self.capacity);
        bucket.last_refill = now;

        bucket.tokens -= 1.0;
        if bucket.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-bucket.tokens / self.rate_per_sec)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn burst_then_rate() {
        let pacer = RequestPacer::new(2.0, 2);
        let start = Instant::now();
        pacer.acquire().await;
        pacer.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(10));

        pacer.acquire().await;
        pacer.acquire().await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(990), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(1100), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_waiters_are_spread_out() {
        let pacer = std::sync::Arc::new(RequestPacer::new(4.0, 1));
        let start = Instant::now();
        let mut handles = Vec::new();
        for _ in 0..5 {
            let pacer = pacer.clone();
            handles.push(tokio::spawn(async move { pacer.acquire().await }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        // One free token, then four more at 250ms each
        assert!(start.elapsed() >= Duration::from_millis(990));
    }

    #[tokio::test]
    async fn unlimited_never_waits() {
        let pacer = RequestPacer::unlimited();
        for _ in 0..100 {
            pacer.acquire().await;
        }
        assert!(!pacer.is_limited());
        assert_eq!(pacer.granted(), 100);
    }
}
