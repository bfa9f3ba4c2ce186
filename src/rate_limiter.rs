//! # Rate Limiter
//! Token bucket guarding outbound calls to one platform.
//!
//! - `rate` tokens per second sustained, bursts up to `capacity`.
//! - `acquire()` holds the bucket lock across refill, consume and (if needed) the
//!   wait for the next token, so concurrent callers are admitted one at a time.
//! - Uses the tokio monotonic clock; the wait is a task suspension, not a spin.
//!
//! Each collector owns its own limiter; platforms never share a bucket.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Slowest accepted refill rate (one token every ~17 minutes).
const MIN_RATE: f64 = 1e-3;

#[derive(Debug)]
pub struct RateLimiter {
    rate: f64,
    capacity: f64,
    bucket: Mutex<Bucket>,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn refill(&mut self, now: Instant, rate: f64, capacity: f64) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(capacity);
        self.last_refill = now;
    }
}

impl RateLimiter {
    /// New limiter with a full bucket.
    ///
    /// Non-finite or non-positive rates are raised to a tiny positive floor and
    /// capacity is at least one token, so `acquire()` always terminates.
    pub fn new(rate: f64, capacity: u32) -> Self {
        let rate = if rate.is_finite() { rate.max(MIN_RATE) } else { MIN_RATE };
        let capacity = f64::from(capacity.max(1));
        Self {
            rate,
            capacity,
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// `requests` per `period`, with the given burst.
    pub fn per_period(requests: u32, period: Duration, capacity: u32) -> Self {
        let secs = period.as_secs_f64().max(f64::EPSILON);
        Self::new(f64::from(requests) / secs, capacity)
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn capacity(&self) -> u32 {
        self.capacity as u32
    }

    /// Wait until one token is available, then consume it.
    pub async fn acquire(&self) {
        let mut bucket = self.bucket.lock().await;
        bucket.refill(Instant::now(), self.rate, self.capacity);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return;
        }

        let wait = Duration::from_secs_f64((1.0 - bucket.tokens) / self.rate);
        tracing::trace!(wait_ms = wait.as_millis() as u64, "rate limiter waiting");
        tokio::time::sleep(wait).await;

        // The token accrued during the wait is consumed right away.
        bucket.tokens = 0.0;
        bucket.last_refill = Instant::now();
    }

    /// Tokens currently available (after refill), for diagnostics.
    pub async fn available(&self) -> f64 {
        let mut bucket = self.bucket.lock().await;
        bucket.refill(Instant::now(), self.rate, self.capacity);
        bucket.tokens
    }
}
