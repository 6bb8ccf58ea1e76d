//! Process-wide token-bucket rate limiter for upstream API calls.
//!
//! One limiter instance is shared by every caller in the process, so a
//! concurrently running incremental sync and historical backfill still draw
//! from a single request budget.

use std::sync::Arc;
use std::time::Duration;

use metrics::histogram;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};

/// Token bucket with a minimum inter-request spacing.
///
/// The bucket refills at `requests_per_minute / 60` tokens per second and the
/// spacing floor keeps bursts from clustering at window edges, so no rolling
/// 60-second window ever sees more than `requests_per_minute` requests.
pub struct RateLimiter {
    state: Mutex<Bucket>,
    capacity: f64,
    refill_per_sec: f64,
    min_spacing: Duration,
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
    last_request: Option<Instant>,
}

impl RateLimiter {
    /// Create a limiter allowing `requests_per_minute` requests in any rolling
    /// 60-second window (minimum spacing `60s / requests_per_minute`).
    pub fn new(requests_per_minute: u32) -> Arc<Self> {
        let rpm = requests_per_minute.max(1) as f64;
        Arc::new(Self {
            state: Mutex::new(Bucket {
                tokens: 1.0,
                last_refill: Instant::now(),
                last_request: None,
            }),
            capacity: rpm,
            refill_per_sec: rpm / 60.0,
            min_spacing: Duration::from_secs_f64(60.0 / rpm),
        })
    }

    /// Wait until a request slot is available, then consume it.
    pub async fn acquire(&self) {
        let started = Instant::now();
        loop {
            let wait = {
                let mut bucket = self.state.lock().await;
                let now = Instant::now();

                let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
                bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.capacity);
                bucket.last_refill = now;

                let spacing_wait = bucket
                    .last_request
                    .map(|last| (last + self.min_spacing).saturating_duration_since(now))
                    .unwrap_or(Duration::ZERO);

                if bucket.tokens >= 1.0 && spacing_wait.is_zero() {
                    bucket.tokens -= 1.0;
                    bucket.last_request = Some(now);
                    None
                } else if !spacing_wait.is_zero() {
                    Some(spacing_wait)
                } else {
                    let deficit = 1.0 - bucket.tokens;
                    Some(Duration::from_secs_f64(deficit / self.refill_per_sec))
                }
            };

            match wait {
                None => {
                    histogram!("upstream_rate_limit_wait_ms")
                        .record(started.elapsed().as_secs_f64() * 1_000.0);
                    return;
                }
                Some(duration) => sleep(duration).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn enforces_minimum_spacing() {
        let limiter = RateLimiter::new(100); // 600ms spacing
        let start = Instant::now();

        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;

        // Two spacing gaps after the first request.
        assert!(start.elapsed() >= Duration::from_millis(1200));
    }

    #[tokio::test(start_paused = true)]
    async fn respects_rolling_window_budget() {
        let limiter = RateLimiter::new(60); // one per second
        let start = Instant::now();

        let mut issued_in_first_minute = 0;
        for _ in 0..70 {
            limiter.acquire().await;
            if start.elapsed() < Duration::from_secs(60) {
                issued_in_first_minute += 1;
            }
        }

        assert!(issued_in_first_minute <= 60);
    }

    #[tokio::test(start_paused = true)]
    async fn first_request_is_immediate() {
        let limiter = RateLimiter::new(100);
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(10));
    }
}
