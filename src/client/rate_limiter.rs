use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Last-request-relative pacing for one client instance.
///
/// Only the timestamp of the previous dispatch is kept: a call made sooner
/// than `min_interval` after it sleeps for the remainder. There is no burst
/// allowance.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    min_interval: Option<Duration>,
    last_request_time: Option<Instant>,
}

impl RateLimiter {
    /// Create a limiter enforcing `min_interval` between dispatches
    #[must_use]
    pub const fn new(min_interval: Option<Duration>) -> Self {
        Self {
            min_interval,
            last_request_time: None,
        }
    }

    /// A limiter that never waits
    #[must_use]
    pub const fn unlimited() -> Self {
        Self::new(None)
    }

    /// Wait until it's safe to dispatch, then record the dispatch time
    pub async fn acquire(&mut self) {
        let Some(min_interval) = self.min_interval else {
            return;
        };

        if let Some(wait_time) = self.time_until_ready() {
            debug!("Rate limiter: waiting {}ms", wait_time.as_millis());
            sleep(wait_time).await;
        }

        self.last_request_time = Some(Instant::now());
        debug!(
            "Rate limiter: request permitted (min interval {}ms)",
            min_interval.as_millis()
        );
    }

    /// Check if a request would be allowed without waiting
    #[must_use]
    pub fn check(&self) -> bool {
        self.time_until_ready().is_none()
    }

    /// Get time until next request is allowed
    #[must_use]
    pub fn time_until_ready(&self) -> Option<Duration> {
        let min_interval = self.min_interval?;
        let last_time = self.last_request_time?;
        let elapsed = Instant::now().duration_since(last_time);
        if elapsed >= min_interval {
            None
        } else {
            Some(min_interval - elapsed)
        }
    }

    /// Configured minimum spacing, if any
    #[must_use]
    pub const fn min_interval(&self) -> Option<Duration> {
        self.min_interval
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::unlimited()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limiter_basic() {
        let mut limiter = RateLimiter::new(Some(Duration::from_millis(300)));

        // First request should be immediate
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(100));

        // Second request should wait for the interval
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(290));
    }

    #[tokio::test]
    async fn test_unlimited_never_waits() {
        let mut limiter = RateLimiter::unlimited();
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
        assert!(limiter.check());
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_remaining_difference_is_waited() {
        let mut limiter = RateLimiter::new(Some(Duration::from_secs(2)));
        limiter.acquire().await;

        tokio::time::advance(Duration::from_millis(1500)).await;
        let remaining = limiter.time_until_ready().unwrap();
        assert!(remaining <= Duration::from_millis(500));

        let before = Instant::now();
        limiter.acquire().await;
        let waited = before.elapsed();
        assert!(waited >= Duration::from_millis(499));
        assert!(waited <= Duration::from_millis(501));
    }

    #[test]
    fn test_rate_limiter_check() {
        let limiter = RateLimiter::new(Some(Duration::from_secs(1)));

        // Should be ready initially
        assert!(limiter.check());
        assert_eq!(limiter.min_interval(), Some(Duration::from_secs(1)));
    }
}
