//! Client-side request pacing.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

use super::clock::{Clock, TokioClock};

/// Enforces a minimum interval between consecutive requests.
///
/// The limiter remembers when the last request went out and, on
/// [`acquire`](RateLimiter::acquire), sleeps only for whatever part of the
/// interval has not yet elapsed. Callers are serialized, so two requests can
/// never be in flight closer together than the interval.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a limiter on the wall clock
    pub fn new(min_interval: Duration) -> Self {
        Self::with_clock(min_interval, Arc::new(TokioClock))
    }

    /// Create a limiter on a caller-supplied clock
    pub fn with_clock(min_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
            clock,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until a request may be sent, then mark it as sent.
    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(previous) = *last {
            let elapsed = self.clock.now().saturating_duration_since(previous);
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                debug!("Rate limiter: waiting {}ms", wait.as_millis());
                self.clock.sleep(wait).await;
            }
        }

        *last = Some(self.clock.now());
    }

    /// Remaining wait before the next request would be allowed, if any
    pub async fn time_until_ready(&self) -> Option<Duration> {
        let last = self.last_request.lock().await;
        last.and_then(|previous| {
            let elapsed = self.clock.now().saturating_duration_since(previous);
            self.min_interval.checked_sub(elapsed).filter(|d| !d.is_zero())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ManualClock;

    #[tokio::test]
    async fn test_first_request_does_not_wait() {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimiter::with_clock(Duration::from_secs(1), clock.clone());

        limiter.acquire().await;

        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_back_to_back_requests_are_spaced() {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimiter::with_clock(Duration::from_secs(1), clock.clone());

        let start = clock.now();
        limiter.acquire().await;
        limiter.acquire().await;
        let second = clock.now();

        assert!(second - start >= Duration::from_secs(1));
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(1)]);
    }

    #[tokio::test]
    async fn test_sleeps_only_the_remainder() {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimiter::with_clock(Duration::from_millis(1000), clock.clone());

        limiter.acquire().await;
        clock.advance(Duration::from_millis(400));
        assert_eq!(
            limiter.time_until_ready().await,
            Some(Duration::from_millis(600))
        );
        limiter.acquire().await;

        assert_eq!(clock.sleeps(), vec![Duration::from_millis(600)]);
    }

    #[tokio::test]
    async fn test_no_sleep_when_interval_already_elapsed() {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimiter::with_clock(Duration::from_millis(500), clock.clone());

        limiter.acquire().await;
        clock.advance(Duration::from_secs(2));
        assert_eq!(limiter.time_until_ready().await, None);
        limiter.acquire().await;

        assert!(clock.sleeps().is_empty());
    }
}
