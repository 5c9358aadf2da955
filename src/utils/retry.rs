//! Retry strategies for provider requests.
//!
//! Each source is handed one [`RetryPolicy`] and runs every request through
//! [`execute`]. The policies differ in *when* they wait:
//!
//! - [`FixedDelayPolicy`]: the same politeness delay before every attempt.
//! - [`MinIntervalPolicy`]: a shared [`RateLimiter`] spaces attempts by a
//!   minimum interval, sleeping only the remainder.
//! - [`BackoffPolicy`]: no delay up front; exponential backoff after a
//!   rate-limit or transient transport failure.
//! - [`PreRequestBackoffPolicy`]: `base × 2^attempt` before every attempt,
//!   including the first; failures move straight on to the next attempt.
//!
//! When a policy gives up, the last error is converted with
//! [`SourceError::exhausted`]: a final rate-limit becomes
//! [`SourceError::RateLimitExceeded`], anything else [`SourceError::Search`].

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::clock::{Clock, TokioClock};
use super::rate_limit::RateLimiter;
use crate::sources::SourceError;

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after sleeping `delay` (on top of any pre-attempt wait)
    Retry { delay: Duration },
    /// Give up and report the error
    Stop,
}

/// Strategy deciding how a source paces and retries its requests.
#[async_trait]
pub trait RetryPolicy: Send + Sync + std::fmt::Debug {
    /// Upper bound on attempts, including the first
    fn max_attempts(&self) -> u32;

    /// Clock used for every wait
    fn clock(&self) -> &dyn Clock;

    /// Called before attempt `attempt` (0-based) is sent
    async fn before_attempt(&self, attempt: u32);

    /// Called after attempt `attempt` failed
    fn on_failure(&self, attempt: u32, error: &SourceError) -> RetryDecision;
}

/// Run `operation` under `policy`, converting exhaustion into a terminal error.
pub async fn execute<T, F, Fut>(
    policy: &dyn RetryPolicy,
    source_id: &str,
    mut operation: F,
) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    let max_attempts = policy.max_attempts().max(1);
    let mut attempt = 0;

    loop {
        policy.before_attempt(attempt).await;

        let error = match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(
                        source = source_id,
                        "request succeeded on attempt {}/{}",
                        attempt + 1,
                        max_attempts
                    );
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        let attempts = attempt + 1;
        match policy.on_failure(attempt, &error) {
            RetryDecision::Retry { delay } if attempts < max_attempts => {
                debug!(
                    source = source_id,
                    "attempt {}/{} failed: {}, retrying in {:?}",
                    attempts,
                    max_attempts,
                    error,
                    delay
                );
                policy.clock().sleep(delay).await;
                attempt += 1;
            }
            RetryDecision::Retry { .. } => {
                warn!(
                    source = source_id,
                    "giving up after {} attempt(s): {}", attempts, error
                );
                return Err(error.exhausted(source_id, attempts));
            }
            RetryDecision::Stop => {
                debug!(source = source_id, "permanent failure: {}", error);
                return Err(error.exhausted(source_id, attempts));
            }
        }
    }
}

/// Politeness delay before every attempt; transient failures are retried.
#[derive(Debug, Clone)]
pub struct FixedDelayPolicy {
    delay: Duration,
    max_attempts: u32,
    clock: Arc<dyn Clock>,
}

impl FixedDelayPolicy {
    pub fn new(delay: Duration, max_attempts: u32) -> Self {
        Self::with_clock(delay, max_attempts, Arc::new(TokioClock))
    }

    pub fn with_clock(delay: Duration, max_attempts: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            delay,
            max_attempts,
            clock,
        }
    }
}

#[async_trait]
impl RetryPolicy for FixedDelayPolicy {
    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    async fn before_attempt(&self, _attempt: u32) {
        self.clock.sleep(self.delay).await;
    }

    fn on_failure(&self, _attempt: u32, error: &SourceError) -> RetryDecision {
        if error.is_transient() {
            RetryDecision::Retry {
                delay: Duration::ZERO,
            }
        } else {
            RetryDecision::Stop
        }
    }
}

/// Attempts paced by a stateful [`RateLimiter`] shared across calls.
#[derive(Debug, Clone)]
pub struct MinIntervalPolicy {
    limiter: Arc<RateLimiter>,
    max_attempts: u32,
    clock: Arc<dyn Clock>,
}

impl MinIntervalPolicy {
    pub fn new(limiter: Arc<RateLimiter>, max_attempts: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            limiter,
            max_attempts,
            clock,
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }
}

#[async_trait]
impl RetryPolicy for MinIntervalPolicy {
    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    async fn before_attempt(&self, _attempt: u32) {
        self.limiter.acquire().await;
    }

    fn on_failure(&self, _attempt: u32, error: &SourceError) -> RetryDecision {
        if error.is_transient() {
            RetryDecision::Retry {
                delay: Duration::ZERO,
            }
        } else {
            RetryDecision::Stop
        }
    }
}

/// Exponential backoff after rate-limit and transient failures.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    initial_delay: Duration,
    max_delay: Duration,
    max_attempts: u32,
    clock: Arc<dyn Clock>,
}

impl BackoffPolicy {
    pub fn new(initial_delay: Duration, max_attempts: u32) -> Self {
        Self::with_clock(initial_delay, max_attempts, Arc::new(TokioClock))
    }

    pub fn with_clock(initial_delay: Duration, max_attempts: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            initial_delay,
            max_delay: Duration::from_secs(60),
            max_attempts,
            clock,
        }
    }

    /// Cap on a single backoff sleep
    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    fn backoff(&self, attempt: u32) -> Duration {
        exponential(self.initial_delay, attempt).min(self.max_delay)
    }
}

#[async_trait]
impl RetryPolicy for BackoffPolicy {
    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    async fn before_attempt(&self, _attempt: u32) {}

    fn on_failure(&self, attempt: u32, error: &SourceError) -> RetryDecision {
        if error.is_transient() {
            RetryDecision::Retry {
                delay: self.backoff(attempt),
            }
        } else {
            RetryDecision::Stop
        }
    }
}

/// `base × 2^attempt` before every attempt; failures do not add more delay.
///
/// A rate-limited attempt goes straight to the next round, whose pre-request
/// delay is already larger. This mirrors the long-standing client behaviour;
/// an extra penalty for an actual 429 may be worth adding later.
#[derive(Debug, Clone)]
pub struct PreRequestBackoffPolicy {
    base_delay: Duration,
    max_attempts: u32,
    clock: Arc<dyn Clock>,
}

impl PreRequestBackoffPolicy {
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self::with_clock(base_delay, max_attempts, Arc::new(TokioClock))
    }

    pub fn with_clock(base_delay: Duration, max_attempts: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            base_delay,
            max_attempts,
            clock,
        }
    }
}

#[async_trait]
impl RetryPolicy for PreRequestBackoffPolicy {
    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    async fn before_attempt(&self, attempt: u32) {
        self.clock.sleep(exponential(self.base_delay, attempt)).await;
    }

    fn on_failure(&self, _attempt: u32, error: &SourceError) -> RetryDecision {
        match error {
            SourceError::InvalidRequest(_) | SourceError::NotFound(_) => RetryDecision::Stop,
            _ => RetryDecision::Retry {
                delay: Duration::ZERO,
            },
        }
    }
}

fn exponential(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}
