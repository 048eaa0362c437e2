use std::time::Duration;

use super::MarketDataError;

/// Classification for retry policy.
///
/// Used by the orchestrator to decide how to react to a provider error.
///
/// # Behavior Summary
///
/// | Class | Retry same tier? | Side effect |
/// |-------|------------------|-------------|
/// | `WithBackoff` | Once, after [`RateLimitRetryPolicy::delay`] | None |
/// | `InvalidateSession` | No | Session cleared |
/// | `NextTier` | No | None |
/// | `CircuitOpen` | No (tier skipped) | None |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// The provider signalled throttling. Retry after a fixed delay, bounded by
    /// [`RateLimitRetryPolicy`].
    WithBackoff,

    /// Credentials were rejected. Drop the session so the next request
    /// performs a full refresh, then move on.
    InvalidateSession,

    /// Move on to the next tier without retrying.
    NextTier,

    /// Circuit breaker is open for this provider. Skip it.
    CircuitOpen,
}

/// Default number of extra attempts after a rate-limited response.
const DEFAULT_MAX_RETRIES: u32 = 1;

/// Default wait before the retry.
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Bounded retry for rate-limited calls: at most `max_retries` extra attempts,
/// each after a fixed `delay`.
#[derive(Clone, Debug)]
pub struct RateLimitRetryPolicy {
    /// Extra attempts allowed after the first one.
    pub max_retries: u32,
    /// Fixed wait before each extra attempt.
    pub delay: Duration,
}

impl Default for RateLimitRetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RateLimitRetryPolicy {
    /// Returns how long to wait before retrying, or `None` to give up.
    ///
    /// `retries_done` is the number of retries already performed for this tier.
    pub fn next_delay(&self, error: &MarketDataError, retries_done: u32) -> Option<Duration> {
        if error.retry_class() != RetryClass::WithBackoff {
            return None;
        }
        if retries_done >= self.max_retries {
            return None;
        }
        Some(self.delay)
    }
}
