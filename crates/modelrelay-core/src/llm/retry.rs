//! Retry controller for same-provider retries.
//!
//! Decides, after a failed adapter call, whether the router should try the
//! same provider again and how long to wait first. Only transient categories
//! (rate limit, server, network, timeout) are retried.

use std::time::Duration;

use rand::Rng;

use modelrelay_types::config::RetryPolicy;
use modelrelay_types::llm::ProviderError;

/// Uniform jitter applied to every computed delay (+/- 25%).
pub const JITTER_FRACTION: f64 = 0.25;

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait this long, then call the same provider again.
    Retry(Duration),
    /// The error category is not worth retrying.
    NotRetryable,
    /// `max_attempts` calls have been made.
    Exhausted,
}

/// Un-jittered delay before retry number `attempt` (1-based):
/// `min(max_delay, initial_delay * base^(attempt-1))`.
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
    let raw = policy.initial_delay().as_secs_f64() * policy.base.powi(exponent);
    let capped = raw.min(policy.max_delay().as_secs_f64());
    if capped.is_finite() && capped >= 0.0 {
        Duration::from_secs_f64(capped)
    } else {
        policy.max_delay()
    }
}

/// Scale `delay` by `factor`, where `factor` is drawn from
/// `[1 - JITTER_FRACTION, 1 + JITTER_FRACTION]`.
pub fn apply_jitter(delay: Duration, factor: f64) -> Duration {
    let factor = factor.clamp(1.0 - JITTER_FRACTION, 1.0 + JITTER_FRACTION);
    Duration::try_from_secs_f64(delay.as_secs_f64() * factor).unwrap_or(Duration::MAX)
}

/// Per-request retry state for one provider.
///
/// Attempts against a provider are strictly sequential; the router calls
/// [`RetryController::begin_attempt`] before each adapter call and
/// [`RetryController::after_failure`] after each failed one.
#[derive(Debug)]
pub struct RetryController<'a> {
    policy: &'a RetryPolicy,
    attempts: u32,
}

impl<'a> RetryController<'a> {
    pub fn new(policy: &'a RetryPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
        }
    }

    /// Number of calls made so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Record the start of another call and return its 1-based number.
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    /// Decide what follows a failed call, with random jitter.
    pub fn after_failure(&self, error: &ProviderError) -> RetryDecision {
        let factor = rand::rng().random_range((1.0 - JITTER_FRACTION)..=(1.0 + JITTER_FRACTION));
        self.after_failure_with_jitter(error, factor)
    }

    /// Decide what follows a failed call, using a fixed jitter factor.
    pub fn after_failure_with_jitter(&self, error: &ProviderError, factor: f64) -> RetryDecision {
        if !error.is_retryable() {
            return RetryDecision::NotRetryable;
        }
        if self.attempts >= self.policy.max_attempts {
            return RetryDecision::Exhausted;
        }

        let computed = apply_jitter(backoff_delay(self.policy, self.attempts), factor);
        let delay = match error.retry_after {
            Some(floor) => computed.max(floor),
            None => computed,
        };
        RetryDecision::Retry(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 1_000,
            base: 2.0,
        }
    }

    #[test]
    fn test_backoff_grows_then_caps() {
        let p = policy();
        assert_eq!(backoff_delay(&p, 1), Duration::from_millis(100));
        assert_eq!(backoff_delay(&p, 2), Duration::from_millis(200));
        assert_eq!(backoff_delay(&p, 3), Duration::from_millis(400));
        assert_eq!(backoff_delay(&p, 5), Duration::from_millis(1_000));
        assert_eq!(backoff_delay(&p, u32::MAX), Duration::from_millis(1_000));
    }

    #[test]
    fn test_jitter_bounds() {
        let base = Duration::from_secs(4);
        assert_eq!(apply_jitter(base, 0.75), Duration::from_secs(3));
        assert_eq!(apply_jitter(base, 1.25), Duration::from_secs(5));
        // Out-of-range factors are clamped.
        assert_eq!(apply_jitter(base, 3.0), Duration::from_secs(5));
        // Saturates instead of overflowing.
        assert_eq!(apply_jitter(Duration::MAX, 1.25), Duration::MAX);
    }

    #[test]
    fn test_random_jitter_stays_in_range() {
        let p = policy();
        let mut controller = RetryController::new(&p);
        controller.begin_attempt();
        for _ in 0..100 {
            match controller.after_failure(&ProviderError::server("500")) {
                RetryDecision::Retry(d) => {
                    assert!(d >= Duration::from_millis(74) && d <= Duration::from_millis(126));
                }
                other => panic!("expected retry, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_retry_until_exhausted() {
        let p = policy();
        let mut controller = RetryController::new(&p);
        let err = ProviderError::rate_limited(None);

        assert_eq!(controller.begin_attempt(), 1);
        assert_eq!(
            controller.after_failure_with_jitter(&err, 1.0),
            RetryDecision::Retry(Duration::from_millis(100))
        );
        assert_eq!(controller.begin_attempt(), 2);
        assert_eq!(
            controller.after_failure_with_jitter(&err, 1.0),
            RetryDecision::Retry(Duration::from_millis(200))
        );
        assert_eq!(controller.begin_attempt(), 3);
        assert_eq!(
            controller.after_failure_with_jitter(&err, 1.0),
            RetryDecision::Exhausted
        );
    }

    #[test]
    fn test_non_retryable_categories_fail_fast() {
        let p = policy();
        let mut controller = RetryController::new(&p);
        controller.begin_attempt();
        for err in [
            ProviderError::invalid_request("bad"),
            ProviderError::auth("401"),
            ProviderError::unknown("?"),
        ] {
            assert_eq!(
                controller.after_failure_with_jitter(&err, 1.0),
                RetryDecision::NotRetryable
            );
        }
    }

    #[test]
    fn test_retry_after_lower_bounds_delay() {
        let p = policy();
        let mut controller = RetryController::new(&p);
        controller.begin_attempt();

        let err = ProviderError::rate_limited(Some(Duration::from_secs(2)));
        assert_eq!(
            controller.after_failure_with_jitter(&err, 1.0),
            RetryDecision::Retry(Duration::from_secs(2))
        );

        // A hint shorter than the computed delay does not shorten it.
        let err = ProviderError::rate_limited(Some(Duration::from_millis(10)));
        assert_eq!(
            controller.after_failure_with_jitter(&err, 1.0),
            RetryDecision::Retry(Duration::from_millis(100))
        );
    }

    #[test]
    fn test_single_attempt_policy_never_retries() {
        let p = RetryPolicy {
            max_attempts: 1,
            ..policy()
        };
        let mut controller = RetryController::new(&p);
        controller.begin_attempt();
        assert_eq!(
            controller.after_failure_with_jitter(&ProviderError::timeout("slow"), 1.0),
            RetryDecision::Exhausted
        );
    }
}
