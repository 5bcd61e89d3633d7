//! Per-provider circuit breaker.
//!
//! Tracks provider health and gates calls into an adapter. The breaker is
//! shared between concurrent requests, so every transition happens under a
//! short internal lock; no provider I/O is ever performed while holding it.
//!
//! Admission hands out a [`CallTicket`]. The caller settles the ticket with
//! the call outcome; a ticket dropped without settling (the request was
//! cancelled) releases its half-open trial reservation and is not counted
//! as a failure.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use modelrelay_types::config::ProviderSettings;
use modelrelay_types::llm::{CircuitState, ProviderError, ProviderId};

/// Thresholds for a single breaker.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures in Closed before opening the circuit.
    pub failure_threshold: u32,
    /// Consecutive half-open successes before closing the circuit.
    pub success_threshold: u32,
    /// How long to stay Open before admitting a trial call.
    pub recovery_timeout: Duration,
    /// Trial calls allowed in flight while HalfOpen.
    pub half_open_max_trials: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            recovery_timeout: Duration::from_secs(60),
            half_open_max_trials: 1,
        }
    }
}

impl From<&ProviderSettings> for BreakerConfig {
    fn from(settings: &ProviderSettings) -> Self {
        Self {
            failure_threshold: settings.failure_threshold,
            success_threshold: settings.success_threshold,
            recovery_timeout: settings.recovery_timeout(),
            half_open_max_trials: settings.half_open_max_trials,
        }
    }
}

/// Why the breaker refused a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The circuit is open and still cooling down.
    Open,
    /// Half-open, and every trial slot is already taken.
    TrialInFlight,
}

/// Point-in-time view of a breaker's record.
#[derive(Debug, Clone)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub consecutive_successes_in_half_open: u32,
    pub opened_at: Option<Instant>,
    pub total_calls: u64,
    pub total_failures: u64,
    pub last_error: Option<String>,
    pub last_success: Option<Instant>,
}

#[derive(Debug)]
struct Record {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes_in_half_open: u32,
    half_open_in_flight: u32,
    opened_at: Option<Instant>,
    /// Bumped on every state transition. Outcomes of calls admitted under
    /// an older epoch only update the totals.
    epoch: u64,
    total_calls: u64,
    total_failures: u64,
    last_error: Option<String>,
    last_success: Option<Instant>,
}

impl Record {
    fn transition(&mut self, to: CircuitState) {
        self.state = to;
        self.epoch += 1;
        self.consecutive_successes_in_half_open = 0;
        self.half_open_in_flight = 0;
        match to {
            CircuitState::Closed => {
                self.consecutive_failures = 0;
                self.opened_at = None;
            }
            CircuitState::Open => {
                self.opened_at = Some(Instant::now());
            }
            CircuitState::HalfOpen => {}
        }
    }

    fn cooled_down(&self, recovery_timeout: Duration) -> bool {
        self.opened_at
            .is_some_and(|at| Instant::now().duration_since(at) > recovery_timeout)
    }
}

/// Failure-tracking state machine guarding one provider.
#[derive(Debug)]
pub struct CircuitBreaker {
    id: ProviderId,
    config: BreakerConfig,
    record: Mutex<Record>,
}

impl CircuitBreaker {
    pub fn new(id: ProviderId, config: BreakerConfig) -> Self {
        Self {
            id,
            config,
            record: Mutex::new(Record {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                consecutive_successes_in_half_open: 0,
                half_open_in_flight: 0,
                opened_at: None,
                epoch: 0,
                total_calls: 0,
                total_failures: 0,
                last_error: None,
                last_success: None,
            }),
        }
    }

    pub fn id(&self) -> &ProviderId {
        &self.id
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Record> {
        // The record is always left consistent, so a poisoned lock is still usable.
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ask to make one call.
    ///
    /// An Open circuit whose recovery timeout has elapsed moves to HalfOpen
    /// here, before the admitted call runs.
    pub fn admit(self: &Arc<Self>) -> Result<CallTicket, Rejection> {
        let mut record = self.lock();
        let trial = match record.state {
            CircuitState::Closed => false,
            CircuitState::Open => {
                if !record.cooled_down(self.config.recovery_timeout) {
                    return Err(Rejection::Open);
                }
                record.transition(CircuitState::HalfOpen);
                tracing::info!(provider = %self.id, "Circuit half-open, admitting trial call");
                record.half_open_in_flight = 1;
                true
            }
            CircuitState::HalfOpen => {
                if record.half_open_in_flight >= self.config.half_open_max_trials {
                    return Err(Rejection::TrialInFlight);
                }
                record.half_open_in_flight += 1;
                true
            }
        };

        Ok(CallTicket {
            breaker: Arc::clone(self),
            epoch: record.epoch,
            trial,
            settled: false,
        })
    }

    /// Whether a call made now would be admitted. Does not change state.
    pub fn is_available(&self) -> bool {
        let record = self.lock();
        match record.state {
            CircuitState::Closed => true,
            CircuitState::Open => record.cooled_down(self.config.recovery_timeout),
            CircuitState::HalfOpen => {
                record.half_open_in_flight < self.config.half_open_max_trials
            }
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let record = self.lock();
        BreakerSnapshot {
            state: record.state,
            consecutive_failures: record.consecutive_failures,
            consecutive_successes_in_half_open: record.consecutive_successes_in_half_open,
            opened_at: record.opened_at,
            total_calls: record.total_calls,
            total_failures: record.total_failures,
            last_error: record.last_error.clone(),
            last_success: record.last_success,
        }
    }

    fn on_success(&self, epoch: u64, trial: bool) {
        let mut record = self.lock();
        record.total_calls += 1;
        record.last_success = Some(Instant::now());

        if epoch != record.epoch {
            return;
        }

        match record.state {
            CircuitState::Closed => {
                record.consecutive_failures = 0;
            }
            CircuitState::HalfOpen if trial => {
                record.half_open_in_flight = record.half_open_in_flight.saturating_sub(1);
                record.consecutive_successes_in_half_open += 1;
                if record.consecutive_successes_in_half_open >= self.config.success_threshold {
                    record.transition(CircuitState::Closed);
                    tracing::info!(provider = %self.id, "Circuit closed, provider recovered");
                }
            }
            // Open never issues tickets for its own epoch.
            _ => {}
        }
    }

    fn on_failure(&self, epoch: u64, trial: bool, error: &ProviderError) {
        let mut record = self.lock();
        record.total_calls += 1;
        record.total_failures += 1;
        record.last_error = Some(error.to_string());

        if epoch != record.epoch {
            return;
        }

        match record.state {
            CircuitState::Closed => {
                record.consecutive_failures += 1;
                if record.consecutive_failures >= self.config.failure_threshold {
                    record.transition(CircuitState::Open);
                    tracing::warn!(
                        provider = %self.id,
                        failures = record.consecutive_failures,
                        "Circuit opened"
                    );
                }
            }
            CircuitState::HalfOpen if trial => {
                record.consecutive_failures += 1;
                record.transition(CircuitState::Open);
                tracing::warn!(provider = %self.id, error = %error, "Trial call failed, circuit re-opened");
            }
            _ => {}
        }
    }

    fn on_abandon(&self, epoch: u64, trial: bool) {
        let mut record = self.lock();
        if trial && epoch == record.epoch && record.state == CircuitState::HalfOpen {
            record.half_open_in_flight = record.half_open_in_flight.saturating_sub(1);
        }
    }
}

/// Permission to make one call through a breaker.
///
/// Settle it with [`CallTicket::succeed`] or [`CallTicket::fail`]. Dropping
/// an unsettled ticket means the call was cancelled.
#[derive(Debug)]
pub struct CallTicket {
    breaker: Arc<CircuitBreaker>,
    epoch: u64,
    trial: bool,
    settled: bool,
}

impl CallTicket {
    /// Whether this call is a half-open trial.
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn succeed(mut self) {
        self.settled = true;
        self.breaker.on_success(self.epoch, self.trial);
    }

    pub fn fail(mut self, error: &ProviderError) {
        self.settled = true;
        self.breaker.on_failure(self.epoch, self.trial, error);
    }
}

impl Drop for CallTicket {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.on_abandon(self.epoch, self.trial);
        }
    }
}

/// Render the time since `instant` as "Ns ago" / "Nm ago" / "Nh ago".
pub fn format_ago(instant: Instant) -> String {
    let elapsed = Instant::now().duration_since(instant);
    if elapsed.as_secs() < 60 {
        format!("{}s ago", elapsed.as_secs())
    } else if elapsed.as_secs() < 3600 {
        format!("{}m ago", elapsed.as_secs() / 60)
    } else {
        format!("{}h ago", elapsed.as_secs() / 3600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> Arc<CircuitBreaker> {
        Arc::new(CircuitBreaker::new(
            ProviderId::from("test"),
            BreakerConfig::default(),
        ))
    }

    fn fail_once(breaker: &Arc<CircuitBreaker>) {
        breaker
            .admit()
            .unwrap()
            .fail(&ProviderError::server("500"));
    }

    #[test]
    fn test_new_breaker_defaults() {
        let b = breaker();
        assert_eq!(b.config().failure_threshold, 5);
        assert_eq!(b.config().success_threshold, 2);
        assert_eq!(b.config().recovery_timeout, Duration::from_secs(60));
        assert_eq!(b.state(), CircuitState::Closed);
        assert!(b.is_available());
    }

    #[test]
    fn test_circuit_opens_after_threshold_failures() {
        let b = breaker();
        for _ in 0..4 {
            fail_once(&b);
        }
        assert_eq!(b.state(), CircuitState::Closed);
        assert_eq!(b.consecutive_failures(), 4);

        fail_once(&b);
        assert_eq!(b.state(), CircuitState::Open);
        assert!(!b.is_available());
        assert_eq!(b.admit().unwrap_err(), Rejection::Open);
    }

    #[test]
    fn test_success_resets_failure_count() {
        let b = breaker();
        fail_once(&b);
        fail_once(&b);
        b.admit().unwrap().succeed();
        assert_eq!(b.consecutive_failures(), 0);
        assert_eq!(b.snapshot().total_calls, 3);
        assert_eq!(b.snapshot().total_failures, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovery_admits_trial_then_closes() {
        let b = breaker();
        for _ in 0..5 {
            fail_once(&b);
        }
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(!b.is_available(), "must wait strictly past the timeout");

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(b.is_available());

        let ticket = b.admit().unwrap();
        assert!(ticket.is_trial());
        assert_eq!(b.state(), CircuitState::HalfOpen);
        ticket.succeed();
        assert_eq!(b.state(), CircuitState::HalfOpen);
        assert_eq!(b.snapshot().consecutive_successes_in_half_open, 1);

        b.admit().unwrap().succeed();
        assert_eq!(b.state(), CircuitState::Closed);
        assert_eq!(b.consecutive_failures(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_reopens_with_fresh_timestamp() {
        let b = breaker();
        for _ in 0..5 {
            fail_once(&b);
        }
        let first_opened = b.snapshot().opened_at.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;

        fail_once(&b);
        let snap = b.snapshot();
        assert_eq!(snap.state, CircuitState::Open);
        assert!(snap.opened_at.unwrap() > first_opened);
        assert!(!b.is_available());
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_admits_one_trial_at_a_time() {
        let b = breaker();
        for _ in 0..5 {
            fail_once(&b);
        }
        tokio::time::advance(Duration::from_secs(61)).await;

        let trial = b.admit().unwrap();
        assert_eq!(b.admit().unwrap_err(), Rejection::TrialInFlight);
        assert!(!b.is_available());

        // A cancelled trial frees its reservation without counting as a failure.
        drop(trial);
        assert_eq!(b.state(), CircuitState::HalfOpen);
        assert!(b.is_available());
        assert_eq!(b.snapshot().total_failures, 5);
        assert!(b.admit().is_ok());
    }

    #[test]
    fn test_stale_outcome_does_not_drive_new_epoch() {
        let b = breaker();
        let late = b.admit().unwrap();
        for _ in 0..5 {
            fail_once(&b);
        }
        assert_eq!(b.state(), CircuitState::Open);

        // Admitted while Closed; its success must not close the open circuit.
        late.succeed();
        assert_eq!(b.state(), CircuitState::Open);
        assert_eq!(b.snapshot().total_calls, 6);
    }

    #[test]
    fn test_dropped_ticket_in_closed_is_not_a_failure() {
        let b = breaker();
        drop(b.admit().unwrap());
        assert_eq!(b.consecutive_failures(), 0);
        assert_eq!(b.snapshot().total_calls, 0);
    }

    #[test]
    fn test_format_ago() {
        assert_eq!(format_ago(Instant::now()), "0s ago");
    }
}
