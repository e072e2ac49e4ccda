//! Circuit breaker for upstream protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: upstream assumed down, calls short-circuit to the fallback
//! - Half-Open: one trial call decides whether the upstream recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: volume >= request_volume_threshold
//!                and error % >= error_threshold_percentage within the rolling window
//! Open → Half-Open: first call after sleep_window
//! Half-Open → Closed: trial call succeeds (window is reset)
//! Half-Open → Open: trial call fails (cool-down restarts)
//! ```
//!
//! # Design Decisions
//! - One breaker per named command, shared by all its callers
//! - State and rolling window sit behind a single mutex
//! - Admission is an RAII permit; a dropped trial permit frees the trial slot
//! - Outcomes of calls admitted while Closed that finish after a trip are ignored

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;
use crate::resilience::rolling::RollingWindow;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Tuning for one breaker, resolved from configuration.
#[derive(Debug, Clone)]
pub struct CircuitParams {
    pub enabled: bool,
    pub request_volume_threshold: u64,
    pub error_threshold_percentage: u32,
    pub sleep_window: Duration,
    pub rolling_window: Duration,
    pub rolling_window_buckets: u32,
}

impl From<&CircuitBreakerConfig> for CircuitParams {
    fn from(config: &CircuitBreakerConfig) -> Self {
        Self {
            enabled: config.enabled,
            request_volume_threshold: u64::from(config.request_volume_threshold),
            error_threshold_percentage: config.error_threshold_percentage,
            sleep_window: Duration::from_millis(config.sleep_window_ms),
            rolling_window: Duration::from_millis(config.rolling_window_ms),
            rolling_window_buckets: config.rolling_window_buckets,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Normal,
    Trial,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    window: RollingWindow,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    params: CircuitParams,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, params: CircuitParams) -> Self {
        let window = RollingWindow::new(params.rolling_window, params.rolling_window_buckets);
        Self {
            name: name.into(),
            params,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                window,
                opened_at: None,
                trial_in_flight: false,
            }),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Counts currently inside the rolling window.
    #[cfg(test)]
    fn health(&self) -> crate::resilience::rolling::HealthCounts {
        self.lock().window.counts(Instant::now())
    }

    /// Ask to start a call. `None` means short-circuit.
    pub fn try_acquire(&self) -> Option<CircuitPermit<'_>> {
        let mut inner = self.lock();

        let admission = match inner.state {
            CircuitState::Closed => Admission::Normal,

            CircuitState::Open => {
                let cooled_down = inner
                    .opened_at
                    .map_or(true, |t| t.elapsed() >= self.params.sleep_window);
                if !cooled_down {
                    return None;
                }
                self.transition(&mut inner, CircuitState::HalfOpen, "cooldown_expired");
                inner.trial_in_flight = true;
                Admission::Trial
            }

            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    return None;
                }
                inner.trial_in_flight = true;
                Admission::Trial
            }
        };

        Some(CircuitPermit {
            breaker: self,
            admission,
            settled: false,
        })
    }

    fn settle(&self, admission: Admission, success: bool) {
        let mut inner = self.lock();
        let now = Instant::now();

        match admission {
            Admission::Trial => {
                inner.trial_in_flight = false;
                if inner.state != CircuitState::HalfOpen {
                    return;
                }
                if success {
                    inner.window.reset();
                    inner.opened_at = None;
                    self.transition(&mut inner, CircuitState::Closed, "trial_succeeded");
                } else {
                    inner.opened_at = Some(now);
                    self.transition(&mut inner, CircuitState::Open, "trial_failed");
                }
            }

            Admission::Normal => {
                if inner.state != CircuitState::Closed {
                    return;
                }
                if success {
                    inner.window.record_success(now);
                    return;
                }

                inner.window.record_failure(now);
                let counts = inner.window.counts(now);
                if self.params.enabled
                    && counts.total >= self.params.request_volume_threshold
                    && counts.error_percentage() >= self.params.error_threshold_percentage
                {
                    inner.opened_at = Some(now);
                    tracing::warn!(
                        command = %self.name,
                        requests = counts.total,
                        failures = counts.failures,
                        error_percentage = counts.error_percentage(),
                        "Failure threshold breached"
                    );
                    self.transition(&mut inner, CircuitState::Open, "failure_threshold_exceeded");
                }
            }
        }
    }

    fn release_trial(&self) {
        self.lock().trial_in_flight = false;
        tracing::debug!(command = %self.name, "Trial call abandoned, slot released");
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState, reason: &'static str) {
        let from = inner.state;
        inner.state = to;

        tracing::info!(
            event = "circuit_transition",
            command = %self.name,
            from = ?from,
            to = ?to,
            reason = reason,
        );
        metrics::record_circuit_transition(&self.name, to);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Admission to run one call. Report the outcome with `succeed` or `fail`.
#[derive(Debug)]
pub struct CircuitPermit<'a> {
    breaker: &'a CircuitBreaker,
    admission: Admission,
    settled: bool,
}

impl CircuitPermit<'_> {
    pub fn is_trial(&self) -> bool {
        self.admission == Admission::Trial
    }

    pub fn succeed(mut self) {
        self.settled = true;
        self.breaker.settle(self.admission, true);
    }

    pub fn fail(mut self) {
        self.settled = true;
        self.breaker.settle(self.admission, false);
    }
}

impl Drop for CircuitPermit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.admission == Admission::Trial {
            self.breaker.release_trial();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::rolling::HealthCounts;

    fn params() -> CircuitParams {
        CircuitParams {
            enabled: true,
            request_volume_threshold: 3,
            error_threshold_percentage: 50,
            sleep_window: Duration::from_secs(5),
            rolling_window: Duration::from_secs(10),
            rolling_window_buckets: 10,
        }
    }

    fn fail_once(cb: &CircuitBreaker) {
        cb.try_acquire().expect("admitted").fail();
    }

    #[tokio::test(start_paused = true)]
    async fn test_trips_after_threshold() {
        let cb = CircuitBreaker::new("test", params());

        fail_once(&cb);
        fail_once(&cb);
        assert_eq!(cb.state(), CircuitState::Closed, "volume threshold not reached yet");

        fail_once(&cb);
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(cb.try_acquire().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stays_closed_below_error_percentage() {
        let cb = CircuitBreaker::new("test", params());

        for _ in 0..3 {
            cb.try_acquire().unwrap().succeed();
        }
        fail_once(&cb);
        fail_once(&cb);
        // 2 of 5 failed = 40%
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.health(), HealthCounts { total: 5, failures: 2 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_trial_after_cooldown() {
        let cb = CircuitBreaker::new("test", params());
        for _ in 0..3 {
            fail_once(&cb);
        }

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(cb.try_acquire().is_none(), "still cooling down");

        tokio::time::advance(Duration::from_secs(1)).await;
        let trial = cb.try_acquire().expect("trial admitted");
        assert!(trial.is_trial());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.try_acquire().is_none(), "only one trial at a time");

        trial.succeed();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.health().total, 0, "window reset on close");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_trial_reopens() {
        let cb = CircuitBreaker::new("test", params());
        for _ in 0..3 {
            fail_once(&cb);
        }

        tokio::time::advance(Duration::from_secs(5)).await;
        cb.try_acquire().unwrap().fail();
        assert_eq!(cb.state(), CircuitState::Open);

        // Cool-down restarted at the failed trial.
        tokio::time::advance(Duration::from_secs(3)).await;
        assert!(cb.try_acquire().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_trial_frees_slot() {
        let cb = CircuitBreaker::new("test", params());
        for _ in 0..3 {
            fail_once(&cb);
        }
        tokio::time::advance(Duration::from_secs(5)).await;

        drop(cb.try_acquire().unwrap());
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        let retry = cb.try_acquire().expect("slot released");
        assert!(retry.is_trial());
        retry.succeed();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_never_trips() {
        let mut p = params();
        p.enabled = false;
        let cb = CircuitBreaker::new("test", p);

        for _ in 0..10 {
            fail_once(&cb);
        }
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.health().failures, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_straggler_outcome_ignored_while_open() {
        let cb = CircuitBreaker::new("test", params());
        let straggler = cb.try_acquire().unwrap();
        for _ in 0..3 {
            fail_once(&cb);
        }
        assert_eq!(cb.state(), CircuitState::Open);

        straggler.succeed();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_outside_window_do_not_count() {
        let cb = CircuitBreaker::new("test", params());
        fail_once(&cb);
        fail_once(&cb);

        tokio::time::advance(Duration::from_secs(11)).await;
        fail_once(&cb);
        assert_eq!(cb.state(), CircuitState::Closed);
    }
}
