//! Protected command execution.
//!
//! # Responsibilities
//! - Gate each call through the circuit breaker and bulkhead
//! - Run the operation (with retries) inside the timeout budget
//! - Classify the outcome and serve the fallback on any failure
//! - Measure every call, successful or not
//!
//! # Data Flow
//! ```text
//! execute(op, fallback)
//!     → circuit_breaker.rs (admit / short-circuit)
//!     → bulkhead.rs (take slot / reject)
//!     → timeouts.rs (budget) → retries.rs (attempt loop) → op()
//!     → report outcome to breaker, release slot
//!     → value or fallback()
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::client::TransportResult;
use crate::config::CommandConfig;
use crate::observability::metrics;
use crate::resilience::bulkhead::Bulkhead;
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitParams, CircuitState};
use crate::resilience::retries::RetryPolicy;
use crate::resilience::timeouts::with_timeout;
use crate::resilience::types::{CallResult, CommandError, Outcome};

/// Cumulative outcome counters for one command.
#[derive(Debug, Default)]
struct CommandStats {
    successes: AtomicU64,
    failures: AtomicU64,
    timeouts: AtomicU64,
    short_circuited: AtomicU64,
    rejected: AtomicU64,
    fallbacks: AtomicU64,
}

impl CommandStats {
    fn record(&self, outcome: Outcome) {
        let counter = match outcome {
            Outcome::Success => &self.successes,
            Outcome::Failure => &self.failures,
            Outcome::Timeout => &self.timeouts,
            Outcome::ShortCircuited => &self.short_circuited,
            Outcome::Rejected => &self.rejected,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        if outcome != Outcome::Success {
            self.fallbacks.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Point-in-time view of a command, served by the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CommandSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub in_flight: usize,
    pub successes: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub short_circuited: u64,
    pub rejected: u64,
    pub fallbacks: u64,
}

/// A named, protected remote operation.
#[derive(Debug)]
pub struct Command {
    name: String,
    timeout: Duration,
    retry: RetryPolicy,
    circuit: CircuitBreaker,
    bulkhead: Arc<Bulkhead>,
    stats: CommandStats,
}

impl Command {
    pub fn new(name: impl Into<String>, config: &CommandConfig) -> Self {
        let name = name.into();
        Self {
            circuit: CircuitBreaker::new(name.clone(), CircuitParams::from(&config.circuit_breaker)),
            bulkhead: Arc::new(Bulkhead::new(config.max_concurrent_requests)),
            retry: RetryPolicy::from(&config.retry),
            timeout: config.timeout(),
            stats: CommandStats::default(),
            name,
        }
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.circuit.state()
    }

    pub fn snapshot(&self) -> CommandSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CommandSnapshot {
            name: self.name.clone(),
            state: self.circuit.state(),
            in_flight: self.bulkhead.in_flight(),
            successes: load(&self.stats.successes),
            failures: load(&self.stats.failures),
            timeouts: load(&self.stats.timeouts),
            short_circuited: load(&self.stats.short_circuited),
            rejected: load(&self.stats.rejected),
            fallbacks: load(&self.stats.fallbacks),
        }
    }

    /// Run `op` under protection, returning its value or `fallback()`.
    pub async fn execute<T, Op, Fut, Fb>(&self, op: Op, fallback: Fb) -> T
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = TransportResult<T>>,
        Fb: FnOnce() -> T,
    {
        self.run(op, fallback).await.into_inner()
    }

    /// Like `execute`, but reports whether the value came from the fallback.
    pub async fn run<T, Op, Fut, Fb>(&self, op: Op, fallback: Fb) -> CallResult<T>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = TransportResult<T>>,
        Fb: FnOnce() -> T,
    {
        let start = Instant::now();
        let result = self.protected(op).await;
        let elapsed = start.elapsed();

        let outcome = match &result {
            Ok(_) => Outcome::Success,
            Err(e) => e.outcome(),
        };
        self.stats.record(outcome);
        metrics::record_command(&self.name, outcome.as_str(), elapsed);

        match result {
            Ok(value) => {
                tracing::info!(
                    command = %self.name,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Spend time"
                );
                CallResult::Success(value)
            }
            Err(e) => {
                tracing::warn!(
                    command = %self.name,
                    outcome = outcome.as_str(),
                    error = %e,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Serving fallback"
                );
                CallResult::Fallback(fallback())
            }
        }
    }

    /// Spawn the execution and return immediately.
    ///
    /// Dropping the handle does not cancel the call; its outcome is still recorded.
    pub fn queue<T, Op, Fut, Fb>(self: &Arc<Self>, op: Op, fallback: Fb) -> JoinHandle<T>
    where
        T: Send + 'static,
        Op: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = TransportResult<T>> + Send + 'static,
        Fb: FnOnce() -> T + Send + 'static,
    {
        let command = Arc::clone(self);
        tokio::spawn(async move { command.execute(op, fallback).await })
    }

    async fn protected<T, Op, Fut>(&self, op: Op) -> Result<T, CommandError>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = TransportResult<T>>,
    {
        let permit = self.circuit.try_acquire().ok_or(CommandError::CircuitOpen)?;

        let Some(_slot) = self.bulkhead.try_acquire() else {
            permit.fail();
            return Err(CommandError::Rejected {
                max_concurrent: self.bulkhead.limit().unwrap_or_default(),
            });
        };

        let result = with_timeout(self.timeout, async {
            self.retry.run(&self.name, op).await.map_err(CommandError::from)
        })
        .await;

        match &result {
            Ok(_) => permit.succeed(),
            Err(_) => permit.fail(),
        }
        result
    }
}
