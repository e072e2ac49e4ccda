//! Retry logic.
//!
//! # Responsibilities
//! - Re-run an operation on retryable transport errors
//! - Space attempts with exponential backoff + jitter
//!
//! # Design Decisions
//! - Only GETs flow through here, so every call is idempotent
//! - Connection errors and 5xx are retryable; 4xx and decode errors are not
//! - The whole loop runs inside the command timeout, so retries never extend the budget

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::client::TransportResult;
use crate::config::RetryConfig;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following `attempt` (1-based), with up to 10% jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponential = 2u64.saturating_pow(attempt - 1);
        let capped = self.base_delay_ms.saturating_mul(exponential).min(self.max_delay_ms);

        let jitter_range = capped / 10;
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(0..jitter_range)
        } else {
            0
        };

        Duration::from_millis(capped + jitter)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or attempts run out.
    pub async fn run<T, Op, Fut>(&self, command: &str, mut op: Op) -> TransportResult<T>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = TransportResult<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts && e.is_retryable() => {
                    let delay = self.backoff(attempt);
                    tracing::info!(
                        command = %command,
                        attempt = attempt,
                        delay = ?delay,
                        error = %e,
                        "Retrying upstream call"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
