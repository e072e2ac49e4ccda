//! Metrics collection and exposition.
//!
//! # Metrics
//! - `consumer_command_total` (counter): executions by command, outcome
//! - `consumer_command_duration_seconds` (histogram): latency by command, outcome
//! - `consumer_circuit_transitions_total` (counter): transitions by command, target state
//! - `consumer_collapser_batch_size` (histogram): requests per flushed batch
//!
//! Recording goes through the `metrics` facade and is a no-op until a
//! recorder is installed, so library users and tests pay nothing.

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::resilience::circuit_breaker::CircuitState;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_command(command: &str, outcome: &'static str, elapsed: Duration) {
    ::metrics::counter!(
        "consumer_command_total",
        "command" => command.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    ::metrics::histogram!(
        "consumer_command_duration_seconds",
        "command" => command.to_string(),
        "outcome" => outcome
    )
    .record(elapsed.as_secs_f64());
}

pub fn record_circuit_transition(command: &str, to: CircuitState) {
    let to = match to {
        CircuitState::Closed => "closed",
        CircuitState::Open => "open",
        CircuitState::HalfOpen => "half_open",
    };
    ::metrics::counter!(
        "consumer_circuit_transitions_total",
        "command" => command.to_string(),
        "to" => to
    )
    .increment(1);
}

pub fn record_batch(collapser: &str, size: usize) {
    ::metrics::histogram!(
        "consumer_collapser_batch_size",
        "collapser" => collapser.to_string()
    )
    .record(size as f64);
}
