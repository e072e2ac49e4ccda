//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and that the
//! upstream URL is usable. Every problem is reported, not just the first.

use std::fmt;
use std::net::SocketAddr;

use tracing_subscriber::filter::LevelFilter;
use url::Url;

use crate::config::schema::{CommandConfig, ConsumerConfig};
use crate::service::user::FIND_ALL_COMMAND;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ConsumerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match Url::parse(&config.upstream.base_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::new(
            "upstream.base_url",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(
            "upstream.base_url",
            format!("invalid URL: {}", e),
        )),
    }
    if config.upstream.service_name.trim().is_empty() {
        errors.push(ValidationError::new("upstream.service_name", "must not be empty"));
    }

    validate_command("command", &config.command, &mut errors);
    for (name, command) in &config.commands {
        validate_command(&format!("commands.{}", name), command, &mut errors);
    }

    let collapser = &config.collapser;
    if collapser.timer_delay_ms == 0 {
        errors.push(ValidationError::new("collapser.timer_delay_ms", "must be greater than 0"));
    }
    if collapser.max_batch_size == 0 {
        errors.push(ValidationError::new("collapser.max_batch_size", "must be greater than 0"));
    }
    let batch_budget = collapser
        .timer_delay_ms
        .saturating_add(config.command_for(FIND_ALL_COMMAND).timeout_ms);
    if collapser.request_timeout_ms <= batch_budget {
        errors.push(ValidationError::new(
            "collapser.request_timeout_ms",
            format!(
                "must be longer than collapser.timer_delay_ms plus the {} timeout ({}ms)",
                FIND_ALL_COMMAND, batch_budget
            ),
        ));
    }

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new("server.bind_address", "not a socket address"));
    }

    let observability = &config.observability;
    if observability.log_level.parse::<LevelFilter>().is_err() {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level '{}'", observability.log_level),
        ));
    }
    if observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new("observability.metrics_address", "not a socket address"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_command(prefix: &str, command: &CommandConfig, errors: &mut Vec<ValidationError>) {
    if command.timeout_ms == 0 {
        errors.push(ValidationError::new(format!("{prefix}.timeout_ms"), "must be greater than 0"));
    }
    if command.max_concurrent_requests == Some(0) {
        errors.push(ValidationError::new(
            format!("{prefix}.max_concurrent_requests"),
            "must be greater than 0 (omit it to disable the bulkhead)",
        ));
    }

    let cb = &command.circuit_breaker;
    if !(1..=100).contains(&cb.error_threshold_percentage) {
        errors.push(ValidationError::new(
            format!("{prefix}.circuit_breaker.error_threshold_percentage"),
            "must be between 1 and 100",
        ));
    }
    if cb.sleep_window_ms == 0 {
        errors.push(ValidationError::new(
            format!("{prefix}.circuit_breaker.sleep_window_ms"),
            "must be greater than 0",
        ));
    }
    if cb.rolling_window_buckets == 0 {
        errors.push(ValidationError::new(
            format!("{prefix}.circuit_breaker.rolling_window_buckets"),
            "must be greater than 0",
        ));
    } else if cb.rolling_window_ms % u64::from(cb.rolling_window_buckets) != 0 {
        errors.push(ValidationError::new(
            format!("{prefix}.circuit_breaker.rolling_window_ms"),
            "must be evenly divisible by rolling_window_buckets",
        ));
    }
    if cb.rolling_window_ms == 0 {
        errors.push(ValidationError::new(
            format!("{prefix}.circuit_breaker.rolling_window_ms"),
            "must be greater than 0",
        ));
    }

    if command.retry.max_attempts == 0 {
        errors.push(ValidationError::new(format!("{prefix}.retry.max_attempts"), "must be at least 1"));
    }
    if command.retry.base_delay_ms > command.retry.max_delay_ms {
        errors.push(ValidationError::new(
            format!("{prefix}.retry.base_delay_ms"),
            "must not exceed retry.max_delay_ms",
        ));
    }
}
