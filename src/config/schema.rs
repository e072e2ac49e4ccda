//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the consumer.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Sentinel user name returned when a user lookup falls back.
pub const DEFAULT_FALLBACK_USER_NAME: &str = "upstream call failed, circuit breaker engaged";

/// Root configuration for the consumer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ConsumerConfig {
    /// The provider service every remote call goes to.
    pub upstream: UpstreamConfig,

    /// Defaults applied to every protected command.
    pub command: CommandConfig,

    /// Per-command overrides, keyed by command name.
    pub commands: HashMap<String, CommandConfig>,

    /// Request collapsing for single-user lookups.
    pub collapser: CollapserConfig,

    /// Values returned when a command falls back.
    pub fallback: FallbackConfig,

    /// Inbound HTTP surface of the consumer binary.
    pub server: ServerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl ConsumerConfig {
    /// Resolve the effective settings for a named command.
    pub fn command_for(&self, name: &str) -> &CommandConfig {
        resolve_command(&self.command, &self.commands, name)
    }
}

/// The override registered for `name`, or the shared defaults.
pub fn resolve_command<'a>(
    defaults: &'a CommandConfig,
    overrides: &'a HashMap<String, CommandConfig>,
    name: &str,
) -> &'a CommandConfig {
    overrides.get(name).unwrap_or(defaults)
}

/// Upstream (provider) service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Logical service name, used in logs and metrics.
    pub service_name: String,

    /// Base URL the service name resolves to.
    pub base_url: String,

    /// TCP connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            service_name: "PROVIDER-SERVICE".to_string(),
            base_url: "http://127.0.0.1:8081".to_string(),
            connect_timeout_ms: 1000,
        }
    }
}

/// Settings for one protected command.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CommandConfig {
    /// Execution budget in milliseconds, covering every retry attempt.
    pub timeout_ms: u64,

    /// Maximum concurrent executions. Omit for no bulkhead.
    pub max_concurrent_requests: Option<usize>,

    /// Circuit breaker settings.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Retry settings.
    pub retry: RetryConfig,
}

impl CommandConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 1000,
            max_concurrent_requests: Some(10),
            circuit_breaker: CircuitBreakerConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// When false the circuit never short-circuits (counters are still kept).
    pub enabled: bool,

    /// Minimum requests in the rolling window before the circuit may trip.
    pub request_volume_threshold: u32,

    /// Failure percentage (1-100) at or above which the circuit trips.
    pub error_threshold_percentage: u32,

    /// Cool-down in milliseconds before a trial call is allowed.
    pub sleep_window_ms: u64,

    /// Length of the rolling statistics window in milliseconds.
    pub rolling_window_ms: u64,

    /// Number of buckets the rolling window is divided into.
    pub rolling_window_buckets: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            request_volume_threshold: 20,
            error_threshold_percentage: 50,
            sleep_window_ms: 5000,
            rolling_window_ms: 10_000,
            rolling_window_buckets: 10,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first (1 = no retries).
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 50,
            max_delay_ms: 500,
        }
    }
}

/// How batched results are routed back to waiting callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchBy {
    /// Match each result to its request by key (upstream order is not trusted).
    Id,
    /// Match the n-th result to the n-th requested key.
    Position,
}

/// Request collapser configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CollapserConfig {
    /// Route single lookups through the collapser.
    pub enabled: bool,

    /// Window in milliseconds, measured from the first request of a batch.
    pub timer_delay_ms: u64,

    /// Pending requests that force an immediate flush.
    pub max_batch_size: usize,

    /// Upper bound on how long a caller waits for its batched result.
    pub request_timeout_ms: u64,

    pub match_by: MatchBy,
}

impl Default for CollapserConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timer_delay_ms: 100,
            max_batch_size: 100,
            request_timeout_ms: 5000,
            match_by: MatchBy::Id,
        }
    }
}

/// Fallback values.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Returned by `hello` on failure.
    pub hello: String,

    /// User name given to synthesized users on failure.
    pub user_name: String,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            hello: "error".to_string(),
            user_name: DEFAULT_FALLBACK_USER_NAME.to_string(),
        }
    }
}

/// Consumer HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind_address: String,

    /// Total time allowed for an inbound request in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
