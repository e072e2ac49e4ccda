//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ConsumerConfig (validated, immutable)
//!     → shared by value or Arc with the client, registry and services
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Per-command sections replace the `[command]` defaults wholesale

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    CircuitBreakerConfig, CollapserConfig, CommandConfig, ConsumerConfig, FallbackConfig,
    LogFormat, MatchBy, ObservabilityConfig, RetryConfig, ServerConfig, UpstreamConfig,
};
