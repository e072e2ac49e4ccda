//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Service call
//!     → registry.rs (look up the named command)
//!     → command.rs
//!         → circuit_breaker.rs (admit or short-circuit, rolling.rs tracks failure rate)
//!         → bulkhead.rs (bounded concurrency)
//!         → timeouts.rs (one budget per call)
//!         → retries.rs (retryable transport errors, backoff + jitter)
//!     → value, or the caller's fallback
//! ```
//!
//! # Design Decisions
//! - Nothing fails past a command: every error becomes the fallback value
//! - Circuit state is per command name and shared by all callers
//! - Timeouts are non-negotiable; every upstream call has a deadline

pub mod bulkhead;
pub mod circuit_breaker;
pub mod command;
pub mod registry;
pub mod retries;
pub mod rolling;
pub mod timeouts;
pub mod types;

pub use circuit_breaker::CircuitState;
pub use command::{Command, CommandSnapshot};
pub use registry::CommandRegistry;
pub use types::{CallResult, CommandError, Outcome};
