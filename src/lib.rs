//! Resilient consumer of a remote user/greeting provider.
//!
//! Every outbound call runs through a named [`resilience::Command`]
//! (circuit breaker, bulkhead, timeout, retries) and degrades to a fallback
//! value instead of failing. Single-user lookups can be collapsed into
//! batched `find_all` calls by [`collapser::Collapser`].

pub mod client;
pub mod collapser;
pub mod config;
pub mod http;
pub mod observability;
pub mod resilience;
pub mod service;

pub use config::ConsumerConfig;
pub use http::ConsumerServer;
pub use service::ConsumerServices;
