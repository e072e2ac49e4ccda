//! HTTP surface of the consumer.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, trace + timeout layers)
//!     → handlers.rs (extract path/query, call a service)
//!     → service value or fallback, serialized as text or JSON
//! ```

pub mod handlers;
pub mod server;

pub use server::ConsumerServer;
