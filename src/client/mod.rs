//! Remote client subsystem.
//!
//! # Data Flow
//! ```text
//! Service call
//!     → remote.rs (join path onto upstream base URL, GET, decode)
//!     → Ok(T) or TransportError (types.rs)
//!     → handed back to the command wrapper for classification
//! ```

pub mod remote;
pub mod types;

pub use remote::RemoteClient;
pub use types::{TransportError, TransportResult};
