//! Request collapsing subsystem.
//!
//! # Data Flow
//! ```text
//! request(key)                                   (many callers, any task)
//!     → batcher.rs enqueue (first request arms the window timer)
//!     → window elapses or max_batch_size reached
//!     → snapshot-and-clear pending set
//!     → BatchLoader::load(keys)                  (one protected upstream call)
//!     → demultiplex by id or position
//!     → resolve each caller's oneshot slot
//! ```

pub mod batcher;
pub mod types;

pub use batcher::Collapser;
pub use types::{BatchLoader, BatchRequest};
