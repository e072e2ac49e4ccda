//! Concurrency bulkhead.
//!
//! # Responsibilities
//! - Track in-flight executions of one command
//! - Enforce the command's max concurrency; excess calls are rejected, not queued

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug)]
pub struct Bulkhead {
    /// Maximum concurrent executions; `None` only counts.
    max_concurrent: Option<usize>,
    in_flight: AtomicUsize,
}

impl Bulkhead {
    pub fn new(max_concurrent: Option<usize>) -> Self {
        Self {
            max_concurrent,
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn limit(&self) -> Option<usize> {
        self.max_concurrent
    }

    /// Number of executions currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Try to take a slot. The returned guard gives it back on drop.
    pub fn try_acquire(self: &Arc<Self>) -> Option<BulkheadGuard> {
        let mut prev = self.in_flight.load(Ordering::Relaxed);
        loop {
            if self.max_concurrent.is_some_and(|max| prev >= max) {
                return None;
            }
            match self.in_flight.compare_exchange_weak(
                prev,
                prev + 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(x) => prev = x,
            }
        }
        Some(BulkheadGuard {
            bulkhead: Arc::clone(self),
        })
    }
}

/// A RAII guard holding one bulkhead slot.
#[derive(Debug)]
pub struct BulkheadGuard {
    bulkhead: Arc<Bulkhead>,
}

impl Drop for BulkheadGuard {
    fn drop(&mut self) {
        self.bulkhead.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}
