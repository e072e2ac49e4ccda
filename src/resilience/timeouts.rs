//! Timeout enforcement.
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; the inner future is dropped on expiry
//! - Timeout errors are distinct from transport errors

use std::future::Future;
use std::time::Duration;

use crate::resilience::types::CommandError;

/// Run `fut` within `budget`, mapping expiry to `CommandError::Timeout`.
pub async fn with_timeout<T, F>(budget: Duration, fut: F) -> Result<T, CommandError>
where
    F: Future<Output = Result<T, CommandError>>,
{
    match tokio::time::timeout(budget, fut).await {
        Ok(result) => result,
        Err(_) => Err(CommandError::Timeout(budget)),
    }
}
