//! Command outcome and error definitions.

use std::time::Duration;

use thiserror::Error;

use crate::client::TransportError;

/// Why a protected command did not produce its real result.
///
/// Never returned to callers of a command; every variant is turned into a
/// fallback value.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("circuit open, call short-circuited")]
    CircuitOpen,

    #[error("rejected, {max_concurrent} executions already in flight")]
    Rejected { max_concurrent: usize },
}

impl CommandError {
    pub fn outcome(&self) -> Outcome {
        match self {
            CommandError::Transport(_) => Outcome::Failure,
            CommandError::Timeout(_) => Outcome::Timeout,
            CommandError::CircuitOpen => Outcome::ShortCircuited,
            CommandError::Rejected { .. } => Outcome::Rejected,
        }
    }
}

/// Classification of one command execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
    Timeout,
    ShortCircuited,
    Rejected,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
            Outcome::Timeout => "timeout",
            Outcome::ShortCircuited => "short_circuited",
            Outcome::Rejected => "rejected",
        }
    }
}

/// Value produced by a protected call.
///
/// Both variants carry a usable value of the same type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallResult<T> {
    /// The operation itself succeeded.
    Success(T),
    /// The fallback supplied the value without (or after failing to) reach the upstream.
    Fallback(T),
}

impl<T> CallResult<T> {
    pub fn into_inner(self) -> T {
        match self {
            CallResult::Success(value) | CallResult::Fallback(value) => value,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, CallResult::Fallback(_))
    }
}
