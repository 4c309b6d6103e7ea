//! Error taxonomy of the engine.
//!
//! Only `ValidationError` and `NoDataError` ever reach a caller.
//! `ClassifierUnavailable` is produced by the primary adapter and absorbed
//! by the orchestrator's fallback path.

use thiserror::Error;

/// Input rejected before classification. No decision is produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("journal text is empty")]
    Empty,
    #[error("journal text is too long ({len} chars, max {max})")]
    TooLong { len: usize, max: usize },
}

/// The primary classifier could not produce a usable answer.
///
/// `reason` is for logs only; callers must not branch on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("primary classifier unavailable: {reason}")]
pub struct ClassifierUnavailable {
    pub reason: String,
}

impl ClassifierUnavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// A dominant label was requested from a window without any decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("insufficient data: no mood decisions in window")]
pub struct NoDataError;
