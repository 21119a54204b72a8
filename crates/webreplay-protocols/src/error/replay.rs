//! Replay errors.

use thiserror::Error;

use super::{PageError, StoreError};

/// Errors surfaced by the engine and executor.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// Selector, instruction or variable absent.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Per-step, per-action or run-level deadline.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// A run or perform call is already in flight.
    #[error("Busy: {0}")]
    Busy(String),

    #[error("Cancelled")]
    Cancelled,

    /// Unknown action kind, malformed parameters, or a disabled capability.
    #[error("Invalid step: {0}")]
    InvalidStep(String),

    /// Element present but the action was rejected.
    #[error("Action failed: {0}")]
    ActionFailed(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ReplayError {
    /// Stable snake_case label used in logs and responses.
    pub fn kind(&self) -> &'static str {
        match self {
            ReplayError::NotFound(_) => "not_found",
            ReplayError::Timeout(_) => "timeout",
            ReplayError::Busy(_) => "busy",
            ReplayError::Cancelled => "cancelled",
            ReplayError::InvalidStep(_) => "invalid_step",
            ReplayError::ActionFailed(_) => "action_failed",
            ReplayError::Store(_) => "store",
        }
    }

    /// Whether the retry policy may attempt the action again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReplayError::NotFound(_) | ReplayError::ActionFailed(_))
    }
}

impl From<PageError> for ReplayError {
    fn from(err: PageError) -> Self {
        match err {
            PageError::ElementNotFound(what) => ReplayError::NotFound(what),
            PageError::Timeout(ms) => ReplayError::Timeout(format!("page operation after {ms}ms")),
            PageError::Unsupported(what) => ReplayError::InvalidStep(format!("unsupported: {what}")),
            other => ReplayError::ActionFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels() {
        assert_eq!(ReplayError::NotFound("x".into()).kind(), "not_found");
        assert_eq!(ReplayError::Timeout("x".into()).kind(), "timeout");
        assert_eq!(ReplayError::Cancelled.kind(), "cancelled");
        assert_eq!(ReplayError::InvalidStep("x".into()).kind(), "invalid_step");
    }

    #[test]
    fn test_retry_policy() {
        assert!(ReplayError::NotFound("x".into()).is_retryable());
        assert!(ReplayError::ActionFailed("disabled".into()).is_retryable());
        assert!(!ReplayError::Timeout("x".into()).is_retryable());
        assert!(!ReplayError::Cancelled.is_retryable());
        assert!(!ReplayError::InvalidStep("x".into()).is_retryable());
        assert!(!ReplayError::Busy("x".into()).is_retryable());
    }

    #[test]
    fn test_from_page_error() {
        let err: ReplayError = PageError::ElementNotFound("#a".into()).into();
        assert!(matches!(err, ReplayError::NotFound(_)));

        let err: ReplayError = PageError::Detached("h1".into()).into();
        assert!(matches!(err, ReplayError::ActionFailed(_)));
        assert!(err.to_string().contains("no longer attached"));

        let err: ReplayError = PageError::Timeout(100).into();
        assert!(matches!(err, ReplayError::Timeout(_)));

        let err: ReplayError = PageError::Unsupported("scripts".into()).into();
        assert_eq!(err.kind(), "invalid_step");
    }

    #[test]
    fn test_from_store_error() {
        let err: ReplayError = StoreError::NotFound("i1".into()).into();
        assert_eq!(err.kind(), "store");
        assert!(err.to_string().contains("i1"));
    }
}
