//! Recorder errors.

use thiserror::Error;
use webreplay_selectors::SelectorError;

#[derive(Debug, Error)]
pub enum RecorderError {
    /// Selector generation failed for the event target.
    #[error("Selector generation failed: {0}")]
    Selector(#[from] SelectorError),

    /// The recording session task is gone.
    #[error("Recording session closed")]
    SessionClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_error_is_wrapped() {
        let err: RecorderError = SelectorError::DetachedNode(3).into();
        assert!(err.to_string().contains("Selector generation failed"));
        assert!(err.to_string().contains('3'));
    }

    #[test]
    fn test_session_closed_display() {
        assert_eq!(RecorderError::SessionClosed.to_string(), "Recording session closed");
    }
}
