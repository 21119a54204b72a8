//! Transport error types.

use thiserror::Error;
use webreplay_protocols::{ReplayError, StoreError};

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed envelope or payload.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error(transparent)]
    Replay(#[from] ReplayError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A frame exceeded the size cap. The stream cannot be resynchronized.
    #[error("Frame of {0} bytes exceeds the limit")]
    FrameTooLarge(usize),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// Stable snake_case label carried in error responses.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) | ApiError::Serialization(_) => "invalid_request",
            ApiError::UnknownAction(_) => "unknown_action",
            ApiError::Replay(e) => e.kind(),
            ApiError::Store(StoreError::NotFound(_)) => "not_found",
            ApiError::Store(StoreError::UnsupportedVersion(_)) => "unsupported_version",
            ApiError::Store(_) => "store",
            ApiError::FrameTooLarge(_) => "frame_too_large",
            ApiError::Io(_) => "io",
        }
    }
}
