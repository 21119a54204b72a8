//! Host page errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PageError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Element is no longer attached: {0}")]
    Detached(String),

    #[error("Script evaluation failed: {0}")]
    Script(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Page operation timed out after {0}ms")]
    Timeout(u64),

    #[error("Unsupported by this host: {0}")]
    Unsupported(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_error_messages() {
        let err = PageError::ElementNotFound("#missing".to_string());
        assert!(err.to_string().contains("Element not found"));
        assert!(err.to_string().contains("#missing"));

        let err = PageError::Timeout(30000);
        assert!(err.to_string().contains("30000ms"));

        let err = PageError::Unsupported("screenshot".to_string());
        assert!(err.to_string().contains("Unsupported"));
    }
}
