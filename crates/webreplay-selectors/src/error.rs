//! Selector errors.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectorError {
    #[error("Invalid CSS selector '{selector}': {message}")]
    InvalidCss { selector: String, message: String },

    #[error("Invalid XPath '{path}': {message}")]
    InvalidXPath { path: String, message: String },

    #[error("Node is not attached to the tree: {0}")]
    DetachedNode(usize),

    #[error("Malformed descriptor: {0}")]
    MalformedDescriptor(String),
}
