//! # webreplay Selectors
//!
//! Element tree snapshots and selector machinery:
//!
//! - [`ElementTree`] - arena snapshot of a page, built from HTML or by a host
//! - [`css`] / [`xpath`] - the query subsets used by generated selectors
//! - [`SelectorGenerator`] - ranked primary selector plus fallback chain
//! - [`resolve`] - evaluate any descriptor against a snapshot

pub mod css;
mod error;
pub mod generator;
pub mod resolve;
pub mod stability;
pub mod tree;
pub mod xpath;

pub use error::SelectorError;
pub use generator::{GeneratorOptions, SelectorGenerator};
pub use resolve::{resolve, resolve_unique};
pub use tree::{ElementTree, NodeId, TreeBuilder};
