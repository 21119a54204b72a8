//! Error types for the webreplay protocol layer.

mod page;
mod replay;
mod store;

pub use page::*;
pub use replay::*;
pub use store::*;
