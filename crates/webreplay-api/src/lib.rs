//! # webreplay API
//!
//! Transport layer in front of the executor and the store.
//!
//! - [`Dispatcher`] maps `{ id?, action, payload }` requests onto store and
//!   executor calls and always answers with a [`Response`]
//! - [`Bridge`] serves a dispatcher over any `AsyncRead`/`AsyncWrite` pair,
//!   with line-delimited or native-messaging framing
//!
//! Supported actions: `list`, `get`, `save`, `delete`, `run`, `stop`,
//! `status`, `import`, `export`.

pub mod bridge;
pub mod dispatcher;
pub mod error;
pub mod message;

pub use bridge::{Bridge, Framing, MAX_FRAME_BYTES, read_frame, write_frame};
pub use dispatcher::{Dispatcher, InstructionSummary};
pub use error::ApiError;
pub use message::{ErrorBody, Request, Response};
