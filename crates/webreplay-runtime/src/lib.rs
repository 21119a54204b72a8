//! # webreplay Runtime
//!
//! Replays instructions against a [`PageHandle`](webreplay_protocols::PageHandle).
//!
//! - [`ActionEngine`] - performs one step: resolution through the fallback
//!   chain, the action itself, waits and bounded retries
//! - [`InstructionExecutor`] - drives a whole instruction with per-step and
//!   run-level deadlines, stop requests and execution logging
//! - [`SnapshotPage`] - in-memory page over an element tree snapshot

mod engine;
mod engine_actions;
mod engine_waits;
mod executor;
mod resolver;
pub mod retry;
mod snapshot_page;
pub mod substitution;
mod wait;

pub use engine::{ActionEngine, ActionOutput};
pub use executor::InstructionExecutor;
pub use retry::{Retried, with_retry};
pub use snapshot_page::{DispatchedEvent, OFFSCREEN_ATTR, SnapshotPage};
pub use substitution::{substitute, substitute_step};
