//! # webreplay Recorder
//!
//! Converts raw interaction events captured on a page into an ordered list of
//! [`Step`](webreplay_protocols::Step)s.
//!
//! - [`Recorder`] - synchronous state machine with explicit timers
//! - [`RecordingSession`] - async driver that owns debounce timing
//! - [`RecorderEvent`] - the events hosts feed in

mod error;
mod event;
mod recorder;
mod session;
mod state;

pub use error::RecorderError;
pub use event::{EventKind, RecorderEvent};
pub use recorder::Recorder;
pub use session::{RecordingSession, SessionHandle};
pub use state::RecorderState;
