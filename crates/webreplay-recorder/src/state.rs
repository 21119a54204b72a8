use serde::Serialize;

/// Recorder lifecycle.
///
/// `Stopped` behaves like `Idle` for reuse; it only tells callers that a
/// recording was produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecorderState {
    #[default]
    Idle,
    Recording,
    Paused,
    Stopped,
}

impl RecorderState {
    /// Whether events are currently turned into steps.
    pub fn is_recording(&self) -> bool {
        matches!(self, RecorderState::Recording)
    }

    /// Idle or Stopped.
    pub fn is_inactive(&self) -> bool {
        matches!(self, RecorderState::Idle | RecorderState::Stopped)
    }
}

impl std::fmt::Display for RecorderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecorderState::Idle => write!(f, "idle"),
            RecorderState::Recording => write!(f, "recording"),
            RecorderState::Paused => write!(f, "paused"),
            RecorderState::Stopped => write!(f, "stopped"),
        }
    }
}
