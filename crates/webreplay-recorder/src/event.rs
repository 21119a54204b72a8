//! Interaction events fed to the recorder.
//!
//! Targets are [`NodeId`]s of the element tree snapshot handed to
//! [`Recorder::handle`](crate::Recorder::handle) together with the event.

use webreplay_protocols::{ClickButton, FileMeta, Modifiers};
use webreplay_selectors::NodeId;

/// A timestamped interaction event.
#[derive(Debug, Clone, PartialEq)]
pub struct RecorderEvent {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Click {
        target: NodeId,
        button: ClickButton,
    },
    /// Right-click, reported by the host's context-menu event.
    ContextMenu { target: NodeId },
    /// Field value after an `input` event.
    Input { target: NodeId, value: String },
    /// Focus moved; `None` when it left every element.
    Focus { target: Option<NodeId> },
    /// `change` event; only `<select>` targets are recorded.
    Change { target: NodeId, value: String },
    KeyDown {
        /// Focused element, if any.
        target: Option<NodeId>,
        key: String,
        modifiers: Modifiers,
    },
    Submit { form: NodeId },
    /// Scroll position after a scroll event. `None` targets the document.
    Scroll {
        target: Option<NodeId>,
        x: f64,
        y: f64,
    },
    FileChange { target: NodeId, files: Vec<FileMeta> },
}

impl RecorderEvent {
    pub fn new(timestamp: i64, kind: EventKind) -> Self {
        Self { timestamp, kind }
    }

    pub fn click(timestamp: i64, target: NodeId) -> Self {
        Self::new(
            timestamp,
            EventKind::Click {
                target,
                button: ClickButton::Left,
            },
        )
    }

    pub fn context_menu(timestamp: i64, target: NodeId) -> Self {
        Self::new(timestamp, EventKind::ContextMenu { target })
    }

    pub fn input(timestamp: i64, target: NodeId, value: impl Into<String>) -> Self {
        Self::new(
            timestamp,
            EventKind::Input {
                target,
                value: value.into(),
            },
        )
    }

    pub fn focus(timestamp: i64, target: Option<NodeId>) -> Self {
        Self::new(timestamp, EventKind::Focus { target })
    }

    pub fn change(timestamp: i64, target: NodeId, value: impl Into<String>) -> Self {
        Self::new(
            timestamp,
            EventKind::Change {
                target,
                value: value.into(),
            },
        )
    }

    pub fn key_down(
        timestamp: i64,
        target: Option<NodeId>,
        key: impl Into<String>,
        modifiers: Modifiers,
    ) -> Self {
        Self::new(
            timestamp,
            EventKind::KeyDown {
                target,
                key: key.into(),
                modifiers,
            },
        )
    }

    pub fn submit(timestamp: i64, form: NodeId) -> Self {
        Self::new(timestamp, EventKind::Submit { form })
    }

    pub fn scroll(timestamp: i64, target: Option<NodeId>, x: f64, y: f64) -> Self {
        Self::new(timestamp, EventKind::Scroll { target, x, y })
    }

    pub fn file_change(timestamp: i64, target: NodeId, files: Vec<FileMeta>) -> Self {
        Self::new(timestamp, EventKind::FileChange { target, files })
    }

    /// Short event name for logs.
    pub fn name(&self) -> &'static str {
        match self.kind {
            EventKind::Click { .. } => "click",
            EventKind::ContextMenu { .. } => "context_menu",
            EventKind::Input { .. } => "input",
            EventKind::Focus { .. } => "focus",
            EventKind::Change { .. } => "change",
            EventKind::KeyDown { .. } => "key_down",
            EventKind::Submit { .. } => "submit",
            EventKind::Scroll { .. } => "scroll",
            EventKind::FileChange { .. } => "file_change",
        }
    }
}
