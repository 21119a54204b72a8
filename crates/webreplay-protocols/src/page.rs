//! Host page abstraction.
//!
//! The engine never touches a browser directly. Everything it needs from the
//! host goes through [`PageHandle`]: element lookup, state inspection, event
//! dispatch, navigation and load/activity signals. Script evaluation is a
//! separate method so hosts and callers can gate it independently.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PageError;
use crate::selector::SelectorDescriptor;

/// Opaque reference to an element inside a host page.
///
/// Handles are only meaningful to the host that issued them and only for the
/// duration of one action attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle {
    pub id: String,
}

impl ElementHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Layout box in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// `<option>` of a select element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionInfo {
    pub value: String,
    pub text: String,
}

/// Snapshot of an element's interactive state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementState {
    /// Lowercase tag name.
    pub tag: String,
    /// Lowercase `type` attribute for inputs.
    pub input_type: Option<String>,
    /// Has a non-empty layout box and is not hidden by computed style.
    pub visible: bool,
    pub enabled: bool,
    /// Current form value, if the element has one.
    pub value: Option<String>,
    pub text: String,
    /// Options of a select element.
    pub options: Vec<OptionInfo>,
    pub rect: Option<Rect>,
}

impl ElementState {
    /// Whether the element accepts typed text.
    pub fn is_text_field(&self) -> bool {
        match self.tag.as_str() {
            "textarea" => true,
            "input" => !matches!(
                self.input_type.as_deref(),
                Some(
                    "checkbox" | "radio" | "file" | "submit" | "button" | "reset" | "image"
                        | "hidden" | "range" | "color"
                )
            ),
            _ => false,
        }
    }
}

/// Modifier keys held during a key event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

/// Mouse button for pointer events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
}

/// A primitive interaction dispatched to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventSpec {
    /// Full pointer sequence: move, press, release, click.
    Click { button: MouseButton, click_count: u32 },
    ContextMenu,
    /// Pointer enter and over.
    Hover,
    Focus,
    Blur,
    /// Empty the field's value.
    ClearValue,
    /// Insert text at the caret, as typing would.
    InsertText { text: String },
    /// Replace the field's value in one operation.
    SetValue { value: String },
    Input,
    Change,
    KeyDown { key: String, modifiers: Modifiers },
    KeyUp { key: String, modifiers: Modifiers },
    ScrollIntoView,
    /// Scroll the element, or the document when no element is given.
    ScrollTo { x: f64, y: f64, smooth: bool },
    SelectOption { value: String },
    /// Attach local files to a file input.
    SetFiles { paths: Vec<String> },
}

impl EventSpec {
    pub fn name(&self) -> &'static str {
        match self {
            EventSpec::Click { .. } => "click",
            EventSpec::ContextMenu => "contextmenu",
            EventSpec::Hover => "hover",
            EventSpec::Focus => "focus",
            EventSpec::Blur => "blur",
            EventSpec::ClearValue => "clear_value",
            EventSpec::InsertText { .. } => "insert_text",
            EventSpec::SetValue { .. } => "set_value",
            EventSpec::Input => "input",
            EventSpec::Change => "change",
            EventSpec::KeyDown { .. } => "keydown",
            EventSpec::KeyUp { .. } => "keyup",
            EventSpec::ScrollIntoView => "scroll_into_view",
            EventSpec::ScrollTo { .. } => "scroll_to",
            EventSpec::SelectOption { .. } => "select_option",
            EventSpec::SetFiles { .. } => "set_files",
        }
    }
}

/// Page activity counters used by network-idle and DOM-stable waits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageActivity {
    pub in_flight_requests: u32,
    /// Monotonic count of tree mutations observed so far.
    pub mutation_count: u64,
}

/// Abstract handle to one live page.
#[async_trait]
pub trait PageHandle: Send + Sync {
    /// Locate the unique element a descriptor designates, if any.
    async fn query_element(
        &self,
        descriptor: &SelectorDescriptor,
    ) -> Result<Option<ElementHandle>, PageError>;

    async fn element_state(&self, element: &ElementHandle) -> Result<ElementState, PageError>;

    /// Dispatch an interaction to `element`, or to the page when `None`.
    async fn dispatch_event(
        &self,
        element: Option<&ElementHandle>,
        event: EventSpec,
    ) -> Result<(), PageError>;

    /// Read a DOM property such as `textContent`, `value` or `href`.
    async fn read_property(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, PageError>;

    async fn read_attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, PageError>;

    /// Evaluate an arbitrary expression in the page context.
    ///
    /// This is the only path for user-supplied code. Hosts that cannot run
    /// scripts return [`PageError::Unsupported`].
    async fn evaluate_script(&self, expression: &str) -> Result<serde_json::Value, PageError>;

    async fn navigate(&self, url: &str) -> Result<(), PageError>;

    async fn wait_for_load(&self, timeout: Duration) -> Result<(), PageError>;

    async fn current_url(&self) -> Result<String, PageError>;

    async fn activity(&self) -> Result<PageActivity, PageError>;

    /// Visible text of the whole document.
    async fn page_text(&self) -> Result<String, PageError>;

    /// Base64-encoded PNG.
    async fn screenshot(&self, full_page: bool) -> Result<String, PageError>;

    async fn focused_element(&self) -> Result<Option<ElementHandle>, PageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_text_field() {
        let mut state = ElementState {
            tag: "input".to_string(),
            ..Default::default()
        };
        assert!(state.is_text_field());
        state.input_type = Some("email".to_string());
        assert!(state.is_text_field());
        state.input_type = Some("checkbox".to_string());
        assert!(!state.is_text_field());
        state.tag = "textarea".to_string();
        assert!(state.is_text_field());
        state.tag = "div".to_string();
        assert!(!state.is_text_field());
    }

    #[test]
    fn test_rect_helpers() {
        let rect = Rect {
            x: 10.0,
            y: 20.0,
            width: 100.0,
            height: 40.0,
        };
        assert!(!rect.is_empty());
        assert_eq!(rect.center(), (60.0, 40.0));
        assert!(Rect::default().is_empty());
    }

    #[test]
    fn test_event_spec_serialization() {
        let event = EventSpec::KeyDown {
            key: "Enter".to_string(),
            modifiers: Modifiers::default(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "key_down");
        assert_eq!(event.name(), "keydown");
    }
}
