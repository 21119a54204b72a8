//! Step data model.
//!
//! A step is one recorded or authored action. The action kind is a closed
//! sum type; common fields live on [`Step`] and the action payload is
//! flattened into the same JSON object under an `action` tag.

use serde::{Deserialize, Serialize};

use crate::selector::SelectorSet;

fn is_false(value: &bool) -> bool {
    !*value
}

fn default_true() -> bool {
    true
}

/// One step of an instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,

    /// Milliseconds since the Unix epoch when the step was recorded.
    pub timestamp: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<SelectorSet>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub continue_on_error: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(flatten)]
    pub action: Action,
}

impl Step {
    /// Create a step with a fresh id, timestamped now.
    pub fn new(action: Action) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            selector: None,
            continue_on_error: false,
            description: None,
            action,
        }
    }

    pub fn with_selector(mut self, selector: SelectorSet) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Action name used in logs and outcome records.
    pub fn action_name(&self) -> &'static str {
        self.action.name()
    }

    /// Visit every string-valued field of the step, selectors included.
    ///
    /// The match is exhaustive so new payload fields cannot silently escape
    /// variable substitution.
    pub fn for_each_string_mut(&mut self, f: &mut dyn FnMut(&mut String)) {
        if let Some(selector) = self.selector.as_mut() {
            selector.primary.for_each_string_mut(f);
            for alternative in selector.alternatives.iter_mut() {
                alternative.for_each_string_mut(f);
            }
        }
        if let Some(description) = self.description.as_mut() {
            f(description);
        }

        match &mut self.action {
            Action::Click { context, .. } => {
                if let Some(context) = context.as_mut() {
                    if let Some(text) = context.text.as_mut() {
                        f(text);
                    }
                    if let Some(href) = context.href.as_mut() {
                        f(href);
                    }
                }
            }
            Action::InputText { value, .. } => f(value),
            Action::SelectOption { value } => f(value),
            Action::WaitForElement { .. } | Action::WaitForTime { .. } => {}
            Action::WaitForCondition { condition, .. } => match condition {
                Condition::TextPresent { text } => f(text),
                Condition::Custom { expression } => f(expression),
                Condition::ElementVisible
                | Condition::ElementHidden
                | Condition::NetworkIdle { .. }
                | Condition::DomStable { .. } => {}
            },
            Action::Navigate { url, .. } => f(url),
            Action::GetContent {
                property,
                attribute,
                store_as,
            } => {
                for field in [property, attribute, store_as] {
                    if let Some(value) = field.as_mut() {
                        f(value);
                    }
                }
            }
            Action::ExecuteScript { script, store_as } => {
                f(script);
                if let Some(store_as) = store_as.as_mut() {
                    f(store_as);
                }
            }
            Action::TakeScreenshot { store_as, .. } => {
                if let Some(store_as) = store_as.as_mut() {
                    f(store_as);
                }
            }
            Action::KeyboardShortcut { key, .. } => f(key),
            Action::Scroll { .. } | Action::Hover { .. } => {}
            Action::FileUpload { files, paths } => {
                for file in files.iter_mut() {
                    f(&mut file.name);
                    f(&mut file.mime_type);
                }
                for path in paths.iter_mut() {
                    f(path);
                }
            }
        }
    }
}

/// Mouse button used by a click.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickButton {
    #[default]
    Left,
    Right,
}

/// What kind of control a click landed on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickTargetKind {
    Link,
    Button,
    FormSubmit,
    #[default]
    Other,
}

/// Context captured at record time for a click.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickContext {
    #[serde(default)]
    pub kind: ClickTargetKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

/// File metadata captured for uploads. Contents are never recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub mime_type: String,
}

fn default_quiet_ms() -> u64 {
    500
}

fn default_max_wait_ms() -> u64 {
    5000
}

/// Predicate polled by `WaitForCondition`.
///
/// Element predicates apply to the step's selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    ElementVisible,
    /// Satisfied when the element is hidden or absent.
    ElementHidden,
    TextPresent {
        text: String,
    },
    NetworkIdle {
        #[serde(default = "default_quiet_ms")]
        quiet_ms: u64,
    },
    DomStable {
        #[serde(default = "default_quiet_ms")]
        quiet_ms: u64,
        #[serde(default = "default_max_wait_ms")]
        max_wait_ms: u64,
    },
    /// Boolean expression evaluated against the live page.
    Custom {
        expression: String,
    },
}

impl Condition {
    pub fn name(&self) -> &'static str {
        match self {
            Condition::ElementVisible => "element_visible",
            Condition::ElementHidden => "element_hidden",
            Condition::TextPresent { .. } => "text_present",
            Condition::NetworkIdle { .. } => "network_idle",
            Condition::DomStable { .. } => "dom_stable",
            Condition::Custom { .. } => "custom",
        }
    }
}

/// Action kind plus its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Click {
        #[serde(default)]
        button: ClickButton,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context: Option<ClickContext>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        wait_after_ms: Option<u64>,
    },
    InputText {
        value: String,
        #[serde(default)]
        clear_first: bool,
        /// Per-character delay override; 0 types instantly.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        typing_delay_ms: Option<u64>,
    },
    SelectOption {
        value: String,
    },
    WaitForElement {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
        #[serde(default = "default_true")]
        visible: bool,
    },
    WaitForCondition {
        condition: Condition,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },
    WaitForTime {
        duration_ms: u64,
    },
    Navigate {
        url: String,
        #[serde(default = "default_true")]
        wait_for_load: bool,
    },
    GetContent {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        property: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attribute: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        store_as: Option<String>,
    },
    ExecuteScript {
        script: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        store_as: Option<String>,
    },
    TakeScreenshot {
        #[serde(default)]
        full_page: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        store_as: Option<String>,
    },
    KeyboardShortcut {
        key: String,
        #[serde(default, skip_serializing_if = "is_false")]
        ctrl: bool,
        #[serde(default, skip_serializing_if = "is_false")]
        alt: bool,
        #[serde(default, skip_serializing_if = "is_false")]
        shift: bool,
        #[serde(default, skip_serializing_if = "is_false")]
        meta: bool,
    },
    Scroll {
        x: f64,
        y: f64,
        #[serde(default = "default_true")]
        smooth: bool,
    },
    Hover {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dwell_ms: Option<u64>,
    },
    FileUpload {
        files: Vec<FileMeta>,
        /// Local files attached at replay time.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        paths: Vec<String>,
    },
}

impl Action {
    /// Snake-case action name, identical to the serialized tag.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Click { .. } => "click",
            Action::InputText { .. } => "input_text",
            Action::SelectOption { .. } => "select_option",
            Action::WaitForElement { .. } => "wait_for_element",
            Action::WaitForCondition { .. } => "wait_for_condition",
            Action::WaitForTime { .. } => "wait_for_time",
            Action::Navigate { .. } => "navigate",
            Action::GetContent { .. } => "get_content",
            Action::ExecuteScript { .. } => "execute_script",
            Action::TakeScreenshot { .. } => "take_screenshot",
            Action::KeyboardShortcut { .. } => "keyboard_shortcut",
            Action::Scroll { .. } => "scroll",
            Action::Hover { .. } => "hover",
            Action::FileUpload { .. } => "file_upload",
        }
    }

    /// Whether the action cannot run without a resolved target element.
    pub fn requires_element(&self) -> bool {
        match self {
            Action::Click { .. }
            | Action::InputText { .. }
            | Action::SelectOption { .. }
            | Action::WaitForElement { .. }
            | Action::GetContent { .. }
            | Action::Hover { .. }
            | Action::FileUpload { .. } => true,
            Action::WaitForCondition { condition, .. } => matches!(
                condition,
                Condition::ElementVisible | Condition::ElementHidden
            ),
            Action::WaitForTime { .. }
            | Action::Navigate { .. }
            | Action::ExecuteScript { .. }
            | Action::TakeScreenshot { .. }
            | Action::KeyboardShortcut { .. }
            | Action::Scroll { .. } => false,
        }
    }

    /// The action's own waiting budget, if it carries one.
    pub fn own_duration_ms(&self) -> Option<u64> {
        match self {
            Action::WaitForElement { timeout_ms, .. } => *timeout_ms,
            Action::WaitForCondition { timeout_ms, .. } => *timeout_ms,
            Action::WaitForTime { duration_ms } => Some(*duration_ms),
            Action::Hover { dwell_ms } => *dwell_ms,
            _ => None,
        }
    }

    /// Variable name this action binds its result to, if any.
    pub fn binding(&self) -> Option<&str> {
        match self {
            Action::GetContent { store_as, .. }
            | Action::ExecuteScript { store_as, .. }
            | Action::TakeScreenshot { store_as, .. } => store_as.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "step_tests.rs"]
mod tests;
