//! Recording state machine.
//!
//! The recorder is single-threaded and clock-free: every event carries its
//! own timestamp, and debounce expiry is driven from outside through
//! [`Recorder::tick`] / [`Recorder::next_deadline`]. Text input is the only
//! state that spans several events.

use tracing::{debug, info};
use webreplay_config::RecorderConfig;
use webreplay_protocols::{
    Action, ClickButton, ClickContext, ClickTargetKind, FileMeta, Modifiers, SelectorSet, Step,
};
use webreplay_selectors::tree::normalize_text;
use webreplay_selectors::{ElementTree, NodeId, SelectorError, SelectorGenerator};

use crate::error::RecorderError;
use crate::event::{EventKind, RecorderEvent};
use crate::state::RecorderState;

/// Keys recorded when pressed together with ctrl or meta.
const SHORTCUT_KEYS: &[&str] = &[
    "a", "c", "v", "x", "z", "y", "s", "f", "p", "r", "t", "w", "n", "k", "l", "Enter", "Tab",
];

/// Input types whose value is never recorded as typed text.
const NON_TEXT_INPUT_TYPES: &[&str] = &[
    "password", "checkbox", "radio", "file", "submit", "button", "reset", "image", "hidden",
    "range", "color",
];

/// Longest link or button text kept as click context.
const CONTEXT_TEXT_MAX_CHARS: usize = 100;

/// Typing buffered for one field until it is flushed.
#[derive(Debug, Clone)]
struct InputBuffer {
    target: NodeId,
    selector: SelectorSet,
    value: String,
    last_input_at: i64,
}

/// Converts interaction events into steps.
#[derive(Debug)]
pub struct Recorder {
    config: RecorderConfig,
    generator: SelectorGenerator,
    state: RecorderState,
    steps: Vec<Step>,
    buffer: Option<InputBuffer>,
    started_at: Option<i64>,
    /// Time of the latest event that contributed to the recording.
    last_event_at: Option<i64>,
    last_enter_at: Option<i64>,
    last_scroll_at: Option<i64>,
    last_scroll: (f64, f64),
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new(RecorderConfig::default(), SelectorGenerator::default())
    }
}

impl Recorder {
    pub fn new(config: RecorderConfig, generator: SelectorGenerator) -> Self {
        Self {
            config,
            generator,
            state: RecorderState::Idle,
            steps: Vec::new(),
            buffer: None,
            started_at: None,
            last_event_at: None,
            last_enter_at: None,
            last_scroll_at: None,
            last_scroll: (0.0, 0.0),
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    /// Steps recorded so far. Buffered input is not included until flushed.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn started_at(&self) -> Option<i64> {
        self.started_at
    }

    pub fn has_pending_input(&self) -> bool {
        self.buffer.is_some()
    }

    /// Begin a new recording, or resume a paused one. No-op while recording.
    pub fn start(&mut self, now: i64) {
        match self.state {
            RecorderState::Recording => debug!("Recorder already recording"),
            RecorderState::Paused => self.resume(),
            RecorderState::Idle | RecorderState::Stopped => {
                self.reset();
                self.started_at = Some(now);
                self.state = RecorderState::Recording;
                info!(started_at = now, "Recording started");
            }
        }
    }

    /// Flush buffered input and stop turning events into steps.
    pub fn pause(&mut self) {
        if self.state.is_recording() {
            self.flush_input();
            self.state = RecorderState::Paused;
            info!(steps = self.steps.len(), "Recording paused");
        }
    }

    pub fn resume(&mut self) {
        if self.state == RecorderState::Paused {
            // Time spent paused is not a pause between interactions.
            self.last_event_at = None;
            self.state = RecorderState::Recording;
            info!("Recording resumed");
        }
    }

    /// Flush buffered input and hand back the recorded steps.
    ///
    /// Returns an empty list when idle.
    pub fn stop(&mut self) -> Vec<Step> {
        if self.state.is_inactive() {
            return Vec::new();
        }
        self.flush_input();
        let steps = std::mem::take(&mut self.steps);
        self.state = RecorderState::Stopped;
        info!(steps = steps.len(), "Recording stopped");
        steps
    }

    /// When the pending input buffer expires, if there is one.
    pub fn next_deadline(&self) -> Option<i64> {
        if !self.state.is_recording() {
            return None;
        }
        self.buffer
            .as_ref()
            .map(|b| b.last_input_at + self.config.input_debounce_ms as i64)
    }

    /// Flush the input buffer if its debounce window has elapsed at `now`.
    pub fn tick(&mut self, now: i64) -> bool {
        if self.next_deadline().is_some_and(|deadline| now >= deadline) {
            self.flush_input();
            true
        } else {
            false
        }
    }

    /// Process one event against the snapshot it was captured on.
    pub fn handle(&mut self, tree: &ElementTree, event: &RecorderEvent) -> Result<(), RecorderError> {
        if !self.state.is_recording() {
            debug!(event = event.name(), state = %self.state, "Ignoring event");
            return Ok(());
        }
        if let Some(target) = event_target(event) {
            if !tree.is_attached(target) {
                return Err(SelectorError::DetachedNode(target.index()).into());
            }
        }

        let ts = event.timestamp;
        self.tick(ts);

        match &event.kind {
            EventKind::Click { target, button } => self.on_click(tree, *target, *button, ts),
            EventKind::ContextMenu { target } => {
                self.on_click(tree, *target, ClickButton::Right, ts)
            }
            EventKind::Input { target, value } => self.on_input(tree, *target, value, ts),
            EventKind::Focus { target } => {
                self.on_focus(*target);
                Ok(())
            }
            EventKind::Change { target, value } => self.on_change(tree, *target, value, ts),
            EventKind::KeyDown {
                target,
                key,
                modifiers,
            } => self.on_key_down(tree, *target, key, *modifiers, ts),
            EventKind::Submit { form } => self.on_submit(tree, *form, ts),
            EventKind::Scroll { target, x, y } => self.on_scroll(tree, *target, *x, *y, ts),
            EventKind::FileChange { target, files } => {
                self.on_file_change(tree, *target, files, ts)
            }
        }
    }

    fn reset(&mut self) {
        self.steps.clear();
        self.buffer = None;
        self.started_at = None;
        self.last_event_at = None;
        self.last_enter_at = None;
        self.last_scroll_at = None;
        self.last_scroll = (0.0, 0.0);
    }

    fn on_click(
        &mut self,
        tree: &ElementTree,
        target: NodeId,
        button: ClickButton,
        ts: i64,
    ) -> Result<(), RecorderError> {
        let selector = self.generator.generate(tree, target)?;
        self.flush_input();
        self.insert_pause(ts);

        let step = Step::new(Action::Click {
            button,
            context: click_context(tree, target),
            wait_after_ms: None,
        })
        .with_selector(selector)
        .with_timestamp(ts);
        self.record(step, ts);
        Ok(())
    }

    fn on_input(
        &mut self,
        tree: &ElementTree,
        target: NodeId,
        value: &str,
        ts: i64,
    ) -> Result<(), RecorderError> {
        if !records_typing(tree, target) {
            debug!(target = %tree.describe(target), "Input not recorded for this field");
            return Ok(());
        }

        match self.buffer.as_mut() {
            Some(buffer) if buffer.target == target => {
                buffer.value = value.to_string();
                buffer.last_input_at = ts;
            }
            _ => {
                let selector = self.generator.generate(tree, target)?;
                self.flush_input();
                self.buffer = Some(InputBuffer {
                    target,
                    selector,
                    value: value.to_string(),
                    last_input_at: ts,
                });
            }
        }
        self.last_event_at = Some(ts);
        Ok(())
    }

    fn on_focus(&mut self, target: Option<NodeId>) {
        if self
            .buffer
            .as_ref()
            .is_some_and(|buffer| Some(buffer.target) != target)
        {
            self.flush_input();
        }
    }

    fn on_change(
        &mut self,
        tree: &ElementTree,
        target: NodeId,
        value: &str,
        ts: i64,
    ) -> Result<(), RecorderError> {
        if tree.tag(target) != "select" {
            return Ok(());
        }
        let selector = self.generator.generate(tree, target)?;
        self.flush_input();
        let step = Step::new(Action::SelectOption {
            value: value.to_string(),
        })
        .with_selector(selector)
        .with_timestamp(ts);
        self.record(step, ts);
        Ok(())
    }

    fn on_key_down(
        &mut self,
        tree: &ElementTree,
        target: Option<NodeId>,
        key: &str,
        modifiers: Modifiers,
        ts: i64,
    ) -> Result<(), RecorderError> {
        if (modifiers.ctrl || modifiers.meta) && is_shortcut_key(key) {
            let selector = match target.filter(|&t| !is_document_element(tree, t)) {
                Some(focused) => Some(self.generator.generate(tree, focused)?),
                None => None,
            };
            self.flush_input();
            let mut step = Step::new(Action::KeyboardShortcut {
                key: key.to_string(),
                ctrl: modifiers.ctrl,
                alt: modifiers.alt,
                shift: modifiers.shift,
                meta: modifiers.meta,
            })
            .with_timestamp(ts);
            step.selector = selector;
            self.record(step, ts);
            return Ok(());
        }

        if key == "Enter" && modifiers == Modifiers::default() {
            let Some(field) = target.filter(|&t| submits_on_enter(tree, t)) else {
                return Ok(());
            };
            let selector = self.generator.generate(tree, field)?;
            self.flush_input();
            let step = Step::new(Action::KeyboardShortcut {
                key: "Enter".to_string(),
                ctrl: false,
                alt: false,
                shift: false,
                meta: false,
            })
            .with_selector(selector)
            .with_timestamp(ts);
            self.record(step, ts);
            self.last_enter_at = Some(ts);
        }
        Ok(())
    }

    fn on_submit(&mut self, tree: &ElementTree, form: NodeId, ts: i64) -> Result<(), RecorderError> {
        let window = self.config.submit_suppress_ms as i64;
        if self.last_enter_at.is_some_and(|at| ts - at <= window) {
            debug!("Form submit already covered by Enter");
            return Ok(());
        }

        let control = submit_control(tree, form);
        let selector = self.generator.generate(tree, control)?;
        let clicked = self.steps.last().is_some_and(|last| {
            matches!(last.action, Action::Click { .. })
                && ts - last.timestamp <= window
                && last.selector.as_ref().is_some_and(|s| s.same_target(&selector))
        });
        if clicked {
            debug!("Form submit already covered by a click on its submit control");
            return Ok(());
        }
        self.flush_input();
        let step = Step::new(Action::Click {
            button: ClickButton::Left,
            context: Some(ClickContext {
                kind: ClickTargetKind::FormSubmit,
                text: element_text(tree, control),
                href: None,
            }),
            wait_after_ms: None,
        })
        .with_selector(selector)
        .with_timestamp(ts);
        self.record(step, ts);
        Ok(())
    }

    fn on_scroll(
        &mut self,
        tree: &ElementTree,
        target: Option<NodeId>,
        x: f64,
        y: f64,
        ts: i64,
    ) -> Result<(), RecorderError> {
        let throttle = self.config.scroll_throttle_ms as i64;
        if self.last_scroll_at.is_some_and(|at| ts - at < throttle) {
            return Ok(());
        }
        let threshold = self.config.scroll_threshold_px;
        let (last_x, last_y) = self.last_scroll;
        if (x - last_x).abs() <= threshold && (y - last_y).abs() <= threshold {
            return Ok(());
        }

        let selector = match target.filter(|&t| !is_document_element(tree, t)) {
            Some(element) => Some(self.generator.generate(tree, element)?),
            None => None,
        };
        let mut step = Step::new(Action::Scroll { x, y, smooth: true }).with_timestamp(ts);
        step.selector = selector;
        self.record(step, ts);
        self.last_scroll_at = Some(ts);
        self.last_scroll = (x, y);
        Ok(())
    }

    fn on_file_change(
        &mut self,
        tree: &ElementTree,
        target: NodeId,
        files: &[FileMeta],
        ts: i64,
    ) -> Result<(), RecorderError> {
        let selector = self.generator.generate(tree, target)?;
        self.flush_input();
        let step = Step::new(Action::FileUpload {
            files: files.to_vec(),
            paths: Vec::new(),
        })
        .with_selector(selector)
        .with_timestamp(ts);
        self.record(step, ts);
        Ok(())
    }

    /// Insert a WaitForTime step when the gap since the previous recorded
    /// event reaches the pause threshold.
    fn insert_pause(&mut self, ts: i64) {
        let Some(previous) = self.last_event_at else {
            return;
        };
        let gap = ts - previous;
        if gap < self.config.pause_threshold_ms as i64 {
            return;
        }
        let duration_ms = round_to_100(gap);
        debug!(gap, duration_ms, "Inserting pause");
        let step = Step::new(Action::WaitForTime { duration_ms }).with_timestamp(previous + gap / 2);
        self.insert_ordered(step);
    }

    /// Turn the input buffer into an InputText step, or update the previous
    /// step in place when it already types into the same field.
    fn flush_input(&mut self) {
        let Some(buffer) = self.buffer.take() else {
            return;
        };

        let same_field = self.steps.last().is_some_and(|last| {
            matches!(last.action, Action::InputText { .. })
                && last
                    .selector
                    .as_ref()
                    .is_some_and(|s| s.same_target(&buffer.selector))
        });
        if same_field {
            if let Some(previous) = self.steps.pop() {
                debug!(step = %previous.id, "Updating input step in place");
                let updated = Step {
                    timestamp: buffer.last_input_at,
                    selector: Some(buffer.selector),
                    action: Action::InputText {
                        value: buffer.value,
                        clear_first: true,
                        typing_delay_ms: None,
                    },
                    ..previous
                };
                self.insert_ordered(updated);
            }
            return;
        }

        let step = Step::new(Action::InputText {
            value: buffer.value,
            clear_first: true,
            typing_delay_ms: None,
        })
        .with_selector(buffer.selector)
        .with_timestamp(buffer.last_input_at);
        debug!(step = %step.id, "Flushed input");
        self.insert_ordered(step);
    }

    fn record(&mut self, step: Step, ts: i64) {
        debug!(
            action = step.action_name(),
            selector = step.selector.as_ref().map(|s| s.primary.to_string()),
            "Recorded step"
        );
        self.insert_ordered(step);
        self.last_event_at = Some(ts);
    }

    /// Keep steps in non-decreasing timestamp order.
    fn insert_ordered(&mut self, step: Step) {
        let index = self
            .steps
            .iter()
            .rposition(|s| s.timestamp <= step.timestamp)
            .map_or(0, |i| i + 1);
        self.steps.insert(index, step);
    }
}

fn event_target(event: &RecorderEvent) -> Option<NodeId> {
    match &event.kind {
        EventKind::Click { target, .. }
        | EventKind::ContextMenu { target }
        | EventKind::Input { target, .. }
        | EventKind::Change { target, .. }
        | EventKind::FileChange { target, .. } => Some(*target),
        EventKind::Submit { form } => Some(*form),
        EventKind::Focus { target }
        | EventKind::KeyDown { target, .. }
        | EventKind::Scroll { target, .. } => *target,
    }
}

fn round_to_100(ms: i64) -> u64 {
    (ms.max(0) as u64 + 50) / 100 * 100
}

fn is_shortcut_key(key: &str) -> bool {
    SHORTCUT_KEYS.iter().any(|k| {
        if k.len() == 1 {
            k.eq_ignore_ascii_case(key)
        } else {
            *k == key
        }
    })
}

fn input_type(tree: &ElementTree, node: NodeId) -> String {
    tree.attr(node, "type")
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "text".to_string())
}

/// Fields whose typed value becomes an InputText step.
fn records_typing(tree: &ElementTree, node: NodeId) -> bool {
    match tree.tag(node) {
        "textarea" => true,
        "input" => !NON_TEXT_INPUT_TYPES.contains(&input_type(tree, node).as_str()),
        _ => false,
    }
}

/// Single-line fields where Enter submits the form.
fn submits_on_enter(tree: &ElementTree, node: NodeId) -> bool {
    tree.tag(node) == "input"
        && (records_typing(tree, node) || input_type(tree, node) == "password")
}

fn is_document_element(tree: &ElementTree, node: NodeId) -> bool {
    matches!(tree.tag(node), "html" | "body")
}

fn is_button(tree: &ElementTree, node: NodeId) -> bool {
    match tree.tag(node) {
        "button" => true,
        "input" => matches!(
            input_type(tree, node).as_str(),
            "submit" | "button" | "reset" | "image"
        ),
        _ => tree.attr(node, "role") == Some("button"),
    }
}

/// Visible label of a link or button, trimmed and bounded.
fn element_text(tree: &ElementTree, node: NodeId) -> Option<String> {
    let text = if tree.tag(node) == "input" {
        tree.attr(node, "value").map(normalize_text).unwrap_or_default()
    } else {
        normalize_text(&tree.text_content(node))
    };
    (!text.is_empty()).then(|| text.chars().take(CONTEXT_TEXT_MAX_CHARS).collect())
}

fn click_context(tree: &ElementTree, target: NodeId) -> Option<ClickContext> {
    let mut lineage = std::iter::once(target).chain(tree.ancestors(target));
    let control = lineage.find(|&n| (tree.tag(n) == "a" && tree.has_attr(n, "href")) || is_button(tree, n))?;

    if tree.tag(control) == "a" {
        Some(ClickContext {
            kind: ClickTargetKind::Link,
            text: element_text(tree, control),
            href: tree.attr(control, "href").map(str::to_string),
        })
    } else {
        Some(ClickContext {
            kind: ClickTargetKind::Button,
            text: element_text(tree, control),
            href: None,
        })
    }
}

/// The control a form submission is attributed to: an explicit submit
/// control, then a `<button>` without type, else the form itself.
fn submit_control(tree: &ElementTree, form: NodeId) -> NodeId {
    let inside: Vec<NodeId> = tree.descendants(form).into_iter().skip(1).collect();
    inside
        .iter()
        .copied()
        .find(|&n| {
            matches!(tree.tag(n), "button" | "input")
                && tree
                    .attr(n, "type")
                    .is_some_and(|t| t.eq_ignore_ascii_case("submit"))
        })
        .or_else(|| {
            inside
                .iter()
                .copied()
                .find(|&n| tree.tag(n) == "button" && !tree.has_attr(n, "type"))
        })
        .unwrap_or(form)
}

#[cfg(test)]
#[path = "recorder_tests.rs"]
mod tests;
