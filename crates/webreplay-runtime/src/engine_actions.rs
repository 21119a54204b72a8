//! Element and page interactions.

use std::time::Duration;

use tracing::{debug, warn};
use webreplay_config::TypingMode;
use webreplay_protocols::{
    ClickButton, ElementState, EventSpec, Modifiers, MouseButton, OptionInfo, ReplayError,
};

use crate::engine::{ActionEngine, ActionOutput, Attempt};
use crate::resolver::Located;
use crate::wait::sleep_or_cancel;

impl ActionEngine {
    /// Visible (scrolling into view once if needed) and, when asked, enabled.
    async fn ensure_interactable(
        &self,
        target: &Located,
        require_enabled: bool,
    ) -> Result<ElementState, ReplayError> {
        let mut state = self.page.element_state(&target.handle).await?;
        if !state.visible {
            self.page
                .dispatch_event(Some(&target.handle), EventSpec::ScrollIntoView)
                .await?;
            state = self.page.element_state(&target.handle).await?;
            if !state.visible {
                return Err(ReplayError::ActionFailed(format!(
                    "{} is not visible",
                    target.descriptor
                )));
            }
        }
        if require_enabled && !state.enabled {
            return Err(ReplayError::ActionFailed(format!(
                "{} is disabled",
                target.descriptor
            )));
        }
        Ok(state)
    }

    pub(crate) async fn click(
        &self,
        attempt: &mut Attempt<'_>,
        button: ClickButton,
        wait_after_ms: Option<u64>,
    ) -> Result<ActionOutput, ReplayError> {
        let target = self.locate(attempt).await?;
        self.ensure_interactable(&target, true).await?;

        let event = match button {
            ClickButton::Left => EventSpec::Click {
                button: MouseButton::Left,
                click_count: 1,
            },
            ClickButton::Right => EventSpec::ContextMenu,
        };
        self.page.dispatch_event(Some(&target.handle), event).await?;

        let settle = wait_after_ms.unwrap_or(self.config.post_action_wait_ms);
        sleep_or_cancel(Duration::from_millis(settle), attempt.token).await?;
        Ok(ActionOutput::located(&target))
    }

    pub(crate) async fn input_text(
        &self,
        attempt: &mut Attempt<'_>,
        value: &str,
        clear_first: bool,
        typing_delay_ms: Option<u64>,
    ) -> Result<ActionOutput, ReplayError> {
        let target = self.locate(attempt).await?;
        let state = self.ensure_interactable(&target, true).await?;
        if !state.is_text_field() {
            return Err(ReplayError::ActionFailed(format!(
                "{} is not a text field (<{}>)",
                target.descriptor, state.tag
            )));
        }

        let element = Some(&target.handle);
        self.page.dispatch_event(element, EventSpec::Focus).await?;
        if clear_first {
            self.page.dispatch_event(element, EventSpec::ClearValue).await?;
        }

        let delay = typing_delay_ms.unwrap_or(match self.config.typing_mode {
            TypingMode::PerCharacter => self.config.typing_delay_ms,
            TypingMode::Instant => 0,
        });
        if delay == 0 {
            if !value.is_empty() {
                self.page
                    .dispatch_event(
                        element,
                        EventSpec::InsertText {
                            text: value.to_string(),
                        },
                    )
                    .await?;
            }
        } else {
            let delay = Duration::from_millis(delay);
            for ch in value.chars() {
                self.page
                    .dispatch_event(
                        element,
                        EventSpec::InsertText {
                            text: ch.to_string(),
                        },
                    )
                    .await?;
                sleep_or_cancel(delay, attempt.token).await?;
            }
        }

        self.page.dispatch_event(element, EventSpec::Change).await?;
        self.page.dispatch_event(element, EventSpec::Blur).await?;
        Ok(ActionOutput::located(&target))
    }

    pub(crate) async fn select_option(
        &self,
        attempt: &mut Attempt<'_>,
        wanted: &str,
    ) -> Result<ActionOutput, ReplayError> {
        let target = self.locate(attempt).await?;
        let state = self.ensure_interactable(&target, true).await?;
        if state.tag != "select" {
            return Err(ReplayError::ActionFailed(format!(
                "{} is not a select element (<{}>)",
                target.descriptor, state.tag
            )));
        }
        let option = pick_option(&state.options, wanted).ok_or_else(|| {
            ReplayError::ActionFailed(format!(
                "no option of {} matches '{}'",
                target.descriptor, wanted
            ))
        })?;

        let element = Some(&target.handle);
        self.page
            .dispatch_event(
                element,
                EventSpec::SelectOption {
                    value: option.value.clone(),
                },
            )
            .await?;
        self.page.dispatch_event(element, EventSpec::Change).await?;
        Ok(ActionOutput::located(&target))
    }

    pub(crate) async fn navigate(&self, url: &str, wait_for_load: bool) -> Result<ActionOutput, ReplayError> {
        debug!(url, "Navigating");
        self.page.navigate(url).await?;
        if wait_for_load {
            self.page
                .wait_for_load(self.config.navigation_timeout())
                .await?;
        }
        Ok(ActionOutput::default())
    }

    pub(crate) async fn get_content(
        &self,
        attempt: &mut Attempt<'_>,
        property: Option<&str>,
        attribute: Option<&str>,
    ) -> Result<ActionOutput, ReplayError> {
        let target = self.locate(attempt).await?;
        let value = match attribute {
            Some(name) => self.page.read_attribute(&target.handle, name).await?,
            None => {
                self.page
                    .read_property(&target.handle, property.unwrap_or("textContent"))
                    .await?
            }
        };
        Ok(ActionOutput {
            value: Some(value.unwrap_or_default()),
            ..ActionOutput::located(&target)
        })
    }

    pub(crate) async fn execute_script(&self, script: &str) -> Result<ActionOutput, ReplayError> {
        let value = self.page.evaluate_script(script).await?;
        Ok(ActionOutput::value(render_value(&value)))
    }

    pub(crate) async fn take_screenshot(&self, full_page: bool) -> Result<ActionOutput, ReplayError> {
        let data = self.page.screenshot(full_page).await?;
        debug!(bytes = data.len(), full_page, "Captured screenshot");
        Ok(ActionOutput::value(data))
    }

    /// Key press on the resolved element, or on whatever has focus when the
    /// step has no selector.
    pub(crate) async fn keyboard_shortcut(
        &self,
        attempt: &mut Attempt<'_>,
        key: &str,
        modifiers: Modifiers,
    ) -> Result<ActionOutput, ReplayError> {
        let (target, output) = if attempt.chain.is_empty() {
            (self.page.focused_element().await?, ActionOutput::default())
        } else {
            let located = self.locate(attempt).await?;
            let output = ActionOutput::located(&located);
            (Some(located.handle), output)
        };

        let element = target.as_ref();
        self.page
            .dispatch_event(
                element,
                EventSpec::KeyDown {
                    key: key.to_string(),
                    modifiers,
                },
            )
            .await?;
        self.page
            .dispatch_event(
                element,
                EventSpec::KeyUp {
                    key: key.to_string(),
                    modifiers,
                },
            )
            .await?;
        Ok(output)
    }

    pub(crate) async fn scroll(
        &self,
        attempt: &mut Attempt<'_>,
        x: f64,
        y: f64,
        smooth: bool,
    ) -> Result<ActionOutput, ReplayError> {
        let event = EventSpec::ScrollTo { x, y, smooth };
        if attempt.chain.is_empty() {
            self.page.dispatch_event(None, event).await?;
            return Ok(ActionOutput::default());
        }
        let target = self.locate(attempt).await?;
        self.page.dispatch_event(Some(&target.handle), event).await?;
        Ok(ActionOutput::located(&target))
    }

    pub(crate) async fn hover(
        &self,
        attempt: &mut Attempt<'_>,
        dwell_ms: Option<u64>,
    ) -> Result<ActionOutput, ReplayError> {
        let target = self.locate(attempt).await?;
        self.ensure_interactable(&target, false).await?;
        self.page
            .dispatch_event(Some(&target.handle), EventSpec::Hover)
            .await?;
        let dwell = dwell_ms.unwrap_or(self.config.hover_dwell_ms);
        sleep_or_cancel(Duration::from_millis(dwell), attempt.token).await?;
        Ok(ActionOutput::located(&target))
    }

    pub(crate) async fn file_upload(
        &self,
        attempt: &mut Attempt<'_>,
        paths: &[String],
    ) -> Result<ActionOutput, ReplayError> {
        if paths.is_empty() {
            warn!("File upload has no local paths to attach, skipping");
            return Ok(ActionOutput {
                skipped: true,
                ..Default::default()
            });
        }
        let target = self.locate(attempt).await?;
        let state = self.page.element_state(&target.handle).await?;
        if state.tag != "input" || state.input_type.as_deref() != Some("file") {
            return Err(ReplayError::ActionFailed(format!(
                "{} is not a file input",
                target.descriptor
            )));
        }

        let element = Some(&target.handle);
        self.page
            .dispatch_event(
                element,
                EventSpec::SetFiles {
                    paths: paths.to_vec(),
                },
            )
            .await?;
        self.page.dispatch_event(element, EventSpec::Change).await?;
        Ok(ActionOutput::located(&target))
    }
}

/// Exact value, then exact text, then case-insensitive text substring.
pub(crate) fn pick_option<'a>(options: &'a [OptionInfo], wanted: &str) -> Option<&'a OptionInfo> {
    let wanted_trimmed = wanted.trim();
    options
        .iter()
        .find(|o| o.value == wanted)
        .or_else(|| options.iter().find(|o| o.text.trim() == wanted_trimmed))
        .or_else(|| {
            if wanted_trimmed.is_empty() {
                return None;
            }
            let needle = wanted_trimmed.to_lowercase();
            options
                .iter()
                .find(|o| o.text.to_lowercase().contains(&needle))
        })
}

/// String form of a script result: strings unquoted, null empty, the rest as JSON.
pub(crate) fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
