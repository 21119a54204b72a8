//! Replay and recording configuration types (engine, executor, recorder, selectors).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::default_true;

/// How InputText applies characters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypingMode {
    /// One insertion per character with a short delay in between.
    #[default]
    PerCharacter,
    /// The whole value in one insertion.
    Instant,
}

/// Action execution engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Interval between resolution and condition polls.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How long element resolution polls before giving up.
    #[serde(default = "default_element_timeout_ms")]
    pub element_timeout_ms: u64,

    /// Pause after clicks and other page-changing actions.
    #[serde(default = "default_post_action_wait_ms")]
    pub post_action_wait_ms: u64,

    #[serde(default)]
    pub typing_mode: TypingMode,

    #[serde(default = "default_typing_delay_ms")]
    pub typing_delay_ms: u64,

    /// Hard per-action timeout and single-level selector fallback.
    #[serde(default)]
    pub strict: bool,

    /// Per-action wall-clock limit in strict mode.
    #[serde(default = "default_action_timeout_ms")]
    pub action_timeout_ms: u64,

    /// Allow ExecuteScript steps and custom conditions.
    #[serde(default = "default_true")]
    pub allow_scripts: bool,

    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,

    #[serde(default = "default_hover_dwell_ms")]
    pub hover_dwell_ms: u64,

    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            element_timeout_ms: default_element_timeout_ms(),
            post_action_wait_ms: default_post_action_wait_ms(),
            typing_mode: TypingMode::default(),
            typing_delay_ms: default_typing_delay_ms(),
            strict: false,
            action_timeout_ms: default_action_timeout_ms(),
            allow_scripts: true,
            navigation_timeout_ms: default_navigation_timeout_ms(),
            hover_dwell_ms: default_hover_dwell_ms(),
            retry: RetryConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_millis(self.element_timeout_ms)
    }

    pub fn action_timeout(&self) -> Duration {
        Duration::from_millis(self.action_timeout_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_element_timeout_ms() -> u64 {
    5000
}

fn default_post_action_wait_ms() -> u64 {
    300
}

fn default_typing_delay_ms() -> u64 {
    20
}

fn default_action_timeout_ms() -> u64 {
    10_000
}

fn default_navigation_timeout_ms() -> u64 {
    30_000
}

fn default_hover_dwell_ms() -> u64 {
    500
}

/// Bounded exponential backoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `retry` (1-based): base doubled per retry, capped.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u64
            .checked_shl(retry.saturating_sub(1))
            .unwrap_or(u64::MAX);
        let ms = self
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(ms)
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    200
}

fn default_max_delay_ms() -> u64 {
    2000
}

/// Instruction executor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_step_timeout_ms")]
    pub step_timeout_ms: u64,

    /// Whole-run deadline.
    #[serde(default = "default_run_timeout_ms")]
    pub run_timeout_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            step_timeout_ms: default_step_timeout_ms(),
            run_timeout_ms: default_run_timeout_ms(),
        }
    }
}

fn default_step_timeout_ms() -> u64 {
    30_000
}

fn default_run_timeout_ms() -> u64 {
    300_000
}

/// Recorder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Idle gap that inserts a WaitForTime step.
    #[serde(default = "default_pause_threshold_ms")]
    pub pause_threshold_ms: u64,

    #[serde(default = "default_input_debounce_ms")]
    pub input_debounce_ms: u64,

    /// Window after Enter in which a form submit is not recorded.
    #[serde(default = "default_submit_suppress_ms")]
    pub submit_suppress_ms: u64,

    #[serde(default = "default_scroll_throttle_ms")]
    pub scroll_throttle_ms: u64,

    #[serde(default = "default_scroll_threshold_px")]
    pub scroll_threshold_px: f64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            pause_threshold_ms: default_pause_threshold_ms(),
            input_debounce_ms: default_input_debounce_ms(),
            submit_suppress_ms: default_submit_suppress_ms(),
            scroll_throttle_ms: default_scroll_throttle_ms(),
            scroll_threshold_px: default_scroll_threshold_px(),
        }
    }
}

fn default_pause_threshold_ms() -> u64 {
    3000
}

fn default_input_debounce_ms() -> u64 {
    500
}

fn default_submit_suppress_ms() -> u64 {
    500
}

fn default_scroll_throttle_ms() -> u64 {
    1000
}

fn default_scroll_threshold_px() -> f64 {
    50.0
}

/// Selector generator limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorsConfig {
    /// Longest trimmed text usable by the Text strategy.
    #[serde(default = "default_text_max_len")]
    pub text_max_len: usize,

    /// Longest attribute value used as a CSS discriminator.
    #[serde(default = "default_attribute_max_len")]
    pub attribute_max_len: usize,

    /// Ancestor levels searched for a landmark.
    #[serde(default = "default_position_max_depth")]
    pub position_max_depth: usize,
}

impl Default for SelectorsConfig {
    fn default() -> Self {
        Self {
            text_max_len: default_text_max_len(),
            attribute_max_len: default_attribute_max_len(),
            position_max_depth: default_position_max_depth(),
        }
    }
}

fn default_text_max_len() -> usize {
    50
}

fn default_attribute_max_len() -> usize {
    30
}

fn default_position_max_depth() -> usize {
    5
}
