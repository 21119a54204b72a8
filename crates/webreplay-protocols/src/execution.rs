//! Execution records produced by a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::instruction::Variables;

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Failed,
}

impl ExecutionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionStatus::Success)
    }
}

/// Observable executor state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorState {
    #[default]
    Idle,
    Running,
    Stopping,
    Completed,
    Failed,
}

impl ExecutorState {
    pub fn is_idle(&self) -> bool {
        matches!(self, ExecutorState::Idle)
    }
}

/// Outcome of one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step_index: usize,
    pub step_id: String,
    pub action: String,
    pub success: bool,
    pub duration_ms: u64,
    #[serde(default)]
    pub attempts: u32,
    /// Descriptor that located the target, as `strategy:value`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector_used: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    /// The step failed but was marked continue-on-error.
    #[serde(default)]
    pub continued: bool,
}

/// Per-run outcome record, appended to the store at the end of every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub id: String,
    pub instruction_id: String,
    #[serde(default)]
    pub instruction_name: String,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub step_outcomes: Vec<StepOutcome>,
}

impl ExecutionLog {
    /// Open a log for a run starting now. Status stays `Failed` until finished.
    pub fn begin(instruction_id: impl Into<String>, instruction_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            instruction_id: instruction_id.into(),
            instruction_name: instruction_name.into(),
            status: ExecutionStatus::Failed,
            started_at: now,
            finished_at: now,
            duration_ms: 0,
            error: None,
            step_outcomes: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: StepOutcome) {
        self.step_outcomes.push(outcome);
    }

    pub fn finish(&mut self, status: ExecutionStatus, error: Option<String>) {
        self.finished_at = Utc::now();
        self.duration_ms = (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64;
        self.status = status;
        self.error = error;
    }

    pub fn failed_steps(&self) -> impl Iterator<Item = &StepOutcome> {
        self.step_outcomes.iter().filter(|o| !o.success)
    }
}

/// What a run returns to its caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub status: ExecutionStatus,
    pub log: ExecutionLog,
    /// Final variable bindings, secrets masked.
    pub variables: Variables,
}
