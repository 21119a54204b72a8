//! Instruction executor.
//!
//! Runs an instruction's steps in order through one [`ActionEngine`]:
//! per-step deadlines, a whole-run deadline, continue-on-error handling,
//! stop requests and an execution log appended to the store after every run.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use webreplay_config::ExecutorConfig;
use webreplay_protocols::{
    ExecutionLog, ExecutionOutcome, ExecutionStatus, ExecutorState, Instruction, InstructionStore,
    ReplayError, Step, StepOutcome, Variables,
};

use crate::engine::{ActionEngine, ActionOutput};
use crate::retry::Retried;

/// Added to a step's own wait budget when it exceeds the step timeout.
const STEP_TIMEOUT_MARGIN_MS: u64 = 1000;

pub struct InstructionExecutor {
    engine: Arc<ActionEngine>,
    store: Arc<dyn InstructionStore>,
    config: ExecutorConfig,
    state: watch::Sender<ExecutorState>,
    current: Mutex<Option<CancellationToken>>,
}

impl InstructionExecutor {
    pub fn new(
        engine: Arc<ActionEngine>,
        store: Arc<dyn InstructionStore>,
        config: ExecutorConfig,
    ) -> Self {
        let (state, _) = watch::channel(ExecutorState::Idle);
        Self {
            engine,
            store,
            config,
            state,
            current: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ExecutorState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ExecutorState> {
        self.state.subscribe()
    }

    pub fn store(&self) -> &Arc<dyn InstructionStore> {
        &self.store
    }

    /// Request the current run to stop. Returns false when nothing is running.
    pub fn stop(&self) -> bool {
        let current = self.current.lock();
        match current.as_ref() {
            Some(token) => {
                info!("Stop requested");
                self.state.send_replace(ExecutorState::Stopping);
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Load an instruction from the store and run it.
    pub async fn run_by_id(
        &self,
        id: &str,
        overrides: &Variables,
    ) -> Result<ExecutionOutcome, ReplayError> {
        let instruction = self.store.get(id).await?;
        self.run(&instruction, overrides).await
    }

    /// Run every step of `instruction`.
    ///
    /// Step failures do not make this an `Err`: they end up in the returned
    /// outcome and in the execution log. `Err` means the run never started.
    pub async fn run(
        &self,
        instruction: &Instruction,
        overrides: &Variables,
    ) -> Result<ExecutionOutcome, ReplayError> {
        let token = {
            let mut current = self.current.lock();
            if current.is_some() {
                return Err(ReplayError::Busy("an instruction is already running".to_string()));
            }
            let token = CancellationToken::new();
            *current = Some(token.clone());
            token
        };
        self.state.send_replace(ExecutorState::Running);

        let timed_out = Arc::new(AtomicBool::new(false));
        let deadline = {
            let token = token.clone();
            let timed_out = timed_out.clone();
            let limit = Duration::from_millis(self.config.run_timeout_ms);
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                timed_out.store(true, Ordering::Release);
                token.cancel();
            })
        };

        let mut run = RunGuard {
            state: &self.state,
            current: &self.current,
            store: self.store.clone(),
            token: token.clone(),
            deadline: Some(deadline),
            log: ExecutionLog::begin(&instruction.id, &instruction.name),
            finished: false,
        };

        info!(
            instruction_id = %instruction.id,
            name = %instruction.name,
            steps = instruction.steps.len(),
            "Run started"
        );

        let mut variables = instruction.resolve_variables(overrides);
        let mut failure: Option<ReplayError> = None;

        for (index, step) in instruction.steps.iter().enumerate() {
            if token.is_cancelled() {
                failure = Some(stop_reason(&timed_out, self.config.run_timeout_ms));
                break;
            }

            let started = Instant::now();
            let retried = self.run_step(step, &mut variables, &token).await;
            let duration_ms = started.elapsed().as_millis() as u64;

            let mut outcome = StepOutcome {
                step_index: index,
                step_id: step.id.clone(),
                action: step.action_name().to_string(),
                success: retried.result.is_ok(),
                duration_ms,
                attempts: retried.attempts,
                selector_used: None,
                error: None,
                error_kind: None,
                continued: false,
            };

            match retried.result {
                Ok(output) => {
                    debug!(index, action = step.action_name(), duration_ms, "Step succeeded");
                    outcome.selector_used = output.selector_used;
                    run.record(outcome);
                }
                Err(e) => {
                    let e = match e {
                        ReplayError::Cancelled if timed_out.load(Ordering::Acquire) => {
                            stop_reason(&timed_out, self.config.run_timeout_ms)
                        }
                        other => other,
                    };
                    outcome.error = Some(e.to_string());
                    outcome.error_kind = Some(e.kind().to_string());

                    if step.continue_on_error && !token.is_cancelled() {
                        warn!(index, action = step.action_name(), "Step failed, continuing: {}", e);
                        outcome.continued = true;
                        run.record(outcome);
                        continue;
                    }

                    error!(index, action = step.action_name(), "Step failed: {}", e);
                    run.record(outcome);
                    failure = Some(e);
                    break;
                }
            }
        }

        let status = if failure.is_none() {
            ExecutionStatus::Success
        } else {
            ExecutionStatus::Failed
        };
        let log = run.finish(status, failure.as_ref().map(ToString::to_string));

        if let Err(e) = self.store.append_execution_log(log.clone()).await {
            warn!(instruction_id = %instruction.id, "Failed to append execution log: {}", e);
        }

        self.state.send_replace(match status {
            ExecutionStatus::Success => ExecutorState::Completed,
            ExecutionStatus::Failed => ExecutorState::Failed,
        });
        info!(
            instruction_id = %instruction.id,
            status = ?status,
            duration_ms = log.duration_ms,
            "Run finished"
        );
        drop(run);

        Ok(ExecutionOutcome {
            status,
            log,
            variables: instruction.mask_secrets(&variables),
        })
    }

    /// One step under its deadline: the configured step timeout, extended for
    /// steps whose own wait is longer.
    async fn run_step(
        &self,
        step: &Step,
        variables: &mut Variables,
        token: &CancellationToken,
    ) -> Retried<ActionOutput> {
        let timeout_ms = step_timeout_ms(step, self.config.step_timeout_ms);
        match tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.engine.execute(step, variables, token),
        )
        .await
        {
            Ok(retried) => retried,
            Err(_) => Retried {
                result: Err(ReplayError::Timeout(format!("step exceeded {timeout_ms}ms"))),
                attempts: 0,
            },
        }
    }
}

pub(crate) fn step_timeout_ms(step: &Step, step_timeout_ms: u64) -> u64 {
    match step.action.own_duration_ms() {
        Some(own) => step_timeout_ms.max(own.saturating_add(STEP_TIMEOUT_MARGIN_MS)),
        None => step_timeout_ms,
    }
}

fn stop_reason(timed_out: &AtomicBool, run_timeout_ms: u64) -> ReplayError {
    if timed_out.load(Ordering::Acquire) {
        ReplayError::Timeout(format!("run exceeded {run_timeout_ms}ms"))
    } else {
        ReplayError::Cancelled
    }
}

/// Releases the run on every exit path, including the run future being dropped.
struct RunGuard<'a> {
    state: &'a watch::Sender<ExecutorState>,
    current: &'a Mutex<Option<CancellationToken>>,
    store: Arc<dyn InstructionStore>,
    token: CancellationToken,
    deadline: Option<JoinHandle<()>>,
    log: ExecutionLog,
    finished: bool,
}

impl RunGuard<'_> {
    fn record(&mut self, outcome: StepOutcome) {
        self.log.record(outcome);
    }

    fn finish(&mut self, status: ExecutionStatus, error: Option<String>) -> ExecutionLog {
        self.log.finish(status, error);
        self.finished = true;
        self.log.clone()
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if let Some(deadline) = self.deadline.take() {
            deadline.abort();
        }
        self.token.cancel();

        if !self.finished {
            let mut log = self.log.clone();
            log.finish(ExecutionStatus::Failed, Some("run aborted".to_string()));
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let store = self.store.clone();
                    handle.spawn(async move {
                        if let Err(e) = store.append_execution_log(log).await {
                            warn!("Failed to append aborted run log: {}", e);
                        }
                    });
                }
                Err(_) => warn!(log_id = %log.id, "No runtime to persist aborted run log"),
            }
        }

        *self.current.lock() = None;
        self.state.send_replace(ExecutorState::Idle);
    }
}
