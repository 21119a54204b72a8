//! Whole-instruction replays against an in-memory page.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use webreplay_config::{EngineConfig, ExecutorConfig};
use webreplay_protocols::{
    Action, ClickButton, EventSpec, ExecutionLog, ExecutionStatus, ExecutorState, Instruction,
    InstructionFilter, InstructionStore, ReplayError, SECRET_MASK, SelectorDescriptor,
    SelectorSet, Step, StoreError, VariableDef, VariableType, Variables,
};
use webreplay_runtime::{ActionEngine, InstructionExecutor, SnapshotPage};

const LOGIN_PAGE: &str = r#"<html><body>
  <a id="login" href="/login">Log in</a>
  <form id="form">
    <input id="user">
    <input id="pass" type="password">
    <button id="submit" type="submit">Sign in</button>
  </form>
</body></html>"#;

/// Keeps instructions and logs in memory.
#[derive(Default)]
struct TestStore {
    instructions: Mutex<Vec<Instruction>>,
    logs: Mutex<Vec<ExecutionLog>>,
}

#[async_trait]
impl InstructionStore for TestStore {
    async fn save(&self, mut instruction: Instruction) -> Result<Instruction, StoreError> {
        let mut instructions = self.instructions.lock();
        if instruction.id.is_empty() {
            instruction.id = format!("i{}", instructions.len() + 1);
        }
        instructions.retain(|i| i.id != instruction.id);
        instructions.push(instruction.clone());
        Ok(instruction)
    }

    async fn get(&self, id: &str) -> Result<Instruction, StoreError> {
        self.instructions
            .lock()
            .iter()
            .find(|i| i.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn list(&self, filter: &InstructionFilter) -> Result<Vec<Instruction>, StoreError> {
        Ok(self
            .instructions
            .lock()
            .iter()
            .filter(|i| filter.matches(i))
            .cloned()
            .collect())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.instructions.lock().retain(|i| i.id != id);
        Ok(())
    }

    async fn append_execution_log(&self, log: ExecutionLog) -> Result<(), StoreError> {
        self.logs.lock().push(log);
        Ok(())
    }

    async fn execution_logs(
        &self,
        instruction_id: &str,
        limit: usize,
    ) -> Result<Vec<ExecutionLog>, StoreError> {
        Ok(self
            .logs
            .lock()
            .iter()
            .rev()
            .filter(|l| l.instruction_id == instruction_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

struct Harness {
    page: Arc<SnapshotPage>,
    store: Arc<TestStore>,
    executor: Arc<InstructionExecutor>,
}

fn harness(engine: EngineConfig, executor: ExecutorConfig) -> Harness {
    let page = Arc::new(SnapshotPage::from_html(LOGIN_PAGE));
    let store = Arc::new(TestStore::default());
    let engine = Arc::new(ActionEngine::new(page.clone(), engine));
    let executor = Arc::new(InstructionExecutor::new(engine, store.clone(), executor));
    Harness {
        page,
        store,
        executor,
    }
}

fn fast_engine() -> EngineConfig {
    EngineConfig {
        element_timeout_ms: 500,
        post_action_wait_ms: 0,
        ..Default::default()
    }
}

fn click(css: &str) -> Step {
    Step::new(Action::Click {
        button: ClickButton::Left,
        context: None,
        wait_after_ms: None,
    })
    .with_selector(SelectorSet::css(css))
}

fn type_into(css: &str, value: &str) -> Step {
    Step::new(Action::InputText {
        value: value.to_string(),
        clear_first: true,
        typing_delay_ms: None,
    })
    .with_selector(SelectorSet::css(css))
}

fn wait(ms: u64) -> Step {
    Step::new(Action::WaitForTime { duration_ms: ms })
}

#[tokio::test(start_paused = true)]
async fn test_login_with_secret_variable() {
    let h = harness(fast_engine(), ExecutorConfig::default());
    let instruction = Instruction::new("Log in")
        .with_variable("pwd", VariableDef::new(VariableType::Secret, "default"))
        .with_steps(vec![
            click("#login"),
            type_into("#user", "bob"),
            type_into("#pass", "{{pwd}}"),
            click("#submit"),
        ]);
    let mut overrides = Variables::new();
    overrides.insert("pwd".to_string(), "secret".to_string());

    let outcome = h.executor.run(&instruction, &overrides).await.unwrap();

    assert_eq!(outcome.status, ExecutionStatus::Success);
    assert_eq!(h.page.value_of("#user").as_deref(), Some("bob"));
    assert_eq!(h.page.value_of("#pass").as_deref(), Some("secret"));
    assert_eq!(outcome.log.step_outcomes.len(), 4);
    assert!(outcome.log.step_outcomes.iter().all(|o| o.success));
    assert_eq!(outcome.variables["pwd"], SECRET_MASK);

    // The stored instruction keeps its placeholder.
    match &instruction.steps[2].action {
        Action::InputText { value, .. } => assert_eq!(value, "{{pwd}}"),
        other => panic!("unexpected action {other:?}"),
    }
    let logs = h.store.logs.lock();
    assert_eq!(logs.len(), 1);
    assert!(!serde_json::to_string(&logs[0]).unwrap().contains("secret"));
    assert_eq!(h.executor.state(), ExecutorState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_fallback_selector_recorded_in_outcome() {
    let h = harness(fast_engine(), ExecutorConfig::default());
    let selector = SelectorSet::css("#sign-in")
        .with_alternative(SelectorDescriptor::text("Sign in", "button"));
    let step = Step::new(Action::Click {
        button: ClickButton::Left,
        context: None,
        wait_after_ms: None,
    })
    .with_selector(selector);
    let instruction = Instruction::new("Submit").with_steps(vec![step]);

    let outcome = h.executor.run(&instruction, &Variables::new()).await.unwrap();
    assert!(outcome.status.is_success());
    assert_eq!(
        outcome.log.step_outcomes[0].selector_used.as_deref(),
        Some("text:Sign in")
    );
    assert!(h
        .page
        .events()
        .iter()
        .any(|e| e.target.as_deref() == Some("<button#submit>")
            && matches!(e.event, EventSpec::Click { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_continue_on_error_keeps_going() {
    let h = harness(fast_engine(), ExecutorConfig::default());
    let instruction = Instruction::new("Tolerant").with_steps(vec![
        click("#cookie-banner").with_continue_on_error(true),
        type_into("#user", "bob"),
    ]);

    let outcome = h.executor.run(&instruction, &Variables::new()).await.unwrap();
    assert_eq!(outcome.status, ExecutionStatus::Success);
    let first = &outcome.log.step_outcomes[0];
    assert!(!first.success);
    assert!(first.continued);
    assert_eq!(first.error_kind.as_deref(), Some("not_found"));
    assert_eq!(first.attempts, 3);
    assert!(outcome.log.step_outcomes[1].success);
    assert_eq!(h.page.value_of("#user").as_deref(), Some("bob"));
}

#[tokio::test(start_paused = true)]
async fn test_failure_stops_the_run() {
    let h = harness(fast_engine(), ExecutorConfig::default());
    let instruction = Instruction::new("Strict").with_steps(vec![
        click("#missing"),
        type_into("#user", "never"),
    ]);

    let outcome = h.executor.run(&instruction, &Variables::new()).await.unwrap();
    assert_eq!(outcome.status, ExecutionStatus::Failed);
    assert_eq!(outcome.log.step_outcomes.len(), 1);
    assert!(outcome.log.error.as_deref().unwrap().contains("#missing"));
    assert_eq!(h.page.value_of("#user").as_deref(), Some(""));
    assert_eq!(h.executor.state(), ExecutorState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_stop_returns_to_idle_and_logs() {
    let h = harness(fast_engine(), ExecutorConfig::default());
    let instruction = Instruction::new("Slow").with_steps(vec![wait(10_000), click("#login")]);

    let executor = h.executor.clone();
    let running = tokio::spawn(async move { executor.run(&instruction, &Variables::new()).await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.executor.state(), ExecutorState::Running);

    assert!(h.executor.stop());
    let outcome = running.await.unwrap().unwrap();

    assert_eq!(outcome.status, ExecutionStatus::Failed);
    assert_eq!(
        outcome.log.step_outcomes[0].error_kind.as_deref(),
        Some("cancelled")
    );
    assert_eq!(h.executor.state(), ExecutorState::Idle);
    assert_eq!(h.store.logs.lock().len(), 1);
    assert!(!h.executor.stop());
}

#[tokio::test(start_paused = true)]
async fn test_second_run_is_busy() {
    let h = harness(fast_engine(), ExecutorConfig::default());
    let instruction = Instruction::new("Slow").with_steps(vec![wait(1_000)]);

    let executor = h.executor.clone();
    let first = instruction.clone();
    let running = tokio::spawn(async move { executor.run(&first, &Variables::new()).await });
    tokio::time::sleep(Duration::from_millis(10)).await;

    let second = h.executor.run(&instruction, &Variables::new()).await;
    assert!(matches!(second, Err(ReplayError::Busy(_))));

    let outcome = running.await.unwrap().unwrap();
    assert!(outcome.status.is_success());
    assert_eq!(h.store.logs.lock().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_deadline() {
    let h = harness(
        fast_engine(),
        ExecutorConfig {
            step_timeout_ms: 30_000,
            run_timeout_ms: 1_000,
        },
    );
    let instruction = Instruction::new("Too slow").with_steps(vec![wait(5_000), wait(5_000)]);

    let started = tokio::time::Instant::now();
    let outcome = h.executor.run(&instruction, &Variables::new()).await.unwrap();
    assert_eq!(outcome.status, ExecutionStatus::Failed);
    assert_eq!(
        outcome.log.step_outcomes[0].error_kind.as_deref(),
        Some("timeout")
    );
    assert_eq!(started.elapsed(), Duration::from_millis(1_000));
}

#[tokio::test(start_paused = true)]
async fn test_step_timeout() {
    let h = harness(
        EngineConfig {
            element_timeout_ms: 60_000,
            ..fast_engine()
        },
        ExecutorConfig {
            step_timeout_ms: 2_000,
            run_timeout_ms: 300_000,
        },
    );
    let instruction = Instruction::new("Hang").with_steps(vec![click("#nowhere")]);

    let outcome = h.executor.run(&instruction, &Variables::new()).await.unwrap();
    let first = &outcome.log.step_outcomes[0];
    assert_eq!(first.error_kind.as_deref(), Some("timeout"));
    assert_eq!(first.duration_ms, 2_000);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_run_still_cleans_up() {
    let h = harness(fast_engine(), ExecutorConfig::default());
    let instruction = Instruction::new("Abandoned").with_steps(vec![wait(10_000)]);

    let executor = h.executor.clone();
    let running = tokio::spawn(async move { executor.run(&instruction, &Variables::new()).await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    running.abort();
    let _ = running.await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(h.executor.state(), ExecutorState::Idle);
    let logs = h.store.logs.lock();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].error.as_deref(), Some("run aborted"));
}

#[tokio::test(start_paused = true)]
async fn test_run_by_id_and_state_transitions() {
    let h = harness(fast_engine(), ExecutorConfig::default());
    let saved = h
        .store
        .save(Instruction::new("Quick").with_steps(vec![click("#login")]))
        .await
        .unwrap();

    let mut states = h.executor.subscribe();
    let outcome = h.executor.run_by_id(&saved.id, &Variables::new()).await.unwrap();
    assert!(outcome.status.is_success());
    assert!(states.has_changed().unwrap());
    assert_eq!(*states.borrow_and_update(), ExecutorState::Idle);

    let missing = h.executor.run_by_id("nope", &Variables::new()).await;
    assert!(matches!(missing, Err(ReplayError::Store(_))));
}
