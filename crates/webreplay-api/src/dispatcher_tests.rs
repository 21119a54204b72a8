use std::time::Duration;

use serde_json::json;
use webreplay_config::{EngineConfig, ExecutorConfig};
use webreplay_protocols::{Action, ClickButton, ExecutorState, SelectorSet, Step};
use webreplay_runtime::{ActionEngine, SnapshotPage};
use webreplay_storage::MemoryStore;

use super::*;

const PAGE: &str = r#"<html><body>
  <input id="user">
  <button id="go">Go</button>
</body></html>"#;

fn setup() -> (Arc<Dispatcher>, Arc<SnapshotPage>) {
    let page = Arc::new(SnapshotPage::from_html(PAGE));
    let engine = Arc::new(ActionEngine::new(
        page.clone(),
        EngineConfig {
            element_timeout_ms: 500,
            post_action_wait_ms: 0,
            ..Default::default()
        },
    ));
    let executor = Arc::new(InstructionExecutor::new(
        engine,
        Arc::new(MemoryStore::new()),
        ExecutorConfig::default(),
    ));
    (Arc::new(Dispatcher::new(executor)), page)
}

fn greet() -> Instruction {
    Instruction::new("Greet")
        .with_url_pattern("https://app.example/*")
        .with_steps(vec![
            Step::new(Action::InputText {
                value: "{{who}}".to_string(),
                clear_first: true,
                typing_delay_ms: Some(0),
            })
            .with_selector(SelectorSet::css("#user")),
            Step::new(Action::Click {
                button: ClickButton::Left,
                context: None,
                wait_after_ms: None,
            })
            .with_selector(SelectorSet::css("#go")),
        ])
}

async fn call(dispatcher: &Dispatcher, action: &str, payload: Value) -> Value {
    let response = dispatcher
        .handle(Request::new(action, payload).with_id(1))
        .await;
    assert_eq!(response.id, Some(json!(1)));
    match (response.result, response.error) {
        (Some(result), None) => result,
        (_, error) => panic!("{action} failed: {error:?}"),
    }
}

async fn save(dispatcher: &Dispatcher, instruction: Instruction) -> String {
    let saved = call(dispatcher, "save", json!({ "instruction": instruction })).await;
    saved["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_save_list_get_delete() {
    let (dispatcher, _) = setup();
    let id = save(&dispatcher, greet()).await;

    let listed = call(&dispatcher, "list", Value::Null).await;
    assert_eq!(listed["instructions"][0]["id"], json!(id));
    assert_eq!(listed["instructions"][0]["steps"], json!(2));

    let filtered = call(&dispatcher, "list", json!({ "url": "https://other.example/" })).await;
    assert_eq!(filtered["instructions"], json!([]));

    let fetched = call(&dispatcher, "get", json!({ "id": id })).await;
    assert_eq!(fetched["name"], json!("Greet"));

    call(&dispatcher, "delete", json!({ "id": id })).await;
    let missing = dispatcher.handle(Request::new("get", json!({ "id": id }))).await;
    assert_eq!(missing.error.unwrap().kind, "not_found");
}

#[tokio::test]
async fn test_save_accepts_minimal_instruction() {
    let (dispatcher, _) = setup();
    let saved = call(
        &dispatcher,
        "save",
        json!({ "instruction": { "name": "Empty" } }),
    )
    .await;
    assert!(!saved["id"].as_str().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_run_then_status_shows_log() {
    let (dispatcher, page) = setup();
    let id = save(&dispatcher, greet()).await;

    let outcome = call(
        &dispatcher,
        "run",
        json!({ "id": id, "variables": { "who": "ada" } }),
    )
    .await;
    assert_eq!(outcome["status"], json!("success"));
    assert_eq!(page.value_of("#user").as_deref(), Some("ada"));

    let status = call(&dispatcher, "status", json!({ "id": id })).await;
    assert_eq!(status["state"], json!("idle"));
    assert_eq!(status["logs"].as_array().unwrap().len(), 1);

    let bare = call(&dispatcher, "status", Value::Null).await;
    assert!(bare.get("logs").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_stop_interrupts_run() {
    let (dispatcher, _) = setup();
    let id = save(
        &dispatcher,
        Instruction::new("Slow").with_steps(vec![Step::new(Action::WaitForTime {
            duration_ms: 60_000,
        })]),
    )
    .await;

    let runner = dispatcher.clone();
    let running = tokio::spawn(async move {
        runner
            .handle(Request::new("run", json!({ "id": id })))
            .await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(dispatcher.executor().state(), ExecutorState::Running);

    let stopped = call(&dispatcher, "stop", Value::Null).await;
    assert_eq!(stopped["stopped"], json!(true));

    let response = running.await.unwrap();
    assert_eq!(response.result.unwrap()["status"], json!("failed"));
    assert_eq!(dispatcher.executor().state(), ExecutorState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_run_inline_instruction_body() {
    let (dispatcher, page) = setup();

    let outcome = call(
        &dispatcher,
        "run",
        json!({ "instruction": greet(), "variables": { "who": "grace" } }),
    )
    .await;
    assert_eq!(outcome["status"], json!("success"));
    assert_eq!(page.value_of("#user").as_deref(), Some("grace"));

    // Nothing was saved, but the run still left a log behind.
    let listed = call(&dispatcher, "list", Value::Null).await;
    assert_eq!(listed["instructions"], json!([]));
    let id = outcome["log"]["instruction_id"].as_str().unwrap().to_string();
    assert!(id.starts_with("inline-"));
    let status = call(&dispatcher, "status", json!({ "id": id })).await;
    assert_eq!(status["logs"].as_array().unwrap().len(), 1);
    assert_eq!(status["logs"][0]["status"], json!("success"));
}

#[tokio::test]
async fn test_run_requires_exactly_one_target() {
    let (dispatcher, _) = setup();

    let neither = dispatcher.handle(Request::new("run", json!({}))).await;
    assert_eq!(neither.error.unwrap().kind, "invalid_request");

    let both = dispatcher
        .handle(Request::new(
            "run",
            json!({ "id": "x", "instruction": { "name": "Both" } }),
        ))
        .await;
    assert_eq!(both.error.unwrap().kind, "invalid_request");
}

#[tokio::test]
async fn test_run_unknown_instruction() {
    let (dispatcher, _) = setup();
    let response = dispatcher
        .handle(Request::new("run", json!({ "id": "nope" })))
        .await;
    assert_eq!(response.error.unwrap().kind, "not_found");
}

#[tokio::test]
async fn test_export_import_through_requests() {
    let (dispatcher, _) = setup();
    save(&dispatcher, greet()).await;

    let exported = call(&dispatcher, "export", Value::Null).await;
    let data = exported["data"].as_str().unwrap().to_string();

    let (other, _) = setup();
    let imported = call(&other, "import", json!({ "data": data })).await;
    assert_eq!(imported["imported"][0]["name"], json!("Greet"));

    let bad = other
        .handle(Request::new("import", json!({ "data": "{\"version\":\"9.0\",\"exported\":\"2024-01-01T00:00:00Z\",\"instructions\":[]}" })))
        .await;
    assert_eq!(bad.error.unwrap().kind, "unsupported_version");
}

#[tokio::test]
async fn test_bad_requests() {
    let (dispatcher, _) = setup();

    let unknown = dispatcher.handle(Request::new("fly", Value::Null)).await;
    assert_eq!(unknown.error.unwrap().kind, "unknown_action");

    let missing_id = dispatcher.handle(Request::new("get", Value::Null)).await;
    assert_eq!(missing_id.error.unwrap().kind, "invalid_request");

    let stop_idle = call(&dispatcher, "stop", Value::Null).await;
    assert_eq!(stop_idle["stopped"], json!(false));
}
