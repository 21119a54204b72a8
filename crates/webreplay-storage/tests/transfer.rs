//! Export from one store, import into another.

use tempfile::TempDir;
use webreplay_protocols::{
    Action, Condition, Instruction, InstructionBundle, InstructionFilter, InstructionStore,
    SelectorDescriptor, SelectorSet, Step, StoreError, VariableDef, VariableType,
};
use webreplay_storage::{FileStore, MemoryStore, export_bundle, import_bundle};

fn checkout() -> Instruction {
    Instruction::new("Checkout")
        .with_url_pattern("https://shop.example/*")
        .with_variable("card", VariableDef::new(VariableType::Secret, ""))
        .with_steps(vec![
            Step::new(Action::Click {
                button: Default::default(),
                context: None,
                wait_after_ms: Some(250),
            })
            .with_selector(
                SelectorSet::css("#buy").with_alternative(SelectorDescriptor::text("Buy", "button")),
            ),
            Step::new(Action::WaitForCondition {
                condition: Condition::NetworkIdle { quiet_ms: 500 },
                timeout_ms: Some(10_000),
            })
            .with_continue_on_error(true),
        ])
}

#[tokio::test]
async fn test_export_then_import_into_file_store() {
    let source = MemoryStore::new();
    let saved = source.save(checkout()).await.unwrap();
    source.save(Instruction::new("Other")).await.unwrap();

    let line = export_bundle(&source, std::slice::from_ref(&saved.id))
        .await
        .unwrap();
    assert!(!line.contains('\n'));

    let temp_dir = TempDir::new().unwrap();
    let target = FileStore::new(temp_dir.path()).await.unwrap();
    let imported = import_bundle(&target, &line).await.unwrap();

    assert_eq!(imported.len(), 1);
    assert_eq!(imported[0].id, saved.id);
    assert_eq!(imported[0].steps, saved.steps);
    assert_eq!(imported[0].variables, saved.variables);
    assert_eq!(target.get(&saved.id).await.unwrap().steps, saved.steps);
}

#[tokio::test]
async fn test_export_all_when_no_ids() {
    let store = MemoryStore::new();
    store.save(checkout()).await.unwrap();
    store.save(Instruction::new("Other")).await.unwrap();

    let line = export_bundle(&store, &[]).await.unwrap();
    let bundle = InstructionBundle::parse(&line).unwrap();
    assert_eq!(bundle.instructions.len(), 2);
    assert_eq!(bundle.version, "1.0");
}

#[tokio::test]
async fn test_import_accepts_pretty_json() {
    let bundle = InstructionBundle::new(vec![checkout()]);
    let pretty = serde_json::to_string_pretty(&bundle).unwrap();

    let store = MemoryStore::new();
    let imported = import_bundle(&store, &pretty).await.unwrap();
    assert_eq!(imported.len(), 1);
    assert!(!imported[0].id.is_empty());
}

#[tokio::test]
async fn test_import_never_overwrites() {
    let store = MemoryStore::new();
    let original = store.save(checkout()).await.unwrap();
    let line = export_bundle(&store, &[]).await.unwrap();

    let imported = import_bundle(&store, &line).await.unwrap();
    assert_ne!(imported[0].id, original.id);
    assert_eq!(
        store.list(&InstructionFilter::default()).await.unwrap().len(),
        2
    );
}

#[tokio::test]
async fn test_import_rejects_unknown_version() {
    let mut bundle = InstructionBundle::new(vec![checkout()]);
    bundle.version = "2.0".to_string();
    let line = bundle.to_json_line().unwrap();

    let store = MemoryStore::new();
    let err = import_bundle(&store, &line).await.unwrap_err();
    assert!(matches!(err, StoreError::UnsupportedVersion(v) if v == "2.0"));

    let err = import_bundle(&store, "not json").await.unwrap_err();
    assert!(matches!(err, StoreError::Serialization(_)));
}
