use super::*;

#[test]
fn test_default_config_values() {
    let config = Config::default();
    assert_eq!(config.engine.poll_interval_ms, 100);
    assert_eq!(config.engine.element_timeout_ms, 5000);
    assert_eq!(config.engine.typing_mode, TypingMode::PerCharacter);
    assert!(config.engine.allow_scripts);
    assert!(!config.engine.strict);
    assert_eq!(config.engine.retry.max_attempts, 3);
    assert_eq!(config.executor.step_timeout_ms, 30_000);
    assert_eq!(config.recorder.pause_threshold_ms, 3000);
    assert_eq!(config.recorder.input_debounce_ms, 500);
    assert_eq!(config.selectors.attribute_max_len, 30);
    assert_eq!(config.storage.backend, StorageBackend::File);
    assert_eq!(config.browser.endpoint, "http://localhost:9222");
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_empty_toml_matches_defaults() {
    let config: Config = toml::from_str("").unwrap();
    assert_eq!(config.engine.hover_dwell_ms, EngineConfig::default().hover_dwell_ms);
    assert_eq!(config.recorder.scroll_threshold_px, 50.0);
}

#[test]
fn test_partial_section_keeps_other_defaults() {
    let config: Config = toml::from_str(
        r#"
        [engine]
        typing_mode = "instant"

        [engine.retry]
        max_attempts = 5
        "#,
    )
    .unwrap();
    assert_eq!(config.engine.typing_mode, TypingMode::Instant);
    assert_eq!(config.engine.poll_interval_ms, 100);
    assert_eq!(config.engine.retry.max_attempts, 5);
    assert_eq!(config.engine.retry.base_delay_ms, 200);
}

#[test]
fn test_retry_delay_doubles_and_caps() {
    let retry = RetryConfig::default();
    assert_eq!(retry.delay_for(1).as_millis(), 200);
    assert_eq!(retry.delay_for(2).as_millis(), 400);
    assert_eq!(retry.delay_for(3).as_millis(), 800);
    assert_eq!(retry.delay_for(5).as_millis(), 2000);
    assert_eq!(retry.delay_for(80).as_millis(), 2000);
}

#[test]
fn test_storage_dir_is_expanded() {
    let storage = StorageConfig::default();
    assert!(!storage.dir_path().to_string_lossy().starts_with('~'));
}

#[test]
fn test_unknown_backend_is_rejected() {
    let result: Result<Config, _> = toml::from_str("[storage]\nbackend = \"sqlite\"");
    assert!(result.is_err());
}
