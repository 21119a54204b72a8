use super::*;
use webreplay_protocols::SelectorStrategy;

const PAGE: &str = r#"
<html><body>
  <nav><a id="docs-link" href="/docs"><span>Read the docs</span></a></nav>
  <form id="login">
    <input id="user" type="text" name="user">
    <input id="pass" type="password" name="pass">
    <input id="agree" type="checkbox">
    <textarea id="note"></textarea>
    <select id="country"><option value="de">Germany</option><option value="fr">France</option></select>
    <input id="avatar" type="file">
    <button id="submit" type="submit">Sign in</button>
  </form>
  <form id="search"><input id="q" name="q"><button>Go</button></form>
  <form id="bare"><input id="x" name="x"></form>
  <div id="panel" style="overflow:auto"><p>long</p></div>
</body></html>
"#;

fn tree() -> ElementTree {
    ElementTree::from_html(PAGE)
}

fn node(tree: &ElementTree, selector: &str) -> NodeId {
    tree.query_css(selector).unwrap()[0]
}

fn recording() -> Recorder {
    let mut recorder = Recorder::default();
    recorder.start(0);
    recorder
}

fn actions(steps: &[Step]) -> Vec<&'static str> {
    steps.iter().map(|s| s.action_name()).collect()
}

fn input_value(step: &Step) -> &str {
    match &step.action {
        Action::InputText { value, .. } => value,
        other => panic!("expected input_text, got {}", other.name()),
    }
}

#[test]
fn test_lifecycle_transitions() {
    let mut recorder = Recorder::default();
    assert_eq!(recorder.state(), RecorderState::Idle);
    assert!(recorder.stop().is_empty());
    assert_eq!(recorder.state(), RecorderState::Idle);

    recorder.start(10);
    assert_eq!(recorder.state(), RecorderState::Recording);
    assert_eq!(recorder.started_at(), Some(10));

    recorder.pause();
    assert_eq!(recorder.state(), RecorderState::Paused);
    recorder.start(20);
    assert_eq!(recorder.state(), RecorderState::Recording);
    assert_eq!(recorder.started_at(), Some(10));

    recorder.stop();
    assert_eq!(recorder.state(), RecorderState::Stopped);
    recorder.start(30);
    assert_eq!(recorder.state(), RecorderState::Recording);
    assert_eq!(recorder.started_at(), Some(30));
}

#[test]
fn test_start_while_recording_keeps_steps() {
    let tree = tree();
    let mut recorder = recording();
    recorder
        .handle(&tree, &RecorderEvent::click(100, node(&tree, "#submit")))
        .unwrap();
    recorder.start(200);
    assert_eq!(recorder.steps().len(), 1);
}

#[test]
fn test_events_ignored_unless_recording() {
    let tree = tree();
    let mut recorder = Recorder::default();
    let click = RecorderEvent::click(100, node(&tree, "#submit"));
    recorder.handle(&tree, &click).unwrap();
    assert!(recorder.steps().is_empty());

    recorder.start(0);
    recorder.pause();
    recorder.handle(&tree, &click).unwrap();
    assert!(recorder.steps().is_empty());
}

#[test]
fn test_click_records_selector_and_link_context() {
    let tree = tree();
    let mut recorder = recording();
    let span = node(&tree, "#docs-link > span");
    recorder.handle(&tree, &RecorderEvent::click(100, span)).unwrap();

    let steps = recorder.stop();
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].timestamp, 100);
    match &steps[0].action {
        Action::Click {
            button, context, ..
        } => {
            assert_eq!(*button, ClickButton::Left);
            let context = context.as_ref().unwrap();
            assert_eq!(context.kind, ClickTargetKind::Link);
            assert_eq!(context.text.as_deref(), Some("Read the docs"));
            assert_eq!(context.href.as_deref(), Some("/docs"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_context_menu_is_right_click() {
    let tree = tree();
    let mut recorder = recording();
    recorder
        .handle(&tree, &RecorderEvent::context_menu(100, node(&tree, "#submit")))
        .unwrap();
    let steps = recorder.stop();
    assert!(matches!(
        &steps[0].action,
        Action::Click { button: ClickButton::Right, context: Some(c), .. } if c.kind == ClickTargetKind::Button
    ));
}

#[test]
fn test_inputs_within_debounce_coalesce() {
    let tree = tree();
    let user = node(&tree, "#user");
    let mut recorder = recording();
    recorder.handle(&tree, &RecorderEvent::input(100, user, "b")).unwrap();
    recorder.handle(&tree, &RecorderEvent::input(300, user, "bo")).unwrap();
    recorder.handle(&tree, &RecorderEvent::input(700, user, "bob")).unwrap();
    assert!(recorder.steps().is_empty());
    assert_eq!(recorder.next_deadline(), Some(1200));

    assert!(!recorder.tick(1199));
    assert!(recorder.tick(1200));
    let steps = recorder.stop();
    assert_eq!(steps.len(), 1);
    assert_eq!(input_value(&steps[0]), "bob");
    assert_eq!(steps[0].timestamp, 700);
    assert!(matches!(steps[0].action, Action::InputText { clear_first: true, .. }));
    assert_eq!(steps[0].selector.as_ref().unwrap().primary.value, "#user");
}

#[test]
fn test_switching_fields_flushes_previous_buffer() {
    let tree = tree();
    let mut recorder = recording();
    recorder
        .handle(&tree, &RecorderEvent::input(100, node(&tree, "#user"), "bob"))
        .unwrap();
    recorder
        .handle(&tree, &RecorderEvent::input(200, node(&tree, "#note"), "hi"))
        .unwrap();
    assert_eq!(recorder.steps().len(), 1);
    assert_eq!(input_value(&recorder.steps()[0]), "bob");

    let steps = recorder.stop();
    assert_eq!(steps.len(), 2);
    assert_eq!(input_value(&steps[1]), "hi");
}

#[test]
fn test_same_field_after_expiry_updates_in_place() {
    let tree = tree();
    let user = node(&tree, "#user");
    let mut recorder = recording();
    recorder.handle(&tree, &RecorderEvent::input(100, user, "bo")).unwrap();
    recorder.tick(700);
    let first_id = recorder.steps()[0].id.clone();

    recorder.handle(&tree, &RecorderEvent::input(1500, user, "bob")).unwrap();
    let steps = recorder.stop();
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].id, first_id);
    assert_eq!(input_value(&steps[0]), "bob");
    assert_eq!(steps[0].timestamp, 1500);
}

#[test]
fn test_focus_change_flushes() {
    let tree = tree();
    let mut recorder = recording();
    let user = node(&tree, "#user");
    recorder.handle(&tree, &RecorderEvent::input(100, user, "bob")).unwrap();
    recorder.handle(&tree, &RecorderEvent::focus(150, Some(user))).unwrap();
    assert!(recorder.has_pending_input());
    recorder
        .handle(&tree, &RecorderEvent::focus(200, Some(node(&tree, "#pass"))))
        .unwrap();
    assert!(!recorder.has_pending_input());
    assert_eq!(recorder.steps().len(), 1);
}

#[test]
fn test_password_and_checkbox_input_not_recorded() {
    let tree = tree();
    let mut recorder = recording();
    recorder
        .handle(&tree, &RecorderEvent::input(100, node(&tree, "#pass"), "hunter2"))
        .unwrap();
    recorder
        .handle(&tree, &RecorderEvent::input(200, node(&tree, "#agree"), "on"))
        .unwrap();
    assert!(!recorder.has_pending_input());
    assert!(recorder.stop().is_empty());
}

#[test]
fn test_idle_gap_inserts_one_rounded_wait() {
    let tree = tree();
    let submit = node(&tree, "#submit");
    let mut recorder = recording();
    recorder.handle(&tree, &RecorderEvent::click(1000, submit)).unwrap();
    recorder.handle(&tree, &RecorderEvent::click(5049, submit)).unwrap();

    let steps = recorder.stop();
    assert_eq!(actions(&steps), vec!["click", "wait_for_time", "click"]);
    assert_eq!(steps[1].action, Action::WaitForTime { duration_ms: 4000 });
    assert_eq!(steps[1].timestamp, 1000 + 4049 / 2);
}

#[test]
fn test_wait_rounds_half_up() {
    let tree = tree();
    let submit = node(&tree, "#submit");
    let mut recorder = recording();
    recorder.handle(&tree, &RecorderEvent::click(0, submit)).unwrap();
    recorder.handle(&tree, &RecorderEvent::click(3050, submit)).unwrap();
    let steps = recorder.stop();
    assert_eq!(steps[1].action, Action::WaitForTime { duration_ms: 3100 });
}

#[test]
fn test_short_gap_and_first_event_insert_no_wait() {
    let tree = tree();
    let submit = node(&tree, "#submit");
    let mut recorder = recording();
    recorder.handle(&tree, &RecorderEvent::click(60_000, submit)).unwrap();
    recorder.handle(&tree, &RecorderEvent::click(62_999, submit)).unwrap();
    assert_eq!(actions(&recorder.stop()), vec!["click", "click"]);
}

#[test]
fn test_wait_follows_flushed_input() {
    let tree = tree();
    let mut recorder = recording();
    recorder
        .handle(&tree, &RecorderEvent::input(1000, node(&tree, "#user"), "bob"))
        .unwrap();
    recorder
        .handle(&tree, &RecorderEvent::click(9000, node(&tree, "#submit")))
        .unwrap();
    let steps = recorder.stop();
    assert_eq!(actions(&steps), vec!["input_text", "wait_for_time", "click"]);
    assert!(steps.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}

#[test]
fn test_select_change_is_immediate() {
    let tree = tree();
    let mut recorder = recording();
    recorder
        .handle(&tree, &RecorderEvent::change(100, node(&tree, "#country"), "fr"))
        .unwrap();
    recorder
        .handle(&tree, &RecorderEvent::change(150, node(&tree, "#agree"), "on"))
        .unwrap();
    assert_eq!(recorder.steps().len(), 1);
    assert_eq!(
        recorder.steps()[0].action,
        Action::SelectOption {
            value: "fr".to_string()
        }
    );
}

#[test]
fn test_modifier_shortcut_recorded_with_focused_element() {
    let tree = tree();
    let mut recorder = recording();
    let ctrl = Modifiers {
        ctrl: true,
        ..Modifiers::default()
    };
    recorder
        .handle(&tree, &RecorderEvent::key_down(100, Some(node(&tree, "#note")), "S", ctrl))
        .unwrap();
    recorder
        .handle(&tree, &RecorderEvent::key_down(200, Some(node(&tree, "body")), "a", ctrl))
        .unwrap();
    recorder
        .handle(&tree, &RecorderEvent::key_down(300, None, "q", ctrl))
        .unwrap();
    recorder
        .handle(&tree, &RecorderEvent::key_down(400, None, "s", Modifiers::default()))
        .unwrap();

    let steps = recorder.stop();
    assert_eq!(steps.len(), 2);
    assert!(matches!(
        &steps[0].action,
        Action::KeyboardShortcut { key, ctrl: true, .. } if key == "S"
    ));
    assert_eq!(steps[0].selector.as_ref().unwrap().primary.value, "#note");
    assert!(steps[1].selector.is_none());
}

#[test]
fn test_enter_suppresses_following_submit() {
    let tree = tree();
    let user = node(&tree, "#user");
    let mut recorder = recording();
    recorder.handle(&tree, &RecorderEvent::input(100, user, "bob")).unwrap();
    recorder
        .handle(&tree, &RecorderEvent::key_down(200, Some(user), "Enter", Modifiers::default()))
        .unwrap();
    recorder
        .handle(&tree, &RecorderEvent::submit(250, node(&tree, "#login")))
        .unwrap();

    let steps = recorder.stop();
    assert_eq!(actions(&steps), vec!["input_text", "keyboard_shortcut"]);
    assert!(matches!(&steps[1].action, Action::KeyboardShortcut { key, .. } if key == "Enter"));
}

#[test]
fn test_submit_after_window_records_submit_click() {
    let tree = tree();
    let user = node(&tree, "#user");
    let mut recorder = recording();
    recorder
        .handle(&tree, &RecorderEvent::key_down(200, Some(user), "Enter", Modifiers::default()))
        .unwrap();
    recorder
        .handle(&tree, &RecorderEvent::submit(2000, node(&tree, "#login")))
        .unwrap();

    let steps = recorder.stop();
    assert_eq!(actions(&steps), vec!["keyboard_shortcut", "click"]);
    let selector = steps[1].selector.as_ref().unwrap();
    assert_eq!(selector.primary.value, "#submit");
    match &steps[1].action {
        Action::Click { context, .. } => {
            let context = context.as_ref().unwrap();
            assert_eq!(context.kind, ClickTargetKind::FormSubmit);
            assert_eq!(context.text.as_deref(), Some("Sign in"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_submit_control_fallbacks() {
    let tree = tree();
    let mut recorder = recording();
    recorder
        .handle(&tree, &RecorderEvent::submit(100, node(&tree, "#search")))
        .unwrap();
    recorder
        .handle(&tree, &RecorderEvent::submit(200, node(&tree, "#bare")))
        .unwrap();
    let steps = recorder.stop();

    let button = node(&tree, "#search > button");
    assert_eq!(
        resolve_primary(&tree, &steps[0]),
        button,
        "untyped button is the submit control"
    );
    assert_eq!(steps[1].selector.as_ref().unwrap().primary.value, "#bare");
}

fn resolve_primary(tree: &ElementTree, step: &Step) -> NodeId {
    let primary = &step.selector.as_ref().unwrap().primary;
    webreplay_selectors::resolve_unique(tree, primary)
        .unwrap()
        .unwrap()
}

#[test]
fn test_scroll_throttle_and_threshold() {
    let tree = tree();
    let mut recorder = recording();
    recorder.handle(&tree, &RecorderEvent::scroll(100, None, 0.0, 30.0)).unwrap();
    recorder.handle(&tree, &RecorderEvent::scroll(200, None, 0.0, 400.0)).unwrap();
    recorder.handle(&tree, &RecorderEvent::scroll(600, None, 0.0, 900.0)).unwrap();
    recorder.handle(&tree, &RecorderEvent::scroll(1300, None, 0.0, 420.0)).unwrap();
    recorder
        .handle(&tree, &RecorderEvent::scroll(1400, Some(node(&tree, "#panel")), 0.0, 1200.0))
        .unwrap();

    let steps = recorder.stop();
    assert_eq!(steps.len(), 2);
    assert_eq!(
        steps[0].action,
        Action::Scroll {
            x: 0.0,
            y: 400.0,
            smooth: true
        }
    );
    assert!(steps[0].selector.is_none());
    assert_eq!(steps[1].selector.as_ref().unwrap().primary.value, "#panel");
}

#[test]
fn test_file_change_records_metadata_only() {
    let tree = tree();
    let mut recorder = recording();
    let files = vec![FileMeta {
        name: "me.png".to_string(),
        size: 2048,
        mime_type: "image/png".to_string(),
    }];
    recorder
        .handle(&tree, &RecorderEvent::file_change(100, node(&tree, "#avatar"), files.clone()))
        .unwrap();
    let steps = recorder.stop();
    assert_eq!(
        steps[0].action,
        Action::FileUpload {
            files,
            paths: Vec::new()
        }
    );
}

#[test]
fn test_late_flush_is_inserted_in_order() {
    let tree = tree();
    let mut recorder = recording();
    recorder
        .handle(&tree, &RecorderEvent::input(100, node(&tree, "#user"), "bob"))
        .unwrap();
    recorder.handle(&tree, &RecorderEvent::scroll(300, None, 0.0, 200.0)).unwrap();
    let steps = recorder.stop();
    assert_eq!(actions(&steps), vec!["input_text", "scroll"]);
}

#[test]
fn test_pause_flushes_and_resume_forgets_gap() {
    let tree = tree();
    let submit = node(&tree, "#submit");
    let mut recorder = recording();
    recorder
        .handle(&tree, &RecorderEvent::input(100, node(&tree, "#user"), "bob"))
        .unwrap();
    recorder.pause();
    assert_eq!(recorder.steps().len(), 1);
    assert_eq!(recorder.next_deadline(), None);

    recorder.resume();
    recorder.handle(&tree, &RecorderEvent::click(60_000, submit)).unwrap();
    assert_eq!(actions(&recorder.stop()), vec!["input_text", "click"]);
}

#[test]
fn test_detached_target_is_an_error() {
    let mut tree = tree();
    let submit = node(&tree, "#submit");
    tree.remove_node(submit);
    let mut recorder = recording();
    let err = recorder
        .handle(&tree, &RecorderEvent::click(100, submit))
        .unwrap_err();
    assert!(matches!(err, RecorderError::Selector(SelectorError::DetachedNode(_))));
    assert!(recorder.steps().is_empty());
}

#[test]
fn test_generated_selectors_prefer_ids() {
    let tree = tree();
    let mut recorder = recording();
    recorder
        .handle(&tree, &RecorderEvent::click(100, node(&tree, "#submit")))
        .unwrap();
    let steps = recorder.stop();
    let selector = steps[0].selector.as_ref().unwrap();
    assert_eq!(selector.primary.strategy, SelectorStrategy::Id);
    assert!(!selector.alternatives.is_empty());
}

#[test]
fn test_submit_after_click_on_submit_control_is_suppressed() {
    let tree = tree();
    let mut recorder = recording();
    recorder
        .handle(&tree, &RecorderEvent::click(100, node(&tree, "#submit")))
        .unwrap();
    recorder
        .handle(&tree, &RecorderEvent::submit(110, node(&tree, "#login")))
        .unwrap();
    assert_eq!(actions(&recorder.stop()), vec!["click"]);
}
