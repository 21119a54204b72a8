//! End-to-end recording of a login form into an instruction.

use webreplay_protocols::{Action, Instruction, Modifiers, SelectorStrategy};
use webreplay_recorder::{Recorder, RecorderEvent, RecorderState};
use webreplay_selectors::{ElementTree, resolve_unique};

const LOGIN_PAGE: &str = r#"
<html><body>
  <header><a id="login" href="/login">Log in</a></header>
  <form id="form" action="/session">
    <label>User <input id="user" name="user"></label>
    <label>Password <input id="pass" type="password" name="pass"></label>
    <input id="remember" type="checkbox">
    <button id="submit" type="submit">Sign in</button>
  </form>
</body></html>
"#;

#[test]
fn test_login_flow_recording() {
    let tree = ElementTree::from_html(LOGIN_PAGE);
    let at = |selector: &str| tree.query_css(selector).unwrap()[0];

    let mut recorder = Recorder::default();
    recorder.start(0);

    let events = vec![
        RecorderEvent::click(1_000, at("#login")),
        RecorderEvent::focus(1_200, Some(at("#user"))),
        RecorderEvent::input(1_300, at("#user"), "b"),
        RecorderEvent::input(1_400, at("#user"), "bo"),
        RecorderEvent::input(1_500, at("#user"), "bob"),
        RecorderEvent::focus(1_700, Some(at("#pass"))),
        RecorderEvent::input(1_800, at("#pass"), "hunter2"),
        RecorderEvent::click(2_000, at("#remember")),
        RecorderEvent::click(7_000, at("#submit")),
        RecorderEvent::submit(7_010, at("#form")),
    ];
    for event in &events {
        recorder.handle(&tree, event).unwrap();
    }
    let steps = recorder.stop();
    assert_eq!(recorder.state(), RecorderState::Stopped);

    let names: Vec<&str> = steps.iter().map(|s| s.action_name()).collect();
    assert_eq!(
        names,
        vec![
            "click",
            "input_text",
            "click",
            "wait_for_time",
            "click",
        ]
    );
    assert!(steps.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    assert_eq!(steps[3].action, Action::WaitForTime { duration_ms: 5000 });

    // Password typing never reaches the recording.
    let typed: Vec<&str> = steps
        .iter()
        .filter_map(|s| match &s.action {
            Action::InputText { value, .. } => Some(value.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(typed, vec!["bob"]);

    // Every recorded selector relocates its target on the same snapshot.
    for step in &steps {
        if let Some(selector) = &step.selector {
            assert!(resolve_unique(&tree, &selector.primary).unwrap().is_some());
            assert_eq!(selector.primary.strategy, SelectorStrategy::Id);
        }
    }

    let instruction = Instruction::new("Log in").with_steps(steps);
    let json = serde_json::to_string(&instruction).unwrap();
    let parsed: Instruction = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.steps, instruction.steps);
}

#[test]
fn test_enter_submits_without_duplicate_click() {
    let tree = ElementTree::from_html(LOGIN_PAGE);
    let user = tree.query_css("#user").unwrap()[0];
    let form = tree.query_css("#form").unwrap()[0];

    let mut recorder = Recorder::default();
    recorder.start(0);
    recorder.handle(&tree, &RecorderEvent::input(100, user, "bob")).unwrap();
    recorder
        .handle(
            &tree,
            &RecorderEvent::key_down(300, Some(user), "Enter", Modifiers::default()),
        )
        .unwrap();
    recorder.handle(&tree, &RecorderEvent::submit(320, form)).unwrap();

    let names: Vec<&str> = recorder.stop().iter().map(|s| s.action_name()).collect();
    assert_eq!(names, vec!["input_text", "keyboard_shortcut"]);
}
