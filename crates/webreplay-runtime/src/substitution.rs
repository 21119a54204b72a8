//! `{{name}}` placeholder substitution.
//!
//! Substitution is applied to a copy of a step just before it runs, so stored
//! instructions keep their placeholders. Unknown names are left verbatim.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use webreplay_protocols::{Step, Variables};

static PLACEHOLDER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").ok());

/// Replace every `{{name}}` in `text` with its bound value.
pub fn substitute(text: &str, variables: &Variables) -> String {
    let Some(re) = PLACEHOLDER.as_ref() else {
        return text.to_string();
    };
    if !text.contains("{{") {
        return text.to_string();
    }
    re.replace_all(text, |caps: &Captures<'_>| match variables.get(&caps[1]) {
        Some(value) => value.clone(),
        None => caps[0].to_string(),
    })
    .into_owned()
}

/// Copy of `step` with placeholders substituted in every string field,
/// selectors included.
pub fn substitute_step(step: &Step, variables: &Variables) -> Step {
    let mut step = step.clone();
    if variables.is_empty() {
        return step;
    }
    step.for_each_string_mut(&mut |value| {
        if value.contains("{{") {
            *value = substitute(value, variables);
        }
    });
    step
}

#[cfg(test)]
mod tests {
    use super::*;
    use webreplay_protocols::{Action, PositionAnchor, SelectorDescriptor, SelectorSet};

    fn vars(pairs: &[(&str, &str)]) -> Variables {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_substitute_known_and_unknown() {
        let variables = vars(&[("user", "bob"), ("host", "example.org")]);
        assert_eq!(substitute("hi {{user}}", &variables), "hi bob");
        assert_eq!(substitute("{{ user }}@{{host}}", &variables), "bob@example.org");
        assert_eq!(substitute("{{missing}} stays", &variables), "{{missing}} stays");
        assert_eq!(substitute("no placeholders", &variables), "no placeholders");
    }

    #[test]
    fn test_substituted_value_is_not_rescanned() {
        let variables = vars(&[("a", "{{b}}"), ("b", "x")]);
        assert_eq!(substitute("{{a}}", &variables), "{{b}}");
    }

    #[test]
    fn test_substitute_step_covers_selectors_and_payload() {
        let step = Step::new(Action::InputText {
            value: "{{pwd}}".to_string(),
            clear_first: true,
            typing_delay_ms: None,
        })
        .with_selector(SelectorSet::css("#{{field}}"));
        let variables = vars(&[("pwd", "secret"), ("field", "pass")]);

        let resolved = substitute_step(&step, &variables);
        assert_eq!(resolved.selector.as_ref().unwrap().primary.value, "#pass");
        match &resolved.action {
            Action::InputText { value, .. } => assert_eq!(value, "secret"),
            other => panic!("unexpected action {other:?}"),
        }
        // The original keeps its placeholders.
        assert_eq!(step.selector.unwrap().primary.value, "#{{field}}");
        assert_eq!(resolved.id, step.id);
    }

    #[test]
    fn test_substitute_step_covers_anchor_and_tag() {
        let position = SelectorDescriptor::position(PositionAnchor {
            landmark: "#{{form}}".to_string(),
            sibling_offset: -1,
            path: vec![0, 2],
        });
        let step = Step::new(Action::Hover { dwell_ms: None }).with_selector(
            SelectorSet::new(position)
                .with_alternative(SelectorDescriptor::text("{{label}}", "{{tag}}")),
        );
        let variables = vars(&[("form", "checkout"), ("label", "Pay"), ("tag", "button")]);

        let resolved = substitute_step(&step, &variables);
        let selector = resolved.selector.unwrap();
        let anchor = selector.primary.position.unwrap();
        assert_eq!(anchor.landmark, "#checkout");
        assert_eq!(anchor.path, vec![0, 2]);
        assert_eq!(selector.alternatives[0].value, "Pay");
        assert_eq!(selector.alternatives[0].tag.as_deref(), Some("button"));
    }
}
