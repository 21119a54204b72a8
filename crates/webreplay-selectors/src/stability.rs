//! Heuristics for telling hand-written identifiers from generated ones.

use std::sync::LazyLock;

use regex::Regex;

/// Test-oriented attributes, checked before any other `data-*` attribute.
pub const TEST_ATTRIBUTES: &[&str] = &[
    "data-testid",
    "data-test-id",
    "data-test",
    "data-cy",
    "data-qa",
    "data-automation-id",
    "data-e2e",
];

/// Attributes used as the Aria strategy's anchor, in priority order.
pub const ARIA_ATTRIBUTES: &[&str] = &["aria-label", "aria-labelledby", "aria-describedby", "role"];

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().filter_map(|p| Regex::new(p).ok()).collect()
}

static UNSTABLE_ID: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        // Framework-generated prefixes.
        r"^ember\d+$",
        r"^react-",
        r"^:r[0-9a-z]*:$",
        r"^«r[0-9a-z]*»$",
        r"^mui-\d+",
        r"^ext-(gen|comp|element)-?\d+",
        r"^yui_",
        r"^j_idt?\d+",
        r"^ng-\d",
        r"^radix-",
        r"^headlessui-",
        r"^(gwt|uid|id)[-_]?\d+$",
        r"^__",
        // Pure numeric.
        r"^\d+$",
        // Boolean-ish literals.
        r"(?i)^(true|false|null|undefined|nan)$",
    ])
});

static UNSTABLE_CLASS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        // CSS-in-JS and CSS modules.
        r"^css-[0-9a-z]+",
        r"^sc-[A-Za-z]+",
        r"^jsx-\d+",
        r"^emotion-",
        r"^makeStyles-",
        r"^Mui[A-Za-z]+-",
        r"^ng-",
        r"^v-[0-9a-f]{6,}",
        r"^svelte-[0-9a-z]+",
        // State classes that change under the user's pointer.
        r"^(is-|has-)?(active|hover|focus|focused|selected|open|disabled|visible|hidden)$",
        r"\d{4,}",
    ])
});

/// Whether `s` contains a run of at least `min_len` hex digits with a decimal
/// digit in it. Plain words made of a-f letters do not count.
fn has_hex_run(s: &str, min_len: usize) -> bool {
    s.split(|c: char| !c.is_ascii_hexdigit())
        .any(|run| run.len() >= min_len && run.bytes().any(|b| b.is_ascii_digit()))
}

/// CSS-modules style suffix: `Button_root__a8Xk3`.
fn has_module_hash(class: &str) -> bool {
    let Some((_, last)) = class.rsplit_once('_') else {
        return false;
    };
    last.len() >= 5
        && last.chars().all(|c| c.is_ascii_alphanumeric())
        && last.chars().any(|c| c.is_ascii_digit())
        && last.chars().any(|c| c.is_ascii_alphabetic())
}

/// Whether an `id` looks hand-written and is worth anchoring on.
pub fn is_stable_id(id: &str) -> bool {
    let id = id.trim();
    !id.is_empty()
        && !id.contains(char::is_whitespace)
        && !has_hex_run(id, 8)
        && !UNSTABLE_ID.iter().any(|re| re.is_match(id))
}

/// Whether a class name is a meaningful styling hook rather than a generated hash.
pub fn is_stable_class(class: &str) -> bool {
    !class.is_empty()
        && crate::css::is_identifier(class)
        && !has_hex_run(class, 6)
        && !has_module_hash(class)
        && !UNSTABLE_CLASS.iter().any(|re| re.is_match(class))
}

/// Whether a `data-*` value is usable as a selector anchor.
pub fn is_stable_attribute_value(value: &str, max_len: usize) -> bool {
    let value = value.trim();
    !value.is_empty() && value.chars().count() <= max_len && !value.contains('\n')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_ids() {
        for id in ["login", "submit-button", "main_nav", "userEmail", "step2"] {
            assert!(is_stable_id(id), "{id} should be stable");
        }
    }

    #[test]
    fn test_unstable_ids() {
        for id in [
            "ember123",
            "react-select-2-input",
            ":r1:",
            "mui-42",
            "ext-gen1234",
            "12345",
            "a1b2c3d4e5f6",
            "card-9f86d081884c7d65",
            "550e8400-e29b-41d4-a716-446655440000",
            "true",
            "undefined",
            "",
            "has space",
        ] {
            assert!(!is_stable_id(id), "{id} should be unstable");
        }
    }

    #[test]
    fn test_class_filter() {
        for class in ["btn", "btn-primary", "nav-link", "card", "card__title", "feedback"] {
            assert!(is_stable_class(class), "{class} should be stable");
        }
        for class in [
            "css-1x2y3z",
            "sc-bdVaJa",
            "jsx-123456",
            "Button_root__a8Xk3",
            "active",
            "is-selected",
            "MuiButton-root",
            "h-8f3a9c",
        ] {
            assert!(!is_stable_class(class), "{class} should be filtered");
        }
    }

    #[test]
    fn test_attribute_value_length() {
        assert!(is_stable_attribute_value("save", 30));
        assert!(!is_stable_attribute_value("", 30));
        assert!(!is_stable_attribute_value(&"x".repeat(31), 30));
    }
}
