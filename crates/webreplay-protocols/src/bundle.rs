//! Instruction file format used by import and export.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::instruction::Instruction;

/// Current bundle format version.
pub const BUNDLE_VERSION: &str = "1.0";

/// `{ version, exported, instructions }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstructionBundle {
    pub version: String,
    pub exported: DateTime<Utc>,
    pub instructions: Vec<Instruction>,
}

impl InstructionBundle {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self {
            version: BUNDLE_VERSION.to_string(),
            exported: Utc::now(),
            instructions,
        }
    }

    /// Serialize as a single newline-free JSON line.
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a bundle; any JSON whitespace is accepted.
    pub fn parse(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }

    /// Whether the bundle's major version is one this build understands.
    pub fn is_supported_version(&self) -> bool {
        let major = |v: &str| v.split('.').next().map(str::to_string);
        major(&self.version) == major(BUNDLE_VERSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::{SelectorDescriptor, SelectorSet};
    use crate::step::{Action, Condition, Step};

    #[test]
    fn test_json_line_has_no_newlines_and_roundtrips() {
        let step = Step::new(Action::InputText {
            value: "line one\nline two".to_string(),
            clear_first: true,
            typing_delay_ms: Some(0),
        })
        .with_selector(
            SelectorSet::css("#note").with_alternative(SelectorDescriptor::xpath("//textarea[1]")),
        );
        let wait = Step::new(Action::WaitForCondition {
            condition: Condition::Custom {
                expression: "window.ready === true".to_string(),
            },
            timeout_ms: None,
        })
        .with_continue_on_error(true);
        let instruction = Instruction::new("notes").with_steps(vec![step, wait]);

        let bundle = InstructionBundle::new(vec![instruction]);
        let line = bundle.to_json_line().unwrap();
        assert!(!line.contains('\n'));

        let parsed = InstructionBundle::parse(&line).unwrap();
        assert_eq!(parsed, bundle);
    }

    #[test]
    fn test_parse_accepts_pretty_json() {
        let bundle = InstructionBundle::new(vec![Instruction::new("pretty")]);
        let pretty = serde_json::to_string_pretty(&bundle).unwrap();
        assert_eq!(InstructionBundle::parse(&pretty).unwrap(), bundle);
    }

    #[test]
    fn test_version_support() {
        let mut bundle = InstructionBundle::new(Vec::new());
        assert!(bundle.is_supported_version());
        bundle.version = "1.3".to_string();
        assert!(bundle.is_supported_version());
        bundle.version = "2.0".to_string();
        assert!(!bundle.is_supported_version());
    }
}
