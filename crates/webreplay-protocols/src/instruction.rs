//! Instruction envelope: a named step list plus variable declarations.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::step::Step;

/// Runtime variable bindings, name to value.
pub type Variables = BTreeMap<String, String>;

/// Placeholder shown instead of secret values.
pub const SECRET_MASK: &str = "******";

/// Declared type of an instruction variable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableType {
    #[default]
    String,
    Number,
    Boolean,
    /// Substituted like a string, masked wherever values are displayed.
    Secret,
}

/// Variable declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableDef {
    #[serde(rename = "type", default)]
    pub kind: VariableType,
    #[serde(default)]
    pub default: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl VariableDef {
    pub fn new(kind: VariableType, default: impl Into<String>) -> Self {
        Self {
            kind,
            default: default.into(),
            description: None,
        }
    }

    pub fn is_secret(&self) -> bool {
        self.kind == VariableType::Secret
    }
}

/// A named, persisted sequence of steps plus variable declarations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    /// Empty until the store assigns one.
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Glob over page URLs. `*` matches any run of characters.
    #[serde(default)]
    pub url_pattern: String,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub variables: BTreeMap<String, VariableDef>,
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub modified: DateTime<Utc>,
}

impl Instruction {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            name: name.into(),
            description: None,
            url_pattern: String::new(),
            steps: Vec::new(),
            variables: BTreeMap::new(),
            created: now,
            modified: now,
        }
    }

    pub fn with_url_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.url_pattern = pattern.into();
        self
    }

    pub fn with_steps(mut self, steps: Vec<Step>) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, def: VariableDef) -> Self {
        self.variables.insert(name.into(), def);
        self
    }

    /// Refresh the modification timestamp.
    pub fn touch(&mut self) {
        self.modified = Utc::now();
    }

    pub fn append_step(&mut self, step: Step) {
        self.steps.push(step);
        self.touch();
    }

    /// Replace the step at `index` wholesale, returning the previous one.
    pub fn replace_step(&mut self, index: usize, step: Step) -> Option<Step> {
        let slot = self.steps.get_mut(index)?;
        let previous = std::mem::replace(slot, step);
        self.touch();
        Some(previous)
    }

    pub fn remove_step(&mut self, index: usize) -> Option<Step> {
        if index >= self.steps.len() {
            return None;
        }
        let removed = self.steps.remove(index);
        self.touch();
        Some(removed)
    }

    /// Move a step so that it ends up at position `to`.
    pub fn move_step(&mut self, from: usize, to: usize) -> bool {
        let len = self.steps.len();
        if from >= len || to >= len {
            return false;
        }
        if from != to {
            let step = self.steps.remove(from);
            self.steps.insert(to, step);
            self.touch();
        }
        true
    }

    pub fn set_variable(&mut self, name: impl Into<String>, def: VariableDef) {
        self.variables.insert(name.into(), def);
        self.touch();
    }

    pub fn remove_variable(&mut self, name: &str) -> Option<VariableDef> {
        let removed = self.variables.remove(name)?;
        self.touch();
        Some(removed)
    }

    /// Declared defaults overlaid with caller-supplied values.
    pub fn resolve_variables(&self, overrides: &Variables) -> Variables {
        let mut values: Variables = self
            .variables
            .iter()
            .map(|(name, def)| (name.clone(), def.default.clone()))
            .collect();
        for (name, value) in overrides {
            values.insert(name.clone(), value.clone());
        }
        values
    }

    /// Copy of `values` with secret variables masked, for display and logs.
    pub fn mask_secrets(&self, values: &Variables) -> Variables {
        values
            .iter()
            .map(|(name, value)| {
                let secret = self.variables.get(name).is_some_and(VariableDef::is_secret);
                let shown = if secret { SECRET_MASK.to_string() } else { value.clone() };
                (name.clone(), shown)
            })
            .collect()
    }

    /// Whether `url` matches the instruction's URL pattern.
    pub fn matches_url(&self, url: &str) -> bool {
        glob_match(&self.url_pattern, url)
    }
}

fn glob_match(pattern: &str, input: &str) -> bool {
    if pattern.is_empty() {
        return true;
    }
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    regex::Regex::new(&format!("^{body}$"))
        .map(|re| re.is_match(input))
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "instruction_tests.rs"]
mod tests;
