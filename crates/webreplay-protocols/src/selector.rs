//! Selector descriptors and selector sets.
//!
//! A descriptor says *how* to relocate a target node; a step carries one
//! primary descriptor and an ordered list of alternatives (the fallback chain).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Strategy used by a selector descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorStrategy {
    Id,
    Css,
    #[serde(rename = "xpath")]
    XPath,
    Text,
    Aria,
    DataAttribute,
    Position,
}

impl SelectorStrategy {
    /// Stable label used in logs and outcome records.
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectorStrategy::Id => "id",
            SelectorStrategy::Css => "css",
            SelectorStrategy::XPath => "xpath",
            SelectorStrategy::Text => "text",
            SelectorStrategy::Aria => "aria",
            SelectorStrategy::DataAttribute => "data_attribute",
            SelectorStrategy::Position => "position",
        }
    }

    /// Whether `value` is a CSS selector for this strategy.
    pub fn is_css_based(&self) -> bool {
        matches!(
            self,
            SelectorStrategy::Id
                | SelectorStrategy::Css
                | SelectorStrategy::Aria
                | SelectorStrategy::DataAttribute
        )
    }
}

impl fmt::Display for SelectorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Landmark-relative location used by the `Position` strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionAnchor {
    /// CSS selector of the landmark (an element with a stable id).
    pub landmark: String,
    /// Element-sibling offset from the landmark. 0 means the landmark is an ancestor.
    #[serde(default)]
    pub sibling_offset: i32,
    /// Element-child indices descending from the anchor to the target.
    #[serde(default)]
    pub path: Vec<usize>,
}

impl PositionAnchor {
    /// Human readable rendering, used as the descriptor value.
    pub fn render(&self) -> String {
        let path = self
            .path
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join("/");
        format!("{} >> {:+} >> {}", self.landmark, self.sibling_offset, path)
    }
}

/// One way of relocating a target node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorDescriptor {
    pub strategy: SelectorStrategy,
    pub value: String,

    /// Tag restriction (Text strategy).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Attribute name the descriptor was derived from (DataAttribute, Aria).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,

    /// Resolution requires exact text-content comparison (Text strategy).
    #[serde(default, skip_serializing_if = "is_false")]
    pub match_text: bool,

    /// Landmark-relative location (Position strategy).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<PositionAnchor>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl SelectorDescriptor {
    pub fn new(strategy: SelectorStrategy, value: impl Into<String>) -> Self {
        Self {
            strategy,
            value: value.into(),
            tag: None,
            attribute: None,
            match_text: false,
            position: None,
        }
    }

    pub fn css(value: impl Into<String>) -> Self {
        Self::new(SelectorStrategy::Css, value)
    }

    pub fn id(id_selector: impl Into<String>) -> Self {
        Self::new(SelectorStrategy::Id, id_selector)
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Self::new(SelectorStrategy::XPath, value)
    }

    /// Text descriptor restricted to `tag`.
    pub fn text(text: impl Into<String>, tag: impl Into<String>) -> Self {
        let mut descriptor = Self::new(SelectorStrategy::Text, text);
        descriptor.tag = Some(tag.into());
        descriptor.match_text = true;
        descriptor
    }

    pub fn position(anchor: PositionAnchor) -> Self {
        let mut descriptor = Self::new(SelectorStrategy::Position, anchor.render());
        descriptor.position = Some(anchor);
        descriptor
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Visit every string field resolution reads: value, tag, attribute and
    /// the position landmark.
    pub fn for_each_string_mut(&mut self, f: &mut dyn FnMut(&mut String)) {
        f(&mut self.value);
        if let Some(tag) = self.tag.as_mut() {
            f(tag);
        }
        if let Some(attribute) = self.attribute.as_mut() {
            f(attribute);
        }
        if let Some(position) = self.position.as_mut() {
            f(&mut position.landmark);
        }
    }

    /// Deduplication key.
    pub fn key(&self) -> (SelectorStrategy, &str) {
        (self.strategy, self.value.trim())
    }
}

impl fmt::Display for SelectorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.strategy, self.value)
    }
}

/// Primary selector plus ordered fallbacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorSet {
    pub primary: SelectorDescriptor,
    #[serde(default)]
    pub alternatives: Vec<SelectorDescriptor>,
}

impl SelectorSet {
    pub fn new(primary: SelectorDescriptor) -> Self {
        Self {
            primary,
            alternatives: Vec::new(),
        }
    }

    /// Shorthand for a single CSS selector.
    pub fn css(value: impl Into<String>) -> Self {
        Self::new(SelectorDescriptor::css(value))
    }

    /// Append an alternative unless an equal `(strategy, value)` is already present.
    pub fn with_alternative(mut self, alternative: SelectorDescriptor) -> Self {
        self.push_alternative(alternative);
        self
    }

    /// Append an alternative unless an equal `(strategy, value)` is already present.
    pub fn push_alternative(&mut self, alternative: SelectorDescriptor) -> bool {
        if self.chain().any(|d| d.key() == alternative.key()) {
            return false;
        }
        self.alternatives.push(alternative);
        true
    }

    /// The fallback chain: primary first, then alternatives in order.
    pub fn chain(&self) -> impl Iterator<Item = &SelectorDescriptor> {
        std::iter::once(&self.primary).chain(self.alternatives.iter())
    }

    /// Number of descriptors in the chain (never zero).
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        1 + self.alternatives.len()
    }

    /// Selector set made of the alternatives only, or `None` if there are none.
    pub fn without_primary(&self) -> Option<SelectorSet> {
        let mut rest = self.alternatives.iter().cloned();
        let primary = rest.next()?;
        Some(SelectorSet {
            primary,
            alternatives: rest.collect(),
        })
    }

    /// Whether two selector sets designate the same recorded target.
    ///
    /// Two sets are the same target when their primaries have the same strategy
    /// and the same whitespace-trimmed value. Alternatives are ignored: they are
    /// regenerated on every event and may legitimately differ.
    pub fn same_target(&self, other: &SelectorSet) -> bool {
        self.primary.key() == other.primary.key()
    }
}

#[cfg(test)]
#[path = "selector_tests.rs"]
mod tests;
