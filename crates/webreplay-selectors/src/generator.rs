//! Selector generation.
//!
//! Given a node of an [`ElementTree`], produce a ranked primary selector and
//! a deduplicated fallback chain. Strategies run in priority order (Id,
//! DataAttribute, Aria, Css, XPath, Text, Position); the first one that
//! yields a candidate becomes the primary and every later candidate becomes
//! an alternative. Generation reads the snapshot only.

use tracing::debug;
use webreplay_config::SelectorsConfig;
use webreplay_protocols::{PositionAnchor, SelectorDescriptor, SelectorSet, SelectorStrategy};

use crate::css::{self, id_selector, quote};
use crate::error::SelectorError;
use crate::resolve::resolve_text;
use crate::stability::{
    ARIA_ATTRIBUTES, TEST_ATTRIBUTES, is_stable_attribute_value, is_stable_class, is_stable_id,
};
use crate::tree::{ElementTree, NodeId, normalize_text};
use crate::xpath;

/// Attributes that host integrations add to the page and must never anchor on.
pub const HOST_ATTRIBUTE_PREFIX: &str = "data-webreplay";

/// Attributes tried, in order, as a CSS segment discriminator.
const DISCRIMINATING_ATTRIBUTES: &[&str] = &["type", "name", "placeholder", "value"];

/// Tags eligible for the Text strategy.
const TEXT_TAGS: &[&str] = &["button", "a", "label", "summary", "option", "legend"];

/// Limits applied by the generator.
#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    pub text_max_len: usize,
    pub attribute_max_len: usize,
    pub position_max_depth: usize,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self::from(&SelectorsConfig::default())
    }
}

impl From<&SelectorsConfig> for GeneratorOptions {
    fn from(config: &SelectorsConfig) -> Self {
        Self {
            text_max_len: config.text_max_len,
            attribute_max_len: config.attribute_max_len,
            position_max_depth: config.position_max_depth,
        }
    }
}

/// Multi-strategy selector generator.
#[derive(Debug, Clone, Default)]
pub struct SelectorGenerator {
    options: GeneratorOptions,
}

impl SelectorGenerator {
    pub fn new(options: GeneratorOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    /// Generate the selector set for `node`.
    pub fn generate(&self, tree: &ElementTree, node: NodeId) -> Result<SelectorSet, SelectorError> {
        tree.check_attached(node)?;

        let candidates = [
            self.by_id(tree, node),
            self.by_data_attribute(tree, node),
            self.by_aria(tree, node),
            Some(self.by_css(tree, node)),
            Some(self.by_xpath(tree, node)),
            self.by_text(tree, node),
            self.by_position(tree, node),
        ];

        let mut found = candidates.into_iter().flatten();
        let primary = found
            .next()
            .ok_or(SelectorError::DetachedNode(node.index()))?;
        let mut set = SelectorSet::new(primary);
        for alternative in found {
            set.push_alternative(alternative);
        }

        debug!(
            node = %tree.describe(node),
            primary = %set.primary,
            alternatives = set.alternatives.len(),
            "Generated selectors"
        );
        Ok(set)
    }

    fn by_id(&self, tree: &ElementTree, node: NodeId) -> Option<SelectorDescriptor> {
        let id = tree.attr(node, "id")?;
        if !is_stable_id(id) || !is_unique_id(tree, id) {
            return None;
        }
        Some(SelectorDescriptor::id(id_selector(id)).with_attribute("id"))
    }

    fn by_data_attribute(&self, tree: &ElementTree, node: NodeId) -> Option<SelectorDescriptor> {
        let tag = tag_selector(tree.tag(node));

        for name in TEST_ATTRIBUTES {
            let Some(value) = tree.attr(node, name) else {
                continue;
            };
            if value.trim().is_empty() {
                continue;
            }
            let bare = format!("[{name}={}]", quote(value));
            for selector in [bare.clone(), format!("{tag}{bare}")] {
                if is_unique_css(tree, &selector, node) {
                    return Some(
                        SelectorDescriptor::new(SelectorStrategy::DataAttribute, selector)
                            .with_attribute(*name),
                    );
                }
            }
        }

        tree.attrs(node)
            .filter(|(name, _)| {
                name.starts_with("data-")
                    && !name.starts_with(HOST_ATTRIBUTE_PREFIX)
                    && !TEST_ATTRIBUTES.contains(name)
            })
            .filter(|(_, value)| is_stable_attribute_value(value, self.options.attribute_max_len))
            .find_map(|(name, value)| {
                let selector = format!("[{name}={}]", quote(value));
                is_unique_css(tree, &selector, node).then(|| {
                    SelectorDescriptor::new(SelectorStrategy::DataAttribute, selector)
                        .with_attribute(name)
                })
            })
    }

    fn by_aria(&self, tree: &ElementTree, node: NodeId) -> Option<SelectorDescriptor> {
        let tag = tag_selector(tree.tag(node));
        let name_attr = tree
            .attr(node, "name")
            .filter(|n| !n.trim().is_empty())
            .map(|n| format!("[name={}]", quote(n)));

        for attr in ARIA_ATTRIBUTES {
            let Some(value) = tree.attr(node, attr) else {
                continue;
            };
            if value.trim().is_empty() || value.contains('\n') {
                continue;
            }
            let bare = format!("[{attr}={}]", quote(value));
            let mut options = vec![bare.clone(), format!("{tag}{bare}")];
            if let Some(name_attr) = &name_attr {
                options.push(format!("{tag}{bare}{name_attr}"));
            }
            if let Some(selector) = options
                .into_iter()
                .find(|selector| is_unique_css(tree, selector, node))
            {
                return Some(
                    SelectorDescriptor::new(SelectorStrategy::Aria, selector).with_attribute(*attr),
                );
            }
        }
        None
    }

    /// Bottom-up structural path, then the shortest unique suffix.
    fn by_css(&self, tree: &ElementTree, node: NodeId) -> SelectorDescriptor {
        let mut segments = Vec::new();
        let mut current = Some(node);
        while let Some(element) = current {
            if let Some(id) = tree.attr(element, "id") {
                if is_stable_id(id) && is_unique_id(tree, id) {
                    segments.push(id_selector(id));
                    break;
                }
            }
            segments.push(self.css_segment(tree, element));
            current = tree.parent(element);
        }
        segments.reverse();

        let full = segments.join(" > ");
        let shortest = (1..segments.len())
            .map(|k| segments[segments.len() - k..].join(" > "))
            .find(|suffix| is_unique_css(tree, suffix, node))
            .unwrap_or(full);

        SelectorDescriptor::css(shortest)
    }

    fn css_segment(&self, tree: &ElementTree, element: NodeId) -> String {
        let mut segment = tag_selector(tree.tag(element));
        for class in tree.classes(element).filter(|c| is_stable_class(c)) {
            segment.push('.');
            segment.push_str(class);
        }
        if let Some((name, value)) = DISCRIMINATING_ATTRIBUTES.iter().find_map(|name| {
            tree.attr(element, name)
                .filter(|v| !v.is_empty() && v.chars().count() <= self.options.attribute_max_len)
                .map(|v| (*name, v))
        }) {
            segment.push_str(&format!("[{name}={}]", quote(value)));
        }

        let collides = css::parse(&segment).map_or(true, |parsed| {
            tree.siblings(element)
                .into_iter()
                .any(|s| s != element && parsed.matches(tree, s))
        });
        if collides {
            if let Some(index) = tree.child_index(element) {
                segment.push_str(&format!(":nth-child({})", index + 1));
            }
        }
        segment
    }

    fn by_xpath(&self, tree: &ElementTree, node: NodeId) -> SelectorDescriptor {
        let mut steps = Vec::new();
        let mut current = Some(node);
        let mut anchor = None;
        while let Some(element) = current {
            if let Some(id) = tree.attr(element, "id") {
                if is_stable_id(id) && is_unique_id(tree, id) {
                    if let Some(literal) = xpath::literal(id) {
                        anchor = Some(format!("//*[@id={literal}]"));
                        break;
                    }
                }
            }
            let tag = tree.tag(element);
            let step = if is_xpath_name(tag) {
                format!("{tag}[{}]", tree.type_index(element).unwrap_or(0) + 1)
            } else {
                format!("*[{}]", tree.child_index(element).unwrap_or(0) + 1)
            };
            steps.push(step);
            current = tree.parent(element);
        }
        steps.reverse();

        let path = match anchor {
            Some(anchor) if steps.is_empty() => anchor,
            Some(anchor) => format!("{anchor}/{}", steps.join("/")),
            None => format!("/{}", steps.join("/")),
        };
        SelectorDescriptor::xpath(path)
    }

    fn by_text(&self, tree: &ElementTree, node: NodeId) -> Option<SelectorDescriptor> {
        let tag = tree.tag(node);
        let eligible = TEXT_TAGS.contains(&tag) || tree.attr(node, "role") == Some("button");
        if !eligible {
            return None;
        }
        let text = normalize_text(&tree.text_content(node));
        if text.is_empty() || text.chars().count() > self.options.text_max_len {
            return None;
        }
        (resolve_text(tree, &text, Some(tag)) == [node])
            .then(|| SelectorDescriptor::text(text, tag))
    }

    /// Landmark-relative path from the nearest stable-id ancestor or sibling.
    fn by_position(&self, tree: &ElementTree, node: NodeId) -> Option<SelectorDescriptor> {
        let mut level = node;
        for depth in 0..=self.options.position_max_depth {
            if depth > 0 {
                level = tree.parent(level)?;
                if let Some(landmark) = landmark_selector(tree, level) {
                    let path = tree.path_of(level, node)?;
                    return Some(SelectorDescriptor::position(PositionAnchor {
                        landmark,
                        sibling_offset: 0,
                        path,
                    }));
                }
            }

            let index = tree.child_index(level)?;
            let siblings = tree.siblings(level);
            let mut by_distance: Vec<(usize, NodeId)> = siblings
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != index)
                .map(|(i, s)| (i, *s))
                .collect();
            by_distance.sort_by_key(|(i, _)| i.abs_diff(index));
            for (i, sibling) in by_distance {
                if let Some(landmark) = landmark_selector(tree, sibling) {
                    let path = tree.path_of(level, node)?;
                    return Some(SelectorDescriptor::position(PositionAnchor {
                        landmark,
                        sibling_offset: index as i32 - i as i32,
                        path,
                    }));
                }
            }
        }
        None
    }
}

fn landmark_selector(tree: &ElementTree, element: NodeId) -> Option<String> {
    let id = tree.attr(element, "id")?;
    (is_stable_id(id) && is_unique_id(tree, id)).then(|| id_selector(id))
}

fn tag_selector(tag: &str) -> String {
    if css::is_identifier(tag) {
        tag.to_string()
    } else {
        "*".to_string()
    }
}

fn is_xpath_name(tag: &str) -> bool {
    !tag.is_empty()
        && tag
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
        && !tag.starts_with(|c: char| c.is_ascii_digit() || c == '-')
}

fn is_unique_id(tree: &ElementTree, id: &str) -> bool {
    tree.all_elements()
        .into_iter()
        .filter(|&n| tree.attr(n, "id") == Some(id))
        .take(2)
        .count()
        == 1
}

fn is_unique_css(tree: &ElementTree, selector: &str, node: NodeId) -> bool {
    tree.query_css(selector)
        .map(|nodes| nodes == [node])
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "generator_tests.rs"]
mod tests;
