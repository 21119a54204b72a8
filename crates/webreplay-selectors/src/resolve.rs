//! Descriptor resolution against a snapshot.

use webreplay_protocols::{PositionAnchor, SelectorDescriptor, SelectorStrategy};

use crate::error::SelectorError;
use crate::tree::{ElementTree, NodeId, normalize_text};

/// Every attached node the descriptor designates, in document order.
pub fn resolve(
    tree: &ElementTree,
    descriptor: &SelectorDescriptor,
) -> Result<Vec<NodeId>, SelectorError> {
    match descriptor.strategy {
        SelectorStrategy::Id
        | SelectorStrategy::Css
        | SelectorStrategy::Aria
        | SelectorStrategy::DataAttribute => tree.query_css(descriptor.value.trim()),
        SelectorStrategy::XPath => tree.query_xpath(&descriptor.value),
        SelectorStrategy::Text => Ok(resolve_text(
            tree,
            &descriptor.value,
            descriptor.tag.as_deref(),
        )),
        SelectorStrategy::Position => {
            let anchor = descriptor.position.as_ref().ok_or_else(|| {
                SelectorError::MalformedDescriptor(format!(
                    "position descriptor without anchor: {}",
                    descriptor.value
                ))
            })?;
            resolve_position(tree, anchor)
        }
    }
}

/// The single node a descriptor designates, or `None` when it matches zero
/// or several nodes.
pub fn resolve_unique(
    tree: &ElementTree,
    descriptor: &SelectorDescriptor,
) -> Result<Option<NodeId>, SelectorError> {
    let nodes = resolve(tree, descriptor)?;
    Ok(match nodes.as_slice() {
        [only] => Some(*only),
        _ => None,
    })
}

pub(crate) fn resolve_text(tree: &ElementTree, text: &str, tag: Option<&str>) -> Vec<NodeId> {
    let wanted = normalize_text(text);
    if wanted.is_empty() {
        return Vec::new();
    }
    tree.all_elements()
        .into_iter()
        .filter(|&n| tag.is_none_or(|t| tree.tag(n).eq_ignore_ascii_case(t)))
        .filter(|&n| normalize_text(&tree.text_content(n)) == wanted)
        .collect()
}

pub(crate) fn resolve_position(
    tree: &ElementTree,
    anchor: &PositionAnchor,
) -> Result<Vec<NodeId>, SelectorError> {
    let landmarks = tree.query_css(&anchor.landmark)?;
    let [landmark] = landmarks.as_slice() else {
        return Ok(Vec::new());
    };
    let base = if anchor.sibling_offset == 0 {
        Some(*landmark)
    } else {
        let siblings = tree.siblings(*landmark);
        tree.child_index(*landmark)
            .and_then(|i| i.checked_add_signed(anchor.sibling_offset as isize))
            .and_then(|i| siblings.get(i).copied())
    };
    Ok(base
        .and_then(|b| tree.node_at_path(b, &anchor.path))
        .into_iter()
        .collect())
}
