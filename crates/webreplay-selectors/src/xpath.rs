//! XPath subset.
//!
//! Location paths made of `/` (child) and `//` (descendant) steps with a
//! tag or `*` node test and any number of `[n]` / `[@attr="v"]` predicates.
//! That covers absolute positional paths (`/html[1]/body[1]/div[2]`) and
//! anchored ones (`//*[@id="main"]/ul[1]/li[3]`).

use std::collections::HashMap;

use crate::error::SelectorError;
use crate::tree::{ElementTree, NodeId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XPath {
    steps: Vec<XStep>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct XStep {
    descendant: bool,
    /// `None` for `*`.
    tag: Option<String>,
    predicates: Vec<Predicate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    /// 1-based position among the candidates that survived earlier predicates.
    Index(usize),
    AttrEquals(String, String),
}

/// Quote a literal for use in a predicate, or `None` if it contains both quote kinds.
pub fn literal(value: &str) -> Option<String> {
    if !value.contains('"') {
        Some(format!("\"{value}\""))
    } else if !value.contains('\'') {
        Some(format!("'{value}'"))
    } else {
        None
    }
}

pub fn parse(path: &str) -> Result<XPath, SelectorError> {
    let error = |message: &str| SelectorError::InvalidXPath {
        path: path.to_string(),
        message: message.to_string(),
    };

    let chars: Vec<char> = path.trim().chars().collect();
    if chars.first() != Some(&'/') {
        return Err(error("only absolute paths are supported"));
    }

    let mut steps = Vec::new();
    let mut pos = 0;
    while pos < chars.len() {
        // Separator.
        if chars[pos] != '/' {
            return Err(error("expected '/'"));
        }
        pos += 1;
        let descendant = chars.get(pos) == Some(&'/');
        if descendant {
            pos += 1;
        }

        // Node test.
        let tag = if chars.get(pos) == Some(&'*') {
            pos += 1;
            None
        } else {
            let start = pos;
            while pos < chars.len() && (chars[pos].is_alphanumeric() || matches!(chars[pos], '-' | '_')) {
                pos += 1;
            }
            if pos == start {
                return Err(error("expected a node test"));
            }
            Some(chars[start..pos].iter().collect::<String>().to_ascii_lowercase())
        };

        // Predicates.
        let mut predicates = Vec::new();
        while chars.get(pos) == Some(&'[') {
            pos += 1;
            let close = chars[pos..]
                .iter()
                .scan(None::<char>, |quote, &c| {
                    let open = *quote;
                    match open {
                        Some(q) if q == c => *quote = None,
                        Some(_) => {}
                        None if c == '"' || c == '\'' => *quote = Some(c),
                        None => {}
                    }
                    Some((c, quote.is_none()))
                })
                .position(|(c, unquoted)| c == ']' && unquoted)
                .ok_or_else(|| error("unterminated predicate"))?;
            let body: String = chars[pos..pos + close].iter().collect();
            predicates.push(parse_predicate(body.trim()).ok_or_else(|| error("unsupported predicate"))?);
            pos += close + 1;
        }

        steps.push(XStep {
            descendant,
            tag,
            predicates,
        });
    }

    if steps.is_empty() {
        return Err(error("empty path"));
    }
    Ok(XPath { steps })
}

fn parse_predicate(body: &str) -> Option<Predicate> {
    if let Ok(index) = body.parse::<usize>() {
        return (index > 0).then_some(Predicate::Index(index));
    }
    let rest = body.strip_prefix('@')?;
    let (name, value) = rest.split_once('=')?;
    let value = value.trim();
    let quote = value.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let inner = value.strip_prefix(quote)?.strip_suffix(quote)?;
    if inner.contains(quote) {
        return None;
    }
    Some(Predicate::AttrEquals(
        name.trim().to_ascii_lowercase(),
        inner.to_string(),
    ))
}

impl XPath {
    /// Matching attached elements in document order.
    pub fn evaluate(&self, tree: &ElementTree) -> Vec<NodeId> {
        // `None` stands for the document node above the root element.
        let mut context: Vec<Option<NodeId>> = vec![None];
        for step in &self.steps {
            let mut next: Vec<NodeId> = Vec::new();
            for ctx in &context {
                let parents: Vec<Option<NodeId>> = if step.descendant {
                    let mut all = vec![*ctx];
                    let below = match ctx {
                        Some(node) => tree.descendants(*node),
                        None => tree.all_elements(),
                    };
                    all.extend(below.into_iter().map(Some));
                    all
                } else {
                    vec![*ctx]
                };
                for parent in parents {
                    let children = match parent {
                        Some(node) => tree.element_children(node),
                        None => vec![tree.root()],
                    };
                    let mut candidates: Vec<NodeId> = children
                        .into_iter()
                        .filter(|&c| step.tag.as_deref().is_none_or(|t| tree.tag(c) == t))
                        .collect();
                    for predicate in &step.predicates {
                        candidates = match predicate {
                            Predicate::Index(n) => candidates.get(n - 1).copied().into_iter().collect(),
                            Predicate::AttrEquals(name, value) => candidates
                                .into_iter()
                                .filter(|&c| tree.attr(c, name) == Some(value.as_str()))
                                .collect(),
                        };
                    }
                    next.extend(candidates);
                }
            }
            let mut ordered = next;
            ordered.sort_unstable_by_key(|n| n.index());
            ordered.dedup();
            context = ordered.into_iter().map(Some).collect();
        }

        let order: HashMap<NodeId, usize> = tree
            .all_elements()
            .into_iter()
            .enumerate()
            .map(|(i, n)| (n, i))
            .collect();
        let mut result: Vec<NodeId> = context.into_iter().flatten().collect();
        result.sort_by_key(|n| order.get(n).copied().unwrap_or(usize::MAX));
        result
    }
}
