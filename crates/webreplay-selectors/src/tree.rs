//! Element tree snapshot.
//!
//! An arena of element nodes with ordered attributes and interleaved
//! text/element content. Node ids are stable for the lifetime of the tree;
//! removed nodes stay in the arena but are no longer attached.

use std::fmt;

use crate::error::SelectorError;

/// Index of an element in an [`ElementTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

#[derive(Debug, Clone)]
enum Content {
    Text(String),
    Element(NodeId),
}

#[derive(Debug, Clone)]
struct ElementData {
    tag: String,
    attrs: Vec<(String, String)>,
    children: Vec<Content>,
    parent: Option<NodeId>,
    attached: bool,
}

/// Snapshot of a page's element tree.
#[derive(Debug, Clone)]
pub struct ElementTree {
    nodes: Vec<ElementData>,
    root: NodeId,
}

/// Collapse runs of whitespace and trim.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl ElementTree {
    /// A tree holding only a root element.
    pub fn new(root_tag: &str) -> Self {
        Self {
            nodes: vec![ElementData {
                tag: root_tag.to_ascii_lowercase(),
                attrs: Vec::new(),
                children: Vec::new(),
                parent: None,
                attached: true,
            }],
            root: NodeId(0),
        }
    }

    /// Parse an HTML document. The root is the `<html>` element.
    pub fn from_html(html: &str) -> Self {
        let document = scraper::Html::parse_document(html);
        let root = document.root_element();
        let mut tree = Self::new(root.value().name());
        for (name, value) in root.value().attrs() {
            tree.nodes[0].attrs.push((name.to_string(), value.to_string()));
        }
        tree.import_children(tree.root, root);
        tree
    }

    fn import_children(&mut self, parent: NodeId, element: scraper::ElementRef<'_>) {
        for child in element.children() {
            match child.value() {
                scraper::Node::Text(text) => self.append_text(parent, &text.text),
                scraper::Node::Element(data) => {
                    if let Some(child_ref) = scraper::ElementRef::wrap(child) {
                        let attrs = data
                            .attrs()
                            .map(|(k, v)| (k.to_string(), v.to_string()))
                            .collect();
                        let id = self.push_element(parent, data.name(), attrs);
                        self.import_children(id, child_ref);
                    }
                }
                _ => {}
            }
        }
    }

    fn push_element(&mut self, parent: NodeId, tag: &str, attrs: Vec<(String, String)>) -> NodeId {
        let id = NodeId(self.nodes.len());
        let attached = self.is_attached(parent);
        self.nodes.push(ElementData {
            tag: tag.to_ascii_lowercase(),
            attrs,
            children: Vec::new(),
            parent: Some(parent),
            attached,
        });
        self.nodes[parent.0].children.push(Content::Element(id));
        id
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes in the arena, detached ones included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether `id` names a node that is still reachable from the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.nodes.get(id.0).is_some_and(|n| n.attached)
    }

    pub(crate) fn check_attached(&self, id: NodeId) -> Result<(), SelectorError> {
        if self.is_attached(id) {
            Ok(())
        } else {
            Err(SelectorError::DetachedNode(id.0))
        }
    }

    /// Look up a node by raw index, as handed out to hosts.
    pub fn node(&self, index: usize) -> Option<NodeId> {
        let id = NodeId(index);
        self.is_attached(id).then_some(id)
    }

    pub fn tag(&self, id: NodeId) -> &str {
        &self.nodes[id.0].tag
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.nodes[id.0]
            .attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn attrs(&self, id: NodeId) -> impl Iterator<Item = (&str, &str)> {
        self.nodes[id.0]
            .attrs
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    pub fn classes(&self, id: NodeId) -> impl Iterator<Item = &str> {
        self.attr(id, "class").unwrap_or("").split_whitespace()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Ancestors from the parent up to the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&n| self.parent(n))
    }

    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes[id.0]
            .children
            .iter()
            .filter_map(|c| match c {
                Content::Element(child) => Some(*child),
                Content::Text(_) => None,
            })
            .collect()
    }

    /// Element siblings of `id`, itself included, in document order.
    pub fn siblings(&self, id: NodeId) -> Vec<NodeId> {
        match self.parent(id) {
            Some(parent) => self.element_children(parent),
            None => vec![id],
        }
    }

    /// Zero-based position of `id` among its parent's element children.
    pub fn child_index(&self, id: NodeId) -> Option<usize> {
        self.siblings(id).iter().position(|&s| s == id)
    }

    /// Zero-based position of `id` among siblings with the same tag.
    pub fn type_index(&self, id: NodeId) -> Option<usize> {
        let tag = self.tag(id);
        self.siblings(id)
            .into_iter()
            .filter(|&s| self.tag(s) == tag)
            .position(|s| s == id)
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        for content in &self.nodes[id.0].children {
            match content {
                Content::Text(text) => out.push_str(text),
                Content::Element(child) => self.collect_text(*child, out),
            }
        }
    }

    /// Attached elements under `id` (itself included) in document order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            out.push(node);
            let children = self.element_children(node);
            stack.extend(children.into_iter().rev());
        }
        out
    }

    /// Every attached element in document order.
    pub fn all_elements(&self) -> Vec<NodeId> {
        self.descendants(self.root)
    }

    /// Follow element-child indices downward from `from`.
    pub fn node_at_path(&self, from: NodeId, path: &[usize]) -> Option<NodeId> {
        path.iter().try_fold(from, |node, &index| {
            self.element_children(node).get(index).copied()
        })
    }

    /// Element-child indices leading from `ancestor` down to `node`.
    pub fn path_of(&self, ancestor: NodeId, node: NodeId) -> Option<Vec<usize>> {
        let mut path = Vec::new();
        let mut current = node;
        while current != ancestor {
            path.push(self.child_index(current)?);
            current = self.parent(current)?;
        }
        path.reverse();
        Some(path)
    }

    /// Whether `ancestor` is a proper ancestor of `node`.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.ancestors(node).any(|a| a == ancestor)
    }

    /// Short `<tag#id.class>` description for logs.
    pub fn describe(&self, id: NodeId) -> String {
        let mut out = format!("<{}", self.tag(id));
        if let Some(html_id) = self.attr(id, "id") {
            out.push('#');
            out.push_str(html_id);
        }
        for class in self.classes(id) {
            out.push('.');
            out.push_str(class);
        }
        out.push('>');
        out
    }

    pub fn query_css(&self, selector: &str) -> Result<Vec<NodeId>, SelectorError> {
        let parsed = crate::css::parse(selector)?;
        Ok(parsed.query(self))
    }

    pub fn query_xpath(&self, path: &str) -> Result<Vec<NodeId>, SelectorError> {
        let parsed = crate::xpath::parse(path)?;
        Ok(parsed.evaluate(self))
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        let attrs = &mut self.nodes[id.0].attrs;
        match attrs.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            Some((_, existing)) => *existing = value.to_string(),
            None => attrs.push((name.to_ascii_lowercase(), value.to_string())),
        }
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Option<String> {
        let attrs = &mut self.nodes[id.0].attrs;
        let index = attrs.iter().position(|(k, _)| k.eq_ignore_ascii_case(name))?;
        Some(attrs.remove(index).1)
    }

    /// Append a new element as the last child of `parent`.
    pub fn append_element(&mut self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let attrs = attrs
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
            .collect();
        self.push_element(parent, tag, attrs)
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) {
        if text.is_empty() {
            return;
        }
        let children = &mut self.nodes[parent.0].children;
        if let Some(Content::Text(last)) = children.last_mut() {
            last.push_str(text);
        } else {
            children.push(Content::Text(text.to_string()));
        }
    }

    /// Replace all children of `id` with a single text node.
    pub fn set_text(&mut self, id: NodeId, text: &str) {
        let removed: Vec<NodeId> = self.element_children(id);
        for child in removed {
            self.mark_detached(child);
        }
        let children = &mut self.nodes[id.0].children;
        children.clear();
        if !text.is_empty() {
            children.push(Content::Text(text.to_string()));
        }
    }

    /// Detach `id` and its subtree. The root cannot be removed.
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        let Some(parent) = self.parent(id) else {
            return false;
        };
        if !self.is_attached(id) {
            return false;
        }
        self.nodes[parent.0]
            .children
            .retain(|c| !matches!(c, Content::Element(child) if *child == id));
        self.mark_detached(id);
        true
    }

    fn mark_detached(&mut self, id: NodeId) {
        for node in self.descendants(id) {
            self.nodes[node.0].attached = false;
        }
    }
}

/// Incremental builder, used by hosts converting their own DOM representation.
///
/// ```
/// use webreplay_selectors::TreeBuilder;
///
/// let tree = TreeBuilder::new("html")
///     .open("body", &[])
///     .leaf("button", &[("id", "go")], "Go")
///     .close()
///     .build();
/// assert_eq!(tree.query_css("#go").unwrap().len(), 1);
/// ```
pub struct TreeBuilder {
    tree: ElementTree,
    stack: Vec<NodeId>,
}

impl TreeBuilder {
    pub fn new(root_tag: &str) -> Self {
        let tree = ElementTree::new(root_tag);
        let root = tree.root();
        Self {
            tree,
            stack: vec![root],
        }
    }

    fn current(&self) -> NodeId {
        self.stack.last().copied().unwrap_or(self.tree.root)
    }

    /// Set an attribute on the currently open element.
    pub fn attr(mut self, name: &str, value: &str) -> Self {
        let current = self.current();
        self.tree.set_attribute(current, name, value);
        self
    }

    /// Open a child element; subsequent calls add to it until `close`.
    pub fn open(mut self, tag: &str, attrs: &[(&str, &str)]) -> Self {
        let id = self.tree.append_element(self.current(), tag, attrs);
        self.stack.push(id);
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        let current = self.current();
        self.tree.append_text(current, text);
        self
    }

    /// Child element holding only text.
    pub fn leaf(self, tag: &str, attrs: &[(&str, &str)], text: &str) -> Self {
        self.open(tag, attrs).text(text).close()
    }

    pub fn close(mut self) -> Self {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
        self
    }

    pub fn build(self) -> ElementTree {
        self.tree
    }
}

#[cfg(test)]
#[path = "tree_tests.rs"]
mod tests;
