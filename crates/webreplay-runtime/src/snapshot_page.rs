//! In-memory page over an element tree snapshot.
//!
//! Implements [`PageHandle`] without a browser: handles are node indices,
//! dispatched events are applied to the tree the way a browser would apply
//! them to form state, and every event is kept in an inspectable log. Used
//! for dry runs and throughout the test suites.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use webreplay_protocols::{
    ElementHandle, ElementState, EventSpec, MouseButton, OptionInfo, PageActivity, PageError,
    PageHandle, Rect, SelectorDescriptor,
};
use webreplay_selectors::tree::normalize_text;
use webreplay_selectors::{ElementTree, NodeId, resolve_unique};

/// Base64 1x1 PNG returned for screenshots.
const BLANK_PNG: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

/// Elements carrying this attribute are invisible until scrolled into view.
pub const OFFSCREEN_ATTR: &str = "data-offscreen";

/// An event the engine dispatched.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchedEvent {
    /// Short description of the target, `None` for page-level events.
    pub target: Option<String>,
    pub event: EventSpec,
}

struct PageState {
    tree: ElementTree,
    url: String,
    pages: HashMap<String, String>,
    scripts: HashMap<String, serde_json::Value>,
    in_flight: u32,
    mutations: u64,
    focused: Option<NodeId>,
    events: Vec<DispatchedEvent>,
}

impl PageState {
    fn node(&self, handle: &ElementHandle) -> Result<NodeId, PageError> {
        handle
            .id
            .parse::<usize>()
            .ok()
            .and_then(|index| self.tree.node(index))
            .ok_or_else(|| PageError::Detached(handle.id.clone()))
    }

    fn mutate(&mut self, f: impl FnOnce(&mut ElementTree)) {
        f(&mut self.tree);
        self.mutations += 1;
    }
}

pub struct SnapshotPage {
    state: RwLock<PageState>,
}

impl SnapshotPage {
    pub fn new(tree: ElementTree) -> Self {
        Self {
            state: RwLock::new(PageState {
                tree,
                url: "about:blank".to_string(),
                pages: HashMap::new(),
                scripts: HashMap::new(),
                in_flight: 0,
                mutations: 0,
                focused: None,
                events: Vec::new(),
            }),
        }
    }

    pub fn from_html(html: &str) -> Self {
        Self::new(ElementTree::from_html(html))
    }

    pub fn with_url(self, url: impl Into<String>) -> Self {
        self.state.write().url = url.into();
        self
    }

    /// Document served when navigating to `url`.
    pub fn add_page(&self, url: impl Into<String>, html: impl Into<String>) {
        self.state.write().pages.insert(url.into(), html.into());
    }

    /// Result returned when `expression` is evaluated. Other expressions are unsupported.
    pub fn set_script_result(&self, expression: impl Into<String>, value: serde_json::Value) {
        self.state.write().scripts.insert(expression.into(), value);
    }

    pub fn set_in_flight(&self, requests: u32) {
        self.state.write().in_flight = requests;
    }

    /// Mutate the live tree. Counts as one DOM mutation.
    pub fn update<R>(&self, f: impl FnOnce(&mut ElementTree) -> R) -> R {
        let mut state = self.state.write();
        state.mutations += 1;
        f(&mut state.tree)
    }

    pub fn read<R>(&self, f: impl FnOnce(&ElementTree) -> R) -> R {
        f(&self.state.read().tree)
    }

    pub fn events(&self) -> Vec<DispatchedEvent> {
        self.state.read().events.clone()
    }

    /// Current form value of the first element matching `css`.
    pub fn value_of(&self, css: &str) -> Option<String> {
        let state = self.state.read();
        let node = *state.tree.query_css(css).ok()?.first()?;
        field_value(&state.tree, node)
    }

    pub fn url(&self) -> String {
        self.state.read().url.clone()
    }
}

fn is_hidden(tree: &ElementTree, node: NodeId) -> bool {
    if tree.has_attr(node, OFFSCREEN_ATTR) {
        return true;
    }
    if tree.tag(node) == "input" && tree.attr(node, "type") == Some("hidden") {
        return true;
    }
    std::iter::once(node).chain(tree.ancestors(node)).any(|n| {
        tree.has_attr(n, "hidden")
            || tree.attr(n, "style").is_some_and(|style| {
                let style: String = style.chars().filter(|c| !c.is_whitespace()).collect();
                style.contains("display:none") || style.contains("visibility:hidden")
            })
    })
}

fn select_options(tree: &ElementTree, select: NodeId) -> Vec<(NodeId, OptionInfo)> {
    tree.descendants(select)
        .into_iter()
        .filter(|&n| tree.tag(n) == "option")
        .map(|n| {
            let text = normalize_text(&tree.text_content(n));
            let value = tree.attr(n, "value").map(str::to_string).unwrap_or_else(|| text.clone());
            (n, OptionInfo { value, text })
        })
        .collect()
}

fn field_value(tree: &ElementTree, node: NodeId) -> Option<String> {
    match tree.tag(node) {
        "input" => Some(tree.attr(node, "value").unwrap_or_default().to_string()),
        "textarea" => Some(tree.text_content(node)),
        "select" => {
            let options = select_options(tree, node);
            options
                .iter()
                .find(|(n, _)| tree.has_attr(*n, "selected"))
                .or_else(|| options.first())
                .map(|(_, o)| o.value.clone())
                .or_else(|| Some(String::new()))
        }
        _ => None,
    }
}

fn set_field_value(tree: &mut ElementTree, node: NodeId, value: &str) {
    match tree.tag(node) {
        "textarea" => tree.set_text(node, value),
        "select" => {
            for (option, info) in select_options(tree, node) {
                if info.value == value {
                    tree.set_attribute(option, "selected", "");
                } else {
                    tree.remove_attribute(option, "selected");
                }
            }
        }
        _ => tree.set_attribute(node, "value", value),
    }
}

#[async_trait]
impl PageHandle for SnapshotPage {
    async fn query_element(
        &self,
        descriptor: &SelectorDescriptor,
    ) -> Result<Option<ElementHandle>, PageError> {
        let state = self.state.read();
        let node = resolve_unique(&state.tree, descriptor)
            .map_err(|e| PageError::Protocol(e.to_string()))?;
        Ok(node.map(|n| ElementHandle::new(n.index().to_string())))
    }

    async fn element_state(&self, element: &ElementHandle) -> Result<ElementState, PageError> {
        let state = self.state.read();
        let node = state.node(element)?;
        let tree = &state.tree;
        let tag = tree.tag(node).to_string();
        let visible = !is_hidden(tree, node);
        let options = if tag == "select" {
            select_options(tree, node).into_iter().map(|(_, o)| o).collect()
        } else {
            Vec::new()
        };
        Ok(ElementState {
            input_type: (tag == "input")
                .then(|| tree.attr(node, "type").unwrap_or("text").to_ascii_lowercase()),
            visible,
            enabled: !tree.has_attr(node, "disabled"),
            value: field_value(tree, node),
            text: normalize_text(&tree.text_content(node)),
            options,
            rect: visible.then_some(Rect {
                x: 0.0,
                y: 0.0,
                width: 100.0,
                height: 20.0,
            }),
            tag,
        })
    }

    async fn dispatch_event(
        &self,
        element: Option<&ElementHandle>,
        event: EventSpec,
    ) -> Result<(), PageError> {
        let mut state = self.state.write();
        let node = element.map(|handle| state.node(handle)).transpose()?;

        if let Some(node) = node {
            match &event {
                EventSpec::Click {
                    button: MouseButton::Left,
                    ..
                } => {
                    let toggles = state.tree.tag(node) == "input"
                        && matches!(state.tree.attr(node, "type"), Some("checkbox" | "radio"));
                    if toggles {
                        let checked = state.tree.has_attr(node, "checked");
                        state.mutate(|tree| {
                            if checked {
                                tree.remove_attribute(node, "checked");
                            } else {
                                tree.set_attribute(node, "checked", "");
                            }
                        });
                    }
                    state.focused = Some(node);
                }
                EventSpec::Focus => state.focused = Some(node),
                EventSpec::Blur => {
                    if state.focused == Some(node) {
                        state.focused = None;
                    }
                }
                EventSpec::ClearValue => state.mutate(|tree| set_field_value(tree, node, "")),
                EventSpec::InsertText { text } => {
                    let current = field_value(&state.tree, node).unwrap_or_default();
                    let next = format!("{current}{text}");
                    state.mutate(|tree| set_field_value(tree, node, &next));
                }
                EventSpec::SetValue { value } | EventSpec::SelectOption { value } => {
                    state.mutate(|tree| set_field_value(tree, node, value));
                }
                EventSpec::ScrollIntoView => {
                    if state.tree.has_attr(node, OFFSCREEN_ATTR) {
                        state.mutate(|tree| {
                            tree.remove_attribute(node, OFFSCREEN_ATTR);
                        });
                    }
                }
                EventSpec::SetFiles { paths } => {
                    let joined = paths.join(",");
                    state.mutate(|tree| tree.set_attribute(node, "data-files", &joined));
                }
                _ => {}
            }
        }

        let target = node.map(|n| state.tree.describe(n));
        state.events.push(DispatchedEvent { target, event });
        Ok(())
    }

    async fn read_property(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, PageError> {
        let state = self.state.read();
        let node = state.node(element)?;
        let tree = &state.tree;
        Ok(match name {
            "textContent" => Some(tree.text_content(node)),
            "innerText" => Some(normalize_text(&tree.text_content(node))),
            "value" => field_value(tree, node),
            "tagName" => Some(tree.tag(node).to_ascii_uppercase()),
            "checked" | "disabled" => Some(tree.has_attr(node, name).to_string()),
            other => tree.attr(node, other).map(str::to_string),
        })
    }

    async fn read_attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, PageError> {
        let state = self.state.read();
        let node = state.node(element)?;
        Ok(state.tree.attr(node, name).map(str::to_string))
    }

    async fn evaluate_script(&self, expression: &str) -> Result<serde_json::Value, PageError> {
        self.state
            .read()
            .scripts
            .get(expression)
            .cloned()
            .ok_or_else(|| PageError::Unsupported("script evaluation on a snapshot".to_string()))
    }

    async fn navigate(&self, url: &str) -> Result<(), PageError> {
        let mut state = self.state.write();
        if let Some(html) = state.pages.get(url).cloned() {
            state.tree = ElementTree::from_html(&html);
            state.focused = None;
            state.mutations += 1;
        }
        state.url = url.to_string();
        Ok(())
    }

    async fn wait_for_load(&self, _timeout: Duration) -> Result<(), PageError> {
        Ok(())
    }

    async fn current_url(&self) -> Result<String, PageError> {
        Ok(self.url())
    }

    async fn activity(&self) -> Result<PageActivity, PageError> {
        let state = self.state.read();
        Ok(PageActivity {
            in_flight_requests: state.in_flight,
            mutation_count: state.mutations,
        })
    }

    async fn page_text(&self) -> Result<String, PageError> {
        let state = self.state.read();
        Ok(normalize_text(&state.tree.text_content(state.tree.root())))
    }

    async fn screenshot(&self, _full_page: bool) -> Result<String, PageError> {
        Ok(BLANK_PNG.to_string())
    }

    async fn focused_element(&self) -> Result<Option<ElementHandle>, PageError> {
        let state = self.state.read();
        Ok(state
            .focused
            .filter(|&n| state.tree.is_attached(n))
            .map(|n| ElementHandle::new(n.index().to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORM: &str = r#"<html><body>
        <input id="name" value="x">
        <textarea id="bio">hi</textarea>
        <select id="size"><option value="s">Small</option><option value="m" selected>Medium</option></select>
        <div hidden><button id="ghost">Ghost</button></div>
        <button id="far" data-offscreen>Far</button>
        <button id="off" disabled>Off</button>
    </body></html>"#;

    async fn handle(page: &SnapshotPage, css: &str) -> ElementHandle {
        page.query_element(&SelectorDescriptor::css(css))
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_field_values() {
        let page = SnapshotPage::from_html(FORM);
        assert_eq!(page.value_of("#name").as_deref(), Some("x"));
        assert_eq!(page.value_of("#bio").as_deref(), Some("hi"));
        assert_eq!(page.value_of("#size").as_deref(), Some("m"));

        let size = handle(&page, "#size").await;
        let state = page.element_state(&size).await.unwrap();
        assert_eq!(state.options.len(), 2);
        assert_eq!(state.options[0].text, "Small");
    }

    #[tokio::test]
    async fn test_visibility_and_enabled() {
        let page = SnapshotPage::from_html(FORM);
        let ghost = handle(&page, "#ghost").await;
        assert!(!page.element_state(&ghost).await.unwrap().visible);

        let far = handle(&page, "#far").await;
        assert!(!page.element_state(&far).await.unwrap().visible);
        page.dispatch_event(Some(&far), EventSpec::ScrollIntoView)
            .await
            .unwrap();
        assert!(page.element_state(&far).await.unwrap().visible);

        let off = handle(&page, "#off").await;
        assert!(!page.element_state(&off).await.unwrap().enabled);
    }

    #[tokio::test]
    async fn test_typing_events_update_value() {
        let page = SnapshotPage::from_html(FORM);
        let name = handle(&page, "#name").await;
        let before = page.activity().await.unwrap().mutation_count;

        page.dispatch_event(Some(&name), EventSpec::ClearValue)
            .await
            .unwrap();
        for text in ["a", "b"] {
            page.dispatch_event(
                Some(&name),
                EventSpec::InsertText {
                    text: text.to_string(),
                },
            )
            .await
            .unwrap();
        }
        assert_eq!(page.value_of("#name").as_deref(), Some("ab"));
        assert_eq!(page.activity().await.unwrap().mutation_count, before + 3);
        assert_eq!(page.events().len(), 3);
        assert_eq!(page.events()[0].target.as_deref(), Some("<input#name>"));
    }

    #[tokio::test]
    async fn test_stale_handle_is_detached() {
        let page = SnapshotPage::from_html(FORM);
        let name = handle(&page, "#name").await;
        page.update(|tree| {
            let node = tree.query_css("#name").unwrap()[0];
            tree.remove_node(node);
        });
        let err = page.element_state(&name).await.unwrap_err();
        assert!(matches!(err, PageError::Detached(_)));
    }

    #[tokio::test]
    async fn test_navigate_swaps_document() {
        let page = SnapshotPage::from_html(FORM);
        page.add_page("https://site/next", "<html><body><h1>Next</h1></body></html>");
        page.navigate("https://site/next").await.unwrap();
        assert_eq!(page.current_url().await.unwrap(), "https://site/next");
        assert_eq!(page.page_text().await.unwrap(), "Next");
    }

    #[tokio::test]
    async fn test_scripts_are_unsupported_unless_registered() {
        let page = SnapshotPage::from_html(FORM);
        let err = page.evaluate_script("1 + 1").await.unwrap_err();
        assert!(matches!(err, PageError::Unsupported(_)));

        page.set_script_result("1 + 1", serde_json::json!(2));
        assert_eq!(page.evaluate_script("1 + 1").await.unwrap(), 2);
    }
}
