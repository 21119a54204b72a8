//! [`PageHandle`] over a CDP page session.
//!
//! Lookups resolve descriptors against an [`ElementTree`] snapshot of the live
//! document, then address the element by its child-index path. Interactions go
//! through CDP input events where the browser must see trusted input (clicks,
//! hover, keys, typing) and through small DOM scripts otherwise.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use webreplay_protocols::{
    ElementHandle, ElementState, EventSpec, Modifiers, MouseButton, PageActivity, PageError,
    PageHandle, SelectorDescriptor,
};
use webreplay_selectors::{ElementTree, resolve_unique};

use crate::client::CdpClient;
use crate::error::CdpError;
use crate::protocol::{CdpMouseButton, CdpResponse, KeyEventType, MouseEventType};
use crate::scripts;
use crate::session::PageSession;

const HANDLE_PREFIX: &str = "path:";
const LOAD_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A live Chrome tab driven over CDP.
pub struct CdpPage {
    session: PageSession,
    in_flight: Arc<Mutex<HashSet<String>>>,
    tracker: Option<JoinHandle<()>>,
    _client: Option<CdpClient>,
}

impl CdpPage {
    /// Connect to Chrome at `endpoint` and drive its first open tab.
    pub async fn connect(endpoint: &str) -> Result<Self, CdpError> {
        let client = CdpClient::connect(endpoint).await?;
        let session = client.attach_first_page().await?;
        info!(target_id = %session.target_id(), "Attached to page");
        let mut page = Self::new(session);
        page._client = Some(client);
        Ok(page)
    }

    /// Wrap an attached session. Network tracking starts immediately.
    pub fn new(session: PageSession) -> Self {
        let in_flight = Arc::new(Mutex::new(HashSet::new()));
        let tracker = session
            .take_events()
            .map(|events| tokio::spawn(track_network(events, in_flight.clone())));
        Self {
            session,
            in_flight,
            tracker,
            _client: None,
        }
    }

    pub fn session(&self) -> &PageSession {
        &self.session
    }

    /// Run `body` against the element behind `handle`.
    async fn on_element(&self, handle: &ElementHandle, body: &str) -> Result<Value, CdpError> {
        let path = parse_handle(handle)?;
        let mut result = self
            .session
            .evaluate(&scripts::on_element(&path, body))
            .await?;
        if result.get("detached").and_then(Value::as_bool) == Some(true) {
            return Err(CdpError::Detached(handle.id.clone()));
        }
        Ok(result["value"].take())
    }

    async fn state_of(&self, handle: &ElementHandle) -> Result<ElementState, CdpError> {
        let value = self.on_element(handle, scripts::ELEMENT_STATE).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn center_of(&self, handle: &ElementHandle) -> Result<(f64, f64), PageError> {
        let state = self.state_of(handle).await?;
        match state.rect {
            Some(rect) if !rect.is_empty() => Ok(rect.center()),
            _ => Err(PageError::Protocol(format!(
                "{} has no layout box",
                handle.id
            ))),
        }
    }

    async fn key(
        &self,
        element: Option<&ElementHandle>,
        kind: KeyEventType,
        key: &str,
        modifiers: Modifiers,
    ) -> Result<(), CdpError> {
        if let (Some(element), KeyEventType::KeyDown) = (element, kind) {
            self.on_element(element, scripts::FOCUS).await?;
        }
        let text = key_text(key, &modifiers);
        self.session
            .key_event(kind, key, modifier_flags(&modifiers), text)
            .await
    }
}

impl Drop for CdpPage {
    fn drop(&mut self) {
        if let Some(tracker) = self.tracker.take() {
            tracker.abort();
        }
    }
}

#[async_trait]
impl PageHandle for CdpPage {
    async fn query_element(
        &self,
        descriptor: &SelectorDescriptor,
    ) -> Result<Option<ElementHandle>, PageError> {
        let html = self.session.evaluate(scripts::OUTER_HTML).await.map_err(PageError::from)?;
        let html = html
            .as_str()
            .ok_or_else(|| PageError::Protocol("document has no outerHTML".to_string()))?;
        let tree = ElementTree::from_html(html);
        let node = resolve_unique(&tree, descriptor)
            .map_err(|e| PageError::Protocol(e.to_string()))?;
        let handle = node
            .and_then(|node| tree.path_of(tree.root(), node))
            .map(|path| handle_for(&path));
        debug!(selector = %descriptor, found = handle.is_some(), "Queried live document");
        Ok(handle)
    }

    async fn element_state(&self, element: &ElementHandle) -> Result<ElementState, PageError> {
        Ok(self.state_of(element).await?)
    }

    async fn dispatch_event(
        &self,
        element: Option<&ElementHandle>,
        event: EventSpec,
    ) -> Result<(), PageError> {
        let on = |name: &str| {
            element.ok_or_else(|| PageError::Unsupported(format!("{name} without an element")))
        };

        match event {
            EventSpec::Click {
                button,
                click_count,
            } => {
                let center = self.center_of(on("click")?).await?;
                let button = match button {
                    MouseButton::Left => CdpMouseButton::Left,
                    MouseButton::Right => CdpMouseButton::Right,
                };
                self.session
                    .click_at(center, button, click_count.max(1))
                    .await?;
            }
            EventSpec::ContextMenu => {
                let center = self.center_of(on("contextmenu")?).await?;
                self.session
                    .click_at(center, CdpMouseButton::Right, 1)
                    .await?;
            }
            EventSpec::Hover => {
                let center = self.center_of(on("hover")?).await?;
                self.session
                    .mouse_event(MouseEventType::MouseMoved, center, CdpMouseButton::None, 0)
                    .await?;
            }
            EventSpec::Focus => {
                self.on_element(on("focus")?, scripts::FOCUS).await?;
            }
            EventSpec::Blur => {
                self.on_element(on("blur")?, scripts::BLUR).await?;
            }
            EventSpec::ClearValue => {
                self.on_element(on("clear_value")?, scripts::CLEAR_VALUE)
                    .await?;
            }
            EventSpec::InsertText { text } => {
                if let Some(element) = element {
                    self.on_element(element, scripts::FOCUS).await?;
                }
                self.session.insert_text(&text).await?;
            }
            EventSpec::SetValue { value } | EventSpec::SelectOption { value } => {
                self.on_element(on("set_value")?, &scripts::set_value(&value))
                    .await?;
            }
            EventSpec::Input => {
                self.on_element(on("input")?, &scripts::fire("input")).await?;
            }
            EventSpec::Change => {
                self.on_element(on("change")?, &scripts::fire("change"))
                    .await?;
            }
            EventSpec::KeyDown { key, modifiers } => {
                self.key(element, KeyEventType::KeyDown, &key, modifiers)
                    .await?;
            }
            EventSpec::KeyUp { key, modifiers } => {
                self.key(element, KeyEventType::KeyUp, &key, modifiers)
                    .await?;
            }
            EventSpec::ScrollIntoView => {
                self.on_element(on("scroll_into_view")?, scripts::SCROLL_INTO_VIEW)
                    .await?;
            }
            EventSpec::ScrollTo { x, y, smooth } => match element {
                Some(element) => {
                    self.on_element(element, &scripts::scroll_element(x, y, smooth))
                        .await?;
                }
                None => {
                    self.session
                        .evaluate(&scripts::scroll_window(x, y, smooth))
                        .await?;
                }
            },
            EventSpec::SetFiles { paths } => {
                let element = on("set_files")?;
                let path = parse_handle(element)?;
                let object_id = self
                    .session
                    .evaluate_object(&scripts::element_object(&path))
                    .await?
                    .ok_or_else(|| CdpError::Detached(element.id.clone()))?;
                self.session.set_file_input_files(&object_id, &paths).await?;
            }
        }
        Ok(())
    }

    async fn read_property(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, PageError> {
        let value = self
            .on_element(element, &scripts::read_property(name))
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn read_attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, PageError> {
        let value = self
            .on_element(element, &scripts::read_attribute(name))
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn evaluate_script(&self, expression: &str) -> Result<Value, PageError> {
        Ok(self.session.evaluate(expression).await?)
    }

    async fn navigate(&self, url: &str) -> Result<(), PageError> {
        self.in_flight.lock().clear();
        Ok(self.session.navigate(url).await?)
    }

    async fn wait_for_load(&self, timeout: Duration) -> Result<(), PageError> {
        let poll = async {
            loop {
                let state = self.session.evaluate(scripts::READY_STATE).await?;
                if state.as_str() == Some("complete") {
                    return Ok::<(), CdpError>(());
                }
                tokio::time::sleep(LOAD_POLL_INTERVAL).await;
            }
        };
        match tokio::time::timeout(timeout, poll).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(PageError::Timeout(timeout.as_millis() as u64)),
        }
    }

    async fn current_url(&self) -> Result<String, PageError> {
        let url = self.session.evaluate(scripts::CURRENT_URL).await?;
        Ok(url.as_str().unwrap_or_default().to_string())
    }

    async fn activity(&self) -> Result<PageActivity, PageError> {
        let mutations = self.session.evaluate(scripts::MUTATION_COUNT).await?;
        Ok(PageActivity {
            in_flight_requests: self.in_flight.lock().len() as u32,
            mutation_count: mutations.as_u64().unwrap_or_default(),
        })
    }

    async fn page_text(&self) -> Result<String, PageError> {
        let text = self.session.evaluate(scripts::PAGE_TEXT).await?;
        Ok(text.as_str().unwrap_or_default().to_string())
    }

    async fn screenshot(&self, full_page: bool) -> Result<String, PageError> {
        Ok(self.session.screenshot(full_page).await?)
    }

    async fn focused_element(&self) -> Result<Option<ElementHandle>, PageError> {
        let path = self.session.evaluate(scripts::FOCUSED_PATH).await?;
        let Some(items) = path.as_array() else {
            return Ok(None);
        };
        let path: Option<Vec<usize>> = items
            .iter()
            .map(|i| i.as_u64().map(|i| i as usize))
            .collect();
        Ok(path.map(|p| handle_for(&p)))
    }
}

/// Keeps the set of request ids that have started but not finished.
async fn track_network(
    mut events: mpsc::UnboundedReceiver<CdpResponse>,
    in_flight: Arc<Mutex<HashSet<String>>>,
) {
    while let Some(event) = events.recv().await {
        apply_network_event(&mut in_flight.lock(), &event);
    }
    debug!("Page event stream closed");
}

fn apply_network_event(in_flight: &mut HashSet<String>, event: &CdpResponse) {
    let request_id = event
        .params
        .as_ref()
        .and_then(|p| p.get("requestId"))
        .and_then(Value::as_str);
    match (event.method.as_deref(), request_id) {
        (Some("Network.requestWillBeSent"), Some(id)) => {
            in_flight.insert(id.to_string());
        }
        (Some("Network.loadingFinished" | "Network.loadingFailed"), Some(id)) => {
            in_flight.remove(id);
        }
        _ => {}
    }
}

fn handle_for(path: &[usize]) -> ElementHandle {
    let items: Vec<String> = path.iter().map(usize::to_string).collect();
    ElementHandle::new(format!("{HANDLE_PREFIX}{}", items.join("/")))
}

fn parse_handle(handle: &ElementHandle) -> Result<Vec<usize>, CdpError> {
    let invalid = || CdpError::Detached(format!("not a CDP element handle: {}", handle.id));
    let rest = handle.id.strip_prefix(HANDLE_PREFIX).ok_or_else(invalid)?;
    if rest.is_empty() {
        return Ok(Vec::new());
    }
    rest.split('/')
        .map(|part| part.parse::<usize>().map_err(|_| invalid()))
        .collect()
}

/// CDP modifier bit mask: Alt=1, Ctrl=2, Meta=4, Shift=8.
fn modifier_flags(modifiers: &Modifiers) -> i32 {
    let mut flags = 0;
    if modifiers.alt {
        flags |= 1;
    }
    if modifiers.ctrl {
        flags |= 2;
    }
    if modifiers.meta {
        flags |= 4;
    }
    if modifiers.shift {
        flags |= 8;
    }
    flags
}

/// Text a key press inserts: single printable characters, and Enter, without
/// a command modifier.
fn key_text<'a>(key: &'a str, modifiers: &Modifiers) -> Option<&'a str> {
    if modifiers.ctrl || modifiers.alt || modifiers.meta {
        return None;
    }
    match key {
        "Enter" => Some("\r"),
        _ if key.chars().count() == 1 => Some(key),
        _ => None,
    }
}
