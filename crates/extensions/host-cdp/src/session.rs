//! A session attached to one page target.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::debug;

use crate::client::Transport;
use crate::error::CdpError;
use crate::protocol::{CdpMouseButton, CdpResponse, KeyEventType, MouseEventType};

pub struct PageSession {
    target_id: String,
    session_id: String,
    transport: Arc<Transport>,
    events: Mutex<Option<mpsc::UnboundedReceiver<CdpResponse>>>,
}

impl PageSession {
    pub(crate) fn new(
        target_id: String,
        session_id: String,
        transport: Arc<Transport>,
        events: mpsc::UnboundedReceiver<CdpResponse>,
    ) -> Self {
        Self {
            target_id,
            session_id,
            transport,
            events: Mutex::new(Some(events)),
        }
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// Take the event stream of this session. Only the first caller gets it.
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<CdpResponse>> {
        self.events.lock().take()
    }

    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError> {
        self.transport
            .call(method, params, Some(&self.session_id))
            .await
    }

    pub(crate) async fn enable_domains(&self) -> Result<(), CdpError> {
        self.call("Page.enable", None).await?;
        self.call("DOM.enable", None).await?;
        self.call("Runtime.enable", None).await?;
        self.call("Network.enable", None).await?;
        debug!("Enabled CDP domains for session {}", self.session_id);
        Ok(())
    }

    /// Evaluate an expression and return its value by JSON.
    pub async fn evaluate(&self, expression: &str) -> Result<Value, CdpError> {
        let result = self
            .call(
                "Runtime.evaluate",
                Some(json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                })),
            )
            .await?;
        check_exception(&result)?;
        Ok(result["result"]["value"].clone())
    }

    /// Evaluate an expression and return a remote object id, `None` for null.
    pub async fn evaluate_object(&self, expression: &str) -> Result<Option<String>, CdpError> {
        let result = self
            .call(
                "Runtime.evaluate",
                Some(json!({ "expression": expression, "returnByValue": false })),
            )
            .await?;
        check_exception(&result)?;
        Ok(result["result"]["objectId"].as_str().map(str::to_string))
    }

    pub async fn mouse_event(
        &self,
        kind: MouseEventType,
        (x, y): (f64, f64),
        button: CdpMouseButton,
        click_count: u32,
    ) -> Result<(), CdpError> {
        self.call(
            "Input.dispatchMouseEvent",
            Some(json!({
                "type": kind,
                "x": x,
                "y": y,
                "button": button,
                "clickCount": click_count,
            })),
        )
        .await?;
        Ok(())
    }

    /// Move, press and release at `point`.
    pub async fn click_at(
        &self,
        point: (f64, f64),
        button: CdpMouseButton,
        click_count: u32,
    ) -> Result<(), CdpError> {
        self.mouse_event(MouseEventType::MouseMoved, point, CdpMouseButton::None, 0)
            .await?;
        self.mouse_event(MouseEventType::MousePressed, point, button, click_count)
            .await?;
        self.mouse_event(MouseEventType::MouseReleased, point, button, click_count)
            .await?;
        debug!("Clicked at ({}, {})", point.0, point.1);
        Ok(())
    }

    /// `text` is what a printable key inserts; `None` for shortcuts.
    pub async fn key_event(
        &self,
        kind: KeyEventType,
        key: &str,
        modifiers: i32,
        text: Option<&str>,
    ) -> Result<(), CdpError> {
        let mut params = json!({
            "type": kind,
            "key": key,
            "modifiers": modifiers,
        });
        if let Some(text) = text {
            params["text"] = json!(text);
        }
        self.call("Input.dispatchKeyEvent", Some(params)).await?;
        Ok(())
    }

    pub async fn insert_text(&self, text: &str) -> Result<(), CdpError> {
        self.call("Input.insertText", Some(json!({ "text": text })))
            .await?;
        Ok(())
    }

    pub async fn set_file_input_files(
        &self,
        object_id: &str,
        files: &[String],
    ) -> Result<(), CdpError> {
        self.call(
            "DOM.setFileInputFiles",
            Some(json!({ "objectId": object_id, "files": files })),
        )
        .await?;
        Ok(())
    }

    pub async fn navigate(&self, url: &str) -> Result<(), CdpError> {
        let result = self
            .call("Page.navigate", Some(json!({ "url": url })))
            .await?;
        if let Some(error) = result.get("errorText").and_then(Value::as_str) {
            return Err(CdpError::NavigationFailed(format!("{}: {}", url, error)));
        }
        debug!("Navigated to {}", url);
        Ok(())
    }

    /// Base64 PNG.
    pub async fn screenshot(&self, full_page: bool) -> Result<String, CdpError> {
        let result = self
            .call(
                "Page.captureScreenshot",
                Some(json!({ "format": "png", "captureBeyondViewport": full_page })),
            )
            .await?;
        result["data"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| CdpError::InvalidResponse("Missing screenshot data".to_string()))
    }
}

fn check_exception(result: &Value) -> Result<(), CdpError> {
    let Some(exception) = result.get("exceptionDetails") else {
        return Ok(());
    };
    let message = exception["exception"]["description"]
        .as_str()
        .or_else(|| exception["text"].as_str())
        .unwrap_or("Unknown error");
    Err(CdpError::JavaScript(message.to_string()))
}
