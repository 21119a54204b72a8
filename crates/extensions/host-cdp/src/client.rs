//! CDP WebSocket client.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::error::CdpError;
use crate::protocol::{BrowserVersion, CdpRequest, CdpResponse, PageInfo};
use crate::session::PageSession;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Browser connection shared by the client and its page sessions.
pub(crate) struct Transport {
    ws_tx: tokio::sync::Mutex<WsSink>,
    request_id: AtomicU64,
    pending: Mutex<HashMap<u64, oneshot::Sender<Result<Value, CdpError>>>>,
    /// Event sinks by session id.
    event_handlers: RwLock<HashMap<String, mpsc::UnboundedSender<CdpResponse>>>,
}

impl Transport {
    /// Send a command and wait for its response.
    pub(crate) async fn call(
        &self,
        method: &str,
        params: Option<Value>,
        session_id: Option<&str>,
    ) -> Result<Value, CdpError> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = CdpRequest {
            id,
            method: method.to_string(),
            params,
            session_id: session_id.map(str::to_string),
        };
        let json = serde_json::to_string(&request)?;
        trace!("CDP send: {}", json);

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        let sent = self.ws_tx.lock().await.send(Message::Text(json.into())).await;
        if let Err(e) = sent {
            self.pending.lock().remove(&id);
            return Err(e.into());
        }

        match tokio::time::timeout(COMMAND_TIMEOUT, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CdpError::SessionClosed),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(CdpError::Timeout(format!("Request {} timed out", method)))
            }
        }
    }

    fn register_session(&self, session_id: &str) -> mpsc::UnboundedReceiver<CdpResponse> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.event_handlers.write().insert(session_id.to_string(), tx);
        rx
    }

    fn route(&self, message: CdpResponse) {
        if let Some(id) = message.id {
            let Some(tx) = self.pending.lock().remove(&id) else {
                return;
            };
            let result = match message.error {
                Some(error) => Err(CdpError::Protocol {
                    code: error.code,
                    message: error.message,
                }),
                None => Ok(message.result.unwrap_or(Value::Null)),
            };
            let _ = tx.send(result);
        } else if message.method.is_some() {
            let session_id = message.session_id.clone().unwrap_or_default();
            if let Some(tx) = self.event_handlers.read().get(&session_id) {
                let _ = tx.send(message);
            }
        }
    }
}

/// Connection to one Chrome instance.
pub struct CdpClient {
    http_endpoint: Url,
    transport: Arc<Transport>,
    recv_task: JoinHandle<()>,
}

impl CdpClient {
    /// Connect to Chrome's debugging endpoint, e.g. `http://localhost:9222`.
    pub async fn connect(endpoint: &str) -> Result<Self, CdpError> {
        let mut http_endpoint = Url::parse(endpoint)?;
        if !http_endpoint.path().ends_with('/') {
            let path = format!("{}/", http_endpoint.path());
            http_endpoint.set_path(&path);
        }

        let version_url = http_endpoint.join("json/version")?;
        debug!("Fetching browser version from {}", version_url);
        let version: BrowserVersion = reqwest::get(version_url)
            .await
            .map_err(|e| CdpError::ChromeNotAvailable(format!("{}: {}", endpoint, e)))?
            .json()
            .await
            .map_err(|e| CdpError::ChromeNotAvailable(format!("{}: {}", endpoint, e)))?;

        let (ws_stream, _) = tokio_tungstenite::connect_async(&version.web_socket_debugger_url)
            .await
            .map_err(|e| CdpError::ConnectionFailed(format!("WebSocket: {}", e)))?;
        let (ws_sink, ws_source) = ws_stream.split();

        let transport = Arc::new(Transport {
            ws_tx: tokio::sync::Mutex::new(ws_sink),
            request_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            event_handlers: RwLock::new(HashMap::new()),
        });
        let recv_task = tokio::spawn(receive_loop(ws_source, transport.clone()));

        info!(browser = %version.browser, "Connected to Chrome");
        Ok(Self {
            http_endpoint,
            transport,
            recv_task,
        })
    }

    /// Open page targets.
    pub async fn list_pages(&self) -> Result<Vec<PageInfo>, CdpError> {
        let url = self.http_endpoint.join("json/list")?;
        let targets: Vec<PageInfo> = reqwest::get(url).await?.json().await?;
        Ok(targets
            .into_iter()
            .filter(|t| t.page_type == "page")
            .collect())
    }

    /// Create a tab. Chrome requires PUT for `/json/new`.
    pub async fn new_page(&self) -> Result<PageSession, CdpError> {
        let url = self.http_endpoint.join("json/new")?;
        let info: PageInfo = reqwest::Client::new().put(url).send().await?.json().await?;
        debug!("Created new page: {}", info.id);
        self.attach_page(&info.id).await
    }

    pub async fn attach_page(&self, target_id: &str) -> Result<PageSession, CdpError> {
        let result = self
            .transport
            .call(
                "Target.attachToTarget",
                Some(json!({ "targetId": target_id, "flatten": true })),
                None,
            )
            .await?;
        let session_id = result["sessionId"]
            .as_str()
            .ok_or_else(|| CdpError::InvalidResponse("Missing sessionId".to_string()))?
            .to_string();

        let events = self.transport.register_session(&session_id);
        let session = PageSession::new(
            target_id.to_string(),
            session_id,
            self.transport.clone(),
            events,
        );
        session.enable_domains().await?;
        Ok(session)
    }

    /// Attach to the first open page, opening one when there is none.
    pub async fn attach_first_page(&self) -> Result<PageSession, CdpError> {
        match self.list_pages().await?.first() {
            Some(page) => {
                debug!(url = %page.url, "Attaching to existing page");
                self.attach_page(&page.id).await
            }
            None => self.new_page().await,
        }
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self.recv_task.abort();
    }
}

async fn receive_loop(mut ws_source: WsSource, transport: Arc<Transport>) {
    while let Some(message) = ws_source.next().await {
        match message {
            Ok(Message::Text(text)) => {
                trace!("CDP recv: {}", text);
                match serde_json::from_str::<CdpResponse>(&text) {
                    Ok(response) => transport.route(response),
                    Err(e) => warn!("Failed to parse CDP message: {}", e),
                }
            }
            Ok(Message::Close(_)) => {
                debug!("WebSocket closed");
                break;
            }
            Err(e) => {
                error!("WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }
    // Dropping the senders fails every waiting call with SessionClosed.
    transport.pending.lock().clear();
    transport.event_handlers.write().clear();
}
