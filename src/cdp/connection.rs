//! CDP WebSocket connection implementation
//!
//! WebSocket transport to a DevTools target. The stream is split: the write
//! half is shared behind a mutex, the read half lives in a spawned reader
//! task that resolves pending commands and broadcasts events.

use super::traits::{CdpConnection, CdpError as CdpErrorResponse, CdpEvent, CdpResponse};
use super::types::{CdpNotification, CdpRequest, CdpRpcResponse};
use crate::Error;
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;
type PendingMap = HashMap<u64, PendingCommand>;

/// Capacity of the raw event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default per-command response timeout
const COMMAND_TIMEOUT_SECS: u64 = 30;

/// Pending command response
#[derive(Debug)]
struct PendingCommand {
    /// Response channel sender
    sender: oneshot::Sender<CdpResponse>,
    /// Command method (for logging)
    method: String,
}

/// CDP WebSocket connection implementation
#[derive(Debug)]
pub struct CdpWebSocketConnection {
    /// WebSocket URL
    url: String,
    /// Write half of the socket
    sink: Mutex<Option<WsSink>>,
    /// Next command ID
    next_id: AtomicU64,
    /// Pending commands (ID -> response sender)
    pending_commands: Arc<Mutex<PendingMap>>,
    /// Raw event fan-out
    events: broadcast::Sender<CdpEvent>,
    /// Socket open flag; cleared by the reader task on close/error
    is_open: Arc<AtomicBool>,
}

impl CdpWebSocketConnection {
    /// Connect to a DevTools target WebSocket
    ///
    /// # Arguments
    /// * `url` - WebSocket URL (e.g., "ws://localhost:9222/devtools/page/ABC123")
    pub async fn connect<S: Into<String>>(url: S) -> Result<Arc<Self>, Error> {
        let url = url.into();
        info!("Connecting to DevTools WebSocket: {}", url);

        let (ws_stream, _) = connect_async(&url)
            .await
            .map_err(|e| Error::connect(format!("WebSocket dial to {} failed: {}", url, e)))?;

        let (sink, source) = ws_stream.split();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let connection = Arc::new(Self {
            url,
            sink: Mutex::new(Some(sink)),
            next_id: AtomicU64::new(1),
            pending_commands: Arc::new(Mutex::new(HashMap::new())),
            events,
            is_open: Arc::new(AtomicBool::new(true)),
        });

        let pending = Arc::clone(&connection.pending_commands);
        let event_tx = connection.events.clone();
        let is_open = Arc::clone(&connection.is_open);

        tokio::spawn(async move {
            Self::read_loop(source, pending, event_tx, is_open).await;
        });

        info!("WebSocket connection established");
        Ok(connection)
    }

    /// Reader task: dispatch responses to their waiters and fan out events.
    ///
    /// On stream end or a closed-socket error the open flag is cleared and
    /// every in-flight command is failed with a crash error instead of being
    /// left to time out.
    async fn read_loop(
        mut source: WsSource,
        pending: Arc<Mutex<PendingMap>>,
        event_tx: broadcast::Sender<CdpEvent>,
        is_open: Arc<AtomicBool>,
    ) {
        while let Some(message) = source.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    Self::handle_message(&text, &pending, &event_tx).await;
                }
                Ok(Message::Close(_)) => {
                    info!("WebSocket close frame received");
                    break;
                }
                Ok(_) => {
                    // Binary/ping/pong frames are not part of the protocol
                }
                Err(e) => {
                    error!("WebSocket error: {}", e);
                    break;
                }
            }
        }

        is_open.store(false, Ordering::SeqCst);
        Self::fail_in_flight(&pending).await;
        debug!("Reader task exited");
    }

    /// Fail every pending command with a connection-lost response.
    async fn fail_in_flight(pending: &Arc<Mutex<PendingMap>>) {
        let mut pending = pending.lock().await;
        for (id, cmd) in pending.drain() {
            warn!(
                "Failing in-flight command {} ({}) after connection loss",
                id, cmd.method
            );
            let _ = cmd.sender.send(CdpResponse {
                id,
                result: None,
                error: Some(CdpErrorResponse {
                    code: -1,
                    message: "Browser process crashed or connection closed".to_string(),
                    data: None,
                }),
            });
        }
    }

    /// Handle one incoming text frame.
    async fn handle_message(
        text: &str,
        pending: &Arc<Mutex<PendingMap>>,
        event_tx: &broadcast::Sender<CdpEvent>,
    ) {
        // Responses carry an id; everything else is a notification
        if let Ok(response) = serde_json::from_str::<CdpRpcResponse>(text) {
            let mut pending = pending.lock().await;
            if let Some(cmd) = pending.remove(&response.id) {
                debug!("Response for command {} ({})", response.id, cmd.method);
                let _ = cmd.sender.send(CdpResponse {
                    id: response.id,
                    result: Some(response.result),
                    error: response.error.map(|e| CdpErrorResponse {
                        code: e.code,
                        message: e.message,
                        data: e.data,
                    }),
                });
            } else {
                warn!("Response for unknown command ID: {}", response.id);
            }
            return;
        }

        if let Ok(notification) = serde_json::from_str::<CdpNotification>(text) {
            debug!("Event: {}", notification.method);
            // Send fails only when no one is subscribed, which is fine
            let _ = event_tx.send(CdpEvent {
                method: notification.method,
                params: notification.params,
                session_id: notification.session_id,
            });
            return;
        }

        warn!("Unknown message format: {}", text);
    }
}

#[async_trait]
impl CdpConnection for CdpWebSocketConnection {
    /// Send a CDP command and wait for the matching response
    async fn send_command(&self, method: &str, params: serde_json::Value) -> Result<CdpResponse, Error> {
        if !self.is_open.load(Ordering::SeqCst) {
            return Err(Error::connection_lost(format!(
                "Socket to {} is not open",
                self.url
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let request = CdpRequest {
            id,
            method: method.to_string(),
            params: if params.is_null() { None } else { Some(params) },
            session_id: None,
        };

        let json = serde_json::to_string(&request)?;
        debug!("Sending command {}: {}", id, method);

        let (sender, receiver) = oneshot::channel();
        {
            let mut pending = self.pending_commands.lock().await;
            pending.insert(
                id,
                PendingCommand {
                    sender,
                    method: method.to_string(),
                },
            );
        }

        {
            let mut sink = self.sink.lock().await;
            let sink = sink
                .as_mut()
                .ok_or_else(|| Error::connection_lost("WebSocket sink already closed"))?;
            if let Err(e) = sink.send(Message::Text(json.into())).await {
                self.is_open.store(false, Ordering::SeqCst);
                self.pending_commands.lock().await.remove(&id);
                return Err(Error::connection_lost(format!(
                    "Failed to send {}: {}",
                    method, e
                )));
            }
        }

        let timeout = tokio::time::Duration::from_secs(COMMAND_TIMEOUT_SECS);
        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(Error::connection_lost(format!(
                "Command {} ({}) dropped without a response",
                id, method
            ))),
            Err(_) => {
                self.pending_commands.lock().await.remove(&id);
                Err(Error::timeout(format!("Command {} ({}) timed out", id, method)))
            }
        }
    }

    fn subscribe_events(&self) -> broadcast::Receiver<CdpEvent> {
        self.events.subscribe()
    }

    /// Close the connection
    async fn close(&self) -> Result<(), Error> {
        info!("Closing CDP WebSocket connection to {}", self.url);
        self.is_open.store(false, Ordering::SeqCst);

        let mut sink = self.sink.lock().await;
        if let Some(mut sink) = sink.take() {
            sink.send(Message::Close(None))
                .await
                .map_err(|e| Error::connection_lost(format!("Failed to close WebSocket: {}", e)))?;
        }

        Ok(())
    }

    fn is_open(&self) -> bool {
        self.is_open.load(Ordering::SeqCst)
    }
}
