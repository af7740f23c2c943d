//! Mock CDP transport for testing
//!
//! A scriptable in-memory connection: tests install a responder closure,
//! inject events as if the browser had sent them, and inspect the commands
//! the code under test issued.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use crate::cdp::traits::{CdpConnection, CdpError, CdpEvent, CdpResponse};
use crate::Error;

/// Responder scripted by a test: `Ok(result)` or `Err(message)` which is
/// surfaced as a CDP-level error.
type Responder =
    dyn Fn(&str, &serde_json::Value) -> Result<serde_json::Value, String> + Send + Sync;

/// Mock CDP connection
pub struct MockCdpConnection {
    is_open: AtomicBool,
    next_id: AtomicU64,
    responder: Mutex<Option<Arc<Responder>>>,
    calls: Mutex<Vec<(String, serde_json::Value)>>,
    events: broadcast::Sender<CdpEvent>,
}

impl std::fmt::Debug for MockCdpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCdpConnection")
            .field("is_open", &self.is_open)
            .finish()
    }
}

impl MockCdpConnection {
    /// Create a new mock connection answering `{}` to everything
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            is_open: AtomicBool::new(true),
            next_id: AtomicU64::new(1),
            responder: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            events,
        }
    }

    /// Install a responder closure deciding per-method results
    pub fn respond_with<F>(&self, responder: F)
    where
        F: Fn(&str, &serde_json::Value) -> Result<serde_json::Value, String>
            + Send
            + Sync
            + 'static,
    {
        *self.responder.lock().unwrap() = Some(Arc::new(responder));
    }

    /// Commands sent through this connection, in order
    pub fn recorded_calls(&self) -> Vec<(String, serde_json::Value)> {
        self.calls.lock().unwrap().clone()
    }

    /// Recorded calls to one method only
    pub fn calls_to(&self, method: &str) -> Vec<serde_json::Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
            .collect()
    }

    /// Inject an event as if the browser had emitted it
    pub fn emit_event(&self, method: &str, params: serde_json::Value) {
        let _ = self.events.send(CdpEvent {
            method: method.to_string(),
            params,
            session_id: None,
        });
    }
}

impl Default for MockCdpConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CdpConnection for MockCdpConnection {
    async fn send_command(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<CdpResponse, Error> {
        if !self.is_open.load(Ordering::Relaxed) {
            return Err(Error::connection_lost("Mock connection is closed"));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), params.clone()));

        let responder = self.responder.lock().unwrap().clone();
        let result = match responder {
            Some(responder) => responder(method, &params),
            None => Ok(serde_json::json!({})),
        };

        match result {
            Ok(value) => Ok(CdpResponse {
                id,
                result: Some(value),
                error: None,
            }),
            Err(message) => Ok(CdpResponse {
                id,
                result: None,
                error: Some(CdpError {
                    code: -32000,
                    message,
                    data: None,
                }),
            }),
        }
    }

    fn subscribe_events(&self) -> broadcast::Receiver<CdpEvent> {
        self.events.subscribe()
    }

    async fn close(&self) -> Result<(), Error> {
        self.is_open.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.is_open.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_response_is_empty_object() {
        let conn = MockCdpConnection::new();
        let response = conn
            .send_command("Page.enable", serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(response.result, Some(serde_json::json!({})));
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn test_responder_errors_become_cdp_errors() {
        let conn = MockCdpConnection::new();
        conn.respond_with(|method, _| {
            if method == "DOM.getBoxModel" {
                Err("Could not compute box model.".to_string())
            } else {
                Ok(serde_json::json!({}))
            }
        });

        let response = conn
            .send_command("DOM.getBoxModel", serde_json::json!({}))
            .await
            .unwrap();
        assert!(response.error.is_some());
    }

    #[tokio::test]
    async fn test_event_injection_reaches_subscribers() {
        let conn = MockCdpConnection::new();
        let mut rx = conn.subscribe_events();

        conn.emit_event("Page.frameStartedLoading", serde_json::json!({"frameId": "F1"}));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.method, "Page.frameStartedLoading");
    }

    #[tokio::test]
    async fn test_closed_connection_rejects() {
        let conn = MockCdpConnection::new();
        conn.close().await.unwrap();

        let result = conn.send_command("Page.enable", serde_json::json!({})).await;
        assert!(matches!(result, Err(Error::ConnectionLost(_))));
    }
}
