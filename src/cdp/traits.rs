//! CDP transport layer traits
//!
//! Abstract interface between the session layer and the wire.

use async_trait::async_trait;
use serde_json::Value;

/// CDP event representation
#[derive(Debug, Clone)]
pub struct CdpEvent {
    /// Event method (e.g., "Page.frameStartedLoading")
    pub method: String,
    /// Event parameters
    pub params: Value,
    /// Session ID (for multi-session targets)
    pub session_id: Option<String>,
}

/// CDP response representation
#[derive(Debug, Clone)]
pub struct CdpResponse {
    /// Response ID (matches request ID)
    pub id: u64,
    /// Response result
    pub result: Option<Value>,
    /// Error if any
    pub error: Option<CdpError>,
}

/// CDP error representation
#[derive(Debug, Clone)]
pub struct CdpError {
    /// Error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Additional error data
    pub data: Option<Value>,
}

/// CDP connection trait
///
/// One WebSocket connection to a DevTools target. The session guard wraps
/// this with crash detection; nothing above the guard talks to it directly.
#[async_trait]
pub trait CdpConnection: Send + Sync + std::fmt::Debug {
    /// Send a CDP command and wait for the matching response
    async fn send_command(&self, method: &str, params: Value) -> Result<CdpResponse, crate::Error>;

    /// Subscribe to the raw event stream
    fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<CdpEvent>;

    /// Close the connection
    async fn close(&self) -> Result<(), crate::Error>;

    /// Check if the underlying socket is open
    fn is_open(&self) -> bool;
}
