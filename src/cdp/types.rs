//! CDP (Chrome DevTools Protocol) type definitions
//!
//! Wire frame types plus the typed event payloads the core consumes.

use serde::{Deserialize, Serialize};

/// CDP JSON-RPC request
#[derive(Debug, Clone, Serialize)]
pub struct CdpRequest {
    /// Request ID
    pub id: u64,
    /// Method name (e.g., "Page.navigate")
    pub method: String,
    /// Method parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    /// Session ID for multi-session targets
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// CDP JSON-RPC notification (event)
#[derive(Debug, Clone, Deserialize)]
pub struct CdpNotification {
    /// Event method (e.g., "Page.frameStartedLoading")
    pub method: String,
    /// Event parameters
    #[serde(default)]
    pub params: serde_json::Value,
    /// Session ID for multi-session targets
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<String>,
}

/// CDP JSON-RPC response
#[derive(Debug, Clone, Deserialize)]
pub struct CdpRpcResponse {
    /// Response ID (matches request ID)
    pub id: u64,
    /// Response result
    #[serde(default)]
    pub result: serde_json::Value,
    /// Error if any
    #[serde(default)]
    pub error: Option<CdpErrorDetail>,
}

/// CDP error detail
#[derive(Debug, Clone, Deserialize)]
pub struct CdpErrorDetail {
    /// Error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Additional error data
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// Target description, as returned by `Target.getTargets` / the discovery
/// endpoint and carried in `Target.targetCreated`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDescription {
    /// Stable target ID
    #[serde(alias = "id")]
    pub target_id: String,
    /// Target type ("page", "iframe", "service_worker", ...)
    #[serde(rename = "type")]
    pub target_type: String,
    /// Current URL; mutates as the target navigates
    #[serde(default)]
    pub url: String,
    /// Current title
    #[serde(default)]
    pub title: String,
    /// Whether a debugger is attached
    #[serde(default)]
    pub attached: bool,
}

impl TargetDescription {
    /// True for tab/window targets.
    pub fn is_page(&self) -> bool {
        self.target_type == "page"
    }
}

/// `Target.targetCreated` payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetCreated {
    pub target_info: TargetDescription,
}

/// HTTP response attached to network events
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireResponse {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub status_text: String,
}

/// `Network.requestWillBeSent` payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestWillBeSent {
    pub request_id: String,
    pub request: WireRequest,
    /// Present when this event continues a redirect chain
    #[serde(default)]
    pub redirect_response: Option<WireResponse>,
}

/// Request description inside network events
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRequest {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub method: String,
}

/// `Network.responseReceived` payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseReceived {
    pub request_id: String,
    pub response: WireResponse,
}

/// `Network.requestIntercepted` payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestIntercepted {
    pub interception_id: String,
    pub request: WireRequest,
}

/// Frame lifecycle events the navigation coordinator correlates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameLifecycle {
    StartedLoading,
    StoppedLoading,
    Navigated,
    ScheduledNavigation,
    ClearedScheduledNavigation,
    NavigatedWithinDocument,
}

/// A frame lifecycle event with its frame id.
#[derive(Debug, Clone)]
pub struct FrameEvent {
    pub frame_id: String,
    pub lifecycle: FrameLifecycle,
    /// Frame URL when the event carries one
    pub url: Option<String>,
}

/// `Page.lifecycleEvent` payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleEvent {
    #[serde(default)]
    pub frame_id: String,
    pub name: String,
}

/// `Page.javascriptDialogOpening` payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogOpening {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub default_prompt: Option<String>,
}

/// Box model for a DOM node: four 8-number quads (border, padding, content,
/// margin), each 4 corner points.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxModel {
    /// Border box quad: [x1,y1, x2,y2, x3,y3, x4,y4]
    pub border: Vec<f64>,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
}

/// `DOM.getBoxModel` result
#[derive(Debug, Clone, Deserialize)]
pub struct GetBoxModelResult {
    pub model: BoxModel,
}

/// `Page.navigate` result
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigateResult {
    #[serde(default)]
    pub frame_id: String,
    #[serde(default)]
    pub loader_id: Option<String>,
    /// Browser-reported failure reason; present means the command failed
    #[serde(default)]
    pub error_text: Option<String>,
}
