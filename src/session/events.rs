//! Typed event bus
//!
//! Classifies the raw CDP notification stream into concrete payload types
//! and fans them out on per-topic broadcast channels. The bus and its pump
//! task belong to one session; a reconnect builds a fresh bus, so listeners
//! can never outlive the session that armed them.

use crate::cdp::traits::CdpEvent;
use crate::cdp::types::{
    DialogOpening, FrameEvent, FrameLifecycle, LifecycleEvent, RequestIntercepted,
    RequestWillBeSent, ResponseReceived, TargetCreated, TargetDescription,
};
use crate::session::SessionGuard;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Channel capacity per topic
const TOPIC_CAPACITY: usize = 256;

/// Session lifecycle signals
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSignal {
    /// All required domains are enabled; events are flowing
    Created,
    /// The session was closed or replaced
    Closed,
}

/// Target lifecycle signals
#[derive(Debug, Clone)]
pub enum TargetSignal {
    /// A new target appeared
    Created(TargetDescription),
    /// A freshly created target obtained its first real URL
    Navigated { target_id: String, url: String },
}

/// Network-domain signals the navigation coordinator and the interception
/// engine consume
#[derive(Debug, Clone)]
pub enum NetworkSignal {
    RequestWillBeSent(RequestWillBeSent),
    ResponseReceived(ResponseReceived),
    RequestIntercepted(RequestIntercepted),
}

/// Per-session typed event bus
#[derive(Debug, Clone)]
pub struct EventBus {
    session: broadcast::Sender<SessionSignal>,
    targets: broadcast::Sender<TargetSignal>,
    network: broadcast::Sender<NetworkSignal>,
    frames: broadcast::Sender<FrameEvent>,
    lifecycle: broadcast::Sender<LifecycleEvent>,
    dialogs: broadcast::Sender<DialogOpening>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            session: broadcast::channel(TOPIC_CAPACITY).0,
            targets: broadcast::channel(TOPIC_CAPACITY).0,
            network: broadcast::channel(TOPIC_CAPACITY).0,
            frames: broadcast::channel(TOPIC_CAPACITY).0,
            lifecycle: broadcast::channel(TOPIC_CAPACITY).0,
            dialogs: broadcast::channel(TOPIC_CAPACITY).0,
        }
    }

    /// Caller-facing lifecycle topic. `Created` arrives once the manager has
    /// enabled every domain; `Closed` arrives when the session dies, whether
    /// through `close()` or a dropped transport.
    pub fn subscribe_session(&self) -> broadcast::Receiver<SessionSignal> {
        self.session.subscribe()
    }

    pub fn subscribe_targets(&self) -> broadcast::Receiver<TargetSignal> {
        self.targets.subscribe()
    }

    pub fn subscribe_network(&self) -> broadcast::Receiver<NetworkSignal> {
        self.network.subscribe()
    }

    pub fn subscribe_frames(&self) -> broadcast::Receiver<FrameEvent> {
        self.frames.subscribe()
    }

    pub fn subscribe_lifecycle(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.lifecycle.subscribe()
    }

    pub fn subscribe_dialogs(&self) -> broadcast::Receiver<DialogOpening> {
        self.dialogs.subscribe()
    }

    /// Announce the session ready; emitted only after all domains enabled
    pub fn emit_session(&self, signal: SessionSignal) {
        let _ = self.session.send(signal);
    }

    pub fn emit_target(&self, signal: TargetSignal) {
        let _ = self.targets.send(signal);
    }

    /// Classify one raw notification and publish it to its topic.
    ///
    /// Unknown methods are ignored; they belong to domains the core does
    /// not consume.
    pub fn dispatch_raw(&self, event: CdpEvent) {
        match event.method.as_str() {
            "Page.frameStartedLoading" => {
                self.publish_frame(&event, FrameLifecycle::StartedLoading)
            }
            "Page.frameStoppedLoading" => {
                self.publish_frame(&event, FrameLifecycle::StoppedLoading)
            }
            "Page.frameScheduledNavigation" => {
                self.publish_frame(&event, FrameLifecycle::ScheduledNavigation)
            }
            "Page.frameClearedScheduledNavigation" => {
                self.publish_frame(&event, FrameLifecycle::ClearedScheduledNavigation)
            }
            "Page.frameNavigated" => {
                // frameNavigated nests the id under "frame"
                let frame_id = event.params["frame"]["id"].as_str().unwrap_or_default();
                let url = event.params["frame"]["url"].as_str().map(String::from);
                let _ = self.frames.send(FrameEvent {
                    frame_id: frame_id.to_string(),
                    lifecycle: FrameLifecycle::Navigated,
                    url,
                });
            }
            "Page.navigatedWithinDocument" => {
                let frame_id = event.params["frameId"].as_str().unwrap_or_default();
                let url = event.params["url"].as_str().map(String::from);
                let _ = self.frames.send(FrameEvent {
                    frame_id: frame_id.to_string(),
                    lifecycle: FrameLifecycle::NavigatedWithinDocument,
                    url,
                });
            }
            "Page.loadEventFired" => {
                let _ = self.lifecycle.send(LifecycleEvent {
                    frame_id: String::new(),
                    name: "load".to_string(),
                });
            }
            "Page.lifecycleEvent" => {
                if let Ok(lifecycle) = serde_json::from_value::<LifecycleEvent>(event.params) {
                    let _ = self.lifecycle.send(lifecycle);
                }
            }
            "Page.javascriptDialogOpening" => {
                match serde_json::from_value::<DialogOpening>(event.params) {
                    Ok(dialog) => {
                        let _ = self.dialogs.send(dialog);
                    }
                    Err(e) => warn!("Malformed dialog event: {}", e),
                }
            }
            "Network.requestWillBeSent" => {
                if let Ok(payload) = serde_json::from_value::<RequestWillBeSent>(event.params) {
                    let _ = self.network.send(NetworkSignal::RequestWillBeSent(payload));
                }
            }
            "Network.responseReceived" => {
                if let Ok(payload) = serde_json::from_value::<ResponseReceived>(event.params) {
                    let _ = self.network.send(NetworkSignal::ResponseReceived(payload));
                }
            }
            "Network.requestIntercepted" => {
                if let Ok(payload) = serde_json::from_value::<RequestIntercepted>(event.params) {
                    let _ = self
                        .network
                        .send(NetworkSignal::RequestIntercepted(payload));
                }
            }
            "Target.targetCreated" => {
                if let Ok(payload) = serde_json::from_value::<TargetCreated>(event.params) {
                    let _ = self.targets.send(TargetSignal::Created(payload.target_info));
                }
            }
            other => {
                debug!("Ignoring event from unconsumed domain: {}", other);
            }
        }
    }

    fn publish_frame(&self, event: &CdpEvent, lifecycle: FrameLifecycle) {
        let frame_id = event.params["frameId"].as_str().unwrap_or_default();
        let _ = self.frames.send(FrameEvent {
            frame_id: frame_id.to_string(),
            lifecycle,
            url: None,
        });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn the per-session pump feeding the bus from the raw event stream.
///
/// The task ends when the connection's event channel closes, which happens
/// exactly when the session dies.
pub fn spawn_pump(guard: SessionGuard, bus: EventBus) -> tokio::task::JoinHandle<()> {
    let mut raw = guard.subscribe_events();
    tokio::spawn(async move {
        loop {
            match raw.recv().await {
                Ok(event) => bus.dispatch_raw(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Event pump lagged by {} events", n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Raw event channel closed, pump exiting");
                    bus.emit_session(SessionSignal::Closed);
                    break;
                }
            }
        }
    })
}
