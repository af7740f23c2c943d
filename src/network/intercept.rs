//! Request interception
//!
//! Ordered substring rules over paused requests. The rule list and the
//! browser-side interception flag live under one lock, so the flag always
//! reflects whether any rule exists: the first rule registered arms
//! interception, removing the last one disarms it. A paused request no rule
//! matches is continued unmodified.

use crate::cdp::domains::NetworkDomain;
use crate::cdp::types::{RequestIntercepted, WireRequest};
use crate::network::response::{build_raw_response, MockResponse};
use crate::session::events::{EventBus, NetworkSignal};
use crate::Result;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

/// What a custom handler decided for one paused request.
#[derive(Debug, Clone)]
pub enum InterceptDecision {
    /// Resume, optionally overriding url, method, headers or postData
    Continue(serde_json::Value),
    /// Fulfill from a fabricated response
    Respond(MockResponse),
    /// Abort the request
    Block,
}

/// Per-request callback for handler rules.
pub type InterceptHandler = Arc<dyn Fn(&WireRequest) -> InterceptDecision + Send + Sync>;

/// What to do with requests matching a rule.
#[derive(Clone)]
pub enum InterceptAction {
    /// Abort the request
    Block,
    /// Re-point the request at another URL
    Redirect(String),
    /// Fulfill from a fabricated response
    Mock(MockResponse),
    /// Decide per request
    Handler(InterceptHandler),
}

impl std::fmt::Debug for InterceptAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InterceptAction::Block => write!(f, "Block"),
            InterceptAction::Redirect(url) => write!(f, "Redirect({})", url),
            InterceptAction::Mock(mock) => write!(f, "Mock(status {})", mock.status),
            InterceptAction::Handler(_) => write!(f, "Handler(..)"),
        }
    }
}

#[derive(Debug, Clone)]
struct InterceptRule {
    /// Substring matched against the request URL
    pattern: String,
    action: InterceptAction,
}

#[derive(Debug, Default)]
struct EngineState {
    rules: Vec<InterceptRule>,
    armed: bool,
}

/// Interception engine
#[derive(Clone)]
pub struct InterceptionEngine {
    network: NetworkDomain,
    state: Arc<Mutex<EngineState>>,
}

impl InterceptionEngine {
    pub fn new(network: NetworkDomain) -> Self {
        Self {
            network,
            state: Arc::new(Mutex::new(EngineState::default())),
        }
    }

    /// Register a rule. Rules are consulted in registration order; the
    /// first whose pattern is a substring of the request URL wins.
    ///
    /// The browser flag is flipped before the list is touched, so a failed
    /// transport call leaves both unchanged.
    pub async fn add_rule<S: Into<String>>(&self, pattern: S, action: InterceptAction) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.armed {
            self.network.set_request_interception(true).await?;
            state.armed = true;
            info!("Request interception armed");
        }
        state.rules.push(InterceptRule {
            pattern: pattern.into(),
            action,
        });
        Ok(())
    }

    /// Remove every rule with the given pattern.
    pub async fn remove_rule(&self, pattern: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let remaining = state
            .rules
            .iter()
            .filter(|rule| rule.pattern != pattern)
            .count();
        if remaining == 0 && state.armed {
            self.network.set_request_interception(false).await?;
            state.armed = false;
            info!("Request interception disarmed");
        }
        state.rules.retain(|rule| rule.pattern != pattern);
        Ok(())
    }

    /// Drop all rules and disarm interception.
    pub async fn clear(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.armed {
            self.network.set_request_interception(false).await?;
            state.armed = false;
        }
        state.rules.clear();
        Ok(())
    }

    pub async fn rule_count(&self) -> usize {
        self.state.lock().await.rules.len()
    }

    /// Resolve one paused request against the rules.
    pub async fn on_intercepted(&self, event: RequestIntercepted) -> Result<()> {
        let action = {
            let state = self.state.lock().await;
            state
                .rules
                .iter()
                .find(|rule| event.request.url.contains(&rule.pattern))
                .map(|rule| rule.action.clone())
        };

        let overrides = match action {
            None => {
                debug!("No rule for {}, continuing", event.request.url);
                json!({})
            }
            Some(InterceptAction::Block) => {
                info!("Blocking {}", event.request.url);
                json!({ "errorReason": "Failed" })
            }
            Some(InterceptAction::Redirect(url)) => {
                info!("Redirecting {} to {}", event.request.url, url);
                json!({ "url": url })
            }
            Some(InterceptAction::Mock(mock)) => {
                info!(
                    "Answering {} with mock status {}",
                    event.request.url, mock.status
                );
                json!({ "rawResponse": build_raw_response(&mock)? })
            }
            Some(InterceptAction::Handler(handler)) => match handler(&event.request) {
                InterceptDecision::Continue(overrides) => overrides,
                InterceptDecision::Respond(mock) => {
                    json!({ "rawResponse": build_raw_response(&mock)? })
                }
                InterceptDecision::Block => json!({ "errorReason": "Failed" }),
            },
        };

        self.network
            .continue_intercepted_request(&event.interception_id, overrides)
            .await
    }
}

/// Spawn the task resolving paused requests from the network topic.
pub fn spawn_interceptor(bus: &EventBus, engine: InterceptionEngine) -> tokio::task::JoinHandle<()> {
    let mut network = bus.subscribe_network();
    tokio::spawn(async move {
        loop {
            match network.recv().await {
                Ok(NetworkSignal::RequestIntercepted(event)) => {
                    if let Err(e) = engine.on_intercepted(event).await {
                        warn!("Failed to resolve intercepted request: {}", e);
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Interceptor lagged by {} events", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
