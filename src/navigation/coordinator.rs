//! Navigation coordinator
//!
//! Correlates the navigate command with the network events that answer it:
//! follows the redirect chain by request id, rejects on browser-reported
//! errors and non-success statuses, and awaits the configured lifecycle
//! events under one deadline. Subscriptions are taken before the command is
//! issued so no answering event can be missed; dropping the receivers is
//! the whole teardown.

use crate::cdp::domains::PageDomain;
use crate::cdp::types::FrameLifecycle;
use crate::config::{BrowserConfig, LoadEvent};
use crate::navigation::dialogs::DialogBroker;
use crate::session::events::{EventBus, NetworkSignal};
use crate::target::normalize_url;
use crate::{Error, Result};
use std::collections::HashSet;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Final HTTP status of a settled navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseStatus {
    pub code: u16,
    pub text: String,
}

/// What a settled navigation produced.
#[derive(Debug, Clone)]
pub struct NavigationOutcome {
    /// The URL that was requested
    pub url: String,
    /// Final status; absent when the caller opted out of waiting
    pub status: Option<ResponseStatus>,
    /// Intermediate redirect URLs, in order
    pub redirects: Vec<String>,
}

/// Per-call overrides; unset fields fall back to the session config.
#[derive(Debug, Clone, Default)]
pub struct NavigationOptions {
    pub wait_for_navigation: Option<bool>,
    pub wait_for_events: Option<Vec<LoadEvent>>,
    pub timeout_ms: Option<u64>,
}

/// Navigation coordinator
#[derive(Debug, Clone)]
pub struct NavigationCoordinator {
    page: PageDomain,
    bus: EventBus,
    broker: DialogBroker,
    config: BrowserConfig,
}

impl NavigationCoordinator {
    pub fn new(
        page: PageDomain,
        bus: EventBus,
        broker: DialogBroker,
        config: BrowserConfig,
    ) -> Self {
        Self {
            page,
            bus,
            broker,
            config,
        }
    }

    /// Navigate the page to `url` and wait until the navigation settles.
    pub async fn navigate(&self, url: &str, options: &NavigationOptions) -> Result<NavigationOutcome> {
        // A dialog left unanswered before this call makes the page
        // unresponsive; surface it instead of timing out
        if let Some(poison) = self.broker.take_poison() {
            return Err(poison);
        }

        let wait = options
            .wait_for_navigation
            .unwrap_or(self.config.wait_for_navigation);
        let timeout_ms = options.timeout_ms.unwrap_or(self.config.navigation_timeout_ms);
        let wanted_events = options
            .wait_for_events
            .clone()
            .unwrap_or_else(|| self.config.wait_for_events.clone());

        // Subscribe before issuing the command
        let network = self.bus.subscribe_network();
        let lifecycle = self.bus.subscribe_lifecycle();
        let frames = self.bus.subscribe_frames();

        info!("Navigating to {}", url);
        let result = self.page.navigate(url).await?;
        if let Some(error_text) = result.error_text {
            return Err(Error::navigation_failed(url, None, error_text));
        }

        if !wait {
            debug!("Navigation issued without waiting");
            return Ok(NavigationOutcome {
                url: url.to_string(),
                status: None,
                redirects: Vec::new(),
            });
        }

        let deadline = tokio::time::Duration::from_millis(timeout_ms);
        let settle = self.settle(url, wanted_events, network, lifecycle, frames);
        let outcome = match tokio::time::timeout(deadline, settle).await {
            Ok(outcome) => outcome?,
            Err(_) => {
                return Err(Error::timeout(format!(
                    "Navigation to {} did not settle within {} ms",
                    url, timeout_ms
                )))
            }
        };

        // A dialog that opened during the load blocks everything after it
        if let Some(poison) = self.broker.take_poison() {
            return Err(poison);
        }

        Ok(outcome)
    }

    /// Drive the event correlation until the navigation settles.
    async fn settle(
        &self,
        url: &str,
        wanted_events: Vec<LoadEvent>,
        mut network: broadcast::Receiver<NetworkSignal>,
        mut lifecycle: broadcast::Receiver<crate::cdp::types::LifecycleEvent>,
        mut frames: broadcast::Receiver<crate::cdp::types::FrameEvent>,
    ) -> Result<NavigationOutcome> {
        let wanted = normalize_url(url);
        let mut pending_names: HashSet<&'static str> = wanted_events
            .iter()
            .map(|e| e.lifecycle_name())
            .collect();

        let mut request_id: Option<String> = None;
        let mut status: Option<ResponseStatus> = None;
        let mut redirects: Vec<String> = Vec::new();

        loop {
            if status.is_some() && pending_names.is_empty() {
                return Ok(NavigationOutcome {
                    url: url.to_string(),
                    status,
                    redirects,
                });
            }

            tokio::select! {
                signal = network.recv() => match signal {
                    Ok(NetworkSignal::RequestWillBeSent(event)) => {
                        match (&request_id, &event.redirect_response) {
                            // The redirect chain continues under the same id
                            (Some(id), Some(redirect)) if *id == event.request_id => {
                                debug!("Redirect: {} -> {}", redirect.url, event.request.url);
                                redirects.push(event.request.url.clone());
                            }
                            (None, _) if normalize_url(&event.request.url) == wanted => {
                                request_id = Some(event.request_id.clone());
                            }
                            _ => {}
                        }
                    }
                    Ok(NetworkSignal::ResponseReceived(event)) => {
                        if request_id.as_deref() == Some(event.request_id.as_str()) {
                            if event.response.status >= 400 {
                                warn!(
                                    "Navigation to {} answered {} {}",
                                    url, event.response.status, event.response.status_text
                                );
                                return Err(Error::navigation_failed(
                                    url,
                                    Some(event.response.status),
                                    event.response.status_text,
                                ));
                            }
                            status = Some(ResponseStatus {
                                code: event.response.status,
                                text: event.response.status_text.clone(),
                            });
                        }
                    }
                    Ok(NetworkSignal::RequestIntercepted(_)) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Navigation correlation lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(Error::connection_lost("Session closed mid-navigation"));
                    }
                },
                event = lifecycle.recv() => match event {
                    Ok(event) => {
                        pending_names.remove(event.name.as_str());
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Lifecycle wait lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(Error::connection_lost("Session closed mid-navigation"));
                    }
                },
                event = frames.recv() => match event {
                    Ok(event) => {
                        // Fragment and history navigations produce no network
                        // traffic; treat them as an immediate success
                        if event.lifecycle == FrameLifecycle::NavigatedWithinDocument
                            && event
                                .url
                                .as_deref()
                                .map(|u| normalize_url(u) == wanted)
                                .unwrap_or(false)
                        {
                            return Ok(NavigationOutcome {
                                url: url.to_string(),
                                status: Some(ResponseStatus {
                                    code: 200,
                                    text: "OK".to_string(),
                                }),
                                redirects: Vec::new(),
                            });
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Frame wait lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(Error::connection_lost("Session closed mid-navigation"));
                    }
                },
            }
        }
    }
}
