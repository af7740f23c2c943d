//! JavaScript dialog handling
//!
//! Dialogs block the renderer until answered. The broker answers each
//! opening dialog from its registered rules; a dialog nothing handles is
//! recorded as session poison, surfaced by the next navigation instead of
//! silently deadlocking the page.

use crate::cdp::domains::PageDomain;
use crate::cdp::types::DialogOpening;
use crate::session::events::EventBus;
use crate::{Error, Result};
use regex::Regex;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// How a matched dialog is answered.
#[derive(Debug, Clone)]
pub enum DialogAction {
    Accept,
    Dismiss,
    /// Accept a prompt, submitting the given text
    AcceptWithText(String),
}

/// One registered dialog rule.
#[derive(Debug, Clone)]
pub struct DialogRule {
    /// Dialog kind: "alert", "confirm", "prompt" or "beforeunload"
    pub kind: String,
    /// Optional message filter; a rule without one matches any message
    pub message_pattern: Option<Regex>,
    pub action: DialogAction,
}

/// Answers opening dialogs and records the unhandled ones.
#[derive(Debug, Clone)]
pub struct DialogBroker {
    page: PageDomain,
    rules: Arc<Mutex<Vec<DialogRule>>>,
    poison: Arc<Mutex<Option<DialogOpening>>>,
}

impl DialogBroker {
    pub fn new(page: PageDomain) -> Self {
        Self {
            page,
            rules: Arc::new(Mutex::new(Vec::new())),
            poison: Arc::new(Mutex::new(None)),
        }
    }

    /// Register a rule. Rules are consulted in registration order; the
    /// first match wins.
    pub fn register(&self, rule: DialogRule) {
        if let Ok(mut rules) = self.rules.lock() {
            rules.push(rule);
        }
    }

    /// Remove every rule for a dialog kind.
    pub fn unregister_kind(&self, kind: &str) {
        if let Ok(mut rules) = self.rules.lock() {
            rules.retain(|r| r.kind != kind);
        }
    }

    /// Take the recorded unhandled dialog, if any, as the fatal error it is.
    pub fn take_poison(&self) -> Option<Error> {
        let dialog = self.poison.lock().ok()?.take()?;
        Some(Error::UnhandledDialog {
            kind: dialog.kind,
            message: dialog.message,
        })
    }

    /// Answer one opening dialog.
    pub async fn on_dialog(&self, dialog: DialogOpening) -> Result<()> {
        let action = self
            .rules
            .lock()
            .ok()
            .and_then(|rules| {
                rules
                    .iter()
                    .find(|rule| {
                        rule.kind == dialog.kind
                            && rule
                                .message_pattern
                                .as_ref()
                                .map(|re| re.is_match(&dialog.message))
                                .unwrap_or(true)
                    })
                    .map(|rule| rule.action.clone())
            });

        let Some(action) = action else {
            error!(
                "Unhandled {} dialog: \"{}\"; the page is blocked until the session resets",
                dialog.kind, dialog.message
            );
            if let Ok(mut poison) = self.poison.lock() {
                *poison = Some(dialog);
            }
            return Ok(());
        };

        info!("Answering {} dialog: \"{}\"", dialog.kind, dialog.message);
        match action {
            DialogAction::Accept => self.page.handle_javascript_dialog(true, None).await,
            DialogAction::Dismiss => self.page.handle_javascript_dialog(false, None).await,
            DialogAction::AcceptWithText(text) => {
                self.page.handle_javascript_dialog(true, Some(&text)).await
            }
        }
    }
}

/// Spawn the task feeding a broker from the dialog topic.
pub fn spawn_dialog_broker(bus: &EventBus, broker: DialogBroker) -> tokio::task::JoinHandle<()> {
    let mut dialogs = bus.subscribe_dialogs();
    tokio::spawn(async move {
        loop {
            match dialogs.recv().await {
                Ok(dialog) => {
                    if let Err(e) = broker.on_dialog(dialog).await {
                        warn!("Failed to answer dialog: {}", e);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Dialog broker lagged by {} events", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdp::mock::MockCdpConnection;
    use crate::session::events::spawn_pump;
    use crate::session::SessionGuard;
    use std::sync::Arc;

    fn broker_over(conn: Arc<MockCdpConnection>) -> DialogBroker {
        DialogBroker::new(PageDomain::new(SessionGuard::new(conn)))
    }

    fn dialog(kind: &str, message: &str) -> DialogOpening {
        DialogOpening {
            kind: kind.to_string(),
            message: message.to_string(),
            default_prompt: None,
        }
    }

    #[tokio::test]
    async fn test_matching_rule_answers_dialog() {
        let conn = Arc::new(MockCdpConnection::new());
        let broker = broker_over(conn.clone());
        broker.register(DialogRule {
            kind: "confirm".to_string(),
            message_pattern: None,
            action: DialogAction::Accept,
        });

        broker.on_dialog(dialog("confirm", "Leave page?")).await.unwrap();

        let calls = conn.calls_to("Page.handleJavaScriptDialog");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0]["accept"], true);
        assert!(broker.take_poison().is_none());
    }

    #[tokio::test]
    async fn test_message_pattern_filters_rules() {
        let conn = Arc::new(MockCdpConnection::new());
        let broker = broker_over(conn.clone());
        broker.register(DialogRule {
            kind: "confirm".to_string(),
            message_pattern: Some(Regex::new(r"delete").unwrap()),
            action: DialogAction::Accept,
        });
        broker.register(DialogRule {
            kind: "confirm".to_string(),
            message_pattern: None,
            action: DialogAction::Dismiss,
        });

        broker
            .on_dialog(dialog("confirm", "Really delete this item?"))
            .await
            .unwrap();
        broker.on_dialog(dialog("confirm", "Leave page?")).await.unwrap();

        let calls = conn.calls_to("Page.handleJavaScriptDialog");
        assert_eq!(calls[0]["accept"], true);
        assert_eq!(calls[1]["accept"], false);
    }

    #[tokio::test]
    async fn test_prompt_text_is_submitted() {
        let conn = Arc::new(MockCdpConnection::new());
        let broker = broker_over(conn.clone());
        broker.register(DialogRule {
            kind: "prompt".to_string(),
            message_pattern: None,
            action: DialogAction::AcceptWithText("blue".to_string()),
        });

        broker
            .on_dialog(dialog("prompt", "Favourite colour?"))
            .await
            .unwrap();

        let calls = conn.calls_to("Page.handleJavaScriptDialog");
        assert_eq!(calls[0]["promptText"], "blue");
    }

    #[tokio::test]
    async fn test_broker_task_answers_dialogs_from_the_wire() {
        let conn = Arc::new(MockCdpConnection::new());
        let guard = SessionGuard::new(conn.clone());
        let bus = EventBus::new();
        spawn_pump(guard.clone(), bus.clone());

        let broker = DialogBroker::new(PageDomain::new(guard));
        broker.register(DialogRule {
            kind: "confirm".to_string(),
            message_pattern: None,
            action: DialogAction::Accept,
        });
        spawn_dialog_broker(&bus, broker.clone());

        conn.emit_event(
            "Page.javascriptDialogOpening",
            serde_json::json!({"type": "confirm", "message": "Leave page?"}),
        );

        // The pump and the broker run on their own tasks
        let mut calls = Vec::new();
        for _ in 0..50 {
            calls = conn.calls_to("Page.handleJavaScriptDialog");
            if !calls.is_empty() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(5)).await;
        }
        assert_eq!(calls[0]["accept"], true);
        assert!(broker.take_poison().is_none());
    }

    #[tokio::test]
    async fn test_unhandled_dialog_is_recorded_as_poison() {
        let conn = Arc::new(MockCdpConnection::new());
        let broker = broker_over(conn.clone());

        broker
            .on_dialog(dialog("alert", "Unexpected!"))
            .await
            .unwrap();

        // No answer was sent; the dialog is recorded instead
        assert!(conn.calls_to("Page.handleJavaScriptDialog").is_empty());
        let poison = broker.take_poison().unwrap();
        assert!(matches!(poison, Error::UnhandledDialog { .. }));
        assert!(poison.is_fatal());

        // Poison is taken once
        assert!(broker.take_poison().is_none());
    }
}
