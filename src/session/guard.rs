//! Transport proxy
//!
//! Wraps every outbound remote call with a session-alive race check so calls
//! fail fast on a crashed browser instead of hanging.

use crate::cdp::traits::{CdpConnection, CdpEvent};
use crate::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Session-scoped transport proxy.
///
/// Holds the alive flag for the session. Once cleared (crash detected, or
/// the session was replaced by a reconnect) every call through the guard
/// rejects immediately with a connection-lost error.
#[derive(Debug, Clone)]
pub struct SessionGuard {
    connection: Arc<dyn CdpConnection>,
    alive: Arc<AtomicBool>,
}

impl SessionGuard {
    /// Create a guard over a freshly established connection
    pub fn new(connection: Arc<dyn CdpConnection>) -> Self {
        Self {
            connection,
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Whether the session is still usable
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst) && self.connection.is_open()
    }

    /// Clear the alive flag; subsequent calls fail fast
    pub fn invalidate(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    /// Send a command, race-checked against the alive flag.
    ///
    /// Returns the command result value. A CDP-level error becomes
    /// `Error::Cdp`; a transport-level socket failure clears the alive flag
    /// and becomes `Error::ConnectionLost`.
    pub async fn call(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(Error::connection_lost(format!(
                "Session is closed, cannot call {}",
                method
            )));
        }

        if !self.connection.is_open() {
            // Crash observed by the reader task since our last call
            self.alive.store(false, Ordering::SeqCst);
            return Err(Error::connection_lost(format!(
                "Browser process exited, cannot call {}",
                method
            )));
        }

        debug!("Guarded call: {}", method);

        match self.connection.send_command(method, params).await {
            Ok(response) => {
                if let Some(error) = response.error {
                    // code -1 is the reader task's crash marker
                    if error.code == -1 {
                        self.alive.store(false, Ordering::SeqCst);
                        warn!("Call {} failed: connection lost mid-call", method);
                        return Err(Error::connection_lost(error.message));
                    }
                    return Err(Error::cdp(format!(
                        "{} failed: {} (code {})",
                        method, error.message, error.code
                    )));
                }
                Ok(response.result.unwrap_or(serde_json::Value::Null))
            }
            Err(Error::ConnectionLost(msg)) => {
                self.alive.store(false, Ordering::SeqCst);
                Err(Error::connection_lost(msg))
            }
            Err(e) => Err(e),
        }
    }

    /// Typed variant of [`call`](Self::call): deserialize the result.
    pub async fn call_into<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T> {
        let value = self.call(method, params).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Subscribe to the raw event stream of the underlying connection
    pub fn subscribe_events(&self) -> broadcast::Receiver<CdpEvent> {
        self.connection.subscribe_events()
    }

    /// Close the underlying connection and invalidate the guard
    pub async fn close(&self) -> Result<()> {
        self.invalidate();
        self.connection.close().await
    }
}
