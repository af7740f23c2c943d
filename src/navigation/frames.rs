//! Frame settlement tracking
//!
//! Follows the frame lifecycle topic and keeps a pending-set of frames that
//! are currently loading. Callers await a frame's settlement; the pending
//! set is mutated only from the event path, so waits and events cannot race
//! each other.

use crate::cdp::types::{FrameEvent, FrameLifecycle};
use crate::session::events::EventBus;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, warn};

/// Pending frames and their settlement waiters.
#[derive(Debug, Clone, Default)]
pub struct FrameSignals {
    pending: Arc<Mutex<HashMap<String, Vec<oneshot::Sender<()>>>>>,
}

impl FrameSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a frame is currently loading.
    pub fn is_pending(&self, frame_id: &str) -> bool {
        self.pending
            .lock()
            .map(|p| p.contains_key(frame_id))
            .unwrap_or(false)
    }

    /// Await the frame settling. Resolves immediately when the frame is not
    /// pending. Fails with a connection-lost error when the session resets
    /// underneath the waiter.
    pub async fn wait_settled(&self, frame_id: &str) -> Result<()> {
        let receiver = {
            let mut pending = self
                .pending
                .lock()
                .map_err(|_| Error::internal("Frame table poisoned"))?;
            match pending.get_mut(frame_id) {
                Some(waiters) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    Some(rx)
                }
                None => None,
            }
        };

        match receiver {
            Some(rx) => rx.await.map_err(|_| {
                Error::connection_lost("Session reset while waiting for frame to settle")
            }),
            None => Ok(()),
        }
    }

    /// Apply one frame event to the pending set.
    pub fn on_event(&self, event: &FrameEvent) {
        let Ok(mut pending) = self.pending.lock() else {
            return;
        };
        match event.lifecycle {
            FrameLifecycle::StartedLoading | FrameLifecycle::ScheduledNavigation => {
                pending.entry(event.frame_id.clone()).or_default();
            }
            FrameLifecycle::StoppedLoading
            | FrameLifecycle::Navigated
            | FrameLifecycle::ClearedScheduledNavigation
            | FrameLifecycle::NavigatedWithinDocument => {
                if let Some(waiters) = pending.remove(&event.frame_id) {
                    debug!(
                        "Frame {} settled, waking {} waiters",
                        event.frame_id,
                        waiters.len()
                    );
                    for waiter in waiters {
                        let _ = waiter.send(());
                    }
                }
            }
        }
    }

    /// Drop all pending state. Outstanding waiters observe the reset as a
    /// connection-lost error.
    pub fn reset(&self) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.clear();
        }
    }
}

/// Spawn the task feeding a [`FrameSignals`] from the frame topic.
pub fn spawn_frame_tracker(bus: &EventBus, signals: FrameSignals) -> tokio::task::JoinHandle<()> {
    let mut frames = bus.subscribe_frames();
    tokio::spawn(async move {
        loop {
            match frames.recv().await {
                Ok(event) => signals.on_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Frame tracker lagged by {} events", n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    signals.reset();
                    break;
                }
            }
        }
    })
}
