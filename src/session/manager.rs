//! Session manager
//!
//! Owns the single live protocol session: dials with bounded retries,
//! enables the required domains in a fixed order, arms crash detection, and
//! tears sessions down gracefully with a hard-kill fallback.

use crate::cdp::domains::{
    DomDomain, EmulationDomain, InputDomain, NetworkDomain, OverlayDomain, PageDomain,
    RuntimeDomain, SecurityDomain, TargetDomain,
};
use crate::cdp::traits::CdpConnection;
use crate::cdp::CdpWebSocketConnection;
use crate::config::BrowserConfig;
use crate::session::events::{spawn_pump, EventBus, SessionSignal};
use crate::session::SessionGuard;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Fixed backoff between dial attempts
const CONNECT_BACKOFF_MS: u64 = 250;

/// Grace period for the stop-page-then-disconnect close sequence
const CLOSE_GRACE_MS: u64 = 3000;

/// Where to find the browser's remote-debugging endpoint.
#[derive(Debug, Clone)]
pub struct ConnectTarget {
    pub host: String,
    pub port: u16,
    /// Reduced-feature browser variants lack the Overlay domain
    pub reduced_feature_set: bool,
}

impl ConnectTarget {
    pub fn new<S: Into<String>>(host: S, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            reduced_feature_set: false,
        }
    }
}

/// Plugin hook rewriting the connect target before the manager dials it.
pub type PreConnectionHook =
    Box<dyn Fn(ConnectTarget, BrowserConfig) -> (ConnectTarget, BrowserConfig) + Send + Sync>;

/// Dials a transport connection for a connect target.
///
/// The production connector discovers the page WebSocket URL over the
/// browser's HTTP endpoint; tests substitute a mock.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn dial(&self, target: &ConnectTarget) -> Result<Arc<dyn CdpConnection>>;
}

/// Discovers the first page target via the `/json` HTTP endpoint and opens
/// its debugger WebSocket.
#[derive(Debug, Default)]
pub struct HttpDiscoveryConnector;

#[async_trait]
impl Connector for HttpDiscoveryConnector {
    async fn dial(&self, target: &ConnectTarget) -> Result<Arc<dyn CdpConnection>> {
        let list_url = format!("http://{}:{}/json", target.host, target.port);

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::internal(format!("Failed to create HTTP client: {}", e)))?;

        let response = client
            .get(&list_url)
            .send()
            .await
            .map_err(|e| Error::connect(format!("Discovery request to {} failed: {}", list_url, e)))?;

        let targets: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| Error::connect(format!("Failed to parse target list: {}", e)))?;

        let ws_url = targets
            .iter()
            .find(|t| t.get("type").and_then(|v| v.as_str()) == Some("page"))
            .and_then(|t| t.get("webSocketDebuggerUrl"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                Error::connect(format!(
                    "No debuggable page target at {}:{}",
                    target.host, target.port
                ))
            })?;

        let connection = CdpWebSocketConnection::connect(ws_url).await?;
        Ok(connection as Arc<dyn CdpConnection>)
    }
}

/// One established protocol session plus its enabled domains.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    guard: SessionGuard,
    bus: EventBus,
    host: String,
    port: u16,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn guard(&self) -> &SessionGuard {
        &self.guard
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn endpoint(&self) -> (&str, u16) {
        (&self.host, self.port)
    }

    pub fn is_alive(&self) -> bool {
        self.guard.is_alive()
    }

    pub fn page(&self) -> PageDomain {
        PageDomain::new(self.guard.clone())
    }

    pub fn network(&self) -> NetworkDomain {
        NetworkDomain::new(self.guard.clone())
    }

    pub fn dom(&self) -> DomDomain {
        DomDomain::new(self.guard.clone())
    }

    pub fn runtime(&self) -> RuntimeDomain {
        RuntimeDomain::new(self.guard.clone())
    }

    pub fn input(&self) -> InputDomain {
        InputDomain::new(self.guard.clone())
    }

    pub fn targets(&self) -> TargetDomain {
        TargetDomain::new(self.guard.clone())
    }

    pub fn emulation(&self) -> EmulationDomain {
        EmulationDomain::new(self.guard.clone())
    }

    pub fn overlay(&self) -> OverlayDomain {
        OverlayDomain::new(self.guard.clone())
    }

    pub fn security(&self) -> SecurityDomain {
        SecurityDomain::new(self.guard.clone())
    }
}

/// Session manager
///
/// At most one session is alive at a time; connecting again invalidates the
/// previous session's guard. Connect and close are serialized behind one
/// async mutex, so a reconnect arriving while another is settling waits for
/// it instead of racing it.
pub struct SessionManager {
    config: BrowserConfig,
    connector: Arc<dyn Connector>,
    hook: Option<PreConnectionHook>,
    current: Mutex<Option<Session>>,
}

impl SessionManager {
    pub fn new(config: BrowserConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            hook: None,
            current: Mutex::new(None),
        }
    }

    /// Create a manager dialing real browsers over HTTP discovery
    pub fn with_discovery(config: BrowserConfig) -> Self {
        Self::new(config, Arc::new(HttpDiscoveryConnector))
    }

    /// Install the pre-connection hook called before every dial
    pub fn set_pre_connection_hook(&mut self, hook: PreConnectionHook) {
        self.hook = Some(hook);
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    /// Establish a session, retrying the dial up to `retries` times with a
    /// fixed backoff before surfacing a fatal connect error.
    pub async fn connect(&self, target: ConnectTarget, retries: u32) -> Result<Session> {
        let mut slot = self.current.lock().await;

        // A replaced session must not answer stale callers
        if let Some(previous) = slot.take() {
            warn!("Replacing live session to {}:{}", previous.host, previous.port);
            previous.guard.invalidate();
        }

        let (target, config) = match &self.hook {
            Some(hook) => hook(target, self.config.clone()),
            None => (target, self.config.clone()),
        };

        info!("Connecting to browser at {}:{}", target.host, target.port);

        let connection = self.dial_with_retries(&target, retries).await?;
        let guard = SessionGuard::new(connection);
        let bus = EventBus::new();
        spawn_pump(guard.clone(), bus.clone());

        let session = Session {
            id: uuid::Uuid::new_v4().to_string(),
            guard: guard.clone(),
            bus: bus.clone(),
            host: target.host.clone(),
            port: target.port,
        };

        // Later domains' events depend on earlier ones being armed; this
        // order is not negotiable.
        session.network().enable().await?;
        session.page().enable().await?;
        session.dom().enable().await?;
        session.security().enable().await?;
        if config.ignore_ssl_errors {
            session.security().set_ignore_certificate_errors(true).await?;
        }
        if !target.reduced_feature_set {
            session.overlay().enable().await?;
        }
        session.targets().set_discover_targets(true).await?;

        // Subscribers may assume events are flowing once they see this
        bus.emit_session(SessionSignal::Created);
        info!("Session {} established, domains enabled", session.id);

        *slot = Some(session.clone());
        Ok(session)
    }

    async fn dial_with_retries(
        &self,
        target: &ConnectTarget,
        retries: u32,
    ) -> Result<Arc<dyn CdpConnection>> {
        let mut last_error = None;
        for attempt in 0..=retries {
            match self.connector.dial(target).await {
                Ok(connection) => return Ok(connection),
                Err(e) => {
                    warn!(
                        "Dial attempt {}/{} failed: {}",
                        attempt + 1,
                        retries + 1,
                        e
                    );
                    last_error = Some(e);
                    if attempt < retries {
                        tokio::time::sleep(tokio::time::Duration::from_millis(
                            CONNECT_BACKOFF_MS,
                        ))
                        .await;
                    }
                }
            }
        }

        Err(Error::connect(format!(
            "Could not reach browser at {}:{} after {} attempts: {}",
            target.host,
            target.port,
            retries + 1,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    /// The live session, if any
    pub async fn session(&self) -> Option<Session> {
        self.current.lock().await.clone()
    }

    /// Re-attach whenever a freshly created target obtains its first URL.
    ///
    /// The target registry announces new page targets once they have a real
    /// URL; reconnecting then picks the newest debuggable page up. The task
    /// dies with the session's bus.
    pub fn attach_on_target_navigation(
        self: &Arc<Self>,
        session: &Session,
        target: ConnectTarget,
    ) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        let mut targets = session.bus().subscribe_targets();
        tokio::spawn(async move {
            loop {
                match targets.recv().await {
                    Ok(crate::session::events::TargetSignal::Navigated { target_id, url }) => {
                        info!("Attaching to target {} at {}", target_id, url);
                        if let Err(e) = manager.connect(target.clone(), 0).await {
                            warn!("Failed to attach to target {}: {}", target_id, e);
                        }
                        // The new session has its own bus; this one is stale
                        break;
                    }
                    Ok(_) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Attach watcher lagged by {} events", n);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Close the live session: graceful stop-page-then-disconnect, raced
    /// against a hard-kill timer.
    pub async fn close(&self) -> Result<()> {
        let mut slot = self.current.lock().await;
        let Some(session) = slot.take() else {
            return Ok(());
        };

        info!("Closing session to {}:{}", session.host, session.port);

        let graceful = async {
            let _ = session.page().stop_loading().await;
            session.guard.close().await
        };

        tokio::select! {
            result = graceful => {
                session.bus.emit_session(SessionSignal::Closed);
                result
            }
            _ = tokio::time::sleep(tokio::time::Duration::from_millis(CLOSE_GRACE_MS)) => {
                warn!("Graceful close timed out, hard-killing session");
                session.guard.invalidate();
                session.bus.emit_session(SessionSignal::Closed);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdp::mock::MockCdpConnection;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct MockConnector {
        connection: Arc<MockCdpConnection>,
        fail_first: AtomicU32,
        dials: AtomicU32,
    }

    impl MockConnector {
        fn new(connection: Arc<MockCdpConnection>) -> Self {
            Self {
                connection,
                fail_first: AtomicU32::new(0),
                dials: AtomicU32::new(0),
            }
        }

        fn failing_first(connection: Arc<MockCdpConnection>, count: u32) -> Self {
            let connector = Self::new(connection);
            connector.fail_first.store(count, Ordering::SeqCst);
            connector
        }
    }

    #[async_trait]
    impl Connector for MockConnector {
        async fn dial(&self, _target: &ConnectTarget) -> Result<Arc<dyn CdpConnection>> {
            let attempt = self.dials.fetch_add(1, Ordering::SeqCst);
            if attempt < self.fail_first.load(Ordering::SeqCst) {
                return Err(Error::connect("connection refused"));
            }
            Ok(self.connection.clone() as Arc<dyn CdpConnection>)
        }
    }

    #[tokio::test]
    async fn test_domains_enabled_in_fixed_order() {
        let conn = Arc::new(MockCdpConnection::new());
        let manager = SessionManager::new(
            BrowserConfig::default(),
            Arc::new(MockConnector::new(conn.clone())),
        );

        manager
            .connect(ConnectTarget::new("localhost", 9222), 0)
            .await
            .unwrap();

        let methods: Vec<String> = conn
            .recorded_calls()
            .into_iter()
            .map(|(method, _)| method)
            .collect();
        assert_eq!(
            methods,
            vec![
                "Network.enable",
                "Page.enable",
                "DOM.enable",
                "Security.enable",
                "Overlay.enable",
                "Target.setDiscoverTargets",
            ]
        );
    }

    #[tokio::test]
    async fn test_reduced_feature_variant_skips_overlay() {
        let conn = Arc::new(MockCdpConnection::new());
        let manager = SessionManager::new(
            BrowserConfig::default(),
            Arc::new(MockConnector::new(conn.clone())),
        );

        let mut target = ConnectTarget::new("localhost", 9222);
        target.reduced_feature_set = true;
        manager.connect(target, 0).await.unwrap();

        let methods: Vec<String> = conn
            .recorded_calls()
            .into_iter()
            .map(|(method, _)| method)
            .collect();
        assert!(!methods.contains(&"Overlay.enable".to_string()));
    }

    #[tokio::test]
    async fn test_created_signal_follows_domain_enabling() {
        let conn = Arc::new(MockCdpConnection::new());
        let manager = SessionManager::new(
            BrowserConfig::default(),
            Arc::new(MockConnector::new(conn.clone())),
        );

        let session = manager
            .connect(ConnectTarget::new("localhost", 9222), 0)
            .await
            .unwrap();

        // Domains were enabled before connect returned; a subscriber created
        // now still sees the session alive and armed
        assert!(session.is_alive());
        assert!(conn
            .recorded_calls()
            .iter()
            .any(|(m, _)| m == "Target.setDiscoverTargets"));
    }

    #[tokio::test]
    async fn test_dial_retries_with_bounded_attempts() {
        let conn = Arc::new(MockCdpConnection::new());
        let connector = Arc::new(MockConnector::failing_first(conn, 2));
        let manager = SessionManager::new(BrowserConfig::default(), connector.clone());

        let session = manager
            .connect(ConnectTarget::new("localhost", 9222), 3)
            .await;
        assert!(session.is_ok());
        assert_eq!(connector.dials.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_dial_exhaustion_is_connect_error() {
        let conn = Arc::new(MockCdpConnection::new());
        let connector = Arc::new(MockConnector::failing_first(conn, 10));
        let manager = SessionManager::new(BrowserConfig::default(), connector);

        let result = manager
            .connect(ConnectTarget::new("localhost", 9222), 1)
            .await;
        assert!(matches!(result, Err(Error::Connect(_))));
    }

    #[tokio::test]
    async fn test_reconnect_invalidates_previous_session() {
        let conn = Arc::new(MockCdpConnection::new());
        let manager = SessionManager::new(
            BrowserConfig::default(),
            Arc::new(MockConnector::new(conn)),
        );

        let first = manager
            .connect(ConnectTarget::new("localhost", 9222), 0)
            .await
            .unwrap();
        let second = manager
            .connect(ConnectTarget::new("localhost", 9222), 0)
            .await
            .unwrap();

        assert!(!first.is_alive());
        assert!(second.is_alive());
    }

    #[tokio::test]
    async fn test_pre_connection_hook_rewrites_target() {
        let conn = Arc::new(MockCdpConnection::new());
        let mut manager = SessionManager::new(
            BrowserConfig::default(),
            Arc::new(MockConnector::new(conn)),
        );

        manager.set_pre_connection_hook(Box::new(|mut target, config| {
            target.port = 9333;
            (target, config)
        }));

        let session = manager
            .connect(ConnectTarget::new("localhost", 9222), 0)
            .await
            .unwrap();
        assert_eq!(session.endpoint().1, 9333);
    }

    #[tokio::test]
    async fn test_close_without_session_is_noop() {
        let conn = Arc::new(MockCdpConnection::new());
        let manager = SessionManager::new(
            BrowserConfig::default(),
            Arc::new(MockConnector::new(conn)),
        );
        assert!(manager.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_close_stops_page_then_disconnects() {
        let conn = Arc::new(MockCdpConnection::new());
        let manager = SessionManager::new(
            BrowserConfig::default(),
            Arc::new(MockConnector::new(conn.clone())),
        );

        manager
            .connect(ConnectTarget::new("localhost", 9222), 0)
            .await
            .unwrap();
        manager.close().await.unwrap();

        assert!(!conn.calls_to("Page.stopLoading").is_empty());
        assert!(!conn.is_open());
        assert!(manager.session().await.is_none());
    }

    #[tokio::test]
    async fn test_attach_reconnects_on_target_navigation() {
        let conn = Arc::new(MockCdpConnection::new());
        let manager = Arc::new(SessionManager::new(
            BrowserConfig::default(),
            Arc::new(MockConnector::new(conn)),
        ));

        let first = manager
            .connect(ConnectTarget::new("localhost", 9222), 0)
            .await
            .unwrap();
        let watcher = manager
            .attach_on_target_navigation(&first, ConnectTarget::new("localhost", 9222));

        first.bus().emit_target(crate::session::events::TargetSignal::Navigated {
            target_id: "T1".to_string(),
            url: "https://example.com/".to_string(),
        });
        watcher.await.unwrap();

        // The old session was replaced by the attach
        assert!(!first.is_alive());
        let current = manager.session().await.unwrap();
        assert_ne!(current.id(), first.id());
    }

    #[tokio::test]
    async fn test_ignore_ssl_errors_enables_certificate_override() {
        let conn = Arc::new(MockCdpConnection::new());
        let config = BrowserConfig {
            ignore_ssl_errors: true,
            ..BrowserConfig::default()
        };
        let manager = SessionManager::new(config, Arc::new(MockConnector::new(conn.clone())));

        manager
            .connect(ConnectTarget::new("localhost", 9222), 0)
            .await
            .unwrap();

        let calls = conn.calls_to("Security.setIgnoreCertificateErrors");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0]["ignore"], true);
    }
}
