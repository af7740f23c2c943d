//! Target registry
//!
//! Enumerates browser targets, partitions them against a caller-supplied
//! matcher, tracks user-assigned window names, and watches freshly created
//! targets until they obtain a real URL.

use crate::cdp::domains::TargetDomain;
use crate::cdp::types::TargetDescription;
use crate::session::events::{EventBus, TargetSignal};
use crate::{Error, Result};
use regex::Regex;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// How often a new target is re-polled while its URL is still empty
const URL_POLL_INTERVAL_MS: u64 = 100;

/// How long to keep polling before giving up on the target
const URL_POLL_TIMEOUT_MS: u64 = 5000;

/// Criterion for selecting targets.
#[derive(Debug, Clone)]
pub enum TargetMatcher {
    /// Exact title, or URL equality after normalization
    Literal(String),
    /// Regex over both URL and title
    Pattern(Regex),
}

impl TargetMatcher {
    pub fn matches(&self, target: &TargetDescription) -> bool {
        match self {
            TargetMatcher::Literal(wanted) => {
                target.title == *wanted || normalize_url(&target.url) == normalize_url(wanted)
            }
            TargetMatcher::Pattern(re) => re.is_match(&target.url) || re.is_match(&target.title),
        }
    }
}

/// Normalize a URL for literal comparison: drop the scheme, a leading
/// `www.`, and any trailing slash; hosts compare case-insensitively.
pub(crate) fn normalize_url(raw: &str) -> String {
    let parsed = url::Url::parse(raw)
        .or_else(|_| url::Url::parse(&format!("http://{}", raw)))
        .ok();

    let Some(parsed) = parsed else {
        return raw.trim_end_matches('/').to_ascii_lowercase();
    };

    let host = parsed
        .host_str()
        .unwrap_or_default()
        .to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    let path = parsed.path().trim_end_matches('/');

    match parsed.query() {
        Some(query) => format!("{}{}?{}", host, path, query),
        None => format!("{}{}", host, path),
    }
}

/// Page targets split by whether they satisfied the matcher.
#[derive(Debug, Clone, Default)]
pub struct TargetPartition {
    pub matching: Vec<TargetDescription>,
    pub others: Vec<TargetDescription>,
}

/// Target registry
pub struct TargetRegistry {
    domain: TargetDomain,
    /// User-assigned window names, resolved to target ids
    names: Mutex<HashMap<String, String>>,
}

impl TargetRegistry {
    pub fn new(domain: TargetDomain) -> Self {
        Self {
            domain,
            names: Mutex::new(HashMap::new()),
        }
    }

    /// Enumerate page targets and partition them against `matcher`.
    ///
    /// With no matcher the newest page target is selected; the browser lists
    /// targets oldest-first, so the newest is the last one.
    pub async fn list_targets(&self, matcher: Option<&TargetMatcher>) -> Result<TargetPartition> {
        let pages: Vec<TargetDescription> = self
            .domain
            .get_targets()
            .await?
            .into_iter()
            .filter(|t| t.is_page())
            .collect();

        let mut partition = TargetPartition::default();
        match matcher {
            Some(matcher) => {
                for target in pages {
                    if matcher.matches(&target) {
                        partition.matching.push(target);
                    } else {
                        partition.others.push(target);
                    }
                }
            }
            None => {
                let mut pages = pages;
                if let Some(newest) = pages.pop() {
                    partition.matching.push(newest);
                }
                partition.others = pages;
            }
        }
        Ok(partition)
    }

    /// Activate the single target selected by `matcher`.
    pub async fn switch_to(&self, matcher: Option<&TargetMatcher>) -> Result<TargetDescription> {
        let partition = self.list_targets(matcher).await?;
        let target = partition.matching.into_iter().next().ok_or_else(|| {
            Error::target_not_found("No target matched the given title or URL")
        })?;
        self.domain.activate_target(&target.target_id).await?;
        Ok(target)
    }

    /// Bind a window name to a target id.
    ///
    /// Names are unique; rebinding an in-use name is a configuration error.
    pub fn register_name(&self, name: &str, target_id: &str) -> Result<()> {
        let mut names = self
            .names
            .lock()
            .map_err(|_| Error::internal("Target name table poisoned"))?;
        if names.contains_key(name) {
            return Err(Error::configuration(format!(
                "Window name \"{}\" is already in use",
                name
            )));
        }
        names.insert(name.to_string(), target_id.to_string());
        Ok(())
    }

    /// Release a window name; unknown names are ignored.
    pub fn unregister_name(&self, name: &str) {
        if let Ok(mut names) = self.names.lock() {
            names.remove(name);
        }
    }

    /// Resolve a window name to its target id.
    pub fn resolve_name(&self, name: &str) -> Result<String> {
        let names = self
            .names
            .lock()
            .map_err(|_| Error::internal("Target name table poisoned"))?;
        names
            .get(name)
            .cloned()
            .ok_or_else(|| Error::target_not_found(format!("No window named \"{}\"", name)))
    }

    /// Close a target and release any name bound to it.
    pub async fn close_target(&self, target_id: &str) -> Result<()> {
        self.domain.close_target(target_id).await?;
        if let Ok(mut names) = self.names.lock() {
            names.retain(|_, id| id != target_id);
        }
        Ok(())
    }
}

/// Watch newly created page targets until they obtain a real URL, then
/// announce them as navigated.
///
/// Targets are created with an empty URL; the first meaningful URL only
/// shows up in later target info. Polling is bounded so a target that never
/// loads cannot leak the task.
pub fn spawn_target_watcher(domain: TargetDomain, bus: EventBus) -> tokio::task::JoinHandle<()> {
    let mut targets = bus.subscribe_targets();
    tokio::spawn(async move {
        loop {
            match targets.recv().await {
                Ok(TargetSignal::Created(info)) if info.is_page() => {
                    let domain = domain.clone();
                    let bus = bus.clone();
                    tokio::spawn(async move {
                        await_target_url(domain, bus, info).await;
                    });
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Target watcher lagged by {} events", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

async fn await_target_url(domain: TargetDomain, bus: EventBus, info: TargetDescription) {
    if !info.url.is_empty() {
        bus.emit_target(TargetSignal::Navigated {
            target_id: info.target_id,
            url: info.url,
        });
        return;
    }

    let deadline = tokio::time::Instant::now()
        + tokio::time::Duration::from_millis(URL_POLL_TIMEOUT_MS);
    while tokio::time::Instant::now() < deadline {
        match domain.get_target_info(&info.target_id).await {
            Ok(current) if !current.url.is_empty() => {
                bus.emit_target(TargetSignal::Navigated {
                    target_id: current.target_id,
                    url: current.url,
                });
                return;
            }
            Ok(_) => {}
            Err(e) => {
                // The target may already be gone; nothing to announce
                debug!("Target {} poll failed: {}", info.target_id, e);
                return;
            }
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(URL_POLL_INTERVAL_MS)).await;
    }
    warn!("Target {} never obtained a URL", info.target_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdp::mock::MockCdpConnection;
    use crate::session::SessionGuard;
    use std::sync::Arc;

    fn page(id: &str, url: &str, title: &str) -> serde_json::Value {
        serde_json::json!({
            "targetId": id, "type": "page", "url": url, "title": title, "attached": false
        })
    }

    fn registry_over(targets: serde_json::Value) -> (Arc<MockCdpConnection>, TargetRegistry) {
        let conn = Arc::new(MockCdpConnection::new());
        let targets_clone = targets.clone();
        conn.respond_with(move |method, _| {
            if method == "Target.getTargets" {
                Ok(serde_json::json!({ "targetInfos": targets_clone }))
            } else {
                Ok(serde_json::json!({}))
            }
        });
        let guard = SessionGuard::new(conn.clone());
        (conn, TargetRegistry::new(TargetDomain::new(guard)))
    }

    #[test]
    fn test_literal_matcher_normalizes_urls() {
        let matcher = TargetMatcher::Literal("flipkart.com".to_string());
        let target: TargetDescription = serde_json::from_value(page(
            "T1",
            "https://www.flipkart.com/",
            "Online Shopping Site",
        ))
        .unwrap();
        assert!(matcher.matches(&target));

        let other: TargetDescription =
            serde_json::from_value(page("T2", "https://www.amazon.com/", "Amazon")).unwrap();
        assert!(!matcher.matches(&other));
    }

    #[test]
    fn test_literal_matcher_exact_title() {
        let matcher = TargetMatcher::Literal("Online Shopping Site".to_string());
        let target: TargetDescription = serde_json::from_value(page(
            "T1",
            "https://www.flipkart.com/",
            "Online Shopping Site",
        ))
        .unwrap();
        assert!(matcher.matches(&target));
    }

    #[test]
    fn test_pattern_matcher_covers_url_and_title() {
        let matcher = TargetMatcher::Pattern(Regex::new(r"flipkart").unwrap());
        let by_url: TargetDescription = serde_json::from_value(page(
            "T1",
            "https://www.flipkart.com/account",
            "My Account",
        ))
        .unwrap();
        assert!(matcher.matches(&by_url));
    }

    #[test]
    fn test_normalization_rules() {
        assert_eq!(normalize_url("https://www.flipkart.com/"), "flipkart.com");
        assert_eq!(normalize_url("flipkart.com"), "flipkart.com");
        assert_eq!(
            normalize_url("HTTP://WWW.Flipkart.COM/deals/"),
            "flipkart.com/deals"
        );
    }

    #[tokio::test]
    async fn test_partition_splits_matching_and_others() {
        let (_conn, registry) = registry_over(serde_json::json!([
            page("T1", "https://www.flipkart.com/", "Flipkart"),
            page("T2", "https://example.com/", "Example"),
        ]));

        let matcher = TargetMatcher::Literal("flipkart.com".to_string());
        let partition = registry.list_targets(Some(&matcher)).await.unwrap();
        assert_eq!(partition.matching.len(), 1);
        assert_eq!(partition.matching[0].target_id, "T1");
        assert_eq!(partition.others.len(), 1);
        assert_eq!(partition.others[0].target_id, "T2");
    }

    #[tokio::test]
    async fn test_no_matcher_selects_newest_page() {
        let (_conn, registry) = registry_over(serde_json::json!([
            page("T1", "https://old.test/", "Old"),
            page("T2", "https://new.test/", "New"),
        ]));

        let partition = registry.list_targets(None).await.unwrap();
        assert_eq!(partition.matching.len(), 1);
        assert_eq!(partition.matching[0].target_id, "T2");
        assert_eq!(partition.others[0].target_id, "T1");
    }

    #[tokio::test]
    async fn test_non_page_targets_are_excluded() {
        let (_conn, registry) = registry_over(serde_json::json!([
            page("T1", "https://a.test/", "A"),
            {
                "targetId": "W1", "type": "service_worker",
                "url": "https://a.test/sw.js", "title": "", "attached": false
            },
        ]));

        let partition = registry.list_targets(None).await.unwrap();
        assert_eq!(partition.matching.len(), 1);
        assert!(partition.others.is_empty());
    }

    #[tokio::test]
    async fn test_switch_to_activates_matching_target() {
        let (conn, registry) = registry_over(serde_json::json!([
            page("T1", "https://www.flipkart.com/", "Flipkart"),
        ]));

        let matcher = TargetMatcher::Literal("flipkart.com".to_string());
        registry.switch_to(Some(&matcher)).await.unwrap();

        let calls = conn.calls_to("Target.activateTarget");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0]["targetId"], "T1");
    }

    #[tokio::test]
    async fn test_duplicate_window_name_rejected() {
        let (_conn, registry) = registry_over(serde_json::json!([]));
        registry.register_name("checkout", "T1").unwrap();
        let result = registry.register_name("checkout", "T2");
        assert!(matches!(result, Err(Error::Configuration(_))));

        registry.unregister_name("checkout");
        assert!(registry.register_name("checkout", "T2").is_ok());
        assert_eq!(registry.resolve_name("checkout").unwrap(), "T2");
    }

    #[tokio::test]
    async fn test_watcher_announces_url_after_polling() {
        let conn = Arc::new(MockCdpConnection::new());
        let polled = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let polled_clone = polled.clone();
        conn.respond_with(move |method, _| {
            if method == "Target.getTargetInfo" {
                let n = polled_clone.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                let url = if n == 0 { "" } else { "https://example.com/" };
                Ok(serde_json::json!({
                    "targetInfo": {
                        "targetId": "T9", "type": "page", "url": url,
                        "title": "", "attached": false
                    }
                }))
            } else {
                Ok(serde_json::json!({}))
            }
        });

        let guard = SessionGuard::new(conn);
        let bus = EventBus::new();
        let mut targets = bus.subscribe_targets();
        spawn_target_watcher(TargetDomain::new(guard), bus.clone());

        bus.emit_target(TargetSignal::Created(
            serde_json::from_value(page("T9", "", "")).unwrap(),
        ));

        // Skip the Created echo, then expect the navigation announcement
        loop {
            match targets.recv().await.unwrap() {
                TargetSignal::Navigated { target_id, url } => {
                    assert_eq!(target_id, "T9");
                    assert_eq!(url, "https://example.com/");
                    break;
                }
                TargetSignal::Created(_) => continue,
            }
        }
        assert!(polled.load(std::sync::atomic::Ordering::SeqCst) >= 2);
    }
}
