//! Configuration management for Tiller

use crate::{Error, Result};
use serde::Deserialize;
use std::env;

/// Page lifecycle signals the navigation coordinator can additionally await.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LoadEvent {
    /// `Page.loadEventFired`
    LoadEventFired,
    /// `DOMContentLoaded` lifecycle event
    DomContentLoaded,
    /// `networkIdle` lifecycle event
    NetworkIdle,
    /// `firstMeaningfulPaint` lifecycle event
    FirstMeaningfulPaint,
}

impl LoadEvent {
    /// Lifecycle event name as reported by `Page.lifecycleEvent`.
    pub fn lifecycle_name(&self) -> &'static str {
        match self {
            LoadEvent::LoadEventFired => "load",
            LoadEvent::DomContentLoaded => "DOMContentLoaded",
            LoadEvent::NetworkIdle => "networkIdle",
            LoadEvent::FirstMeaningfulPaint => "firstMeaningfulPaint",
        }
    }
}

/// Recognized caller options.
///
/// Each field affects exactly one component: the timeouts drive the
/// navigation coordinator and the actionability engine,
/// `no_of_element_to_match` caps the candidates the actionability engine
/// examines, `ignore_ssl_errors` is applied when the security domain is
/// enabled.
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    /// Total navigation deadline in milliseconds
    pub navigation_timeout_ms: u64,

    /// Poll interval for element lookup retries in milliseconds
    pub retry_interval_ms: u64,

    /// Total element lookup deadline in milliseconds
    pub retry_timeout_ms: u64,

    /// Whether actions that trigger navigation wait for it to settle
    pub wait_for_navigation: bool,

    /// Lifecycle signals awaited after a navigation response settles
    pub wait_for_events: Vec<LoadEvent>,

    /// Maximum candidates the actionability engine examines per poll
    pub no_of_element_to_match: usize,

    /// Whether the browser runs headless
    pub headless: bool,

    /// Ignore certificate errors on the target browser
    pub ignore_ssl_errors: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: 30000,
            retry_interval_ms: 100,
            retry_timeout_ms: 10000,
            wait_for_navigation: true,
            wait_for_events: vec![LoadEvent::LoadEventFired],
            no_of_element_to_match: 10,
            headless: true,
            ignore_ssl_errors: false,
        }
    }
}

impl BrowserConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = BrowserConfig::default();

        if let Ok(timeout) = env::var("TILLER_NAVIGATION_TIMEOUT") {
            config.navigation_timeout_ms = timeout
                .parse()
                .map_err(|_| Error::configuration("Invalid TILLER_NAVIGATION_TIMEOUT"))?;
        }

        if let Ok(interval) = env::var("TILLER_RETRY_INTERVAL") {
            config.retry_interval_ms = interval
                .parse()
                .map_err(|_| Error::configuration("Invalid TILLER_RETRY_INTERVAL"))?;
        }

        if let Ok(timeout) = env::var("TILLER_RETRY_TIMEOUT") {
            config.retry_timeout_ms = timeout
                .parse()
                .map_err(|_| Error::configuration("Invalid TILLER_RETRY_TIMEOUT"))?;
        }

        if let Ok(wait) = env::var("TILLER_WAIT_FOR_NAVIGATION") {
            config.wait_for_navigation = wait
                .parse()
                .map_err(|_| Error::configuration("Invalid TILLER_WAIT_FOR_NAVIGATION"))?;
        }

        if let Ok(cap) = env::var("TILLER_ELEMENT_MATCH_CAP") {
            config.no_of_element_to_match = cap
                .parse()
                .map_err(|_| Error::configuration("Invalid TILLER_ELEMENT_MATCH_CAP"))?;
        }

        if let Ok(headless) = env::var("TILLER_HEADLESS") {
            config.headless = headless
                .parse()
                .map_err(|_| Error::configuration("Invalid TILLER_HEADLESS"))?;
        }

        if let Ok(ignore) = env::var("TILLER_IGNORE_SSL_ERRORS") {
            config.ignore_ssl_errors = ignore
                .parse()
                .map_err(|_| Error::configuration("Invalid TILLER_IGNORE_SSL_ERRORS"))?;
        }

        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::configuration(format!("Failed to read config file: {}", e)))?;

        let config: BrowserConfig = toml::from_str(&content)
            .map_err(|e| Error::configuration(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BrowserConfig::default();
        assert_eq!(config.navigation_timeout_ms, 30000);
        assert_eq!(config.no_of_element_to_match, 10);
        assert!(config.wait_for_navigation);
        assert_eq!(config.wait_for_events, vec![LoadEvent::LoadEventFired]);
    }

    #[test]
    fn test_lifecycle_names() {
        assert_eq!(LoadEvent::NetworkIdle.lifecycle_name(), "networkIdle");
        assert_eq!(
            LoadEvent::DomContentLoaded.lifecycle_name(),
            "DOMContentLoaded"
        );
    }

    #[test]
    fn test_from_file_parses_toml() {
        let dir = std::env::temp_dir().join("tiller-config-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(
            &path,
            r#"
navigation_timeout_ms = 5000
retry_interval_ms = 50
retry_timeout_ms = 2000
wait_for_navigation = false
wait_for_events = ["networkIdle"]
no_of_element_to_match = 3
headless = false
ignore_ssl_errors = true
"#,
        )
        .unwrap();

        let config = BrowserConfig::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.navigation_timeout_ms, 5000);
        assert_eq!(config.no_of_element_to_match, 3);
        assert!(config.ignore_ssl_errors);
        assert_eq!(config.wait_for_events, vec![LoadEvent::NetworkIdle]);
    }
}
