//! Unified error types for Tiller

use thiserror::Error;

/// Unified Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Why an element could not be acted on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionabilityFailure {
    /// The candidate cap was reached before a passing element was seen.
    TooManyMatches { cap: usize },
    /// A named predicate rejected every examined candidate.
    FailingCheck { check: &'static str },
}

impl std::fmt::Display for ActionabilityFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionabilityFailure::TooManyMatches { cap } => write!(
                f,
                "{} elements matched, please provide a more specific selector",
                cap
            ),
            ActionabilityFailure::FailingCheck { check } => write!(f, "element is {}", check),
        }
    }
}

/// Unified error type for Tiller
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport closed or browser crashed; fatal for the current session
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Initial dial failure after bounded retries
    #[error("Failed to connect: {0}")]
    Connect(String),

    /// CDP protocol errors
    #[error("CDP error: {0}")]
    Cdp(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Navigation failed with a browser-reported reason or non-2xx status
    #[error("Navigation to {url} failed{}: {reason}", status.map(|s| format!(" with status {}", s)).unwrap_or_default())]
    NavigationFailed {
        url: String,
        status: Option<u16>,
        reason: String,
    },

    /// Element not found
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// Element found but not safe to interact with
    #[error("Element matching \"{selector}\" is not actionable: {reason}")]
    ElementNotActionable {
        selector: String,
        reason: ActionabilityFailure,
    },

    /// Node has no box model (not rendered, or not an element)
    #[error("Node is not visible or is not an element: {0}")]
    NotVisibleOrNotElement(String),

    /// Interception acted on a request it has no rule for
    #[error("Interception misconfigured: {0}")]
    InterceptionMisconfigured(String),

    /// A dialog opened with no registered handler; fatal, the page can deadlock
    #[error("Unhandled {kind} dialog: \"{message}\" (register a dialog handler before it opens)")]
    UnhandledDialog { kind: String, message: String },

    /// Target not found
    #[error("Target not found: {0}")]
    TargetNotFound(String),

    /// Timeout
    #[error("Operation timeout: {0}")]
    Timeout(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new connection-lost error
    pub fn connection_lost<S: Into<String>>(msg: S) -> Self {
        Error::ConnectionLost(msg.into())
    }

    /// Create a new connect error
    pub fn connect<S: Into<String>>(msg: S) -> Self {
        Error::Connect(msg.into())
    }

    /// Create a new CDP error
    pub fn cdp<S: Into<String>>(msg: S) -> Self {
        Error::Cdp(msg.into())
    }

    /// Create a new navigation failure
    pub fn navigation_failed<S: Into<String>, R: Into<String>>(
        url: S,
        status: Option<u16>,
        reason: R,
    ) -> Self {
        Error::NavigationFailed {
            url: url.into(),
            status,
            reason: reason.into(),
        }
    }

    /// Create a new element not found error
    pub fn element_not_found<S: Into<String>>(selector: S) -> Self {
        Error::ElementNotFound(selector.into())
    }

    /// Create a new not-visible error
    pub fn not_visible<S: Into<String>>(desc: S) -> Self {
        Error::NotVisibleOrNotElement(desc.into())
    }

    /// Create a new target not found error
    pub fn target_not_found<S: Into<String>>(msg: S) -> Self {
        Error::TargetNotFound(msg.into())
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        Error::Timeout(msg.into())
    }

    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Error::Configuration(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Error::Internal(msg.into())
    }

    /// True when the error means the current session is unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ConnectionLost(_) | Error::UnhandledDialog { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation_failed_message_carries_status() {
        let err = Error::navigation_failed("https://example.com", Some(404), "Not Found");
        let msg = err.to_string();
        assert!(msg.contains("404"));
        assert!(msg.contains("https://example.com"));
    }

    #[test]
    fn test_too_many_matches_message() {
        let err = Error::ElementNotActionable {
            selector: "button".to_string(),
            reason: ActionabilityFailure::TooManyMatches { cap: 2 },
        };
        assert!(err.to_string().contains("more specific selector"));
    }

    #[test]
    fn test_failing_check_message_names_predicate() {
        let err = Error::ElementNotActionable {
            selector: "button".to_string(),
            reason: ActionabilityFailure::FailingCheck { check: "disabled" },
        };
        assert!(err.to_string().contains("element is disabled"));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(Error::connection_lost("socket closed").is_fatal());
        assert!(!Error::timeout("slow").is_fatal());
    }
}
