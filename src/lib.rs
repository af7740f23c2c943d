//! Tiller: browser automation core over the Chrome DevTools Protocol
//!
//! This library drives a remote browser process through CDP: session
//! management with crash detection, target matching, navigation
//! correlation, request interception, and element actionability.

pub mod error;
pub mod config;

pub mod cdp;
pub mod element;
pub mod navigation;
pub mod network;
pub mod proximity;
pub mod session;
pub mod target;

// Re-exports
pub use config::{BrowserConfig, LoadEvent};
pub use error::{ActionabilityFailure, Error, Result};
pub use session::{ConnectTarget, Session, SessionManager};

/// Tiller library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
