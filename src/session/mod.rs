//! Session layer
//!
//! The session guard wrapping the transport, the typed event bus, and the
//! manager that establishes and tears down sessions.

pub mod events;
pub mod guard;
pub mod manager;

pub use events::{EventBus, NetworkSignal, SessionSignal, TargetSignal};
pub use guard::SessionGuard;
pub use manager::{ConnectTarget, Connector, HttpDiscoveryConnector, Session, SessionManager};
