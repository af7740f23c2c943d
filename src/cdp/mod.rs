//! CDP (Chrome DevTools Protocol) layer
//!
//! Wire types, the transport trait and its WebSocket implementation, typed
//! per-domain command surfaces, and a scriptable mock for tests.

pub mod connection;
pub mod domains;
pub mod mock;
pub mod traits;
pub mod types;

pub use connection::CdpWebSocketConnection;
pub use traits::{CdpConnection, CdpError, CdpEvent, CdpResponse};
