//! Network layer
//!
//! Request interception rules and the raw response fabrication that
//! fulfills mocked requests.

pub mod intercept;
pub mod response;

pub use intercept::{
    spawn_interceptor, InterceptAction, InterceptDecision, InterceptHandler, InterceptionEngine,
};
pub use response::{build_raw_response, status_text, MockResponse};
