//! Raw HTTP response fabrication
//!
//! Intercepted requests answered from a mock are fulfilled with a complete
//! base64-encoded HTTP/1.1 response, built here. Header names are
//! lowercased, later duplicates win, the content type is forced onto the
//! header set, and the content length is computed from the actual body
//! bytes only when the caller did not supply one.

use crate::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use phf::phf_map;
use std::collections::BTreeMap;

/// Reason phrases for the statuses a mock is likely to fabricate. Unknown
/// codes get an empty phrase, which HTTP/1.1 permits.
static STATUS_TEXTS: phf::Map<u16, &'static str> = phf_map! {
    100u16 => "Continue",
    101u16 => "Switching Protocols",
    200u16 => "OK",
    201u16 => "Created",
    202u16 => "Accepted",
    204u16 => "No Content",
    206u16 => "Partial Content",
    301u16 => "Moved Permanently",
    302u16 => "Found",
    303u16 => "See Other",
    304u16 => "Not Modified",
    307u16 => "Temporary Redirect",
    308u16 => "Permanent Redirect",
    400u16 => "Bad Request",
    401u16 => "Unauthorized",
    403u16 => "Forbidden",
    404u16 => "Not Found",
    405u16 => "Method Not Allowed",
    408u16 => "Request Timeout",
    409u16 => "Conflict",
    410u16 => "Gone",
    418u16 => "I'm a Teapot",
    429u16 => "Too Many Requests",
    500u16 => "Internal Server Error",
    501u16 => "Not Implemented",
    502u16 => "Bad Gateway",
    503u16 => "Service Unavailable",
    504u16 => "Gateway Timeout",
};

/// Reason phrase for a status code.
pub fn status_text(code: u16) -> &'static str {
    STATUS_TEXTS.get(&code).copied().unwrap_or("")
}

/// A response to answer an intercepted request with.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    /// Extra headers; names are lowercased, later entries win
    pub headers: Vec<(String, String)>,
    /// String bodies are sent verbatim; any other JSON value is serialized
    pub body: serde_json::Value,
    /// Overrides the inferred content type
    pub content_type: Option<String>,
}

impl MockResponse {
    pub fn new(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body,
            content_type: None,
        }
    }

    pub fn with_header<N: Into<String>, V: Into<String>>(mut self, name: N, value: V) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Build the complete base64-encoded HTTP/1.1 response for a mock.
pub fn build_raw_response(mock: &MockResponse) -> Result<String> {
    let body = match &mock.body {
        serde_json::Value::String(text) => text.clone(),
        serde_json::Value::Null => String::new(),
        other => serde_json::to_string(other)?,
    };

    // Lowercase and merge; BTreeMap keeps the header order deterministic
    let mut headers: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in &mock.headers {
        headers.insert(name.to_ascii_lowercase(), value.clone());
    }

    let content_type = mock.content_type.clone().unwrap_or_else(|| {
        headers.get("content-type").cloned().unwrap_or_else(|| {
            match &mock.body {
                serde_json::Value::String(_) | serde_json::Value::Null => {
                    "text/html".to_string()
                }
                _ => "application/json".to_string(),
            }
        })
    });
    headers.insert("content-type".to_string(), content_type);
    headers
        .entry("content-length".to_string())
        .or_insert_with(|| body.len().to_string());

    let mut response = format!("HTTP/1.1 {} {}\r\n", mock.status, status_text(mock.status));
    for (name, value) in &headers {
        response.push_str(&format!("{}: {}\r\n", name, value));
    }
    response.push_str("\r\n");
    response.push_str(&body);

    Ok(STANDARD.encode(response))
}
