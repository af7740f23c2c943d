//! Element handles and the in-browser probe
//!
//! An element handle is a remote-object reference plus a description for
//! error messages. The probe trait is the seam between the actionability
//! engine and the browser; the production probe measures via injected
//! scripts, tests substitute a table of canned snapshots.

use crate::cdp::domains::{DomDomain, RuntimeDomain};
use crate::element::geometry::{BoundingBox, VisibilitySnapshot};
use crate::{Error, Result};
use async_trait::async_trait;

/// Measures offsets and client rects, substituting the parent element for
/// text nodes before measuring.
const VISIBILITY_SCRIPT: &str = r#"function() {
    let node = this;
    if (node.nodeType === Node.TEXT_NODE) {
        node = node.parentElement;
    }
    if (!node) {
        return { offsetHeight: 0, offsetWidth: 0, clientRectCount: 0 };
    }
    return {
        offsetHeight: node.offsetHeight || 0,
        offsetWidth: node.offsetWidth || 0,
        clientRectCount: node.getClientRects().length,
    };
}"#;

const DISABLED_SCRIPT: &str = r#"function() {
    let node = this;
    if (node.nodeType === Node.TEXT_NODE) {
        node = node.parentElement;
    }
    return !!(node && node.disabled);
}"#;

/// Reference to a remote DOM node.
#[derive(Debug, Clone)]
pub struct ElementHandle {
    /// Remote object id; invalidated by navigation
    pub object_id: String,
    /// Human-readable description used in error messages
    pub description: String,
}

impl ElementHandle {
    pub fn new<O: Into<String>, D: Into<String>>(object_id: O, description: D) -> Self {
        Self {
            object_id: object_id.into(),
            description: description.into(),
        }
    }
}

/// Browser-side measurements the actionability engine needs.
#[async_trait]
pub trait ElementProbe: Send + Sync {
    /// Resolve a selector to candidate handles, in DOM order, capped at
    /// `limit`.
    async fn find(&self, selector: &str, limit: usize) -> Result<Vec<ElementHandle>>;

    /// Measure the node for the visibility decision.
    async fn visibility(&self, element: &ElementHandle) -> Result<VisibilitySnapshot>;

    /// Whether the node (or its parent element, for text nodes) is disabled.
    async fn is_disabled(&self, element: &ElementHandle) -> Result<bool>;

    /// Border-box rectangle; `None` when the node has no box model.
    async fn bounding_box(&self, element: &ElementHandle) -> Result<Option<BoundingBox>>;
}

/// Production probe, backed by the Runtime and DOM domains.
#[derive(Debug, Clone)]
pub struct RuntimeProbe {
    runtime: RuntimeDomain,
    dom: DomDomain,
}

impl RuntimeProbe {
    pub fn new(runtime: RuntimeDomain, dom: DomDomain) -> Self {
        Self { runtime, dom }
    }
}

#[async_trait]
impl ElementProbe for RuntimeProbe {
    async fn find(&self, selector: &str, limit: usize) -> Result<Vec<ElementHandle>> {
        let object_ids = self.runtime.query_object_ids(selector, limit).await?;
        Ok(object_ids
            .into_iter()
            .map(|object_id| ElementHandle::new(object_id, selector))
            .collect())
    }

    async fn visibility(&self, element: &ElementHandle) -> Result<VisibilitySnapshot> {
        let value = self
            .runtime
            .call_function_on(&element.object_id, VISIBILITY_SCRIPT)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn is_disabled(&self, element: &ElementHandle) -> Result<bool> {
        let value = self
            .runtime
            .call_function_on(&element.object_id, DISABLED_SCRIPT)
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn bounding_box(&self, element: &ElementHandle) -> Result<Option<BoundingBox>> {
        let model = self.dom.get_box_model(&element.object_id).await?;
        Ok(model.and_then(|m| BoundingBox::from_quad(&m.border)))
    }
}

/// Click center of an element.
///
/// The only place a missing box model becomes a caller-facing error.
pub async fn center_of(probe: &dyn ElementProbe, element: &ElementHandle) -> Result<(f64, f64)> {
    match probe.bounding_box(element).await? {
        Some(rect) => Ok(rect.center()),
        None => Err(Error::not_visible(element.description.clone())),
    }
}
