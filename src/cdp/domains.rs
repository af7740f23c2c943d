//! Typed per-domain command surfaces
//!
//! Each DevTools domain the core uses gets a closed, typed interface listing
//! only the methods the action layer needs. The generic wire dispatcher
//! lives in [`SessionGuard::call`](crate::session::SessionGuard::call);
//! these wrappers own the request/response shapes.

use super::types::{BoxModel, GetBoxModelResult, NavigateResult, TargetDescription};
use crate::session::SessionGuard;
use crate::Result;
use serde_json::json;

/// `Page` domain
#[derive(Debug, Clone)]
pub struct PageDomain {
    guard: SessionGuard,
}

impl PageDomain {
    pub fn new(guard: SessionGuard) -> Self {
        Self { guard }
    }

    pub async fn enable(&self) -> Result<()> {
        self.guard.call("Page.enable", json!({})).await?;
        Ok(())
    }

    /// Issue the navigate command. The coordinator correlates the result
    /// with network events; this only reports command-level failure.
    pub async fn navigate(&self, url: &str) -> Result<NavigateResult> {
        self.guard
            .call_into("Page.navigate", json!({ "url": url }))
            .await
    }

    pub async fn stop_loading(&self) -> Result<()> {
        self.guard.call("Page.stopLoading", json!({})).await?;
        Ok(())
    }

    pub async fn handle_javascript_dialog(
        &self,
        accept: bool,
        prompt_text: Option<&str>,
    ) -> Result<()> {
        let mut params = json!({ "accept": accept });
        if let Some(text) = prompt_text {
            params["promptText"] = json!(text);
        }
        self.guard
            .call("Page.handleJavaScriptDialog", params)
            .await?;
        Ok(())
    }

    pub async fn bring_to_front(&self) -> Result<()> {
        self.guard.call("Page.bringToFront", json!({})).await?;
        Ok(())
    }
}

/// `Network` domain
#[derive(Debug, Clone)]
pub struct NetworkDomain {
    guard: SessionGuard,
}

impl NetworkDomain {
    pub fn new(guard: SessionGuard) -> Self {
        Self { guard }
    }

    pub async fn enable(&self) -> Result<()> {
        self.guard.call("Network.enable", json!({})).await?;
        Ok(())
    }

    /// Switch request interception on or off. A wildcard pattern pauses all
    /// outbound requests while interception rules are registered.
    pub async fn set_request_interception(&self, enabled: bool) -> Result<()> {
        let patterns = if enabled {
            json!([{ "urlPattern": "*", "interceptionStage": "Request" }])
        } else {
            json!([])
        };
        self.guard
            .call("Network.setRequestInterception", json!({ "patterns": patterns }))
            .await?;
        Ok(())
    }

    /// Resume a paused request, optionally overriding its disposition.
    pub async fn continue_intercepted_request(
        &self,
        interception_id: &str,
        overrides: serde_json::Value,
    ) -> Result<()> {
        let mut params = json!({ "interceptionId": interception_id });
        if let serde_json::Value::Object(map) = overrides {
            for (key, value) in map {
                params[key] = value;
            }
        }
        self.guard
            .call("Network.continueInterceptedRequest", params)
            .await?;
        Ok(())
    }
}

/// `DOM` domain
#[derive(Debug, Clone)]
pub struct DomDomain {
    guard: SessionGuard,
}

impl DomDomain {
    pub fn new(guard: SessionGuard) -> Self {
        Self { guard }
    }

    pub async fn enable(&self) -> Result<()> {
        self.guard.call("DOM.enable", json!({})).await?;
        Ok(())
    }

    /// Box model quad for a remote object, `None` when the browser reports
    /// no box model (node not rendered, or not an element).
    pub async fn get_box_model(&self, object_id: &str) -> Result<Option<BoxModel>> {
        let result = self
            .guard
            .call("DOM.getBoxModel", json!({ "objectId": object_id }))
            .await;

        match result {
            Ok(value) => {
                let parsed: GetBoxModelResult = serde_json::from_value(value)?;
                Ok(Some(parsed.model))
            }
            // "Could not compute box model" is a data answer, not a failure
            Err(crate::Error::Cdp(msg)) if msg.contains("box model") => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// `Runtime` domain
#[derive(Debug, Clone)]
pub struct RuntimeDomain {
    guard: SessionGuard,
}

impl RuntimeDomain {
    pub fn new(guard: SessionGuard) -> Self {
        Self { guard }
    }

    /// Evaluate an expression, returning the raw remote-object result value.
    pub async fn evaluate(&self, expression: &str) -> Result<serde_json::Value> {
        let result = self
            .guard
            .call(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;

        if let Some(exception) = result.get("exceptionDetails") {
            let description = exception
                .get("exception")
                .and_then(|e| e.get("description"))
                .and_then(|d| d.as_str())
                .unwrap_or("Unknown script error");
            return Err(crate::Error::cdp(format!(
                "Script evaluation failed: {}",
                description
            )));
        }

        Ok(result
            .get("result")
            .and_then(|r| r.get("value"))
            .cloned()
            .unwrap_or(serde_json::Value::Null))
    }

    /// Call a function with a remote object as `this`.
    pub async fn call_function_on(
        &self,
        object_id: &str,
        function_declaration: &str,
    ) -> Result<serde_json::Value> {
        let result = self
            .guard
            .call(
                "Runtime.callFunctionOn",
                json!({
                    "objectId": object_id,
                    "functionDeclaration": function_declaration,
                    "returnByValue": true,
                }),
            )
            .await?;

        if let Some(exception) = result.get("exceptionDetails") {
            let description = exception
                .get("exception")
                .and_then(|e| e.get("description"))
                .and_then(|d| d.as_str())
                .unwrap_or("Unknown script error");
            return Err(crate::Error::cdp(format!(
                "Function call failed: {}",
                description
            )));
        }

        Ok(result
            .get("result")
            .and_then(|r| r.get("value"))
            .cloned()
            .unwrap_or(serde_json::Value::Null))
    }

    /// Query the page for elements matching a selector; returns remote
    /// object ids in DOM order.
    pub async fn query_object_ids(&self, selector: &str, limit: usize) -> Result<Vec<String>> {
        let expression = format!(
            "Math.min(document.querySelectorAll({}).length, {})",
            serde_json::to_string(selector)?,
            limit,
        );
        let count = self.evaluate(&expression).await?.as_u64().unwrap_or(0) as usize;

        // Each element is resolved individually so we get one objectId per node
        let mut object_ids = Vec::with_capacity(count);
        for index in 0..count {
            let result = self
                .guard
                .call(
                    "Runtime.evaluate",
                    json!({
                        "expression": format!(
                            "document.querySelectorAll({})[{}]",
                            serde_json::to_string(selector)?,
                            index
                        ),
                        "returnByValue": false,
                    }),
                )
                .await?;
            if let Some(object_id) = result
                .get("result")
                .and_then(|r| r.get("objectId"))
                .and_then(|v| v.as_str())
            {
                object_ids.push(object_id.to_string());
            }
        }

        Ok(object_ids)
    }
}

/// `Input` domain
#[derive(Debug, Clone)]
pub struct InputDomain {
    guard: SessionGuard,
}

impl InputDomain {
    pub fn new(guard: SessionGuard) -> Self {
        Self { guard }
    }

    /// Dispatch a full click (press + release) at pixel coordinates.
    pub async fn click(&self, x: f64, y: f64) -> Result<()> {
        for event_type in ["mousePressed", "mouseReleased"] {
            self.guard
                .call(
                    "Input.dispatchMouseEvent",
                    json!({
                        "type": event_type,
                        "x": x,
                        "y": y,
                        "button": "left",
                        "clickCount": 1,
                    }),
                )
                .await?;
        }
        Ok(())
    }

    /// Type a single character
    pub async fn insert_text(&self, text: &str) -> Result<()> {
        self.guard
            .call("Input.insertText", json!({ "text": text }))
            .await?;
        Ok(())
    }
}

/// `Target` domain
#[derive(Debug, Clone)]
pub struct TargetDomain {
    guard: SessionGuard,
}

impl TargetDomain {
    pub fn new(guard: SessionGuard) -> Self {
        Self { guard }
    }

    /// Arm `Target.targetCreated` / `targetDestroyed` events
    pub async fn set_discover_targets(&self, discover: bool) -> Result<()> {
        self.guard
            .call("Target.setDiscoverTargets", json!({ "discover": discover }))
            .await?;
        Ok(())
    }

    pub async fn get_targets(&self) -> Result<Vec<TargetDescription>> {
        let value = self.guard.call("Target.getTargets", json!({})).await?;
        let infos = value
            .get("targetInfos")
            .cloned()
            .unwrap_or(serde_json::Value::Array(vec![]));
        Ok(serde_json::from_value(infos)?)
    }

    pub async fn get_target_info(&self, target_id: &str) -> Result<TargetDescription> {
        let value = self
            .guard
            .call("Target.getTargetInfo", json!({ "targetId": target_id }))
            .await?;
        let info = value
            .get("targetInfo")
            .cloned()
            .ok_or_else(|| crate::Error::cdp("No targetInfo in response"))?;
        Ok(serde_json::from_value(info)?)
    }

    pub async fn activate_target(&self, target_id: &str) -> Result<()> {
        self.guard
            .call("Target.activateTarget", json!({ "targetId": target_id }))
            .await?;
        Ok(())
    }

    pub async fn close_target(&self, target_id: &str) -> Result<()> {
        self.guard
            .call("Target.closeTarget", json!({ "targetId": target_id }))
            .await?;
        Ok(())
    }
}

/// `Emulation` domain
#[derive(Debug, Clone)]
pub struct EmulationDomain {
    guard: SessionGuard,
}

impl EmulationDomain {
    pub fn new(guard: SessionGuard) -> Self {
        Self { guard }
    }

    pub async fn set_device_metrics_override(
        &self,
        width: u32,
        height: u32,
        device_scale_factor: f64,
        mobile: bool,
    ) -> Result<()> {
        self.guard
            .call(
                "Emulation.setDeviceMetricsOverride",
                json!({
                    "width": width,
                    "height": height,
                    "deviceScaleFactor": device_scale_factor,
                    "mobile": mobile,
                }),
            )
            .await?;
        Ok(())
    }
}

/// `Overlay` domain (not available on reduced-feature browser variants)
#[derive(Debug, Clone)]
pub struct OverlayDomain {
    guard: SessionGuard,
}

impl OverlayDomain {
    pub fn new(guard: SessionGuard) -> Self {
        Self { guard }
    }

    pub async fn enable(&self) -> Result<()> {
        self.guard.call("Overlay.enable", json!({})).await?;
        Ok(())
    }

    /// Highlight a node by remote object id, for debugging interactions.
    pub async fn highlight_node(&self, object_id: &str) -> Result<()> {
        self.guard
            .call(
                "Overlay.highlightNode",
                json!({
                    "highlightConfig": { "contentColor": { "r": 111, "g": 168, "b": 220, "a": 0.66 } },
                    "objectId": object_id,
                }),
            )
            .await?;
        Ok(())
    }
}

/// `Security` domain
#[derive(Debug, Clone)]
pub struct SecurityDomain {
    guard: SessionGuard,
}

impl SecurityDomain {
    pub fn new(guard: SessionGuard) -> Self {
        Self { guard }
    }

    pub async fn enable(&self) -> Result<()> {
        self.guard.call("Security.enable", json!({})).await?;
        Ok(())
    }

    pub async fn set_ignore_certificate_errors(&self, ignore: bool) -> Result<()> {
        self.guard
            .call(
                "Security.setIgnoreCertificateErrors",
                json!({ "ignore": ignore }),
            )
            .await?;
        Ok(())
    }
}
