//! Actionability engine
//!
//! Resolves a selector to an element that is currently safe to interact
//! with, under a cooperative timed retry. Candidates are examined in DOM
//! order up to a configurable cap; the failure message distinguishes
//! "too many matches" from "a predicate rejected everything", and that
//! distinction must survive refactors since callers act on the message.

use crate::config::BrowserConfig;
use crate::element::handle::{ElementHandle, ElementProbe};
use crate::error::ActionabilityFailure;
use crate::{Error, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// Predicates an element must satisfy before interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionabilityCheck {
    Visible,
    NotDisabled,
}

impl ActionabilityCheck {
    /// The default predicate set for interactions.
    pub fn defaults() -> Vec<ActionabilityCheck> {
        vec![ActionabilityCheck::Visible, ActionabilityCheck::NotDisabled]
    }

    /// Name used in the failure message when this check rejects.
    fn failure_name(&self) -> &'static str {
        match self {
            ActionabilityCheck::Visible => "not visible",
            ActionabilityCheck::NotDisabled => "disabled",
        }
    }
}

/// Outcome of evaluating the predicate set against one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionabilityResult {
    pub actionable: bool,
    /// First failing predicate, when not actionable
    pub reason: Option<&'static str>,
}

/// Actionability engine
#[derive(Clone)]
pub struct ActionabilityEngine {
    probe: Arc<dyn ElementProbe>,
    retry_interval_ms: u64,
    retry_timeout_ms: u64,
    candidate_cap: usize,
}

impl ActionabilityEngine {
    pub fn new(probe: Arc<dyn ElementProbe>, config: &BrowserConfig) -> Self {
        Self {
            probe,
            retry_interval_ms: config.retry_interval_ms,
            retry_timeout_ms: config.retry_timeout_ms,
            candidate_cap: config.no_of_element_to_match,
        }
    }

    /// Evaluate the predicate set against one candidate.
    pub async fn examine(
        &self,
        element: &ElementHandle,
        checks: &[ActionabilityCheck],
    ) -> Result<ActionabilityResult> {
        for check in checks {
            let passed = match check {
                ActionabilityCheck::Visible => {
                    self.probe.visibility(element).await?.is_visible()
                }
                ActionabilityCheck::NotDisabled => !self.probe.is_disabled(element).await?,
            };
            if !passed {
                return Ok(ActionabilityResult {
                    actionable: false,
                    reason: Some(check.failure_name()),
                });
            }
        }
        Ok(ActionabilityResult {
            actionable: true,
            reason: None,
        })
    }

    /// Resolve `selector` to the first actionable candidate, retrying until
    /// the timeout. With `force` the checks are skipped and the first
    /// candidate wins.
    pub async fn wait_and_get_actionable(
        &self,
        selector: &str,
        checks: &[ActionabilityCheck],
        force: bool,
    ) -> Result<ElementHandle> {
        let deadline = tokio::time::Instant::now()
            + tokio::time::Duration::from_millis(self.retry_timeout_ms);
        let mut last_failure: Option<ActionabilityFailure> = None;
        let mut seen_any = false;

        loop {
            // One extra candidate tells us whether the cap was the limit
            let candidates = self.probe.find(selector, self.candidate_cap + 1).await?;
            let over_cap = candidates.len() > self.candidate_cap;
            seen_any = seen_any || !candidates.is_empty();

            if force {
                if let Some(first) = candidates.into_iter().next() {
                    info!("Returning first candidate for \"{}\" unchecked", selector);
                    return Ok(first);
                }
            } else {
                let mut first_reason: Option<&'static str> = None;
                for candidate in candidates.iter().take(self.candidate_cap) {
                    let result = self.examine(candidate, checks).await?;
                    if result.actionable {
                        debug!("Candidate for \"{}\" passed all checks", selector);
                        return Ok(candidate.clone());
                    }
                    if first_reason.is_none() {
                        first_reason = result.reason;
                    }
                }

                // Cap exhaustion outranks the predicate reason: the caller
                // is told to narrow the selector, not to wait
                if over_cap {
                    last_failure = Some(ActionabilityFailure::TooManyMatches {
                        cap: self.candidate_cap,
                    });
                } else if let Some(reason) = first_reason {
                    last_failure = Some(ActionabilityFailure::FailingCheck { check: reason });
                }
            }

            if tokio::time::Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(self.retry_interval_ms)).await;
        }

        if !seen_any {
            return Err(Error::element_not_found(selector));
        }
        let reason = last_failure.unwrap_or(ActionabilityFailure::FailingCheck {
            check: "not actionable",
        });
        Err(Error::ElementNotActionable {
            selector: selector.to_string(),
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::geometry::{BoundingBox, VisibilitySnapshot};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Canned element table standing in for the browser.
    #[derive(Default)]
    struct TableProbe {
        /// selector -> (object id, visible, disabled)
        elements: Mutex<HashMap<String, Vec<(String, bool, bool)>>>,
    }

    impl TableProbe {
        fn with(selector: &str, rows: Vec<(&str, bool, bool)>) -> Arc<Self> {
            let probe = TableProbe::default();
            probe.elements.lock().unwrap().insert(
                selector.to_string(),
                rows.into_iter()
                    .map(|(id, visible, disabled)| (id.to_string(), visible, disabled))
                    .collect(),
            );
            Arc::new(probe)
        }

        fn row(&self, object_id: &str) -> (bool, bool) {
            self.elements
                .lock()
                .unwrap()
                .values()
                .flatten()
                .find(|(id, _, _)| id == object_id)
                .map(|(_, visible, disabled)| (*visible, *disabled))
                .unwrap_or((false, false))
        }
    }

    #[async_trait]
    impl ElementProbe for TableProbe {
        async fn find(&self, selector: &str, limit: usize) -> Result<Vec<ElementHandle>> {
            Ok(self
                .elements
                .lock()
                .unwrap()
                .get(selector)
                .map(|rows| {
                    rows.iter()
                        .take(limit)
                        .map(|(id, _, _)| ElementHandle::new(id.clone(), selector))
                        .collect()
                })
                .unwrap_or_default())
        }

        async fn visibility(&self, element: &ElementHandle) -> Result<VisibilitySnapshot> {
            let (visible, _) = self.row(&element.object_id);
            Ok(VisibilitySnapshot {
                offset_height: if visible { 1.0 } else { 0.0 },
                offset_width: 0.0,
                client_rect_count: 0,
            })
        }

        async fn is_disabled(&self, element: &ElementHandle) -> Result<bool> {
            let (_, disabled) = self.row(&element.object_id);
            Ok(disabled)
        }

        async fn bounding_box(&self, _element: &ElementHandle) -> Result<Option<BoundingBox>> {
            Ok(None)
        }
    }

    fn engine(probe: Arc<TableProbe>, cap: usize) -> ActionabilityEngine {
        let config = BrowserConfig {
            retry_interval_ms: 5,
            retry_timeout_ms: 20,
            no_of_element_to_match: cap,
            ..BrowserConfig::default()
        };
        ActionabilityEngine::new(probe, &config)
    }

    #[tokio::test]
    async fn test_cap_reached_demands_more_specific_selector() {
        // Three candidates, the passing one beyond the cap of 2
        let probe = TableProbe::with(
            "button",
            vec![
                ("e1", true, true),
                ("e2", true, true),
                ("e3", true, false),
            ],
        );

        let result = engine(probe, 2)
            .wait_and_get_actionable("button", &ActionabilityCheck::defaults(), false)
            .await;
        match result {
            Err(Error::ElementNotActionable { reason, .. }) => {
                assert_eq!(reason, ActionabilityFailure::TooManyMatches { cap: 2 });
                assert!(reason.to_string().contains("more specific selector"));
            }
            other => panic!("Expected too-many-matches, got {:?}", other.map(|e| e.object_id)),
        }
    }

    #[tokio::test]
    async fn test_larger_cap_reaches_the_enabled_candidate() {
        let probe = TableProbe::with(
            "button",
            vec![
                ("e1", true, true),
                ("e2", true, true),
                ("e3", true, false),
            ],
        );

        let element = engine(probe, 3)
            .wait_and_get_actionable("button", &ActionabilityCheck::defaults(), false)
            .await
            .unwrap();
        assert_eq!(element.object_id, "e3");
    }

    #[tokio::test]
    async fn test_predicate_failure_names_the_check() {
        let probe = TableProbe::with("button", vec![("e1", true, true)]);

        let result = engine(probe, 10)
            .wait_and_get_actionable("button", &ActionabilityCheck::defaults(), false)
            .await;
        match result {
            Err(Error::ElementNotActionable { reason, .. }) => {
                assert_eq!(
                    reason,
                    ActionabilityFailure::FailingCheck { check: "disabled" }
                );
                assert_eq!(reason.to_string(), "element is disabled");
            }
            other => panic!("Expected failing check, got {:?}", other.map(|e| e.object_id)),
        }
    }

    #[tokio::test]
    async fn test_hidden_element_reported_as_not_visible() {
        let probe = TableProbe::with("span", vec![("e1", false, false)]);

        let result = engine(probe, 10)
            .wait_and_get_actionable("span", &ActionabilityCheck::defaults(), false)
            .await;
        match result {
            Err(Error::ElementNotActionable { reason, .. }) => {
                assert_eq!(reason.to_string(), "element is not visible");
            }
            other => panic!("Expected failing check, got {:?}", other.map(|e| e.object_id)),
        }
    }

    #[tokio::test]
    async fn test_force_skips_all_checks() {
        let probe = TableProbe::with("button", vec![("e1", false, true)]);

        let element = engine(probe, 10)
            .wait_and_get_actionable("button", &ActionabilityCheck::defaults(), true)
            .await
            .unwrap();
        assert_eq!(element.object_id, "e1");
    }

    #[tokio::test]
    async fn test_missing_element_is_not_found() {
        let probe = Arc::new(TableProbe::default());

        let result = engine(probe, 10)
            .wait_and_get_actionable("#nope", &ActionabilityCheck::defaults(), false)
            .await;
        assert!(matches!(result, Err(Error::ElementNotFound(_))));
    }
}
