//! Page driver seam.
//!
//! The engine never launches browsers itself. Everything it needs from a live
//! page goes through [`PageDriver`]: executing one step, counting the elements
//! a target resolves to, capturing an accessibility snapshot, and waiting for
//! network quiescence.
//!
//! [`ScriptedPage`] is a deterministic in-memory implementation. It walks a
//! list of page states, one per successful interaction, and is what the test
//! suite runs the passes against.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::assertion::target_text;
use crate::result::{ImproveError, ImproveResult};
use crate::step::{Action, ActionKind, Step};
use crate::target::Target;

/// How a step is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Assertions are syntax-checked only
    #[default]
    Analysis,
    /// Assertions are evaluated against the page
    Playback,
}

impl ExecutionMode {
    /// Mode name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::Playback => "playback",
        }
    }
}

/// Per-step execution settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRunOptions {
    /// Step timeout in milliseconds
    pub timeout_ms: u64,
    /// Base URL for relative navigations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Execution mode
    pub mode: ExecutionMode,
}

impl StepRunOptions {
    /// Analysis-mode options
    #[must_use]
    pub const fn analysis(timeout_ms: u64, base_url: Option<String>) -> Self {
        Self {
            timeout_ms,
            base_url,
            mode: ExecutionMode::Analysis,
        }
    }

    /// Same options in playback mode
    #[must_use]
    pub fn playback(&self) -> Self {
        Self {
            mode: ExecutionMode::Playback,
            ..self.clone()
        }
    }
}

/// A target resolved against the live page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTarget {
    /// Expression the driver evaluated
    pub expression: String,
    /// Number of matching elements
    pub match_count: usize,
}

/// Live page operations the passes depend on
#[async_trait]
pub trait PageDriver: Send {
    /// Start a fresh page for a replay
    async fn reset(&mut self) -> ImproveResult<()>;

    /// Execute one step
    async fn execute_step(&mut self, step: &Step, options: &StepRunOptions) -> ImproveResult<()>;

    /// Count the elements a target resolves to
    async fn resolve_target(&mut self, target: &Target, timeout_ms: u64)
        -> ImproveResult<ResolvedTarget>;

    /// Capture the accessibility snapshot as indented YAML-like text
    async fn capture_snapshot(&mut self, timeout_ms: u64) -> ImproveResult<String>;

    /// Wait for network quiescence; returns `true` when the wait timed out
    async fn wait_for_network_idle(&mut self, timeout_ms: u64) -> bool;

    /// Current page URL
    async fn current_url(&mut self) -> Option<String>;

    /// Current page title
    async fn title(&mut self) -> Option<String>;

    /// Dismiss blocking overlays; returns whether anything was dismissed
    async fn dismiss_overlays(&mut self) -> ImproveResult<bool>;
}

/// Message fragments of an action blocked by an overlay
const INTERCEPTION_PATTERNS: &[&str] = &[
    "intercepts pointer events",
    "element is not receiving pointer events",
    "is obscured by",
    "other element would receive the click",
];

/// Whether a failure message says another element intercepted the action
#[must_use]
pub fn is_overlay_interception(message: &str) -> bool {
    let lowered = message.to_lowercase();
    INTERCEPTION_PATTERNS.iter().any(|p| lowered.contains(p))
}

/// One page state of a [`ScriptedPage`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageState {
    /// Page URL
    pub url: String,
    /// Page title
    pub title: String,
    /// Accessibility snapshot text
    pub snapshot: String,
}

impl PageState {
    /// Create a page state
    #[must_use]
    pub fn new(url: impl Into<String>, title: impl Into<String>, snapshot: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            snapshot: snapshot.into(),
        }
    }
}

/// Deterministic in-memory page.
///
/// The page starts blank. A navigate jumps to the state whose URL matches;
/// every other successful interaction advances to the next state, if there is
/// one. Assertions are evaluated against the current state in playback mode
/// only.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPage {
    /// Page states in visiting order
    pub states: Vec<PageState>,
    /// Index of the current state
    pub current: usize,
    blank: bool,
    failures: Vec<(String, String)>,
    match_counts: HashMap<String, usize>,
    idle_timeouts: HashSet<usize>,
    snapshot_failures: HashSet<usize>,
    overlays: usize,
    pending_overlays: usize,
    /// Call history for verification
    pub call_history: Vec<String>,
}

impl ScriptedPage {
    /// Create a page over the given states
    #[must_use]
    pub fn new(states: Vec<PageState>) -> Self {
        Self {
            states,
            blank: true,
            ..Self::default()
        }
    }

    /// Fail any step whose rendering contains `pattern`
    #[must_use]
    pub fn with_failure(mut self, pattern: impl Into<String>, message: impl Into<String>) -> Self {
        self.failures.push((pattern.into(), message.into()));
        self
    }

    /// Number of elements a target value resolves to; unlisted targets resolve to one
    #[must_use]
    pub fn with_match_count(mut self, value: impl Into<String>, count: usize) -> Self {
        self.match_counts.insert(value.into(), count);
        self
    }

    /// Network idle wait times out while in `state`
    #[must_use]
    pub fn with_idle_timeout(mut self, state: usize) -> Self {
        self.idle_timeouts.insert(state);
        self
    }

    /// Snapshot capture fails while in `state`
    #[must_use]
    pub fn with_snapshot_failure(mut self, state: usize) -> Self {
        self.snapshot_failures.insert(state);
        self
    }

    /// Overlays blocking clicks and key presses after each reset
    #[must_use]
    pub fn with_overlays(mut self, count: usize) -> Self {
        self.overlays = count;
        self.pending_overlays = count;
        self
    }

    /// Get call history
    #[must_use]
    pub fn history(&self) -> &[String] {
        &self.call_history
    }

    /// Check if method was called
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.call_history.iter().any(|c| c.starts_with(method))
    }

    /// Number of calls starting with `method`
    #[must_use]
    pub fn call_count(&self, method: &str) -> usize {
        self.call_history.iter().filter(|c| c.starts_with(method)).count()
    }

    fn state(&self) -> Option<&PageState> {
        if self.blank {
            return None;
        }
        self.states.get(self.current)
    }

    fn snapshot_text(&self) -> &str {
        self.state().map_or("", |s| s.snapshot.as_str())
    }

    fn count_for(&self, target: &Target) -> usize {
        self.match_counts.get(&target.value).copied().unwrap_or(1)
    }

    fn navigate(&mut self, url: &str, base_url: Option<&str>) {
        self.blank = false;
        let absolute = match base_url {
            Some(base) if !url.contains("://") => {
                format!("{}/{}", base.trim_end_matches('/'), url.trim_start_matches('/'))
            }
            _ => url.to_string(),
        };
        self.current = self
            .states
            .iter()
            .position(|s| s.url == absolute)
            .or_else(|| self.states.iter().position(|s| s.url.ends_with(url)))
            .unwrap_or(0);
    }

    fn evaluate(&self, action: &Action) -> Result<(), String> {
        let page = self.snapshot_text();
        match action {
            Action::AssertText { text, .. } if !page.contains(text.as_str()) => {
                Err(format!("expected text {text:?} not found on page"))
            }
            Action::AssertVisible { target } => match target_text(target) {
                Some(text) if !page.contains(text.as_str()) => {
                    Err(format!("{} is not visible", target.value))
                }
                _ => Ok(()),
            },
            Action::AssertUrl { url } => {
                let current = self.state().map_or("", |s| s.url.as_str());
                if current == url || current.ends_with(url.as_str()) {
                    Ok(())
                } else {
                    Err(format!("expected URL {url:?}, got {current:?}"))
                }
            }
            Action::AssertTitle { title } => {
                let current = self.state().map_or("", |s| s.title.as_str());
                if current == title {
                    Ok(())
                } else {
                    Err(format!("expected title {title:?}, got {current:?}"))
                }
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl PageDriver for ScriptedPage {
    async fn reset(&mut self) -> ImproveResult<()> {
        self.call_history.push("reset".to_string());
        self.current = 0;
        self.blank = true;
        self.pending_overlays = self.overlays;
        Ok(())
    }

    async fn execute_step(&mut self, step: &Step, options: &StepRunOptions) -> ImproveResult<()> {
        let rendered = step.to_string();
        self.call_history
            .push(format!("execute:{}:{rendered}", options.mode.as_str()));

        if let Some((_, message)) = self.failures.iter().find(|(p, _)| rendered.contains(p.as_str())) {
            return Err(ImproveError::driver(message.clone()));
        }
        if let Some(target) = step.target() {
            if self.count_for(target) == 0 {
                return Err(ImproveError::TargetResolution {
                    target: target.value.clone(),
                    message: format!("waiting for {} timed out", target.resolution_expression()),
                });
            }
        }

        let kind = step.kind();
        if kind == ActionKind::Navigate {
            if let Action::Navigate { url } = &step.action {
                self.navigate(url, options.base_url.as_deref());
            }
            return Ok(());
        }
        if kind.is_assertion() {
            return match options.mode {
                ExecutionMode::Analysis => Ok(()),
                ExecutionMode::Playback => self.evaluate(&step.action).map_err(ImproveError::driver),
            };
        }
        if matches!(kind, ActionKind::Click | ActionKind::Press) && self.pending_overlays > 0 {
            return Err(ImproveError::driver(
                "<div class=\"consent-overlay\"> intercepts pointer events",
            ));
        }
        if self.current + 1 < self.states.len() {
            self.current += 1;
        }
        Ok(())
    }

    async fn resolve_target(
        &mut self,
        target: &Target,
        _timeout_ms: u64,
    ) -> ImproveResult<ResolvedTarget> {
        self.call_history.push(format!("resolve:{}", target.value));
        Ok(ResolvedTarget {
            expression: target.resolution_expression(),
            match_count: self.count_for(target),
        })
    }

    async fn capture_snapshot(&mut self, timeout_ms: u64) -> ImproveResult<String> {
        self.call_history.push("snapshot".to_string());
        if self.snapshot_failures.contains(&self.current) {
            return Err(ImproveError::SnapshotCapture {
                message: format!("accessibility tree unavailable after {timeout_ms}ms"),
            });
        }
        Ok(self.snapshot_text().to_string())
    }

    async fn wait_for_network_idle(&mut self, _timeout_ms: u64) -> bool {
        self.call_history.push("network_idle".to_string());
        self.idle_timeouts.contains(&self.current)
    }

    async fn current_url(&mut self) -> Option<String> {
        self.state().map(|s| s.url.clone())
    }

    async fn title(&mut self) -> Option<String> {
        self.state().map(|s| s.title.clone())
    }

    async fn dismiss_overlays(&mut self) -> ImproveResult<bool> {
        self.call_history.push("dismiss_overlays".to_string());
        let dismissed = self.pending_overlays > 0;
        self.pending_overlays = 0;
        Ok(dismissed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn page() -> ScriptedPage {
        ScriptedPage::new(vec![
            PageState::new("https://shop.test/", "Shop", "- heading \"Shop\""),
            PageState::new("https://shop.test/cart", "Cart", "- heading \"Your cart\""),
        ])
    }

    fn analysis() -> StepRunOptions {
        StepRunOptions::analysis(1000, Some("https://shop.test".to_string()))
    }

    #[test]
    fn test_interception_patterns() {
        assert!(is_overlay_interception(
            "<div id=\"cookie\"> intercepts pointer events"
        ));
        assert!(!is_overlay_interception("Timeout 5000ms exceeded"));
    }

    #[tokio::test]
    async fn test_navigate_and_advance() {
        let mut driver = page();
        driver.execute_step(&Step::navigate("/"), &analysis()).await.unwrap();
        assert_eq!(driver.current, 0);
        driver
            .execute_step(&Step::click(Target::css("#cart")), &analysis())
            .await
            .unwrap();
        assert_eq!(driver.current_url().await.as_deref(), Some("https://shop.test/cart"));
        assert_eq!(driver.title().await.as_deref(), Some("Cart"));
        assert!(driver.was_called("execute:analysis"));
    }

    #[tokio::test]
    async fn test_assertions_only_evaluated_in_playback() {
        let mut driver = page();
        let step = Step::assert_text(Target::css("h1"), "Missing");
        assert!(driver.execute_step(&step, &analysis()).await.is_ok());
        let err = driver
            .execute_step(&step, &analysis().playback())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Missing"));
    }

    #[tokio::test]
    async fn test_overlay_blocks_until_dismissed() {
        let mut driver = page().with_overlays(1);
        let click = Step::click(Target::css("#cart"));
        let err = driver.execute_step(&click, &analysis()).await.unwrap_err();
        assert!(is_overlay_interception(&err.to_string()));
        assert!(driver.dismiss_overlays().await.unwrap());
        assert!(driver.execute_step(&click, &analysis()).await.is_ok());
        assert!(!driver.dismiss_overlays().await.unwrap());

        driver.reset().await.unwrap();
        assert!(driver.execute_step(&click, &analysis()).await.is_err());
    }

    #[tokio::test]
    async fn test_configured_failures_and_counts() {
        let mut driver = page()
            .with_failure("#broken", "element detached")
            .with_match_count(".item", 3)
            .with_match_count("#gone", 0)
            .with_idle_timeout(0)
            .with_snapshot_failure(0);
        let err = driver
            .execute_step(&Step::click(Target::css("#broken")), &analysis())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("element detached"));
        assert!(driver
            .execute_step(&Step::click(Target::css("#gone")), &analysis())
            .await
            .is_err());
        let resolved = driver.resolve_target(&Target::css(".item"), 100).await.unwrap();
        assert_eq!(resolved.match_count, 3);
        assert_eq!(resolved.expression, "locator('.item')");
        assert!(driver.wait_for_network_idle(500).await);
        assert!(driver.capture_snapshot(100).await.is_err());
        assert_eq!(driver.call_count("resolve:"), 1);
    }
}
