//! Assertion candidates.
//!
//! Three producers propose assertion steps for each recorded step:
//!
//! - [`deterministic`]: from the step's own semantics (a fill implies the value)
//! - [`snapshot`]: from what the step changed in the accessibility tree
//! - [`inventory`]: from the whole post-step tree, when nothing better exists
//!
//! Candidates are then merged by [`dedupe`], planned for coverage, filtered by
//! policy and finally validated against the live page.

pub mod dedupe;
pub mod deterministic;
pub mod inventory;
pub mod snapshot;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::locator::expression::{LocatorExpression, Literal};
use crate::result::ImproveError;
use crate::snapshot::normalize;
use crate::step::{ActionKind, Step};
use crate::target::{Target, TargetKind};

pub use dedupe::dedupe_candidates;
pub use deterministic::{build_deterministic_candidates, is_navigation_like};
pub use inventory::{build_inventory_candidates, needs_inventory};
pub use snapshot::build_snapshot_candidates;

/// Which producer proposed a candidate. Also selects the producers for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    /// Step semantics only
    Deterministic,
    /// Snapshots captured by the engine's own driver
    #[default]
    SnapshotNative,
    /// Snapshots produced by an external snapshot tool
    SnapshotCli,
}

impl CandidateSource {
    /// Stable name used in reports
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Deterministic => "deterministic",
            Self::SnapshotNative => "snapshot_native",
            Self::SnapshotCli => "snapshot_cli",
        }
    }

    /// Dedupe rank, higher wins
    #[must_use]
    pub const fn rank(&self) -> u8 {
        match self {
            Self::Deterministic => 3,
            Self::SnapshotNative => 2,
            Self::SnapshotCli => 1,
        }
    }

    /// Whether snapshot-derived producers run for this selection
    #[must_use]
    pub const fn uses_snapshots(&self) -> bool {
        !matches!(self, Self::Deterministic)
    }
}

impl FromStr for CandidateSource {
    type Err = ImproveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "deterministic" => Ok(Self::Deterministic),
            "snapshot_native" | "native" => Ok(Self::SnapshotNative),
            "snapshot_cli" | "cli" => Ok(Self::SnapshotCli),
            _ => Err(ImproveError::InvalidAssertionSource {
                value: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for CandidateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Final disposition of a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyStatus {
    /// Executed without error and inserted
    Applied,
    /// An equivalent assertion already exists at or next to the source step
    SkippedExisting,
    /// Execution failed, or the state it depended on was unreliable
    SkippedRuntimeFailure,
    /// Excluded by policy caps or kind rules
    SkippedPolicy,
    /// Below the policy's confidence thresholds
    SkippedLowConfidence,
}

impl ApplyStatus {
    /// Stable name used in reports
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::SkippedExisting => "skipped_existing",
            Self::SkippedRuntimeFailure => "skipped_runtime_failure",
            Self::SkippedPolicy => "skipped_policy",
            Self::SkippedLowConfidence => "skipped_low_confidence",
        }
    }
}

/// A proposed assertion step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionCandidate {
    /// Original index of the step this assertion follows
    pub index: usize,
    /// Kind of that step
    pub after_action: ActionKind,
    /// The assertion step
    pub candidate: Step,
    /// Confidence in `[0, 1]`
    pub confidence: f64,
    /// Why it was proposed
    pub rationale: String,
    /// Producer
    pub candidate_source: CandidateSource,
    /// Proposed only to guarantee coverage
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub coverage_fallback: bool,
    /// Anchors on a landmark present before and after the step
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stable_structural: bool,
    /// Stability estimate used by policies that rank on it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stability_score: Option<f64>,
    /// Set during runtime validation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_status: Option<ApplyStatus>,
    /// Detail for the status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_message: Option<String>,
}

impl AssertionCandidate {
    /// Create a candidate
    #[must_use]
    pub fn new(
        index: usize,
        after_action: ActionKind,
        candidate: Step,
        confidence: f64,
        rationale: impl Into<String>,
        candidate_source: CandidateSource,
    ) -> Self {
        Self {
            index,
            after_action,
            candidate,
            confidence,
            rationale: rationale.into(),
            candidate_source,
            coverage_fallback: false,
            stable_structural: false,
            stability_score: None,
            apply_status: None,
            apply_message: None,
        }
    }

    /// Mark as a coverage fallback
    #[must_use]
    pub const fn as_fallback(mut self) -> Self {
        self.coverage_fallback = true;
        self
    }

    /// Mark as a structural anchor with a stability score
    #[must_use]
    pub const fn as_structural(mut self, stability_score: f64) -> Self {
        self.stable_structural = true;
        self.stability_score = Some(stability_score);
        self
    }

    /// Set the stability score
    #[must_use]
    pub const fn with_stability(mut self, stability_score: f64) -> Self {
        self.stability_score = Some(stability_score);
        self
    }

    /// Record the final status
    pub fn set_status(&mut self, status: ApplyStatus, message: impl Into<String>) {
        self.apply_status = Some(status);
        self.apply_message = Some(message.into());
    }

    /// Assertion kind
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        self.candidate.kind()
    }

    /// Key over `(index, action, normalized target, normalized payload)`
    #[must_use]
    pub fn dedupe_key(&self) -> String {
        format!("{}|{}", self.index, self.candidate.action.equivalence_key())
    }

    /// Whether the candidate came from a snapshot producer
    #[must_use]
    pub const fn is_snapshot_derived(&self) -> bool {
        self.candidate_source.uses_snapshots()
    }

    /// Observed text the assertion depends on: the payload of text, title and
    /// value assertions, else the target's text criterion
    #[must_use]
    pub fn observed_text(&self) -> Option<String> {
        match self.kind() {
            ActionKind::AssertText | ActionKind::AssertTitle | ActionKind::AssertValue => {
                self.candidate.action.payload()
            }
            _ => self.candidate.target().and_then(target_text),
        }
    }
}

/// A deterministic assertion that was deliberately not proposed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeterministicSkip {
    /// Original index of the step
    pub index: usize,
    /// Kind of the step
    pub action: ActionKind,
    /// Target value of the step
    pub target: String,
    /// Why it was skipped
    pub reason: String,
}

/// Text a target matches on, if it matches on text at all
#[must_use]
pub fn target_text(target: &Target) -> Option<String> {
    let text = match target.kind {
        TargetKind::LocatorExpression => {
            let expr = LocatorExpression::parse(&target.value).ok()?;
            match expr.text_criterion()?.value {
                Literal::Str(text) => text,
                _ => return None,
            }
        }
        TargetKind::Css => {
            let (_, rest) = target.value.split_once(":has-text(")?;
            rest.trim_end_matches(')')
                .trim_matches(|c| c == '"' || c == '\'')
                .to_string()
        }
        TargetKind::EngineSelector => {
            let body = target
                .value
                .strip_prefix("internal:text=")
                .or_else(|| target.value.strip_prefix("text="))?;
            match body.strip_prefix('"').and_then(|rest| rest.rsplit_once('"')) {
                Some((quoted, _flag)) => quoted.to_string(),
                None => body.to_string(),
            }
        }
        TargetKind::Xpath | TargetKind::Unknown => return None,
    };
    let text = normalize(&text);
    (!text.is_empty()).then_some(text)
}

/// Case- and whitespace-insensitive text comparison
#[must_use]
pub fn same_text(a: &str, b: &str) -> bool {
    normalize(a).to_lowercase() == normalize(b).to_lowercase()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_source_parsing_with_hint() {
        assert_eq!(
            "snapshot-native".parse::<CandidateSource>().unwrap(),
            CandidateSource::SnapshotNative
        );
        assert_eq!(
            "Snapshot_CLI".parse::<CandidateSource>().unwrap(),
            CandidateSource::SnapshotCli
        );
        let err = "vision".parse::<CandidateSource>().unwrap_err();
        assert!(err.to_string().contains("snapshot-native"));
    }

    #[test]
    fn test_source_rank() {
        assert!(CandidateSource::Deterministic.rank() > CandidateSource::SnapshotNative.rank());
        assert!(CandidateSource::SnapshotNative.rank() > CandidateSource::SnapshotCli.rank());
    }

    #[test]
    fn test_target_text() {
        assert_eq!(
            target_text(&Target::expression("getByRole('button', { name: 'Save  now' })")),
            Some("Save now".to_string())
        );
        assert_eq!(
            target_text(&Target::css("button:has-text(\"Submit\")")),
            Some("Submit".to_string())
        );
        assert_eq!(
            target_text(&Target::new("internal:text=\"Sign in\"i", TargetKind::EngineSelector)),
            Some("Sign in".to_string())
        );
        assert_eq!(target_text(&Target::css("#submit")), None);
        assert_eq!(target_text(&Target::expression("getByTestId('x')")), None);
    }

    #[test]
    fn test_dedupe_key_uses_index() {
        let step = Step::assert_visible(Target::css("#a"));
        let a = AssertionCandidate::new(
            0,
            ActionKind::Click,
            step.clone(),
            0.5,
            "x",
            CandidateSource::Deterministic,
        );
        let b = AssertionCandidate::new(1, ActionKind::Click, step, 0.5, "x", CandidateSource::Deterministic);
        assert_ne!(a.dedupe_key(), b.dedupe_key());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_value(ApplyStatus::SkippedRuntimeFailure).unwrap();
        assert_eq!(json, "skipped_runtime_failure");
    }
}
