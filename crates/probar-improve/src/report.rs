//! Improvement report.
//!
//! One report is produced per run and never mutated afterwards. It carries
//! every locator finding, every assertion candidate with its final status and
//! the run's diagnostics, plus an aggregate summary.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::assertion::{ApplyStatus, AssertionCandidate, CandidateSource, DeterministicSkip};
use crate::pass::{FailureAction, StepFinding};
use crate::policy::AssertionPolicy;
use crate::result::ImproveResult;
use crate::tracing_support::Diagnostic;

/// Aggregate counts and rates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImproveSummary {
    /// Recorded steps
    pub total_steps: usize,
    /// Steps in the improved output
    pub output_steps: usize,
    /// Target candidates scored
    pub selector_candidates_evaluated: usize,
    /// Steps with a better-scoring candidate than the recorded target
    pub selectors_improved: usize,
    /// Steps whose target was replaced
    pub selectors_applied: usize,
    /// Steps that failed during replay
    pub failed_steps: usize,
    /// Failed steps dropped
    pub removed_steps: usize,
    /// Failed steps kept as optional
    pub optionalized_steps: usize,
    /// Assertion candidates proposed
    pub assertion_candidates: usize,
    /// Candidates applied
    pub assertions_applied: usize,
    /// Candidates skipped as already present
    pub assertions_skipped_existing: usize,
    /// Candidates skipped after a runtime failure
    pub assertions_skipped_runtime_failure: usize,
    /// Candidates skipped by policy
    pub assertions_skipped_policy: usize,
    /// Candidates skipped for low confidence
    pub assertions_skipped_low_confidence: usize,
    /// Candidates selected but not validated
    pub assertions_unvalidated: usize,
    /// Synthesized coverage fallbacks
    pub coverage_fallbacks: usize,
    /// Non-navigate steps that received a required candidate
    pub covered_steps: usize,
    /// Applied assertions per covered step
    pub assertion_apply_rate: f64,
    /// Improved selectors per targeted step
    pub selector_improvement_rate: f64,
}

/// Per-run inputs to the summary that are not visible in findings or candidates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepCounts {
    /// Recorded steps
    pub total: usize,
    /// Steps in the improved output
    pub output: usize,
    /// Non-navigate steps covered
    pub covered: usize,
    /// Synthesized fallbacks
    pub fallbacks: usize,
}

fn rate(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    ((numerator as f64 / denominator as f64) * 100.0).round() / 100.0
}

impl ImproveSummary {
    /// Compute the summary
    #[must_use]
    pub fn compute(
        counts: StepCounts,
        findings: &[StepFinding],
        candidates: &[AssertionCandidate],
        selectors_applied_effective: bool,
    ) -> Self {
        let status_count =
            |status: ApplyStatus| candidates.iter().filter(|c| c.apply_status == Some(status)).count();
        let failure_count = |action: FailureAction| {
            findings
                .iter()
                .filter(|f| f.failure_action == Some(action))
                .count()
        };
        let targeted = findings.iter().filter(|f| f.original_target.is_some()).count();
        let selectors_improved = findings.iter().filter(|f| f.is_improvement()).count();
        let assertions_applied = status_count(ApplyStatus::Applied);

        Self {
            total_steps: counts.total,
            output_steps: counts.output,
            selector_candidates_evaluated: findings.iter().map(|f| f.candidates.len()).sum(),
            selectors_improved,
            selectors_applied: findings.iter().filter(|f| f.changed).count(),
            failed_steps: findings.iter().filter(|f| f.replay_error.is_some()).count(),
            removed_steps: if selectors_applied_effective {
                failure_count(FailureAction::Remove)
            } else {
                0
            },
            optionalized_steps: if selectors_applied_effective {
                failure_count(FailureAction::Optionalize)
            } else {
                0
            },
            assertion_candidates: candidates.len(),
            assertions_applied,
            assertions_skipped_existing: status_count(ApplyStatus::SkippedExisting),
            assertions_skipped_runtime_failure: status_count(ApplyStatus::SkippedRuntimeFailure),
            assertions_skipped_policy: status_count(ApplyStatus::SkippedPolicy),
            assertions_skipped_low_confidence: status_count(ApplyStatus::SkippedLowConfidence),
            assertions_unvalidated: candidates.iter().filter(|c| c.apply_status.is_none()).count(),
            coverage_fallbacks: counts.fallbacks,
            covered_steps: counts.covered,
            assertion_apply_rate: rate(assertions_applied, counts.covered),
            selector_improvement_rate: rate(selectors_improved, targeted),
        }
    }
}

/// Output of one improvement run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImproveReport {
    /// Unique run identifier
    pub run_id: String,
    /// RFC 3339 generation time
    pub generated_at: String,
    /// Policy in effect
    pub policy: AssertionPolicy,
    /// Assertion source in effect
    pub assertion_source: CandidateSource,
    /// Locator findings, one per recorded step
    pub step_findings: Vec<StepFinding>,
    /// Assertion candidates with their final statuses
    pub assertion_candidates: Vec<AssertionCandidate>,
    /// Positions in `assertion_candidates` of each covered step's required candidate
    pub required_candidate_indexes: Vec<usize>,
    /// Deterministic assertions deliberately not proposed
    pub deterministic_skips: Vec<DeterministicSkip>,
    /// Diagnostics collected during the run
    pub diagnostics: Vec<Diagnostic>,
    /// Aggregate counts and rates
    pub summary: ImproveSummary,
}

impl ImproveReport {
    /// Create a report stamped with a fresh run id and the current time
    #[must_use]
    pub fn new(
        policy: AssertionPolicy,
        assertion_source: CandidateSource,
        step_findings: Vec<StepFinding>,
        assertion_candidates: Vec<AssertionCandidate>,
        required_candidate_indexes: Vec<usize>,
        deterministic_skips: Vec<DeterministicSkip>,
        diagnostics: Vec<Diagnostic>,
        summary: ImproveSummary,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            policy,
            assertion_source,
            step_findings,
            assertion_candidates,
            required_candidate_indexes,
            deterministic_skips,
            diagnostics,
            summary,
        }
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> ImproveResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Candidates with the given status
    pub fn candidates_with_status(
        &self,
        status: ApplyStatus,
    ) -> impl Iterator<Item = &AssertionCandidate> + '_ {
        self.assertion_candidates
            .iter()
            .filter(move |c| c.apply_status == Some(status))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::step::{ActionKind, Step};
    use crate::target::Target;

    fn candidate(status: Option<ApplyStatus>) -> AssertionCandidate {
        let mut c = AssertionCandidate::new(
            1,
            ActionKind::Click,
            Step::assert_visible(Target::css("#done")),
            0.7,
            "v",
            CandidateSource::SnapshotNative,
        );
        if let Some(status) = status {
            c.set_status(status, "test");
        }
        c
    }

    #[test]
    fn test_rates_round_to_two_decimals() {
        assert_eq!(rate(1, 3), 0.33);
        assert_eq!(rate(2, 3), 0.67);
        assert_eq!(rate(5, 0), 0.0);
    }

    #[test]
    fn test_summary_counts_statuses() {
        let candidates = vec![
            candidate(Some(ApplyStatus::Applied)),
            candidate(Some(ApplyStatus::SkippedPolicy)),
            candidate(Some(ApplyStatus::SkippedPolicy)),
            candidate(None),
        ];
        let counts = StepCounts {
            total: 4,
            output: 5,
            covered: 3,
            fallbacks: 1,
        };
        let summary = ImproveSummary::compute(counts, &[], &candidates, false);
        assert_eq!(summary.assertion_candidates, 4);
        assert_eq!(summary.assertions_applied, 1);
        assert_eq!(summary.assertions_skipped_policy, 2);
        assert_eq!(summary.assertions_unvalidated, 1);
        assert_eq!(summary.assertion_apply_rate, 0.33);
        assert_eq!(summary.selector_improvement_rate, 0.0);
    }

    #[test]
    fn test_report_json_shape() {
        let report = ImproveReport::new(
            AssertionPolicy::Balanced,
            CandidateSource::Deterministic,
            Vec::new(),
            vec![candidate(Some(ApplyStatus::Applied))],
            vec![0],
            Vec::new(),
            Vec::new(),
            ImproveSummary::default(),
        );
        let json = report.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["policy"], "balanced");
        assert_eq!(value["assertionSource"], "deterministic");
        assert_eq!(value["assertionCandidates"][0]["applyStatus"], "applied");
        assert!(chrono::DateTime::parse_from_rfc3339(&report.generated_at).is_ok());
        assert_eq!(report.candidates_with_status(ApplyStatus::Applied).count(), 1);
        assert!(Uuid::parse_str(&report.run_id).is_ok());
    }
}
