//! Selector pass.
//!
//! Replays the recorded steps one at a time. Before each step the target's
//! candidates are generated, counted on the live page and scored; the best one
//! is adopted when allowed. The step then runs in analysis mode and the
//! accessibility tree is captured on both sides of it for the assertion pass.

use serde::{Deserialize, Serialize};

use crate::config::ImproveOptions;
use crate::driver::PageDriver;
use crate::index_map::StepIndexMap;
use crate::locator::{
    generate_candidates, is_auto_applicable, score_candidates, select_best, TargetCandidateScore,
};
use crate::result::ImproveResult;
use crate::runtime::play_step;
use crate::snapshot::StepSnapshot;
use crate::step::{ActionKind, Step};
use crate::target::Target;
use crate::tracing_support::{codes, DiagnosticLog};
use crate::volatility::VolatileSignal;

/// What happens to a step that failed during replay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureAction {
    /// Drop the step
    Remove,
    /// Keep the step, marked optional
    Optionalize,
    /// Keep the step unchanged
    Keep,
}

impl FailureAction {
    /// Classification by step kind
    #[must_use]
    pub const fn for_kind(kind: ActionKind) -> Self {
        if kind.is_assertion() {
            Self::Remove
        } else if kind.is_interaction() {
            Self::Optionalize
        } else {
            Self::Keep
        }
    }
}

/// Locator analysis and replay outcome of one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepFinding {
    /// Original index of the step
    pub index: usize,
    /// Kind of the step
    pub action: ActionKind,
    /// Target as recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_target: Option<Target>,
    /// Best-scoring candidate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_target: Option<Target>,
    /// Score of the recorded target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_score: Option<f64>,
    /// Score of the recommended target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_score: Option<f64>,
    /// Every candidate considered
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<TargetCandidateScore>,
    /// Whether the recommended target was adopted
    pub changed: bool,
    /// Volatile signals found in the recorded target's text
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volatile_signals: Vec<VolatileSignal>,
    /// Replay failure message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replay_error: Option<String>,
    /// Classification of a failed step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_action: Option<FailureAction>,
}

impl StepFinding {
    fn new(index: usize, step: &Step) -> Self {
        Self {
            index,
            action: step.kind(),
            original_target: step.target().cloned(),
            recommended_target: None,
            original_score: None,
            recommended_score: None,
            candidates: Vec::new(),
            changed: false,
            volatile_signals: Vec::new(),
            replay_error: None,
            failure_action: None,
        }
    }

    /// Whether a better candidate than the recorded target was found
    #[must_use]
    pub fn is_improvement(&self) -> bool {
        match (self.original_score, self.recommended_score) {
            (Some(original), Some(recommended)) => recommended > original,
            _ => false,
        }
    }
}

/// Steps, findings and snapshots produced by the selector pass
#[derive(Debug, Clone, Default)]
pub struct SelectorPassOutput {
    /// Steps after adoption and failure handling
    pub steps: Vec<Step>,
    /// Runtime ↔ original index map for `steps`
    pub index_map: StepIndexMap,
    /// One finding per recorded step
    pub findings: Vec<StepFinding>,
    /// Snapshots of steps that ran and were captured on both sides
    pub snapshots: Vec<StepSnapshot>,
    /// Original indexes of steps that failed during replay
    pub failed_steps: Vec<usize>,
}

impl SelectorPassOutput {
    /// Snapshot of an original step
    #[must_use]
    pub fn snapshot_for(&self, index: usize) -> Option<&StepSnapshot> {
        self.snapshots.iter().find(|s| s.index == index)
    }
}

async fn capture<D: PageDriver + ?Sized>(
    driver: &mut D,
    index: usize,
    when: &str,
    options: &ImproveOptions,
    log: &mut DiagnosticLog,
) -> Option<String> {
    match driver.capture_snapshot(options.snapshot_timeout_ms).await {
        Ok(snapshot) => Some(snapshot),
        Err(err) => {
            log.warn(
                codes::SNAPSHOT_CAPTURE_FAILED,
                index,
                format!("{when}-step snapshot unavailable: {err}"),
            );
            None
        }
    }
}

/// Score the step's target candidates and adopt the best one when allowed.
///
/// Returns the step to execute.
async fn analyze_target<D: PageDriver + ?Sized>(
    driver: &mut D,
    index: usize,
    step: &Step,
    finding: &mut StepFinding,
    options: &ImproveOptions,
    log: &mut DiagnosticLog,
) -> Step {
    let Some(target) = step.target() else {
        return step.clone();
    };
    let set = generate_candidates(target);

    let mut match_counts = Vec::with_capacity(set.candidates.len());
    for candidate in &set.candidates {
        match driver
            .resolve_target(&candidate.target, options.step_timeout_ms)
            .await
        {
            Ok(resolved) => match_counts.push(Some(resolved.match_count)),
            Err(err) => {
                log.warn(
                    codes::TARGET_RESOLUTION_FAILED,
                    index,
                    format!("could not count matches for {}: {err}", candidate.target.value),
                );
                match_counts.push(None);
            }
        }
    }

    if let Some(repair) = &set.repair {
        finding.volatile_signals = repair.signals.iter().copied().collect();
        log.warn(codes::SELECTOR_TARGET_FLAGGED_VOLATILE, index, repair.message());
    }

    let scores = score_candidates(set.candidates, &match_counts);
    let current_score = scores.first().map(|s| s.score);
    finding.original_score = current_score;
    let mut effective = step.clone();
    if let (Some(best), Some(current)) = (select_best(&scores), current_score) {
        let best_entry = &scores[best];
        finding.recommended_target = Some(best_entry.candidate.target.clone());
        finding.recommended_score = Some(best_entry.score);
        if options.apply_selectors
            && is_auto_applicable(best_entry, current, options.tolerate_ambiguous_matches)
        {
            log.info(
                codes::SELECTOR_APPLIED,
                index,
                format!(
                    "{} -> {} ({current:.2} -> {:.2})",
                    target.value, best_entry.candidate.target.value, best_entry.score
                ),
            );
            effective = step.with_target(best_entry.candidate.target.clone());
            finding.changed = true;
        }
    }
    finding.candidates = scores;
    effective
}

/// Run the selector pass over the recorded steps
pub async fn run_selector_pass<D: PageDriver + ?Sized>(
    driver: &mut D,
    steps: &[Step],
    options: &ImproveOptions,
    log: &mut DiagnosticLog,
) -> ImproveResult<SelectorPassOutput> {
    driver.reset().await?;
    let run_options = options.step_run_options();
    let mut output = SelectorPassOutput::default();
    let mut executed: Vec<Step> = Vec::with_capacity(steps.len());

    for (index, step) in steps.iter().enumerate() {
        tracing::debug!(index, step = %step, "selector pass step");
        let mut finding = StepFinding::new(index, step);

        let pre = capture(driver, index, "pre", options, log).await;
        let pre_url = driver.current_url().await;
        let pre_title = driver.title().await;

        let effective = analyze_target(driver, index, step, &mut finding, options, log).await;

        let played = play_step(
            driver,
            index,
            &effective,
            &run_options,
            options.network_idle_timeout_ms,
            log,
        )
        .await;

        if let Some(error) = played.error {
            let action = FailureAction::for_kind(step.kind());
            log.error(
                codes::SELECTOR_REPLAY_FAILED,
                index,
                format!("{} failed during replay: {error}", step.kind()),
            );
            finding.replay_error = Some(error);
            finding.failure_action = Some(action);
            output.failed_steps.push(index);
        } else if let (Some(pre), Some(post)) =
            (pre, capture(driver, index, "post", options, log).await)
        {
            let post_url = driver.current_url().await;
            let post_title = driver.title().await;
            output.snapshots.push(
                StepSnapshot::new(index, effective.clone(), pre, post)
                    .with_urls(pre_url, post_url)
                    .with_titles(pre_title, post_title),
            );
        }

        executed.push(effective);
        output.findings.push(finding);
    }

    let mut index_map = StepIndexMap::identity(executed.len());
    let mut kept = Vec::with_capacity(executed.len());
    for (index, step) in executed.into_iter().enumerate() {
        let action = output.findings[index].failure_action;
        match action {
            Some(FailureAction::Remove) if options.apply_selectors => {
                log.info(codes::STEP_REMOVED, index, format!("removed failing {}", step.kind()));
                index_map.remove_original(index);
            }
            Some(FailureAction::Optionalize) if options.apply_selectors => {
                log.info(
                    codes::STEP_OPTIONALIZED,
                    index,
                    format!("kept failing {} as optional", step.kind()),
                );
                kept.push(step.optionalized());
            }
            _ => kept.push(step),
        }
    }
    output.steps = kept;
    output.index_map = index_map;

    tracing::info!(
        steps = steps.len(),
        failed = output.failed_steps.len(),
        changed = output.findings.iter().filter(|f| f.changed).count(),
        "selector pass finished"
    );
    Ok(output)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::driver::{PageState, ScriptedPage};
    use crate::target::TargetKind;

    fn page() -> ScriptedPage {
        ScriptedPage::new(vec![
            PageState::new(
                "https://shop.test/",
                "Shop",
                "- main:\n  - button \"Add to cart\"\n  - link \"Help\"",
            ),
            PageState::new(
                "https://shop.test/",
                "Shop",
                "- main:\n  - button \"Add to cart\"\n  - link \"Help\"\n  - status \"1 item in cart\"",
            ),
        ])
    }

    #[test]
    fn test_failure_classification() {
        assert_eq!(FailureAction::for_kind(ActionKind::AssertText), FailureAction::Remove);
        assert_eq!(FailureAction::for_kind(ActionKind::Click), FailureAction::Optionalize);
        assert_eq!(FailureAction::for_kind(ActionKind::Navigate), FailureAction::Keep);
    }

    #[tokio::test]
    async fn test_adopts_test_id_locator() {
        let steps = vec![
            Step::navigate("https://shop.test/"),
            Step::click(Target::css("[data-testid=\"add\"]")),
        ];
        let mut driver = page();
        let mut log = DiagnosticLog::new();
        let options = ImproveOptions::new().with_apply_selectors(true);
        let output = run_selector_pass(&mut driver, &steps, &options, &mut log).await.unwrap();

        let finding = &output.findings[1];
        assert!(finding.changed);
        assert!(finding.is_improvement());
        let adopted = output.steps[1].target().unwrap();
        assert_eq!(adopted.kind, TargetKind::LocatorExpression);
        assert_eq!(adopted.value, "getByTestId('add')");
        assert_eq!(output.snapshots.len(), 2);
        assert_eq!(log.with_code(codes::SELECTOR_APPLIED).count(), 1);
    }

    #[tokio::test]
    async fn test_recommendation_without_apply() {
        let steps = vec![
            Step::navigate("https://shop.test/"),
            Step::click(Target::css("[data-testid=\"add\"]")),
        ];
        let mut log = DiagnosticLog::new();
        let output = run_selector_pass(&mut page(), &steps, &ImproveOptions::new(), &mut log)
            .await
            .unwrap();
        assert!(!output.findings[1].changed);
        assert!(output.findings[1].recommended_target.is_some());
        assert_eq!(output.steps, steps);
    }

    #[tokio::test]
    async fn test_ambiguous_candidate_not_adopted() {
        let steps = vec![
            Step::navigate("https://shop.test/"),
            Step::click(Target::css("[data-testid=\"add\"]")),
        ];
        let mut driver = page().with_match_count("getByTestId('add')", 2);
        let mut log = DiagnosticLog::new();
        let options = ImproveOptions::new().with_apply_selectors(true);
        let output = run_selector_pass(&mut driver, &steps, &options, &mut log).await.unwrap();
        assert!(!output.findings[1].changed);
        assert!(output.findings[1].candidates[1]
            .reason_codes
            .iter()
            .any(|r| r == "ambiguous_match"));
    }

    #[tokio::test]
    async fn test_failed_steps_classified_when_applying() {
        let steps = vec![
            Step::navigate("https://shop.test/"),
            Step::click(Target::css("#promo")),
            Step::assert_text(Target::css("#banner"), "Sale"),
            Step::click(Target::css("#add")),
        ];
        let mut driver = page()
            .with_failure("#promo", "element not found")
            .with_failure("#banner", "element not found");
        let mut log = DiagnosticLog::new();
        let options = ImproveOptions::new().with_apply_selectors(true);
        let output = run_selector_pass(&mut driver, &steps, &options, &mut log).await.unwrap();

        assert_eq!(output.failed_steps, vec![1, 2]);
        assert_eq!(output.steps.len(), 3);
        assert!(output.steps[1].optional);
        assert_eq!(output.index_map.runtime_of(2), None);
        assert_eq!(output.index_map.runtime_of(3), Some(2));
        assert!(output.snapshot_for(1).is_none());
        assert!(output.snapshot_for(3).is_some());
        assert_eq!(log.with_code(codes::STEP_REMOVED).count(), 1);
        assert_eq!(log.with_code(codes::STEP_OPTIONALIZED).count(), 1);
    }

    #[tokio::test]
    async fn test_failed_steps_untouched_without_apply() {
        let steps = vec![
            Step::navigate("https://shop.test/"),
            Step::assert_text(Target::css("#banner"), "Sale"),
        ];
        let mut driver = page().with_failure("#banner", "element not found");
        let mut log = DiagnosticLog::new();
        let output = run_selector_pass(&mut driver, &steps, &ImproveOptions::new(), &mut log)
            .await
            .unwrap();
        assert_eq!(output.steps, steps);
        assert_eq!(output.findings[1].failure_action, Some(FailureAction::Remove));
    }

    #[tokio::test]
    async fn test_snapshot_failure_is_warning() {
        let steps = vec![
            Step::navigate("https://shop.test/"),
            Step::click(Target::css("#add")),
        ];
        let mut driver = page().with_snapshot_failure(1);
        let mut log = DiagnosticLog::new();
        let output = run_selector_pass(&mut driver, &steps, &ImproveOptions::new(), &mut log)
            .await
            .unwrap();
        assert!(output.failed_steps.is_empty());
        assert!(output.snapshot_for(1).is_none());
        assert!(log.with_code(codes::SNAPSHOT_CAPTURE_FAILED).count() >= 1);
    }
}
