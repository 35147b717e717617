//! Entry point: run both passes over one recorded test.

use serde::{Deserialize, Serialize};

use crate::config::ImproveOptions;
use crate::driver::PageDriver;
use crate::pass::{run_assertion_pass, run_selector_pass};
use crate::report::{ImproveReport, ImproveSummary, StepCounts};
use crate::result::ImproveResult;
use crate::step::Step;
use crate::tracing_support::DiagnosticLog;

/// Improved steps and the run's report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImproveOutcome {
    /// Improved step sequence
    pub steps: Vec<Step>,
    /// Report of the run
    pub report: ImproveReport,
}

/// Improve a recorded test against a live page.
///
/// Options are validated first; invalid options fail before the page is
/// touched. Replay failures and soft degradations end up in the report's
/// diagnostics rather than failing the run.
pub async fn improve_steps<D: PageDriver + ?Sized>(
    driver: &mut D,
    steps: &[Step],
    options: &ImproveOptions,
) -> ImproveResult<ImproveOutcome> {
    options.validate()?;
    tracing::info!(
        steps = steps.len(),
        policy = %options.policy,
        source = %options.assertion_source,
        apply_selectors = options.apply_selectors,
        apply_assertions = options.apply_assertions,
        "improving test"
    );
    let mut log = DiagnosticLog::new();

    let selector = run_selector_pass(driver, steps, options, &mut log).await?;
    let assertion = run_assertion_pass(
        driver,
        selector.steps,
        selector.index_map,
        &selector.snapshots,
        options,
        &mut log,
    )
    .await?;

    let counts = StepCounts {
        total: steps.len(),
        output: assertion.steps.len(),
        covered: assertion.plan.covered_steps,
        fallbacks: assertion.plan.fallback_candidate_indexes.len(),
    };
    let summary = ImproveSummary::compute(
        counts,
        &selector.findings,
        &assertion.plan.candidates,
        options.apply_selectors,
    );
    let report = ImproveReport::new(
        options.policy,
        options.assertion_source,
        selector.findings,
        assertion.plan.candidates,
        assertion.plan.required_candidate_indexes,
        assertion.deterministic_skips,
        log.into_entries(),
        summary,
    );
    tracing::info!(
        run_id = %report.run_id,
        applied = report.summary.assertions_applied,
        selectors_applied = report.summary.selectors_applied,
        "improvement finished"
    );
    Ok(ImproveOutcome {
        steps: assertion.steps,
        report,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::driver::{PageState, ScriptedPage};
    use crate::result::ImproveError;
    use crate::target::Target;

    #[tokio::test]
    async fn test_invalid_options_fail_before_driver() {
        let mut driver = ScriptedPage::new(vec![PageState::new("https://a.test/", "A", "")]);
        let options = ImproveOptions::new().with_step_timeout_ms(0);
        let err = improve_steps(&mut driver, &[Step::navigate("/")], &options)
            .await
            .unwrap_err();
        assert!(matches!(err, ImproveError::InvalidConfig { .. }));
        assert!(driver.history().is_empty());
    }

    #[tokio::test]
    async fn test_report_only_run_leaves_steps() {
        let mut driver = ScriptedPage::new(vec![
            PageState::new("https://a.test/", "A", "- button \"Go\""),
            PageState::new("https://a.test/", "A", "- button \"Go\"\n- alert \"Saved\""),
        ]);
        let steps = vec![
            Step::navigate("https://a.test/"),
            Step::click(Target::css("#go")),
        ];
        let outcome = improve_steps(&mut driver, &steps, &ImproveOptions::new())
            .await
            .unwrap();
        assert_eq!(outcome.steps, steps);
        assert_eq!(outcome.report.summary.total_steps, 2);
        assert_eq!(outcome.report.summary.covered_steps, 1);
        assert_eq!(outcome.report.summary.assertions_applied, 0);
        assert_eq!(outcome.report.step_findings.len(), 2);
    }
}
