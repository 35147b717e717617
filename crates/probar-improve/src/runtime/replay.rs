//! Playing single steps against the page.

use crate::driver::{is_overlay_interception, PageDriver, StepRunOptions};
use crate::result::ImproveResult;
use crate::step::{ActionKind, Step};
use crate::tracing_support::{codes, DiagnosticLog};

/// Outcome of playing one step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayedStep {
    /// Failure message when the step threw
    pub error: Option<String>,
    /// Whether the network-idle wait after the step timed out
    pub idle_timed_out: bool,
}

impl PlayedStep {
    /// Whether the step executed without error
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Execute a step, dismissing overlays and retrying once when a click or key
/// press is intercepted
pub async fn execute_with_overlay_retry<D: PageDriver + ?Sized>(
    driver: &mut D,
    index: usize,
    step: &Step,
    options: &StepRunOptions,
    log: &mut DiagnosticLog,
) -> ImproveResult<()> {
    let first = driver.execute_step(step, options).await;
    let Err(err) = first else {
        return Ok(());
    };
    if !matches!(step.kind(), ActionKind::Click | ActionKind::Press)
        || !is_overlay_interception(&err.to_string())
    {
        return Err(err);
    }
    if !driver.dismiss_overlays().await? {
        return Err(err);
    }
    log.info(
        codes::OVERLAY_DISMISSED,
        index,
        format!("overlay intercepted {}; dismissed and retried", step.kind()),
    );
    driver.execute_step(step, options).await
}

/// Play a step and wait for the network to settle.
///
/// Failures are returned in the outcome, never raised. An idle timeout is
/// recorded as a warning.
pub async fn play_step<D: PageDriver + ?Sized>(
    driver: &mut D,
    index: usize,
    step: &Step,
    options: &StepRunOptions,
    idle_timeout_ms: u64,
    log: &mut DiagnosticLog,
) -> PlayedStep {
    if let Err(err) = execute_with_overlay_retry(driver, index, step, options, log).await {
        return PlayedStep {
            error: Some(err.to_string()),
            idle_timed_out: false,
        };
    }
    let idle_timed_out = driver.wait_for_network_idle(idle_timeout_ms).await;
    if idle_timed_out {
        log.warn(
            codes::NETWORK_IDLE_TIMEOUT,
            index,
            format!("network did not go idle within {idle_timeout_ms}ms after {}", step.kind()),
        );
    }
    PlayedStep {
        error: None,
        idle_timed_out,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::driver::{PageState, ScriptedPage};
    use crate::target::Target;

    fn driver() -> ScriptedPage {
        ScriptedPage::new(vec![
            PageState::new("https://a.test/", "A", "- heading \"A\""),
            PageState::new("https://a.test/b", "B", "- heading \"B\""),
        ])
    }

    #[tokio::test]
    async fn test_overlay_retry_happens_once() {
        let mut page = driver().with_overlays(1);
        let mut log = DiagnosticLog::new();
        let options = StepRunOptions::analysis(1000, None);
        let played = play_step(&mut page, 0, &Step::click(Target::css("#go")), &options, 500, &mut log).await;
        assert!(played.succeeded());
        assert_eq!(page.call_count("dismiss_overlays"), 1);
        assert_eq!(page.call_count("execute:"), 2);
        assert_eq!(log.with_code(codes::OVERLAY_DISMISSED).count(), 1);
    }

    #[tokio::test]
    async fn test_fill_is_not_retried() {
        let mut page = driver().with_failure("#q", "element intercepts pointer events");
        let mut log = DiagnosticLog::new();
        let options = StepRunOptions::analysis(1000, None);
        let played = play_step(&mut page, 0, &Step::fill(Target::css("#q"), "x"), &options, 500, &mut log).await;
        assert!(!played.succeeded());
        assert!(!page.was_called("dismiss_overlays"));
        assert!(!page.was_called("network_idle"));
    }

    #[tokio::test]
    async fn test_idle_timeout_is_warning() {
        let mut page = driver().with_idle_timeout(1);
        let mut log = DiagnosticLog::new();
        let options = StepRunOptions::analysis(1000, None);
        let played = play_step(&mut page, 3, &Step::click(Target::css("#go")), &options, 500, &mut log).await;
        assert!(played.succeeded());
        assert!(played.idle_timed_out);
        let warning = log.with_code(codes::NETWORK_IDLE_TIMEOUT).next().unwrap();
        assert_eq!(warning.step_index, Some(3));
    }
}
