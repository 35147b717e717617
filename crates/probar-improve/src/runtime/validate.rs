//! Runtime validation of selected assertion candidates.
//!
//! The step sequence is replayed from a fresh page in analysis mode. Right
//! after each source step has played and the network has settled, that
//! step's selected candidates are executed in playback mode, best-ranked
//! first. The first one that holds is applied; the rest of that step's
//! candidates are skipped. A failing optional step only skips its own
//! candidates; any other replay failure ends validation.

use std::collections::BTreeMap;

use super::replay::play_step;
use crate::assertion::{ApplyStatus, AssertionCandidate};
use crate::config::ImproveOptions;
use crate::driver::PageDriver;
use crate::index_map::StepIndexMap;
use crate::result::ImproveResult;
use crate::step::Step;
use crate::tracing_support::{codes, DiagnosticLog};

/// Status counts after validation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationSummary {
    /// Candidates applied
    pub applied: usize,
    /// Candidates skipped for any reason during validation
    pub skipped: usize,
    /// Runtime index at which replay failed
    pub replay_failed_at: Option<usize>,
}

/// Whether an equivalent assertion already sits at `runtime` or right after it
#[must_use]
pub fn has_adjacent_equivalent(steps: &[Step], runtime: usize, candidate: &AssertionCandidate) -> bool {
    let key = candidate.candidate.action.equivalence_key();
    let end = (runtime + 2).min(steps.len());
    steps
        .get(runtime..end)
        .is_some_and(|window| window.iter().any(|s| s.action.equivalence_key() == key))
}

/// Validate the candidates at `selected` positions against the live page.
///
/// `selected` must list each step's candidates in rank order. Every selected
/// candidate ends with a status.
pub async fn validate_candidates<D: PageDriver + ?Sized>(
    driver: &mut D,
    steps: &[Step],
    index_map: &StepIndexMap,
    candidates: &mut [AssertionCandidate],
    selected: &[usize],
    options: &ImproveOptions,
    log: &mut DiagnosticLog,
) -> ImproveResult<ValidationSummary> {
    let mut summary = ValidationSummary::default();
    if selected.is_empty() {
        return Ok(summary);
    }

    let mut pending: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for &position in selected {
        pending.entry(candidates[position].index).or_default().push(position);
    }

    driver.reset().await?;
    let analysis = options.step_run_options();
    let playback = analysis.playback();
    let mut failure: Option<String> = None;

    for (runtime, step) in steps.iter().enumerate() {
        let original = index_map.original_of(runtime);
        let index = original.unwrap_or(runtime);
        let played = play_step(
            driver,
            index,
            step,
            &analysis,
            options.network_idle_timeout_ms,
            log,
        )
        .await;
        if let Some(error) = played.error {
            if step.optional {
                log.warn(
                    codes::OPTIONAL_STEP_FAILED,
                    index,
                    format!("optional {} failed during validation: {error}", step.kind()),
                );
                let skipped = original.and_then(|o| pending.remove(&o)).unwrap_or_default();
                for position in skipped {
                    candidates[position].set_status(
                        ApplyStatus::SkippedRuntimeFailure,
                        format!("optional step {index} failed: {error}"),
                    );
                    summary.skipped += 1;
                }
                continue;
            }
            log.warn(
                codes::ASSERTION_REPLAY_FAILED,
                index,
                format!("replay failed before validation: {error}"),
            );
            summary.replay_failed_at = Some(runtime);
            failure = Some(format!("replay failed at step {index}: {error}"));
            break;
        }

        let Some(positions) = original.and_then(|o| pending.remove(&o)) else {
            continue;
        };
        let mut applied = false;
        for position in positions {
            let candidate = &mut candidates[position];
            if has_adjacent_equivalent(steps, runtime, candidate) {
                candidate.set_status(
                    ApplyStatus::SkippedExisting,
                    "equivalent assertion already present",
                );
            } else if applied {
                candidate.set_status(
                    ApplyStatus::SkippedPolicy,
                    "another candidate was applied after this step",
                );
            } else if played.idle_timed_out {
                candidate.set_status(
                    ApplyStatus::SkippedRuntimeFailure,
                    "network idle wait timed out after source step",
                );
            } else {
                match driver.execute_step(&candidate.candidate, &playback).await {
                    Ok(()) => {
                        candidate.set_status(ApplyStatus::Applied, "validated against live page");
                        applied = true;
                    }
                    Err(err) => {
                        tracing::debug!(index, error = %err, "assertion candidate failed");
                        candidate.set_status(ApplyStatus::SkippedRuntimeFailure, err.to_string());
                    }
                }
            }
            if candidate.apply_status == Some(ApplyStatus::Applied) {
                summary.applied += 1;
            } else {
                summary.skipped += 1;
            }
        }
    }

    let reason = failure.unwrap_or_else(|| "source step not present in replay".to_string());
    for position in pending.into_values().flatten() {
        candidates[position].set_status(ApplyStatus::SkippedRuntimeFailure, reason.clone());
        summary.skipped += 1;
    }
    tracing::info!(
        applied = summary.applied,
        skipped = summary.skipped,
        "assertion validation finished"
    );
    Ok(summary)
}
