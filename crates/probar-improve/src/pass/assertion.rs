//! Assertion pass.
//!
//! Builds candidates for every surviving step, plans coverage, applies the
//! policy, validates the selection on the live page and inserts the applied
//! assertions right after their source steps.

use crate::assertion::{
    build_deterministic_candidates, build_inventory_candidates, build_snapshot_candidates,
    dedupe_candidates, needs_inventory, ApplyStatus, AssertionCandidate, DeterministicSkip,
};
use crate::config::ImproveOptions;
use crate::coverage::{plan_coverage, CoveragePlan};
use crate::driver::PageDriver;
use crate::index_map::StepIndexMap;
use crate::policy::select_for_validation;
use crate::result::ImproveResult;
use crate::runtime::validate_candidates;
use crate::snapshot::StepSnapshot;
use crate::step::Step;
use crate::tracing_support::{codes, DiagnosticLog};

/// Steps and candidates produced by the assertion pass
#[derive(Debug, Clone, Default)]
pub struct AssertionPassOutput {
    /// Steps with applied assertions inserted
    pub steps: Vec<Step>,
    /// Runtime ↔ original index map for `steps`
    pub index_map: StepIndexMap,
    /// Coverage plan; its candidates carry their final statuses
    pub plan: CoveragePlan,
    /// Deterministic assertions deliberately not proposed
    pub deterministic_skips: Vec<DeterministicSkip>,
    /// Number of assertions inserted
    pub inserted: usize,
}

/// Propose candidates for every original step still present
#[must_use]
pub fn build_candidates(
    steps: &[(usize, Step)],
    snapshots: &[StepSnapshot],
    options: &ImproveOptions,
) -> (Vec<AssertionCandidate>, Vec<DeterministicSkip>) {
    let source = options.assertion_source;
    let policy = options.policy.config();
    let snapshot_for = |index: usize| snapshots.iter().find(|s| s.index == index);

    let mut candidates = Vec::new();
    let mut skips = Vec::new();
    for (index, step) in steps {
        let (deterministic, skip) = build_deterministic_candidates(*index, step);
        candidates.extend(deterministic);
        skips.extend(skip);
        if !source.uses_snapshots() {
            continue;
        }
        if let Some(snapshot) = snapshot_for(*index) {
            candidates.extend(build_snapshot_candidates(
                snapshot,
                source,
                policy.snapshot_cap(step.kind()),
            ));
        }
    }

    if source.uses_snapshots() {
        let mut inventory = Vec::new();
        for (index, step) in steps {
            if !needs_inventory(step, *index, &candidates) {
                continue;
            }
            if let Some(snapshot) = snapshot_for(*index) {
                inventory.extend(build_inventory_candidates(snapshot, source, &candidates));
            }
        }
        candidates.extend(inventory);
    }
    (dedupe_candidates(candidates), skips)
}

/// Run the assertion pass over the selector pass's output
pub async fn run_assertion_pass<D: PageDriver + ?Sized>(
    driver: &mut D,
    mut steps: Vec<Step>,
    mut index_map: StepIndexMap,
    snapshots: &[StepSnapshot],
    options: &ImproveOptions,
    log: &mut DiagnosticLog,
) -> ImproveResult<AssertionPassOutput> {
    let indexed: Vec<(usize, Step)> = steps
        .iter()
        .enumerate()
        .filter_map(|(runtime, step)| index_map.original_of(runtime).map(|o| (o, step.clone())))
        .collect();

    let (candidates, deterministic_skips) = build_candidates(&indexed, snapshots, options);
    let mut plan = plan_coverage(&indexed, candidates);
    for &position in &plan.fallback_candidate_indexes {
        let fallback = &plan.candidates[position];
        log.info(
            codes::COVERAGE_FALLBACK,
            fallback.index,
            format!("no qualifying assertion after {}; {}", fallback.after_action, fallback.candidate),
        );
    }

    let policy = options.policy.config();
    let selected = select_for_validation(
        &mut plan.candidates,
        &policy,
        &plan.required_candidate_indexes,
    );
    tracing::debug!(
        candidates = plan.candidates.len(),
        selected = selected.len(),
        policy = %options.policy,
        "assertion candidates selected"
    );

    let mut inserted = 0;
    if options.apply_assertions {
        validate_candidates(
            driver,
            &steps,
            &index_map,
            &mut plan.candidates,
            &selected,
            options,
            log,
        )
        .await?;

        let mut applied: Vec<&AssertionCandidate> = plan
            .candidates
            .iter()
            .filter(|c| c.apply_status == Some(ApplyStatus::Applied))
            .collect();
        applied.sort_by_key(|c| c.index);
        for candidate in applied {
            let Some(end) = index_map.block_end(candidate.index) else {
                continue;
            };
            let at = index_map.insert_after(end);
            steps.insert(at, candidate.candidate.clone());
            inserted += 1;
        }
    }

    tracing::info!(
        covered = plan.covered_steps,
        fallbacks = plan.fallback_candidate_indexes.len(),
        inserted,
        "assertion pass finished"
    );
    Ok(AssertionPassOutput {
        steps,
        index_map,
        plan,
        deterministic_skips,
        inserted,
    })
}
