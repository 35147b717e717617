//! Inventory fallback: mine the whole post-step tree when a step has no real candidate.
//!
//! Inventory candidates only ever supplement. They are tagged as coverage
//! fallbacks and never displace a non-fallback candidate of the same step.

use super::snapshot::{text_assertions, visible_assertions};
use super::{target_text, AssertionCandidate, CandidateSource};
use crate::snapshot::StepSnapshot;
use crate::step::{Action, Step};

/// Maximum inventory candidates per step
pub const MAX_INVENTORY_CANDIDATES: usize = 2;

/// Confidence of an inventory text assertion
pub const INVENTORY_TEXT_CONFIDENCE: f64 = 0.6;

/// Confidence of an inventory visibility assertion
pub const INVENTORY_VISIBLE_CONFIDENCE: f64 = 0.55;

/// Whether an interaction step at `index` still lacks a non-fallback candidate
#[must_use]
pub fn needs_inventory(step: &Step, index: usize, candidates: &[AssertionCandidate]) -> bool {
    step.kind().is_interaction()
        && !candidates
            .iter()
            .any(|c| c.index == index && !c.coverage_fallback)
}

/// Fallback candidates from the full post-step snapshot
#[must_use]
pub fn build_inventory_candidates(
    snapshot: &StepSnapshot,
    source: CandidateSource,
    existing: &[AssertionCandidate],
) -> Vec<AssertionCandidate> {
    let index = snapshot.index;
    let after = snapshot.step.kind();
    let excluded = snapshot.step.target().and_then(target_text);
    let excluded = excluded.as_deref();
    let nodes = snapshot.post_nodes();

    let taken: Vec<String> = existing
        .iter()
        .filter(|c| c.index == index)
        .filter_map(|c| c.candidate.target().map(|t| t.value.clone()))
        .collect();

    let mut out = Vec::new();
    let texts = text_assertions(
        nodes.iter().filter(|n| {
            !taken.contains(&super::snapshot::node_target(n).value)
        }),
        excluded,
        MAX_INVENTORY_CANDIDATES,
    );
    let mut covered = taken.clone();
    for (target, text, _, node) in texts {
        covered.push(target.value.clone());
        out.push(
            AssertionCandidate::new(
                index,
                after,
                Step::new(Action::AssertText { target, text }),
                INVENTORY_TEXT_CONFIDENCE,
                format!("{} present after {after} (inventory)", node.role),
                source,
            )
            .as_fallback(),
        );
    }

    let remaining = MAX_INVENTORY_CANDIDATES.saturating_sub(out.len());
    for (target, _) in visible_assertions(nodes.iter(), excluded, &covered, remaining) {
        out.push(
            AssertionCandidate::new(
                index,
                after,
                Step::new(Action::AssertVisible { target }),
                INVENTORY_VISIBLE_CONFIDENCE,
                format!("element present after {after} (inventory)"),
                source,
            )
            .as_fallback(),
        );
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::assertion::build_deterministic_candidates;
    use crate::step::ActionKind;
    use crate::target::Target;

    const PAGE: &str = "- banner:\n  - heading \"Shop\"\n  - button \"Cart\"\n  - link \"Help\"";

    #[test]
    fn test_click_with_only_fallback_needs_inventory() {
        let step = Step::click(Target::css("#cart"));
        let (deterministic, _) = build_deterministic_candidates(1, &step);
        assert!(needs_inventory(&step, 1, &deterministic));
    }

    #[test]
    fn test_fill_never_needs_inventory() {
        let step = Step::fill(Target::css("#q"), "x");
        let (deterministic, _) = build_deterministic_candidates(0, &step);
        assert!(!needs_inventory(&step, 0, &deterministic));
        assert!(!needs_inventory(&Step::navigate("/"), 0, &[]));
    }

    #[test]
    fn test_inventory_mines_unchanged_tree() {
        let step = Step::click(Target::css("#noop"));
        let snapshot = StepSnapshot::new(1, step, PAGE, PAGE);
        let candidates = build_inventory_candidates(&snapshot, CandidateSource::SnapshotNative, &[]);
        assert_eq!(candidates.len(), 2);
        assert!(candidates.iter().all(|c| c.coverage_fallback));
        assert_eq!(candidates[0].kind(), ActionKind::AssertText);
        assert_eq!(candidates[0].confidence, INVENTORY_TEXT_CONFIDENCE);
        assert_eq!(candidates[0].candidate.action.payload().as_deref(), Some("Shop"));
        assert_eq!(candidates[1].candidate.action.payload().as_deref(), Some("Help"));
    }

    #[test]
    fn test_inventory_skips_acted_target_and_existing() {
        let step = Step::click(Target::expression("getByRole('link', { name: 'Help' })"));
        let snapshot = StepSnapshot::new(1, step, PAGE, PAGE);
        let existing = vec![AssertionCandidate::new(
            1,
            ActionKind::Click,
            Step::assert_text(
                Target::expression("getByRole('heading', { name: 'Shop' })")
                    .with_source(crate::target::TargetSource::Derived),
                "Shop",
            ),
            0.82,
            "existing",
            CandidateSource::SnapshotNative,
        )];
        let candidates =
            build_inventory_candidates(&snapshot, CandidateSource::SnapshotNative, &existing);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].kind(), ActionKind::AssertVisible);
        assert_eq!(
            candidates[0].candidate.target().unwrap().value,
            "getByRole('button', { name: 'Cart' })"
        );
        assert_eq!(candidates[0].confidence, INVENTORY_VISIBLE_CONFIDENCE);
    }
}
