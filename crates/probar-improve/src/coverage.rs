//! Coverage planning.
//!
//! Every non-navigate step gets exactly one required candidate. When no
//! proposed candidate qualifies, a fallback is synthesized from the step
//! itself and appended, so `required_candidate_indexes.len()` always equals
//! `covered_steps`.

use serde::{Deserialize, Serialize};

use crate::assertion::{AssertionCandidate, CandidateSource};
use crate::step::{Action, ActionKind, Step};

/// Confidence of a synthesized same-target visibility fallback
pub const SYNTHESIZED_CONFIDENCE: f64 = 0.5;

/// Confidence of a fallback that restates an existing assertion step
pub const RESTATED_CONFIDENCE: f64 = 1.0;

/// Candidates with one required entry per covered step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoveragePlan {
    /// Input candidates followed by synthesized fallbacks
    pub candidates: Vec<AssertionCandidate>,
    /// Position in `candidates` of each covered step's required candidate
    pub required_candidate_indexes: Vec<usize>,
    /// Positions of synthesized fallbacks
    pub fallback_candidate_indexes: Vec<usize>,
    /// Number of non-navigate steps
    pub covered_steps: usize,
}

impl CoveragePlan {
    /// Whether the candidate at `position` was synthesized
    #[must_use]
    pub fn is_synthesized(&self, position: usize) -> bool {
        self.fallback_candidate_indexes.contains(&position)
    }
}

/// Plan coverage over `(original index, step)` pairs
#[must_use]
pub fn plan_coverage(steps: &[(usize, Step)], candidates: Vec<AssertionCandidate>) -> CoveragePlan {
    let mut plan = CoveragePlan {
        candidates,
        ..CoveragePlan::default()
    };

    for (index, step) in steps {
        if step.kind() == ActionKind::Navigate {
            continue;
        }
        plan.covered_steps += 1;
        let required = match preferred_candidate(*index, step, &plan.candidates) {
            Some(position) => position,
            None => {
                let fallback = synthesize_fallback(*index, step);
                tracing::debug!(index, kind = %step.kind(), "synthesized coverage fallback");
                plan.candidates.push(fallback);
                let position = plan.candidates.len() - 1;
                plan.fallback_candidate_indexes.push(position);
                position
            }
        };
        plan.required_candidate_indexes.push(required);
    }
    plan
}

fn on_acted_target(step: &Step, candidate: &AssertionCandidate) -> bool {
    match (step.target(), candidate.candidate.target()) {
        (Some(acted), Some(asserted)) => acted.normalized_value() == asserted.normalized_value(),
        _ => false,
    }
}

/// Highest-confidence candidate among `positions`, earliest on ties
fn best_of(candidates: &[AssertionCandidate], positions: impl Iterator<Item = usize>) -> Option<usize> {
    positions.fold(None, |best: Option<usize>, position| match best {
        Some(b) if candidates[b].confidence >= candidates[position].confidence => Some(b),
        _ => Some(position),
    })
}

/// Best candidate of step `index` satisfying `pred`
fn best_matching(
    candidates: &[AssertionCandidate],
    index: usize,
    pred: impl Fn(&AssertionCandidate) -> bool,
) -> Option<usize> {
    best_of(
        candidates,
        candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.index == index && pred(*c))
            .map(|(i, _)| i),
    )
}

fn preferred_candidate(index: usize, step: &Step, candidates: &[AssertionCandidate]) -> Option<usize> {
    let find = |pred: fn(&Step, &AssertionCandidate) -> bool| {
        best_matching(candidates, index, |c| pred(step, c))
    };

    match step.kind() {
        ActionKind::Fill | ActionKind::Select => {
            find(|s, c| c.kind() == ActionKind::AssertValue && on_acted_target(s, c))
        }
        ActionKind::Check | ActionKind::Uncheck => {
            find(|s, c| c.kind() == ActionKind::AssertChecked && on_acted_target(s, c))
        }
        ActionKind::Click | ActionKind::Press | ActionKind::Hover => {
            find(|s, c| c.kind() == ActionKind::AssertText && !on_acted_target(s, c))
                .or_else(|| {
                    find(|s, c| c.kind() == ActionKind::AssertVisible && !on_acted_target(s, c))
                })
                .or_else(|| find(|_, c| c.kind() == ActionKind::AssertVisible))
        }
        ActionKind::AssertVisible
        | ActionKind::AssertText
        | ActionKind::AssertValue
        | ActionKind::AssertChecked
        | ActionKind::AssertEnabled
        | ActionKind::AssertUrl
        | ActionKind::AssertTitle => find(|s, c| {
            c.candidate.action.equivalence_key() == s.action.equivalence_key()
        }),
        ActionKind::Navigate => None,
    }
}

/// A same-target visibility check, or a restatement of an assertion step
fn synthesize_fallback(index: usize, step: &Step) -> AssertionCandidate {
    let after = step.kind();
    if after.is_assertion() {
        return AssertionCandidate::new(
            index,
            after,
            Step::new(step.action.clone()),
            RESTATED_CONFIDENCE,
            "existing assertion step provides coverage",
            CandidateSource::Deterministic,
        )
        .as_fallback();
    }
    let action = match step.target() {
        Some(target) => Action::AssertVisible {
            target: target.clone(),
        },
        None => step.action.clone(),
    };
    AssertionCandidate::new(
        index,
        after,
        Step::new(action),
        SYNTHESIZED_CONFIDENCE,
        "no qualifying assertion; acted-on element visibility used for coverage",
        CandidateSource::Deterministic,
    )
    .as_fallback()
}


#[cfg(test)]
mod proptest_tests {
    use super::*;
    use crate::target::Target;
    use proptest::prelude::*;

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            Just(Step::navigate("/")),
            "[a-z]{1,6}".prop_map(|s| Step::click(Target::css(format!("#{s}")))),
            "[a-z]{1,6}".prop_map(|s| Step::fill(Target::css(format!("#{s}")), s)),
            "[a-z]{1,6}".prop_map(|s| Step::assert_visible(Target::css(format!("#{s}")))),
        ]
    }

    proptest! {
        /// One required candidate per covered step, for any input
        #[test]
        fn prop_required_matches_covered(steps in prop::collection::vec(step(), 0..12), seed_count in 0usize..6) {
            let indexed: Vec<(usize, Step)> = steps.into_iter().enumerate().collect();
            let candidates: Vec<AssertionCandidate> = indexed
                .iter()
                .take(seed_count)
                .flat_map(|(i, s)| crate::assertion::build_deterministic_candidates(*i, s).0)
                .collect();
            let plan = plan_coverage(&indexed, candidates);
            prop_assert_eq!(plan.required_candidate_indexes.len(), plan.covered_steps);
            for &position in &plan.required_candidate_indexes {
                prop_assert!(position < plan.candidates.len());
            }
        }
    }
}
