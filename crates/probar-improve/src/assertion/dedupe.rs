//! Merge duplicate assertion candidates.

use std::cmp::Ordering;
use std::collections::HashMap;

use super::AssertionCandidate;

/// Order two duplicates: `Greater` means `a` is preferred.
///
/// Non-fallback beats fallback, then higher confidence, then higher source rank.
#[must_use]
pub fn preference(a: &AssertionCandidate, b: &AssertionCandidate) -> Ordering {
    (!a.coverage_fallback)
        .cmp(&!b.coverage_fallback)
        .then_with(|| a.confidence.total_cmp(&b.confidence))
        .then_with(|| a.candidate_source.rank().cmp(&b.candidate_source.rank()))
}

/// Keep one candidate per dedupe key, at the position of the key's first occurrence
#[must_use]
pub fn dedupe_candidates(candidates: Vec<AssertionCandidate>) -> Vec<AssertionCandidate> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<AssertionCandidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let key = candidate.dedupe_key();
        match positions.get(&key) {
            Some(&at) => {
                if preference(&candidate, &out[at]) == Ordering::Greater {
                    out[at] = candidate;
                }
            }
            None => {
                positions.insert(key, out.len());
                out.push(candidate);
            }
        }
    }
    out
}


#[cfg(test)]
mod proptest_tests {
    use super::*;
    use crate::assertion::CandidateSource;
    use crate::step::{ActionKind, Step};
    use crate::target::Target;
    use proptest::prelude::*;

    fn source() -> impl Strategy<Value = CandidateSource> {
        prop_oneof![
            Just(CandidateSource::Deterministic),
            Just(CandidateSource::SnapshotNative),
            Just(CandidateSource::SnapshotCli),
        ]
    }

    proptest! {
        /// Two candidates with the same key always collapse to the preferred one
        #[test]
        fn prop_duplicate_pair_keeps_preferred(
            conf_a in 0.0f64..1.0,
            conf_b in 0.0f64..1.0,
            fallback_a: bool,
            fallback_b: bool,
            source_a in source(),
            source_b in source(),
        ) {
            let make = |confidence, fallback: bool, source| {
                let c = AssertionCandidate::new(
                    0,
                    ActionKind::Fill,
                    Step::assert_text(Target::css("h1"), "Done"),
                    confidence,
                    "p",
                    source,
                );
                if fallback { c.as_fallback() } else { c }
            };
            let a = make(conf_a, fallback_a, source_a);
            let b = make(conf_b, fallback_b, source_b);
            let out = dedupe_candidates(vec![a.clone(), b.clone()]);
            prop_assert_eq!(out.len(), 1);
            let expected = if preference(&b, &a) == Ordering::Greater { b } else { a };
            prop_assert_eq!(&out[0], &expected);
        }
    }
}
