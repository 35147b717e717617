//! Assertions implied by a step's own semantics.

use super::{target_text, AssertionCandidate, CandidateSource, DeterministicSkip};
use crate::locator::expression::{AccessorKind, Literal, LocatorExpression};
use crate::step::{Action, Step};
use crate::target::{Target, TargetKind};
use crate::volatility::{is_headline_like, HEADLINE_MIN_CHARS};

/// Confidence of assertValue after a fill
pub const FILL_VALUE_CONFIDENCE: f64 = 0.9;
/// Confidence of assertValue after a select
pub const SELECT_VALUE_CONFIDENCE: f64 = 0.85;
/// Confidence of assertChecked after check/uncheck
pub const CHECKED_CONFIDENCE: f64 = 0.9;
/// Confidence of the same-target assertVisible after click/press/hover
pub const ACTED_VISIBLE_CONFIDENCE: f64 = 0.55;

/// Class and tag tokens of content cards that usually navigate away on click
const CARD_TOKENS: &[&str] = &[
    "article", "articles", "card", "cards", "story", "stories", "teaser", "teasers", "tile",
    "tiles",
];

/// Why acting on this target is expected to navigate away, if it is
#[must_use]
pub fn is_navigation_like(target: &Target) -> Option<String> {
    match target.kind {
        TargetKind::LocatorExpression => {
            let expr = LocatorExpression::parse(&target.value).ok()?;
            let call = expr.accessor()?;
            if call.accessor_kind() == AccessorKind::Locator {
                let selector = call.first_literal().and_then(Literal::as_str)?;
                return card_shaped(selector);
            }
            if expr.role() != Some("link") {
                return None;
            }
            let criterion = expr.text_criterion()?;
            if criterion.exact {
                return Some("link located by exact text".to_string());
            }
            match criterion.value.as_str() {
                Some(text)
                    if is_headline_like(text) || text.chars().count() >= HEADLINE_MIN_CHARS =>
                {
                    Some("link located by headline-like text".to_string())
                }
                _ => None,
            }
        }
        TargetKind::Css | TargetKind::EngineSelector => card_shaped(&target.value),
        TargetKind::Xpath | TargetKind::Unknown => None,
    }
}

fn card_shaped(selector: &str) -> Option<String> {
    selector
        .split(|c: char| !c.is_ascii_alphanumeric())
        .map(str::to_ascii_lowercase)
        .find(|token| CARD_TOKENS.contains(&token.as_str()))
        .map(|token| format!("content card selector ({token})"))
}

/// Candidates and skips from step semantics alone
#[must_use]
pub fn build_deterministic_candidates(
    index: usize,
    step: &Step,
) -> (Vec<AssertionCandidate>, Option<DeterministicSkip>) {
    let after = step.kind();
    let candidate = |assertion: Action, confidence: f64, rationale: &str| {
        AssertionCandidate::new(
            index,
            after,
            Step::new(assertion),
            confidence,
            rationale,
            CandidateSource::Deterministic,
        )
    };

    match &step.action {
        Action::Fill { target, text } => (
            vec![candidate(
                Action::AssertValue {
                    target: target.clone(),
                    value: text.clone(),
                },
                FILL_VALUE_CONFIDENCE,
                "filled input should hold the typed text",
            )],
            None,
        ),
        Action::Select { target, value } => (
            vec![candidate(
                Action::AssertValue {
                    target: target.clone(),
                    value: value.clone(),
                },
                SELECT_VALUE_CONFIDENCE,
                "select should hold the chosen option",
            )],
            None,
        ),
        Action::Check { target } | Action::Uncheck { target } => {
            let checked = matches!(step.action, Action::Check { .. });
            (
                vec![candidate(
                    Action::AssertChecked {
                        target: target.clone(),
                        checked,
                    },
                    CHECKED_CONFIDENCE,
                    "checkbox should reflect the toggled state",
                )],
                None,
            )
        }
        Action::Click { target } | Action::Press { target, .. } | Action::Hover { target } => {
            if let Some(reason) = is_navigation_like(target) {
                let skip = DeterministicSkip {
                    index,
                    action: after,
                    target: target_text(target).unwrap_or_else(|| target.value.clone()),
                    reason,
                };
                return (Vec::new(), Some(skip));
            }
            (
                vec![candidate(
                    Action::AssertVisible {
                        target: target.clone(),
                    },
                    ACTED_VISIBLE_CONFIDENCE,
                    "acted-on element should remain visible",
                )
                .as_fallback()],
                None,
            )
        }
        Action::Navigate { .. }
        | Action::AssertVisible { .. }
        | Action::AssertText { .. }
        | Action::AssertValue { .. }
        | Action::AssertChecked { .. }
        | Action::AssertEnabled { .. }
        | Action::AssertUrl { .. }
        | Action::AssertTitle { .. } => (Vec::new(), None),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::step::ActionKind;

    #[test]
    fn test_fill_proposes_value() {
        let target = Target::css("#name");
        let (candidates, skip) = build_deterministic_candidates(2, &Step::fill(target.clone(), "Alice"));
        assert!(skip.is_none());
        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert_eq!(c.index, 2);
        assert_eq!(c.after_action, ActionKind::Fill);
        assert!(c.confidence >= 0.7);
        assert_eq!(
            c.candidate.action,
            Action::AssertValue {
                target,
                value: "Alice".to_string()
            }
        );
        assert!(!c.coverage_fallback);
    }

    #[test]
    fn test_select_and_check() {
        let (select, _) = build_deterministic_candidates(
            0,
            &Step::new(Action::Select {
                target: Target::css("#country"),
                value: "NL".to_string(),
            }),
        );
        assert_eq!(select[0].confidence, SELECT_VALUE_CONFIDENCE);

        let (uncheck, _) = build_deterministic_candidates(
            1,
            &Step::new(Action::Uncheck {
                target: Target::css("#news"),
            }),
        );
        assert_eq!(
            uncheck[0].candidate.action,
            Action::AssertChecked {
                target: Target::css("#news"),
                checked: false
            }
        );
    }

    #[test]
    fn test_click_gets_fallback_visible() {
        let (candidates, skip) = build_deterministic_candidates(0, &Step::click(Target::css("#submit")));
        assert!(skip.is_none());
        assert_eq!(candidates[0].kind(), ActionKind::AssertVisible);
        assert!(candidates[0].coverage_fallback);
        assert_eq!(candidates[0].confidence, ACTED_VISIBLE_CONFIDENCE);
    }

    #[test]
    fn test_navigation_like_targets_are_skipped() {
        let targets = [
            Target::expression("getByRole('link', { name: 'Home', exact: true })"),
            Target::expression(
                "getByRole('link', { name: 'Tientallen vluchten op Schiphol geschrapt door storm' })",
            ),
            Target::css("div.news-card > a"),
            Target::expression("locator('article h2')"),
        ];
        for target in targets {
            let (candidates, skip) = build_deterministic_candidates(3, &Step::click(target.clone()));
            assert!(candidates.is_empty(), "{}", target.value);
            let skip = skip.unwrap();
            assert_eq!(skip.index, 3);
            assert!(!skip.reason.is_empty());
        }
    }

    #[test]
    fn test_short_inexact_link_is_not_navigation_like() {
        let target = Target::expression("getByRole('link', { name: 'Home' })");
        assert!(is_navigation_like(&target).is_none());
        assert!(is_navigation_like(&Target::css("button.cardinal")).is_none());
    }

    #[test]
    fn test_navigate_and_assertions_produce_nothing() {
        for step in [
            Step::navigate("/"),
            Step::assert_visible(Target::css("#a")),
        ] {
            let (candidates, skip) = build_deterministic_candidates(0, &step);
            assert!(candidates.is_empty());
            assert!(skip.is_none());
        }
    }
}
