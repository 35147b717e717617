//! Locator stability scoring.
//!
//! Scores are pure functions of the locator text and kind. Accessors that
//! follow user-facing semantics (roles, test ids) score highest; structural
//! selectors score lowest; positional and filtering chain calls subtract.

use std::sync::OnceLock;

use regex::Regex;

use super::expression::{strip_quoted, AccessorKind, Literal, LocatorExpression};
use super::{reason, CandidateOrigin, TargetCandidate, TargetCandidateScore};
use crate::target::{Target, TargetKind};
use crate::volatility::is_volatile_criterion;

/// Base score of `getByTestId`
pub const SCORE_TEST_ID: f64 = 0.95;
/// Base score of `getByRole`
pub const SCORE_ROLE: f64 = 0.92;
/// Base score of `getByLabel`
pub const SCORE_LABEL: f64 = 0.86;
/// Base score of `getByPlaceholder`
pub const SCORE_PLACEHOLDER: f64 = 0.84;
/// Base score of `getByAltText` and `getByTitle`
pub const SCORE_ALT_OR_TITLE: f64 = 0.8;
/// Base score of `getByText`
pub const SCORE_TEXT: f64 = 0.74;
/// Base score of CSS, raw or wrapped in `locator(...)`
pub const SCORE_CSS: f64 = 0.55;
/// Base score of XPath
pub const SCORE_XPATH: f64 = 0.42;
/// Base score of an unclassified target
pub const SCORE_UNKNOWN: f64 = 0.3;
/// Score of a locator expression that does not parse
pub const SCORE_UNRECOGNIZED: f64 = 0.2;

/// Penalty per `nth`/`first`/`last`
pub const POSITIONAL_PENALTY: f64 = 0.15;
/// Penalty per `filter`
pub const FILTER_PENALTY: f64 = 0.05;
/// Penalty when the text criterion is volatile
pub const VOLATILE_TEXT_PENALTY: f64 = 0.1;

fn positional_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\.\s*(?:nth|first|last)\s*\(|>>\s*nth=").expect("static regex")
    })
}

fn filter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.\s*filter\s*\(").expect("static regex"))
}

/// Chain calls found outside quoted literals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainCounts {
    /// `nth`/`first`/`last` calls, including `>> nth=` segments
    pub positional: usize,
    /// `filter` calls
    pub filters: usize,
}

/// Count positional and filter chain calls, ignoring quoted contents
#[must_use]
pub fn chain_counts(value: &str) -> ChainCounts {
    let stripped = strip_quoted(value);
    ChainCounts {
        positional: positional_re().find_iter(&stripped).count(),
        filters: filter_re().find_iter(&stripped).count(),
    }
}

/// Score a locator value of the given kind
#[must_use]
pub fn score_locator(value: &str, kind: TargetKind) -> f64 {
    let value = value.trim();
    let base = match kind {
        TargetKind::LocatorExpression => match LocatorExpression::parse(value) {
            Ok(expr) => expression_base(&expr) - volatile_penalty(&expr),
            Err(_) => SCORE_UNRECOGNIZED,
        },
        TargetKind::Css => SCORE_CSS,
        TargetKind::Xpath => SCORE_XPATH,
        TargetKind::EngineSelector => engine_base(value),
        TargetKind::Unknown => SCORE_UNKNOWN,
    };
    let chain = chain_counts(value);
    let raw = base
        - POSITIONAL_PENALTY * chain.positional as f64
        - FILTER_PENALTY * chain.filters as f64;
    round2(raw.clamp(0.0, 1.0))
}

/// Score a target by its value and kind
#[must_use]
pub fn score_target(target: &Target) -> f64 {
    score_locator(&target.value, target.kind)
}

fn expression_base(expr: &LocatorExpression) -> f64 {
    let Some(call) = expr.accessor() else {
        return SCORE_UNRECOGNIZED;
    };
    match call.accessor_kind() {
        AccessorKind::TestId => SCORE_TEST_ID,
        AccessorKind::Role => SCORE_ROLE,
        AccessorKind::Label => SCORE_LABEL,
        AccessorKind::Placeholder => SCORE_PLACEHOLDER,
        AccessorKind::AltText | AccessorKind::Title => SCORE_ALT_OR_TITLE,
        AccessorKind::Text => SCORE_TEXT,
        AccessorKind::Locator => match call.first_literal().and_then(Literal::as_str) {
            Some(selector) => selector_base(selector),
            None => SCORE_UNRECOGNIZED,
        },
        AccessorKind::Frame | AccessorKind::Chain => SCORE_UNRECOGNIZED,
    }
}

/// Base score of the string handed to `locator(...)`
fn selector_base(selector: &str) -> f64 {
    match TargetKind::infer(selector) {
        TargetKind::Xpath => SCORE_XPATH,
        TargetKind::EngineSelector => engine_base(selector),
        _ => SCORE_CSS,
    }
}

/// Base score of an engine-prefixed selector, by its first segment's engine
fn engine_base(value: &str) -> f64 {
    let first = value.split(">>").next().unwrap_or(value).trim();
    let body = first.strip_prefix("internal:").unwrap_or(first);
    let engine = body.split('=').next().unwrap_or_default();
    match engine {
        "testid" | "data-testid" => SCORE_TEST_ID,
        "role" => SCORE_ROLE,
        "label" => SCORE_LABEL,
        "attr" if body.contains("[placeholder") => SCORE_PLACEHOLDER,
        "attr" if body.contains("[alt") || body.contains("[title") => SCORE_ALT_OR_TITLE,
        "text" | "has-text" => SCORE_TEXT,
        "css" | "id" | "attr" => SCORE_CSS,
        "xpath" => SCORE_XPATH,
        _ if !first.contains('=') && !first.is_empty() => SCORE_CSS,
        _ => SCORE_UNKNOWN,
    }
}

fn volatile_penalty(expr: &LocatorExpression) -> f64 {
    match expr.text_criterion().map(|c| c.value) {
        Some(Literal::Str(text)) if is_volatile_criterion(&text) => VOLATILE_TEXT_PENALTY,
        _ => 0.0,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Score candidates, pairing each with its live match count by position
#[must_use]
pub fn score_candidates(
    candidates: Vec<TargetCandidate>,
    match_counts: &[Option<usize>],
) -> Vec<TargetCandidateScore> {
    candidates
        .into_iter()
        .enumerate()
        .map(|(i, candidate)| {
            let match_count = match_counts.get(i).copied().flatten();
            let mut reason_codes = candidate.reason_codes.clone();
            let target = &candidate.target;
            if target.kind == TargetKind::LocatorExpression
                && LocatorExpression::parse(&target.value).is_err()
            {
                reason_codes.push(reason::UNRECOGNIZED_SHAPE.to_string());
            }
            let chain = chain_counts(&target.value);
            if chain.positional > 0 {
                reason_codes.push(reason::POSITIONAL_CHAIN.to_string());
            }
            if chain.filters > 0 {
                reason_codes.push(reason::CONTENT_FILTER.to_string());
            }
            match match_count {
                Some(0) => reason_codes.push(reason::NO_MATCH.to_string()),
                Some(n) if n > 1 => reason_codes.push(reason::AMBIGUOUS_MATCH.to_string()),
                _ => {}
            }
            TargetCandidateScore {
                score: score_target(target),
                candidate,
                match_count,
                reason_codes,
            }
        })
        .collect()
}

/// Index of the best candidate: highest score, then source priority, then insertion order
#[must_use]
pub fn select_best(scores: &[TargetCandidateScore]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, entry) in scores.iter().enumerate() {
        let Some(current) = best else {
            best = Some(i);
            continue;
        };
        let incumbent = &scores[current];
        let better = entry.score > incumbent.score
            || (entry.score == incumbent.score
                && entry.candidate.source.priority() < incumbent.candidate.source.priority());
        if better {
            best = Some(i);
        }
    }
    best
}

/// Whether the best candidate should replace the current target.
///
/// Requires a derived candidate that scores strictly higher than the current
/// one and resolves to exactly one live element, unless ambiguity is tolerated.
#[must_use]
pub fn is_auto_applicable(
    best: &TargetCandidateScore,
    current_score: f64,
    tolerate_ambiguous: bool,
) -> bool {
    if best.candidate.source != CandidateOrigin::Derived || best.score <= current_score {
        return false;
    }
    if best.reason_codes.iter().any(|r| r == reason::UNRECOGNIZED_SHAPE) {
        return false;
    }
    match best.match_count {
        Some(1) => true,
        Some(0) => false,
        Some(_) | None => tolerate_ambiguous,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn expr(value: &str) -> f64 {
        score_locator(value, TargetKind::LocatorExpression)
    }

    #[test]
    fn test_accessor_bases() {
        assert_eq!(expr("getByTestId('save')"), 0.95);
        assert_eq!(expr("getByRole('button', { name: 'Save' })"), 0.92);
        assert_eq!(expr("getByLabel('Email')"), 0.86);
        assert_eq!(expr("getByPlaceholder('Search')"), 0.84);
        assert_eq!(expr("getByText('Sign in')"), 0.74);
        assert_eq!(expr("locator('#submit')"), 0.55);
        assert_eq!(expr("locator('xpath=//button')"), 0.42);
        assert_eq!(score_locator("#submit", TargetKind::Css), 0.55);
        assert_eq!(score_locator("//button", TargetKind::Xpath), 0.42);
        assert_eq!(score_locator("whatever", TargetKind::Unknown), 0.3);
    }

    #[test]
    fn test_unrecognized_expression_scores_lowest() {
        assert_eq!(expr("getByRole('button').click()"), 0.2);
    }

    #[test]
    fn test_engine_selectors() {
        assert_eq!(
            score_locator("internal:testid=[data-testid=\"save\"s]", TargetKind::EngineSelector),
            0.95
        );
        assert_eq!(
            score_locator("internal:role=button[name=\"Save\"i]", TargetKind::EngineSelector),
            0.92
        );
        assert_eq!(
            score_locator("text=Sign in", TargetKind::EngineSelector),
            0.74
        );
        assert_eq!(
            score_locator("div.card >> nth=2", TargetKind::EngineSelector),
            0.4
        );
    }

    #[test]
    fn test_positional_and_filter_penalties() {
        assert_eq!(expr("getByRole('button').nth(1)"), 0.77);
        assert_eq!(expr("getByRole('button').first().last()"), 0.62);
        assert_eq!(expr("getByRole('listitem').filter({ hasText: 'A' })"), 0.87);
    }

    #[test]
    fn test_quoted_method_names_not_penalized() {
        assert_eq!(expr("getByText('.nth(2) and .filter(x)')"), 0.74);
    }

    #[test]
    fn test_volatile_text_penalty() {
        assert_eq!(
            expr("getByRole('link', { name: 'Weather today', exact: true })"),
            0.82
        );
        assert_eq!(expr("getByRole('link', { name: /^Weather/ })"), 0.92);
        assert_eq!(
            expr("getByRole('link', { name: 'Kabinet valt na lang debat over nieuwe wet' })"),
            0.82
        );
    }

    #[test]
    fn test_select_best_ties_prefer_current_then_order() {
        let current = TargetCandidate::new(
            Target::css("#a"),
            CandidateOrigin::Current,
            reason::CURRENT_TARGET,
        );
        let derived = TargetCandidate::new(
            Target::expression("locator('#a')").with_source(crate::target::TargetSource::Derived),
            CandidateOrigin::Derived,
            reason::DERIVED_FROM_CSS,
        );
        let scores = score_candidates(vec![derived, current], &[Some(1), Some(1)]);
        assert_eq!(scores[0].score, scores[1].score);
        assert_eq!(select_best(&scores), Some(1));
        assert!(select_best(&[]).is_none());
    }

    #[test]
    fn test_auto_apply_rules() {
        let derived = TargetCandidate::new(
            Target::expression("getByTestId('save')"),
            CandidateOrigin::Derived,
            reason::DERIVED_FROM_TEST_ID,
        );
        let unique = score_candidates(vec![derived.clone()], &[Some(1)]).remove(0);
        assert!(is_auto_applicable(&unique, 0.55, false));
        assert!(!is_auto_applicable(&unique, 0.95, false));

        let ambiguous = score_candidates(vec![derived.clone()], &[Some(3)]).remove(0);
        assert!(ambiguous.reason_codes.contains(&"ambiguous_match".to_string()));
        assert!(!is_auto_applicable(&ambiguous, 0.55, false));
        assert!(is_auto_applicable(&ambiguous, 0.55, true));

        let missing = score_candidates(vec![derived], &[Some(0)]).remove(0);
        assert!(!is_auto_applicable(&missing, 0.55, true));
    }
}

#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    fn accessor() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-z]{1,8}".prop_map(|t| format!("getByTestId('{t}')")),
            "[A-Za-z ]{1,20}".prop_map(|n| format!("getByRole('button', {{ name: '{n}' }})")),
            "[A-Za-z0-9 ]{1,20}".prop_map(|t| format!("getByText('{t}')")),
            "[a-z#.]{1,10}".prop_map(|c| format!("locator('{c}')")),
        ]
    }

    proptest! {
        /// Scores are pure and bounded
        #[test]
        fn prop_score_is_pure_and_bounded(value in ".{0,60}") {
            for kind in [
                TargetKind::LocatorExpression,
                TargetKind::Css,
                TargetKind::Xpath,
                TargetKind::EngineSelector,
                TargetKind::Unknown,
            ] {
                let first = score_locator(&value, kind);
                prop_assert_eq!(first, score_locator(&value, kind));
                prop_assert!((0.0..=1.0).contains(&first));
            }
        }

        /// A positional chain call never raises the score
        #[test]
        fn prop_positional_never_helps(base in accessor(), n in 0u32..5) {
            let plain = score_locator(&base, TargetKind::LocatorExpression);
            for suffix in [format!(".nth({n})"), ".first()".to_string(), ".last()".to_string()] {
                let chained = format!("{base}{suffix}");
                prop_assert!(score_locator(&chained, TargetKind::LocatorExpression) <= plain);
            }
        }
    }
}
