//! Repair of locators anchored on volatile text.
//!
//! A locator such as `getByRole('link', { name: '<today's headline>', exact: true })`
//! breaks as soon as the headline changes. When the expression is a single
//! accessor call with `exact: true`, two alternatives are proposed: one
//! without the exact constraint and one matching an anchored regex of a short
//! stable prefix. Neither is preferred here; scoring and selection decide.

use std::collections::BTreeSet;

use super::expression::{
    escape_regex_literal, AccessorKind, Arg, Literal, LocatorCall, LocatorExpression,
};
use super::reason;
use crate::target::{Target, TargetKind};
use crate::volatility::{
    detect_signals, has_volatile_keyword, is_volatile_criterion, VolatileSignal,
};

/// Maximum words kept in a regex prefix
pub const PREFIX_MAX_WORDS: usize = 4;

/// Maximum characters kept in a regex prefix
pub const PREFIX_MAX_CHARS: usize = 32;

/// A proposed repaired expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairCandidate {
    /// Rewritten expression
    pub value: String,
    /// `repair_exact_removed` or `repair_regex_prefix`
    pub reason: &'static str,
}

/// Outcome of inspecting a target for volatile text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairFinding {
    /// The text criterion that tripped detection
    pub criterion: String,
    /// Signals detected in it
    pub signals: BTreeSet<VolatileSignal>,
    /// Repair candidates; empty when the expression shape is unsupported
    pub repairs: Vec<RepairCandidate>,
}

impl RepairFinding {
    /// Whether repairs could be proposed
    #[must_use]
    pub fn is_repairable(&self) -> bool {
        !self.repairs.is_empty()
    }

    /// Diagnostic message describing the finding
    #[must_use]
    pub fn message(&self) -> String {
        let signals: Vec<_> = self.signals.iter().map(VolatileSignal::as_str).collect();
        let outcome = if self.is_repairable() {
            format!("{} repair candidate(s) proposed", self.repairs.len())
        } else {
            "unsupported expression shape, no repair proposed".to_string()
        };
        format!(
            "locator text {:?} looks volatile ({}); {outcome}",
            self.criterion,
            signals.join(", ")
        )
    }
}

/// Inspect a locator-expression target whose text criterion looks volatile
#[must_use]
pub fn analyze_volatile_target(target: &Target) -> Option<RepairFinding> {
    if target.kind != TargetKind::LocatorExpression {
        return None;
    }
    let expr = LocatorExpression::parse(&target.value).ok()?;
    let criterion = expr.text_criterion()?;
    let text = criterion.value.as_str()?.to_string();
    if !is_volatile_criterion(&text) {
        return None;
    }

    let mut repairs = Vec::new();
    if expr.is_single_accessor() && criterion.exact {
        let call = &expr.calls[0];
        repairs.push(RepairCandidate {
            value: LocatorExpression::single(without_exact(call)).render(),
            reason: reason::REPAIR_EXACT_REMOVED,
        });
        let prefix = stable_prefix(&text);
        if !prefix.is_empty() {
            let pattern = Literal::Regex {
                pattern: format!("^{}", escape_regex_literal(&prefix)),
                flags: String::new(),
            };
            let rewritten = with_text_criterion(&without_exact(call), pattern);
            repairs.push(RepairCandidate {
                value: LocatorExpression::single(rewritten).render(),
                reason: reason::REPAIR_REGEX_PREFIX,
            });
        }
    }

    Some(RepairFinding {
        signals: detect_signals(&text),
        criterion: text,
        repairs,
    })
}

/// Leading words of `text` that carry no volatility on their own
#[must_use]
pub fn stable_prefix(text: &str) -> String {
    let mut prefix = String::new();
    for (count, word) in text.split_whitespace().enumerate() {
        if count >= PREFIX_MAX_WORDS
            || word.contains('|')
            || word.chars().any(|c| c.is_ascii_digit())
            || has_volatile_keyword(word)
        {
            break;
        }
        let added = if prefix.is_empty() { 0 } else { 1 } + word.chars().count();
        if prefix.chars().count() + added > PREFIX_MAX_CHARS {
            break;
        }
        if !prefix.is_empty() {
            prefix.push(' ');
        }
        prefix.push_str(word);
    }
    prefix
}

fn without_exact(call: &LocatorCall) -> LocatorCall {
    let args = call
        .args
        .iter()
        .filter_map(|arg| match arg {
            Arg::Options(entries) => {
                let kept: Vec<_> = entries
                    .iter()
                    .filter(|(key, _)| key != "exact")
                    .cloned()
                    .collect();
                (!kept.is_empty()).then_some(Arg::Options(kept))
            }
            Arg::Literal(_) => Some(arg.clone()),
        })
        .collect();
    LocatorCall::new(call.method.clone(), args)
}

/// Replace the call's text criterion: the `name` option for roles, else the first literal
fn with_text_criterion(call: &LocatorCall, value: Literal) -> LocatorCall {
    let mut next = call.clone();
    if call.accessor_kind() == AccessorKind::Role {
        for arg in &mut next.args {
            if let Arg::Options(entries) = arg {
                for (key, existing) in entries.iter_mut() {
                    if key == "name" {
                        *existing = value.clone();
                    }
                }
            }
        }
    } else if let Some(Arg::Literal(first)) = next
        .args
        .iter_mut()
        .find(|a| matches!(a, Arg::Literal(_)))
    {
        *first = value;
    }
    next
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const HEADLINE: &str = "Tientallen vluchten op Schiphol geschrapt door storm";

    #[test]
    fn test_headline_link_gets_two_repairs() {
        let target = Target::expression(format!(
            "getByRole('link', {{ name: '{HEADLINE}', exact: true }})"
        ));
        let finding = analyze_volatile_target(&target).unwrap();
        assert!(finding
            .signals
            .contains(&VolatileSignal::ContainsHeadlineLikeText));
        assert_eq!(finding.repairs.len(), 2);
        assert_eq!(
            finding.repairs[0].value,
            format!("getByRole('link', {{ name: '{HEADLINE}' }})")
        );
        assert_eq!(finding.repairs[0].reason, "repair_exact_removed");
        assert_eq!(
            finding.repairs[1].value,
            "getByRole('link', { name: /^Tientallen vluchten op Schiphol/ })"
        );
        assert_eq!(finding.repairs[1].reason, "repair_regex_prefix");
        for repair in &finding.repairs {
            assert!(LocatorExpression::parse(&repair.value).is_ok());
        }
    }

    #[test]
    fn test_keywordless_headline_is_repaired() {
        let headline = "Tientallen vluchten op Schiphol geschrapt vanwege harde wind";
        let target = Target::expression(format!(
            "getByRole('link', {{ name: '{headline}', exact: true }})"
        ));
        let finding = analyze_volatile_target(&target).unwrap();
        assert_eq!(
            finding.signals.iter().copied().collect::<Vec<_>>(),
            vec![VolatileSignal::ContainsHeadlineLikeText]
        );
        assert_eq!(finding.repairs.len(), 2);
        assert_eq!(
            finding.repairs[1].value,
            "getByRole('link', { name: /^Tientallen vluchten op Schiphol/ })"
        );
    }

    #[test]
    fn test_text_accessor_repairs_first_literal() {
        let target = Target::expression("getByText('Live scores Ajax | PSV', { exact: true })");
        let finding = analyze_volatile_target(&target).unwrap();
        assert_eq!(finding.repairs.len(), 1);
        assert_eq!(finding.repairs[0].value, "getByText('Live scores Ajax | PSV')");
        // first word is a keyword, so no stable prefix exists
        assert_eq!(stable_prefix("Live scores Ajax | PSV"), "");
    }

    #[test]
    fn test_chained_shape_is_flagged_without_repairs() {
        let target = Target::expression(format!(
            "getByRole('link', {{ name: '{HEADLINE}', exact: true }}).first()"
        ));
        let finding = analyze_volatile_target(&target).unwrap();
        assert!(!finding.is_repairable());
        assert!(finding.message().contains("unsupported"));
    }

    #[test]
    fn test_non_exact_is_flagged_without_repairs() {
        let target = Target::expression("getByRole('heading', { name: 'Weather update' })");
        let finding = analyze_volatile_target(&target).unwrap();
        assert!(finding.repairs.is_empty());
    }

    #[test]
    fn test_stable_text_is_not_flagged() {
        for value in [
            "getByRole('button', { name: 'Submit', exact: true })",
            "getByRole('link', { name: /^Weather/ })",
            "getByTestId('weather-today')",
        ] {
            assert!(analyze_volatile_target(&Target::expression(value)).is_none(), "{value}");
        }
        assert!(analyze_volatile_target(&Target::css("a.weather")).is_none());
    }

    #[test]
    fn test_stable_prefix_limits() {
        assert_eq!(stable_prefix("Order 12345 shipped"), "Order");
        assert_eq!(
            stable_prefix("Supercalifragilistic expialidocious wonders abound"),
            "Supercalifragilistic"
        );
        assert_eq!(stable_prefix("A b c d e f"), "A b c d");
    }
}
