//! Assertions inferred from what a step changed in the accessibility tree.

use super::{same_text, target_text, AssertionCandidate, CandidateSource};
use crate::locator::expression::role_expression;
use crate::snapshot::{is_noisy_text, SnapshotNode, StepSnapshot};
use crate::step::{Action, ActionKind, Step};
use crate::target::{Target, TargetSource};

/// Roles whose text is asserted, heading first, with their confidence
pub const TEXT_ROLES: &[(&str, f64)] = &[
    ("heading", 0.82),
    ("alert", 0.8),
    ("status", 0.8),
    ("tab", 0.76),
    ("link", 0.74),
];

/// Roles eligible for visibility assertions
pub const VISIBLE_ROLES: &[&str] = &[
    "button",
    "link",
    "heading",
    "textbox",
    "checkbox",
    "radio",
    "combobox",
    "dialog",
    "alert",
    "status",
    "tab",
    "img",
    "navigation",
    "region",
];

/// Landmark roles used as structural anchors
pub const LANDMARK_ROLES: &[&str] = &["main", "navigation", "banner", "contentinfo", "search", "form"];

/// Maximum text assertions per step
pub const MAX_TEXT_CANDIDATES: usize = 2;
/// Maximum visibility assertions per step
pub const MAX_VISIBLE_CANDIDATES: usize = 3;

/// Confidence of a visibility assertion
pub const VISIBLE_CONFIDENCE: f64 = 0.7;
/// Confidence of a visibility assertion on a dialog or alert
pub const PROMINENT_VISIBLE_CONFIDENCE: f64 = 0.76;
/// Confidence of a value assertion on an input whose text changed
pub const VALUE_CHANGE_CONFIDENCE: f64 = 0.68;
/// Roles whose inline text is their current value
pub const VALUE_ROLES: &[&str] = &["textbox", "searchbox", "combobox", "spinbutton"];
/// Confidence of an enabled-state assertion
pub const ENABLED_CONFIDENCE: f64 = 0.66;
/// Confidence of a URL assertion
pub const URL_CONFIDENCE: f64 = 0.76;
/// Confidence of a title assertion
pub const TITLE_CONFIDENCE: f64 = 0.72;
/// Confidence of a structural anchor
pub const STRUCTURAL_CONFIDENCE: f64 = 0.84;
/// Stability score of a structural anchor
pub const STRUCTURAL_STABILITY: f64 = 0.95;

/// Confidence of a text role, if it is one
#[must_use]
pub fn text_role_confidence(role: &str) -> Option<f64> {
    TEXT_ROLES.iter().find(|(r, _)| *r == role).map(|(_, c)| *c)
}

fn text_role_rank(role: &str) -> usize {
    TEXT_ROLES
        .iter()
        .position(|(r, _)| *r == role)
        .unwrap_or(TEXT_ROLES.len())
}

/// Role-based target for a node, named when the node has a usable name
#[must_use]
pub fn node_target(node: &SnapshotNode) -> Target {
    let name = node
        .name
        .as_deref()
        .map(crate::snapshot::normalize)
        .filter(|n| !n.is_empty());
    Target::expression(role_expression(&node.role, name.as_deref())).with_source(TargetSource::Derived)
}

/// Text-assertion proposals from nodes, heading first, at most `limit`
pub(crate) fn text_assertions<'a>(
    nodes: impl Iterator<Item = &'a SnapshotNode>,
    excluded: Option<&str>,
    limit: usize,
) -> Vec<(Target, String, f64, &'a SnapshotNode)> {
    let mut eligible: Vec<(usize, usize, &SnapshotNode, String)> = nodes
        .enumerate()
        .filter(|(_, n)| n.visible)
        .filter_map(|(order, n)| {
            text_role_confidence(&n.role)?;
            let text = n.display_text()?;
            if is_noisy_text(&text) || excluded.is_some_and(|e| same_text(e, &text)) {
                return None;
            }
            Some((text_role_rank(&n.role), order, n, text))
        })
        .collect();
    eligible.sort_by_key(|(rank, order, _, _)| (*rank, *order));

    let mut seen = Vec::new();
    let mut out = Vec::new();
    for (_, _, node, text) in eligible {
        let target = node_target(node);
        if seen.contains(&target.value) {
            continue;
        }
        seen.push(target.value.clone());
        let confidence = text_role_confidence(&node.role).unwrap_or_default();
        out.push((target, text, confidence, node));
        if out.len() == limit {
            break;
        }
    }
    out
}

/// Visibility proposals from named nodes, at most `limit`, skipping covered targets
pub(crate) fn visible_assertions<'a>(
    nodes: impl Iterator<Item = &'a SnapshotNode>,
    excluded: Option<&str>,
    covered: &[String],
    limit: usize,
) -> Vec<(Target, f64)> {
    let mut out: Vec<(Target, f64)> = Vec::new();
    for node in nodes {
        if out.len() == limit {
            break;
        }
        if !node.visible || !VISIBLE_ROLES.contains(&node.role.as_str()) {
            continue;
        }
        let Some(name) = node.name.as_deref().map(crate::snapshot::normalize) else {
            continue;
        };
        if is_noisy_text(&name) || excluded.is_some_and(|e| same_text(e, &name)) {
            continue;
        }
        let target = node_target(node);
        if covered.contains(&target.value) || out.iter().any(|(t, _)| t.value == target.value) {
            continue;
        }
        let confidence = if matches!(node.role.as_str(), "dialog" | "alert") {
            PROMINENT_VISIBLE_CONFIDENCE
        } else {
            VISIBLE_CONFIDENCE
        };
        out.push((target, confidence));
    }
    out
}

/// Snapshot-derived candidates for one step, at most `cap` of them
#[must_use]
pub fn build_snapshot_candidates(
    snapshot: &StepSnapshot,
    source: CandidateSource,
    cap: usize,
) -> Vec<AssertionCandidate> {
    let index = snapshot.index;
    let after = snapshot.step.kind();
    let excluded = snapshot.step.target().and_then(target_text);
    let excluded = excluded.as_deref();
    let delta = snapshot.delta();

    let url_changed = matches!(after, ActionKind::Click | ActionKind::Navigate)
        && snapshot.post_url.is_some()
        && snapshot.post_url != snapshot.pre_url;
    let title_changed = matches!(after, ActionKind::Click | ActionKind::Navigate)
        && snapshot
            .post_title
            .as_deref()
            .is_some_and(|t| !is_noisy_text(t))
        && snapshot.post_title != snapshot.pre_title;

    if delta.is_unchanged() && !url_changed && !title_changed {
        return Vec::new();
    }

    let make = |assertion: Action, confidence: f64, rationale: String| {
        AssertionCandidate::new(index, after, Step::new(assertion), confidence, rationale, source)
    };
    let mut out = Vec::new();

    let texts = text_assertions(delta.delta.iter(), excluded, MAX_TEXT_CANDIDATES);
    let covered: Vec<String> = texts.iter().map(|(t, _, _, _)| t.value.clone()).collect();
    for (target, text, confidence, node) in texts {
        out.push(make(
            Action::AssertText { target, text },
            confidence,
            format!("{} appeared after {after}", node.role),
        ));
    }

    let pre = snapshot.pre_nodes();
    let landmark = delta.stable.iter().find(|node| {
        LANDMARK_ROLES.contains(&node.role.as_str())
            && pre.iter().any(|p| p.signature() == node.signature())
    });
    if let Some(node) = landmark {
        out.push(
            make(
                Action::AssertVisible {
                    target: node_target(node),
                },
                STRUCTURAL_CONFIDENCE,
                format!("{} landmark present before and after {after}", node.role),
            )
            .as_structural(STRUCTURAL_STABILITY),
        );
    }

    if url_changed {
        if let Some(url) = snapshot.post_url.clone() {
            out.push(make(
                Action::AssertUrl { url },
                URL_CONFIDENCE,
                format!("URL changed after {after}"),
            ));
        }
    }
    if title_changed {
        if let Some(title) = snapshot.post_title.clone() {
            out.push(make(
                Action::AssertTitle { title },
                TITLE_CONFIDENCE,
                format!("title changed after {after}"),
            ));
        }
    }

    for (target, confidence) in
        visible_assertions(delta.delta.iter(), excluded, &covered, MAX_VISIBLE_CANDIDATES)
    {
        out.push(make(
            Action::AssertVisible { target },
            confidence,
            format!("element appeared after {after}"),
        ));
    }

    // fill and select already assert their own value
    if !matches!(after, ActionKind::Fill | ActionKind::Select) {
        for change in &delta.text_changes {
            if !VALUE_ROLES.contains(&change.node.role.as_str()) || change.node.name.is_none() {
                continue;
            }
            out.push(make(
                Action::AssertValue {
                    target: node_target(&change.node),
                    value: change.new_text.clone(),
                },
                VALUE_CHANGE_CONFIDENCE,
                format!("{} value changed after {after}", change.node.role),
            ));
        }
    }

    for change in &delta.state_changes {
        let enabled = match change.transition {
            crate::snapshot::StateTransition::Enabled => true,
            crate::snapshot::StateTransition::Disabled => false,
            crate::snapshot::StateTransition::Expanded
            | crate::snapshot::StateTransition::Collapsed => continue,
        };
        if change.node.name.is_none() {
            continue;
        }
        out.push(make(
            Action::AssertEnabled {
                target: node_target(&change.node),
                enabled,
            },
            ENABLED_CONFIDENCE,
            format!("{} became {}", change.node.role, if enabled { "enabled" } else { "disabled" }),
        ));
    }

    out.truncate(cap);
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn snap(step: Step, pre: &str, post: &str) -> StepSnapshot {
        StepSnapshot::new(0, step, pre, post)
    }

    #[test]
    fn test_heading_after_submit() {
        let snapshot = snap(
            Step::click(Target::css("#submit")),
            "- button \"Submit\"",
            "- button \"Submit\"\n- heading \"Welcome\" [level=1]",
        );
        let candidates = build_snapshot_candidates(&snapshot, CandidateSource::SnapshotNative, 3);
        let texts: Vec<_> = candidates
            .iter()
            .filter(|c| c.kind() == ActionKind::AssertText)
            .collect();
        assert_eq!(texts.len(), 1);
        assert_eq!(texts[0].confidence, 0.82);
        assert_eq!(texts[0].candidate_source, CandidateSource::SnapshotNative);
        assert_eq!(
            texts[0].candidate.action,
            Action::AssertText {
                target: Target::expression("getByRole('heading', { name: 'Welcome' })")
                    .with_source(TargetSource::Derived),
                text: "Welcome".to_string()
            }
        );
        // the heading is text-covered, so no duplicate visibility candidate
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn test_changed_input_value_asserted() {
        let snapshot = snap(
            Step::click(Target::css("#lookup")),
            "- textbox \"City\": Utrecht\n- button \"Lookup\"",
            "- textbox \"City\": Amsterdam\n- button \"Lookup\"",
        );
        let candidates = build_snapshot_candidates(&snapshot, CandidateSource::SnapshotNative, 10);
        let values: Vec<_> = candidates
            .iter()
            .filter(|c| c.kind() == ActionKind::AssertValue)
            .collect();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].confidence, VALUE_CHANGE_CONFIDENCE);
        assert_eq!(
            values[0].candidate.action,
            Action::AssertValue {
                target: Target::expression("getByRole('textbox', { name: 'City' })")
                    .with_source(TargetSource::Derived),
                value: "Amsterdam".to_string()
            }
        );
    }

    #[test]
    fn test_fill_does_not_repeat_value_from_snapshot() {
        let snapshot = snap(
            Step::fill(Target::css("#city"), "Amsterdam"),
            "- textbox \"City\": Utrecht",
            "- textbox \"City\": Amsterdam",
        );
        let candidates = build_snapshot_candidates(&snapshot, CandidateSource::SnapshotNative, 10);
        assert!(candidates.iter().all(|c| c.kind() != ActionKind::AssertValue));
    }

    #[test]
    fn test_identical_snapshots_yield_nothing() {
        let tree = "- main:\n  - heading \"Shop\"\n  - button \"Buy\"";
        let snapshot = snap(Step::click(Target::css("#buy")), tree, tree);
        assert!(build_snapshot_candidates(&snapshot, CandidateSource::SnapshotNative, 4).is_empty());
    }

    #[test]
    fn test_text_roles_heading_first_and_capped() {
        let snapshot = snap(
            Step::click(Target::css("#go")),
            "",
            "- link \"Details\"\n- status: Saved successfully\n- heading \"Order placed\"\n- tab \"Summary\"",
        );
        let candidates = build_snapshot_candidates(&snapshot, CandidateSource::SnapshotCli, 10);
        let texts: Vec<_> = candidates
            .iter()
            .filter(|c| c.kind() == ActionKind::AssertText)
            .map(|c| c.candidate.action.payload().unwrap())
            .collect();
        assert_eq!(texts, vec!["Order placed", "Saved successfully"]);
        assert!(candidates.iter().all(|c| c.candidate_source == CandidateSource::SnapshotCli));
    }

    #[test]
    fn test_acted_target_text_excluded() {
        let snapshot = snap(
            Step::click(Target::expression("getByRole('tab', { name: 'Reviews' })")),
            "",
            "- tab \"Reviews\" [selected]\n- heading \"Customer reviews\"",
        );
        let candidates = build_snapshot_candidates(&snapshot, CandidateSource::SnapshotNative, 5);
        assert!(candidates
            .iter()
            .all(|c| c.candidate.target().unwrap().value != "getByRole('tab', { name: 'Reviews' })"));
        assert_eq!(candidates[0].candidate.action.payload().as_deref(), Some("Customer reviews"));
    }

    #[test]
    fn test_url_and_title_after_click() {
        let snapshot = snap(
            Step::click(Target::css("#next")),
            "- heading \"Step 1\"",
            "- heading \"Step 2\"",
        )
        .with_urls(Some("https://shop.test/a".into()), Some("https://shop.test/b".into()))
        .with_titles(Some("Shop".into()), Some("Checkout".into()));
        let candidates = build_snapshot_candidates(&snapshot, CandidateSource::SnapshotNative, 10);
        let kinds: Vec<_> = candidates.iter().map(AssertionCandidate::kind).collect();
        assert!(kinds.contains(&ActionKind::AssertUrl));
        assert!(kinds.contains(&ActionKind::AssertTitle));
    }

    #[test]
    fn test_url_ignored_after_fill() {
        let snapshot = snap(
            Step::fill(Target::css("#q"), "shoes"),
            "- textbox \"Search\"",
            "- textbox \"Search\": shoes",
        )
        .with_urls(Some("https://shop.test/".into()), Some("https://shop.test/?q=shoes".into()));
        let candidates = build_snapshot_candidates(&snapshot, CandidateSource::SnapshotNative, 10);
        assert!(candidates.iter().all(|c| c.kind() != ActionKind::AssertUrl));
    }

    #[test]
    fn test_structural_landmark() {
        let snapshot = snap(
            Step::click(Target::css("#more")),
            "- navigation \"Main menu\"\n- button \"More\"",
            "- navigation \"Main menu\"\n- button \"More\"\n- region \"Extra details\"",
        );
        let candidates = build_snapshot_candidates(&snapshot, CandidateSource::SnapshotNative, 10);
        let structural: Vec<_> = candidates.iter().filter(|c| c.stable_structural).collect();
        assert_eq!(structural.len(), 1);
        assert_eq!(structural[0].confidence, STRUCTURAL_CONFIDENCE);
        assert_eq!(structural[0].stability_score, Some(STRUCTURAL_STABILITY));
        assert!(candidates
            .iter()
            .any(|c| !c.stable_structural && c.kind() == ActionKind::AssertVisible));
    }

    #[test]
    fn test_enabled_transition() {
        let snapshot = snap(
            Step::new(Action::Check {
                target: Target::css("#terms"),
            }),
            "- checkbox \"Terms\"\n- button \"Continue\" [disabled]",
            "- checkbox \"Terms\" [checked]\n- button \"Continue\"",
        );
        let candidates = build_snapshot_candidates(&snapshot, CandidateSource::SnapshotNative, 10);
        assert!(candidates.iter().any(|c| c.kind() == ActionKind::AssertEnabled));
    }

    #[test]
    fn test_cap_applies() {
        let snapshot = snap(
            Step::navigate("/"),
            "",
            "- heading \"One\"\n- heading \"Two\"\n- button \"Three\"\n- button \"Four\"",
        );
        assert_eq!(
            build_snapshot_candidates(&snapshot, CandidateSource::SnapshotNative, 2).len(),
            2
        );
    }
}
