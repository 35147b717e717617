//! Assertion policy profiles.
//!
//! A profile is an immutable value resolved once per run. It decides which
//! candidates are eligible, how they rank within a step and how many of them
//! are attempted against the live page.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::assertion::{ApplyStatus, AssertionCandidate};
use crate::result::ImproveError;
use crate::step::ActionKind;
use crate::volatility::{detect_signals, VolatileSignal};

/// Named risk profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssertionPolicy {
    /// Fewest assertions, strictest filters
    #[default]
    Reliable,
    /// Middle ground
    Balanced,
    /// Most assertions, loosest filters
    Aggressive,
}

impl AssertionPolicy {
    /// All profiles
    pub const ALL: [Self; 3] = [Self::Reliable, Self::Balanced, Self::Aggressive];

    /// Profile name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Reliable => "reliable",
            Self::Balanced => "balanced",
            Self::Aggressive => "aggressive",
        }
    }

    /// Resolve the profile's settings
    #[must_use]
    pub fn config(&self) -> AssertionPolicyConfig {
        use ActionKind::{
            AssertChecked, AssertEnabled, AssertText, AssertTitle, AssertUrl, AssertValue,
            AssertVisible,
        };
        use VolatileSignal::{
            ContainsDateOrTimeFragment, ContainsHeadlineLikeText, ContainsPipeSeparator,
            ContainsWeatherOrNewsFragment,
        };
        match self {
            Self::Reliable => AssertionPolicyConfig {
                policy: *self,
                max_applied_per_step: 1,
                snapshot_cap_navigate: 1,
                snapshot_cap_other: 2,
                min_text_score: 0.82,
                min_confidence: 0.6,
                hard_filter_signals: VolatileSignal::ALL.into_iter().collect(),
                snapshot_visible_requires_structural: true,
                rank_by_stability: true,
                action_priority: vec![
                    AssertValue,
                    AssertChecked,
                    AssertVisible,
                    AssertEnabled,
                    AssertUrl,
                    AssertText,
                    AssertTitle,
                ],
            },
            Self::Balanced => AssertionPolicyConfig {
                policy: *self,
                max_applied_per_step: 2,
                snapshot_cap_navigate: 2,
                snapshot_cap_other: 3,
                min_text_score: 0.78,
                min_confidence: 0.55,
                hard_filter_signals: [
                    ContainsDateOrTimeFragment,
                    ContainsWeatherOrNewsFragment,
                    ContainsHeadlineLikeText,
                    ContainsPipeSeparator,
                ]
                .into_iter()
                .collect(),
                snapshot_visible_requires_structural: false,
                rank_by_stability: true,
                action_priority: vec![
                    AssertValue,
                    AssertChecked,
                    AssertText,
                    AssertVisible,
                    AssertUrl,
                    AssertEnabled,
                    AssertTitle,
                ],
            },
            Self::Aggressive => AssertionPolicyConfig {
                policy: *self,
                max_applied_per_step: 3,
                snapshot_cap_navigate: 3,
                snapshot_cap_other: 4,
                min_text_score: 0.72,
                min_confidence: 0.5,
                hard_filter_signals: [ContainsDateOrTimeFragment, ContainsWeatherOrNewsFragment]
                    .into_iter()
                    .collect(),
                snapshot_visible_requires_structural: false,
                rank_by_stability: false,
                action_priority: vec![
                    AssertText,
                    AssertValue,
                    AssertChecked,
                    AssertUrl,
                    AssertTitle,
                    AssertVisible,
                    AssertEnabled,
                ],
            },
        }
    }
}

impl FromStr for AssertionPolicy {
    type Err = ImproveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reliable" => Ok(Self::Reliable),
            "balanced" => Ok(Self::Balanced),
            "aggressive" => Ok(Self::Aggressive),
            _ => Err(ImproveError::InvalidPolicy {
                value: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for AssertionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Settings of a profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionPolicyConfig {
    /// Profile these settings belong to
    pub policy: AssertionPolicy,
    /// Candidates attempted against the page per source step
    pub max_applied_per_step: usize,
    /// Snapshot-derived candidates kept after a navigate
    pub snapshot_cap_navigate: usize,
    /// Snapshot-derived candidates kept after any other step
    pub snapshot_cap_other: usize,
    /// Minimum confidence of text and title assertions
    pub min_text_score: f64,
    /// Minimum confidence of any assertion
    pub min_confidence: f64,
    /// Signals that exclude a snapshot-derived candidate outright
    pub hard_filter_signals: BTreeSet<VolatileSignal>,
    /// Snapshot `assertVisible` is eligible only when structural
    pub snapshot_visible_requires_structural: bool,
    /// Rank on stability score before confidence
    pub rank_by_stability: bool,
    /// Preferred assertion kinds, first is best
    pub action_priority: Vec<ActionKind>,
}

impl AssertionPolicyConfig {
    /// Snapshot volume cap after a step of the given kind
    #[must_use]
    pub const fn snapshot_cap(&self, after: ActionKind) -> usize {
        match after {
            ActionKind::Navigate => self.snapshot_cap_navigate,
            _ => self.snapshot_cap_other,
        }
    }

    /// Position of a kind in the priority list; unlisted kinds rank last
    #[must_use]
    pub fn action_rank(&self, kind: ActionKind) -> usize {
        self.action_priority
            .iter()
            .position(|k| *k == kind)
            .unwrap_or(self.action_priority.len())
    }

    /// Why a candidate is ineligible under this policy, if it is
    #[must_use]
    pub fn rejection(&self, candidate: &AssertionCandidate) -> Option<(ApplyStatus, String)> {
        if candidate.is_snapshot_derived() {
            if let Some(text) = candidate.observed_text() {
                let hits: Vec<_> = detect_signals(&text)
                    .intersection(&self.hard_filter_signals)
                    .map(VolatileSignal::as_str)
                    .collect();
                if !hits.is_empty() {
                    return Some((
                        ApplyStatus::SkippedPolicy,
                        format!("volatile text filtered by {} policy: {}", self.policy, hits.join(", ")),
                    ));
                }
            }
            if self.snapshot_visible_requires_structural
                && candidate.kind() == ActionKind::AssertVisible
                && !candidate.stable_structural
            {
                return Some((
                    ApplyStatus::SkippedPolicy,
                    format!(
                        "{} policy applies snapshot visibility assertions only on structural anchors",
                        self.policy
                    ),
                ));
            }
        }
        if matches!(candidate.kind(), ActionKind::AssertText | ActionKind::AssertTitle)
            && candidate.confidence < self.min_text_score
        {
            return Some((
                ApplyStatus::SkippedLowConfidence,
                format!(
                    "text confidence {:.2} below {:.2}",
                    candidate.confidence, self.min_text_score
                ),
            ));
        }
        if candidate.confidence < self.min_confidence {
            return Some((
                ApplyStatus::SkippedLowConfidence,
                format!(
                    "confidence {:.2} below {:.2}",
                    candidate.confidence, self.min_confidence
                ),
            ));
        }
        None
    }

    /// Order two candidates of the same step; `Less` ranks first
    #[must_use]
    pub fn compare(
        &self,
        a: &AssertionCandidate,
        a_order: usize,
        b: &AssertionCandidate,
        b_order: usize,
    ) -> Ordering {
        let stability = |c: &AssertionCandidate| c.stability_score.unwrap_or(c.confidence);
        a.coverage_fallback
            .cmp(&b.coverage_fallback)
            .then_with(|| {
                if self.rank_by_stability {
                    stability(b).total_cmp(&stability(a))
                } else {
                    Ordering::Equal
                }
            })
            .then_with(|| b.confidence.total_cmp(&a.confidence))
            .then_with(|| self.action_rank(a.kind()).cmp(&self.action_rank(b.kind())))
            .then_with(|| b.candidate_source.rank().cmp(&a.candidate_source.rank()))
            .then_with(|| a_order.cmp(&b_order))
    }
}

/// Apply the policy to candidates.
///
/// Ineligible candidates get their final skip status. Eligible ones are
/// ranked per source step and the first `max_applied_per_step` are returned,
/// in step order, for runtime validation; the rest become `SkippedPolicy`.
///
/// `required` lists each covered step's required candidate. A step left with
/// no eligible candidate keeps its required one for validation.
pub fn select_for_validation(
    candidates: &mut [AssertionCandidate],
    config: &AssertionPolicyConfig,
    required: &[usize],
) -> Vec<usize> {
    let mut by_step: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, candidate) in candidates.iter_mut().enumerate() {
        if candidate.apply_status.is_some() {
            continue;
        }
        match config.rejection(candidate) {
            Some((status, message)) => candidate.set_status(status, message),
            None => by_step.entry(candidate.index).or_default().push(i),
        }
    }

    for &position in required {
        let Some(candidate) = candidates.get_mut(position) else {
            continue;
        };
        if by_step.contains_key(&candidate.index) {
            continue;
        }
        tracing::debug!(
            index = candidate.index,
            status = ?candidate.apply_status,
            "keeping required candidate of an otherwise uncovered step"
        );
        candidate.apply_status = None;
        candidate.apply_message = None;
        by_step.insert(candidate.index, vec![position]);
    }

    let mut selected = Vec::new();
    for (_, mut positions) in by_step {
        positions.sort_by(|&a, &b| config.compare(&candidates[a], a, &candidates[b], b));
        for (rank, position) in positions.into_iter().enumerate() {
            if rank < config.max_applied_per_step {
                selected.push(position);
            } else {
                candidates[position].set_status(
                    ApplyStatus::SkippedPolicy,
                    format!(
                        "per-step cap of {} reached under {} policy",
                        config.max_applied_per_step, config.policy
                    ),
                );
            }
        }
    }
    selected
}
