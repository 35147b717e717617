//! Before/after snapshot differ.
//!
//! Infers what a step changed on the page from the accessibility trees captured
//! immediately before and after it ran.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::noise::is_noisy_text;
use super::parse::{normalize, SnapshotNode};

/// A node whose text changed while its identity stayed the same
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChange {
    /// Node after the step
    pub node: SnapshotNode,
    /// Text before
    pub old_text: String,
    /// Text after
    pub new_text: String,
}

/// Kind of state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateTransition {
    /// disabled → enabled
    Enabled,
    /// enabled → disabled
    Disabled,
    /// collapsed → expanded
    Expanded,
    /// expanded → collapsed
    Collapsed,
}

/// A state transition of an identity-matched node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    /// Node after the step
    pub node: SnapshotNode,
    /// What changed
    pub transition: StateTransition,
}

/// Result of diffing two snapshots
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDelta {
    /// Post nodes whose signature did not exist before the step
    pub delta: Vec<SnapshotNode>,
    /// Post nodes whose signature existed before the step
    pub stable: Vec<SnapshotNode>,
    /// Text changes of identity-matched nodes
    pub text_changes: Vec<TextChange>,
    /// Enabled/expanded transitions of identity-matched nodes
    pub state_changes: Vec<StateChange>,
}

impl SnapshotDelta {
    /// Whether the step changed nothing observable
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.delta.is_empty() && self.text_changes.is_empty() && self.state_changes.is_empty()
    }
}

/// Inline text of a node, without falling back to its name
fn own_text(node: &SnapshotNode) -> Option<String> {
    node.text
        .as_deref()
        .map(normalize)
        .filter(|t| !t.is_empty())
}

/// Diff pre- and post-step nodes
#[must_use]
pub fn diff_snapshots(pre: &[SnapshotNode], post: &[SnapshotNode]) -> SnapshotDelta {
    let pre_signatures: HashSet<_> = pre.iter().map(SnapshotNode::signature).collect();

    let mut pre_by_identity: HashMap<String, &SnapshotNode> = HashMap::new();
    for node in pre {
        pre_by_identity.entry(node.identity_key()).or_insert(node);
    }

    let mut result = SnapshotDelta::default();
    let mut paired: HashSet<String> = HashSet::new();

    for node in post {
        if pre_signatures.contains(&node.signature()) {
            result.stable.push(node.clone());
        } else {
            result.delta.push(node.clone());
        }

        let key = node.identity_key();
        let Some(before) = pre_by_identity.get(&key) else {
            continue;
        };
        if !paired.insert(key) {
            continue;
        }

        if let (Some(old_text), Some(new_text)) = (own_text(before), own_text(node)) {
            if old_text != new_text && !is_noisy_text(&old_text) && !is_noisy_text(&new_text) {
                result.text_changes.push(TextChange {
                    node: node.clone(),
                    old_text,
                    new_text,
                });
            }
        }

        if before.enabled != node.enabled {
            result.state_changes.push(StateChange {
                node: node.clone(),
                transition: if node.enabled {
                    StateTransition::Enabled
                } else {
                    StateTransition::Disabled
                },
            });
        }
        if before.expanded != node.expanded {
            let transition = match node.expanded {
                Some(true) => Some(StateTransition::Expanded),
                Some(false) => Some(StateTransition::Collapsed),
                None => None,
            };
            if let Some(transition) = transition {
                result.state_changes.push(StateChange {
                    node: node.clone(),
                    transition,
                });
            }
        }
    }
    result
}
