//! Accessibility snapshots: parsing, noise filtering and before/after diffing.

pub mod diff;
pub mod noise;
pub mod parse;

use serde::{Deserialize, Serialize};

use crate::step::Step;

pub use diff::{diff_snapshots, SnapshotDelta, StateChange, StateTransition, TextChange};
pub use noise::{is_noisy_text, MAX_TEXT_CHARS, MIN_TEXT_CHARS};
pub use parse::{normalize, parse_snapshot, SnapshotNode};

/// Raw snapshots captured around one step. Immutable once captured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSnapshot {
    /// Original index of the step
    pub index: usize,
    /// The step as it was executed
    pub step: Step,
    /// Snapshot text before the step
    pub pre_snapshot: String,
    /// Snapshot text after the step
    pub post_snapshot: String,
    /// URL before the step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_url: Option<String>,
    /// URL after the step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_url: Option<String>,
    /// Title before the step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_title: Option<String>,
    /// Title after the step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_title: Option<String>,
}

impl StepSnapshot {
    /// Create a snapshot pair without URL or title information
    #[must_use]
    pub fn new(
        index: usize,
        step: Step,
        pre_snapshot: impl Into<String>,
        post_snapshot: impl Into<String>,
    ) -> Self {
        Self {
            index,
            step,
            pre_snapshot: pre_snapshot.into(),
            post_snapshot: post_snapshot.into(),
            pre_url: None,
            post_url: None,
            pre_title: None,
            post_title: None,
        }
    }

    /// Set before/after URLs
    #[must_use]
    pub fn with_urls(mut self, pre: Option<String>, post: Option<String>) -> Self {
        self.pre_url = pre;
        self.post_url = post;
        self
    }

    /// Set before/after titles
    #[must_use]
    pub fn with_titles(mut self, pre: Option<String>, post: Option<String>) -> Self {
        self.pre_title = pre;
        self.post_title = post;
        self
    }

    /// Parsed pre-step nodes
    #[must_use]
    pub fn pre_nodes(&self) -> Vec<SnapshotNode> {
        parse_snapshot(&self.pre_snapshot)
    }

    /// Parsed post-step nodes
    #[must_use]
    pub fn post_nodes(&self) -> Vec<SnapshotNode> {
        parse_snapshot(&self.post_snapshot)
    }

    /// Diff of the pre- and post-step trees
    #[must_use]
    pub fn delta(&self) -> SnapshotDelta {
        diff_snapshots(&self.pre_nodes(), &self.post_nodes())
    }
}
