//! Locator candidates: generation, volatile-text repair and scoring.

pub mod expression;
pub mod generate;
pub mod repair;
pub mod score;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::target::Target;

pub use expression::{ExpressionError, LocatorExpression};
pub use generate::{generate_candidates, CandidateSet};
pub use repair::{analyze_volatile_target, RepairFinding};
pub use score::{is_auto_applicable, score_candidates, score_locator, score_target, select_best};

/// Reason codes attached to target candidates
pub mod reason {
    /// The step's own target
    pub const CURRENT_TARGET: &str = "current_target";
    /// Rewritten from a `data-testid` selector
    pub const DERIVED_FROM_TEST_ID: &str = "derived_from_test_id";
    /// Rewritten from a CSS selector
    pub const DERIVED_FROM_CSS: &str = "derived_from_css";
    /// Rewritten from an XPath
    pub const DERIVED_FROM_XPATH: &str = "derived_from_xpath";
    /// Rewritten from an engine-prefixed selector
    pub const DERIVED_FROM_ENGINE_SELECTOR: &str = "derived_from_engine_selector";
    /// Volatile text repair with the exact-match constraint removed
    pub const REPAIR_EXACT_REMOVED: &str = "repair_exact_removed";
    /// Volatile text repair using an anchored regex prefix
    pub const REPAIR_REGEX_PREFIX: &str = "repair_regex_prefix";
    /// Chain contains `nth`/`first`/`last`
    pub const POSITIONAL_CHAIN: &str = "positional_chain";
    /// Chain contains `filter`
    pub const CONTENT_FILTER: &str = "content_filter";
    /// Matched more than one live element
    pub const AMBIGUOUS_MATCH: &str = "ambiguous_match";
    /// Matched no live element
    pub const NO_MATCH: &str = "no_match";
    /// Value is not a supported accessor chain
    pub const UNRECOGNIZED_SHAPE: &str = "unrecognized_shape";
}

/// Whether a candidate is the step's own target or an alternative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateOrigin {
    /// The target as recorded
    Current,
    /// Produced by rewriting or repair
    Derived,
}

impl CandidateOrigin {
    /// Tie-break priority, lower wins
    #[must_use]
    pub const fn priority(&self) -> u8 {
        match self {
            Self::Current => 0,
            Self::Derived => 1,
        }
    }
}

/// A proposed locator for one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetCandidate {
    /// Deterministic id derived from the target's stable key
    pub id: String,
    /// Proposed target
    pub target: Target,
    /// Current or derived
    pub source: CandidateOrigin,
    /// Why the candidate exists
    pub reason_codes: Vec<String>,
}

impl TargetCandidate {
    /// Create a candidate with a single reason code
    #[must_use]
    pub fn new(target: Target, source: CandidateOrigin, reason: &str) -> Self {
        Self {
            id: candidate_id(&target),
            target,
            source,
            reason_codes: vec![reason.to_string()],
        }
    }
}

/// A candidate with its stability score and live match count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetCandidateScore {
    /// The scored candidate
    pub candidate: TargetCandidate,
    /// Stability score in `[0, 1]`
    pub score: f64,
    /// Live elements matched, when a page was available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_count: Option<usize>,
    /// Candidate reasons plus scoring observations
    pub reason_codes: Vec<String>,
}

/// `tc-` followed by the first 8 hex digits of the SHA-256 of the stable key
#[must_use]
pub fn candidate_id(target: &Target) -> String {
    let digest = Sha256::digest(target.stable_key().as_bytes());
    let hex: String = digest.iter().take(4).map(|b| format!("{b:02x}")).collect();
    format!("tc-{hex}")
}
