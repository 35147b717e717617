//! Live replay: playing steps on the page and validating assertion candidates.

pub mod replay;
pub mod validate;

pub use replay::{execute_with_overlay_retry, play_step, PlayedStep};
pub use validate::{has_adjacent_equivalent, validate_candidates, ValidationSummary};
