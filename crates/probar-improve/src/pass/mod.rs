//! The two passes over a recorded test.

pub mod assertion;
pub mod selector;

pub use assertion::{build_candidates, run_assertion_pass, AssertionPassOutput};
pub use selector::{run_selector_pass, FailureAction, SelectorPassOutput, StepFinding};
