//! Probar Improve: locator repair and assertion synthesis for recorded browser tests
//!
//! Takes a recorded sequence of UI steps and, against a live page,
//!
//! - upgrades brittle element locators to more resilient ones, and
//! - proposes, validates and inserts assertions that give the test real
//!   pass/fail coverage without asserting on content that changes between runs.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                        improve_steps                                 │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  selector pass                         assertion pass                │
//! │  ┌───────────────────────────┐         ┌───────────────────────────┐ │
//! │  │ generate → score → adopt  │         │ deterministic / snapshot  │ │
//! │  │ replay step (analysis)    │────────►│ inventory → dedupe        │ │
//! │  │ pre/post snapshots        │  steps  │ coverage → policy         │ │
//! │  │ remove / optionalize      │  snaps  │ validate → insert         │ │
//! │  └───────────────────────────┘         └───────────────────────────┘ │
//! │                 │                                  │                 │
//! │                 └──────────► PageDriver ◄──────────┘                 │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use probar_improve::prelude::*;
//!
//! let options = ImproveOptions::new()
//!     .with_apply_selectors(true)
//!     .with_apply_assertions(true)
//!     .with_policy(AssertionPolicy::Balanced);
//! let outcome = improve_steps(&mut driver, &steps, &options).await?;
//! println!("{}", outcome.report.to_json()?);
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

pub mod assertion;
pub mod config;
pub mod coverage;
pub mod driver;
pub mod improve;
pub mod index_map;
pub mod locator;
pub mod pass;
pub mod policy;
pub mod report;
mod result;
pub mod runtime;
pub mod snapshot;
pub mod step;
pub mod target;
pub mod tracing_support;
pub mod volatility;

pub use assertion::{
    ApplyStatus, AssertionCandidate, CandidateSource, DeterministicSkip,
};
pub use config::ImproveOptions;
pub use coverage::{plan_coverage, CoveragePlan};
pub use driver::{
    ExecutionMode, PageDriver, PageState, ResolvedTarget, ScriptedPage, StepRunOptions,
};
pub use improve::{improve_steps, ImproveOutcome};
pub use index_map::StepIndexMap;
pub use locator::{
    generate_candidates, score_locator, score_target, CandidateOrigin, TargetCandidate,
    TargetCandidateScore,
};
pub use pass::{FailureAction, StepFinding};
pub use policy::{AssertionPolicy, AssertionPolicyConfig};
pub use report::{ImproveReport, ImproveSummary};
pub use result::{classify_launch_failure, ImproveError, ImproveResult, INSTALL_COMMAND};
pub use snapshot::{diff_snapshots, parse_snapshot, SnapshotDelta, SnapshotNode, StepSnapshot};
pub use step::{Action, ActionKind, Step};
pub use target::{Target, TargetKind, TargetSource};
pub use tracing_support::{init_tracing, Diagnostic, DiagnosticLevel, DiagnosticLog, TracingOptions};
pub use volatility::{detect_signals, is_volatile_criterion, is_volatile_text, VolatileSignal};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::assertion::{
        ApplyStatus, AssertionCandidate, CandidateSource, DeterministicSkip,
    };
    pub use super::config::*;
    pub use super::coverage::*;
    pub use super::driver::*;
    pub use super::improve::*;
    pub use super::index_map::*;
    pub use super::locator::{
        generate_candidates, is_auto_applicable, score_candidates, score_locator, score_target,
        select_best, CandidateOrigin, TargetCandidate, TargetCandidateScore,
    };
    pub use super::pass::{FailureAction, StepFinding};
    pub use super::policy::*;
    pub use super::report::*;
    pub use super::result::*;
    pub use super::snapshot::{
        diff_snapshots, parse_snapshot, SnapshotDelta, SnapshotNode, StepSnapshot,
    };
    pub use super::step::*;
    pub use super::target::*;
    pub use super::tracing_support::{
        init_tracing, Diagnostic, DiagnosticLevel, DiagnosticLog, TracingOptions,
    };
    pub use super::volatility::*;
}
