//! Diagnostics and logging.
//!
//! Soft degradations (snapshot capture failures, network-idle timeouts,
//! volatile locators, replay failures) are collected as [`Diagnostic`]s in a
//! [`DiagnosticLog`] that ends up in the report. Every entry is mirrored to
//! `tracing` at the matching level so embedding binaries see them live.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Diagnostic codes emitted by the passes
pub mod codes {
    /// Locator text criterion looks volatile
    pub const SELECTOR_TARGET_FLAGGED_VOLATILE: &str = "selector_target_flagged_volatile";
    /// A derived locator replaced the recorded one
    pub const SELECTOR_APPLIED: &str = "selector_applied";
    /// Step failed during selector replay
    pub const SELECTOR_REPLAY_FAILED: &str = "selector_replay_failed";
    /// Target could not be resolved to count matches
    pub const TARGET_RESOLUTION_FAILED: &str = "target_resolution_failed";
    /// Accessibility snapshot could not be captured
    pub const SNAPSHOT_CAPTURE_FAILED: &str = "snapshot_capture_failed";
    /// Network-idle wait timed out
    pub const NETWORK_IDLE_TIMEOUT: &str = "network_idle_timeout";
    /// An overlay intercepted a click and was dismissed
    pub const OVERLAY_DISMISSED: &str = "overlay_dismissed";
    /// Failed step removed from the output
    pub const STEP_REMOVED: &str = "step_removed";
    /// Failed step kept and marked optional
    pub const STEP_OPTIONALIZED: &str = "step_optionalized";
    /// Step failed during assertion replay
    pub const ASSERTION_REPLAY_FAILED: &str = "assertion_replay_failed";
    /// An optional step failed during validation replay
    pub const OPTIONAL_STEP_FAILED: &str = "optional_step_failed";
    /// Fallback assertion synthesized for coverage
    pub const COVERAGE_FALLBACK: &str = "coverage_fallback";
}

/// Severity of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    /// Informational
    Info,
    /// Degraded but continuing
    Warning,
    /// A step could not be processed
    Error,
}

/// A non-fatal observation made during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    /// Machine-readable code
    pub code: String,
    /// Severity
    pub level: DiagnosticLevel,
    /// Human-readable message
    pub message: String,
    /// Original index of the step concerned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_index: Option<usize>,
}

impl Diagnostic {
    /// Create a diagnostic
    #[must_use]
    pub fn new(code: &str, level: DiagnosticLevel, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            level,
            message: message.into(),
            step_index: None,
        }
    }

    /// Attach the original step index
    #[must_use]
    pub const fn at_step(mut self, index: usize) -> Self {
        self.step_index = Some(index);
        self
    }
}

/// Accumulator for diagnostics of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticLog {
    entries: Vec<Diagnostic>,
}

impl DiagnosticLog {
    /// Create an empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic and mirror it to tracing
    pub fn push(&mut self, diagnostic: Diagnostic) {
        let step = diagnostic.step_index;
        match diagnostic.level {
            DiagnosticLevel::Info => {
                tracing::info!(code = %diagnostic.code, step = ?step, "{}", diagnostic.message);
            }
            DiagnosticLevel::Warning => {
                tracing::warn!(code = %diagnostic.code, step = ?step, "{}", diagnostic.message);
            }
            DiagnosticLevel::Error => {
                tracing::error!(code = %diagnostic.code, step = ?step, "{}", diagnostic.message);
            }
        }
        self.entries.push(diagnostic);
    }

    /// Record an info diagnostic for a step
    pub fn info(&mut self, code: &str, index: usize, message: impl Into<String>) {
        self.push(Diagnostic::new(code, DiagnosticLevel::Info, message).at_step(index));
    }

    /// Record a warning diagnostic for a step
    pub fn warn(&mut self, code: &str, index: usize, message: impl Into<String>) {
        self.push(Diagnostic::new(code, DiagnosticLevel::Warning, message).at_step(index));
    }

    /// Record an error diagnostic for a step
    pub fn error(&mut self, code: &str, index: usize, message: impl Into<String>) {
        self.push(Diagnostic::new(code, DiagnosticLevel::Error, message).at_step(index));
    }

    /// Append every entry of another log, without re-emitting them
    pub fn extend(&mut self, other: Self) {
        self.entries.extend(other.entries);
    }

    /// All entries in recording order
    #[must_use]
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Entries with a given code
    pub fn with_code<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a Diagnostic> + 'a {
        self.entries.iter().filter(move |d| d.code == code)
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries were recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consume the log
    #[must_use]
    pub fn into_entries(self) -> Vec<Diagnostic> {
        self.entries
    }
}

/// Subscriber settings for binaries embedding the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracingOptions {
    /// Filter directive used when `RUST_LOG` is unset
    pub default_filter: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
    /// Include module targets in output
    pub with_target: bool,
}

impl Default for TracingOptions {
    fn default() -> Self {
        Self {
            default_filter: "info".to_string(),
            json: false,
            with_target: false,
        }
    }
}

impl TracingOptions {
    /// Create default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fallback filter directive
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.default_filter = filter.into();
        self
    }

    /// Enable JSON output
    #[must_use]
    pub const fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }
}

/// Install a global fmt subscriber. Returns false if one was already installed.
pub fn init_tracing(options: &TracingOptions) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&options.default_filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(options.with_target);
    if options.json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_log_records_in_order() {
        let mut log = DiagnosticLog::new();
        log.warn(codes::NETWORK_IDLE_TIMEOUT, 2, "timed out");
        log.info(codes::SELECTOR_APPLIED, 3, "applied");
        assert_eq!(log.len(), 2);
        assert_eq!(log.entries()[0].step_index, Some(2));
        assert_eq!(log.entries()[0].level, DiagnosticLevel::Warning);
        assert_eq!(log.with_code(codes::SELECTOR_APPLIED).count(), 1);
    }

    #[test]
    fn test_diagnostic_serde_shape() {
        let diagnostic = Diagnostic::new(
            codes::SNAPSHOT_CAPTURE_FAILED,
            DiagnosticLevel::Warning,
            "no snapshot",
        )
        .at_step(4);
        let json = serde_json::to_value(&diagnostic).unwrap();
        assert_eq!(json["level"], "warning");
        assert_eq!(json["stepIndex"], 4);
    }

    #[test]
    fn test_extend_keeps_order() {
        let mut a = DiagnosticLog::new();
        a.info("a", 0, "first");
        let mut b = DiagnosticLog::new();
        b.info("b", 1, "second");
        a.extend(b);
        let codes: Vec<_> = a.entries().iter().map(|d| d.code.as_str()).collect();
        assert_eq!(codes, vec!["a", "b"]);
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        let options = TracingOptions::new().with_filter("debug");
        let _ = init_tracing(&options);
        assert!(!init_tracing(&options));
    }
}
