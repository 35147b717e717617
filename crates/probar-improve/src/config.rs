//! Run options.
//!
//! Options are resolved once, validated, and passed explicitly to every pass.
//! They can be built in code with the `with_*` methods or loaded from YAML:
//!
//! ```yaml
//! apply_selectors: true
//! apply_assertions: true
//! assertion_source: snapshot-native
//! policy: balanced
//! base_url: https://shop.test
//! ```

use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::assertion::CandidateSource;
use crate::driver::StepRunOptions;
use crate::policy::AssertionPolicy;
use crate::result::{ImproveError, ImproveResult};

/// Default per-step timeout (ms)
pub const DEFAULT_STEP_TIMEOUT_MS: u64 = 30_000;

/// Default network-idle wait after each step (ms)
pub const DEFAULT_NETWORK_IDLE_TIMEOUT_MS: u64 = 2_000;

/// Default snapshot capture timeout (ms)
pub const DEFAULT_SNAPSHOT_TIMEOUT_MS: u64 = 5_000;

/// Options for one improvement run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImproveOptions {
    /// Replace targets with better-scoring candidates
    pub apply_selectors: bool,
    /// Insert validated assertions
    pub apply_assertions: bool,
    /// Assertion producers to run
    #[serde(deserialize_with = "parse_named")]
    pub assertion_source: CandidateSource,
    /// Risk profile
    #[serde(deserialize_with = "parse_named")]
    pub policy: AssertionPolicy,
    /// Per-step timeout (ms)
    pub step_timeout_ms: u64,
    /// Network-idle wait after each step (ms)
    pub network_idle_timeout_ms: u64,
    /// Snapshot capture timeout (ms)
    pub snapshot_timeout_ms: u64,
    /// Base URL for relative navigations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Adopt candidates that resolve to several elements
    pub tolerate_ambiguous_matches: bool,
}

impl Default for ImproveOptions {
    fn default() -> Self {
        Self {
            apply_selectors: false,
            apply_assertions: false,
            assertion_source: CandidateSource::default(),
            policy: AssertionPolicy::default(),
            step_timeout_ms: DEFAULT_STEP_TIMEOUT_MS,
            network_idle_timeout_ms: DEFAULT_NETWORK_IDLE_TIMEOUT_MS,
            snapshot_timeout_ms: DEFAULT_SNAPSHOT_TIMEOUT_MS,
            base_url: None,
            tolerate_ambiguous_matches: false,
        }
    }
}

/// Deserialize through `FromStr` so invalid names carry the corrective hint
fn parse_named<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr<Err = ImproveError>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}

impl ImproveOptions {
    /// Create options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate options from YAML
    pub fn from_yaml_str(yaml: &str) -> ImproveResult<Self> {
        let options: Self = serde_yaml_ng::from_str(yaml)?;
        options.validate()?;
        Ok(options)
    }

    /// Check option values
    pub fn validate(&self) -> ImproveResult<()> {
        for (name, value) in [
            ("step_timeout_ms", self.step_timeout_ms),
            ("network_idle_timeout_ms", self.network_idle_timeout_ms),
            ("snapshot_timeout_ms", self.snapshot_timeout_ms),
        ] {
            if value == 0 {
                return Err(ImproveError::config(format!("{name} must be greater than 0")));
            }
        }
        if let Some(base) = &self.base_url {
            if !(base.starts_with("http://") || base.starts_with("https://")) {
                return Err(ImproveError::config(format!(
                    "base_url must start with http:// or https://, got {base:?}"
                )));
            }
        }
        Ok(())
    }

    /// Enable or disable selector adoption
    #[must_use]
    pub const fn with_apply_selectors(mut self, apply: bool) -> Self {
        self.apply_selectors = apply;
        self
    }

    /// Enable or disable assertion insertion
    #[must_use]
    pub const fn with_apply_assertions(mut self, apply: bool) -> Self {
        self.apply_assertions = apply;
        self
    }

    /// Set the assertion source
    #[must_use]
    pub const fn with_assertion_source(mut self, source: CandidateSource) -> Self {
        self.assertion_source = source;
        self
    }

    /// Set the assertion source by name
    pub fn with_assertion_source_name(self, name: &str) -> ImproveResult<Self> {
        Ok(self.with_assertion_source(name.parse()?))
    }

    /// Set the policy
    #[must_use]
    pub const fn with_policy(mut self, policy: AssertionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the policy by name
    pub fn with_policy_name(self, name: &str) -> ImproveResult<Self> {
        Ok(self.with_policy(name.parse()?))
    }

    /// Set the per-step timeout
    #[must_use]
    pub const fn with_step_timeout_ms(mut self, ms: u64) -> Self {
        self.step_timeout_ms = ms;
        self
    }

    /// Set the network-idle wait
    #[must_use]
    pub const fn with_network_idle_timeout_ms(mut self, ms: u64) -> Self {
        self.network_idle_timeout_ms = ms;
        self
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Tolerate ambiguous matches when adopting selectors
    #[must_use]
    pub const fn with_tolerate_ambiguous_matches(mut self, tolerate: bool) -> Self {
        self.tolerate_ambiguous_matches = tolerate;
        self
    }

    /// Analysis-mode step options
    #[must_use]
    pub fn step_run_options(&self) -> StepRunOptions {
        StepRunOptions::analysis(self.step_timeout_ms, self.base_url.clone())
    }
}
