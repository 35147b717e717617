//! Element targets.
//!
//! A [`Target`] is the serializable reference a recorded step keeps to a page
//! element. Targets are replaced wholesale when a better locator is adopted;
//! they are never mutated in place.

use serde::{Deserialize, Serialize};

use crate::locator::expression::{quote, LocatorExpression};

/// How the target value should be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TargetKind {
    /// Chain of accessor calls, e.g. `getByRole('button', { name: 'Save' })`
    LocatorExpression,
    /// Raw CSS selector string
    Css,
    /// XPath expression
    Xpath,
    /// Engine-prefixed selector string, e.g. `internal:testid=[data-testid="x"s]`
    EngineSelector,
    /// Could not be classified
    Unknown,
}

impl TargetKind {
    /// Stable name used in keys and reports
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::LocatorExpression => "locatorExpression",
            Self::Css => "css",
            Self::Xpath => "xpath",
            Self::EngineSelector => "engineSelector",
            Self::Unknown => "unknown",
        }
    }

    /// Guess the kind of a raw value
    #[must_use]
    pub fn infer(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Self::Unknown;
        }
        if LocatorExpression::parse(trimmed).is_ok() {
            return Self::LocatorExpression;
        }
        if trimmed.starts_with("//") || trimmed.starts_with("xpath=") || trimmed.starts_with("(//")
        {
            return Self::Xpath;
        }
        if trimmed.starts_with("internal:")
            || trimmed.contains(">>")
            || ["data-testid=", "role=", "text=", "css=", "id="]
                .iter()
                .any(|p| trimmed.starts_with(p))
        {
            return Self::EngineSelector;
        }
        Self::Css
    }
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a target came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetSource {
    /// Written by hand
    #[default]
    Manual,
    /// Recorder structured output
    CodegenJsonl,
    /// Recorder fallback output
    CodegenFallback,
    /// Produced by the selector pass
    Derived,
}

impl TargetSource {
    /// Stable name used in keys and reports
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::CodegenJsonl => "codegen_jsonl",
            Self::CodegenFallback => "codegen_fallback",
            Self::Derived => "derived",
        }
    }
}

/// A reference to a page element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    /// Locator string
    pub value: String,
    /// How `value` is interpreted
    pub kind: TargetKind,
    /// Provenance
    #[serde(default)]
    pub source: TargetSource,
    /// Frame-boundary selectors from the document root to the target's frame
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub frame_path: Vec<String>,
    /// Alternates tried via logical OR at resolution time
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallbacks: Vec<Target>,
}

impl Target {
    /// Create a target with an explicit kind
    #[must_use]
    pub fn new(value: impl Into<String>, kind: TargetKind) -> Self {
        Self {
            value: value.into(),
            kind,
            source: TargetSource::Manual,
            frame_path: Vec::new(),
            fallbacks: Vec::new(),
        }
    }

    /// Create a locator-expression target
    #[must_use]
    pub fn expression(value: impl Into<String>) -> Self {
        Self::new(value, TargetKind::LocatorExpression)
    }

    /// Create a CSS target
    #[must_use]
    pub fn css(value: impl Into<String>) -> Self {
        Self::new(value, TargetKind::Css)
    }

    /// Create a target, inferring its kind
    #[must_use]
    pub fn infer(value: impl Into<String>) -> Self {
        let value = value.into();
        let kind = TargetKind::infer(&value);
        Self::new(value, kind)
    }

    /// Set the provenance
    #[must_use]
    pub fn with_source(mut self, source: TargetSource) -> Self {
        self.source = source;
        self
    }

    /// Set the frame path
    #[must_use]
    pub fn with_frame_path(mut self, frame_path: Vec<String>) -> Self {
        self.frame_path = frame_path;
        self
    }

    /// Set the fallback targets
    #[must_use]
    pub fn with_fallbacks(mut self, fallbacks: Vec<Target>) -> Self {
        self.fallbacks = fallbacks;
        self
    }

    /// A derived target with a new value and kind.
    ///
    /// Frame path and fallbacks are kept so alternates survive a locator upgrade.
    #[must_use]
    pub fn rewritten(&self, value: impl Into<String>, kind: TargetKind) -> Self {
        Self {
            value: value.into(),
            kind,
            source: TargetSource::Derived,
            frame_path: self.frame_path.clone(),
            fallbacks: self.fallbacks.clone(),
        }
    }

    /// Deduplication key over `(value, kind, source, frame_path)`
    #[must_use]
    pub fn stable_key(&self) -> String {
        format!(
            "{}\u{1f}{}\u{1f}{}\u{1f}{}",
            self.value.trim(),
            self.kind.as_str(),
            self.source.as_str(),
            self.frame_path.join(" >> ")
        )
    }

    /// Whitespace- and quote-insensitive form of the value for equality checks
    #[must_use]
    pub fn normalized_value(&self) -> String {
        self.value
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .replace('"', "'")
    }

    /// Expression for the primary target alone, including frame hops
    #[must_use]
    pub fn primary_expression(&self) -> String {
        let mut out = String::new();
        for frame in &self.frame_path {
            out.push_str("frameLocator(");
            out.push_str(&quote(frame));
            out.push_str(").");
        }
        match self.kind {
            TargetKind::LocatorExpression => {
                out.push_str(self.value.trim().trim_start_matches("page."));
            }
            TargetKind::Xpath if !self.value.starts_with("xpath=") => {
                out.push_str("locator(");
                out.push_str(&quote(&format!("xpath={}", self.value)));
                out.push(')');
            }
            TargetKind::Css | TargetKind::Xpath | TargetKind::EngineSelector | TargetKind::Unknown => {
                out.push_str("locator(");
                out.push_str(&quote(&self.value));
                out.push(')');
            }
        }
        out
    }

    /// Expression combining the primary target with its fallbacks via `.or(...)`
    #[must_use]
    pub fn resolution_expression(&self) -> String {
        let mut out = self.primary_expression();
        for fallback in &self.fallbacks {
            out.push_str(".or(");
            out.push_str(&fallback.resolution_expression());
            out.push(')');
        }
        out
    }
}
