//! Recorded test steps.
//!
//! [`Action`] is a closed, tagged union. Every consumer matches it
//! exhaustively, so adding an action kind forces a compile-time review of the
//! selector pass, the assertion builders and the coverage planner.

use serde::{Deserialize, Serialize};

use crate::target::Target;

/// Discriminant of an [`Action`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    /// Navigate to a URL
    Navigate,
    /// Click an element
    Click,
    /// Fill a text input
    Fill,
    /// Select an option
    Select,
    /// Check a checkbox
    Check,
    /// Uncheck a checkbox
    Uncheck,
    /// Hover an element
    Hover,
    /// Press a key on an element
    Press,
    /// Element is visible
    AssertVisible,
    /// Element has text
    AssertText,
    /// Input has value
    AssertValue,
    /// Checkbox state
    AssertChecked,
    /// Enabled state
    AssertEnabled,
    /// Page URL
    AssertUrl,
    /// Page title
    AssertTitle,
}

impl ActionKind {
    /// Name as written in test files
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Navigate => "navigate",
            Self::Click => "click",
            Self::Fill => "fill",
            Self::Select => "select",
            Self::Check => "check",
            Self::Uncheck => "uncheck",
            Self::Hover => "hover",
            Self::Press => "press",
            Self::AssertVisible => "assertVisible",
            Self::AssertText => "assertText",
            Self::AssertValue => "assertValue",
            Self::AssertChecked => "assertChecked",
            Self::AssertEnabled => "assertEnabled",
            Self::AssertUrl => "assertUrl",
            Self::AssertTitle => "assertTitle",
        }
    }

    /// Whether this kind is an assertion
    #[must_use]
    pub const fn is_assertion(&self) -> bool {
        matches!(
            self,
            Self::AssertVisible
                | Self::AssertText
                | Self::AssertValue
                | Self::AssertChecked
                | Self::AssertEnabled
                | Self::AssertUrl
                | Self::AssertTitle
        )
    }

    /// Whether this kind interacts with an element
    #[must_use]
    pub const fn is_interaction(&self) -> bool {
        matches!(
            self,
            Self::Click
                | Self::Fill
                | Self::Select
                | Self::Check
                | Self::Uncheck
                | Self::Hover
                | Self::Press
        )
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn default_true() -> bool {
    true
}

/// What a step does
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Action {
    /// Navigate to a URL
    Navigate {
        /// Destination, absolute or relative to the base URL
        url: String,
    },
    /// Click an element
    Click {
        /// Element
        target: Target,
    },
    /// Fill a text input
    Fill {
        /// Element
        target: Target,
        /// Text typed
        text: String,
    },
    /// Select an option
    Select {
        /// Element
        target: Target,
        /// Selected value
        value: String,
    },
    /// Check a checkbox
    Check {
        /// Element
        target: Target,
    },
    /// Uncheck a checkbox
    Uncheck {
        /// Element
        target: Target,
    },
    /// Hover an element
    Hover {
        /// Element
        target: Target,
    },
    /// Press a key while an element is focused
    Press {
        /// Element
        target: Target,
        /// Key name
        key: String,
    },
    /// Element is visible
    AssertVisible {
        /// Element
        target: Target,
    },
    /// Element has text
    AssertText {
        /// Element
        target: Target,
        /// Expected text
        text: String,
    },
    /// Input has value
    AssertValue {
        /// Element
        target: Target,
        /// Expected value
        value: String,
    },
    /// Checkbox state
    AssertChecked {
        /// Element
        target: Target,
        /// Expected state
        #[serde(default = "default_true")]
        checked: bool,
    },
    /// Enabled state
    AssertEnabled {
        /// Element
        target: Target,
        /// Expected state
        #[serde(default = "default_true")]
        enabled: bool,
    },
    /// Page URL
    AssertUrl {
        /// Expected URL
        url: String,
    },
    /// Page title
    AssertTitle {
        /// Expected title
        title: String,
    },
}

impl Action {
    /// Discriminant
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::Navigate { .. } => ActionKind::Navigate,
            Self::Click { .. } => ActionKind::Click,
            Self::Fill { .. } => ActionKind::Fill,
            Self::Select { .. } => ActionKind::Select,
            Self::Check { .. } => ActionKind::Check,
            Self::Uncheck { .. } => ActionKind::Uncheck,
            Self::Hover { .. } => ActionKind::Hover,
            Self::Press { .. } => ActionKind::Press,
            Self::AssertVisible { .. } => ActionKind::AssertVisible,
            Self::AssertText { .. } => ActionKind::AssertText,
            Self::AssertValue { .. } => ActionKind::AssertValue,
            Self::AssertChecked { .. } => ActionKind::AssertChecked,
            Self::AssertEnabled { .. } => ActionKind::AssertEnabled,
            Self::AssertUrl { .. } => ActionKind::AssertUrl,
            Self::AssertTitle { .. } => ActionKind::AssertTitle,
        }
    }

    /// Element the action operates on
    #[must_use]
    pub const fn target(&self) -> Option<&Target> {
        match self {
            Self::Navigate { .. } | Self::AssertUrl { .. } | Self::AssertTitle { .. } => None,
            Self::Click { target }
            | Self::Fill { target, .. }
            | Self::Select { target, .. }
            | Self::Check { target }
            | Self::Uncheck { target }
            | Self::Hover { target }
            | Self::Press { target, .. }
            | Self::AssertVisible { target }
            | Self::AssertText { target, .. }
            | Self::AssertValue { target, .. }
            | Self::AssertChecked { target, .. }
            | Self::AssertEnabled { target, .. } => Some(target),
        }
    }

    /// Copy of this action with its target replaced; target-less actions are returned unchanged
    #[must_use]
    pub fn with_target(&self, new_target: Target) -> Self {
        let mut next = self.clone();
        match &mut next {
            Self::Navigate { .. } | Self::AssertUrl { .. } | Self::AssertTitle { .. } => {}
            Self::Click { target }
            | Self::Fill { target, .. }
            | Self::Select { target, .. }
            | Self::Check { target }
            | Self::Uncheck { target }
            | Self::Hover { target }
            | Self::Press { target, .. }
            | Self::AssertVisible { target }
            | Self::AssertText { target, .. }
            | Self::AssertValue { target, .. }
            | Self::AssertChecked { target, .. }
            | Self::AssertEnabled { target, .. } => *target = new_target,
        }
        next
    }

    /// Text, value, URL or title the action carries
    #[must_use]
    pub fn payload(&self) -> Option<String> {
        match self {
            Self::Navigate { url } | Self::AssertUrl { url } => Some(url.clone()),
            Self::Fill { text, .. } | Self::AssertText { text, .. } => Some(text.clone()),
            Self::Select { value, .. } | Self::AssertValue { value, .. } => Some(value.clone()),
            Self::Press { key, .. } => Some(key.clone()),
            Self::AssertChecked { checked, .. } => Some(checked.to_string()),
            Self::AssertEnabled { enabled, .. } => Some(enabled.to_string()),
            Self::AssertTitle { title } => Some(title.clone()),
            Self::Click { .. }
            | Self::Check { .. }
            | Self::Uncheck { .. }
            | Self::Hover { .. }
            | Self::AssertVisible { .. } => None,
        }
    }

    /// Key identifying equivalent actions: kind, normalized target and normalized payload
    #[must_use]
    pub fn equivalence_key(&self) -> String {
        let target = self.target().map(Target::normalized_value).unwrap_or_default();
        let payload = self
            .payload()
            .map(|p| p.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase())
            .unwrap_or_default();
        format!("{}|{}|{}", self.kind().as_str(), target, payload)
    }
}

/// A recorded test step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// What the step does
    #[serde(flatten)]
    pub action: Action,
    /// Optional steps may fail without failing the test
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Step {
    /// Create a step from an action
    #[must_use]
    pub const fn new(action: Action) -> Self {
        Self {
            action,
            optional: false,
            description: None,
        }
    }

    /// Navigate step
    #[must_use]
    pub fn navigate(url: impl Into<String>) -> Self {
        Self::new(Action::Navigate { url: url.into() })
    }

    /// Click step
    #[must_use]
    pub fn click(target: Target) -> Self {
        Self::new(Action::Click { target })
    }

    /// Fill step
    #[must_use]
    pub fn fill(target: Target, text: impl Into<String>) -> Self {
        Self::new(Action::Fill {
            target,
            text: text.into(),
        })
    }

    /// Visibility assertion step
    #[must_use]
    pub fn assert_visible(target: Target) -> Self {
        Self::new(Action::AssertVisible { target })
    }

    /// Text assertion step
    #[must_use]
    pub fn assert_text(target: Target, text: impl Into<String>) -> Self {
        Self::new(Action::AssertText {
            target,
            text: text.into(),
        })
    }

    /// Set the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Copy of this step marked optional
    #[must_use]
    pub fn optionalized(&self) -> Self {
        Self {
            optional: true,
            ..self.clone()
        }
    }

    /// Copy of this step with its target replaced
    #[must_use]
    pub fn with_target(&self, target: Target) -> Self {
        Self {
            action: self.action.with_target(target),
            ..self.clone()
        }
    }

    /// Discriminant of the action
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        self.action.kind()
    }

    /// Element the step operates on
    #[must_use]
    pub const fn target(&self) -> Option<&Target> {
        self.action.target()
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.target(), self.action.payload()) {
            (Some(target), Some(payload)) => {
                write!(f, "{} {} = {:?}", self.kind(), target.value, payload)
            }
            (Some(target), None) => write!(f, "{} {}", self.kind(), target.value),
            (None, Some(payload)) => write!(f, "{} {}", self.kind(), payload),
            (None, None) => write!(f, "{}", self.kind()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::target::TargetKind;

    #[test]
    fn test_kind_classification() {
        assert!(ActionKind::Fill.is_interaction());
        assert!(!ActionKind::Navigate.is_interaction());
        assert!(ActionKind::AssertUrl.is_assertion());
        assert!(!ActionKind::Press.is_assertion());
    }

    #[test]
    fn test_with_target_replaces_wholesale() {
        let step = Step::fill(Target::css("#name"), "Alice");
        let next = step.with_target(Target::expression("getByLabel('Name')"));
        assert_eq!(step.target().unwrap().value, "#name");
        assert_eq!(next.target().unwrap().kind, TargetKind::LocatorExpression);
        assert_eq!(next.action.payload().as_deref(), Some("Alice"));
    }

    #[test]
    fn test_with_target_ignores_navigate() {
        let step = Step::navigate("/home");
        assert_eq!(step.with_target(Target::css("#x")), step);
    }

    #[test]
    fn test_equivalence_key_normalizes() {
        let a = Step::assert_text(Target::css("h1"), "Welcome  back").action;
        let b = Step::assert_text(Target::css("h1"), "welcome back").action;
        assert_eq!(a.equivalence_key(), b.equivalence_key());
        let c = Step::assert_visible(Target::css("h1")).action;
        assert_ne!(a.equivalence_key(), c.equivalence_key());
    }

    #[test]
    fn test_serde_tagged_shape() {
        let step = Step::fill(Target::css("#email"), "a@b.c");
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["action"], "fill");
        assert_eq!(json["text"], "a@b.c");
        assert!(json.get("optional").is_none());

        let parsed: Step = serde_json::from_value(serde_json::json!({
            "action": "assertChecked",
            "target": { "value": "#agree", "kind": "css" }
        }))
        .unwrap();
        assert_eq!(
            parsed.action,
            Action::AssertChecked {
                target: Target::css("#agree"),
                checked: true
            }
        );
    }

    #[test]
    fn test_optionalized_keeps_action() {
        let step = Step::click(Target::css("#go"));
        let optional = step.optionalized();
        assert!(optional.optional);
        assert_eq!(optional.action, step.action);
        let json = serde_json::to_value(&optional).unwrap();
        assert_eq!(json["optional"], true);
    }

    #[test]
    fn test_display() {
        assert_eq!(Step::navigate("/").to_string(), "navigate /");
        assert_eq!(Step::click(Target::css("#go")).to_string(), "click #go");
    }
}
