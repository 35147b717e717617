//! Result and error types for Probar Improve.
//!
//! Errors fall into four groups:
//!
//! - **User input**: malformed policy or assertion-source selections. Raised
//!   immediately with a corrective hint, never silently defaulted.
//! - **Replay**: a step failed against the live page. The passes record these
//!   as diagnostics; the error type only surfaces from the driver seam.
//! - **Environment**: the browser engine is not installed. Distinguished from a
//!   generic launch failure so callers can print the remediation command.
//! - **Plumbing**: (de)serialization.
//!
//! Soft degradations (snapshot capture failure, network-idle timeout) are not
//! errors at all; see [`crate::tracing_support::Diagnostic`].

use thiserror::Error;

/// Result type for Probar Improve operations
pub type ImproveResult<T> = Result<T, ImproveError>;

/// Command suggested when the browser engine is missing
pub const INSTALL_COMMAND: &str = "npx playwright install chromium";

/// Errors that can occur while improving a test
#[derive(Debug, Error)]
pub enum ImproveError {
    /// Unknown assertion policy name
    #[error("Invalid assertion policy '{value}'. Use one of: reliable, balanced, aggressive")]
    InvalidPolicy {
        /// Value that was supplied
        value: String,
    },

    /// Unknown assertion source name
    #[error(
        "Invalid assertion source '{value}'. Use one of: deterministic, snapshot-native, snapshot-cli"
    )]
    InvalidAssertionSource {
        /// Value that was supplied
        value: String,
    },

    /// Invalid option combination or value
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Error message
        message: String,
    },

    /// Browser engine is not installed on this machine
    #[error("Browser '{browser}' is not installed. Run `{command}` and retry")]
    BrowserNotInstalled {
        /// Browser name
        browser: String,
        /// Remediation command
        command: String,
    },

    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunchError {
        /// Error message
        message: String,
    },

    /// A target could not be resolved on the page
    #[error("Could not resolve target {target}: {message}")]
    TargetResolution {
        /// Target value
        target: String,
        /// Error message
        message: String,
    },

    /// The page driver reported a failure
    #[error("Page driver error: {message}")]
    Driver {
        /// Error message
        message: String,
    },

    /// Accessibility snapshot capture failed
    #[error("Snapshot capture failed: {message}")]
    SnapshotCapture {
        /// Error message
        message: String,
    },

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl ImproveError {
    /// Create a driver error
    #[must_use]
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Whether this error is a user input error
    #[must_use]
    pub const fn is_user_input(&self) -> bool {
        matches!(
            self,
            Self::InvalidPolicy { .. }
                | Self::InvalidAssertionSource { .. }
                | Self::InvalidConfig { .. }
        )
    }
}

/// Message fragments emitted by browser launchers when the engine binary is missing
const NOT_INSTALLED_PATTERNS: &[&str] = &[
    "executable doesn't exist",
    "executable does not exist",
    "please run the following command to download new browsers",
    "browser is not installed",
    "could not find chromium",
    "could not find browser",
    "no such file or directory",
    "failed to find executable",
];

/// Map a browser launch failure message to an error.
///
/// Missing-engine failures become [`ImproveError::BrowserNotInstalled`] with the
/// remediation command; everything else stays a generic launch error.
#[must_use]
pub fn classify_launch_failure(browser: &str, message: &str) -> ImproveError {
    let lowered = message.to_lowercase();
    if NOT_INSTALLED_PATTERNS.iter().any(|p| lowered.contains(p)) {
        ImproveError::BrowserNotInstalled {
            browser: browser.to_string(),
            command: INSTALL_COMMAND.to_string(),
        }
    } else {
        ImproveError::BrowserLaunchError {
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_policy_has_hint() {
        let err = ImproveError::InvalidPolicy {
            value: "safe".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("'safe'"));
        assert!(text.contains("reliable, balanced, aggressive"));
        assert!(err.is_user_input());
    }

    #[test]
    fn test_missing_executable_is_not_installed() {
        let err = classify_launch_failure(
            "chromium",
            "browserType.launch: Executable doesn't exist at /ms-playwright/chromium-1140/chrome",
        );
        assert!(matches!(err, ImproveError::BrowserNotInstalled { .. }));
        assert!(err.to_string().contains(INSTALL_COMMAND));
        assert!(!err.is_user_input());
    }

    #[test]
    fn test_generic_launch_failure_stays_generic() {
        let err = classify_launch_failure("chromium", "Target closed unexpectedly");
        assert!(matches!(err, ImproveError::BrowserLaunchError { .. }));
        assert!(err.to_string().contains("Target closed"));
    }

    #[test]
    fn test_driver_error_display() {
        let err = ImproveError::driver("element detached from DOM");
        assert_eq!(err.to_string(), "Page driver error: element detached from DOM");
        assert!(!err.is_user_input());
    }

    #[test]
    fn test_yaml_error_from() {
        let yaml_err = serde_yaml_ng::from_str::<Vec<u8>>("{").unwrap_err();
        let err: ImproveError = yaml_err.into();
        assert!(err.to_string().contains("YAML"));
    }
}
