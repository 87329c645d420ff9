//! Error types for the acceptance harness

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::FixtureKey;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Setup failed: {0}")]
    Setup(String),

    #[error("Timeout waiting for {operation} after {waited_ms} ms")]
    ActionTimeout { operation: String, waited_ms: u64 },

    #[error("Request for {operation} failed: {message}")]
    Transport { operation: String, message: String },

    #[error("Assertion failed: {0}")]
    Assertion(String),

    #[error("Scenario '{scenario}' is missing fixtures [{missing}] (expected from: {producers})")]
    CascadingState {
        scenario: String,
        missing: String,
        producers: String,
    },

    #[error("Suite parse error: {0}")]
    SuiteParse(String),

    #[error("Module '{module}': scenario '{scenario}' reads '{key}' before any scenario writes it")]
    Dependency {
        module: String,
        scenario: String,
        key: FixtureKey,
    },

    #[error("Playwright not found. Install with: npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Response correlation mismatch: expected {expected}, got {actual}")]
    Correlation { expected: String, actual: String },

    #[error("Fixture '{0}' is not available")]
    MissingFixture(FixtureKey),

    #[error("Service unreachable after {0} attempts")]
    ServiceUnreachable(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Failure classes a scenario can end in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The driver context could not be created
    Setup,
    /// The expected response never arrived: timed out or the connection failed
    ActionTimeout,
    Assertion,
    CascadingState,
}

impl HarnessError {
    /// Classify this error for scenario reporting.
    pub fn kind(&self) -> FailureKind {
        match self {
            HarnessError::ActionTimeout { .. } | HarnessError::Transport { .. } => {
                FailureKind::ActionTimeout
            }
            HarnessError::Http(e) if e.is_timeout() => FailureKind::ActionTimeout,
            HarnessError::Assertion(_) | HarnessError::Correlation { .. } => FailureKind::Assertion,
            HarnessError::CascadingState { .. } | HarnessError::MissingFixture(_) => {
                FailureKind::CascadingState
            }
            _ => FailureKind::Setup,
        }
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let timeout = HarnessError::ActionTimeout {
            operation: "create_book".into(),
            waited_ms: 10_000,
        };
        assert_eq!(timeout.kind(), FailureKind::ActionTimeout);
        assert_eq!(
            HarnessError::MissingFixture(FixtureKey::AccessToken).kind(),
            FailureKind::CascadingState
        );
        assert_eq!(HarnessError::PlaywrightNotFound.kind(), FailureKind::Setup);
        assert_eq!(
            HarnessError::Transport {
                operation: "login".into(),
                message: "connection refused".into()
            }
            .kind(),
            FailureKind::ActionTimeout
        );
        assert_eq!(
            HarnessError::Correlation {
                expected: "login".into(),
                actual: "register".into()
            }
            .kind(),
            FailureKind::Assertion
        );
    }
}
