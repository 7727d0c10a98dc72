//! Error types for the scenario harness

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Unknown field '{field}' on page '{page}'")]
    UnknownField { page: String, field: String },

    #[error("Invalid option '{value}' for field '{field}' (allowed: {allowed})")]
    InvalidOption {
        field: String,
        value: String,
        allowed: String,
    },

    #[error("Duplicate field definition: {0}")]
    DuplicateField(String),

    #[error("Unknown page: {0}")]
    UnknownPage(String),

    #[error("Navigation to {url} did not resolve within {timeout_ms} ms")]
    Navigation { url: String, timeout_ms: u64 },

    #[error("No outcome element found on '{page}' after {waited_ms} ms (primary and fallback lookups exhausted)")]
    OutcomeNotFound { page: String, waited_ms: u64 },

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Assertion failed for '{scenario}': expected {expected}, got {actual}")]
    AssertionMismatch {
        scenario: String,
        expected: String,
        actual: String,
    },

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Playwright not found. Install with: npm install playwright && npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Bridge protocol error: {0}")]
    Bridge(String),

    #[error("Fixture hook failed: {action} - {reason}")]
    Hook { action: String, reason: String },

    #[error("Scenario '{0}' needs fixture hooks but none are configured")]
    HooksNotConfigured(String),

    #[error("Server failed to start: {0}")]
    ServerStartup(String),

    #[error("Server health check failed after {0} attempts")]
    ServerHealthCheck(usize),

    #[error("Scenario table parse error: {0}")]
    TableParse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl E2eError {
    /// Errors caused by the scenario itself rather than the environment.
    ///
    /// These are raised while validating a case, before any session is
    /// launched.
    pub fn is_programmer_error(&self) -> bool {
        matches!(
            self,
            E2eError::UnknownField { .. }
                | E2eError::InvalidOption { .. }
                | E2eError::DuplicateField(_)
                | E2eError::UnknownPage(_)
                | E2eError::HooksNotConfigured(_)
        )
    }

    /// Failures from waits that ran out of time
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            E2eError::Navigation { .. } | E2eError::OutcomeNotFound { .. } | E2eError::Timeout(_)
        )
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
