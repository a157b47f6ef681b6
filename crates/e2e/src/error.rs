//! Error types for E2E testing

use thiserror::Error;

use crate::fixture::FixtureCommand;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Backend failed to start: {0}")]
    BackendStartup(String),

    #[error("Backend at {origin} not reachable after {attempts} attempts")]
    BackendUnreachable { origin: String, attempts: usize },

    #[error("Playwright not found. Install with: npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Suite parse error: {0}")]
    SuiteParse(String),

    #[error("Setup failed: {command} returned {status}: {body}")]
    Setup {
        command: FixtureCommand,
        status: u16,
        body: String,
    },

    #[error("Setup failed: {command} request did not complete: {reason}")]
    SetupRequest {
        command: FixtureCommand,
        reason: String,
    },

    #[error("Invalid {command} response: {reason}")]
    InvalidResponse {
        command: FixtureCommand,
        reason: String,
    },

    #[error("Assertion failed on {selector}: expected {expected}, observed {observed}")]
    Assertion {
        selector: String,
        expected: String,
        observed: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl E2eError {
    /// Setup and assertion failures fail the current scenario; everything
    /// else is an infrastructure problem that aborts the run.
    pub fn is_test_failure(&self) -> bool {
        matches!(
            self,
            E2eError::Setup { .. }
                | E2eError::SetupRequest { .. }
                | E2eError::InvalidResponse { .. }
                | E2eError::Assertion { .. }
        )
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
