//! Fixture bootstrap client
//!
//! Brings the backend account store and the client storage to a known
//! baseline before a scenario runs, by POSTing the test credentials to
//! `/delete`, `/create` or `/login`.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};
use crate::storage::{ClientStorage, TOKEN_KEY, USERNAME_KEY};

/// Account the suites create, log in and delete
pub const DEFAULT_USERNAME: &str = "shnoo";
pub const DEFAULT_PASSWORD: &str = "thisisveryunsafe";

/// Username/password pair sent as the body of every fixture command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new(DEFAULT_USERNAME, DEFAULT_PASSWORD)
    }
}

/// Body of a successful login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub username: String,
    pub token: String,
}

/// Setup call against the backend, named after its path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureCommand {
    Delete,
    Create,
    Login,
}

impl FixtureCommand {
    pub fn path(&self) -> &'static str {
        match self {
            FixtureCommand::Delete => "delete",
            FixtureCommand::Create => "create",
            FixtureCommand::Login => "login",
        }
    }
}

impl fmt::Display for FixtureCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Raw response handed back to the caller for chaining
#[derive(Debug, Clone)]
pub struct FixtureResponse {
    pub command: FixtureCommand,
    pub status: u16,
    pub body: String,
}

impl FixtureResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Configuration for the fixture client
#[derive(Debug, Clone)]
pub struct FixtureConfig {
    /// Backend origin, e.g. `http://localhost:8080/`
    pub origin: String,

    /// Credentials used as the payload of every command
    pub credentials: Credentials,

    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:8080/".to_string(),
            credentials: Credentials::default(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Stateless HTTP client for fixture commands
#[derive(Debug, Clone)]
pub struct FixtureClient {
    http: reqwest::Client,
    origin: String,
    credentials: Credentials,
}

impl FixtureClient {
    pub fn new(config: FixtureConfig) -> E2eResult<Self> {
        let origin = config.origin.trim_end_matches('/').to_string();
        if !origin.starts_with("http://") && !origin.starts_with("https://") {
            return Err(E2eError::InvalidConfig(format!(
                "backend origin must be an http(s) URL, got '{}'",
                config.origin
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            origin,
            credentials: config.credentials,
        })
    }

    /// Full URL a command is POSTed to
    pub fn url_for(&self, command: FixtureCommand) -> String {
        format!("{}/{}", self.origin, command.path())
    }

    /// Issue one fixture command.
    ///
    /// With `strict`, a non-2xx status aborts with [`E2eError::Setup`];
    /// otherwise it is logged and the response returned as-is. Only a
    /// successful `login` writes to `storage`, under `username` and `token`.
    pub async fn run_fixture_command(
        &self,
        command: FixtureCommand,
        strict: bool,
        storage: &mut dyn ClientStorage,
    ) -> E2eResult<FixtureResponse> {
        let url = self.url_for(command);
        debug!("POST {} (strict: {})", url, strict);

        // Timeouts and refused connections fail the scenario, not the run
        let request_failed = |e: reqwest::Error| E2eError::SetupRequest {
            command,
            reason: e.to_string(),
        };
        let resp = self
            .http
            .post(&url)
            .json(&self.credentials)
            .send()
            .await
            .map_err(request_failed)?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(request_failed)?;
        let response = FixtureResponse {
            command,
            status,
            body,
        };

        if !response.is_success() {
            if strict {
                return Err(E2eError::Setup {
                    command,
                    status,
                    body: response.body,
                });
            }
            warn!("{} returned {}, tolerated", command, status);
            return Ok(response);
        }

        if command == FixtureCommand::Login {
            let session = parse_session(&response.body)?;
            storage.set_item(USERNAME_KEY, &session.username);
            storage.set_item(TOKEN_KEY, &session.token);
            info!("Logged in as {}", session.username);
        }

        Ok(response)
    }
}

fn parse_session(body: &str) -> E2eResult<Session> {
    serde_json::from_str(body).map_err(|e| E2eError::InvalidResponse {
        command: FixtureCommand::Login,
        reason: e.to_string(),
    })
}
