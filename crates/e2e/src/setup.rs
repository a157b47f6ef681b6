//! Declared setup hooks
//!
//! A [`SetupPlan`] is an ordered list of steps with per-step strictness,
//! run against an explicit [`FixtureContext`] rather than global state.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::E2eResult;
use crate::fixture::{FixtureClient, FixtureCommand, FixtureResponse};
use crate::storage::{ClientStorage, MemoryStorage, StorageSnapshot};

/// When a plan runs relative to the scenarios of its suite
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookScope {
    #[default]
    BeforeEach,
    BeforeAll,
}

/// A single setup step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum SetupStep {
    /// POST a fixture command; `strict` makes a non-2xx status fatal
    Fixture {
        command: FixtureCommand,
        #[serde(default = "default_strict")]
        strict: bool,
    },

    /// Empty the client storage
    ClearStorage,
}

fn default_strict() -> bool {
    true
}

impl SetupStep {
    pub fn strict(command: FixtureCommand) -> Self {
        SetupStep::Fixture { command, strict: true }
    }

    pub fn lenient(command: FixtureCommand) -> Self {
        SetupStep::Fixture { command, strict: false }
    }
}

/// Ordered setup steps plus the hook they are attached to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupPlan {
    #[serde(default)]
    pub scope: HookScope,

    #[serde(default)]
    pub steps: Vec<SetupStep>,
}

impl SetupPlan {
    /// `delete(lenient) → clear-storage → create(strict) → login(strict)`
    /// before every scenario: each one starts logged in as a fresh account.
    pub fn bootstrap() -> Self {
        Self {
            scope: HookScope::BeforeEach,
            steps: vec![
                SetupStep::lenient(FixtureCommand::Delete),
                SetupStep::ClearStorage,
                SetupStep::strict(FixtureCommand::Create),
                SetupStep::strict(FixtureCommand::Login),
            ],
        }
    }

    /// `delete(lenient) → clear-storage` once per suite, leaving account
    /// creation and login to the UI.
    pub fn reset() -> Self {
        Self {
            scope: HookScope::BeforeAll,
            steps: vec![
                SetupStep::lenient(FixtureCommand::Delete),
                SetupStep::ClearStorage,
            ],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step in order. The first strict failure aborts the plan;
    /// the responses of the steps that ran are returned otherwise.
    pub async fn run(&self, ctx: &mut FixtureContext) -> E2eResult<Vec<FixtureResponse>> {
        let mut responses = Vec::new();

        for (i, step) in self.steps.iter().enumerate() {
            debug!("setup step {}/{}: {:?}", i + 1, self.steps.len(), step);
            match step {
                SetupStep::Fixture { command, strict } => {
                    let resp = ctx
                        .client
                        .run_fixture_command(*command, *strict, &mut ctx.storage)
                        .await?;
                    responses.push(resp);
                }
                SetupStep::ClearStorage => ctx.storage.clear(),
            }
        }

        info!("Setup ({:?}) complete: {} step(s)", self.scope, self.steps.len());
        Ok(responses)
    }
}

/// Backend client and client storage owned by the running scenario
pub struct FixtureContext {
    pub client: FixtureClient,
    pub storage: MemoryStorage,
}

impl FixtureContext {
    pub fn new(client: FixtureClient) -> Self {
        Self {
            client,
            storage: MemoryStorage::new(),
        }
    }

    /// Same client, storage seeded from `snapshot`
    pub fn with_snapshot(client: FixtureClient, snapshot: StorageSnapshot) -> Self {
        Self {
            client,
            storage: MemoryStorage::from_snapshot(snapshot),
        }
    }

    pub fn snapshot(&self) -> StorageSnapshot {
        self.storage.snapshot()
    }
}
