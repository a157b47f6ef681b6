//! Main test runner that sequences setup hooks and scenarios

use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::{E2eError, E2eResult};
use crate::fixture::{FixtureClient, FixtureConfig};
use crate::playwright::{PlaywrightConfig, PlaywrightHandle, ScenarioDriver, StepResult};
use crate::server::{BackendConfig, BackendHandle};
use crate::setup::{FixtureContext, HookScope};
use crate::spec::{Scenario, TestSuite};
use crate::storage::StorageSnapshot;

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub suite: String,
    pub name: String,
    pub success: bool,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub screenshot_path: Option<String>,
    pub error: Option<String>,
}

/// Result of running all suites
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

impl TestSuiteResult {
    fn from_results(started_at: DateTime<Utc>, duration_ms: u64, results: Vec<ScenarioResult>) -> Self {
        let passed = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            passed,
            failed: results.len() - passed,
            started_at,
            duration_ms,
            results,
        }
    }
}

/// Configuration for the test runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub backend: BackendConfig,
    pub fixture: FixtureConfig,
    pub playwright: PlaywrightConfig,
    pub suites_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            fixture: FixtureConfig::default(),
            playwright: PlaywrightConfig::default(),
            suites_dir: PathBuf::from("suites"),
            output_dir: PathBuf::from("test-results"),
        }
    }
}

/// Main E2E test runner
pub struct TestRunner {
    config: RunnerConfig,

    /// Backend handle (if started)
    backend: Option<BackendHandle>,
}

impl TestRunner {
    /// Create a new test runner with default configuration
    pub fn new() -> Self {
        Self::with_config(RunnerConfig::default())
    }

    /// Create a test runner with custom configuration
    pub fn with_config(config: RunnerConfig) -> Self {
        Self { config, backend: None }
    }

    /// Start (or wait for) the backend
    pub async fn start_backend(&mut self) -> E2eResult<()> {
        if self.backend.is_some() {
            return Ok(());
        }

        let mut backend = self.config.backend.clone();
        backend.origin = self.config.fixture.origin.clone();
        self.backend = Some(BackendHandle::start(backend).await?);
        Ok(())
    }

    /// Stop the backend if we spawned it
    pub fn stop_backend(&mut self) -> E2eResult<()> {
        if let Some(mut backend) = self.backend.take() {
            backend.stop()?;
        }
        Ok(())
    }

    /// Load every suite from the suites directory
    pub fn load_suites(&self) -> E2eResult<Vec<TestSuite>> {
        TestSuite::load_all(&self.config.suites_dir)
    }

    /// Run all suites in the suites directory
    pub async fn run_all(&mut self) -> E2eResult<TestSuiteResult> {
        let suites = self.load_suites()?;
        self.run_suites(&suites).await
    }

    /// Run suites matching a tag
    pub async fn run_tagged(&mut self, tag: &str) -> E2eResult<TestSuiteResult> {
        let suites = self.load_suites()?;
        let filtered: Vec<TestSuite> = TestSuite::filter_by_tag(&suites, tag)
            .into_iter()
            .cloned()
            .collect();
        self.run_suites(&filtered).await
    }

    /// Run a specific suite by name
    pub async fn run_named(&mut self, name: &str) -> E2eResult<TestSuiteResult> {
        let suite = self
            .load_suites()?
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| E2eError::SuiteParse(format!("Suite not found: {}", name)))?;
        self.run_suites(std::slice::from_ref(&suite)).await
    }

    /// Run a list of suites, one after the other
    pub async fn run_suites(&mut self, suites: &[TestSuite]) -> E2eResult<TestSuiteResult> {
        let started_at = Utc::now();
        let start = Instant::now();

        self.start_backend().await?;

        let client = FixtureClient::new(self.config.fixture.clone())?;
        let playwright = PlaywrightHandle::new(self.config.playwright.clone())?;

        let total: usize = suites.iter().map(|s| s.scenarios.len()).sum();
        info!("Running {} scenario(s) in {} suite(s)...", total, suites.len());

        let mut results = Vec::with_capacity(total);
        for suite in suites {
            results.extend(run_suite(suite, &client, &playwright).await?);
        }

        let summary = TestSuiteResult::from_results(
            started_at,
            start.elapsed().as_millis() as u64,
            results,
        );

        info!("");
        info!(
            "Test Results: {} passed, {} failed ({} ms)",
            summary.passed, summary.failed, summary.duration_ms
        );

        Ok(summary)
    }

    /// Write test results to JSON file
    pub fn write_results(&self, results: &TestSuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

impl Default for TestRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TestRunner {
    fn drop(&mut self) {
        let _ = self.stop_backend();
    }
}

/// Run one suite. A before-all hook runs once and its storage is inherited
/// by every scenario; a before-each hook runs against a fresh context per
/// scenario. Setup failures fail the affected scenarios only.
pub async fn run_suite<D: ScenarioDriver>(
    suite: &TestSuite,
    client: &FixtureClient,
    driver: &D,
) -> E2eResult<Vec<ScenarioResult>> {
    info!("Suite: {}", suite.name);
    let mut results = Vec::new();

    let mut inherited = StorageSnapshot::default();
    if suite.setup.scope == HookScope::BeforeAll {
        let mut ctx = FixtureContext::new(client.clone());
        match suite.setup.run(&mut ctx).await {
            Ok(_) => inherited = ctx.snapshot(),
            Err(e) if e.is_test_failure() => {
                error!("✗ {} before-all setup - {}", suite.name, e);
                let started_at = Utc::now();
                for scenario in &suite.scenarios {
                    results.push(failed(suite, scenario, started_at, 0, &e));
                }
                return Ok(results);
            }
            Err(e) => return Err(e),
        }
    }

    for scenario in &suite.scenarios {
        let result = run_scenario(suite, scenario, client, driver, &inherited).await?;
        if result.success {
            info!("✓ {} :: {} ({} ms)", suite.name, result.name, result.duration_ms);
        } else {
            error!(
                "✗ {} :: {} - {}",
                suite.name,
                result.name,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
        results.push(result);
    }

    Ok(results)
}

async fn run_scenario<D: ScenarioDriver>(
    suite: &TestSuite,
    scenario: &Scenario,
    client: &FixtureClient,
    driver: &D,
    inherited: &StorageSnapshot,
) -> E2eResult<ScenarioResult> {
    let started_at = Utc::now();
    let start = Instant::now();
    debug!("Running scenario: {}", scenario.name);

    let mut ctx = FixtureContext::with_snapshot(client.clone(), inherited.clone());
    if suite.setup.scope == HookScope::BeforeEach {
        if let Err(e) = suite.setup.run(&mut ctx).await {
            if !e.is_test_failure() {
                return Err(e);
            }
            let elapsed = start.elapsed().as_millis() as u64;
            return Ok(failed(suite, scenario, started_at, elapsed, &e));
        }
    }

    let run = driver.run_scenario(suite, scenario, &ctx.snapshot()).await?;

    Ok(ScenarioResult {
        suite: suite.name.clone(),
        name: scenario.name.clone(),
        success: run.success(),
        started_at,
        duration_ms: start.elapsed().as_millis() as u64,
        steps: run.steps,
        screenshot_path: run.screenshot_path.map(|p| p.to_string_lossy().to_string()),
        error: run.error.map(|e| e.to_string()),
    })
}

fn failed(
    suite: &TestSuite,
    scenario: &Scenario,
    started_at: DateTime<Utc>,
    duration_ms: u64,
    e: &E2eError,
) -> ScenarioResult {
    ScenarioResult {
        suite: suite.name.clone(),
        name: scenario.name.clone(),
        success: false,
        started_at,
        duration_ms,
        steps: vec![],
        screenshot_path: None,
        error: Some(e.to_string()),
    }
}
