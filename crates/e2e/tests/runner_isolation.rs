//! Suite sequencing against the stub backend, with the browser replaced by
//! a driver that records what each scenario was seeded with

mod support;

use std::sync::Mutex;

use anyhow::Result;

use meiki_e2e::playwright::{ScenarioDriver, ScenarioRun};
use meiki_e2e::runner::run_suite;
use meiki_e2e::storage::{StorageSnapshot, TOKEN_KEY, USERNAME_KEY};
use meiki_e2e::{E2eResult, FixtureCommand, HookScope, Scenario, SetupPlan, SetupStep, TestSuite};
use support::{client_for, impatient_client_for, spawn_stub};

/// Passes every scenario and remembers the storage it was handed
#[derive(Default)]
struct RecordingDriver {
    seen: Mutex<Vec<(String, StorageSnapshot)>>,
}

impl RecordingDriver {
    fn seen(&self) -> Vec<(String, StorageSnapshot)> {
        self.seen.lock().unwrap().clone()
    }
}

impl ScenarioDriver for RecordingDriver {
    async fn run_scenario(
        &self,
        _suite: &TestSuite,
        scenario: &Scenario,
        storage: &StorageSnapshot,
    ) -> E2eResult<ScenarioRun> {
        self.seen
            .lock()
            .unwrap()
            .push((scenario.name.clone(), storage.clone()));
        Ok(ScenarioRun {
            steps: vec![],
            screenshot_path: None,
            error: None,
        })
    }
}

fn suite_with(setup: SetupPlan) -> TestSuite {
    let mut suite = TestSuite::from_yaml(
        r#"
name: isolation
scenarios:
  - name: first
    steps:
      - action: navigate
        url: /
  - name: second
    steps:
      - action: navigate
        url: /
  - name: third
    steps:
      - action: navigate
        url: /
"#,
    )
    .unwrap();
    suite.setup = setup;
    suite
}

fn outcomes(results: &[meiki_e2e::runner::ScenarioResult]) -> Vec<(&str, bool)> {
    results.iter().map(|r| (r.name.as_str(), r.success)).collect()
}

#[tokio::test]
async fn before_each_failure_fails_only_its_scenario() -> Result<()> {
    let (stub, origin) = spawn_stub().await;
    stub.fail_create_on(&[2]);
    let suite = suite_with(SetupPlan::bootstrap());
    let driver = RecordingDriver::default();

    let results = run_suite(&suite, &client_for(&origin), &driver).await?;

    assert_eq!(
        outcomes(&results),
        vec![("first", true), ("second", false), ("third", true)]
    );
    let error = results[1].error.as_deref().unwrap_or_default();
    assert!(error.contains("create returned 500"), "{error}");

    let ran: Vec<_> = driver.seen().into_iter().map(|(name, _)| name).collect();
    assert_eq!(ran, vec!["first", "third"]);
    Ok(())
}

#[tokio::test]
async fn before_all_failure_fails_every_scenario() -> Result<()> {
    let (_stub, origin) = spawn_stub().await;
    // the second create conflicts with the first
    let suite = suite_with(SetupPlan {
        scope: HookScope::BeforeAll,
        steps: vec![
            SetupStep::strict(FixtureCommand::Create),
            SetupStep::strict(FixtureCommand::Create),
        ],
    });
    let driver = RecordingDriver::default();

    let results = run_suite(&suite, &client_for(&origin), &driver).await?;

    assert_eq!(results.len(), 3);
    for result in &results {
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap_or_default().contains("409"));
    }
    assert!(driver.seen().is_empty());
    Ok(())
}

#[tokio::test]
async fn scenarios_inherit_the_before_all_storage() -> Result<()> {
    let (stub, origin) = spawn_stub().await;
    let suite = suite_with(SetupPlan {
        scope: HookScope::BeforeAll,
        ..SetupPlan::bootstrap()
    });
    let driver = RecordingDriver::default();

    let results = run_suite(&suite, &client_for(&origin), &driver).await?;

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.success));

    let seen = driver.seen();
    assert_eq!(seen.len(), 3);
    for (_, storage) in &seen {
        assert_eq!(storage.items.get(USERNAME_KEY).map(String::as_str), Some("shnoo"));
        assert_eq!(storage.items.get(TOKEN_KEY).map(String::as_str), Some("token-1"));
    }

    let logins = stub.log().iter().filter(|(path, _)| path == "/login").count();
    assert_eq!(logins, 1);
    Ok(())
}

#[tokio::test]
async fn timed_out_before_each_request_fails_only_its_scenario() -> Result<()> {
    let (stub, origin) = spawn_stub().await;
    stub.stall_delete_on(&[1]);
    let suite = suite_with(SetupPlan::bootstrap());
    let driver = RecordingDriver::default();

    let results = run_suite(&suite, &impatient_client_for(&origin), &driver).await?;

    assert_eq!(
        outcomes(&results),
        vec![("first", false), ("second", true), ("third", true)]
    );
    let error = results[0].error.as_deref().unwrap_or_default();
    assert!(error.contains("delete request did not complete"), "{error}");
    Ok(())
}

#[tokio::test]
async fn timed_out_before_all_request_fails_every_scenario() -> Result<()> {
    let (stub, origin) = spawn_stub().await;
    stub.stall_delete_on(&[1]);
    let suite = suite_with(SetupPlan::reset());
    let driver = RecordingDriver::default();

    let results = run_suite(&suite, &impatient_client_for(&origin), &driver).await?;

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| !r.success));
    assert!(driver.seen().is_empty());
    Ok(())
}
