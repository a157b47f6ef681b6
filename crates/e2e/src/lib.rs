//! Meiki E2E Test Framework
//!
//! This crate provides a Rust-controlled E2E testing framework for the Meiki
//! notes app that:
//! - Bootstraps backend and browser state with fixture commands
//!   (`/delete`, `/create`, `/login`) before each scenario
//! - Models the browser's `localStorage` as a scenario-owned object
//! - Parses declarative YAML suites with explicit setup plans
//! - Drives Playwright via generated Node scripts
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    E2E Test Runner (Rust)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── start_backend() -> BackendHandle                     │
//! │    ├── SetupPlan::run(&mut FixtureContext)                  │
//! │    │     └── FixtureClient::run_fixture_command(cmd, strict)│
//! │    └── PlaywrightHandle::run_scenario(scenario, snapshot)   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestSuite (YAML)                                           │
//! │    ├── name, tags, marker_class                             │
//! │    ├── setup: { scope, steps: [fixture | clear_storage] }   │
//! │    └── scenarios: [{ name, steps: [TestStep] }]             │
//! │          ├── navigate { url }                               │
//! │          ├── click { selector }                             │
//! │          ├── type / fill { selector, text }                 │
//! │          └── assert { selector, visible?, exists?, active? }│
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod fixture;
pub mod playwright;
pub mod runner;
pub mod server;
pub mod setup;
pub mod spec;
pub mod storage;

pub use error::{E2eError, E2eResult};
pub use fixture::{Credentials, FixtureClient, FixtureCommand, FixtureConfig, Session};
pub use runner::TestRunner;
pub use setup::{FixtureContext, HookScope, SetupPlan, SetupStep};
pub use spec::{Scenario, TestStep, TestSuite};
pub use storage::{ClientStorage, MemoryStorage};
