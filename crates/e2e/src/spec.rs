//! Declarative YAML suite specification

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{E2eError, E2eResult};
use crate::setup::SetupPlan;

/// Class a toggle control carries while it is active
pub const DEFAULT_MARKER_CLASS: &str = "isChecked";

/// Selector for a stable `data-cy` test hook
pub fn test_hook(name: &str) -> String {
    format!("[data-cy='{}']", name)
}

/// A suite of scenarios sharing one setup plan, parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuite {
    /// Unique name for this suite
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering suites
    #[serde(default)]
    pub tags: Vec<String>,

    /// Viewport size for the browser (None = runner default)
    #[serde(default)]
    pub viewport: Option<Viewport>,

    /// Class a toggle control carries while active
    #[serde(default = "default_marker_class")]
    pub marker_class: String,

    /// Setup hook shared by every scenario
    #[serde(default)]
    pub setup: SetupPlan,

    /// Scenarios, run in order
    pub scenarios: Vec<Scenario>,
}

fn default_marker_class() -> String {
    DEFAULT_MARKER_CLASS.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// One independently bootstrapped scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,

    /// Steps to execute in order
    pub steps: Vec<TestStep>,
}

/// A single UI step
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TestStep {
    /// Navigate to a path relative to the app base URL
    Navigate {
        url: String,
    },

    /// Click an element
    Click {
        selector: String,
    },

    /// Type text with keyboard simulation
    Type {
        selector: String,
        text: String,
        #[serde(default)]
        delay_ms: Option<u64>,
    },

    /// Replace an input's value
    Fill {
        selector: String,
        value: String,
    },

    /// Press a key, on an element or the page
    Press {
        #[serde(default)]
        selector: Option<String>,
        key: String,
    },

    /// Wait for an element to reach a state
    Wait {
        selector: String,
        #[serde(default)]
        state: WaitState,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Assert something about an element
    Assert {
        selector: String,
        #[serde(default)]
        visible: Option<bool>,
        #[serde(default)]
        exists: Option<bool>,
        #[serde(default)]
        has_class: Option<String>,
        #[serde(default)]
        lacks_class: Option<String>,
        /// Shorthand for having (or lacking) the suite's marker class
        #[serde(default)]
        active: Option<bool>,
        #[serde(default)]
        text_contains: Option<String>,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Log a message (for debugging)
    Log {
        message: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

impl WaitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitState::Visible => "visible",
            WaitState::Hidden => "hidden",
            WaitState::Attached => "attached",
            WaitState::Detached => "detached",
        }
    }
}

impl TestStep {
    /// Short label used in logs and results
    pub fn name(&self) -> String {
        match self {
            TestStep::Navigate { url } => format!("navigate:{}", url),
            TestStep::Click { selector } => format!("click:{}", selector),
            TestStep::Type { selector, .. } => format!("type:{}", selector),
            TestStep::Fill { selector, .. } => format!("fill:{}", selector),
            TestStep::Press { key, .. } => format!("press:{}", key),
            TestStep::Wait { selector, .. } => format!("wait:{}", selector),
            TestStep::Assert { selector, .. } => format!("assert:{}", selector),
            TestStep::Log { message } => {
                format!("log:{}", message.chars().take(30).collect::<String>())
            }
        }
    }
}

impl TestSuite {
    /// Parse a suite from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let suite: Self = serde_yaml::from_str(yaml)?;
        suite.validate()?;
        Ok(suite)
    }

    /// Parse a suite from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|e| match e {
            E2eError::SuiteParse(msg) => {
                E2eError::SuiteParse(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Load all suites from a directory, sorted by file path
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut paths: Vec<_> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
            .map(|e| e.into_path())
            .collect();
        paths.sort();

        paths.iter().map(|p| Self::from_file(p)).collect()
    }

    /// Filter suites by tag
    pub fn filter_by_tag<'a>(suites: &'a [Self], tag: &str) -> Vec<&'a Self> {
        suites.iter().filter(|s| s.tags.iter().any(|t| t == tag)).collect()
    }

    fn validate(&self) -> E2eResult<()> {
        if self.scenarios.is_empty() {
            return Err(E2eError::SuiteParse(format!(
                "suite '{}' has no scenarios",
                self.name
            )));
        }
        for scenario in &self.scenarios {
            if let Some(TestStep::Assert { selector, .. }) = scenario.steps.iter().find(|s| {
                matches!(s, TestStep::Assert {
                    visible: None, exists: None, has_class: None,
                    lacks_class: None, active: None, text_contains: None, ..
                })
            }) {
                return Err(E2eError::SuiteParse(format!(
                    "scenario '{}': assert on {} checks nothing",
                    scenario.name, selector
                )));
            }
        }
        Ok(())
    }
}
