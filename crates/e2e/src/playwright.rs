//! Playwright browser automation
//!
//! Each scenario is rendered into one Node script driving a fresh browser
//! context. The client storage snapshot is installed as an init script so
//! the app sees the fixture session on its first page load. The script
//! reports its outcome on a single `E2E_RESULT {json}` line.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::process::Command as TokioCommand;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};
use crate::spec::{Scenario, TestStep, TestSuite, Viewport};
use crate::storage::StorageSnapshot;

const RESULT_MARKER: &str = "E2E_RESULT";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl std::str::FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chromium" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" => Ok(Browser::Webkit),
            other => Err(E2eError::InvalidConfig(format!("unknown browser '{}'", other))),
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    /// Base URL of the app under test
    pub base_url: String,

    /// Where failure screenshots go (None = no screenshots)
    pub screenshot_dir: Option<PathBuf>,

    pub viewport: Viewport,
    pub browser: Browser,
    pub headless: bool,

    /// Timeout for each assertion and action
    pub timeout_ms: u64,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            screenshot_dir: Some(PathBuf::from("test-results/screenshots")),
            viewport: Viewport { width: 1280, height: 720 },
            browser: Browser::Chromium,
            headless: true,
            timeout_ms: 4000,
        }
    }
}

/// Result of a single step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_name: String,
    pub success: bool,
    pub error: Option<String>,
}

/// Outcome of running one scenario script
#[derive(Debug)]
pub struct ScenarioRun {
    pub steps: Vec<StepResult>,
    pub screenshot_path: Option<PathBuf>,
    pub error: Option<E2eError>,
}

impl ScenarioRun {
    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}

/// Runs one scenario in a browser seeded with `storage`
#[allow(async_fn_in_trait)]
pub trait ScenarioDriver {
    async fn run_scenario(
        &self,
        suite: &TestSuite,
        scenario: &Scenario,
        storage: &StorageSnapshot,
    ) -> E2eResult<ScenarioRun>;
}

/// Line the script prints on completion
#[derive(Debug, Clone, Default, Deserialize)]
struct ScriptOutcome {
    success: bool,
    #[serde(default)]
    step: Option<usize>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    selector: Option<String>,
    #[serde(default)]
    expected: Option<String>,
    #[serde(default)]
    observed: Option<String>,
    #[serde(default)]
    screenshot: Option<String>,
}

/// Renders scenarios into Playwright scripts; no process involved
#[derive(Debug, Clone)]
pub struct ScriptBuilder {
    config: PlaywrightConfig,
}

impl ScriptBuilder {
    pub fn new(config: PlaywrightConfig) -> Self {
        Self { config }
    }

    /// Build the full script for one scenario. The suite's viewport, when
    /// set, wins over the configured one.
    pub fn build(
        &self,
        suite: &TestSuite,
        scenario: &Scenario,
        storage: &StorageSnapshot,
    ) -> E2eResult<String> {
        let cfg = &self.config;
        let viewport = suite.viewport.as_ref().unwrap_or(&cfg.viewport);
        let marker_class = suite.marker_class.as_str();
        let screenshot = match &cfg.screenshot_dir {
            Some(dir) => js_str(&dir.join(screenshot_name(suite, scenario)).to_string_lossy())?,
            None => "null".to_string(),
        };

        let mut script = String::new();
        script.push_str(&format!(
            r#"
const {{ {browser} }} = require('playwright');

class AssertionFailure extends Error {{
  constructor(selector, expected, observed) {{
    super(`${{selector}}: expected ${{expected}}, observed ${{observed}}`);
    this.selector = selector;
    this.expected = expected;
    this.observed = observed;
  }}
}}

async function expectState(page, selector, expected, timeout, read) {{
  const deadline = Date.now() + timeout;
  for (;;) {{
    const r = await read(page.locator(selector));
    if (r.ok) return;
    if (Date.now() > deadline) throw new AssertionFailure(selector, expected, r.observed);
    await page.waitForTimeout(100);
  }}
}}

async function classOf(loc) {{
  if ((await loc.count()) === 0) return null;
  return (await loc.first().getAttribute('class')) || '';
}}

(async () => {{
  const browser = await {browser}.launch({{ headless: {headless} }});
  const context = await browser.newContext({{
    viewport: {{ width: {width}, height: {height} }}
  }});
  context.setDefaultTimeout({timeout});
  await context.addInitScript({init});
  const page = await context.newPage();
  const baseUrl = {base_url};
  const screenshotPath = {screenshot};
  let step = 0;

  try {{
"#,
            browser = cfg.browser.as_str(),
            headless = cfg.headless,
            width = viewport.width,
            height = viewport.height,
            timeout = cfg.timeout_ms,
            init = js_str(&storage.to_init_script()?)?,
            base_url = js_str(&cfg.base_url)?,
            screenshot = screenshot,
        ));

        for (i, step) in scenario.steps.iter().enumerate() {
            script.push_str(&format!("\n    // Step {}: {}\n", i + 1, step.name()));
            script.push_str(&format!("    step = {};\n", i));
            script.push_str(&self.step_to_js(step, marker_class)?);
            script.push('\n');
        }

        script.push_str(&format!(
            r#"
    console.log('{marker} ' + JSON.stringify({{ success: true }}));
  }} catch (error) {{
    let shot = null;
    if (screenshotPath) {{
      try {{ await page.screenshot({{ path: screenshotPath, fullPage: true }}); shot = screenshotPath; }} catch (_) {{}}
    }}
    console.log('{marker} ' + JSON.stringify({{
      success: false, step, error: error.message,
      selector: error.selector, expected: error.expected, observed: error.observed,
      screenshot: shot,
    }}));
    process.exitCode = 1;
  }} finally {{
    await browser.close();
  }}
}})();
"#,
            marker = RESULT_MARKER,
        ));

        Ok(script)
    }

    fn step_to_js(&self, step: &TestStep, marker_class: &str) -> E2eResult<String> {
        let default_timeout = self.config.timeout_ms;
        let js = match step {
            TestStep::Navigate { url } => {
                format!("    await page.goto(new URL({}, baseUrl).toString());", js_str(url)?)
            }
            TestStep::Click { selector } => {
                format!("    await page.locator({}).first().click();", js_str(selector)?)
            }
            TestStep::Type { selector, text, delay_ms } => format!(
                "    await page.locator({}).first().type({}, {{ delay: {} }});",
                js_str(selector)?,
                js_str(text)?,
                delay_ms.unwrap_or(20)
            ),
            TestStep::Fill { selector, value } => format!(
                "    await page.locator({}).first().fill({});",
                js_str(selector)?,
                js_str(value)?
            ),
            TestStep::Press { selector, key } => match selector {
                Some(sel) => format!(
                    "    await page.locator({}).first().press({});",
                    js_str(sel)?,
                    js_str(key)?
                ),
                None => format!("    await page.keyboard.press({});", js_str(key)?),
            },
            TestStep::Wait { selector, state, timeout_ms } => format!(
                "    await page.waitForSelector({}, {{ state: '{}', timeout: {} }});",
                js_str(selector)?,
                state.as_str(),
                timeout_ms.unwrap_or(default_timeout)
            ),
            TestStep::Assert {
                selector,
                visible,
                exists,
                has_class,
                lacks_class,
                active,
                text_contains,
                timeout_ms,
            } => {
                let timeout = timeout_ms.unwrap_or(default_timeout);
                let sel = js_str(selector)?;
                let mut checks = Vec::new();

                if let Some(e) = exists {
                    let (expected, ok) = if *e { ("present", "n > 0") } else { ("absent", "n === 0") };
                    checks.push(format!(
                        "    await expectState(page, {sel}, '{expected}', {timeout}, async l => {{ const n = await l.count(); return {{ ok: {ok}, observed: n === 0 ? 'absent' : `${{n}} element(s)` }}; }});"
                    ));
                }

                if let Some(v) = visible {
                    let (expected, ok) = if *v { ("visible", "v") } else { ("hidden", "!v") };
                    checks.push(format!(
                        "    await expectState(page, {sel}, '{expected}', {timeout}, async l => {{ const v = await l.first().isVisible(); const n = await l.count(); return {{ ok: {ok}, observed: n === 0 ? 'absent' : (v ? 'visible' : 'hidden') }}; }});"
                    ));
                }

                let mut class_checks: Vec<(String, bool)> = Vec::new();
                if let Some(c) = has_class {
                    class_checks.push((c.clone(), true));
                }
                if let Some(c) = lacks_class {
                    class_checks.push((c.clone(), false));
                }
                if let Some(a) = active {
                    class_checks.push((marker_class.to_string(), *a));
                }
                for (class, present) in class_checks {
                    let name = js_str(&class)?;
                    let expected = js_str(&if present {
                        format!("class {}", class)
                    } else {
                        format!("no class {}", class)
                    })?;
                    let ok = if present { "has" } else { "cls !== null && !has" };
                    checks.push(format!(
                        "    await expectState(page, {sel}, {expected}, {timeout}, async l => {{ const cls = await classOf(l); const has = cls !== null && cls.split(/\\s+/).includes({name}); return {{ ok: {ok}, observed: cls === null ? 'absent' : `class=\"${{cls}}\"` }}; }});"
                    ));
                }

                if let Some(t) = text_contains {
                    let needle = js_str(t)?;
                    let expected = js_str(&format!("text containing {:?}", t))?;
                    checks.push(format!(
                        "    await expectState(page, {sel}, {expected}, {timeout}, async l => {{ if ((await l.count()) === 0) return {{ ok: false, observed: 'absent' }}; const t = (await l.first().textContent()) || ''; return {{ ok: t.includes({needle}), observed: JSON.stringify(t) }}; }});"
                    ));
                }

                checks.join("\n")
            }
            TestStep::Log { message } => {
                format!("    console.log('[TEST] ' + {});", js_str(message)?)
            }
        };
        Ok(js)
    }
}

/// Playwright browser handle
pub struct PlaywrightHandle {
    builder: ScriptBuilder,
}

impl PlaywrightHandle {
    /// Create a new Playwright handle
    pub fn new(config: PlaywrightConfig) -> E2eResult<Self> {
        Self::check_playwright_installed()?;

        if let Some(dir) = &config.screenshot_dir {
            std::fs::create_dir_all(dir)?;
        }

        Ok(Self {
            builder: ScriptBuilder::new(config),
        })
    }

    /// Check if Playwright is installed
    fn check_playwright_installed() -> E2eResult<()> {
        let output = Command::new("npx")
            .args(["playwright", "--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match output {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }
}

impl ScenarioDriver for PlaywrightHandle {
    async fn run_scenario(
        &self,
        suite: &TestSuite,
        scenario: &Scenario,
        storage: &StorageSnapshot,
    ) -> E2eResult<ScenarioRun> {
        let script = self.builder.build(suite, scenario, storage)?;

        let temp_dir = tempfile::tempdir()?;
        let script_path = temp_dir.path().join("scenario.js");
        std::fs::write(&script_path, &script)?;

        debug!("Running Playwright script: {}", script_path.display());

        // require() resolves from the script's directory, not the cwd
        let cwd = std::env::current_dir()?;
        let output = TokioCommand::new("node")
            .arg(&script_path)
            .current_dir(&cwd)
            .env("NODE_PATH", cwd.join("node_modules"))
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let outcome = match parse_outcome(&stdout)? {
            Some(outcome) => outcome,
            None => {
                return Err(E2eError::Playwright(format!(
                    "script produced no result (exit: {}):\nstdout: {}\nstderr: {}",
                    output.status, stdout, stderr
                )));
            }
        };

        Ok(collect_run(scenario, outcome))
    }
}

fn collect_run(scenario: &Scenario, outcome: ScriptOutcome) -> ScenarioRun {
    if outcome.success {
        info!("Scenario '{}' passed", scenario.name);
        let steps = scenario
            .steps
            .iter()
            .map(|s| StepResult { step_name: s.name(), success: true, error: None })
            .collect();
        return ScenarioRun { steps, screenshot_path: None, error: None };
    }

    let failed_at = outcome.step.unwrap_or(0).min(scenario.steps.len().saturating_sub(1));
    let error = match (outcome.selector, outcome.expected) {
        (Some(selector), Some(expected)) => E2eError::Assertion {
            selector,
            expected,
            observed: outcome.observed.unwrap_or_else(|| "unknown".to_string()),
        },
        _ => E2eError::Playwright(outcome.error.unwrap_or_else(|| "unknown error".to_string())),
    };
    warn!("Scenario '{}' failed at step {}: {}", scenario.name, failed_at + 1, error);

    let steps = scenario
        .steps
        .iter()
        .take(failed_at + 1)
        .enumerate()
        .map(|(i, s)| StepResult {
            step_name: s.name(),
            success: i < failed_at,
            error: (i == failed_at).then(|| error.to_string()),
        })
        .collect();

    ScenarioRun {
        steps,
        screenshot_path: outcome.screenshot.map(PathBuf::from),
        error: Some(error),
    }
}

/// Pull the last result line out of script output
fn parse_outcome(stdout: &str) -> E2eResult<Option<ScriptOutcome>> {
    let re = Regex::new(&format!(r"(?m)^{} (\{{.*\}})\s*$", RESULT_MARKER))
        .map_err(|e| E2eError::Playwright(e.to_string()))?;
    match re.captures_iter(stdout).last() {
        Some(caps) => Ok(Some(serde_json::from_str(&caps[1])?)),
        None => Ok(None),
    }
}

/// Quote a string as a JavaScript literal
fn js_str(s: &str) -> E2eResult<String> {
    Ok(serde_json::to_string(s)?)
}

/// Failure screenshot file, unique per suite and scenario
fn screenshot_name(suite: &TestSuite, scenario: &Scenario) -> String {
    format!("{}--{}.png", slug(&suite.name), slug(&scenario.name))
}

fn slug(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect()
}
