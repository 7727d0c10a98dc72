//! Scenario runner: setup, one browser session per case, teardown, assertion

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};

use crate::assertion::{ExpectedOutcome, Outcome};
use crate::config::{HarnessConfig, Timeouts};
use crate::driver::{BrowserDriver, BrowserLauncher};
use crate::error::{E2eError, E2eResult};
use crate::hooks::FixtureHooks;
use crate::page::PageDefinition;
use crate::pages::PageRegistry;
use crate::table::{FieldInputs, ScenarioCase};

/// Report file name inside the output directory
pub const RESULTS_FILE: &str = "formflow-results.json";

/// Browser state captured when a scenario fails while its session is open
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureCapture {
    /// Last URL the session reported
    pub url: Option<String>,

    /// Fields written before the failure, in order
    pub attempted: Vec<(String, String)>,

    pub screenshot: Option<PathBuf>,

    /// SHA-256 of the screenshot file
    pub screenshot_sha256: Option<String>,
}

/// Result of one scenario
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub id: String,
    pub name: String,
    pub table: String,
    pub page: String,
    pub tags: Vec<String>,
    pub passed: bool,
    pub duration_ms: u64,
    pub inputs: FieldInputs,
    pub expected: ExpectedOutcome,
    pub observed: Option<Outcome>,
    pub error: Option<String>,

    /// Set when the error came from the case itself (unknown field, bad option)
    pub programmer_error: bool,

    pub failure: Option<FailureCapture>,

    /// Errors from closing the session or reverting setup
    pub teardown_errors: Vec<String>,
}

impl ScenarioReport {
    fn new(case: &ScenarioCase) -> Self {
        Self {
            id: case.id(),
            name: case.name.clone(),
            table: case.table.clone(),
            page: case.page.clone(),
            tags: case.tags.clone(),
            passed: false,
            duration_ms: 0,
            inputs: case.inputs.clone(),
            expected: case.expect.clone(),
            observed: None,
            error: None,
            programmer_error: false,
            failure: None,
            teardown_errors: Vec::new(),
        }
    }

    fn record_error(&mut self, err: &E2eError) {
        if self.error.is_none() {
            self.error = Some(err.to_string());
            self.programmer_error = err.is_programmer_error();
        }
    }
}

/// Result of a whole run
#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioReport>,
}

impl SuiteReport {
    pub fn success(&self) -> bool {
        self.failed == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &ScenarioReport> {
        self.results.iter().filter(|r| !r.passed)
    }

    pub fn get(&self, id: &str) -> Option<&ScenarioReport> {
        self.results.iter().find(|r| r.id == id)
    }
}

/// Runner settings taken from [`HarnessConfig`]
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub timeouts: Timeouts,
    pub workers: usize,
    pub output_dir: PathBuf,
    pub screenshot_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::from(&HarnessConfig::default())
    }
}

impl From<&HarnessConfig> for RunnerConfig {
    fn from(config: &HarnessConfig) -> Self {
        Self {
            timeouts: config.timeouts.clone(),
            workers: config.workers,
            output_dir: config.output_dir.clone(),
            screenshot_dir: config.screenshot_dir.clone(),
        }
    }
}

/// Executes scenario cases against fresh browser sessions
pub struct ScenarioRunner {
    launcher: Arc<dyn BrowserLauncher>,
    hooks: Option<Arc<dyn FixtureHooks>>,
    pages: Arc<PageRegistry>,
    config: RunnerConfig,
}

/// What happened while the session was open
struct Execution {
    outcome: E2eResult<Outcome>,
    capture: Option<FailureCapture>,
    close_error: Option<E2eError>,
}

impl ScenarioRunner {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        pages: Arc<PageRegistry>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            launcher,
            hooks: None,
            pages,
            config,
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn FixtureHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Check a case can run at all, without touching a browser
    pub fn validate_case(&self, case: &ScenarioCase) -> E2eResult<&PageDefinition> {
        let page = self.pages.validate_case(case)?;
        if !case.setup.is_empty() && self.hooks.is_none() {
            return Err(E2eError::HooksNotConfigured(case.id()));
        }
        Ok(page)
    }

    /// Run every case. Shared-state cases run alone after the concurrent batch;
    /// reports come back in input order.
    pub async fn run_all(&self, cases: &[ScenarioCase]) -> SuiteReport {
        let start = Instant::now();
        let started_at = Utc::now();
        let (exclusive, concurrent): (Vec<_>, Vec<_>) = cases
            .iter()
            .enumerate()
            .partition(|(_, case)| case.is_exclusive());

        info!(
            "Running {} scenario(s) with {} worker(s), {} exclusive",
            cases.len(),
            self.config.workers,
            exclusive.len()
        );

        let mut indexed: Vec<(usize, ScenarioReport)> = stream::iter(concurrent)
            .map(|(i, case)| async move { (i, self.run_case(case).await) })
            .buffer_unordered(self.config.workers.max(1))
            .collect()
            .await;

        for (i, case) in exclusive {
            indexed.push((i, self.run_case(case).await));
        }
        indexed.sort_by_key(|(i, _)| *i);

        let results: Vec<ScenarioReport> = indexed.into_iter().map(|(_, r)| r).collect();
        let passed = results.iter().filter(|r| r.passed).count();
        let failed = results.len() - passed;
        let duration_ms = start.elapsed().as_millis() as u64;

        info!("");
        info!(
            "Scenario results: {} passed, {} failed ({} ms)",
            passed, failed, duration_ms
        );

        SuiteReport {
            started_at,
            total: results.len(),
            passed,
            failed,
            duration_ms,
            results,
        }
    }

    /// Run one case start to finish. Never retried.
    pub async fn run_case(&self, case: &ScenarioCase) -> ScenarioReport {
        let start = Instant::now();
        let mut report = ScenarioReport::new(case);
        debug!("Running scenario: {}", report.id);

        let page = match self.validate_case(case) {
            Ok(page) => page,
            Err(e) => {
                report.record_error(&e);
                error!("✗ {} - {}", report.id, e);
                return report;
            }
        };

        // Setup, remembering what was applied so only that is reverted
        let mut applied = Vec::new();
        let mut setup_error = None;
        if let Some(hooks) = &self.hooks {
            for action in &case.setup {
                match hooks.apply(action).await {
                    Ok(()) => applied.push(action),
                    Err(e) => {
                        setup_error = Some(e);
                        break;
                    }
                }
            }
        }

        let outcome = match setup_error {
            Some(e) => Err(e),
            None => {
                let execution = self.execute(page, case).await;
                report.failure = execution.capture;
                if let Some(e) = execution.close_error {
                    warn!("Closing session for '{}' failed: {}", report.id, e);
                    report.teardown_errors.push(format!("close session: {}", e));
                }
                execution.outcome
            }
        };

        if let Some(hooks) = &self.hooks {
            for action in applied.into_iter().rev() {
                if let Err(e) = hooks.revert(action).await {
                    warn!("Reverting '{}' for '{}' failed: {}", action, report.id, e);
                    report.teardown_errors.push(format!("revert {}: {}", action, e));
                }
            }
        }

        match outcome {
            Ok(observed) => {
                if let Err(e) = case.expect.check(&report.id, &observed) {
                    report.record_error(&e);
                }
                report.observed = Some(observed);
            }
            Err(e) => report.record_error(&e),
        }

        report.passed = report.error.is_none() && report.teardown_errors.is_empty();
        report.duration_ms = start.elapsed().as_millis() as u64;

        if report.passed {
            info!("✓ {} ({} ms)", report.id, report.duration_ms);
        } else {
            let reason = report
                .error
                .clone()
                .unwrap_or_else(|| report.teardown_errors.join("; "));
            error!("✗ {} - {}", report.id, reason);
            debug!("  inputs: {:?}", report.inputs.as_slice());
        }
        report
    }

    /// Launch, drive the page within the scenario budget, capture state on
    /// failure, close. The session outlives the budget so a timed-out
    /// scenario is still captured and closed.
    async fn execute(&self, page: &PageDefinition, case: &ScenarioCase) -> Execution {
        let mut driver = match self.launcher.launch().await {
            Ok(driver) => driver,
            Err(e) => {
                return Execution {
                    outcome: Err(e),
                    capture: None,
                    close_error: None,
                }
            }
        };

        let budget = self.config.timeouts.scenario();
        let mut page_object = page.bind(driver.as_mut(), &self.config.timeouts);
        let drive = async {
            page_object.navigate().await?;
            page_object.fill_fields(case.inputs.as_slice()).await?;
            page_object.submit().await?;
            page_object.read_outcome().await
        };
        let outcome = match tokio::time::timeout(budget, drive).await {
            Ok(outcome) => outcome,
            Err(_) => Err(E2eError::Timeout(format!(
                "scenario '{}' after {} ms",
                case.id(),
                self.config.timeouts.scenario_ms
            ))),
        };
        let attempted = page_object.attempted().to_vec();
        drop(page_object);

        let capture = match &outcome {
            Err(_) => Some(self.capture(driver.as_mut(), &case.id(), attempted).await),
            Ok(_) => None,
        };
        let close_error = driver.close().await.err();

        Execution {
            outcome,
            capture,
            close_error,
        }
    }

    /// Best-effort snapshot of the session. Problems are logged, not raised.
    async fn capture(
        &self,
        driver: &mut dyn BrowserDriver,
        id: &str,
        attempted: Vec<(String, String)>,
    ) -> FailureCapture {
        let mut capture = FailureCapture {
            attempted,
            ..Default::default()
        };

        match driver.current_url().await {
            Ok(url) => capture.url = Some(url),
            Err(e) => warn!("Could not read URL for '{}': {}", id, e),
        }

        let path = self
            .config
            .screenshot_dir
            .join(format!("{}.png", screenshot_name(id)));
        let shot = async {
            std::fs::create_dir_all(&self.config.screenshot_dir)?;
            driver.screenshot(&path).await?;
            hash_file(&path)
        }
        .await;
        match shot {
            Ok(digest) => {
                capture.screenshot = Some(path);
                capture.screenshot_sha256 = Some(digest);
            }
            Err(e) => warn!("Could not capture screenshot for '{}': {}", id, e),
        }
        capture
    }

    /// Write the suite report as JSON into the output directory
    pub fn write_results(&self, results: &SuiteReport) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join(RESULTS_FILE);
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

/// Hash a file using SHA256
fn hash_file(path: &Path) -> E2eResult<String> {
    let data = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

fn sanitize_file_name(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

/// Readable, collision-free file stem for a case id
fn screenshot_name(id: &str) -> String {
    let digest = hex::encode(Sha256::digest(id.as_bytes()));
    format!("{}-{}", sanitize_file_name(id), &digest[..8])
}
