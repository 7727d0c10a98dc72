//! `formflow run`: execute scenarios in real browsers

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Args;
use formflow_e2e::playwright::Browser;
use formflow_e2e::{
    HarnessConfig, HttpFixtureHooks, PlaywrightLauncher, RunnerConfig, ScenarioReport,
    ScenarioRunner, ServerHandle, SuiteReport,
};
use serde::Serialize;
use tracing::info;

use super::SourceArgs;
use crate::output::{
    print_error, print_list, print_success, print_warning, OutputFormat, TableDisplay,
};

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Base URL of the application (overrides config and FORMFLOW_BASE_URL)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Concurrent browser sessions
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Browser engine
    #[arg(long)]
    pub browser: Option<Browser>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Directory for the JSON report and screenshots
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Do not start the `[server]` from the config file
    #[arg(long)]
    pub no_server: bool,
}

impl RunArgs {
    /// Flags take precedence over file and environment
    fn apply(&self, config: &mut HarnessConfig) {
        if let Some(url) = &self.base_url {
            config.base_url = url.clone();
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(browser) = self.browser {
            config.browser = browser;
        }
        if self.headed {
            config.headless = false;
        }
        if let Some(dir) = &self.output_dir {
            config.screenshot_dir = dir.join("screenshots");
            config.output_dir = dir.clone();
        }
    }
}

/// One line of the results table
#[derive(Serialize)]
pub struct ResultRow {
    pub scenario: String,
    pub passed: bool,
    pub duration_ms: u64,
    pub detail: String,
}

impl From<&ScenarioReport> for ResultRow {
    fn from(report: &ScenarioReport) -> Self {
        let detail = match (&report.error, report.teardown_errors.is_empty()) {
            (Some(err), _) => err.clone(),
            (None, false) => report.teardown_errors.join("; "),
            (None, true) => report
                .observed
                .as_ref()
                .map(|o| o.to_string())
                .unwrap_or_default(),
        };
        Self {
            scenario: report.id.clone(),
            passed: report.passed,
            duration_ms: report.duration_ms,
            detail,
        }
    }
}

impl TableDisplay for ResultRow {
    fn headers() -> Vec<&'static str> {
        vec!["", "Scenario", "Duration", "Detail"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            if self.passed { "✓" } else { "✗" }.to_string(),
            self.scenario.clone(),
            format!("{} ms", self.duration_ms),
            self.detail.clone(),
        ]
    }
}

pub async fn execute(args: RunArgs, mut config: HarnessConfig, format: OutputFormat) -> Result<()> {
    args.apply(&mut config);
    config.validate()?;

    let registry = args.source.registry()?;
    let cases = args.source.cases(&config)?;
    if cases.is_empty() {
        bail!("no scenarios selected");
    }

    // Start the application first so its port is known to the browser and hooks
    let mut server = match (&config.server, args.no_server) {
        (Some(section), false) => {
            let handle = ServerHandle::spawn(section.to_server_config()).await?;
            config.base_url = handle.base_url().to_string();
            Some(handle)
        }
        _ => None,
    };

    let launcher = PlaywrightLauncher::new(config.playwright())?;
    let mut runner = ScenarioRunner::new(
        Arc::new(launcher),
        Arc::new(registry),
        RunnerConfig::from(&config),
    );
    if let Some(hooks) = config.hooks_config() {
        info!("Fixture hooks at {}", hooks.base_url);
        runner = runner.with_hooks(Arc::new(HttpFixtureHooks::new(&hooks)?));
    } else {
        let needs_hooks = cases.iter().filter(|c| !c.setup.is_empty()).count();
        if needs_hooks > 0 {
            print_warning(&format!(
                "{} scenario(s) need fixture hooks but no [hooks] section is configured",
                needs_hooks
            ));
        }
    }

    let report = runner.run_all(&cases).await;
    let path = runner.write_results(&report)?;

    if let Some(server) = server.as_mut() {
        server.stop().await?;
    }

    print_report(&report, format);
    println!("Report: {}", path.display());

    if !report.success() {
        bail!("{} of {} scenario(s) failed", report.failed, report.total);
    }
    Ok(())
}

fn print_report(report: &SuiteReport, format: OutputFormat) {
    let rows: Vec<ResultRow> = report.results.iter().map(ResultRow::from).collect();
    print_list(&rows, format);

    let summary = format!(
        "{} passed, {} failed ({} ms)",
        report.passed, report.failed, report.duration_ms
    );
    if report.success() {
        print_success(&summary);
    } else {
        print_error(&summary);
    }
}
