//! CLI Commands

pub mod check;
pub mod list;
pub mod pages;
pub mod run;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use formflow_e2e::table::expand_all;
use formflow_e2e::{HarnessConfig, PageRegistry, ScenarioCase, ScenarioTable};
use tracing::debug;

/// Where scenario tables and extra page definitions come from
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Directory of scenario tables (*.yaml); defaults to `scenarios_dir`
    /// from the config
    #[arg(long)]
    pub scenarios: Option<PathBuf>,

    /// Directory of additional page definitions (*.yaml)
    #[arg(long)]
    pub pages: Option<PathBuf>,

    /// Only cases carrying this tag
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Only cases whose `table/row` id contains this text
    #[arg(short, long)]
    pub filter: Option<String>,
}

impl SourceArgs {
    pub fn registry(&self) -> Result<PageRegistry> {
        load_registry(self.pages.as_deref())
    }

    /// Table directory: the flag, else the configured one
    pub fn scenarios_dir<'a>(&'a self, config: &'a HarnessConfig) -> &'a Path {
        self.scenarios.as_deref().unwrap_or(&config.scenarios_dir)
    }

    /// Load, expand and filter the scenario tables
    pub fn cases(&self, config: &HarnessConfig) -> Result<Vec<ScenarioCase>> {
        let dir = self.scenarios_dir(config);
        let tables = ScenarioTable::load_all(dir)
            .with_context(|| format!("loading scenarios from {}", dir.display()))?;
        let cases = select(expand_all(&tables), self.tag.as_deref(), self.filter.as_deref());
        debug!("{} case(s) selected from {} table(s)", cases.len(), tables.len());
        Ok(cases)
    }
}

pub fn load_registry(pages_dir: Option<&Path>) -> Result<PageRegistry> {
    let mut registry = PageRegistry::builtin()?;
    if let Some(dir) = pages_dir {
        let loaded = registry
            .load_dir(dir)
            .with_context(|| format!("loading pages from {}", dir.display()))?;
        debug!("Loaded {} page definition(s) from {}", loaded, dir.display());
    }
    Ok(registry)
}

pub fn select(cases: Vec<ScenarioCase>, tag: Option<&str>, filter: Option<&str>) -> Vec<ScenarioCase> {
    cases
        .into_iter()
        .filter(|c| tag.map_or(true, |t| c.has_tag(t)))
        .filter(|c| filter.map_or(true, |f| c.id().contains(f)))
        .collect()
}
