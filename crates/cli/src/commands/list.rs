//! `formflow list`: show the cases a run would execute

use anyhow::Result;
use clap::Args;
use formflow_e2e::{HarnessConfig, ScenarioCase};
use serde::Serialize;

use super::SourceArgs;
use crate::output::{print_list, OutputFormat, TableDisplay};

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub source: SourceArgs,
}

#[derive(Serialize)]
pub struct CaseRow {
    pub id: String,
    pub page: String,
    pub tags: Vec<String>,
    pub setup: Vec<String>,
    pub expect: String,
}

impl From<&ScenarioCase> for CaseRow {
    fn from(case: &ScenarioCase) -> Self {
        Self {
            id: case.id(),
            page: case.page.clone(),
            tags: case.tags.clone(),
            setup: case.setup.iter().map(|a| a.to_string()).collect(),
            expect: case.expect.to_string(),
        }
    }
}

impl TableDisplay for CaseRow {
    fn headers() -> Vec<&'static str> {
        vec!["Scenario", "Page", "Tags", "Setup", "Expect"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.page.clone(),
            self.tags.join(", "),
            self.setup.join(", "),
            self.expect.clone(),
        ]
    }
}

pub fn execute(args: ListArgs, config: &HarnessConfig, format: OutputFormat) -> Result<()> {
    let cases = args.source.cases(config)?;
    let rows: Vec<CaseRow> = cases.iter().map(CaseRow::from).collect();
    print_list(&rows, format);
    Ok(())
}
