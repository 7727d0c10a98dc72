//! `formflow check`: validate tables against page catalogs without a browser

use anyhow::{bail, Result};
use clap::Args;
use formflow_e2e::HarnessConfig;
use serde::Serialize;

use super::SourceArgs;
use crate::output::{print_list, print_success, OutputFormat, TableDisplay};

#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub source: SourceArgs,
}

#[derive(Serialize)]
pub struct Problem {
    pub scenario: String,
    pub error: String,
}

impl TableDisplay for Problem {
    fn headers() -> Vec<&'static str> {
        vec!["Scenario", "Problem"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.scenario.clone(), self.error.clone()]
    }
}

pub fn execute(args: CheckArgs, config: &HarnessConfig, format: OutputFormat) -> Result<()> {
    let registry = args.source.registry()?;
    let cases = args.source.cases(config)?;
    let hooks_configured = config.hooks.is_some();

    let mut problems = Vec::new();
    for case in &cases {
        if let Err(e) = registry.validate_case(case) {
            problems.push(Problem {
                scenario: case.id(),
                error: e.to_string(),
            });
        } else if !case.setup.is_empty() && !hooks_configured {
            problems.push(Problem {
                scenario: case.id(),
                error: "needs fixture hooks, but no [hooks] section is configured".into(),
            });
        }
    }

    if problems.is_empty() {
        print_success(&format!("{} scenario(s) are valid", cases.len()));
        return Ok(());
    }
    print_list(&problems, format);
    bail!("{} of {} scenario(s) are invalid", problems.len(), cases.len())
}
