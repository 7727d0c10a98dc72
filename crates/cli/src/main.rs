//! formflow CLI - Main Entry Point
//!
//! Runs, lists and validates scenario tables against web form screens.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use formflow_e2e::HarnessConfig;

mod commands;
mod output;

use commands::{check, list, pages, run};

/// formflow - data-driven form scenario runner
#[derive(Parser)]
#[command(name = "formflow")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Config file (default: ./formflow.toml when present)
    #[arg(short, long, global = true, env = "FORMFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scenarios in real browser sessions
    Run(run::RunArgs),

    /// List the scenarios a run would execute
    List(list::ListArgs),

    /// Validate scenarios against page catalogs without a browser
    Check(check::CheckArgs),

    /// Show page definitions and their fields
    Pages(pages::PagesArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let config = HarnessConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run(args) => run::execute(args, config, cli.format).await?,
        Commands::List(args) => list::execute(args, &config, cli.format)?,
        Commands::Check(args) => check::execute(args, &config, cli.format)?,
        Commands::Pages(args) => pages::execute(args, cli.format)?,
    }

    Ok(())
}
