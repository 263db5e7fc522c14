//! restcheck CLI - Main Entry Point
//!
//! Runs, validates and lists stateful HTTP contract suites.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod output;

use commands::{list, run, validate};
use config::CliConfig;

/// Exit code for suites that could not be loaded or configured
pub const EXIT_LOAD_ERROR: i32 = 2;

/// restcheck - Stateful HTTP Contract Tests
#[derive(Parser)]
#[command(name = "restcheck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = "restcheck.toml", global = true)]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run suites against an API
    Run(run::RunArgs),

    /// Check suites for parse errors and unsatisfied dependencies
    Validate(validate::ValidateArgs),

    /// List suites with their tags and case counts
    List(list::ListArgs),
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
        .with_writer(std::io::stderr)
        .init();

    let result = match CliConfig::load(&cli.config) {
        Ok(config) => match cli.command {
            Commands::Run(args) => run::execute(args, config).await,
            Commands::Validate(args) => validate::execute(args),
            Commands::List(args) => list::execute(args),
        },
        Err(e) => Err(e.context(format!("invalid config file {}", cli.config.display()))),
    };

    match result {
        Ok(0) => Ok(()),
        Ok(code) => std::process::exit(code),
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            std::process::exit(EXIT_LOAD_ERROR);
        }
    }
}
