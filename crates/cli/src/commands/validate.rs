//! Validate suites without sending any requests

use anyhow::Context;
use clap::Args;
use std::path::PathBuf;

use restcheck_common::Suite;

use crate::output::{self, IssueRow, OutputFormat};

#[derive(Args)]
pub struct ValidateArgs {
    /// Suite files or directories
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table")]
    pub format: OutputFormat,
}

pub fn execute(args: ValidateArgs) -> anyhow::Result<i32> {
    let suites = Suite::load_paths(&args.paths).context("failed to load suites")?;
    let issues = dependency_issues(&suites);

    if issues.is_empty() {
        if args.format == OutputFormat::Json {
            output::print_list(&issues, args.format);
        } else {
            output::print_success(&format!("{} suite(s) valid", suites.len()));
        }
        return Ok(0);
    }

    output::print_list(&issues, args.format);
    Ok(1)
}

fn dependency_issues(suites: &[Suite]) -> Vec<IssueRow> {
    suites
        .iter()
        .flat_map(|suite| {
            suite
                .check_dependencies()
                .into_iter()
                .map(move |issue| IssueRow::new(&suite.name, &issue))
        })
        .collect()
}
