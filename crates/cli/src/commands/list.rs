//! List suites

use anyhow::Context;
use clap::Args;
use std::path::PathBuf;

use restcheck_common::Suite;

use crate::output::{self, OutputFormat, SuiteRow};

#[derive(Args)]
pub struct ListArgs {
    /// Suite files or directories
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Only list suites with this tag
    #[arg(long)]
    pub tag: Option<String>,

    /// Output format
    #[arg(long, default_value = "table")]
    pub format: OutputFormat,
}

pub fn execute(args: ListArgs) -> anyhow::Result<i32> {
    let suites = Suite::load_paths(&args.paths).context("failed to load suites")?;

    let rows: Vec<SuiteRow> = match &args.tag {
        Some(tag) => Suite::filter_by_tag(&suites, tag).into_iter().map(SuiteRow::from).collect(),
        None => suites.iter().map(SuiteRow::from).collect(),
    };

    output::print_list(&rows, args.format);
    Ok(0)
}
