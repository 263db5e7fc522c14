//! Run suites against an API

use anyhow::Context;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;

use restcheck_common::{HttpTransport, JsonReporter, LogReporter, RunSummary, Suite, SuiteRunner};

use crate::config::CliConfig;
use crate::output::{self, CaseRow, OutputFormat};

#[derive(Args)]
pub struct RunArgs {
    /// Suite files or directories
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Only run suites with this tag
    #[arg(long)]
    pub tag: Option<String>,

    /// Only run suites whose name contains this text
    #[arg(long)]
    pub name: Option<String>,

    /// Base URL replacing the one declared by each suite
    #[arg(long, env = "RESTCHECK_BASE_URL")]
    pub base_url: Option<String>,

    /// Default request timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Directory for test-results.json
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table")]
    pub format: OutputFormat,

    /// Include captured values in the results
    #[arg(long)]
    pub export_store: bool,
}

impl RunArgs {
    /// Flags take precedence over the config file
    fn merge_into(&self, mut config: CliConfig) -> CliConfig {
        if let Some(url) = &self.base_url {
            config.base_url = Some(url.clone());
        }
        if let Some(ms) = self.timeout_ms {
            config.timeout_ms = Some(ms);
        }
        if let Some(dir) = &self.output {
            config.output_dir = Some(dir.clone());
        }
        config.export_store |= self.export_store;
        config
    }

    fn selects(&self, suite: &Suite) -> bool {
        let tagged = self
            .tag
            .as_ref()
            .map(|tag| suite.tags.iter().any(|t| t == tag))
            .unwrap_or(true);
        let named = self
            .name
            .as_ref()
            .map(|name| suite.name.contains(name.as_str()))
            .unwrap_or(true);
        tagged && named
    }
}

pub async fn execute(args: RunArgs, config: CliConfig) -> anyhow::Result<i32> {
    let mut suites = Suite::load_paths(&args.paths).context("failed to load suites")?;
    suites.retain(|suite| args.selects(suite));
    if suites.is_empty() {
        output::print_warning("No suites matched the given filters");
        return Ok(0);
    }

    info!("Loaded {} suite(s)", suites.len());

    let config = args.merge_into(config);
    let transport = HttpTransport::new().context("failed to create HTTP client")?;
    let mut runner = SuiteRunner::with_config(transport, config.runner_config());
    runner.add_reporter(LogReporter);
    if let Some(dir) = &config.output_dir {
        runner.add_reporter(JsonReporter::new(dir.clone()));
    }

    let summary = runner.run_suites(&suites).await;
    print_summary(&summary, args.format)?;

    Ok(if summary.success() { 0 } else { 1 })
}

fn print_summary(summary: &RunSummary, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(summary)?);
        }
        OutputFormat::Table => {
            let rows: Vec<CaseRow> = summary.suites.iter().flat_map(CaseRow::from_report).collect();
            output::print_list(&rows, format);

            for report in &summary.suites {
                if let Some(fatal) = &report.fatal {
                    output::print_error(&format!("{}: {}", report.suite_name, fatal));
                }
            }

            let line = format!(
                "{} passed, {} failed, {} not run ({} ms)",
                summary.passed, summary.failed, summary.not_run, summary.duration_ms
            );
            if summary.success() {
                println!("{}", line.green());
            } else {
                println!("{}", line.red());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        run: RunArgs,
    }

    fn parse(argv: &[&str]) -> RunArgs {
        Harness::parse_from(std::iter::once("restcheck").chain(argv.iter().copied())).run
    }

    #[test]
    fn test_flags_override_config() {
        let args = parse(&["suites", "--base-url", "http://localhost:3001", "--timeout-ms", "500"]);
        let file = CliConfig {
            base_url: Some("https://booker.example".to_string()),
            timeout_ms: Some(10_000),
            output_dir: Some(PathBuf::from("target/results")),
            ..Default::default()
        };

        let merged = args.merge_into(file);
        assert_eq!(merged.base_url.as_deref(), Some("http://localhost:3001"));
        assert_eq!(merged.timeout_ms, Some(500));
        assert_eq!(merged.output_dir, Some(PathBuf::from("target/results")));
        assert!(!merged.export_store);
    }

    #[test]
    fn test_selects_by_tag_and_name() {
        let mut suite = Suite::new("booking crud");
        suite.tags = vec!["booking".to_string()];

        assert!(parse(&["suites"]).selects(&suite));
        assert!(parse(&["suites", "--tag", "booking"]).selects(&suite));
        assert!(!parse(&["suites", "--tag", "auth"]).selects(&suite));
        assert!(parse(&["suites", "--tag", "booking", "--name", "crud"]).selects(&suite));
        assert!(!parse(&["suites", "--name", "health"]).selects(&suite));
    }
}
