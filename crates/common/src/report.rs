//! Results of a run and the reporters that observe them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, info};

use crate::error::{Failure, Result};
use crate::store::StoredValue;

/// Outcome of one test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseResult {
    pub name: String,
    pub passed: bool,
    pub failures: Vec<Failure>,
    pub duration_ms: u64,

    /// Status of the response, when one was received
    pub status: Option<u16>,

    /// Store keys written by this case
    #[serde(default)]
    pub captured: Vec<String>,

    /// Captures were declared but the response failed its status check
    #[serde(default)]
    pub skipped_capture: bool,
}

impl TestCaseResult {
    pub fn failed(name: impl Into<String>, failures: Vec<Failure>, duration_ms: u64) -> Self {
        Self {
            name: name.into(),
            passed: false,
            failures,
            duration_ms,
            status: None,
            captured: Vec::new(),
            skipped_capture: false,
        }
    }
}

/// Why a suite stopped before running all of its cases
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FatalError {
    #[error("setup step '{case}' failed with {} failure(s)", .failures.len())]
    SetupFailed { case: String, failures: Vec<Failure> },

    #[error("case '{case}' has a malformed request: {reason}")]
    SpecBuild { case: String, reason: String },
}

/// Outcome of one suite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteReport {
    pub suite_name: String,
    pub setup: Option<TestCaseResult>,
    pub results: Vec<TestCaseResult>,
    pub fatal: Option<FatalError>,

    /// Cases never executed because the suite stopped early
    pub not_run: usize,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Store contents at the end of the run, when exporting is enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<BTreeMap<String, StoredValue>>,
}

impl SuiteReport {
    pub fn passed(&self) -> bool {
        self.fatal.is_none() && self.not_run == 0 && self.results.iter().all(|r| r.passed)
    }

    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.passed).count()
    }

    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at).num_milliseconds().max(0) as u64
    }
}

/// Totals across every suite in a run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub not_run: usize,
    pub fatal_suites: usize,
    pub duration_ms: u64,
    pub suites: Vec<SuiteReport>,
}

impl RunSummary {
    pub fn from_reports(suites: Vec<SuiteReport>, duration_ms: u64) -> Self {
        let mut summary = RunSummary {
            duration_ms,
            ..Default::default()
        };
        for suite in &suites {
            summary.total += suite.results.len() + suite.not_run;
            summary.passed += suite.passed_count();
            summary.failed += suite.failed_count();
            summary.not_run += suite.not_run;
            if suite.fatal.is_some() {
                summary.fatal_suites += 1;
            }
        }
        summary.suites = suites;
        summary
    }

    pub fn success(&self) -> bool {
        self.suites.iter().all(SuiteReport::passed)
    }
}

/// Observer of a run. Reporters never influence pass/fail.
pub trait Reporter: Send {
    fn case_finished(&mut self, _suite: &str, _result: &TestCaseResult) {}

    fn suite_finished(&mut self, _report: &SuiteReport) {}

    /// Called during teardown of every suite, on every exit path
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes one tracing line per case and a summary per suite
#[derive(Debug, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn case_finished(&mut self, suite: &str, result: &TestCaseResult) {
        if result.passed {
            info!("✓ {} :: {} ({} ms)", suite, result.name, result.duration_ms);
        } else {
            error!("✗ {} :: {} ({} ms)", suite, result.name, result.duration_ms);
            for failure in &result.failures {
                error!("    {}", failure);
            }
        }
    }

    fn suite_finished(&mut self, report: &SuiteReport) {
        if let Some(fatal) = &report.fatal {
            error!("Suite '{}' aborted: {}", report.suite_name, fatal);
        }
        info!(
            "Suite '{}': {} passed, {} failed, {} not run ({} ms)",
            report.suite_name,
            report.passed_count(),
            report.failed_count(),
            report.not_run,
            report.duration_ms()
        );
    }
}

/// Collects suite reports and writes them to `test-results.json` on flush
#[derive(Debug)]
pub struct JsonReporter {
    output_dir: PathBuf,
    reports: Vec<SuiteReport>,
}

impl JsonReporter {
    pub const FILE_NAME: &'static str = "test-results.json";

    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            reports: Vec::new(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.output_dir.join(Self::FILE_NAME)
    }
}

impl Reporter for JsonReporter {
    fn suite_finished(&mut self, report: &SuiteReport) {
        self.reports.push(report.clone());
    }

    fn flush(&mut self) -> Result<()> {
        std::fs::create_dir_all(&self.output_dir)?;

        let path = self.path();
        let json = serde_json::to_string_pretty(&self.reports)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(results: Vec<TestCaseResult>, fatal: Option<FatalError>, not_run: usize) -> SuiteReport {
        let now = Utc::now();
        SuiteReport {
            suite_name: "bookings".to_string(),
            setup: None,
            results,
            fatal,
            not_run,
            started_at: now,
            finished_at: now,
            store: None,
        }
    }

    fn passing(name: &str) -> TestCaseResult {
        TestCaseResult {
            name: name.to_string(),
            passed: true,
            failures: vec![],
            duration_ms: 3,
            status: Some(200),
            captured: vec![],
            skipped_capture: false,
        }
    }

    #[test]
    fn test_summary_counts() {
        let ok = report(vec![passing("a"), passing("b")], None, 0);
        let failed = report(
            vec![TestCaseResult::failed("c", vec![Failure::RequestTimeout { timeout_ms: 5 }], 5)],
            Some(FatalError::SpecBuild {
                case: "c".to_string(),
                reason: "bad".to_string(),
            }),
            2,
        );
        let summary = RunSummary::from_reports(vec![ok, failed], 10);
        assert_eq!(summary.total, 5);
        assert_eq!(summary.passed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.not_run, 2);
        assert_eq!(summary.fatal_suites, 1);
        assert!(!summary.success());
    }

    #[test]
    fn test_json_reporter_writes_on_flush() {
        let dir = tempfile::tempdir().unwrap();
        let mut reporter = JsonReporter::new(dir.path().join("out"));
        reporter.suite_finished(&report(vec![passing("a")], None, 0));
        assert!(!reporter.path().exists());

        reporter.flush().unwrap();
        let written: Vec<SuiteReport> =
            serde_json::from_str(&std::fs::read_to_string(reporter.path()).unwrap()).unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].results[0].name, "a");
    }
}
