//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use restcheck_common::{DependencyIssue, Suite, SuiteReport, TestCaseResult};

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

/// One line of the run table
#[derive(Debug, Serialize)]
pub struct CaseRow {
    pub suite: String,
    pub case: String,
    pub passed: bool,
    pub status: Option<u16>,
    pub duration_ms: u64,
    pub failures: Vec<String>,
}

impl CaseRow {
    pub fn new(suite: &str, result: &TestCaseResult) -> Self {
        Self {
            suite: suite.to_string(),
            case: result.name.clone(),
            passed: result.passed,
            status: result.status,
            duration_ms: result.duration_ms,
            failures: result.failures.iter().map(ToString::to_string).collect(),
        }
    }

    /// Rows for the setup step and every case that ran
    pub fn from_report(report: &SuiteReport) -> Vec<Self> {
        report
            .setup
            .iter()
            .chain(report.results.iter())
            .map(|result| Self::new(&report.suite_name, result))
            .collect()
    }
}

impl TableDisplay for CaseRow {
    fn headers() -> Vec<&'static str> {
        vec!["Suite", "Case", "Result", "Status", "Time", "Failures"]
    }

    fn row(&self) -> Vec<String> {
        let result = if self.passed {
            "✓ pass".green().to_string()
        } else {
            "✗ fail".red().to_string()
        };
        vec![
            self.suite.clone(),
            self.case.clone(),
            result,
            self.status.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string()),
            format!("{} ms", self.duration_ms),
            self.failures.join("\n"),
        ]
    }
}

/// One line of `restcheck list`
#[derive(Debug, Serialize)]
pub struct SuiteRow {
    pub name: String,
    pub tags: Vec<String>,
    pub setup: Option<String>,
    pub cases: usize,
    pub description: String,
}

impl From<&Suite> for SuiteRow {
    fn from(suite: &Suite) -> Self {
        Self {
            name: suite.name.clone(),
            tags: suite.tags.clone(),
            setup: suite.setup.as_ref().map(|c| c.name.clone()),
            cases: suite.cases.len(),
            description: suite.description.clone(),
        }
    }
}

impl TableDisplay for SuiteRow {
    fn headers() -> Vec<&'static str> {
        vec!["Suite", "Tags", "Setup", "Cases", "Description"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.tags.join(", "),
            self.setup.clone().unwrap_or_else(|| "-".to_string()),
            self.cases.to_string(),
            self.description.clone(),
        ]
    }
}

/// One line of `restcheck validate`
#[derive(Debug, Serialize)]
pub struct IssueRow {
    pub suite: String,
    pub case: String,
    pub key: String,
}

impl IssueRow {
    pub fn new(suite: &str, issue: &DependencyIssue) -> Self {
        Self {
            suite: suite.to_string(),
            case: issue.case.clone(),
            key: issue.key.clone(),
        }
    }
}

impl TableDisplay for IssueRow {
    fn headers() -> Vec<&'static str> {
        vec!["Suite", "Case", "Unsatisfied key"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.suite.clone(), self.case.clone(), self.key.clone()]
    }
}

/// Render items as a table
pub fn render_table<T: TableDisplay>(items: &[T]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(T::headers());
    for item in items {
        table.add_row(item.row());
    }
    table
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("No items found.");
                return;
            }
            println!("{}", render_table(items));
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(items).unwrap_or_default());
        }
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    println!("⚠️  {}", message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use restcheck_common::{Failure, TestCase, RequestSpec};

    fn result(name: &str, failures: Vec<Failure>) -> TestCaseResult {
        TestCaseResult {
            name: name.to_string(),
            passed: failures.is_empty(),
            failures,
            duration_ms: 12,
            status: Some(200),
            captured: vec![],
            skipped_capture: false,
        }
    }

    #[test]
    fn test_case_row_lists_every_failure() {
        let row = CaseRow::new(
            "bookings",
            &result(
                "get booking",
                vec![
                    Failure::StatusMismatch { expected: 200, actual: 404 },
                    Failure::LengthMismatch {
                        path: "$".to_string(),
                        expected: 2,
                        actual: 0,
                    },
                ],
            ),
        );
        assert!(!row.passed);
        assert_eq!(row.failures.len(), 2);

        let cells = row.row();
        assert_eq!(cells.len(), CaseRow::headers().len());
        assert_eq!(cells[3], "200");
        assert_eq!(cells[4], "12 ms");
        assert_eq!(cells[5].lines().count(), 2);
    }

    #[test]
    fn test_suite_row() {
        let mut suite = Suite::new("auth");
        suite.tags = vec!["smoke".to_string(), "auth".to_string()];
        suite.cases.push(TestCase::new("login", RequestSpec::post("/auth").build()));

        let row = SuiteRow::from(&suite);
        assert_eq!(
            row.row(),
            vec!["auth", "smoke, auth", "-", "1", ""]
        );
    }

    #[test]
    fn test_render_table_contains_cells() {
        let rows = vec![IssueRow {
            suite: "bookings".to_string(),
            case: "get booking".to_string(),
            key: "bookingId".to_string(),
        }];
        let rendered = render_table(&rows).to_string();
        assert!(rendered.contains("Unsatisfied key"));
        assert!(rendered.contains("bookingId"));
    }
}
