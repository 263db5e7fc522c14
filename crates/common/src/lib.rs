//! restcheck Common Library
//!
//! Stateful HTTP contract tests: requests are declared with `$S{key}`
//! placeholders, responses are checked against expectations, and selected
//! fields are captured into a value store that later requests read from.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  SuiteRunner                                                 │
//! │    setup ─▶ case ─▶ case ─▶ ... ─▶ teardown (reporter flush) │
//! ├──────────────────────────────────────────────────────────────┤
//! │  per case                                                    │
//! │    needs check ─▶ RequestSpec::resolve(store)                │
//! │               ─▶ Transport::send (timeout)                   │
//! │               ─▶ expect::evaluate (all failures collected)   │
//! │               ─▶ capture::apply ─▶ ValueStore                │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod capture;
pub mod error;
pub mod expect;
pub mod json_path;
pub mod report;
pub mod request;
pub mod runner;
pub mod schema;
pub mod store;
pub mod suite;
pub mod template;
pub mod transport;

// Re-export commonly used types
pub use capture::CaptureRule;
pub use error::{Error, Failure, Result};
pub use expect::Expectation;
pub use json_path::JsonPath;
pub use report::{FatalError, JsonReporter, LogReporter, Reporter, RunSummary, SuiteReport, TestCaseResult};
pub use request::{HttpMethod, RequestSpec, ResolvedRequest, SuiteDefaults};
pub use runner::{RunnerConfig, SuiteRunner};
pub use store::{StoredValue, ValueStore};
pub use suite::{DependencyIssue, Suite, TestCase};
pub use template::Template;
pub use transport::{HttpResponse, HttpTransport, Transport};

/// restcheck version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Request timeout used when nothing else is configured
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
