//! Suite runner: setup, cases in order, then teardown

use chrono::Utc;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::capture;
use crate::error::Failure;
use crate::expect;
use crate::report::{FatalError, Reporter, RunSummary, SuiteReport, TestCaseResult};
use crate::request::{Pairs, SuiteDefaults};
use crate::store::ValueStore;
use crate::suite::{Suite, TestCase};
use crate::template::Template;
use crate::transport::Transport;

/// Lifecycle of one suite run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Init,
    Setup,
    Cases,
    Teardown,
    Done,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunPhase::Init => "init",
            RunPhase::Setup => "setup",
            RunPhase::Cases => "cases",
            RunPhase::Teardown => "teardown",
            RunPhase::Done => "done",
        };
        f.write_str(label)
    }
}

/// Configuration shared by every suite in a run
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Used when neither the suite nor the case sets a timeout
    pub default_timeout: Duration,

    /// Replaces every suite's `base_url`
    pub base_url: Option<String>,

    /// Sent with every request; suite and case headers take precedence
    pub headers: Vec<(String, String)>,

    /// Include the final store contents in each suite report
    pub export_store: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_millis(crate::DEFAULT_TIMEOUT_MS),
            base_url: None,
            headers: Vec::new(),
            export_store: false,
        }
    }
}

/// Runs suites strictly sequentially against one transport
pub struct SuiteRunner<T: Transport> {
    transport: T,
    config: RunnerConfig,
    reporters: Vec<Box<dyn Reporter>>,
}

impl<T: Transport> SuiteRunner<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, RunnerConfig::default())
    }

    pub fn with_config(transport: T, config: RunnerConfig) -> Self {
        Self {
            transport,
            config,
            reporters: Vec::new(),
        }
    }

    pub fn add_reporter(&mut self, reporter: impl Reporter + 'static) -> &mut Self {
        self.reporters.push(Box::new(reporter));
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run suites one after another, each with a fresh store
    pub async fn run_suites(&mut self, suites: &[Suite]) -> RunSummary {
        let start = Instant::now();
        info!("Running {} suite(s)...", suites.len());

        let mut reports = Vec::with_capacity(suites.len());
        for suite in suites {
            reports.push(self.run_suite(suite).await);
        }

        let summary = RunSummary::from_reports(reports, start.elapsed().as_millis() as u64);
        info!(
            "Test Results: {} passed, {} failed, {} not run ({} ms)",
            summary.passed, summary.failed, summary.not_run, summary.duration_ms
        );
        summary
    }

    /// Run a single suite with its own store
    pub async fn run_suite(&mut self, suite: &Suite) -> SuiteReport {
        let mut store = ValueStore::new();
        let mut phase = RunPhase::Init;
        let transport = &self.transport;
        let config = &self.config;
        let mut teardown = Teardown {
            suite: &suite.name,
            reporters: &mut self.reporters,
        };

        info!("Suite '{}': {} case(s)", suite.name, suite.cases.len());

        let mut report = SuiteReport {
            suite_name: suite.name.clone(),
            setup: None,
            results: Vec::with_capacity(suite.cases.len()),
            fatal: None,
            not_run: 0,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            store: None,
        };

        if let Some(setup) = &suite.setup {
            advance(&suite.name, &mut phase, RunPhase::Setup);
            let defaults = suite_defaults(config, suite, &suite.setup_headers());
            let result = execute_case(transport, &defaults, setup, &mut store).await;
            teardown.case_finished(&result);
            if !result.passed {
                error!("Setup '{}' failed; skipping {} case(s)", setup.name, suite.cases.len());
                report.fatal = Some(FatalError::SetupFailed {
                    case: setup.name.clone(),
                    failures: result.failures.clone(),
                });
            }
            report.setup = Some(result);
        }

        if report.fatal.is_none() {
            advance(&suite.name, &mut phase, RunPhase::Cases);
            let defaults = suite_defaults(config, suite, &suite.headers);
            for case in &suite.cases {
                let result = execute_case(transport, &defaults, case, &mut store).await;
                teardown.case_finished(&result);

                let fatal = result.failures.iter().find_map(|f| match f {
                    Failure::SpecBuild { reason } => Some(reason.clone()),
                    _ => None,
                });
                report.results.push(result);

                if let Some(reason) = fatal {
                    error!("Case '{}' cannot be built; stopping suite '{}'", case.name, suite.name);
                    report.fatal = Some(FatalError::SpecBuild {
                        case: case.name.clone(),
                        reason,
                    });
                    break;
                }
            }
        }

        advance(&suite.name, &mut phase, RunPhase::Teardown);
        report.not_run = suite.cases.len() - report.results.len();
        report.finished_at = Utc::now();
        if config.export_store {
            report.store = Some(store.export());
        }
        teardown.suite_finished(&report);
        drop(teardown);

        advance(&suite.name, &mut phase, RunPhase::Done);
        report
    }
}

/// Flushes every reporter when dropped, so teardown happens on every exit path
struct Teardown<'a> {
    suite: &'a str,
    reporters: &'a mut Vec<Box<dyn Reporter>>,
}

impl Teardown<'_> {
    fn case_finished(&mut self, result: &TestCaseResult) {
        for reporter in self.reporters.iter_mut() {
            reporter.case_finished(self.suite, result);
        }
    }

    fn suite_finished(&mut self, report: &SuiteReport) {
        for reporter in self.reporters.iter_mut() {
            reporter.suite_finished(report);
        }
    }
}

impl Drop for Teardown<'_> {
    fn drop(&mut self) {
        for reporter in self.reporters.iter_mut() {
            if let Err(e) = reporter.flush() {
                warn!("Reporter flush failed for suite '{}': {}", self.suite, e);
            }
        }
    }
}

fn advance(suite: &str, phase: &mut RunPhase, next: RunPhase) {
    debug!("suite '{}': {} -> {}", suite, phase, next);
    *phase = next;
}

/// Settings for one phase: runner config, then suite values on top.
/// Header templates stay unresolved until a request picks its winners.
fn suite_defaults(config: &RunnerConfig, suite: &Suite, suite_headers: &Pairs) -> SuiteDefaults {
    let mut headers: Pairs = config
        .headers
        .iter()
        .map(|(name, value)| (name.clone(), Template::literal(value.as_str())))
        .collect();
    for (name, template) in suite_headers {
        match headers.iter_mut().find(|(existing, _)| existing.eq_ignore_ascii_case(name)) {
            Some(slot) => *slot = (name.clone(), template.clone()),
            None => headers.push((name.clone(), template.clone())),
        }
    }

    SuiteDefaults {
        base_url: config.base_url.clone().or_else(|| suite.base_url.clone()),
        headers,
        timeout: suite
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(config.default_timeout),
    }
}

/// Run one case: check needs, resolve, send, check expectations, capture
async fn execute_case<T: Transport + ?Sized>(
    transport: &T,
    defaults: &SuiteDefaults,
    case: &TestCase,
    store: &mut ValueStore,
) -> TestCaseResult {
    let start = Instant::now();
    let elapsed = |start: Instant| start.elapsed().as_millis() as u64;
    debug!("Running case: {}", case.name);

    let missing: Vec<Failure> = case
        .needs
        .iter()
        .filter(|key| !store.contains(key))
        .map(|key| Failure::UnresolvedReference { key: key.clone() })
        .collect();
    if !missing.is_empty() {
        return TestCaseResult::failed(&case.name, missing, elapsed(start));
    }

    let mut request = match case.request.resolve(store, defaults) {
        Ok(request) => request,
        Err(failure) => return TestCaseResult::failed(&case.name, vec![failure], elapsed(start)),
    };
    if let Some(ms) = case.timeout_ms {
        request.timeout = Duration::from_millis(ms);
    }
    debug!("{} {}", request.method, request.url);

    let response = match tokio::time::timeout(request.timeout, transport.send(&request)).await {
        Ok(Ok(response)) => response,
        Ok(Err(failure)) => return TestCaseResult::failed(&case.name, vec![failure], elapsed(start)),
        Err(_) => {
            let timeout_ms = request.timeout.as_millis() as u64;
            return TestCaseResult::failed(&case.name, vec![Failure::RequestTimeout { timeout_ms }], elapsed(start));
        }
    };

    let mut failures = expect::evaluate(&case.expect, &response);

    let mut captured = Vec::new();
    let mut skipped_capture = false;
    if !case.capture.is_empty() {
        if expect::status_ok(&case.expect, &response) {
            let outcome = capture::apply(&case.capture, &response, store);
            captured = outcome.captured;
            failures.extend(outcome.failures);
        } else {
            debug!("Skipping capture for '{}': status {} not expected", case.name, response.status);
            skipped_capture = true;
        }
    }

    TestCaseResult {
        name: case.name.clone(),
        passed: failures.is_empty(),
        failures,
        duration_ms: elapsed(start),
        status: Some(response.status),
        captured,
        skipped_capture,
    }
}
