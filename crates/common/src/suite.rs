//! Declarative YAML suites

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::time::Duration;

use crate::capture::CaptureRule;
use crate::error::{Error, Result};
use crate::expect::Expectation;
use crate::request::{Pairs, RequestSpec};

/// One request with its expectations and captures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,

    /// Store keys that must exist before the request is sent
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub needs: BTreeSet<String>,

    pub request: RequestSpec,

    /// Written as one-key maps (`- status: 200`)
    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    pub expect: Vec<Expectation>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capture: Vec<CaptureRule>,

    /// Overrides the suite timeout for this request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl TestCase {
    pub fn new(name: impl Into<String>, request: RequestSpec) -> Self {
        Self {
            name: name.into(),
            needs: BTreeSet::new(),
            request,
            expect: Vec::new(),
            capture: Vec::new(),
            timeout_ms: None,
        }
    }

    pub fn needs(mut self, key: impl Into<String>) -> Self {
        self.needs.insert(key.into());
        self
    }

    pub fn expect(mut self, expectation: Expectation) -> Self {
        self.expect.push(expectation);
        self
    }

    pub fn capture(mut self, rule: CaptureRule) -> Self {
        self.capture.push(rule);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Keys this case reads: declared needs plus request placeholders
    pub fn reads(&self) -> BTreeSet<String> {
        let mut keys = self.needs.clone();
        keys.extend(self.request.placeholders());
        keys
    }
}

/// An ordered list of cases sharing one value store and one setup step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suite {
    /// Unique name for this suite
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Tags for filtering suites
    #[serde(default)]
    pub tags: Vec<String>,

    /// Joined in front of relative request URLs
    #[serde(default)]
    pub base_url: Option<String>,

    /// Default request timeout
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Headers sent with every request; may reference stored values
    #[serde(default, with = "crate::request::ordered_pairs", skip_serializing_if = "Vec::is_empty")]
    pub headers: Pairs,

    /// Runs before the first case; any failure here aborts the suite
    #[serde(default)]
    pub setup: Option<TestCase>,

    pub cases: Vec<TestCase>,
}

/// A key read by a case before anything earlier in the suite captures it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyIssue {
    pub case: String,
    pub key: String,
}

impl Suite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            tags: Vec::new(),
            base_url: None,
            timeout_ms: None,
            headers: Vec::new(),
            setup: None,
            cases: Vec::new(),
        }
    }

    /// Parse a suite from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    /// Parse a suite from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| Error::SuiteParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Load all suites below a directory, ordered by file path
    pub fn load_all(dir: &Path) -> Result<Vec<Self>> {
        let mut files: Vec<_> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
            .map(|e| e.into_path())
            .collect();
        files.sort();

        files.iter().map(|path| Self::from_file(path)).collect()
    }

    /// Load suites from a mix of files and directories
    pub fn load_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Self>> {
        let mut suites = Vec::new();
        for path in paths {
            let path = path.as_ref();
            if path.is_dir() {
                suites.extend(Self::load_all(path)?);
            } else if path.is_file() {
                suites.push(Self::from_file(path)?);
            } else {
                return Err(Error::SuiteNotFound(path.display().to_string()));
            }
        }
        Ok(suites)
    }

    /// Filter suites by tag
    pub fn filter_by_tag<'a>(suites: &'a [Self], tag: &str) -> Vec<&'a Self> {
        suites.iter().filter(|s| s.tags.iter().any(|t| t == tag)).collect()
    }

    /// Setup first, then cases in declaration order
    pub fn steps(&self) -> impl Iterator<Item = &TestCase> {
        self.setup.iter().chain(self.cases.iter())
    }

    /// Suite headers sent with the setup step.
    ///
    /// A header reading a key that the setup itself captures is left out, since
    /// the setup runs before that key exists.
    pub fn setup_headers(&self) -> Pairs {
        let captures: HashSet<&str> = self
            .setup
            .iter()
            .flat_map(|setup| setup.capture.iter().map(|r| r.key.as_str()))
            .collect();
        self.headers
            .iter()
            .filter(|(_, template)| !template.placeholders().any(|key| captures.contains(key)))
            .cloned()
            .collect()
    }

    /// Find keys that are read before any earlier step captures them.
    ///
    /// The runner never reorders cases, so such a key can only be satisfied by
    /// accident; at run time the case fails with an unresolved reference.
    pub fn check_dependencies(&self) -> Vec<DependencyIssue> {
        let mut captured: HashSet<&str> = HashSet::new();
        let mut issues = Vec::new();

        if let Some(setup) = &self.setup {
            let mut reads = setup.reads();
            reads.extend(header_reads(&self.setup_headers(), setup));
            for key in reads {
                issues.push(DependencyIssue {
                    case: setup.name.clone(),
                    key,
                });
            }
            captured.extend(setup.capture.iter().map(|r| r.key.as_str()));
        }

        for case in &self.cases {
            let mut reads = case.reads();
            reads.extend(header_reads(&self.headers, case));
            for key in reads {
                if !captured.contains(key.as_str()) {
                    issues.push(DependencyIssue {
                        case: case.name.clone(),
                        key,
                    });
                }
            }
            captured.extend(case.capture.iter().map(|r| r.key.as_str()));
        }

        issues
    }
}

/// Keys read by suite headers that `case` does not override
fn header_reads(headers: &Pairs, case: &TestCase) -> BTreeSet<String> {
    headers
        .iter()
        .filter(|(name, _)| {
            !case
                .request
                .headers
                .iter()
                .any(|(own, _)| own.eq_ignore_ascii_case(name))
        })
        .flat_map(|(_, t)| t.placeholders().map(str::to_string).collect::<Vec<_>>())
        .collect()
}
