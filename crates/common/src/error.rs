//! Error types for restcheck
//!
//! Two families live here. [`Failure`] is a per-test-case diagnostic: it is
//! collected into reports, serialised, and never aborts the process. [`Error`]
//! is the crate-level error returned when loading suites or talking to the
//! filesystem fails before any test can run.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Result type alias using the restcheck [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-level errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Suite parse error in {file}: {reason}")]
    SuiteParse { file: String, reason: String },

    #[error("Invalid JSON path `{path}`: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Suite not found: {0}")]
    SuiteNotFound(String),
}

/// A single reason a test case did not pass
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Failure {
    #[error("Unresolved reference: no value captured for `{key}`")]
    UnresolvedReference { key: String },

    #[error("Cannot build request: {reason}")]
    SpecBuild { reason: String },

    #[error("Status mismatch: expected {expected}, got {actual}")]
    StatusMismatch { expected: u16, actual: u16 },

    #[error("Schema violation at {path}: expected {expected_type}, got {actual_type}")]
    SchemaViolation {
        path: String,
        expected_type: String,
        actual_type: String,
    },

    #[error("JSON mismatch at {path}: expected {expected}, got {}", display_actual(.actual))]
    JsonMismatch {
        path: String,
        expected: Value,
        actual: Option<Value>,
    },

    #[error("Length mismatch at {path}: expected {expected} element(s), got {actual}")]
    LengthMismatch {
        path: String,
        expected: usize,
        actual: usize,
    },

    #[error("Header mismatch for `{name}`: expected to contain {expected:?}, got {}", display_header(.actual))]
    HeaderMismatch {
        name: String,
        expected: String,
        actual: Option<String>,
    },

    #[error("Capture failed: nothing at {path}")]
    CaptureFieldMissing { path: String },

    #[error("Capture failed: {path} holds {actual_type}, only strings, numbers and booleans can be stored")]
    CaptureNotScalar { path: String, actual_type: String },

    #[error("Request timed out after {timeout_ms} ms")]
    RequestTimeout { timeout_ms: u64 },

    #[error("Transport error: {message}")]
    Transport { message: String },
}

impl Failure {
    /// Whether this failure ends the whole suite rather than just the case
    pub fn is_fatal(&self) -> bool {
        matches!(self, Failure::SpecBuild { .. })
    }

    /// Whether this failure was raised by an expectation on the response
    pub fn is_assertion(&self) -> bool {
        matches!(
            self,
            Failure::StatusMismatch { .. }
                | Failure::SchemaViolation { .. }
                | Failure::JsonMismatch { .. }
                | Failure::LengthMismatch { .. }
                | Failure::HeaderMismatch { .. }
        )
    }
}

fn display_actual(actual: &Option<Value>) -> String {
    match actual {
        Some(value) => value.to_string(),
        None => "<missing>".to_string(),
    }
}

fn display_header(actual: &Option<String>) -> String {
    match actual {
        Some(value) => format!("{:?}", value),
        None => "<absent>".to_string(),
    }
}
