//! Copying response fields into the value store

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Failure;
use crate::json_path::{type_name, JsonPath};
use crate::store::{StoredValue, ValueStore};
use crate::transport::HttpResponse;

/// Store the value at `path` under `key`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureRule {
    pub path: JsonPath,
    pub key: String,
}

impl CaptureRule {
    pub fn new(path: JsonPath, key: impl Into<String>) -> Self {
        Self { path, key: key.into() }
    }

    /// Extract the field this rule points at
    pub fn extract(&self, response: &HttpResponse) -> Result<StoredValue, Failure> {
        let value = self
            .path
            .select(&response.body)
            .filter(|v| !v.is_null())
            .ok_or_else(|| Failure::CaptureFieldMissing {
                path: self.path.to_string(),
            })?;
        StoredValue::from_json(value).ok_or_else(|| Failure::CaptureNotScalar {
            path: self.path.to_string(),
            actual_type: type_name(value).to_string(),
        })
    }
}

/// What [`apply`] wrote and what it could not
#[derive(Debug, Default, PartialEq)]
pub struct CaptureOutcome {
    pub captured: Vec<String>,
    pub failures: Vec<Failure>,
}

/// Apply every rule, writing what can be extracted.
///
/// Callers decide whether the response is eligible for capture; see
/// [`crate::expect::status_ok`].
pub fn apply(rules: &[CaptureRule], response: &HttpResponse, store: &mut ValueStore) -> CaptureOutcome {
    let mut outcome = CaptureOutcome::default();
    for rule in rules {
        match rule.extract(response) {
            Ok(value) => {
                debug!("captured {} from {}", rule.key, rule.path);
                store.set(rule.key.clone(), value);
                outcome.captured.push(rule.key.clone());
            }
            Err(failure) => outcome.failures.push(failure),
        }
    }
    outcome
}
