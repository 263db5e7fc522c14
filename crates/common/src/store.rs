//! Run-scoped store of captured values

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::debug;

use crate::error::Failure;
use crate::template::Template;

/// A value held in the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredValue {
    Bool(bool),
    Number(Number),
    Text(String),
}

impl StoredValue {
    /// Convert a JSON scalar; `None` for null, arrays and objects
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(StoredValue::Bool(*b)),
            Value::Number(n) => Some(StoredValue::Number(n.clone())),
            Value::String(s) => Some(StoredValue::Text(s.clone())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            StoredValue::Bool(b) => Value::Bool(*b),
            StoredValue::Number(n) => Value::Number(n.clone()),
            StoredValue::Text(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for StoredValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoredValue::Bool(b) => write!(f, "{}", b),
            StoredValue::Number(n) => write!(f, "{}", n),
            StoredValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for StoredValue {
    fn from(value: &str) -> Self {
        StoredValue::Text(value.to_string())
    }
}

impl From<String> for StoredValue {
    fn from(value: String) -> Self {
        StoredValue::Text(value)
    }
}

impl From<bool> for StoredValue {
    fn from(value: bool) -> Self {
        StoredValue::Bool(value)
    }
}

impl From<i64> for StoredValue {
    fn from(value: i64) -> Self {
        StoredValue::Number(value.into())
    }
}

impl From<u64> for StoredValue {
    fn from(value: u64) -> Self {
        StoredValue::Number(value.into())
    }
}

/// Key/value table shared by the cases of one suite run.
///
/// Created empty when a suite starts and dropped when it finishes. Suites
/// never share a store.
#[derive(Debug, Clone, Default)]
pub struct ValueStore {
    values: HashMap<String, StoredValue>,
}

impl ValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, returning whatever was there before
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<StoredValue>) -> Option<StoredValue> {
        let key = key.into();
        let value = value.into();
        debug!("store: {} = {}", key, value);
        self.values.insert(key, value)
    }

    /// Look up `key`, failing with `UnresolvedReference` when it was never set
    pub fn get(&self, key: &str) -> Result<&StoredValue, Failure> {
        self.values
            .get(key)
            .ok_or_else(|| Failure::UnresolvedReference { key: key.to_string() })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Render a template, substituting every placeholder
    pub fn resolve(&self, template: &Template) -> Result<String, Failure> {
        template.render(self)
    }

    /// Resolve every string leaf inside a JSON structure.
    ///
    /// A string that is exactly one placeholder takes the stored value's JSON
    /// type; any other string is rendered as text.
    pub fn resolve_json(&self, value: &Value) -> Result<Value, Failure> {
        match value {
            Value::String(s) => {
                let template = Template::parse(s);
                match template.sole_placeholder() {
                    Some(key) => Ok(self.get(key)?.to_json()),
                    None => Ok(Value::String(template.render(self)?)),
                }
            }
            Value::Array(items) => items
                .iter()
                .map(|item| self.resolve_json(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(map) => {
                let mut resolved = serde_json::Map::with_capacity(map.len());
                for (key, item) in map {
                    resolved.insert(key.clone(), self.resolve_json(item)?);
                }
                Ok(Value::Object(resolved))
            }
            other => Ok(other.clone()),
        }
    }

    /// Sorted snapshot for debugging output
    pub fn export(&self) -> BTreeMap<String, StoredValue> {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_overwrites() {
        let mut store = ValueStore::new();
        assert_eq!(store.set("token", "abc"), None);
        assert_eq!(store.set("token", "def"), Some(StoredValue::from("abc")));
        assert_eq!(store.get("token").unwrap(), &StoredValue::from("def"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_get_missing_is_unresolved_reference() {
        let store = ValueStore::new();
        assert_eq!(
            store.get("token"),
            Err(Failure::UnresolvedReference { key: "token".to_string() })
        );
    }

    #[test]
    fn test_resolve_substitutes_every_placeholder() {
        let mut store = ValueStore::new();
        store.set("authToken", "abc123");
        store.set("bookingId", 42i64);

        let template = Template::parse("token=$S{authToken}; id=$S{bookingId}");
        let rendered = store.resolve(&template).unwrap();
        assert_eq!(rendered, "token=abc123; id=42");
        assert!(!rendered.contains("$S{"));
    }

    #[test]
    fn test_resolve_json_keeps_types_for_sole_placeholders() {
        let mut store = ValueStore::new();
        store.set("bookingId", 42i64);
        store.set("paid", true);
        store.set("name", "Jim");

        let body = json!({
            "id": "$S{bookingId}",
            "flags": ["$S{paid}", "literal"],
            "nested": {"greeting": "hello $S{name}"}
        });
        let resolved = store.resolve_json(&body).unwrap();
        assert_eq!(
            resolved,
            json!({
                "id": 42,
                "flags": [true, "literal"],
                "nested": {"greeting": "hello Jim"}
            })
        );
    }

    #[test]
    fn test_resolve_json_propagates_unresolved() {
        let store = ValueStore::new();
        let body = json!({"outer": [{"inner": "$S{missing}"}]});
        assert_eq!(
            store.resolve_json(&body),
            Err(Failure::UnresolvedReference { key: "missing".to_string() })
        );
    }

    #[test]
    fn test_export_is_sorted() {
        let mut store = ValueStore::new();
        store.set("b", "2");
        store.set("a", "1");
        let keys: Vec<_> = store.export().into_keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
