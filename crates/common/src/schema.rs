//! Structural JSON schema checks.
//!
//! Supports `type` (a name or a list of names), `properties`, `required` and
//! `items`. Properties not listed in the schema are never inspected. Every
//! violation is reported, not only the first.

use serde_json::Value;

use crate::error::Failure;
use crate::json_path::{type_name, JsonPath};

/// Validate `value` against `schema`, returning every violation found
pub fn validate(schema: &Value, value: &Value) -> Vec<Failure> {
    let mut failures = Vec::new();
    check(schema, value, &JsonPath::root(), &mut failures);
    failures
}

fn check(schema: &Value, value: &Value, path: &JsonPath, failures: &mut Vec<Failure>) {
    let Some(schema) = schema.as_object() else {
        return;
    };

    if let Some(expected) = schema.get("type") {
        let names = declared_types(expected);
        if !names.is_empty() && !names.iter().any(|name| matches_type(name, value)) {
            failures.push(Failure::SchemaViolation {
                path: path.to_string(),
                expected_type: names.join("|"),
                actual_type: type_name(value).to_string(),
            });
            return;
        }
    }

    if let Some(object) = value.as_object() {
        if let Some(required) = schema.get("required").and_then(Value::as_array) {
            for key in required.iter().filter_map(Value::as_str) {
                if !object.contains_key(key) {
                    let expected_type = schema
                        .get("properties")
                        .and_then(|p| p.get(key))
                        .and_then(|p| p.get("type"))
                        .map(|t| declared_types(t).join("|"))
                        .filter(|t| !t.is_empty())
                        .unwrap_or_else(|| "present".to_string());
                    failures.push(Failure::SchemaViolation {
                        path: path.key(key).to_string(),
                        expected_type,
                        actual_type: "missing".to_string(),
                    });
                }
            }
        }

        if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
            for (key, property_schema) in properties {
                if let Some(actual) = object.get(key) {
                    check(property_schema, actual, &path.key(key), failures);
                }
            }
        }
    }

    if let (Some(items_schema), Some(items)) = (schema.get("items"), value.as_array()) {
        for (index, item) in items.iter().enumerate() {
            check(items_schema, item, &path.index(index), failures);
        }
    }
}

fn declared_types(expected: &Value) -> Vec<&str> {
    match expected {
        Value::String(name) => vec![name.as_str()],
        Value::Array(names) => names.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn matches_type(name: &str, value: &Value) -> bool {
    match name {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        "number" => value.is_number(),
        "integer" => match value {
            Value::Number(n) => n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0),
            _ => false,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn token_schema() -> Value {
        json!({
            "type": "object",
            "properties": { "token": { "type": "string" } },
            "required": ["token"]
        })
    }

    #[test]
    fn test_valid_token_response() {
        assert!(validate(&token_schema(), &json!({"token": "abc123"})).is_empty());
    }

    #[test]
    fn test_extra_properties_are_ignored() {
        let body = json!({"token": "abc", "expires": 3600});
        assert!(validate(&token_schema(), &body).is_empty());
    }

    #[test]
    fn test_missing_required_property() {
        let failures = validate(&token_schema(), &json!({"reason": "Bad credentials"}));
        assert_eq!(
            failures,
            vec![Failure::SchemaViolation {
                path: "$.token".to_string(),
                expected_type: "string".to_string(),
                actual_type: "missing".to_string(),
            }]
        );
    }

    #[test]
    fn test_nested_type_mismatches_are_all_reported() {
        let schema = json!({
            "type": "object",
            "properties": {
                "bookingid": { "type": "integer" },
                "booking": {
                    "type": "object",
                    "properties": {
                        "totalprice": { "type": "number" },
                        "depositpaid": { "type": "boolean" }
                    }
                }
            }
        });
        let body = json!({
            "bookingid": "7",
            "booking": { "totalprice": "111", "depositpaid": true }
        });
        let failures = validate(&schema, &body);
        assert_eq!(failures.len(), 2);
        assert!(failures.contains(&Failure::SchemaViolation {
            path: "$.booking.totalprice".to_string(),
            expected_type: "number".to_string(),
            actual_type: "string".to_string(),
        }));
    }

    #[test]
    fn test_items_and_type_lists() {
        let schema = json!({
            "type": "array",
            "items": { "type": "object", "required": ["bookingid"] }
        });
        let failures = validate(&schema, &json!([{"bookingid": 1}, {}]));
        assert_eq!(failures.len(), 1);
        assert!(matches!(&failures[0], Failure::SchemaViolation { path, .. } if path == "$[1].bookingid"));

        let nullable = json!({"type": ["string", "null"]});
        assert!(validate(&nullable, &Value::Null).is_empty());
    }

    #[test]
    fn test_non_json_body_reports_root_type() {
        let failures = validate(&token_schema(), &json!("Created"));
        assert_eq!(
            failures,
            vec![Failure::SchemaViolation {
                path: "$".to_string(),
                expected_type: "object".to_string(),
                actual_type: "string".to_string(),
            }]
        );
    }
}
