//! Response expectations

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::Failure;
use crate::json_path::{type_name, JsonPath};
use crate::schema;
use crate::transport::HttpResponse;

/// A single assertion about a response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    /// Exact status code
    Status(u16),

    /// Structural schema of the body
    JsonSchema(Value),

    /// Partial deep match of the body (or of the value at `path`)
    JsonLike {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<JsonPath>,
        value: Value,
    },

    /// Length of the array body (or of the array at `path`)
    JsonLength {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<JsonPath>,
        len: usize,
    },

    /// A response header containing `value`
    Header { name: String, value: String },
}

impl Expectation {
    pub fn json_like(value: Value) -> Self {
        Expectation::JsonLike { path: None, value }
    }

    pub fn json_like_at(path: JsonPath, value: Value) -> Self {
        Expectation::JsonLike { path: Some(path), value }
    }

    pub fn json_length(len: usize) -> Self {
        Expectation::JsonLength { path: None, len }
    }

    /// Check this expectation, appending every failure to `failures`
    pub fn check(&self, response: &HttpResponse, failures: &mut Vec<Failure>) {
        match self {
            Expectation::Status(expected) => {
                if response.status != *expected {
                    failures.push(Failure::StatusMismatch {
                        expected: *expected,
                        actual: response.status,
                    });
                }
            }
            Expectation::JsonSchema(schema) => {
                failures.extend(schema::validate(schema, &response.body));
            }
            Expectation::JsonLike { path, value } => {
                let root = path.clone().unwrap_or_default();
                match root.select(&response.body) {
                    Some(actual) => like(value, actual, &root, failures),
                    None => failures.push(Failure::JsonMismatch {
                        path: root.to_string(),
                        expected: value.clone(),
                        actual: None,
                    }),
                }
            }
            Expectation::JsonLength { path, len } => {
                let root = path.clone().unwrap_or_default();
                match root.select(&response.body) {
                    Some(Value::Array(items)) => {
                        if items.len() != *len {
                            failures.push(Failure::LengthMismatch {
                                path: root.to_string(),
                                expected: *len,
                                actual: items.len(),
                            });
                        }
                    }
                    Some(other) => failures.push(Failure::SchemaViolation {
                        path: root.to_string(),
                        expected_type: "array".to_string(),
                        actual_type: type_name(other).to_string(),
                    }),
                    None => failures.push(Failure::JsonMismatch {
                        path: root.to_string(),
                        expected: Value::String(format!("array of length {}", len)),
                        actual: None,
                    }),
                }
            }
            Expectation::Header { name, value } => {
                let actual = response.header(name);
                if !actual.is_some_and(|v| v.contains(value.as_str())) {
                    failures.push(Failure::HeaderMismatch {
                        name: name.clone(),
                        expected: value.clone(),
                        actual: actual.map(str::to_string),
                    });
                }
            }
        }
    }
}

/// Evaluate all expectations without stopping at the first failure
pub fn evaluate(expectations: &[Expectation], response: &HttpResponse) -> Vec<Failure> {
    let mut failures = Vec::new();
    for expectation in expectations {
        expectation.check(response, &mut failures);
    }
    failures
}

/// Whether the response satisfied its status expectations.
///
/// With no status expectation declared, any 2xx counts.
pub fn status_ok(expectations: &[Expectation], response: &HttpResponse) -> bool {
    let mut declared = expectations.iter().filter_map(|e| match e {
        Expectation::Status(code) => Some(*code),
        _ => None,
    });
    match declared.next() {
        Some(first) => first == response.status && declared.all(|code| code == response.status),
        None => response.is_success(),
    }
}

/// Partial deep match of `expected` against `actual`
pub fn is_like(expected: &Value, actual: &Value) -> bool {
    let mut failures = Vec::new();
    like(expected, actual, &JsonPath::root(), &mut failures);
    failures.is_empty()
}

fn like(expected: &Value, actual: &Value, path: &JsonPath, failures: &mut Vec<Failure>) {
    match (expected, actual) {
        (Value::Object(want), Value::Object(have)) => {
            for (key, want_value) in want {
                let child = path.key(key);
                match have.get(key) {
                    Some(have_value) => like(want_value, have_value, &child, failures),
                    None => failures.push(Failure::JsonMismatch {
                        path: child.to_string(),
                        expected: want_value.clone(),
                        actual: None,
                    }),
                }
            }
        }
        (Value::Array(want), Value::Array(have)) => {
            let mut used = vec![false; have.len()];
            for want_item in want {
                let found = have
                    .iter()
                    .enumerate()
                    .find(|(i, have_item)| !used[*i] && is_like(want_item, have_item))
                    .map(|(i, _)| i);
                match found {
                    Some(i) => used[i] = true,
                    None => {
                        failures.push(Failure::JsonMismatch {
                            path: path.to_string(),
                            expected: expected.clone(),
                            actual: Some(actual.clone()),
                        });
                        return;
                    }
                }
            }
        }
        (Value::Number(want), Value::Number(have)) => {
            if !numbers_equal(want, have) {
                push_mismatch(expected, actual, path, failures);
            }
        }
        _ => {
            if expected != actual {
                push_mismatch(expected, actual, path, failures);
            }
        }
    }
}

/// Integers compare exactly; f64 is used only when either side is a float
fn numbers_equal(want: &Number, have: &Number) -> bool {
    if let (Some(a), Some(b)) = (want.as_i64(), have.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (want.as_u64(), have.as_u64()) {
        return a == b;
    }
    if want.is_f64() || have.is_f64() {
        return matches!((want.as_f64(), have.as_f64()), (Some(a), Some(b)) if a == b);
    }
    false
}

fn push_mismatch(expected: &Value, actual: &Value, path: &JsonPath, failures: &mut Vec<Failure>) {
    failures.push(Failure::JsonMismatch {
        path: path.to_string(),
        expected: expected.clone(),
        actual: Some(actual.clone()),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn booking() -> Value {
        json!({
            "firstname": "Jim",
            "lastname": "Brown",
            "totalprice": 111,
            "depositpaid": true,
            "bookingdates": { "checkin": "2018-01-01", "checkout": "2019-01-01" },
            "additionalneeds": "Breakfast"
        })
    }

    #[test]
    fn test_status_mismatch() {
        let response = HttpResponse::new(404, json!("Not Found"));
        assert_eq!(
            evaluate(&[Expectation::Status(200)], &response),
            vec![Failure::StatusMismatch { expected: 200, actual: 404 }]
        );
    }

    #[test]
    fn test_json_like_ignores_extra_keys() {
        let response = HttpResponse::new(200, booking());
        let expected = json!({"firstname": "Jim", "bookingdates": {"checkin": "2018-01-01"}});
        assert!(evaluate(&[Expectation::json_like(expected)], &response).is_empty());
    }

    #[test]
    fn test_json_like_reports_each_mismatch_with_path() {
        let response = HttpResponse::new(200, booking());
        let expected = json!({
            "firstname": "Sally",
            "bookingdates": { "checkout": "2020-01-01" },
            "missing": 1
        });
        let failures = evaluate(&[Expectation::json_like(expected)], &response);
        assert_eq!(failures.len(), 3);
        assert!(failures.contains(&Failure::JsonMismatch {
            path: "$.bookingdates.checkout".to_string(),
            expected: json!("2020-01-01"),
            actual: Some(json!("2019-01-01")),
        }));
        assert!(failures.contains(&Failure::JsonMismatch {
            path: "$.missing".to_string(),
            expected: json!(1),
            actual: None,
        }));
    }

    #[test]
    fn test_json_like_is_key_order_insensitive_and_idempotent() {
        let expected = json!({"b": 2, "a": {"y": 1, "x": 0}});
        let actual_one: Value = serde_json::from_str(r#"{"a":{"x":0,"y":1},"b":2,"c":3}"#).unwrap();
        let actual_two: Value = serde_json::from_str(r#"{"c":3,"b":2,"a":{"y":1,"x":0}}"#).unwrap();
        assert!(is_like(&expected, &actual_one));
        assert!(is_like(&expected, &actual_two));
        assert_eq!(is_like(&expected, &actual_one), is_like(&expected, &actual_one));
    }

    #[test]
    fn test_json_like_numbers_compare_numerically() {
        assert!(is_like(&json!(111), &json!(111.0)));
        assert!(!is_like(&json!(111), &json!(112)));
        assert!(is_like(&json!(1), &json!(1.0)));
        assert!(is_like(&json!(-3), &json!(-3.0)));
    }

    #[test]
    fn test_json_like_large_integers_compare_exactly() {
        assert!(!is_like(&json!(9007199254740993u64), &json!(9007199254740992u64)));
        assert!(is_like(&json!(9007199254740993u64), &json!(9007199254740993u64)));
        assert!(!is_like(&json!(u64::MAX), &json!(-1)));
        assert!(!is_like(&json!(i64::MIN + 1), &json!(i64::MIN)));
    }

    #[test]
    fn test_json_like_arrays_match_elements_in_any_order() {
        let actual = json!([{"bookingid": 1}, {"bookingid": 2}, {"bookingid": 3}]);
        assert!(is_like(&json!([{"bookingid": 3}, {"bookingid": 1}]), &actual));
        assert!(!is_like(&json!([{"bookingid": 4}]), &actual));
        assert!(!is_like(&json!([{"bookingid": 1}, {"bookingid": 1}]), &actual));
    }

    #[test]
    fn test_json_like_at_path() {
        let response = HttpResponse::new(200, json!({"bookingid": 5, "booking": booking()}));
        let expectation = Expectation::json_like_at(
            JsonPath::parse("booking.bookingdates").unwrap(),
            json!({"checkin": "2018-01-01"}),
        );
        assert!(evaluate(&[expectation], &response).is_empty());
    }

    #[test]
    fn test_json_length() {
        let empty = HttpResponse::new(200, json!([]));
        let one = HttpResponse::new(200, json!([{"bookingid": 1}]));
        let expectation = Expectation::json_length(0);

        assert!(evaluate(std::slice::from_ref(&expectation), &empty).is_empty());
        assert_eq!(
            evaluate(&[expectation], &one),
            vec![Failure::LengthMismatch {
                path: "$".to_string(),
                expected: 0,
                actual: 1
            }]
        );
    }

    #[test]
    fn test_json_length_on_non_array() {
        let response = HttpResponse::new(200, json!({"bookingid": 1}));
        let failures = evaluate(&[Expectation::json_length(1)], &response);
        assert!(matches!(
            &failures[0],
            Failure::SchemaViolation { expected_type, actual_type, .. }
                if expected_type == "array" && actual_type == "object"
        ));
    }

    #[test]
    fn test_all_failures_are_collected() {
        let response = HttpResponse::new(500, json!({"error": "boom"}));
        let expectations = vec![
            Expectation::Status(200),
            Expectation::JsonSchema(json!({"type": "object", "required": ["token"]})),
            Expectation::json_like(json!({"error": "none"})),
            Expectation::Header {
                name: "Content-Type".to_string(),
                value: "application/json".to_string(),
            },
        ];
        let failures = evaluate(&expectations, &response);
        assert_eq!(failures.len(), 4);
        assert!(matches!(failures[0], Failure::StatusMismatch { .. }));
        assert!(matches!(failures[3], Failure::HeaderMismatch { actual: None, .. }));
    }

    #[test]
    fn test_status_ok() {
        let created = HttpResponse::new(201, json!("Created"));
        assert!(status_ok(&[Expectation::Status(201)], &created));
        assert!(!status_ok(&[Expectation::Status(200)], &created));
        assert!(status_ok(&[], &created));
        assert!(!status_ok(&[], &HttpResponse::new(404, Value::Null)));
    }

    #[test]
    fn test_deserialize_from_yaml() {
        let yaml = r#"
- status: 200
- json_like:
    path: booking
    value: { firstname: Jim }
- json_length:
    len: 0
- json_schema:
    type: object
- header:
    name: Content-Type
    value: json
"#;
        let expectations: Vec<Expectation> =
            serde_yaml::with::singleton_map_recursive::deserialize(serde_yaml::Deserializer::from_str(yaml)).unwrap();
        assert_eq!(expectations.len(), 5);
        assert_eq!(expectations[0], Expectation::Status(200));
        assert!(matches!(&expectations[1], Expectation::JsonLike { path: Some(_), .. }));
    }
}
