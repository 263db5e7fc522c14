//! Declarative HTTP requests and their resolution against a [`ValueStore`]

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Display};
use std::time::Duration;
use tracing::debug;

use crate::error::Failure;
use crate::store::ValueStore;
use crate::template::{json_placeholders, Segment, Template};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        };
        write!(f, "{label}")
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Options => reqwest::Method::OPTIONS,
        }
    }
}

/// Ordered name/template pairs (path params, query params, headers)
pub type Pairs = Vec<(String, Template)>;

/// An unresolved request. Placeholders are only looked up by [`RequestSpec::resolve`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSpec {
    pub method: HttpMethod,

    /// Absolute URL or a path joined onto the suite base URL; `{name}` marks a path param
    pub url: Template,

    #[serde(default, with = "ordered_pairs", skip_serializing_if = "Vec::is_empty")]
    pub path_params: Pairs,

    #[serde(default, with = "ordered_pairs", skip_serializing_if = "Vec::is_empty")]
    pub query: Pairs,

    #[serde(default, with = "ordered_pairs", skip_serializing_if = "Vec::is_empty")]
    pub headers: Pairs,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<Value>,
}

impl RequestSpec {
    pub fn builder(method: HttpMethod, url: impl Into<Template>) -> RequestBuilder {
        RequestBuilder {
            spec: RequestSpec {
                method,
                url: url.into(),
                path_params: Vec::new(),
                query: Vec::new(),
                headers: Vec::new(),
                json: None,
            },
        }
    }

    pub fn get(url: impl Into<Template>) -> RequestBuilder {
        Self::builder(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<Template>) -> RequestBuilder {
        Self::builder(HttpMethod::Post, url)
    }

    pub fn put(url: impl Into<Template>) -> RequestBuilder {
        Self::builder(HttpMethod::Put, url)
    }

    pub fn patch(url: impl Into<Template>) -> RequestBuilder {
        Self::builder(HttpMethod::Patch, url)
    }

    pub fn delete(url: impl Into<Template>) -> RequestBuilder {
        Self::builder(HttpMethod::Delete, url)
    }

    /// Every store key this request reads, in no particular order
    pub fn placeholders(&self) -> Vec<String> {
        let mut keys: Vec<String> = std::iter::once(&self.url)
            .chain(self.path_params.iter().map(|(_, t)| t))
            .chain(self.query.iter().map(|(_, t)| t))
            .chain(self.headers.iter().map(|(_, t)| t))
            .flat_map(|t| t.placeholders().map(str::to_string).collect::<Vec<_>>())
            .collect();
        if let Some(body) = &self.json {
            json_placeholders(body, &mut keys);
        }
        keys
    }

    /// Produce a concrete request, looking up every placeholder in `store`.
    ///
    /// Fails with `UnresolvedReference` for a missing key and with
    /// `SpecBuild` for a URL that references an unknown path param or
    /// cannot be parsed.
    pub fn resolve(&self, store: &ValueStore, defaults: &SuiteDefaults) -> Result<ResolvedRequest, Failure> {
        let mut path_values = Vec::with_capacity(self.path_params.len());
        for (name, template) in &self.path_params {
            path_values.push((name.as_str(), store.resolve(template)?));
        }

        let mut raw_url = String::new();
        for segment in self.url.segments() {
            match segment {
                Segment::Literal(text) => raw_url.push_str(&substitute_path_params(text, &path_values)?),
                Segment::Placeholder(key) => raw_url.push_str(&store.get(key)?.to_string()),
            }
        }

        let joined = join_url(defaults.base_url.as_deref(), &raw_url);
        let mut url = reqwest::Url::parse(&joined).map_err(|e| Failure::SpecBuild {
            reason: format!("invalid URL `{}`: {}", joined, e),
        })?;

        if !self.query.is_empty() {
            let mut resolved = Vec::with_capacity(self.query.len());
            for (name, template) in &self.query {
                resolved.push((name.as_str(), store.resolve(template)?));
            }
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &resolved {
                pairs.append_pair(name, value);
            }
        }

        // Only the winning template per header name is resolved
        let mut merged: Vec<(&str, &Template)> = defaults.headers.iter().map(|(n, t)| (n.as_str(), t)).collect();
        for (name, template) in &self.headers {
            match merged.iter_mut().find(|(existing, _)| existing.eq_ignore_ascii_case(name)) {
                Some(slot) => *slot = (name.as_str(), template),
                None => merged.push((name.as_str(), template)),
            }
        }
        let mut headers = Vec::with_capacity(merged.len());
        for (name, template) in merged {
            headers.push((name.to_string(), store.resolve(template)?));
        }

        let body = self.json.as_ref().map(|b| store.resolve_json(b)).transpose()?;

        let resolved = ResolvedRequest {
            method: self.method,
            url: url.to_string(),
            headers,
            body,
            timeout: defaults.timeout,
        };
        debug!("resolved {} {}", resolved.method, resolved.url);
        Ok(resolved)
    }
}

/// Fluent construction of a [`RequestSpec`]
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    spec: RequestSpec,
}

impl RequestBuilder {
    pub fn path_param(mut self, name: impl Into<String>, value: impl Into<Template>) -> Self {
        self.spec.path_params.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<Template>) -> Self {
        self.spec.query.push((name.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<Template>) -> Self {
        self.spec.headers.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.spec.json = Some(body);
        self
    }

    pub fn build(self) -> RequestSpec {
        self.spec
    }
}

/// Suite-wide request settings
#[derive(Debug, Clone)]
pub struct SuiteDefaults {
    pub base_url: Option<String>,

    /// Resolved together with the request's own headers; the request wins by name
    pub headers: Pairs,
    pub timeout: Duration,
}

impl Default for SuiteDefaults {
    fn default() -> Self {
        Self {
            base_url: None,
            headers: Vec::new(),
            timeout: Duration::from_millis(crate::DEFAULT_TIMEOUT_MS),
        }
    }
}

/// A request ready to hand to a transport
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
    #[serde(skip)]
    pub timeout: Duration,
}

impl ResolvedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

fn join_url(base: Option<&str>, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }
    match base {
        Some(base) => {
            let base = base.trim_end_matches('/');
            if url.is_empty() {
                base.to_string()
            } else if url.starts_with('/') {
                format!("{}{}", base, url)
            } else {
                format!("{}/{}", base, url)
            }
        }
        None => url.to_string(),
    }
}

/// Replace `{name}` tokens in a literal URL fragment
fn substitute_path_params(text: &str, values: &[(&str, String)]) -> Result<String, Failure> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or_else(|| Failure::SpecBuild {
            reason: format!("unclosed `{{` in URL template `{}`", text),
        })?;
        let name = &after[..close];
        let value = values
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
            .ok_or_else(|| Failure::SpecBuild {
                reason: format!("URL references path param `{}` which was not supplied", name),
            })?;
        out.push_str(&urlencoding::encode(value));
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Serde adapter keeping map entries in document order
pub(crate) mod ordered_pairs {
    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::fmt;

    use crate::template::Template;

    /// A scalar map value; numbers and booleans are accepted and kept as text
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Integer(i64),
        Float(f64),
        Bool(bool),
    }

    impl From<Scalar> for Template {
        fn from(value: Scalar) -> Self {
            match value {
                Scalar::Text(s) => Template::parse(&s),
                Scalar::Integer(n) => Template::literal(n.to_string()),
                Scalar::Float(n) => Template::literal(n.to_string()),
                Scalar::Bool(b) => Template::literal(b.to_string()),
            }
        }
    }

    pub fn serialize<S>(pairs: &[(String, Template)], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(pairs.len()))?;
        for (name, template) in pairs {
            map.serialize_entry(name, &template.to_string())?;
        }
        map.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<(String, Template)>, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PairsVisitor;

        impl<'de> Visitor<'de> for PairsVisitor {
            type Value = Vec<(String, Template)>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of names to scalar values")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut pairs = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, value)) = access.next_entry::<String, Scalar>()? {
                    pairs.push((name, value.into()));
                }
                Ok(pairs)
            }
        }

        deserializer.deserialize_map(PairsVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn defaults() -> SuiteDefaults {
        SuiteDefaults {
            base_url: Some("https://booker.test/".to_string()),
            headers: vec![
                ("Content-Type".to_string(), Template::literal("application/json")),
                ("Accept".to_string(), Template::literal("application/json")),
            ],
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_resolve_path_params_and_query_in_order() {
        let mut store = ValueStore::new();
        store.set("bookingId", 17i64);

        let spec = RequestSpec::get("/booking/{id}")
            .path_param("id", "$S{bookingId}")
            .query("lastname", "Brown")
            .query("firstname", "Sally")
            .build();

        let resolved = spec.resolve(&store, &defaults()).unwrap();
        assert_eq!(
            resolved.url,
            "https://booker.test/booking/17?lastname=Brown&firstname=Sally"
        );
    }

    #[test]
    fn test_path_param_values_are_encoded() {
        let spec = RequestSpec::get("/things/{name}").path_param("name", "a b/c").build();
        let resolved = spec.resolve(&ValueStore::new(), &defaults()).unwrap();
        assert_eq!(resolved.url, "https://booker.test/things/a%20b%2Fc");
    }

    #[test]
    fn test_missing_path_param_is_spec_build_error() {
        let spec = RequestSpec::get("/booking/{id}").build();
        let err = spec.resolve(&ValueStore::new(), &defaults()).unwrap_err();
        assert!(matches!(err, Failure::SpecBuild { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_request_headers_override_defaults_case_insensitively() {
        let mut store = ValueStore::new();
        store.set("authToken", "abc");

        let spec = RequestSpec::put("/booking/1")
            .header("content-type", "text/plain")
            .header("Cookie", "token=$S{authToken}")
            .build();

        let resolved = spec.resolve(&store, &defaults()).unwrap();
        assert_eq!(resolved.header("Content-Type"), Some("text/plain"));
        assert_eq!(resolved.header("accept"), Some("application/json"));
        assert_eq!(resolved.header("cookie"), Some("token=abc"));
        assert_eq!(resolved.headers.len(), 3);
    }

    #[test]
    fn test_unresolved_placeholder_in_header() {
        let spec = RequestSpec::delete("/booking/1")
            .header("Cookie", "token=$S{token}")
            .build();
        assert_eq!(
            spec.resolve(&ValueStore::new(), &defaults()),
            Err(Failure::UnresolvedReference { key: "token".to_string() })
        );
    }

    #[test]
    fn test_overridden_default_header_is_never_resolved() {
        let mut defaults = defaults();
        defaults
            .headers
            .push(("Cookie".to_string(), Template::parse("token=$S{authToken}")));

        let spec = RequestSpec::get("/booking/1").header("cookie", "none").build();
        let resolved = spec.resolve(&ValueStore::new(), &defaults).unwrap();
        assert_eq!(resolved.header("Cookie"), Some("none"));

        let plain = RequestSpec::get("/booking/1").build();
        assert_eq!(
            plain.resolve(&ValueStore::new(), &defaults),
            Err(Failure::UnresolvedReference { key: "authToken".to_string() })
        );
    }

    #[test]
    fn test_absolute_url_ignores_base() {
        let spec = RequestSpec::get("http://other.test/ping").build();
        let resolved = spec.resolve(&ValueStore::new(), &defaults()).unwrap();
        assert_eq!(resolved.url, "http://other.test/ping");
    }

    #[test]
    fn test_body_is_deep_resolved() {
        let mut store = ValueStore::new();
        store.set("first", "Jim");
        let spec = RequestSpec::post("/booking")
            .json(json!({"firstname": "$S{first}", "bookingdates": {"checkin": "2024-01-01"}}))
            .build();
        let resolved = spec.resolve(&store, &defaults()).unwrap();
        assert_eq!(resolved.body.unwrap()["firstname"], "Jim");
    }

    #[test]
    fn test_placeholders_lists_every_reference() {
        let spec = RequestSpec::put("/booking/{id}")
            .path_param("id", "$S{bookingId}")
            .header("Cookie", "token=$S{authToken}")
            .json(json!({"note": "$S{note}"}))
            .build();
        let mut keys = spec.placeholders();
        keys.sort();
        assert_eq!(keys, vec!["authToken", "bookingId", "note"]);
    }

    #[test]
    fn test_deserialize_keeps_header_order_and_scalars() {
        let yaml = r#"
method: GET
url: /booking
query:
  page: 2
  firstname: Sally
  active: true
"#;
        let spec: RequestSpec = serde_yaml::from_str(yaml).unwrap();
        let names: Vec<_> = spec.query.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["page", "firstname", "active"]);
        assert_eq!(spec.query[0].1, Template::literal("2"));
    }
}
