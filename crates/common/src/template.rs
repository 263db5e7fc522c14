//! String templates with `$S{key}` placeholders

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Failure;
use crate::store::ValueStore;

const OPEN: &str = "$S{";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A parsed string that may reference stored values.
///
/// Parsing never fails: an unterminated `$S{` or an empty `$S{}` stays
/// literal text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(input: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = input;

        while let Some(start) = rest.find(OPEN) {
            let after = &rest[start + OPEN.len()..];
            match after.find('}') {
                Some(end) if end > 0 => {
                    literal.push_str(&rest[..start]);
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(after[..end].to_string()));
                    rest = &after[end + 1..];
                }
                _ => {
                    literal.push_str(&rest[..start + OPEN.len()]);
                    rest = after;
                }
            }
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self { segments }
    }

    /// A template with no placeholders
    pub fn literal(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.is_empty() {
            return Self::default();
        }
        Self {
            segments: vec![Segment::Literal(text)],
        }
    }

    /// A template that is exactly one placeholder
    pub fn placeholder(key: impl Into<String>) -> Self {
        Self {
            segments: vec![Segment::Placeholder(key.into())],
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Keys referenced by this template, in order of appearance
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Placeholder(key) => Some(key.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// The key when the whole template is a single placeholder
    pub fn sole_placeholder(&self) -> Option<&str> {
        match self.segments.as_slice() {
            [Segment::Placeholder(key)] => Some(key.as_str()),
            _ => None,
        }
    }

    pub fn render(&self, store: &ValueStore) -> Result<String, Failure> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(key) => out.push_str(&store.get(key)?.to_string()),
            }
        }
        Ok(out)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => f.write_str(text)?,
                Segment::Placeholder(key) => write!(f, "{}{}}}", OPEN, key)?,
            }
        }
        Ok(())
    }
}

impl From<String> for Template {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<&str> for Template {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<Template> for String {
    fn from(template: Template) -> Self {
        template.to_string()
    }
}

/// Collect every placeholder key appearing in string leaves of a JSON value
pub fn json_placeholders(value: &serde_json::Value, keys: &mut Vec<String>) {
    match value {
        serde_json::Value::String(s) => {
            keys.extend(Template::parse(s).placeholders().map(str::to_string));
        }
        serde_json::Value::Array(items) => {
            for item in items {
                json_placeholders(item, keys);
            }
        }
        serde_json::Value::Object(map) => {
            for item in map.values() {
                json_placeholders(item, keys);
            }
        }
        _ => {}
    }
}
