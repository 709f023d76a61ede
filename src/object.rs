//! Object records - one heap object from a dump
//!
//! Dumps are newline-delimited JSON, one record per line:
//!
//! ```text
//! {"address": 125817416, "type": "list", "size": 72, "len": 0, "refs": []}
//! ```

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{Error, Result};

/// Address of the synthetic root every top object hangs off
pub const ROOT_ADDRESS: i64 = 0;

/// Replacement text for a `value` field the dumper failed to escape
pub const VALUE_SENTINEL: &str = "SURROGATE ERROR REMOVED";

/// A heap object as it appears in a dump file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub address: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub size: i64,
    #[serde(default)]
    pub len: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub value: Option<String>,
    #[serde(default)]
    pub refs: Vec<i64>,
}

impl ObjectRecord {
    pub fn new(address: i64, kind: &str, size: i64) -> Self {
        Self {
            address,
            kind: kind.to_string(),
            size,
            len: None,
            name: None,
            value: None,
            refs: Vec::new(),
        }
    }

    pub fn with_refs(mut self, refs: &[i64]) -> Self {
        self.refs = refs.to_vec();
        self
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.value = Some(value.to_string());
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Parse one dump line.
    ///
    /// A line whose `value` breaks the JSON is retried once with that value
    /// replaced by [`VALUE_SENTINEL`].
    pub fn parse_line(line: &str, line_no: usize) -> Result<Self> {
        match serde_json::from_str(line) {
            Ok(record) => Ok(record),
            Err(first) => {
                let repaired = value_field_regex().replace(line, |caps: &regex::Captures| {
                    format!("\"value\": \"{}\"{}", VALUE_SENTINEL, &caps[1])
                });
                if repaired == line {
                    return Err(Error::ImportFormat { line: line_no, source: first });
                }
                tracing::debug!("line {}: replaced malformed value field", line_no);
                serde_json::from_str(&repaired)
                    .map_err(|source| Error::ImportFormat { line: line_no, source })
            }
        }
    }

    /// Short display form stored in the `repr` column
    pub fn repr(&self) -> String {
        match self.kind.as_str() {
            "function" | "type" | "module" => self
                .name
                .clone()
                .or_else(|| self.value.clone())
                .unwrap_or_else(|| self.kind.clone()),
            "int" => self.value.clone().unwrap_or_else(|| self.kind.clone()),
            "str" | "unicode" => match &self.value {
                Some(v) => format!("'{}'", v.replace('\\', "\\\\").replace('\'', "\\'")),
                None => self.kind.clone(),
            },
            _ => self.kind.clone(),
        }
    }
}

/// Matches a string `value` up to the first quote that is followed by
/// another key or the end of the object.
fn value_field_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#""value": ".*?"(\s*,\s*"[A-Za-z_]+"\s*:|\s*\})"#)
            .expect("value field pattern is valid")
    })
}

/// Accept `"value"` as a string or any other JSON scalar.
fn scalar_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_record() {
        let record = ObjectRecord::parse_line(
            r#"{"address": 125817416, "type": "list", "size": 72, "len": 0, "refs": []}"#,
            1,
        )
        .unwrap();
        assert_eq!(record.address, 125817416);
        assert_eq!(record.kind, "list");
        assert_eq!(record.len, Some(0));
        assert!(record.refs.is_empty());
    }

    #[test]
    fn test_numeric_value_becomes_text() {
        let record = ObjectRecord::parse_line(
            r#"{"address": 1, "type": "int", "size": 24, "value": 42, "refs": []}"#,
            1,
        )
        .unwrap();
        assert_eq!(record.value.as_deref(), Some("42"));
        assert_eq!(record.repr(), "42");
    }

    #[test]
    fn test_unescaped_quote_recovered_with_sentinel() {
        let line = r#"{"address": 9, "type": "str", "size": 40, "value": "say "hi"", "refs": [1, 2]}"#;
        let record = ObjectRecord::parse_line(line, 3).unwrap();
        assert_eq!(record.value.as_deref(), Some(VALUE_SENTINEL));
        assert_eq!(record.refs, vec![1, 2]);
    }

    #[test]
    fn test_unrecoverable_line_reports_line_number() {
        let err = ObjectRecord::parse_line("{not json", 7).unwrap_err();
        match err {
            Error::ImportFormat { line, .. } => assert_eq!(line, 7),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_repr() {
        let func = ObjectRecord::new(1, "function", 120).with_name("main");
        assert_eq!(func.repr(), "main");

        let s = ObjectRecord::new(2, "str", 40).with_value("it's");
        assert_eq!(s.repr(), "'it\\'s'");

        let dict = ObjectRecord::new(3, "dict", 280);
        assert_eq!(dict.repr(), "dict");

        let module = ObjectRecord::new(4, "module", 56);
        assert_eq!(module.repr(), "module");
    }
}
