//! Field-level conversions shared by provider schemas.
//!
//! Providers deliver numbers as strings, as JSON numbers, or as `null`, and
//! booleans as `"Y"`/`"N"`. Every helper reports the record index and field
//! name so a rejected batch points at the offending entry.

use serde::{Deserialize, Deserializer};

use super::types::SourceError;

/// A JSON value that is either a number or a string holding one.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum NumberOrString {
    Number(f64),
    Text(String),
}

impl NumberOrString {
    fn raw(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

/// Deserialize a string field, reading `null` as empty.
pub fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Parse a required numeric field to a finite `f64`.
pub fn parse_float(
    index: usize,
    field: &'static str,
    value: Option<&NumberOrString>,
) -> Result<f64, SourceError> {
    let malformed = |value: String, reason: &str| SourceError::Parse {
        index,
        field,
        value,
        reason: reason.to_string(),
    };

    let parsed = match value {
        None => return Err(malformed(String::new(), "missing")),
        Some(NumberOrString::Number(n)) => *n,
        Some(NumberOrString::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| malformed(s.clone(), &e.to_string()))?,
    };

    if !parsed.is_finite() {
        let raw = value.map(NumberOrString::raw).unwrap_or_default();
        return Err(malformed(raw, "not a finite number"));
    }
    Ok(parsed)
}

/// Parse a `"Y"`/`"N"` flag. An empty value means no.
pub fn parse_flag(index: usize, field: &'static str, value: &str) -> Result<bool, SourceError> {
    match value.trim() {
        "Y" | "y" => Ok(true),
        "N" | "n" | "" => Ok(false),
        other => Err(SourceError::Parse {
            index,
            field,
            value: other.to_string(),
            reason: "expected \"Y\" or \"N\"".to_string(),
        }),
    }
}
