//! Comparison engine.
//!
//! Plain values are compared with their own `PartialEq`. JSON documents are
//! compared after decoding, so member order and whitespace do not matter while
//! array order still does.

pub mod diff;

use serde::Serialize;
use serde_json::Value;
use std::fmt;

pub use diff::{render_three_way, write_colored_diff};

/// Deep equality of two values of the same type.
pub fn structural_equals<T: PartialEq + ?Sized>(expected: &T, actual: &T) -> bool {
    expected == actual
}

/// Which input of a JSON comparison a problem belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Expected,
    Actual,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Expected => f.write_str("expected"),
            Side::Actual => f.write_str("actual"),
        }
    }
}

/// Canonical renderings of two JSON documents that decoded to different values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MismatchReport {
    pub expected_pretty: String,
    pub actual_pretty: String,
    /// Conflict-marked merge of the two canonical forms.
    pub diff: Option<String>,
}

impl fmt::Display for MismatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\texpected JSON: {}\n", self.expected_pretty)?;
        writeln!(f, "\tgot JSON: {}\n", self.actual_pretty)?;
        if let Some(diff) = &self.diff {
            write!(f, "Diff:\n{diff}")?;
        }
        Ok(())
    }
}

/// Result of [`semantic_json_equals`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonComparison {
    Equal,
    Mismatch(MismatchReport),
    Undecodable {
        side: Side,
        error: String,
        text: String,
    },
}

impl JsonComparison {
    pub fn is_equal(&self) -> bool {
        matches!(self, JsonComparison::Equal)
    }
}

impl fmt::Display for JsonComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonComparison::Equal => f.write_str("JSONs match"),
            JsonComparison::Mismatch(report) => write!(f, "{report}"),
            JsonComparison::Undecodable { side, error, text } => write!(
                f,
                "JSONEquals: Error decoding '{side}' JSON: {error}.\n\tCan't decode this: `{text}`"
            ),
        }
    }
}

/// Decodes both byte sequences and compares the decoded documents.
pub fn semantic_json_equals(expected: &[u8], actual: &[u8]) -> JsonComparison {
    let expected_value = match decode(expected, Side::Expected) {
        Ok(value) => value,
        Err(undecodable) => return undecodable,
    };
    let actual_value = match decode(actual, Side::Actual) {
        Ok(value) => value,
        Err(undecodable) => return undecodable,
    };

    if json_values_equal(&expected_value, &actual_value) {
        return JsonComparison::Equal;
    }

    let expected_pretty = pretty_value(&expected_value);
    let actual_pretty = pretty_value(&actual_value);
    let diff = render_three_way(&expected_pretty, &actual_pretty);
    JsonComparison::Mismatch(MismatchReport {
        expected_pretty,
        actual_pretty,
        diff,
    })
}

fn decode(bytes: &[u8], side: Side) -> Result<Value, JsonComparison> {
    serde_json::from_slice(bytes).map_err(|e| JsonComparison::Undecodable {
        side,
        error: e.to_string(),
        text: String::from_utf8_lossy(bytes).into_owned(),
    })
}

/// Equality of decoded JSON values.
///
/// Objects ignore member order, arrays do not. Two integers compare exactly;
/// any other pair of numbers compares as `f64`, so `5` equals `5.0`.
pub fn json_values_equal(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => {
            if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
                return a == b;
            }
            if let (Some(a), Some(b)) = (a.as_u64(), b.as_u64()) {
                return a == b;
            }
            match (a.as_f64(), b.as_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| json_values_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter().all(|(key, x)| {
                    b.get(key)
                        .map(|y| json_values_equal(x, y))
                        .unwrap_or(false)
                })
        }
        _ => false,
    }
}

/// Serializes a value as tab-indented JSON with sorted object keys.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    // Round-trip through Value so struct fields and map keys come out sorted.
    let value = serde_json::to_value(value)?;
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    Ok(out)
}

fn pretty_value(value: &Value) -> String {
    to_pretty_json(value)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_else(|_| value.to_string())
}

/// Canonical, indented form of a JSON document. Input that does not decode
/// is returned unchanged.
pub fn json_pretty(bytes: &[u8]) -> Vec<u8> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(value) => to_pretty_json(&value).unwrap_or_else(|_| bytes.to_vec()),
        Err(_) => bytes.to_vec(),
    }
}
