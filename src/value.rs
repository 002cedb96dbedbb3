use serde::Serialize;
use std::collections::BTreeMap;

/// Maximum nesting of arrays and maps accepted in an attribute value.
///
/// Owned values cannot form cycles, but arbitrarily deep values would
/// still recurse without bound in validation, truncation and encoding.
pub const MAX_VALUE_DEPTH: usize = 32;

/// A log body or attribute value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnyValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    Array(Vec<AnyValue>),
    Map(BTreeMap<String, AnyValue>),
}

impl AnyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AnyValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Whether `value` may be stored as an attribute.
pub fn is_valid_attribute_value(value: &AnyValue) -> bool {
    is_valid_at_depth(value, 0)
}

fn is_valid_at_depth(value: &AnyValue, depth: usize) -> bool {
    match value {
        AnyValue::Array(items) => {
            depth < MAX_VALUE_DEPTH && items.iter().all(|v| is_valid_at_depth(v, depth + 1))
        }
        AnyValue::Map(entries) => {
            depth < MAX_VALUE_DEPTH && entries.values().all(|v| is_valid_at_depth(v, depth + 1))
        }
        _ => true,
    }
}

/// Cut every string in `value` to at most `limit` characters.
///
/// Strings nested in arrays and maps are truncated too. Other scalars
/// and byte sequences are returned untouched.
pub fn truncate(value: AnyValue, limit: usize) -> AnyValue {
    match value {
        AnyValue::String(s) => AnyValue::String(truncate_str(s, limit)),
        AnyValue::Array(items) => {
            AnyValue::Array(items.into_iter().map(|v| truncate(v, limit)).collect())
        }
        AnyValue::Map(entries) => AnyValue::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k, truncate(v, limit)))
                .collect(),
        ),
        other => other,
    }
}

fn truncate_str(mut s: String, limit: usize) -> String {
    if let Some((idx, _)) = s.char_indices().nth(limit) {
        s.truncate(idx);
    }
    s
}

impl From<bool> for AnyValue {
    fn from(v: bool) -> Self {
        AnyValue::Bool(v)
    }
}

impl From<i64> for AnyValue {
    fn from(v: i64) -> Self {
        AnyValue::Int(v)
    }
}

impl From<i32> for AnyValue {
    fn from(v: i32) -> Self {
        AnyValue::Int(v.into())
    }
}

impl From<u32> for AnyValue {
    fn from(v: u32) -> Self {
        AnyValue::Int(v.into())
    }
}

impl From<f64> for AnyValue {
    fn from(v: f64) -> Self {
        AnyValue::Double(v)
    }
}

impl From<&str> for AnyValue {
    fn from(v: &str) -> Self {
        AnyValue::String(v.to_owned())
    }
}

impl From<String> for AnyValue {
    fn from(v: String) -> Self {
        AnyValue::String(v)
    }
}

impl From<Vec<u8>> for AnyValue {
    fn from(v: Vec<u8>) -> Self {
        AnyValue::Bytes(v)
    }
}

impl From<Vec<AnyValue>> for AnyValue {
    fn from(v: Vec<AnyValue>) -> Self {
        AnyValue::Array(v)
    }
}

/// Collect a heterogeneous array, e.g. `[1.into(), "a".into()]` or any
/// iterator of convertible items.
impl<T: Into<AnyValue>> FromIterator<T> for AnyValue {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        AnyValue::Array(iter.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, AnyValue>> for AnyValue {
    fn from(v: BTreeMap<String, AnyValue>) -> Self {
        AnyValue::Map(v)
    }
}
