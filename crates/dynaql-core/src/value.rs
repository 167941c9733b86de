//! Decoded column values.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use dynaql_model::{AttributeValue, Item};

/// A column value decoded from an [`AttributeValue`].
///
/// Numbers stay as decimal text; the store does not distinguish integers
/// from floats, so the caller picks the numeric type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing attribute, failed navigation, or `NULL`.
    Null,
    /// Boolean.
    Bool(bool),
    /// Number as decimal text.
    Number(String),
    /// String.
    String(String),
    /// Raw bytes.
    Binary(Bytes),
    /// List of native values.
    List(Vec<AttributeValue>),
    /// Map of native values. Whole-item columns use this variant.
    Map(Item),
    /// String set.
    StringSet(Vec<String>),
    /// Number set, as decimal text.
    NumberSet(Vec<String>),
    /// Binary set.
    BinarySet(Vec<Bytes>),
    /// A list or map after deep conversion.
    Json(serde_json::Value),
}

impl Value {
    /// Decode a native value by its type tag.
    #[must_use]
    pub fn decode(av: &AttributeValue) -> Self {
        match av {
            AttributeValue::Bool(b) => Self::Bool(*b),
            AttributeValue::N(n) => Self::Number(n.clone()),
            AttributeValue::S(s) => Self::String(s.clone()),
            AttributeValue::B(b) => Self::Binary(b.clone()),
            AttributeValue::L(list) => Self::List(list.clone()),
            AttributeValue::M(map) => Self::Map(map.clone()),
            AttributeValue::Ns(ns) => Self::NumberSet(ns.clone()),
            AttributeValue::Ss(ss) => Self::StringSet(ss.clone()),
            AttributeValue::Bs(bs) => Self::BinarySet(bs.clone()),
            AttributeValue::Null(_) => Self::Null,
        }
    }

    /// Replace native lists and maps with `serde_json` values. Other
    /// variants are returned unchanged.
    #[must_use]
    pub fn into_deep(self) -> Self {
        match self {
            Self::List(list) => Self::Json(serde_json::Value::Array(
                list.iter().map(to_json).collect(),
            )),
            Self::Map(map) => Self::Json(map_to_json(&map)),
            other => other,
        }
    }

    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The string, if this is a [`Value::String`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The decimal text, if this is a [`Value::Number`].
    #[must_use]
    pub fn as_number(&self) -> Option<&str> {
        match self {
            Self::Number(n) => Some(n),
            _ => None,
        }
    }

    /// The boolean, if this is a [`Value::Bool`].
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The item, if this is a whole-item [`Value::Map`].
    #[must_use]
    pub fn as_map(&self) -> Option<&Item> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }
}

/// Convert a native value to JSON.
///
/// Numbers become JSON integers when they fit, finite floats otherwise, and
/// strings as a last resort. Binary data is base64 encoded; sets become
/// arrays.
#[must_use]
pub fn to_json(av: &AttributeValue) -> serde_json::Value {
    use serde_json::Value as Json;

    match av {
        AttributeValue::S(s) => Json::String(s.clone()),
        AttributeValue::N(n) => number_to_json(n),
        AttributeValue::B(b) => Json::String(STANDARD.encode(b)),
        AttributeValue::Bool(b) => Json::Bool(*b),
        AttributeValue::Null(_) => Json::Null,
        AttributeValue::L(list) => Json::Array(list.iter().map(to_json).collect()),
        AttributeValue::M(map) => map_to_json(map),
        AttributeValue::Ss(ss) => Json::Array(ss.iter().cloned().map(Json::String).collect()),
        AttributeValue::Ns(ns) => Json::Array(ns.iter().map(|n| number_to_json(n)).collect()),
        AttributeValue::Bs(bs) => Json::Array(
            bs.iter()
                .map(|b| Json::String(STANDARD.encode(b)))
                .collect(),
        ),
    }
}

fn map_to_json(map: &Item) -> serde_json::Value {
    serde_json::Value::Object(
        map.iter()
            .map(|(key, value)| (key.clone(), to_json(value)))
            .collect(),
    )
}

fn number_to_json(text: &str) -> serde_json::Value {
    if let Ok(i) = text.parse::<i64>() {
        return i.into();
    }
    if let Ok(u) = text.parse::<u64>() {
        return u.into();
    }
    text.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map_or_else(|| serde_json::Value::String(text.to_owned()), Into::into)
}
