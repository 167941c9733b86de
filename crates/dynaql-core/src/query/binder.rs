//! Argument binding.
//!
//! A [`PreparedQuery`] carries three kinds of placeholders: literals captured
//! at compile time, `:name` placeholders and `?` placeholders. Binding merges
//! them into one `ExpressionAttributeValues` map. A query uses either named or
//! positional placeholders, never both, and the argument list must match that
//! style exactly.

use std::collections::{BTreeSet, HashMap};

use dynaql_model::{AttributeValue, QueryInput};
use serde::{Deserialize, Serialize};

use super::compiler::PreparedQuery;
use crate::sql::Literal;

/// Arguments do not fit the prepared query.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    /// An unnamed argument was passed to a query with `:name` placeholders.
    #[error("unexpected positional arg, use named args to bind :name placeholders")]
    PositionalArgForNamedQuery,
    /// A named argument was passed to a query without `:name` placeholders.
    #[error(
        "unexpected named arg {name:?}, to use named args, provide named placeholders like :param"
    )]
    NamedArgForPositionalQuery {
        /// Argument name.
        name: String,
    },
    /// A named argument matches no placeholder.
    #[error("binding {name:?} not found")]
    UnknownBinding {
        /// Placeholder name, with the leading `:`.
        name: String,
    },
    /// The same placeholder was bound twice.
    #[error("binding {name:?} supplied more than once")]
    DuplicateBinding {
        /// Placeholder name, with the leading `:`.
        name: String,
    },
    /// A `:name` placeholder has no argument.
    #[error("missing argument for binding {name:?}")]
    MissingArgument {
        /// Placeholder name, with the leading `:`.
        name: String,
    },
    /// The number of positional arguments differs from the number of `?`.
    #[error("wrong number of arguments, expected {expected}, got {got}")]
    WrongArgumentCount {
        /// Number of `?` placeholders.
        expected: usize,
        /// Number of arguments supplied.
        got: usize,
    },
    /// A positional argument's ordinal has no `?` placeholder.
    #[error("argument ordinal {ordinal} has no matching placeholder")]
    InvalidOrdinal {
        /// 1-based ordinal.
        ordinal: usize,
    },
    /// Two positional arguments share an ordinal.
    #[error("argument ordinal {ordinal} supplied more than once")]
    DuplicateOrdinal {
        /// 1-based ordinal.
        ordinal: usize,
    },
    /// The value cannot be stored as an attribute value.
    #[error("invalid value type {type_name}")]
    UnsupportedType {
        /// Description of the rejected value.
        type_name: &'static str,
    },
}

// ---------------------------------------------------------------------------
// Argument values
// ---------------------------------------------------------------------------

/// A scalar argument value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// `NULL`
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer, stored as a number.
    Int(i64),
    /// Float, stored as a number. Must be finite.
    Float(f64),
    /// String.
    String(String),
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl TryFrom<serde_json::Value> for ParamValue {
    type Error = BindError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::Null => Ok(Self::Null),
            serde_json::Value::Bool(b) => Ok(Self::Bool(b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float))
                .ok_or(BindError::UnsupportedType {
                    type_name: "number",
                }),
            serde_json::Value::String(s) => Ok(Self::String(s)),
            serde_json::Value::Array(_) => Err(BindError::UnsupportedType { type_name: "array" }),
            serde_json::Value::Object(_) => Err(BindError::UnsupportedType {
                type_name: "object",
            }),
        }
    }
}

impl ParamValue {
    fn to_attribute_value(&self) -> Result<AttributeValue, BindError> {
        Ok(match self {
            Self::Null => AttributeValue::Null(true),
            Self::Bool(b) => AttributeValue::Bool(*b),
            Self::Int(i) => AttributeValue::number(i),
            Self::Float(f) if f.is_finite() => AttributeValue::number(f),
            Self::Float(_) => {
                return Err(BindError::UnsupportedType {
                    type_name: "non-finite float",
                });
            }
            Self::String(s) => AttributeValue::string(s.as_str()),
        })
    }
}

fn literal_to_attribute_value(literal: &Literal) -> AttributeValue {
    match literal {
        Literal::Number(n) => AttributeValue::N(n.clone()),
        Literal::String(s) => AttributeValue::S(s.clone()),
        Literal::Bool(b) => AttributeValue::Bool(*b),
        Literal::Null => AttributeValue::Null(true),
    }
}

/// One caller-supplied argument.
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    /// Placeholder name, with or without the leading `:`. `None` for
    /// positional arguments.
    pub name: Option<String>,
    /// 1-based position in the argument list.
    pub ordinal: usize,
    /// Value.
    pub value: ParamValue,
}

impl Arg {
    /// Argument for a `:name` placeholder.
    #[must_use]
    pub fn named(name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        Self {
            name: Some(name.into()),
            ordinal: 0,
            value: value.into(),
        }
    }

    /// Argument for the `ordinal`-th `?` (1-based).
    #[must_use]
    pub fn positional(ordinal: usize, value: impl Into<ParamValue>) -> Self {
        Self {
            name: None,
            ordinal,
            value: value.into(),
        }
    }

    /// Positional arguments numbered from 1 in iteration order.
    pub fn from_values<I, V>(values: I) -> Vec<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<ParamValue>,
    {
        values
            .into_iter()
            .enumerate()
            .map(|(i, value)| Self::positional(i + 1, value))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Binding
// ---------------------------------------------------------------------------

impl PreparedQuery {
    /// Build `ExpressionAttributeValues` from the captured literals and
    /// `args`.
    ///
    /// A query without placeholders accepts only an empty argument list.
    pub fn bind(&self, args: &[Arg]) -> Result<HashMap<String, AttributeValue>, BindError> {
        let params = self.params();
        let mut values = HashMap::with_capacity(params.fixed.len() + args.len());
        for (name, literal) in &params.fixed {
            values.insert(name.clone(), literal_to_attribute_value(literal));
        }

        if params.named.is_empty() {
            self.bind_positional(args, &mut values)?;
        } else {
            self.bind_named(args, &mut values)?;
        }
        Ok(values)
    }

    /// Bind `args` into a copy of the request template.
    pub fn new_request(&self, args: &[Arg]) -> Result<QueryInput, BindError> {
        let mut request = self.request().clone();
        request.expression_attribute_values = self.bind(args)?;
        Ok(request)
    }

    fn bind_named(
        &self,
        args: &[Arg],
        values: &mut HashMap<String, AttributeValue>,
    ) -> Result<(), BindError> {
        let mut pending: BTreeSet<&str> = self.params().named.iter().map(String::as_str).collect();
        for arg in args {
            let Some(name) = arg.name.as_deref().filter(|name| !name.is_empty()) else {
                return Err(BindError::PositionalArgForNamedQuery);
            };
            let key = format!(":{}", name.strip_prefix(':').unwrap_or(name));
            if !self.params().named.contains(&key) {
                return Err(BindError::UnknownBinding { name: key });
            }
            if !pending.remove(key.as_str()) {
                return Err(BindError::DuplicateBinding { name: key });
            }
            values.insert(key, arg.value.to_attribute_value()?);
        }
        match pending.first() {
            Some(missing) => Err(BindError::MissingArgument {
                name: (*missing).to_owned(),
            }),
            None => Ok(()),
        }
    }

    fn bind_positional(
        &self,
        args: &[Arg],
        values: &mut HashMap<String, AttributeValue>,
    ) -> Result<(), BindError> {
        let positional = &self.params().positional;
        if args.len() != positional.len() {
            return Err(BindError::WrongArgumentCount {
                expected: positional.len(),
                got: args.len(),
            });
        }
        for arg in args {
            if let Some(name) = &arg.name {
                return Err(BindError::NamedArgForPositionalQuery { name: name.clone() });
            }
            let placeholder = positional
                .get(&arg.ordinal)
                .ok_or(BindError::InvalidOrdinal {
                    ordinal: arg.ordinal,
                })?;
            let value = arg.value.to_attribute_value()?;
            if values.insert(placeholder.clone(), value).is_some() {
                return Err(BindError::DuplicateOrdinal {
                    ordinal: arg.ordinal,
                });
            }
        }
        Ok(())
    }
}
