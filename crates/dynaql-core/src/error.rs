//! Top-level error type.
//!
//! Each stage has its own error enum; [`Error`] wraps them so callers driving
//! the whole pipeline through [`crate::Client`] can use a single `?`.

use std::time::Duration;

use dynaql_model::StoreError;

use crate::query::{BindError, CompileError};
use crate::schema::SchemaError;
use crate::sql::ParseError;

/// Any failure from parsing through row iteration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed statement text.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// Statement is well formed but cannot be expressed as a `Query`.
    #[error(transparent)]
    Compile(#[from] CompileError),
    /// Arguments do not fit the prepared query.
    #[error(transparent)]
    Bind(#[from] BindError),
    /// Table schema could not be loaded.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// The store rejected a page request.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A store call exceeded its configured bound.
    #[error("{operation} timed out after {elapsed:?}")]
    Timeout {
        /// Operation name.
        operation: &'static str,
        /// Configured bound.
        elapsed: Duration,
    },
    /// The statement parsed but only `SELECT` is executed.
    #[error("{statement} statements are not supported, only SELECT can be executed")]
    Unsupported {
        /// Statement kind.
        statement: &'static str,
    },
    /// Destination buffer is smaller than the column list.
    #[error("destination has {got} slots but the query returns {expected} columns")]
    ColumnCount {
        /// Number of result columns.
        expected: usize,
        /// Slots supplied by the caller.
        got: usize,
    },
}
