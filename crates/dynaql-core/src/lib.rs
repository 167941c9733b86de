//! SQL `SELECT` over DynamoDB `Query`.
//!
//! The pipeline is:
//!
//! 1. **Parsing** ([`sql`]): statement text becomes a [`sql::Statement`].
//! 2. **Schema lookup** ([`schema`]): the target table's key schema is loaded
//!    once per table name and cached.
//! 3. **Compilation** ([`query`]): a `SELECT` is split into key condition,
//!    filter and projection expressions, producing a reusable
//!    [`query::PreparedQuery`].
//! 4. **Binding** ([`query::binder`]): caller arguments are merged with the
//!    literals captured at compile time.
//! 5. **Iteration** ([`rows`]): pages are fetched through a [`Transport`] and
//!    columns are extracted from each item.
//!
//! [`Client`] wires the stages together.

pub mod client;
pub mod config;
pub mod error;
pub mod query;
pub mod rows;
pub mod schema;
pub mod sql;
pub mod transport;
pub mod value;

pub use client::Client;
pub use config::DynaQlConfig;
pub use error::Error;
pub use query::{Arg, ParamValue, PreparedQuery};
pub use rows::{Row, RowOptions, Rows};
pub use schema::{IndexSchema, SchemaCache, TableSchema};
pub use transport::Transport;
pub use value::Value;
