//! DynamoDB wire model for dynaql.
//!
//! Only the slice of the DynamoDB API that the query compiler talks to is
//! modeled here: attribute values, key schemas and table descriptions, and
//! the `Query` / `DescribeTable` request and response shapes. Types follow the
//! DynamoDB JSON wire format so a transport can hand them to an HTTP client
//! unchanged.
// "DynamoDB" appears in virtually every doc comment in this crate.
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]

pub mod attribute_value;
pub mod error;
pub mod input;
pub mod output;
pub mod types;

pub use attribute_value::{AttributeValue, Item};
pub use error::{StoreError, StoreErrorCode};
pub use input::{DescribeTableInput, QueryInput};
pub use output::{DescribeTableOutput, QueryOutput};
