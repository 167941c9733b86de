//! SQL dialect: AST, lexer and parser.
//!
//! ```
//! use dynaql_core::sql::{self, ProjectionExpression};
//!
//! let select = sql::parse_select("SELECT * FROM gamescores WHERE UserId = :id LIMIT 5").unwrap();
//! assert_eq!(select.projection, ProjectionExpression::All);
//! assert_eq!(select.limit, Some(5));
//! ```

pub mod ast;
mod lexer;
mod parser;

pub use ast::*;
pub use lexer::Position;
pub use parser::{ParseError, parse, parse_select};
