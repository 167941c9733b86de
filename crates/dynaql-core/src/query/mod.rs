//! Query compilation and argument binding.

pub mod binder;
pub mod compiler;
pub mod reserved;

pub use binder::{Arg, BindError, ParamValue};
pub use compiler::{CompileError, PreparedQuery, QueryParams, compile};
pub use reserved::{is_plain_identifier, is_reserved_word};
