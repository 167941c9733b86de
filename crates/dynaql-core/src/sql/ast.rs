//! AST for the SQL dialect.
//!
//! Every grammar alternative is its own enum variant, so tree walks are plain
//! `match` expressions. The `Display` impls print nodes back in source form;
//! they do not apply attribute-name substitution (that happens in the
//! compiler).

use std::fmt;

use dynaql_model::types::{KeyType, Projection, ProvisionedThroughput, ScalarAttributeType};

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

/// A parsed statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `SELECT ...`
    Select(Select),
    /// `INSERT INTO ...` or `REPLACE INTO ...`
    Insert(InsertOrReplace),
    /// `CREATE TABLE ...`
    CreateTable(CreateTable),
    /// `DROP TABLE ...`
    DropTable(DropTable),
}

impl Statement {
    /// Statement keyword, for diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Select(_) => "SELECT",
            Self::Insert(insert) if insert.replace => "REPLACE",
            Self::Insert(_) => "INSERT",
            Self::CreateTable(_) => "CREATE TABLE",
            Self::DropTable(_) => "DROP TABLE",
        }
    }
}

/// `SELECT projection FROM table [USE INDEX (name)] [WHERE ...] [ASC|DESC] [LIMIT n]`
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    /// Selected columns.
    pub projection: ProjectionExpression,
    /// Source table.
    pub from: String,
    /// Secondary index named by `USE INDEX`.
    pub index: Option<String>,
    /// WHERE clause.
    pub where_clause: Option<ConditionExpression>,
    /// `Some(true)` for `DESC`, `Some(false)` for `ASC`.
    pub descending: Option<bool>,
    /// Maximum number of rows to return.
    pub limit: Option<u32>,
}

/// What a `SELECT` returns.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionExpression {
    /// `*` or `document(*)`: the whole item.
    All,
    /// Explicit column list, in source order.
    Columns(Vec<ProjectionColumn>),
}

/// One selected column.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionColumn {
    /// Function column such as `document(a, b)`.
    Function(FunctionCall),
    /// Attribute path.
    Path(DocumentPath),
}

impl fmt::Display for ProjectionColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Function(call) => call.fmt(f),
            Self::Path(path) => path.fmt(f),
        }
    }
}

// ---------------------------------------------------------------------------
// Conditions
// ---------------------------------------------------------------------------

/// OR of AND-terms.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionExpression {
    /// Disjuncts, in source order.
    pub or: Vec<AndExpression>,
}

/// AND of conditions.
#[derive(Debug, Clone, PartialEq)]
pub struct AndExpression {
    /// Conjuncts, in source order.
    pub and: Vec<Condition>,
}

/// A single boolean term.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `( ... )`
    Parenthesized(ConditionExpression),
    /// `NOT condition`
    Not(Box<Condition>),
    /// `path <rhs>`
    Operand(ConditionOperand),
    /// Predicate function such as `begins_with(a, :p)`.
    Function(FunctionCall),
}

/// A path compared against something.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionOperand {
    /// Left-hand attribute path.
    pub path: DocumentPath,
    /// Comparison applied to it.
    pub rhs: ConditionRhs,
}

/// Right-hand side of a [`ConditionOperand`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionRhs {
    /// `op operand`
    Compare {
        /// Operator.
        op: CompareOp,
        /// Right operand.
        operand: Operand,
    },
    /// `BETWEEN start AND end`
    Between {
        /// Lower bound.
        start: Operand,
        /// Upper bound.
        end: Operand,
    },
    /// `IN (v, ...)`
    In(Vec<Value>),
}

/// Comparison operators. `!=` is read as [`CompareOp::Ne`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        })
    }
}

/// A value or an attribute path.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Literal or placeholder.
    Value(Value),
    /// Attribute path.
    Path(DocumentPath),
}

/// `name(arg, ...)`
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    /// Function name as written.
    pub name: String,
    /// Arguments, at least one.
    pub args: Vec<Operand>,
}

impl FunctionCall {
    /// The first argument, if it is an attribute path.
    #[must_use]
    pub fn first_path(&self) -> Option<&DocumentPath> {
        match self.args.first() {
            Some(Operand::Path(path)) => Some(path),
            _ => None,
        }
    }
}

impl fmt::Display for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i != 0 {
                f.write_str(", ")?;
            }
            match arg {
                Operand::Value(value) => value.fmt(f)?,
                Operand::Path(path) => path.fmt(f)?,
            }
        }
        f.write_str(")")
    }
}

// ---------------------------------------------------------------------------
// Paths and values
// ---------------------------------------------------------------------------

/// Dotted, optionally indexed attribute path: `a.b[2][0].c`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPath {
    /// Fragments, at least one.
    pub fragments: Vec<PathFragment>,
}

impl DocumentPath {
    /// A single-fragment path without indexes.
    #[must_use]
    pub fn symbol(name: impl Into<String>) -> Self {
        Self {
            fragments: vec![PathFragment {
                symbol: name.into(),
                indexes: Vec::new(),
            }],
        }
    }

    /// Returns the attribute name if the path is a bare top-level attribute.
    #[must_use]
    pub fn as_symbol(&self) -> Option<&str> {
        match self.fragments.as_slice() {
            [only] if only.indexes.is_empty() => Some(&only.symbol),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, fragment) in self.fragments.iter().enumerate() {
            if i != 0 {
                f.write_str(".")?;
            }
            fragment.fmt(f)?;
        }
        Ok(())
    }
}

/// One dotted segment of a [`DocumentPath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathFragment {
    /// Attribute name (back-quotes removed).
    pub symbol: String,
    /// Trailing `[n]` indexes.
    pub indexes: Vec<usize>,
}

impl fmt::Display for PathFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.symbol)?;
        for index in &self.indexes {
            write!(f, "[{index}]")?;
        }
        Ok(())
    }
}

/// A literal or a placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Inline literal.
    Literal(Literal),
    /// `:name` (stored without the colon).
    Named(String),
    /// `?`, with its 1-based position among the statement's `?`s.
    Positional(usize),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(literal) => literal.fmt(f),
            Self::Named(name) => write!(f, ":{name}"),
            Self::Positional(_) => f.write_str("?"),
        }
    }
}

/// Inline literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    /// Number, kept as source text without a leading `+`.
    Number(String),
    /// String, quotes removed.
    String(String),
    /// `TRUE` / `FALSE`.
    Bool(bool),
    /// `NULL`.
    Null,
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => f.write_str(n),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Bool(true) => f.write_str("TRUE"),
            Self::Bool(false) => f.write_str("FALSE"),
            Self::Null => f.write_str("NULL"),
        }
    }
}

// ---------------------------------------------------------------------------
// INSERT / REPLACE
// ---------------------------------------------------------------------------

/// `INSERT|REPLACE INTO table VALUES (...), (...) [RETURNING NONE|ALL_OLD]`
#[derive(Debug, Clone, PartialEq)]
pub struct InsertOrReplace {
    /// `true` for `REPLACE`.
    pub replace: bool,
    /// Target table.
    pub into: String,
    /// One entry per parenthesized row.
    pub values: Vec<InsertValue>,
    /// Requested return values.
    pub returning: Option<ReturnValues>,
}

/// A row in an `INSERT`.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertValue {
    /// Scalar or placeholder (usually a placeholder bound to a whole item).
    Value(Value),
    /// Inline JSON document.
    Object(JsonObject),
}

/// `RETURNING` choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnValues {
    /// `NONE`
    None,
    /// `ALL_OLD`
    AllOld,
}

/// JSON value written in SQL token syntax.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonValue {
    /// Scalar literal.
    Scalar(Literal),
    /// `{ ... }`
    Object(JsonObject),
    /// `[ ... ]`
    Array(Vec<JsonValue>),
}

impl JsonValue {
    /// Convert to a `serde_json::Value`.
    ///
    /// Numbers that do not fit a JSON number are kept as strings.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Scalar(Literal::Number(text)) => text
                .parse::<serde_json::Number>()
                .map_or_else(|_| serde_json::Value::String(text.clone()), Into::into),
            Self::Scalar(Literal::String(s)) => serde_json::Value::String(s.clone()),
            Self::Scalar(Literal::Bool(b)) => serde_json::Value::Bool(*b),
            Self::Scalar(Literal::Null) => serde_json::Value::Null,
            Self::Object(object) => object.to_json(),
            Self::Array(items) => serde_json::Value::Array(items.iter().map(Self::to_json).collect()),
        }
    }
}

/// `{ key: value, ... }`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JsonObject {
    /// Entries in source order.
    pub entries: Vec<(String, JsonValue)>,
}

impl JsonObject {
    /// Convert to a `serde_json::Value::Object`. Later duplicate keys win.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .entries
            .iter()
            .map(|(key, value)| (key.clone(), value.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

// ---------------------------------------------------------------------------
// CREATE TABLE / DROP TABLE
// ---------------------------------------------------------------------------

/// `CREATE TABLE name ( entries ) PROVISIONED THROUGHPUT READ n WRITE n`
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTable {
    /// Table name.
    pub table: String,
    /// Attributes and indexes, in source order.
    pub entries: Vec<CreateTableEntry>,
    /// Table throughput.
    pub throughput: ProvisionedThroughput,
}

/// One entry inside `CREATE TABLE ( ... )`.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateTableEntry {
    /// `name TYPE [HASH KEY | RANGE KEY]`
    Attribute(TableAttribute),
    /// `GLOBAL [SECONDARY] INDEX ...`
    GlobalIndex(GlobalIndexDefinition),
    /// `LOCAL [SECONDARY] INDEX ...`
    LocalIndex(LocalIndexDefinition),
}

/// Attribute declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableAttribute {
    /// Attribute name.
    pub name: String,
    /// Declared type.
    pub attribute_type: ScalarAttributeType,
    /// Key role, if any.
    pub key: Option<KeyType>,
}

/// Global secondary index declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalIndexDefinition {
    /// Index name.
    pub name: String,
    /// Partition key attribute.
    pub partition_key: String,
    /// Sort key attribute.
    pub sort_key: Option<String>,
    /// Projected attributes.
    pub projection: Projection,
    /// Index throughput.
    pub throughput: ProvisionedThroughput,
}

/// Local secondary index declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalIndexDefinition {
    /// Index name.
    pub name: String,
    /// Sort key attribute.
    pub sort_key: String,
    /// Projected attributes.
    pub projection: Projection,
}

/// `DROP TABLE name`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropTable {
    /// Table name.
    pub table: String,
}
