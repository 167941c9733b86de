//! `SELECT` to `Query` compilation.
//!
//! Top-level WHERE terms whose left-hand side is the partition or sort key
//! become the key condition; everything else becomes the filter. Literal
//! values and attribute names that DynamoDB cannot take inline are replaced
//! with generated placeholders:
//!
//! - literals become `:_genN`, stored as fixed parameters,
//! - the Nth `?` in the statement becomes `:_posN`, bound later by ordinal,
//! - reserved words become `#word`, other awkward names `#_genN`.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use dynaql_model::QueryInput;
use tracing::debug;

use super::reserved::{is_plain_identifier, is_reserved_word};
use crate::schema::TableSchema;
use crate::sql::{
    AndExpression, CompareOp, Condition, ConditionExpression, ConditionOperand, ConditionRhs,
    DocumentPath, FunctionCall, Literal, Operand, ProjectionColumn, ProjectionExpression, Select,
    Value,
};

const SORT_KEY_FUNCTION: &str = "begins_with";
const PROJECTION_FUNCTION: &str = "document";
/// Prefixes of generated value placeholders.
const GENERATED_PREFIXES: [&str; 2] = ["_gen", "_pos"];

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A well-formed `SELECT` that cannot be expressed as a `Query`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    /// The partition key is missing from the top-level WHERE terms or is not
    /// compared with `=`.
    #[error(
        "partition key must appear exactly once in the WHERE clause, in an equality condition, \
         such as: WHERE {partition_key} = :param"
    )]
    InvalidPartitionKeyCondition {
        /// Partition key of the table or index.
        partition_key: String,
    },
    /// The partition key has more than one top-level condition.
    #[error("partition key {key:?} can only appear once in WHERE clause")]
    DuplicatePartitionKey {
        /// Partition key name.
        key: String,
    },
    /// The sort key has more than one top-level condition.
    #[error("sort key {key:?} can only appear once in WHERE clause")]
    DuplicateSortKey {
        /// Sort key name.
        key: String,
    },
    /// The partition key appears under `NOT`, `OR` or parentheses.
    #[error("partition key {key:?} may not appear in nested expression")]
    PartitionKeyInNestedExpression {
        /// Partition key name.
        key: String,
    },
    /// The sort key is compared with `<>` or `IN`.
    #[error("sort key {key:?} may not be used with operator {operator}")]
    IllegalSortKeyOperator {
        /// Sort key name.
        key: String,
        /// Rejected operator.
        operator: String,
    },
    /// The sort key is passed to a function other than `begins_with`.
    #[error("sort key {key:?} may not be used with function {function}()")]
    IllegalSortKeyFunction {
        /// Sort key name.
        key: String,
        /// Rejected function.
        function: String,
    },
    /// A projection column calls something other than `document()`.
    #[error("function {function:?} not allowed in projection")]
    IllegalProjectionFunction {
        /// Rejected function.
        function: String,
    },
    /// `document()` was given a value instead of a path.
    #[error("args to document() must be document paths, got {argument}")]
    InvalidDocumentArgument {
        /// Rendered argument.
        argument: String,
    },
    /// Both `?` and `:name` placeholders were used.
    #[error("cannot mix positional params (?) with named params (:param)")]
    MixedPlaceholders,
    /// A `:name` placeholder uses a prefix kept for generated placeholders.
    #[error("placeholder :{name} uses a reserved prefix (_gen or _pos)")]
    ReservedPlaceholder {
        /// Placeholder name without the colon.
        name: String,
    },
    /// `USE INDEX` names an index the table does not have.
    #[error("unrecognized index {index:?} for table {table:?}")]
    UnknownIndex {
        /// Requested index.
        index: String,
        /// Table name.
        table: String,
    },
}

// ---------------------------------------------------------------------------
// Prepared query
// ---------------------------------------------------------------------------

/// Placeholders collected during compilation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    /// Generated `:_genN` names and the literal each stands for.
    pub fixed: BTreeMap<String, Literal>,
    /// Named placeholders, with the leading `:`.
    pub named: BTreeSet<String>,
    /// 1-based ordinal of each `?` and its generated `:_posN` name.
    pub positional: BTreeMap<usize, String>,
}

/// A compiled `SELECT`, reusable across executions.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedQuery {
    pub(crate) request: QueryInput,
    pub(crate) columns: Vec<ProjectionColumn>,
    pub(crate) params: QueryParams,
}

impl PreparedQuery {
    /// Request template. `expression_attribute_values` is always empty; see
    /// [`PreparedQuery::new_request`].
    #[must_use]
    pub fn request(&self) -> &QueryInput {
        &self.request
    }

    /// Output columns. Empty means the whole item is returned.
    #[must_use]
    pub fn columns(&self) -> &[ProjectionColumn] {
        &self.columns
    }

    /// Placeholders the query expects.
    #[must_use]
    pub fn params(&self) -> &QueryParams {
        &self.params
    }
}

// ---------------------------------------------------------------------------
// Compilation
// ---------------------------------------------------------------------------

/// Compile `select` against the key schema of its table.
pub fn compile(schema: &TableSchema, select: &Select) -> Result<PreparedQuery, CompileError> {
    let (partition_key, sort_key) = match &select.index {
        Some(name) => {
            let index = schema.index(name).ok_or_else(|| CompileError::UnknownIndex {
                index: name.clone(),
                table: select.from.clone(),
            })?;
            (index.partition_key.as_str(), index.sort_key.as_deref())
        }
        None => (schema.partition_key.as_str(), schema.sort_key.as_deref()),
    };
    if let Some(where_clause) = &select.where_clause {
        let mut styles = PlaceholderStyles::default();
        styles.visit_expression(where_clause);
        if styles.named && styles.positional {
            return Err(CompileError::MixedPlaceholders);
        }
        if let Some(name) = styles.reserved {
            return Err(CompileError::ReservedPlaceholder { name });
        }
    }
    let mut ctx = Context::new(partition_key, sort_key);

    let (key_terms, filter_terms) = split_where(select.where_clause.as_ref(), &ctx);
    let key_condition = ctx.render_key_condition(&key_terms)?;
    let filter = if filter_terms.is_empty() {
        None
    } else {
        Some(ctx.render_and(&filter_terms)?)
    };

    let (projection, columns) = match &select.projection {
        ProjectionExpression::All => (None, Vec::new()),
        ProjectionExpression::Columns(columns) => {
            (Some(ctx.render_projection(columns)?), columns.clone())
        }
    };

    let request = QueryInput {
        table_name: select.from.clone(),
        index_name: select.index.clone(),
        key_condition_expression: Some(key_condition),
        filter_expression: filter,
        projection_expression: projection,
        expression_attribute_names: ctx.names,
        scan_index_forward: select.descending.map(|descending| !descending),
        limit: select.limit.map(|n| i32::try_from(n).unwrap_or(i32::MAX)),
        ..QueryInput::default()
    };
    debug!(
        table = %request.table_name,
        index = ?request.index_name,
        key = ?request.key_condition_expression,
        filter = ?request.filter_expression,
        "compiled SELECT"
    );

    Ok(PreparedQuery {
        request,
        columns,
        params: QueryParams {
            fixed: ctx.fixed,
            named: ctx.named,
            positional: ctx.positional,
        },
    })
}

/// Split the top-level AND-list into key terms and filter terms. A WHERE
/// clause that is a top-level OR has no key terms.
fn split_where<'s>(
    where_clause: Option<&'s ConditionExpression>,
    ctx: &Context<'_>,
) -> (Vec<&'s Condition>, Vec<&'s Condition>) {
    let Some(expr) = where_clause else {
        return (Vec::new(), Vec::new());
    };
    let [and] = expr.or.as_slice() else {
        return (Vec::new(), Vec::new());
    };
    and.and
        .iter()
        .partition(|term| key_of(term).is_some_and(|key| ctx.is_key(key)))
}

/// Attribute a top-level term constrains, if it is a bare top-level name.
fn key_of(term: &Condition) -> Option<&str> {
    match term {
        Condition::Operand(operand) => operand.path.as_symbol(),
        Condition::Function(call) => call.first_path().and_then(DocumentPath::as_symbol),
        Condition::Parenthesized(_) | Condition::Not(_) => None,
    }
}

#[derive(Default)]
struct PlaceholderStyles {
    named: bool,
    positional: bool,
    /// First `:name` that could collide with a generated placeholder.
    reserved: Option<String>,
}

impl PlaceholderStyles {
    fn visit_expression(&mut self, expr: &ConditionExpression) {
        for and in &expr.or {
            for condition in &and.and {
                self.visit_condition(condition);
            }
        }
    }

    fn visit_condition(&mut self, condition: &Condition) {
        match condition {
            Condition::Parenthesized(inner) => self.visit_expression(inner),
            Condition::Not(inner) => self.visit_condition(inner),
            Condition::Function(call) => call.args.iter().for_each(|arg| self.visit_operand(arg)),
            Condition::Operand(operand) => match &operand.rhs {
                ConditionRhs::Compare { operand, .. } => self.visit_operand(operand),
                ConditionRhs::Between { start, end } => {
                    self.visit_operand(start);
                    self.visit_operand(end);
                }
                ConditionRhs::In(values) => values.iter().for_each(|value| self.visit_value(value)),
            },
        }
    }

    fn visit_operand(&mut self, operand: &Operand) {
        if let Operand::Value(value) = operand {
            self.visit_value(value);
        }
    }

    fn visit_value(&mut self, value: &Value) {
        match value {
            Value::Named(name) => {
                self.named = true;
                if self.reserved.is_none()
                    && GENERATED_PREFIXES.iter().any(|p| name.starts_with(p))
                {
                    self.reserved = Some(name.clone());
                }
            }
            Value::Positional(_) => self.positional = true,
            Value::Literal(_) => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

struct Context<'a> {
    partition_key: &'a str,
    sort_key: Option<&'a str>,
    /// `#placeholder` to attribute name.
    names: HashMap<String, String>,
    /// Attribute name to `#placeholder`.
    substituted: HashMap<String, String>,
    named: BTreeSet<String>,
    positional: BTreeMap<usize, String>,
    fixed: BTreeMap<String, Literal>,
    generated_names: usize,
    generated_values: usize,
}

impl<'a> Context<'a> {
    fn new(partition_key: &'a str, sort_key: Option<&'a str>) -> Self {
        Self {
            partition_key,
            sort_key,
            names: HashMap::new(),
            substituted: HashMap::new(),
            named: BTreeSet::new(),
            positional: BTreeMap::new(),
            fixed: BTreeMap::new(),
            generated_names: 0,
            generated_values: 0,
        }
    }

    fn is_key(&self, name: &str) -> bool {
        name == self.partition_key || self.sort_key == Some(name)
    }

    fn substitute(&mut self, symbol: &str) -> String {
        if let Some(existing) = self.substituted.get(symbol) {
            return existing.clone();
        }
        let placeholder = if is_reserved_word(symbol) {
            format!("#{symbol}")
        } else if is_plain_identifier(symbol) {
            return symbol.to_owned();
        } else {
            self.generated_names += 1;
            format!("#_gen{}", self.generated_names)
        };
        self.names.insert(placeholder.clone(), symbol.to_owned());
        self.substituted
            .insert(symbol.to_owned(), placeholder.clone());
        placeholder
    }

    fn render_path(&mut self, path: &DocumentPath) -> String {
        let mut out = String::new();
        for (i, fragment) in path.fragments.iter().enumerate() {
            if i != 0 {
                out.push('.');
            }
            out.push_str(&self.substitute(&fragment.symbol));
            for index in &fragment.indexes {
                out.push('[');
                out.push_str(&index.to_string());
                out.push(']');
            }
        }
        out
    }

    fn render_value(&mut self, value: &Value) -> String {
        match value {
            Value::Named(name) => {
                let placeholder = format!(":{name}");
                self.named.insert(placeholder.clone());
                placeholder
            }
            Value::Positional(ordinal) => {
                let ordinal = *ordinal;
                let placeholder = format!(":_pos{ordinal}");
                self.positional.insert(ordinal, placeholder.clone());
                placeholder
            }
            Value::Literal(literal) => {
                self.generated_values += 1;
                let placeholder = format!(":_gen{}", self.generated_values);
                self.fixed.insert(placeholder.clone(), literal.clone());
                placeholder
            }
        }
    }

    fn render_operand(&mut self, operand: &Operand) -> String {
        match operand {
            Operand::Path(path) => self.render_path(path),
            Operand::Value(value) => self.render_value(value),
        }
    }

    fn render_function(&mut self, call: &FunctionCall) -> String {
        let args = call
            .args
            .iter()
            .map(|arg| self.render_operand(arg))
            .collect::<Vec<_>>();
        format!("{}({})", call.name, args.join(", "))
    }

    fn render_comparison(&mut self, condition: &ConditionOperand) -> String {
        let path = self.render_path(&condition.path);
        match &condition.rhs {
            ConditionRhs::Compare { op, operand } => {
                format!("{path} {op} {}", self.render_operand(operand))
            }
            ConditionRhs::Between { start, end } => {
                let start = self.render_operand(start);
                let end = self.render_operand(end);
                format!("{path} BETWEEN {start} AND {end}")
            }
            ConditionRhs::In(values) => {
                let values = values
                    .iter()
                    .map(|value| self.render_value(value))
                    .collect::<Vec<_>>();
                format!("{path} IN ({})", values.join(", "))
            }
        }
    }

    // -- key condition ------------------------------------------------------

    fn invalid_partition_key(&self) -> CompileError {
        CompileError::InvalidPartitionKeyCondition {
            partition_key: self.partition_key.to_owned(),
        }
    }

    fn render_key_condition(&mut self, terms: &[&Condition]) -> Result<String, CompileError> {
        let mut hash_expr: Option<String> = None;
        let mut sort_expr: Option<String> = None;

        for term in terms {
            let (key, expr) = match term {
                Condition::Function(call) => {
                    let key = call
                        .first_path()
                        .and_then(DocumentPath::as_symbol)
                        .unwrap_or_default();
                    if key == self.partition_key {
                        return Err(self.invalid_partition_key());
                    }
                    if call.name != SORT_KEY_FUNCTION {
                        return Err(CompileError::IllegalSortKeyFunction {
                            key: key.to_owned(),
                            function: call.name.clone(),
                        });
                    }
                    (key, self.render_function(call))
                }
                Condition::Operand(operand) => {
                    let key = operand.path.as_symbol().unwrap_or_default();
                    self.check_key_operator(key, &operand.rhs)?;
                    (key, self.render_comparison(operand))
                }
                Condition::Parenthesized(_) | Condition::Not(_) => continue,
            };

            if key == self.partition_key {
                if hash_expr.is_some() {
                    return Err(CompileError::DuplicatePartitionKey {
                        key: key.to_owned(),
                    });
                }
                hash_expr = Some(expr);
            } else if sort_expr.is_some() {
                return Err(CompileError::DuplicateSortKey {
                    key: key.to_owned(),
                });
            } else {
                sort_expr = Some(expr);
            }
        }

        let hash_expr = hash_expr.ok_or_else(|| self.invalid_partition_key())?;
        Ok(match sort_expr {
            Some(sort_expr) => format!("{hash_expr} AND {sort_expr}"),
            None => hash_expr,
        })
    }

    fn check_key_operator(&self, key: &str, rhs: &ConditionRhs) -> Result<(), CompileError> {
        if key == self.partition_key {
            return match rhs {
                ConditionRhs::Compare {
                    op: CompareOp::Eq, ..
                } => Ok(()),
                _ => Err(self.invalid_partition_key()),
            };
        }
        let operator = match rhs {
            ConditionRhs::Compare {
                op: CompareOp::Ne, ..
            } => CompareOp::Ne.to_string(),
            ConditionRhs::In(_) => "IN".to_owned(),
            ConditionRhs::Compare { .. } | ConditionRhs::Between { .. } => return Ok(()),
        };
        Err(CompileError::IllegalSortKeyOperator {
            key: key.to_owned(),
            operator,
        })
    }

    // -- filter -------------------------------------------------------------

    fn render_or(&mut self, expr: &ConditionExpression) -> Result<String, CompileError> {
        let mut parts = Vec::with_capacity(expr.or.len());
        for and in &expr.or {
            parts.push(self.render_and_expression(and)?);
        }
        Ok(parts.join(" OR "))
    }

    fn render_and_expression(&mut self, expr: &AndExpression) -> Result<String, CompileError> {
        let terms = expr.and.iter().collect::<Vec<_>>();
        self.render_and(&terms)
    }

    fn render_and(&mut self, terms: &[&Condition]) -> Result<String, CompileError> {
        let mut parts = Vec::with_capacity(terms.len());
        for term in terms {
            parts.push(self.render_condition(term)?);
        }
        Ok(parts.join(" AND "))
    }

    fn render_condition(&mut self, condition: &Condition) -> Result<String, CompileError> {
        match condition {
            Condition::Parenthesized(inner) => Ok(format!("({})", self.render_or(inner)?)),
            Condition::Not(inner) => Ok(format!("NOT {}", self.render_condition(inner)?)),
            Condition::Operand(operand) => {
                self.reject_partition_key(operand.path.as_symbol())?;
                Ok(self.render_comparison(operand))
            }
            Condition::Function(call) => {
                self.reject_partition_key(call.first_path().and_then(DocumentPath::as_symbol))?;
                Ok(self.render_function(call))
            }
        }
    }

    fn reject_partition_key(&self, symbol: Option<&str>) -> Result<(), CompileError> {
        match symbol {
            Some(key) if key == self.partition_key => {
                Err(CompileError::PartitionKeyInNestedExpression {
                    key: key.to_owned(),
                })
            }
            _ => Ok(()),
        }
    }

    // -- projection ---------------------------------------------------------

    fn render_projection(&mut self, columns: &[ProjectionColumn]) -> Result<String, CompileError> {
        let mut paths = Vec::with_capacity(columns.len());
        for column in columns {
            match column {
                ProjectionColumn::Path(path) => paths.push(path),
                ProjectionColumn::Function(call) => {
                    if !call.name.eq_ignore_ascii_case(PROJECTION_FUNCTION) {
                        return Err(CompileError::IllegalProjectionFunction {
                            function: call.name.clone(),
                        });
                    }
                    for arg in &call.args {
                        match arg {
                            Operand::Path(path) => paths.push(path),
                            Operand::Value(value) => {
                                return Err(CompileError::InvalidDocumentArgument {
                                    argument: value.to_string(),
                                });
                            }
                        }
                    }
                }
            }
        }
        let rendered = paths
            .into_iter()
            .map(|path| self.render_path(path))
            .collect::<Vec<_>>();
        Ok(rendered.join(", "))
    }
}
