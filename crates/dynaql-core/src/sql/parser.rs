//! Recursive-descent parser for the SQL dialect.
//!
//! At most three tokens of lookahead are needed: two to tell a function call
//! from a bare path, three to recognise `document(*)`.

use dynaql_model::types::{
    KeyType, Projection, ProjectionType, ProvisionedThroughput, ScalarAttributeType,
};

use super::ast::{
    AndExpression, CompareOp, Condition, ConditionExpression, ConditionOperand, ConditionRhs,
    CreateTable, CreateTableEntry, DocumentPath, DropTable, FunctionCall, GlobalIndexDefinition,
    InsertOrReplace, InsertValue, JsonObject, JsonValue, Literal, LocalIndexDefinition, Operand,
    PathFragment, ProjectionColumn, ProjectionExpression, ReturnValues, Select, Statement,
    TableAttribute, Value,
};
use super::lexer::{Lexer, Position, Token, TokenKind};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Malformed statement text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The parser needed one construct and found another.
    #[error("{position}: expected {expected}, found {found}")]
    UnexpectedToken {
        /// What was expected.
        expected: String,
        /// What was found.
        found: String,
        /// Where the offending token starts.
        position: Position,
    },
    /// A token is lexically valid but not acceptable here.
    #[error("{position}: {message}")]
    InvalidToken {
        /// Explanation.
        message: String,
        /// Where the offending token starts.
        position: Position,
    },
    /// A quoted token reached end of input.
    #[error("{position}: unterminated {what}")]
    Unterminated {
        /// Kind of token.
        what: &'static str,
        /// Where the token starts.
        position: Position,
    },
}

impl ParseError {
    /// Location of the error in the statement text.
    #[must_use]
    pub fn position(&self) -> Position {
        match self {
            Self::UnexpectedToken { position, .. }
            | Self::InvalidToken { position, .. }
            | Self::Unterminated { position, .. } => *position,
        }
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Parse one statement. A trailing `;` is accepted.
pub fn parse(text: &str) -> Result<Statement, ParseError> {
    let tokens = Lexer::new(text).tokenize()?;
    let mut parser = Parser::new(tokens);
    let statement = parser.parse_statement()?;
    if matches!(parser.peek(), TokenKind::Semicolon) {
        parser.advance();
    }
    parser.expect_end()?;
    Ok(statement)
}

/// Parse a statement that must be a `SELECT`.
pub fn parse_select(text: &str) -> Result<Select, ParseError> {
    match parse(text)? {
        Statement::Select(select) => Ok(select),
        other => Err(ParseError::InvalidToken {
            message: format!("expected a SELECT statement, found {}", other.kind()),
            position: Position {
                offset: 0,
                line: 1,
                column: 1,
            },
        }),
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Deepest nesting of parentheses, `NOT` and JSON containers accepted.
const MAX_NESTING: usize = 128;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    positionals: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            positionals: 0,
        }
    }

    /// Run `f` one nesting level deeper.
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_NESTING {
            return Err(self.invalid("expression nested too deeply"));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn peek(&self) -> &TokenKind {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + n)
            .or_else(|| self.tokens.last())
            .map_or(&TokenKind::Eof, |t| &t.kind)
    }

    fn position(&self) -> Position {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.position)
            .unwrap_or_default()
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        kind
    }

    fn unexpected(&self, expected: impl Into<String>) -> ParseError {
        ParseError::UnexpectedToken {
            expected: expected.into(),
            found: self.peek().to_string(),
            position: self.position(),
        }
    }

    fn invalid(&self, message: impl Into<String>) -> ParseError {
        ParseError::InvalidToken {
            message: message.into(),
            position: self.position(),
        }
    }

    fn expect(&mut self, expected: &TokenKind) -> Result<(), ParseError> {
        if std::mem::discriminant(self.peek()) == std::mem::discriminant(expected) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(expected.to_string()))
        }
    }

    fn expect_end(&self) -> Result<(), ParseError> {
        if self.at_end() {
            Ok(())
        } else {
            Err(self.unexpected("end of input"))
        }
    }

    fn at_end(&self) -> bool {
        matches!(self.peek(), TokenKind::Eof)
    }

    /// Whether the next token is the bare word `word` (case-insensitive).
    fn peek_word(&self, word: &str) -> bool {
        self.peek_word_at(0, word)
    }

    fn peek_word_at(&self, n: usize, word: &str) -> bool {
        matches!(self.peek_at(n), TokenKind::Ident(s) if s.eq_ignore_ascii_case(word))
    }

    fn expect_word(&mut self, word: &str) -> Result<(), ParseError> {
        if self.peek_word(word) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(word))
        }
    }

    fn parse_name(&mut self) -> Result<String, ParseError> {
        let name = match self.peek() {
            TokenKind::Ident(name) | TokenKind::QuotedIdent(name) => name.clone(),
            _ => return Err(self.unexpected("identifier")),
        };
        self.advance();
        Ok(name)
    }

    /// `ident ('.' ident)* | quotedIdent`
    fn parse_table_name(&mut self) -> Result<String, ParseError> {
        let mut name = match self.peek() {
            TokenKind::QuotedIdent(name) => {
                let name = name.clone();
                self.advance();
                return Ok(name);
            }
            TokenKind::Ident(name) => name.clone(),
            _ => return Err(self.unexpected("table name")),
        };
        self.advance();
        while matches!(self.peek(), TokenKind::Dot) {
            self.advance();
            let TokenKind::Ident(part) = self.peek() else {
                return Err(self.unexpected("identifier"));
            };
            name.push('.');
            name.push_str(part);
            self.advance();
        }
        Ok(name)
    }

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        match self.peek() {
            TokenKind::Select => self.parse_select().map(Statement::Select),
            TokenKind::Insert | TokenKind::Replace => self.parse_insert().map(Statement::Insert),
            TokenKind::Create => self.parse_create_table().map(Statement::CreateTable),
            TokenKind::Drop => self.parse_drop_table().map(Statement::DropTable),
            _ => Err(self.unexpected("SELECT, INSERT, REPLACE, CREATE or DROP")),
        }
    }
}

// ---------------------------------------------------------------------------
// SELECT
// ---------------------------------------------------------------------------

impl Parser {
    fn parse_select(&mut self) -> Result<Select, ParseError> {
        self.expect(&TokenKind::Select)?;
        let projection = self.parse_projection()?;
        self.expect(&TokenKind::From)?;
        let from = self.parse_table_name()?;

        let mut index = None;
        if matches!(self.peek(), TokenKind::Use) {
            self.advance();
            self.expect(&TokenKind::Index)?;
            self.expect(&TokenKind::LParen)?;
            index = Some(self.parse_name()?);
            self.expect(&TokenKind::RParen)?;
        }

        let mut where_clause = None;
        if matches!(self.peek(), TokenKind::Where) {
            self.advance();
            where_clause = Some(self.parse_condition_expression()?);
        }

        let descending = match self.peek() {
            TokenKind::Asc => {
                self.advance();
                Some(false)
            }
            TokenKind::Desc => {
                self.advance();
                Some(true)
            }
            _ => None,
        };

        let mut limit = None;
        if matches!(self.peek(), TokenKind::Limit) {
            self.advance();
            limit = Some(self.parse_unsigned::<u32>("LIMIT")?);
        }

        Ok(Select {
            projection,
            from,
            index,
            where_clause,
            descending,
            limit,
        })
    }

    fn parse_unsigned<T: std::str::FromStr>(&mut self, what: &str) -> Result<T, ParseError> {
        match self.peek() {
            TokenKind::Number(text) => {
                let parsed = text.parse::<T>().map_err(|_| {
                    self.invalid(format!("{what} must be a non-negative integer, got {text}"))
                })?;
                self.advance();
                Ok(parsed)
            }
            _ => Err(self.unexpected(format!("number for {what}"))),
        }
    }

    fn parse_projection(&mut self) -> Result<ProjectionExpression, ParseError> {
        if matches!(self.peek(), TokenKind::Star) {
            self.advance();
            return Ok(ProjectionExpression::All);
        }
        if self.peek_word("document")
            && matches!(self.peek_at(1), TokenKind::LParen)
            && matches!(self.peek_at(2), TokenKind::Star)
        {
            self.pos += 3;
            self.expect(&TokenKind::RParen)?;
            return Ok(ProjectionExpression::All);
        }

        let mut columns = vec![self.parse_projection_column()?];
        while matches!(self.peek(), TokenKind::Comma) {
            self.advance();
            columns.push(self.parse_projection_column()?);
        }
        Ok(ProjectionExpression::Columns(columns))
    }

    fn parse_projection_column(&mut self) -> Result<ProjectionColumn, ParseError> {
        if self.at_function_call() {
            self.parse_function_call().map(ProjectionColumn::Function)
        } else {
            self.parse_document_path().map(ProjectionColumn::Path)
        }
    }

    fn at_function_call(&self) -> bool {
        matches!(self.peek(), TokenKind::Ident(_)) && matches!(self.peek_at(1), TokenKind::LParen)
    }

    fn parse_function_call(&mut self) -> Result<FunctionCall, ParseError> {
        let TokenKind::Ident(name) = self.peek() else {
            return Err(self.unexpected("function name"));
        };
        let name = name.clone();
        self.advance();
        self.expect(&TokenKind::LParen)?;
        let mut args = vec![self.parse_operand()?];
        while matches!(self.peek(), TokenKind::Comma) {
            self.advance();
            args.push(self.parse_operand()?);
        }
        self.expect(&TokenKind::RParen)?;
        Ok(FunctionCall { name, args })
    }
}

// ---------------------------------------------------------------------------
// Conditions (precedence climbing: OR < AND < NOT < primary)
// ---------------------------------------------------------------------------

impl Parser {
    fn parse_condition_expression(&mut self) -> Result<ConditionExpression, ParseError> {
        let mut or = vec![self.parse_and_expression()?];
        while matches!(self.peek(), TokenKind::Or) {
            self.advance();
            or.push(self.parse_and_expression()?);
        }
        Ok(ConditionExpression { or })
    }

    fn parse_and_expression(&mut self) -> Result<AndExpression, ParseError> {
        let mut and = vec![self.parse_condition()?];
        while matches!(self.peek(), TokenKind::And) {
            self.advance();
            and.push(self.parse_condition()?);
        }
        Ok(AndExpression { and })
    }

    fn parse_condition(&mut self) -> Result<Condition, ParseError> {
        match self.peek() {
            TokenKind::LParen => {
                self.advance();
                let inner = self.nested(Self::parse_condition_expression)?;
                self.expect(&TokenKind::RParen)?;
                Ok(Condition::Parenthesized(inner))
            }
            TokenKind::Not => {
                self.advance();
                let inner = self.nested(Self::parse_condition)?;
                Ok(Condition::Not(Box::new(inner)))
            }
            _ if self.at_function_call() => self.parse_function_call().map(Condition::Function),
            TokenKind::Ident(_) | TokenKind::QuotedIdent(_) => {
                let path = self.parse_document_path()?;
                let rhs = self.parse_condition_rhs()?;
                Ok(Condition::Operand(ConditionOperand { path, rhs }))
            }
            _ => Err(self.unexpected("condition")),
        }
    }

    fn parse_condition_rhs(&mut self) -> Result<ConditionRhs, ParseError> {
        let op = match self.peek() {
            TokenKind::Eq => CompareOp::Eq,
            TokenKind::Ne => CompareOp::Ne,
            TokenKind::Lt => CompareOp::Lt,
            TokenKind::Le => CompareOp::Le,
            TokenKind::Gt => CompareOp::Gt,
            TokenKind::Ge => CompareOp::Ge,
            TokenKind::Between => {
                self.advance();
                let start = self.parse_operand()?;
                self.expect(&TokenKind::And)?;
                let end = self.parse_operand()?;
                return Ok(ConditionRhs::Between { start, end });
            }
            TokenKind::In => {
                self.advance();
                self.expect(&TokenKind::LParen)?;
                let mut values = vec![self.parse_value()?];
                while matches!(self.peek(), TokenKind::Comma) {
                    self.advance();
                    values.push(self.parse_value()?);
                }
                self.expect(&TokenKind::RParen)?;
                return Ok(ConditionRhs::In(values));
            }
            _ => return Err(self.unexpected("comparison operator, BETWEEN or IN")),
        };
        self.advance();
        let operand = self.parse_operand()?;
        Ok(ConditionRhs::Compare { op, operand })
    }

    fn parse_operand(&mut self) -> Result<Operand, ParseError> {
        match self.peek() {
            TokenKind::Ident(_) | TokenKind::QuotedIdent(_) => {
                self.parse_document_path().map(Operand::Path)
            }
            _ => self.parse_value().map(Operand::Value),
        }
    }

    fn parse_value(&mut self) -> Result<Value, ParseError> {
        if let Some(literal) = self.parse_literal() {
            return Ok(Value::Literal(literal));
        }
        match self.peek() {
            TokenKind::Question => {
                self.advance();
                self.positionals += 1;
                Ok(Value::Positional(self.positionals))
            }
            TokenKind::Colon => {
                self.advance();
                let TokenKind::Ident(name) = self.peek() else {
                    return Err(self.unexpected("placeholder name after ':'"));
                };
                let name = name.clone();
                self.advance();
                Ok(Value::Named(name))
            }
            _ => Err(self.unexpected("value")),
        }
    }

    fn parse_literal(&mut self) -> Option<Literal> {
        let literal = match self.peek() {
            TokenKind::Number(n) => Literal::Number(n.clone()),
            TokenKind::String(s) => Literal::String(s.clone()),
            TokenKind::Bool(b) => Literal::Bool(*b),
            TokenKind::Null => Literal::Null,
            _ => return None,
        };
        self.advance();
        Some(literal)
    }

    fn parse_document_path(&mut self) -> Result<DocumentPath, ParseError> {
        let mut fragments = vec![self.parse_path_fragment()?];
        while matches!(self.peek(), TokenKind::Dot) {
            self.advance();
            fragments.push(self.parse_path_fragment()?);
        }
        Ok(DocumentPath { fragments })
    }

    fn parse_path_fragment(&mut self) -> Result<PathFragment, ParseError> {
        let symbol = self.parse_name()?;
        let mut indexes = Vec::new();
        while matches!(self.peek(), TokenKind::LBracket) {
            self.advance();
            indexes.push(self.parse_unsigned::<usize>("index")?);
            self.expect(&TokenKind::RBracket)?;
        }
        Ok(PathFragment { symbol, indexes })
    }
}

// ---------------------------------------------------------------------------
// INSERT / REPLACE
// ---------------------------------------------------------------------------

impl Parser {
    fn parse_insert(&mut self) -> Result<InsertOrReplace, ParseError> {
        let replace = matches!(self.advance(), TokenKind::Replace);
        self.expect(&TokenKind::Into)?;
        let into = self.parse_table_name()?;
        self.expect(&TokenKind::Values)?;

        let mut values = vec![self.parse_insert_row()?];
        while matches!(self.peek(), TokenKind::Comma) {
            self.advance();
            values.push(self.parse_insert_row()?);
        }

        let mut returning = None;
        if matches!(self.peek(), TokenKind::Returning) {
            self.advance();
            returning = Some(if self.peek_word("NONE") {
                ReturnValues::None
            } else if self.peek_word("ALL_OLD") {
                ReturnValues::AllOld
            } else {
                return Err(self.unexpected("NONE or ALL_OLD"));
            });
            self.advance();
        }

        Ok(InsertOrReplace {
            replace,
            into,
            values,
            returning,
        })
    }

    fn parse_insert_row(&mut self) -> Result<InsertValue, ParseError> {
        self.expect(&TokenKind::LParen)?;
        let value = if matches!(self.peek(), TokenKind::LBrace) {
            InsertValue::Object(self.parse_json_object()?)
        } else {
            InsertValue::Value(self.parse_value()?)
        };
        self.expect(&TokenKind::RParen)?;
        Ok(value)
    }

    fn parse_json_object(&mut self) -> Result<JsonObject, ParseError> {
        self.expect(&TokenKind::LBrace)?;
        let mut entries = Vec::new();
        while !matches!(self.peek(), TokenKind::RBrace) {
            let key = match self.peek() {
                TokenKind::Ident(key) | TokenKind::QuotedIdent(key) | TokenKind::String(key) => {
                    key.clone()
                }
                _ => return Err(self.unexpected("object key")),
            };
            self.advance();
            self.expect(&TokenKind::Colon)?;
            entries.push((key, self.parse_json_value()?));
            if matches!(self.peek(), TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(JsonObject { entries })
    }

    fn parse_json_value(&mut self) -> Result<JsonValue, ParseError> {
        if let Some(literal) = self.parse_literal() {
            return Ok(JsonValue::Scalar(literal));
        }
        match self.peek() {
            TokenKind::LBrace => self
                .nested(Self::parse_json_object)
                .map(JsonValue::Object),
            TokenKind::LBracket => {
                self.advance();
                let mut items = Vec::new();
                while !matches!(self.peek(), TokenKind::RBracket) {
                    items.push(self.nested(Self::parse_json_value)?);
                    if matches!(self.peek(), TokenKind::Comma) {
                        self.advance();
                    } else {
                        break;
                    }
                }
                self.expect(&TokenKind::RBracket)?;
                Ok(JsonValue::Array(items))
            }
            _ => Err(self.unexpected("JSON value")),
        }
    }
}

// ---------------------------------------------------------------------------
// CREATE TABLE / DROP TABLE
// ---------------------------------------------------------------------------

impl Parser {
    fn parse_create_table(&mut self) -> Result<CreateTable, ParseError> {
        self.expect(&TokenKind::Create)?;
        self.expect_word("TABLE")?;
        let table = self.parse_table_name()?;
        self.expect(&TokenKind::LParen)?;
        let mut entries = vec![self.parse_create_table_entry()?];
        while matches!(self.peek(), TokenKind::Comma) {
            self.advance();
            entries.push(self.parse_create_table_entry()?);
        }
        self.expect(&TokenKind::RParen)?;
        let throughput = self.parse_throughput()?;
        Ok(CreateTable {
            table,
            entries,
            throughput,
        })
    }

    fn parse_create_table_entry(&mut self) -> Result<CreateTableEntry, ParseError> {
        if self.peek_word("GLOBAL") && !self.is_attribute_declaration() {
            self.advance();
            self.skip_secondary_index()?;
            let name = self.parse_name()?;
            self.expect_word("HASH")?;
            let partition_key = self.parse_parenthesized_name()?;
            let sort_key = if self.peek_word("RANGE") {
                self.advance();
                Some(self.parse_parenthesized_name()?)
            } else {
                None
            };
            self.expect_word("PROJECTION")?;
            let projection = self.parse_index_projection()?;
            let throughput = self.parse_throughput()?;
            return Ok(CreateTableEntry::GlobalIndex(GlobalIndexDefinition {
                name,
                partition_key,
                sort_key,
                projection,
                throughput,
            }));
        }
        if self.peek_word("LOCAL") && !self.is_attribute_declaration() {
            self.advance();
            self.skip_secondary_index()?;
            let name = self.parse_name()?;
            self.expect_word("RANGE")?;
            let sort_key = self.parse_parenthesized_name()?;
            self.expect_word("PROJECTION")?;
            let projection = self.parse_index_projection()?;
            return Ok(CreateTableEntry::LocalIndex(LocalIndexDefinition {
                name,
                sort_key,
                projection,
            }));
        }

        let name = self.parse_name()?;
        let attribute_type = match self.peek() {
            TokenKind::Ident(word) if word.eq_ignore_ascii_case("STRING") => ScalarAttributeType::S,
            TokenKind::Ident(word) if word.eq_ignore_ascii_case("NUMBER") => ScalarAttributeType::N,
            TokenKind::Ident(word) if word.eq_ignore_ascii_case("BINARY") => ScalarAttributeType::B,
            _ => return Err(self.unexpected("STRING, NUMBER or BINARY")),
        };
        self.advance();
        let key = if self.peek_word("HASH") {
            Some(KeyType::Hash)
        } else if self.peek_word("RANGE") {
            Some(KeyType::Range)
        } else {
            None
        };
        if key.is_some() {
            self.advance();
            self.expect_word("KEY")?;
        }
        Ok(CreateTableEntry::Attribute(TableAttribute {
            name,
            attribute_type,
            key,
        }))
    }

    /// `global STRING` declares an attribute named `global`.
    fn is_attribute_declaration(&self) -> bool {
        ["STRING", "NUMBER", "BINARY"]
            .iter()
            .any(|word| self.peek_word_at(1, word))
    }

    /// `[SECONDARY] INDEX`
    fn skip_secondary_index(&mut self) -> Result<(), ParseError> {
        if self.peek_word("SECONDARY") {
            self.advance();
        }
        self.expect(&TokenKind::Index)
    }

    fn parse_parenthesized_name(&mut self) -> Result<String, ParseError> {
        self.expect(&TokenKind::LParen)?;
        let name = self.parse_name()?;
        self.expect(&TokenKind::RParen)?;
        Ok(name)
    }

    fn parse_index_projection(&mut self) -> Result<Projection, ParseError> {
        if self.peek_word("KEYS_ONLY") {
            self.advance();
            return Ok(Projection {
                projection_type: Some(ProjectionType::KeysOnly),
                non_key_attributes: Vec::new(),
            });
        }
        if self.peek_word("ALL") {
            self.advance();
            return Ok(Projection {
                projection_type: Some(ProjectionType::All),
                non_key_attributes: Vec::new(),
            });
        }
        self.expect_word("INCLUDE")?;
        let mut non_key_attributes = vec![self.parse_name()?];
        // A comma continues the list only when followed by a lone name;
        // otherwise it separates the next table entry.
        while matches!(self.peek(), TokenKind::Comma)
            && matches!(
                self.peek_at(1),
                TokenKind::Ident(_) | TokenKind::QuotedIdent(_)
            )
            && (matches!(self.peek_at(2), TokenKind::Comma | TokenKind::RParen)
                || self.peek_word_at(2, "PROVISIONED"))
        {
            self.advance();
            non_key_attributes.push(self.parse_name()?);
        }
        Ok(Projection {
            projection_type: Some(ProjectionType::Include),
            non_key_attributes,
        })
    }

    fn parse_throughput(&mut self) -> Result<ProvisionedThroughput, ParseError> {
        self.expect_word("PROVISIONED")?;
        self.expect_word("THROUGHPUT")?;
        self.expect_word("READ")?;
        let read_capacity_units = self.parse_unsigned::<i64>("READ")?;
        self.expect_word("WRITE")?;
        let write_capacity_units = self.parse_unsigned::<i64>("WRITE")?;
        Ok(ProvisionedThroughput {
            read_capacity_units,
            write_capacity_units,
        })
    }

    fn parse_drop_table(&mut self) -> Result<DropTable, ParseError> {
        self.expect(&TokenKind::Drop)?;
        self.expect_word("TABLE")?;
        let table = self.parse_table_name()?;
        Ok(DropTable { table })
    }
}
