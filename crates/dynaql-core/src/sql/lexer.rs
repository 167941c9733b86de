//! Tokenizer for the SQL dialect.
//!
//! Keywords are matched case-insensitively. Words that only carry meaning in
//! one statement form (`TABLE`, `HASH`, `PROJECTION`, ...) stay identifiers and
//! are recognised by the parser.

use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

use super::parser::ParseError;

// ---------------------------------------------------------------------------
// Positions
// ---------------------------------------------------------------------------

/// Location of a token in the statement text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    /// Byte offset from the start of the input.
    pub offset: usize,
    /// 1-based line.
    pub line: usize,
    /// 1-based column, counted in characters.
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// A token and where it starts.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    /// Bare identifier, original case.
    Ident(String),
    /// Back-quoted identifier, quotes removed.
    QuotedIdent(String),
    /// Numeric literal text, leading `+` removed.
    Number(String),
    /// String literal, quotes removed.
    String(String),
    /// `TRUE` / `FALSE`
    Bool(bool),
    /// `NULL`
    Null,
    // Keywords
    Select,
    From,
    Where,
    Limit,
    Insert,
    Replace,
    Into,
    Values,
    Returning,
    Create,
    Drop,
    Use,
    Index,
    And,
    Or,
    Not,
    Between,
    In,
    Asc,
    Desc,
    // Operators
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Colon,
    Question,
    Comma,
    Dot,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Semicolon,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(s) => write!(f, "identifier '{s}'"),
            Self::QuotedIdent(s) => write!(f, "identifier `{s}`"),
            Self::Number(n) => write!(f, "number {n}"),
            Self::String(s) => write!(f, "string {s:?}"),
            Self::Bool(true) => f.write_str("TRUE"),
            Self::Bool(false) => f.write_str("FALSE"),
            Self::Null => f.write_str("NULL"),
            Self::Select => f.write_str("SELECT"),
            Self::From => f.write_str("FROM"),
            Self::Where => f.write_str("WHERE"),
            Self::Limit => f.write_str("LIMIT"),
            Self::Insert => f.write_str("INSERT"),
            Self::Replace => f.write_str("REPLACE"),
            Self::Into => f.write_str("INTO"),
            Self::Values => f.write_str("VALUES"),
            Self::Returning => f.write_str("RETURNING"),
            Self::Create => f.write_str("CREATE"),
            Self::Drop => f.write_str("DROP"),
            Self::Use => f.write_str("USE"),
            Self::Index => f.write_str("INDEX"),
            Self::And => f.write_str("AND"),
            Self::Or => f.write_str("OR"),
            Self::Not => f.write_str("NOT"),
            Self::Between => f.write_str("BETWEEN"),
            Self::In => f.write_str("IN"),
            Self::Asc => f.write_str("ASC"),
            Self::Desc => f.write_str("DESC"),
            Self::Eq => f.write_str("'='"),
            Self::Ne => f.write_str("'<>'"),
            Self::Lt => f.write_str("'<'"),
            Self::Le => f.write_str("'<='"),
            Self::Gt => f.write_str("'>'"),
            Self::Ge => f.write_str("'>='"),
            Self::Plus => f.write_str("'+'"),
            Self::Minus => f.write_str("'-'"),
            Self::Star => f.write_str("'*'"),
            Self::Slash => f.write_str("'/'"),
            Self::Percent => f.write_str("'%'"),
            Self::Colon => f.write_str("':'"),
            Self::Question => f.write_str("'?'"),
            Self::Comma => f.write_str("','"),
            Self::Dot => f.write_str("'.'"),
            Self::LParen => f.write_str("'('"),
            Self::RParen => f.write_str("')'"),
            Self::LBracket => f.write_str("'['"),
            Self::RBracket => f.write_str("']'"),
            Self::LBrace => f.write_str("'{'"),
            Self::RBrace => f.write_str("'}'"),
            Self::Semicolon => f.write_str("';'"),
            Self::Eof => f.write_str("end of input"),
        }
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

pub(crate) struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            line: 1,
            column: 1,
        }
    }

    /// Tokenize the entire input. The last token is always [`TokenKind::Eof`].
    pub(crate) fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn position(&mut self) -> Position {
        let offset = self.chars.peek().map_or(self.input.len(), |&(i, _)| i);
        Position {
            offset,
            line: self.line,
            column: self.column,
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    /// Character `n` places after the current one (`0` is the current one).
    fn peek_nth(&self, n: usize) -> Option<char> {
        self.chars.clone().nth(n).map(|(_, c)| c)
    }

    fn bump(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn bump_while(&mut self, out: &mut String, pred: impl Fn(char) -> bool) {
        while let Some(c) = self.peek_char() {
            if !pred(c) {
                break;
            }
            out.push(c);
            self.bump();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        self.skip_whitespace();
        let position = self.position();
        let Some(ch) = self.peek_char() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                position,
            });
        };

        let kind = match ch {
            '`' => self.read_quoted_ident(position)?,
            '\'' | '"' => self.read_string(ch, position)?,
            c if c.is_ascii_digit() => self.read_number(),
            '.' if self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) => self.read_number(),
            '+' | '-' if self.starts_signed_number() => self.read_number(),
            c if is_ident_start(c) => self.read_word(),
            _ => self.read_operator(ch, position)?,
        };
        Ok(Token { kind, position })
    }

    fn starts_signed_number(&self) -> bool {
        match self.peek_nth(1) {
            Some(c) if c.is_ascii_digit() => true,
            Some('.') => self.peek_nth(2).is_some_and(|c| c.is_ascii_digit()),
            _ => false,
        }
    }

    fn read_operator(&mut self, ch: char, position: Position) -> Result<TokenKind, ParseError> {
        self.bump();
        let kind = match ch {
            '=' => TokenKind::Eq,
            '<' => match self.peek_char() {
                Some('=') => {
                    self.bump();
                    TokenKind::Le
                }
                Some('>') => {
                    self.bump();
                    TokenKind::Ne
                }
                _ => TokenKind::Lt,
            },
            '>' => {
                if self.peek_char() == Some('=') {
                    self.bump();
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                }
            }
            '!' if self.peek_char() == Some('=') => {
                self.bump();
                TokenKind::Ne
            }
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            ':' => TokenKind::Colon,
            '?' => TokenKind::Question,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ';' => TokenKind::Semicolon,
            other => {
                return Err(ParseError::InvalidToken {
                    message: format!("unexpected character '{other}'"),
                    position,
                });
            }
        };
        Ok(kind)
    }

    fn read_quoted_ident(&mut self, position: Position) -> Result<TokenKind, ParseError> {
        self.bump(); // opening backtick
        let mut name = String::new();
        self.bump_while(&mut name, |c| c != '`');
        if self.bump().is_none() {
            return Err(ParseError::Unterminated {
                what: "quoted identifier",
                position,
            });
        }
        if name.is_empty() {
            return Err(ParseError::InvalidToken {
                message: "empty quoted identifier".to_owned(),
                position,
            });
        }
        Ok(TokenKind::QuotedIdent(name))
    }

    fn read_string(&mut self, quote: char, position: Position) -> Result<TokenKind, ParseError> {
        self.bump();
        let mut text = String::new();
        self.bump_while(&mut text, |c| c != quote);
        if self.bump().is_none() {
            return Err(ParseError::Unterminated {
                what: "string literal",
                position,
            });
        }
        Ok(TokenKind::String(text))
    }

    fn read_number(&mut self) -> TokenKind {
        let mut text = String::new();
        match self.peek_char() {
            Some('+') => {
                self.bump();
            }
            Some('-') => {
                text.push('-');
                self.bump();
            }
            _ => {}
        }
        self.bump_while(&mut text, |c| c.is_ascii_digit());
        if self.peek_char() == Some('.') && self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) {
            text.push('.');
            self.bump();
            self.bump_while(&mut text, |c| c.is_ascii_digit());
        }
        if matches!(self.peek_char(), Some('e' | 'E')) && self.exponent_follows() {
            self.bump_while(&mut text, |c| matches!(c, 'e' | 'E'));
            if let Some(sign @ ('+' | '-')) = self.peek_char() {
                text.push(sign);
                self.bump();
            }
            self.bump_while(&mut text, |c| c.is_ascii_digit());
        }
        TokenKind::Number(text)
    }

    fn exponent_follows(&self) -> bool {
        match self.peek_nth(1) {
            Some(c) if c.is_ascii_digit() => true,
            Some('+' | '-') => self.peek_nth(2).is_some_and(|c| c.is_ascii_digit()),
            _ => false,
        }
    }

    fn read_word(&mut self) -> TokenKind {
        let mut word = String::new();
        self.bump_while(&mut word, is_ident_continue);
        match word.to_ascii_uppercase().as_str() {
            "TRUE" => TokenKind::Bool(true),
            "FALSE" => TokenKind::Bool(false),
            "NULL" => TokenKind::Null,
            "SELECT" => TokenKind::Select,
            "FROM" => TokenKind::From,
            "WHERE" => TokenKind::Where,
            "LIMIT" => TokenKind::Limit,
            "INSERT" => TokenKind::Insert,
            "REPLACE" => TokenKind::Replace,
            "INTO" => TokenKind::Into,
            "VALUES" => TokenKind::Values,
            "RETURNING" => TokenKind::Returning,
            "CREATE" => TokenKind::Create,
            "DROP" => TokenKind::Drop,
            "USE" => TokenKind::Use,
            "INDEX" => TokenKind::Index,
            "AND" => TokenKind::And,
            "OR" => TokenKind::Or,
            "NOT" => TokenKind::Not,
            "BETWEEN" => TokenKind::Between,
            "IN" => TokenKind::In,
            "ASC" => TokenKind::Asc,
            "DESC" => TokenKind::Desc,
            _ => TokenKind::Ident(word),
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
