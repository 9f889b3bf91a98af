use serde::Serialize;
use std::fmt;

/// Kind of token produced by the lexer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TokenKind {
    Eof,
    Text,
    BlockStart,
    VarStart,
    BlockEnd,
    VarEnd,
    Name,
    Number,
    String,
    Operator,
    Punctuation,
    InterpolationStart,
    InterpolationEnd,
}

impl TokenKind {
    /// English description used in diagnostics
    pub fn english(&self) -> &'static str {
        match self {
            TokenKind::Eof => "end of template",
            TokenKind::Text => "text",
            TokenKind::BlockStart => "begin of statement block",
            TokenKind::VarStart => "begin of print statement",
            TokenKind::BlockEnd => "end of statement block",
            TokenKind::VarEnd => "end of print statement",
            TokenKind::Name => "name",
            TokenKind::Number => "number",
            TokenKind::String => "string",
            TokenKind::Operator => "operator",
            TokenKind::Punctuation => "punctuation",
            TokenKind::InterpolationStart => "begin of string interpolation",
            TokenKind::InterpolationEnd => "end of string interpolation",
        }
    }
}

/// Payload of a token. Structural tokens (delimiters, EOF) carry `None`;
/// numbers keep their native representation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TokenValue {
    None,
    Str(String),
    Int(i64),
    Float(f64),
}

impl fmt::Display for TokenValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenValue::None => Ok(()),
            TokenValue::Str(s) => write!(f, "{}", s),
            TokenValue::Int(i) => write!(f, "{}", i),
            TokenValue::Float(x) => write!(f, "{:?}", x),
        }
    }
}

/// Immutable token: kind, value, and the source line it started on
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub value: TokenValue,
    pub line: usize,
}

impl Token {
    pub fn new(kind: TokenKind, value: TokenValue, line: usize) -> Self {
        Self { kind, value, line }
    }

    /// The string payload, or `""` for tokens without one
    pub fn value_str(&self) -> &str {
        match &self.value {
            TokenValue::Str(s) => s.as_str(),
            _ => "",
        }
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    pub fn is_value(&self, kind: TokenKind, value: &str) -> bool {
        self.kind == kind && self.value_str() == value
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self.kind, self.value)
    }
}
