use crate::error::SyntaxError;
use crate::lexer::token::{Token, TokenKind};

/// Cursor over a finished, ordered token sequence. The lexer guarantees the
/// last token is EOF, so the cursor never runs off the end: advancing past
/// EOF is a reported syntax error, never an out-of-bounds access.
#[derive(Debug, Clone)]
pub struct TokenStream {
    tokens: Vec<Token>,
    current: usize,
    name: Option<String>,
}

impl TokenStream {
    pub fn new(tokens: Vec<Token>, name: Option<&str>) -> Self {
        Self {
            tokens,
            current: 0,
            name: name.map(str::to_string),
        }
    }

    /// Template name the tokens came from, when known
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Current token without advancing
    pub fn current(&self) -> &Token {
        &self.tokens[self.current]
    }

    pub fn is_eof(&self) -> bool {
        self.tokens[self.current].kind == TokenKind::Eof
    }

    /// Advance the cursor and return the token it pointed at
    pub fn next(&mut self) -> Result<Token, SyntaxError> {
        if self.current + 1 >= self.tokens.len() {
            return Err(SyntaxError::new(
                "Unexpected end of template",
                Some(self.tokens[self.current].line),
                self.name.as_deref(),
            ));
        }
        self.current += 1;
        Ok(self.tokens[self.current - 1].clone())
    }

    /// Advance only when the current token matches; `None` otherwise
    pub fn next_if(&mut self, kind: TokenKind, value: Option<&str>) -> Option<Token> {
        let matches = match value {
            Some(v) => self.current().is_value(kind, v),
            None => self.current().is(kind),
        };
        if matches { self.next().ok() } else { None }
    }

    /// Consume a token of the given kind (and value, when supplied) or raise.
    /// `message` is prefixed to the diagnostic to say what construct needed it.
    pub fn expect(
        &mut self,
        kind: TokenKind,
        value: Option<&str>,
        message: Option<&str>,
    ) -> Result<Token, SyntaxError> {
        let token = self.current().clone();
        let matches = match value {
            Some(v) => token.is_value(kind, v),
            None => token.is(kind),
        };
        if !matches {
            return Err(SyntaxError::new(
                format!(
                    "{}Unexpected token \"{}\" of value \"{}\" (\"{}\" expected{})",
                    message.map(|m| format!("{}. ", m)).unwrap_or_default(),
                    token.kind.english(),
                    token.value,
                    kind.english(),
                    value.map(|v| format!(" with value \"{}\"", v)).unwrap_or_default(),
                ),
                Some(token.line),
                self.name.as_deref(),
            ));
        }
        self.next()?;
        Ok(token)
    }

    /// Look ahead without advancing
    pub fn look(&self, number: usize) -> Result<&Token, SyntaxError> {
        if self.current + number >= self.tokens.len() {
            return Err(SyntaxError::new(
                "Unexpected end of template",
                Some(self.tokens[self.tokens.len() - 1].line),
                self.name.as_deref(),
            ));
        }
        Ok(&self.tokens[self.current + number])
    }

    pub fn test(&self, kind: TokenKind) -> bool {
        self.current().is(kind)
    }

    pub fn test_value(&self, kind: TokenKind, value: &str) -> bool {
        self.current().is_value(kind, value)
    }

    /// Splice tokens in front of the cursor. Used by tag handlers that
    /// rewrite upcoming input (the embed tag injects a synthetic extends).
    pub fn inject_tokens(&mut self, tokens: Vec<Token>) {
        self.tokens.splice(self.current..self.current, tokens);
    }
}
