pub mod stream;
pub mod token;

use crate::error::LexError;
use crate::registry::Registry;
use stream::TokenStream;
use token::{Token, TokenKind, TokenValue};

/// Punctuation characters recognized inside tags
const PUNCTUATION: &str = "()[]{}?:.,|";

/// Template authors control bracket nesting; cap it instead of letting the
/// parser recurse until the call stack gives out.
const MAX_BRACKET_NESTING: usize = 512;

/// The four delimiter pairs plus the whitespace-trim marker, all overridable
/// per lexer instance.
#[derive(Debug, Clone)]
pub struct Delimiters {
    pub comment: (String, String),
    pub block: (String, String),
    pub variable: (String, String),
    pub interpolation: (String, String),
    pub whitespace_trim: char,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            comment: ("{#".to_string(), "#}".to_string()),
            block: ("{%".to_string(), "%}".to_string()),
            variable: ("{{".to_string(), "}}".to_string()),
            interpolation: ("#{".to_string(), "}".to_string()),
            whitespace_trim: '-',
        }
    }
}

/// Converts template text into a [`TokenStream`].
///
/// The operator vocabulary comes from the registry at construction time;
/// symbols are matched longest-first so multi-character operators are never
/// shadowed by their prefixes.
pub struct Lexer {
    delimiters: Delimiters,
    operators: Vec<String>,
}

impl Lexer {
    pub fn new(registry: &Registry) -> Self {
        Self::with_delimiters(registry, Delimiters::default())
    }

    pub fn with_delimiters(registry: &Registry, delimiters: Delimiters) -> Self {
        // `=` is not an expression operator but named arguments and `set`
        // need it lexed as one
        let mut operators: Vec<String> = vec!["=".to_string()];
        operators.extend(registry.unary_operator_names());
        operators.extend(registry.binary_operator_names());
        operators.sort();
        operators.dedup();
        operators.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        Self { delimiters, operators }
    }

    /// Tokenize a template. `name` is carried into the stream and every
    /// diagnostic.
    pub fn tokenize(&self, code: &str, name: Option<&str>) -> Result<TokenStream, LexError> {
        let code = code.replace("\r\n", "\n").replace('\r', "\n");
        let positions = self.find_delimiter_positions(&code);

        let scanner = Scanner {
            lexer: self,
            code,
            name: name.map(str::to_string),
            cursor: 0,
            lineno: 1,
            state: State::Data,
            states: Vec::new(),
            brackets: Vec::new(),
            tokens: Vec::new(),
            positions,
            position: 0,
            current_var_block_line: 1,
        };
        scanner.run()
    }

    /// One pass over the source locating every comment/block/variable opener
    /// (and its trim marker). The scanner then walks these monotonically and
    /// never re-scans consumed text.
    fn find_delimiter_positions(&self, code: &str) -> Vec<DelimPos> {
        let d = &self.delimiters;
        let mut openers = [
            (d.variable.0.as_str(), DelimKind::Var),
            (d.block.0.as_str(), DelimKind::Block),
            (d.comment.0.as_str(), DelimKind::Comment),
        ];
        // longest first so a shorter opener cannot shadow a longer one at
        // the same offset
        openers.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        // each opener's next occurrence is cached; only the one the scan has
        // passed gets re-searched, never the whole remaining source
        let mut nexts: Vec<Option<usize>> =
            openers.iter().map(|(open, _)| code.find(*open)).collect();

        let mut positions = Vec::new();
        let mut i = 0;
        loop {
            for (slot, (open, _)) in nexts.iter_mut().zip(&openers) {
                if slot.is_some_and(|at| at < i) {
                    *slot = code[i..].find(*open).map(|rel| i + rel);
                }
            }

            let mut found: Option<(usize, usize, DelimKind)> = None;
            for (slot, (open, kind)) in nexts.iter().zip(&openers) {
                if let Some(at) = *slot {
                    if found.is_none_or(|(prev, _, _)| at < prev) {
                        found = Some((at, open.len(), *kind));
                    }
                }
            }
            let Some((offset, open_len, kind)) = found else {
                break;
            };

            let trim = code[offset + open_len..].starts_with(d.whitespace_trim);
            let length = open_len + if trim { d.whitespace_trim.len_utf8() } else { 0 };
            positions.push(DelimPos { offset, kind, trim, length });
            i = offset + length;
        }
        positions
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Data,
    Block,
    Var,
    String,
    Interpolation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DelimKind {
    Comment,
    Block,
    Var,
}

#[derive(Debug, Clone, Copy)]
struct DelimPos {
    offset: usize,
    kind: DelimKind,
    trim: bool,
    /// opener length including the trim marker when present
    length: usize,
}

/// Per-tokenize state: cursor, line counter, explicit state and bracket
/// stacks.
struct Scanner<'l> {
    lexer: &'l Lexer,
    code: String,
    name: Option<String>,
    cursor: usize,
    lineno: usize,
    state: State,
    states: Vec<State>,
    /// open brackets (or `"`/interpolation openers) with their opening line
    brackets: Vec<(String, usize)>,
    tokens: Vec<Token>,
    positions: Vec<DelimPos>,
    position: usize,
    /// line the enclosing `{{`/`{%` opened on, for "unclosed" diagnostics
    current_var_block_line: usize,
}

impl Scanner<'_> {
    fn run(mut self) -> Result<TokenStream, LexError> {
        while self.cursor < self.code.len() {
            match self.state {
                State::Data => self.lex_data()?,
                State::Block => self.lex_block()?,
                State::Var => self.lex_var()?,
                State::String => self.lex_string()?,
                State::Interpolation => self.lex_interpolation()?,
            }
        }

        self.push_token(TokenKind::Eof, TokenValue::None);

        if let Some((expect, lineno)) = self.brackets.pop() {
            return Err(self.error_at(format!("Unclosed \"{}\"", expect), lineno));
        }

        match self.state {
            State::Var => {
                return Err(self.error_at(
                    "Unclosed \"variable\"".to_string(),
                    self.current_var_block_line,
                ));
            }
            State::Block => {
                return Err(self.error_at(
                    "Unclosed \"block\"".to_string(),
                    self.current_var_block_line,
                ));
            }
            _ => {}
        }

        Ok(TokenStream::new(self.tokens, self.name.as_deref()))
    }

    fn lex_data(&mut self) -> Result<(), LexError> {
        // skip opener positions the raw-data or comment scans already consumed
        while self.position < self.positions.len()
            && self.positions[self.position].offset < self.cursor
        {
            self.position += 1;
        }

        // no opener left: the rest of the template is plain text
        if self.position >= self.positions.len() {
            let text = self.code[self.cursor..].to_string();
            self.push_token(TokenKind::Text, TokenValue::Str(text));
            self.move_cursor(self.code.len() - self.cursor);
            return Ok(());
        }

        let pos = self.positions[self.position];
        self.position += 1;

        let raw = &self.code[self.cursor..pos.offset];
        let text = if pos.trim { raw.trim_end() } else { raw }.to_string();
        self.push_token(TokenKind::Text, TokenValue::Str(text));
        self.move_cursor(pos.offset + pos.length - self.cursor);

        match pos.kind {
            DelimKind::Comment => self.lex_comment()?,
            DelimKind::Block => {
                if let Some((tag, length)) = self.match_raw_open() {
                    self.move_cursor(length);
                    self.lex_raw_data(&tag)?;
                } else if let Some((line, length)) = self.match_line_directive() {
                    // {% line N %} resets the counter and emits nothing
                    self.move_cursor(length);
                    self.lineno = line;
                } else {
                    self.push_token(TokenKind::BlockStart, TokenValue::None);
                    self.push_state(State::Block);
                    self.current_var_block_line = self.lineno;
                }
            }
            DelimKind::Var => {
                self.push_token(TokenKind::VarStart, TokenValue::None);
                self.push_state(State::Var);
                self.current_var_block_line = self.lineno;
            }
        }
        Ok(())
    }

    fn lex_block(&mut self) -> Result<(), LexError> {
        if self.brackets.is_empty() {
            if let Some(length) = self.match_block_end() {
                self.push_token(TokenKind::BlockEnd, TokenValue::None);
                self.move_cursor(length);
                self.pop_state();
                return Ok(());
            }
        }
        self.lex_expression()
    }

    fn lex_var(&mut self) -> Result<(), LexError> {
        if self.brackets.is_empty() {
            if let Some(length) = self.match_var_end() {
                self.push_token(TokenKind::VarEnd, TokenValue::None);
                self.move_cursor(length);
                self.pop_state();
                return Ok(());
            }
        }
        self.lex_expression()
    }

    fn lex_expression(&mut self) -> Result<(), LexError> {
        // whitespace
        let ws = skip_ws(&self.code, self.cursor) - self.cursor;
        if ws > 0 {
            self.move_cursor(ws);
            if self.cursor >= self.code.len() {
                let what = if self.state == State::Block { "block" } else { "variable" };
                return Err(self.error_at(
                    format!("Unclosed \"{}\"", what),
                    self.current_var_block_line,
                ));
            }
        }

        // operators
        if let Some((canonical, length)) = self.match_operator() {
            self.push_token(TokenKind::Operator, TokenValue::Str(canonical));
            self.move_cursor(length);
            return Ok(());
        }

        // names
        if let Some(length) = match_name(&self.code[self.cursor..]) {
            let name = self.code[self.cursor..self.cursor + length].to_string();
            self.push_token(TokenKind::Name, TokenValue::Str(name));
            self.move_cursor(length);
            return Ok(());
        }

        // numbers
        if let Some((value, length)) = match_number(&self.code[self.cursor..]) {
            self.push_token(TokenKind::Number, value);
            self.move_cursor(length);
            return Ok(());
        }

        let Some(c) = self.code[self.cursor..].chars().next() else {
            return Err(self.error("Unexpected end of template".to_string()));
        };

        // punctuation, with bracket tracking
        if PUNCTUATION.contains(c) {
            if "([{".contains(c) {
                if self.brackets.len() >= MAX_BRACKET_NESTING {
                    return Err(self.error("Maximum bracket nesting level exceeded".to_string()));
                }
                self.brackets.push((c.to_string(), self.lineno));
            } else if ")]}".contains(c) {
                let Some((expect, lineno)) = self.brackets.pop() else {
                    return Err(self.error(format!("Unexpected \"{}\"", c)));
                };
                let want = match expect.as_str() {
                    "(" => ')',
                    "[" => ']',
                    _ => '}',
                };
                if c != want {
                    return Err(self.error_at(format!("Unclosed \"{}\"", expect), lineno));
                }
            }
            self.push_token(TokenKind::Punctuation, TokenValue::Str(c.to_string()));
            self.move_cursor(1);
            return Ok(());
        }

        // single-quoted strings
        if c == '\'' {
            if let Some((value, length)) = self.scan_single_quoted() {
                self.push_token(TokenKind::String, TokenValue::Str(value));
                self.move_cursor(length);
                return Ok(());
            }
            return Err(self.error(format!("Unexpected character \"{}\"", c)));
        }

        // double-quoted strings: one token when interpolation-free,
        // otherwise the String state takes over
        if c == '"' {
            if let Some((value, length)) = self.scan_simple_double_quoted() {
                self.push_token(TokenKind::String, TokenValue::Str(value));
                self.move_cursor(length);
            } else {
                self.brackets.push(("\"".to_string(), self.lineno));
                self.push_state(State::String);
                self.move_cursor(1);
            }
            return Ok(());
        }

        Err(self.error(format!("Unexpected character \"{}\"", c)))
    }

    fn lex_string(&mut self) -> Result<(), LexError> {
        let lexer = self.lexer;
        let interp_open = &lexer.delimiters.interpolation.0;

        if self.code[self.cursor..].starts_with(interp_open.as_str()) {
            self.brackets.push((interp_open.clone(), self.lineno));
            self.push_token(TokenKind::InterpolationStart, TokenValue::None);
            let end = skip_ws(&self.code, self.cursor + interp_open.len());
            self.move_cursor(end - self.cursor);
            self.push_state(State::Interpolation);
            return Ok(());
        }

        let part_len = self.scan_string_part();
        if part_len > 0 {
            let part = &self.code[self.cursor..self.cursor + part_len];
            let value = strip_c_slashes(part);
            self.push_token(TokenKind::String, TokenValue::Str(value));
            self.move_cursor(part_len);
            return Ok(());
        }

        if self.code[self.cursor..].starts_with('"') {
            self.brackets.pop();
            self.pop_state();
            self.move_cursor(1);
            return Ok(());
        }

        let c = self.code[self.cursor..].chars().next().unwrap_or('"');
        Err(self.error(format!("Unexpected character \"{}\"", c)))
    }

    fn lex_interpolation(&mut self) -> Result<(), LexError> {
        let lexer = self.lexer;
        let (open, close) = (
            &lexer.delimiters.interpolation.0,
            &lexer.delimiters.interpolation.1,
        );

        // the closer only counts when the interpolation opener is the
        // innermost bracket; otherwise `}` closes a hash literal instead
        if self.brackets.last().is_some_and(|(b, _)| b == open) {
            let i = skip_ws(&self.code, self.cursor);
            if self.code[i..].starts_with(close.as_str()) {
                self.brackets.pop();
                self.push_token(TokenKind::InterpolationEnd, TokenValue::None);
                self.move_cursor(i + close.len() - self.cursor);
                self.pop_state();
                return Ok(());
            }
        }
        self.lex_expression()
    }

    fn lex_comment(&mut self) -> Result<(), LexError> {
        let lexer = self.lexer;
        let close = &lexer.delimiters.comment.1;
        let trim = lexer.delimiters.whitespace_trim;

        let Some(rel) = self.code[self.cursor..].find(close.as_str()) else {
            return Err(self.error("Unclosed comment".to_string()));
        };
        let abs = self.cursor + rel;

        let end = if abs > self.cursor && self.code[..abs].ends_with(trim) {
            // trim variant eats all whitespace after the closer
            skip_ws(&self.code, abs + close.len())
        } else {
            let mut end = abs + close.len();
            if self.code[end..].starts_with('\n') {
                end += 1;
            }
            end
        };
        self.move_cursor(end - self.cursor);
        Ok(())
    }

    /// Copy text verbatim until the matching `{% end<tag> %}`. The span is
    /// never tokenized, so arbitrarily large raw bodies stay cheap.
    fn lex_raw_data(&mut self, tag: &str) -> Result<(), LexError> {
        let lexer = self.lexer;
        let open = &lexer.delimiters.block.0;
        let trim = lexer.delimiters.whitespace_trim;
        let end_tag = format!("end{}", tag);

        let mut search = self.cursor;
        loop {
            let Some(rel) = self.code[search..].find(open.as_str()) else {
                return Err(self.error(format!(
                    "Unexpected end of file: Unclosed \"{}\" block",
                    tag
                )));
            };
            let abs = search + rel;

            let mut i = abs + open.len();
            let open_trim = self.code[i..].starts_with(trim);
            if open_trim {
                i += trim.len_utf8();
            }
            let i = skip_ws(&self.code, i);
            if self.code[i..].starts_with(&end_tag) {
                let i = skip_ws(&self.code, i + end_tag.len());
                if let Some(close_len) = self.match_block_close_at(i, false) {
                    let mut text = self.code[self.cursor..abs].to_string();
                    if open_trim {
                        text.truncate(text.trim_end().len());
                    }
                    self.move_cursor(i + close_len - self.cursor);
                    self.push_token(TokenKind::Text, TokenValue::Str(text));
                    return Ok(());
                }
            }
            search = abs + open.len();
        }
    }

    /// `{% raw %}` / `{% verbatim %}` right after a block opener
    fn match_raw_open(&self) -> Option<(String, usize)> {
        let rest = &self.code[self.cursor..];
        let i = skip_ws(rest, 0);
        let tag = ["raw", "verbatim"]
            .into_iter()
            .find(|t| rest[i..].starts_with(t))?;
        let i = skip_ws(rest, i + tag.len());
        let close_len = self.match_block_close_at(self.cursor + i, false)?;
        Some((tag.to_string(), i + close_len))
    }

    /// `{% line N %}` right after a block opener
    fn match_line_directive(&self) -> Option<(usize, usize)> {
        let close = &self.lexer.delimiters.block.1;
        let rest = &self.code[self.cursor..];
        let mut i = skip_ws(rest, 0);
        if !rest[i..].starts_with("line") {
            return None;
        }
        i += 4;
        let j = skip_ws(rest, i);
        if j == i {
            return None;
        }
        let digits: String = rest[j..].chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return None;
        }
        let i = skip_ws(rest, j + digits.len());
        if !rest[i..].starts_with(close.as_str()) {
            return None;
        }
        let line = digits.parse().ok()?;
        Some((line, i + close.len()))
    }

    /// Anchored `%}` (optionally trim-marked) at the cursor; the plain form
    /// swallows one trailing newline.
    fn match_block_end(&self) -> Option<usize> {
        let i = skip_ws(&self.code, self.cursor);
        let close_len = self.match_block_close_at(i, true)?;
        Some(i + close_len - self.cursor)
    }

    fn match_var_end(&self) -> Option<usize> {
        let close = &self.lexer.delimiters.variable.1;
        let i = skip_ws(&self.code, self.cursor);
        let close_len = self.match_close_at(i, close, false)?;
        Some(i + close_len - self.cursor)
    }

    fn match_block_close_at(&self, at: usize, eat_newline: bool) -> Option<usize> {
        let close = self.lexer.delimiters.block.1.clone();
        self.match_close_at(at, &close, eat_newline)
    }

    /// Length of a closing delimiter at `at`: either trim-marker + closer
    /// (plus all following whitespace) or the bare closer (plus one newline
    /// when `eat_newline`).
    fn match_close_at(&self, at: usize, close: &str, eat_newline: bool) -> Option<usize> {
        let trim = self.lexer.delimiters.whitespace_trim;
        let rest = &self.code[at..];

        if rest.starts_with(trim) && rest[trim.len_utf8()..].starts_with(close) {
            let i = at + trim.len_utf8() + close.len();
            return Some(skip_ws(&self.code, i) - at);
        }
        if rest.starts_with(close) {
            let mut length = close.len();
            if eat_newline && rest[length..].starts_with('\n') {
                length += 1;
            }
            return Some(length);
        }
        None
    }

    /// Longest-first operator match with flexible interior whitespace
    /// (`is   not` lexes as `is not`). Alphabetic-ending operators need a
    /// whitespace or parenthesis boundary so `include` never lexes as `in`.
    fn match_operator(&self) -> Option<(String, usize)> {
        let rest = &self.code[self.cursor..];
        'op: for op in &self.lexer.operators {
            let mut i = 0;
            for (pi, part) in op.split(' ').enumerate() {
                if pi > 0 {
                    let j = skip_ws(rest, i);
                    if j == i {
                        continue 'op;
                    }
                    i = j;
                }
                if !rest[i..].starts_with(part) {
                    continue 'op;
                }
                i += part.len();
            }
            if op.chars().next_back().is_some_and(|c| c.is_ascii_alphabetic()) {
                match rest[i..].chars().next() {
                    Some(c) if c.is_whitespace() || c == '(' || c == ')' => {}
                    _ => continue 'op,
                }
            }
            return Some((op.clone(), i));
        }
        None
    }

    /// `'...'` with backslash escapes; `None` when unterminated
    fn scan_single_quoted(&self) -> Option<(String, usize)> {
        let s = &self.code[self.cursor..];
        let mut i = 1;
        while i < s.len() {
            if s[i..].starts_with('\\') {
                let c = s[i + 1..].chars().next()?;
                i += 1 + c.len_utf8();
            } else if s[i..].starts_with('\'') {
                return Some((strip_c_slashes(&s[1..i]), i + 1));
            } else {
                let c = s[i..].chars().next()?;
                i += c.len_utf8();
            }
        }
        None
    }

    /// `"..."` containing no unescaped interpolation opener; `None` routes
    /// the string through the String state instead.
    fn scan_simple_double_quoted(&self) -> Option<(String, usize)> {
        let s = &self.code[self.cursor..];
        let interp = &self.lexer.delimiters.interpolation.0;
        let mut i = 1;
        while i < s.len() {
            if s[i..].starts_with('\\') {
                let c = s[i + 1..].chars().next()?;
                i += 1 + c.len_utf8();
            } else if s[i..].starts_with(interp.as_str()) {
                return None;
            } else if s[i..].starts_with('"') {
                return Some((strip_c_slashes(&s[1..i]), i + 1));
            } else {
                let c = s[i..].chars().next()?;
                i += c.len_utf8();
            }
        }
        None
    }

    /// Literal run inside an interpolated string: stops at `"` or the
    /// interpolation opener; escapes pass through for later unescaping.
    fn scan_string_part(&self) -> usize {
        let s = &self.code[self.cursor..];
        let interp = &self.lexer.delimiters.interpolation.0;
        let mut i = 0;
        while i < s.len() {
            if s[i..].starts_with('\\') {
                match s[i + 1..].chars().next() {
                    Some(c) => i += 1 + c.len_utf8(),
                    // lone trailing backslash: consume it as literal text
                    None => i += 1,
                }
            } else if s[i..].starts_with('"') || s[i..].starts_with(interp.as_str()) {
                break;
            } else {
                match s[i..].chars().next() {
                    Some(c) => i += c.len_utf8(),
                    None => break,
                }
            }
        }
        i
    }

    /// Empty text tokens are never pushed
    fn push_token(&mut self, kind: TokenKind, value: TokenValue) {
        if kind == TokenKind::Text {
            if let TokenValue::Str(s) = &value {
                if s.is_empty() {
                    return;
                }
            }
        }
        self.tokens.push(Token::new(kind, value, self.lineno));
    }

    fn move_cursor(&mut self, length: usize) {
        let consumed = &self.code[self.cursor..self.cursor + length];
        self.lineno += consumed.matches('\n').count();
        self.cursor += length;
    }

    fn push_state(&mut self, state: State) {
        self.states.push(self.state);
        self.state = state;
    }

    fn pop_state(&mut self) {
        match self.states.pop() {
            Some(state) => self.state = state,
            None => panic!("cannot pop the lexer state without a previous state"),
        }
    }

    fn error(&self, message: String) -> LexError {
        LexError::new(message, self.lineno, self.name.as_deref())
    }

    fn error_at(&self, message: String, line: usize) -> LexError {
        LexError::new(message, line, self.name.as_deref())
    }
}

/// First index at or after `i` that is not whitespace
fn skip_ws(s: &str, mut i: usize) -> usize {
    while let Some(c) = s[i..].chars().next() {
        if !c.is_whitespace() {
            break;
        }
        i += c.len_utf8();
    }
    i
}

/// Whether the whole string fits the name pattern
pub(crate) fn is_name(s: &str) -> bool {
    match_name(s) == Some(s.len())
}

/// Name pattern: ASCII letter/underscore or any non-ASCII character, then
/// the same plus digits.
fn match_name(rest: &str) -> Option<usize> {
    let mut chars = rest.char_indices();
    let (_, first) = chars.next()?;
    if !(first.is_ascii_alphabetic() || first == '_' || !first.is_ascii()) {
        return None;
    }
    let mut length = first.len_utf8();
    for (idx, c) in chars {
        if c.is_ascii_alphanumeric() || c == '_' || !c.is_ascii() {
            length = idx + c.len_utf8();
        } else {
            break;
        }
    }
    Some(length)
}

/// Digits with an optional fraction; integers that overflow `i64` become
/// floats.
fn match_number(rest: &str) -> Option<(TokenValue, usize)> {
    let bytes = rest.as_bytes();
    let mut i = 0;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i == 0 {
        return None;
    }

    let mut end = i;
    if i < bytes.len() && bytes[i] == b'.' {
        let mut j = i + 1;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > i + 1 {
            end = j;
        }
    }

    let text = &rest[..end];
    let value = if end == i {
        match text.parse::<i64>() {
            Ok(n) => TokenValue::Int(n),
            Err(_) => TokenValue::Float(text.parse().ok()?),
        }
    } else {
        TokenValue::Float(text.parse().ok()?)
    };
    Some((value, end))
}

/// C-style unescaping: recognized escapes are resolved, unknown escapes drop
/// the backslash.
fn strip_c_slashes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\x0c'),
            Some('v') => out.push('\x0b'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
