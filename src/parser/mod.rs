pub mod expression;
pub mod tags;

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::SyntaxError;
use crate::lexer::stream::TokenStream;
use crate::lexer::token::{Token, TokenKind, TokenValue};
use crate::node::{Node, NodeKind};
use crate::registry::Registry;

/// Expressions and tags nest by recursion, several stack frames per level;
/// the guard must raise a structured error long before the call stack runs
/// out.
const MAX_NESTING_DEPTH: usize = 100;

/// Decides where a nested `subparse` stops: `test` recognizes the closing
/// tag, `tag` names the construct for diagnostics.
pub struct EndTest<'a> {
    pub tag: &'a str,
    pub test: &'a dyn Fn(&Token) -> bool,
}

/// A symbol brought into scope by `import` or `from`
#[derive(Debug, Clone)]
pub struct ImportedSymbol {
    /// method name on the source template, for `from` imports
    pub name: Option<String>,
    /// expression the source template was bound to
    pub node: Option<Node>,
}

/// Everything a single template parse accumulates. Parsing an embedded
/// template swaps in a fresh state and restores the enclosing one
/// afterwards, so nested templates never leak blocks or macros into each
/// other.
struct ParserState {
    stream: TokenStream,
    parent: Option<Node>,
    blocks: Vec<(String, Node)>,
    block_stack: Vec<String>,
    macros: Vec<(String, Node)>,
    traits: Vec<Node>,
    embedded: Vec<Node>,
    /// innermost-last scopes of kind -> alias -> symbol
    imported_symbols: Vec<Vec<(String, String, ImportedSymbol)>>,
}

impl ParserState {
    fn new(stream: TokenStream) -> Self {
        Self {
            stream,
            parent: None,
            blocks: Vec::new(),
            block_stack: Vec::new(),
            macros: Vec::new(),
            traits: Vec::new(),
            embedded: Vec::new(),
            imported_symbols: vec![Vec::new()],
        }
    }
}

fn empty_stream(name: Option<&str>) -> TokenStream {
    TokenStream::new(vec![Token::new(TokenKind::Eof, TokenValue::None, 1)], name)
}

static EMBED_SEED: OnceLock<u64> = OnceLock::new();
static EMBED_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Process-unique discriminator for embedded templates
fn next_embed_index() -> u64 {
    let seed = *EMBED_SEED.get_or_init(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    });
    seed.wrapping_add(EMBED_COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// Statement parser. Dispatches `{% %}` tags to the registry's handlers,
/// hands expressions to the expression methods, and assembles the final
/// `Module` node.
pub struct Parser<'r> {
    registry: &'r Registry,
    state: ParserState,
    depth: usize,
    temp_names: u64,
}

impl<'r> Parser<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            state: ParserState::new(empty_stream(None)),
            depth: 0,
            temp_names: 0,
        }
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// Parse a whole token stream into a `Module` node
    pub fn parse(&mut self, stream: TokenStream) -> Result<Node, SyntaxError> {
        let saved = std::mem::replace(&mut self.state, ParserState::new(stream));
        let result = self.do_parse(None, false);
        self.state = saved;
        result
    }

    /// Parse an embedded template sharing the enclosing stream's cursor.
    /// Used by the `embed` tag; the cursor advances for both templates.
    pub fn parse_nested(
        &mut self,
        end_test: Option<&EndTest>,
        drop_needle: bool,
    ) -> Result<Node, SyntaxError> {
        let name = self.state.stream.name().map(str::to_string);
        let stream = std::mem::replace(&mut self.state.stream, empty_stream(name.as_deref()));
        let saved = std::mem::replace(&mut self.state, ParserState::new(stream));
        let result = self.do_parse(end_test, drop_needle);
        let inner = std::mem::replace(&mut self.state, saved);
        self.state.stream = inner.stream;
        result
    }

    fn do_parse(
        &mut self,
        end_test: Option<&EndTest>,
        drop_needle: bool,
    ) -> Result<Node, SyntaxError> {
        let line = self.state.stream.current().line;

        let mut body = match self.subparse(end_test, drop_needle) {
            Ok(body) => body,
            Err(mut err) => {
                // fill in what the raising site did not know
                if err.template_name().is_none() {
                    if let Some(name) = self.state.stream.name() {
                        err.set_template_name(name);
                    }
                }
                if err.line().is_none() {
                    err.set_template_line(self.state.stream.current().line);
                }
                return Err(err);
            }
        };

        if self.state.parent.is_some() {
            body = match self.filter_body_nodes(body)? {
                Some(body) => body,
                None => Node::body(Vec::new(), line),
            };
        }

        let module = Node::new(
            NodeKind::Module {
                body: Box::new(body),
                parent: self.state.parent.take().map(Box::new),
                blocks: self.state.blocks.drain(..).map(|(_, node)| node).collect(),
                macros: self.state.macros.drain(..).map(|(_, node)| node).collect(),
                traits: std::mem::take(&mut self.state.traits),
                embedded: std::mem::take(&mut self.state.embedded),
                name: self.state.stream.name().map(str::to_string),
                index: None,
            },
            1,
        );
        Ok(module)
    }

    /// Statement loop: text, prints, and tags until EOF or the end test
    pub fn subparse(
        &mut self,
        end_test: Option<&EndTest>,
        drop_needle: bool,
    ) -> Result<Node, SyntaxError> {
        let line = self.state.stream.current().line;
        let mut rv: Vec<Node> = Vec::new();

        while !self.state.stream.is_eof() {
            match self.state.stream.current().kind {
                TokenKind::Text => {
                    let token = self.state.stream.next()?;
                    rv.push(Node::text(token.value_str(), token.line));
                }
                TokenKind::VarStart => {
                    let token = self.state.stream.next()?;
                    let expr = self.parse_expression(0)?;
                    self.state.stream.expect(TokenKind::VarEnd, None, None)?;
                    rv.push(Node::print(expr, token.line));
                }
                TokenKind::BlockStart => {
                    self.state.stream.next()?;
                    let token = self.state.stream.current().clone();

                    if token.kind != TokenKind::Name {
                        return Err(self.error("A block must start with a tag name", Some(token.line)));
                    }

                    if let Some(end_test) = end_test {
                        if (end_test.test)(&token) {
                            if drop_needle {
                                self.state.stream.next()?;
                            }
                            return Ok(Self::unwrap_body(rv, line));
                        }
                    }

                    let Some(handler) = self.registry.tag(token.value_str()) else {
                        return Err(self.unknown_tag_error(&token, end_test, line));
                    };

                    self.state.stream.next()?;
                    self.enter_recursion()?;
                    let parsed = handler.parse(self, &token);
                    self.leave_recursion();
                    if let Some(node) = parsed? {
                        rv.push(node);
                    }
                }
                _ => {
                    return Err(self.error("Lexer or parser ended up in unsupported state.", None));
                }
            }
        }

        Ok(Self::unwrap_body(rv, line))
    }

    fn unwrap_body(mut rv: Vec<Node>, line: usize) -> Node {
        if rv.len() == 1 {
            rv.remove(0)
        } else {
            Node::body(rv, line)
        }
    }

    fn unknown_tag_error(
        &self,
        token: &Token,
        end_test: Option<&EndTest>,
        opened_line: usize,
    ) -> SyntaxError {
        match end_test {
            Some(end_test) => {
                let mut err = self.error(
                    format!("Unexpected \"{}\" tag", token.value_str()),
                    Some(token.line),
                );
                err.append_message(&format!(
                    " (expecting closing tag for the \"{}\" tag defined near line {}).",
                    end_test.tag, opened_line
                ));
                err
            }
            None => {
                let mut err = self.error(
                    format!("Unknown \"{}\" tag.", token.value_str()),
                    Some(token.line),
                );
                err.add_suggestions(token.value_str(), &self.registry.tag_names());
                err
            }
        }
    }

    /// With a parent template the body may only contain whitespace, block
    /// placeholders, and `set` statements; everything else is an error or
    /// gets dropped.
    fn filter_body_nodes(&self, node: Node) -> Result<Option<Node>, SyntaxError> {
        let err_worthy = match &node.kind {
            NodeKind::Text { data } => !data.chars().all(char::is_whitespace),
            NodeKind::BlockReference { .. } => false,
            _ => Self::is_output_node(&node),
        };
        if err_worthy {
            let bom = matches!(&node.kind, NodeKind::Text { data } if data.contains('\u{feff}'));
            let message = if bom {
                "A template that extends another one cannot have a body but a byte order mark (BOM) has been detected; it must be removed."
            } else {
                "A template that extends another one cannot have a body."
            };
            return Err(self.error(message, Some(node.line)));
        }

        if matches!(node.kind, NodeKind::Set { .. }) {
            return Ok(Some(node));
        }
        if Self::is_output_node(&node) {
            return Ok(None);
        }

        // statement containers are filtered recursively, so body text stays
        // forbidden inside nested tags too
        let Node { kind, line, attrs } = node;
        let kind = match kind {
            NodeKind::Body { nodes } => {
                let mut kept = Vec::new();
                for child in nodes {
                    if let Some(child) = self.filter_body_nodes(child)? {
                        kept.push(child);
                    }
                }
                NodeKind::Body { nodes: kept }
            }
            NodeKind::If { tests, otherwise } => {
                let mut filtered = Vec::with_capacity(tests.len());
                for (condition, body) in tests {
                    let body_line = body.line;
                    let body = self
                        .filter_body_nodes(body)?
                        .unwrap_or_else(|| Node::body(Vec::new(), body_line));
                    filtered.push((condition, body));
                }
                let otherwise = match otherwise {
                    Some(body) => self.filter_body_nodes(*body)?.map(Box::new),
                    None => None,
                };
                NodeKind::If {
                    tests: filtered,
                    otherwise,
                }
            }
            other => other,
        };
        Ok(Some(Node { kind, line, attrs }))
    }

    fn is_output_node(node: &Node) -> bool {
        matches!(
            node.kind,
            NodeKind::Text { .. }
                | NodeKind::Print { .. }
                | NodeKind::BlockReference { .. }
                | NodeKind::Embed { .. }
        )
    }

    // --- stream access -----------------------------------------------------

    pub fn stream(&self) -> &TokenStream {
        &self.state.stream
    }

    pub fn stream_mut(&mut self) -> &mut TokenStream {
        &mut self.state.stream
    }

    pub fn current_token(&self) -> Token {
        self.state.stream.current().clone()
    }

    // --- template bookkeeping ----------------------------------------------

    pub fn parent(&self) -> Option<&Node> {
        self.state.parent.as_ref()
    }

    pub fn set_parent(&mut self, parent: Node) {
        self.state.parent = Some(parent);
    }

    pub fn has_block(&self, name: &str) -> bool {
        self.state.blocks.iter().any(|(n, _)| n == name)
    }

    pub fn block(&self, name: &str) -> Option<&Node> {
        self.state
            .blocks
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, node)| node)
    }

    pub fn set_block(&mut self, name: &str, node: Node) {
        if let Some(slot) = self.state.blocks.iter_mut().find(|(n, _)| n == name) {
            slot.1 = node;
        } else {
            self.state.blocks.push((name.to_string(), node));
        }
    }

    pub fn push_block_stack(&mut self, name: &str) {
        self.state.block_stack.push(name.to_string());
    }

    pub fn pop_block_stack(&mut self) {
        self.state.block_stack.pop();
    }

    pub fn peek_block_stack(&self) -> Option<&str> {
        self.state.block_stack.last().map(String::as_str)
    }

    pub fn has_macro(&self, name: &str) -> bool {
        self.state.macros.iter().any(|(n, _)| n == name)
    }

    pub fn set_macro(&mut self, name: &str, node: Node) {
        self.state.macros.push((name.to_string(), node));
    }

    pub fn add_trait(&mut self, node: Node) {
        self.state.traits.push(node);
    }

    pub fn has_traits(&self) -> bool {
        !self.state.traits.is_empty()
    }

    /// Record an embedded module, give it its discriminator, and return it
    pub fn embed_template(&mut self, mut module: Node) -> Result<u64, SyntaxError> {
        let index = next_embed_index();
        if let NodeKind::Module {
            index: module_index,
            ..
        } = &mut module.kind
        {
            *module_index = Some(index);
        }
        self.state.embedded.push(module);
        Ok(index)
    }

    // --- imported symbols ---------------------------------------------------

    pub fn add_imported_symbol(
        &mut self,
        kind: &str,
        alias: &str,
        name: Option<&str>,
        node: Option<Node>,
    ) {
        let symbol = ImportedSymbol {
            name: name.map(str::to_string),
            node,
        };
        if let Some(scope) = self.state.imported_symbols.last_mut() {
            scope.push((kind.to_string(), alias.to_string(), symbol));
        }
    }

    /// Innermost definition wins
    pub fn imported_symbol(&self, kind: &str, alias: &str) -> Option<ImportedSymbol> {
        for scope in self.state.imported_symbols.iter().rev() {
            for (k, a, symbol) in scope.iter().rev() {
                if k == kind && a == alias {
                    return Some(symbol.clone());
                }
            }
        }
        None
    }

    pub fn is_main_scope(&self) -> bool {
        self.state.imported_symbols.len() == 1
    }

    pub fn push_local_scope(&mut self) {
        self.state.imported_symbols.push(Vec::new());
    }

    pub fn pop_local_scope(&mut self) {
        self.state.imported_symbols.pop();
    }

    /// A fresh name no template author can collide with
    pub fn var_name(&mut self) -> String {
        self.temp_names += 1;
        format!("__internal_{}", self.temp_names)
    }

    // --- helpers ------------------------------------------------------------

    pub(crate) fn error(&self, message: impl Into<String>, line: Option<usize>) -> SyntaxError {
        SyntaxError::new(message, line, self.state.stream.name())
    }

    pub(crate) fn enter_recursion(&mut self) -> Result<(), SyntaxError> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            let line = self.state.stream.current().line;
            return Err(self.error("Maximum nesting level exceeded", Some(line)));
        }
        Ok(())
    }

    pub(crate) fn leave_recursion(&mut self) {
        self.depth -= 1;
    }
}
