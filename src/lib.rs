//! Sablon is the front end of a template compiler for a Twig-style
//! language: a state-machine lexer, a pluggable operator/tag registry, a
//! precedence-climbing expression parser, a re-entrant statement parser,
//! and a priority-ordered AST rewriting pass.
//!
//! ```no_run
//! use sablon::{Pipeline, Registry};
//!
//! let registry = Registry::with_defaults();
//! let mut pipeline = Pipeline::new(&registry);
//! let module = pipeline.parse("Hello {{ name }}!", Some("greeting"))?;
//! println!("{}", module.compile_to_string());
//! # Ok::<(), sablon::CompileError>(())
//! ```

pub mod error;
pub mod lexer;
pub mod node;
pub mod parser;
pub mod registry;
pub mod transform;

pub use error::{CompileError, LexError, SyntaxError};
pub use lexer::stream::TokenStream;
pub use lexer::token::{Token, TokenKind, TokenValue};
pub use lexer::{Delimiters, Lexer};
pub use node::compiler::Compiler;
pub use node::{Attrs, CallType, Node, NodeKind, Value};
pub use parser::{EndTest, ImportedSymbol, Parser};
pub use registry::{Assoc, BinaryOperator, Callable, Registry, TagParser, UnaryOperator};
pub use transform::{NodeTraverser, NodeVisitor};

/// The whole front end over one registry: tokenize, parse, rewrite, emit
pub struct Pipeline<'r> {
    registry: &'r Registry,
    lexer: Lexer,
    traverser: NodeTraverser,
}

impl<'r> Pipeline<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            lexer: Lexer::new(registry),
            traverser: NodeTraverser::new(),
        }
    }

    pub fn add_visitor(&mut self, visitor: Box<dyn NodeVisitor>) {
        self.traverser.add_visitor(visitor);
    }

    pub fn tokenize(&self, source: &str, name: Option<&str>) -> Result<TokenStream, LexError> {
        self.lexer.tokenize(source, name)
    }

    /// Lex and parse a template, then run the registered visitors over the
    /// module. A visitor that removes the root leaves an empty body.
    pub fn parse(&mut self, source: &str, name: Option<&str>) -> Result<Node, CompileError> {
        let stream = self.lexer.tokenize(source, name)?;
        let mut parser = Parser::new(self.registry);
        let module = parser.parse(stream)?;
        Ok(self
            .traverser
            .traverse(module)
            .unwrap_or_else(|| Node::body(Vec::new(), 1)))
    }

    pub fn compile(&mut self, source: &str, name: Option<&str>) -> Result<String, CompileError> {
        Ok(self.parse(source, name)?.compile_to_string())
    }
}
