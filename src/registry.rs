use std::collections::HashMap;
use std::sync::Arc;

use crate::error::SyntaxError;
use crate::lexer::token::Token;
use crate::node::Node;
use crate::parser::Parser;

/// Associativity of a binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    Left,
    Right,
}

/// Precedence and associativity; the operator symbol itself is the map key
/// and flows into the AST unchanged.
#[derive(Debug, Clone, Copy)]
pub struct BinaryOperator {
    pub precedence: u32,
    pub assoc: Assoc,
}

#[derive(Debug, Clone, Copy)]
pub struct UnaryOperator {
    pub precedence: u32,
}

/// A registered function, filter, or test. Deprecated entries still parse
/// but the resulting node is flagged with the suggested replacement.
#[derive(Debug, Clone)]
pub struct Callable {
    pub name: String,
    pub deprecated: bool,
    pub alternative: Option<String>,
}

impl Callable {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            deprecated: false,
            alternative: None,
        }
    }

    pub fn deprecated(name: &str, alternative: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            deprecated: true,
            alternative: alternative.map(str::to_string),
        }
    }
}

/// A statement handler for one tag name. The parser dispatches on the name
/// token after `{%` and hands over until the handler returns its node (or
/// nothing, for tags that only record bookkeeping).
pub trait TagParser: Send + Sync {
    /// Tag name this handler owns
    fn tag(&self) -> &str;

    fn parse(&self, parser: &mut Parser, token: &Token) -> Result<Option<Node>, SyntaxError>;
}

/// Everything pluggable in one explicit value: operator tables, tag
/// handlers, and the function/filter/test vocabulary. Built once, shared
/// immutably by the lexer and parser.
pub struct Registry {
    binary: HashMap<String, BinaryOperator>,
    unary: HashMap<String, UnaryOperator>,
    tags: HashMap<String, Arc<dyn TagParser>>,
    functions: HashMap<String, Callable>,
    filters: HashMap<String, Callable>,
    tests: HashMap<String, Callable>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            binary: HashMap::new(),
            unary: HashMap::new(),
            tags: HashMap::new(),
            functions: HashMap::new(),
            filters: HashMap::new(),
            tests: HashMap::new(),
        }
    }

    /// The standard dialect: full operator table, the built-in statement
    /// tags, and a small function/filter/test vocabulary.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        registry.register_unary_operator("not", 50);
        registry.register_unary_operator("-", 500);
        registry.register_unary_operator("+", 500);

        registry.register_binary_operator("or", 10, Assoc::Left);
        registry.register_binary_operator("and", 15, Assoc::Left);
        registry.register_binary_operator("b-or", 16, Assoc::Left);
        registry.register_binary_operator("b-xor", 17, Assoc::Left);
        registry.register_binary_operator("b-and", 18, Assoc::Left);
        registry.register_binary_operator("==", 20, Assoc::Left);
        registry.register_binary_operator("!=", 20, Assoc::Left);
        registry.register_binary_operator("<", 20, Assoc::Left);
        registry.register_binary_operator(">", 20, Assoc::Left);
        registry.register_binary_operator(">=", 20, Assoc::Left);
        registry.register_binary_operator("<=", 20, Assoc::Left);
        registry.register_binary_operator("not in", 20, Assoc::Left);
        registry.register_binary_operator("in", 20, Assoc::Left);
        registry.register_binary_operator("matches", 20, Assoc::Left);
        registry.register_binary_operator("starts with", 20, Assoc::Left);
        registry.register_binary_operator("ends with", 20, Assoc::Left);
        registry.register_binary_operator("..", 25, Assoc::Left);
        registry.register_binary_operator("+", 30, Assoc::Left);
        registry.register_binary_operator("-", 30, Assoc::Left);
        registry.register_binary_operator("~", 40, Assoc::Left);
        registry.register_binary_operator("*", 60, Assoc::Left);
        registry.register_binary_operator("/", 60, Assoc::Left);
        registry.register_binary_operator("//", 60, Assoc::Left);
        registry.register_binary_operator("%", 60, Assoc::Left);
        registry.register_binary_operator("is", 100, Assoc::Left);
        registry.register_binary_operator("is not", 100, Assoc::Left);
        registry.register_binary_operator("**", 200, Assoc::Right);
        registry.register_binary_operator("??", 300, Assoc::Right);

        for tag in crate::parser::tags::default_tag_parsers() {
            registry.register_tag(tag);
        }

        for name in ["range", "cycle", "constant", "random", "max", "min"] {
            registry.register_function(Callable::new(name));
        }
        for name in ["slice", "default", "escape", "upper", "lower", "join", "length"] {
            registry.register_filter(Callable::new(name));
        }
        for name in ["defined", "empty", "null", "even", "odd", "iterable"] {
            registry.register_test(Callable::new(name));
        }
        registry.register_test(Callable::deprecated("sameas", Some("same as")));
        registry.register_test(Callable::deprecated("divisibleby", Some("divisible by")));

        registry
    }

    pub fn register_binary_operator(&mut self, name: &str, precedence: u32, assoc: Assoc) {
        self.binary
            .insert(name.to_string(), BinaryOperator { precedence, assoc });
    }

    pub fn register_unary_operator(&mut self, name: &str, precedence: u32) {
        self.unary
            .insert(name.to_string(), UnaryOperator { precedence });
    }

    pub fn register_tag(&mut self, parser: Arc<dyn TagParser>) {
        self.tags.insert(parser.tag().to_string(), parser);
    }

    pub fn register_function(&mut self, callable: Callable) {
        self.functions.insert(callable.name.clone(), callable);
    }

    pub fn register_filter(&mut self, callable: Callable) {
        self.filters.insert(callable.name.clone(), callable);
    }

    pub fn register_test(&mut self, callable: Callable) {
        self.tests.insert(callable.name.clone(), callable);
    }

    pub fn binary_operator(&self, name: &str) -> Option<&BinaryOperator> {
        self.binary.get(name)
    }

    pub fn unary_operator(&self, name: &str) -> Option<&UnaryOperator> {
        self.unary.get(name)
    }

    pub fn tag(&self, name: &str) -> Option<Arc<dyn TagParser>> {
        self.tags.get(name).cloned()
    }

    pub fn function(&self, name: &str) -> Option<&Callable> {
        self.functions.get(name)
    }

    pub fn filter(&self, name: &str) -> Option<&Callable> {
        self.filters.get(name)
    }

    pub fn test(&self, name: &str) -> Option<&Callable> {
        self.tests.get(name)
    }

    pub fn binary_operator_names(&self) -> Vec<String> {
        Self::sorted_keys(self.binary.keys())
    }

    pub fn unary_operator_names(&self) -> Vec<String> {
        Self::sorted_keys(self.unary.keys())
    }

    pub fn tag_names(&self) -> Vec<String> {
        Self::sorted_keys(self.tags.keys())
    }

    pub fn function_names(&self) -> Vec<String> {
        Self::sorted_keys(self.functions.keys())
    }

    pub fn filter_names(&self) -> Vec<String> {
        Self::sorted_keys(self.filters.keys())
    }

    pub fn test_names(&self) -> Vec<String> {
        Self::sorted_keys(self.tests.keys())
    }

    // deterministic order for suggestion lists
    fn sorted_keys<'a>(keys: impl Iterator<Item = &'a String>) -> Vec<String> {
        let mut names: Vec<String> = keys.cloned().collect();
        names.sort();
        names
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
