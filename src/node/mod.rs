pub mod compiler;

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// A constant scalar carried by the AST
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Str(s) => write!(f, "{}", s),
        }
    }
}

/// Attribute bag for the few cross-cutting flags that do not shape a node
/// (safety, deprecation). Reading a missing attribute is a programmer error
/// and panics; structural data lives in typed [`NodeKind`] fields instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Attrs(BTreeMap<String, Value>);

impl Attrs {
    pub fn get(&self, name: &str) -> &Value {
        match self.0.get(name) {
            Some(value) => value,
            None => panic!("attribute \"{}\" does not exist", name),
        }
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.0.insert(name.to_string(), value);
    }

    pub fn has(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) {
        self.0.remove(name);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// How a `GetAttr` resolves at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CallType {
    /// attribute or array entry, whichever exists
    Any,
    /// method call
    Method,
    /// array entry only
    Array,
}

/// The shape of a node. Structural children are typed fields; every boxed
/// or listed child is itself a [`Node`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum NodeKind {
    /// Ordered sequence of statements
    Body { nodes: Vec<Node> },
    /// Literal template text
    Text { data: String },
    /// `{{ expr }}`
    Print { expr: Box<Node> },
    Constant { value: Value },
    /// Variable read
    Name { name: String },
    /// Assignment target
    AssignName { name: String },
    /// Array/hash literal as key-value pairs. `index` tracks the next
    /// synthetic integer key.
    Array { pairs: Vec<(Node, Node)>, index: i64 },
    /// Call arguments, optionally named
    Arguments { args: Vec<(Option<String>, Node)> },
    Conditional {
        expr: Box<Node>,
        then: Box<Node>,
        otherwise: Box<Node>,
    },
    Binary {
        op: String,
        left: Box<Node>,
        right: Box<Node>,
    },
    Unary { op: String, expr: Box<Node> },
    /// `obj.attr`, `obj.method(...)`, `obj[key]`
    GetAttr {
        node: Box<Node>,
        attribute: Box<Node>,
        arguments: Box<Node>,
        call_type: CallType,
    },
    /// Call of a macro through an import alias
    MethodCall {
        node: Box<Node>,
        method: String,
        arguments: Box<Node>,
    },
    Function { name: String, arguments: Box<Node> },
    /// `expr|name(args)`; the filter name is a node so visitors can rewrite it
    Filter {
        node: Box<Node>,
        name: Box<Node>,
        arguments: Box<Node>,
    },
    /// `parent()` inside a block
    Parent { name: String },
    /// Placeholder that renders a named block where it appears
    BlockReference { name: String },
    /// `block("name")`
    BlockExpression { name: Box<Node> },
    Block { name: String, body: Box<Node> },
    Macro {
        name: String,
        arguments: Box<Node>,
        body: Box<Node>,
    },
    /// A whole compiled template
    Module {
        body: Box<Node>,
        parent: Option<Box<Node>>,
        blocks: Vec<Node>,
        macros: Vec<Node>,
        traits: Vec<Node>,
        embedded: Vec<Node>,
        name: Option<String>,
        index: Option<u64>,
    },
    Set {
        names: Box<Node>,
        values: Box<Node>,
        capture: bool,
    },
    Import {
        template: Box<Node>,
        alias: Box<Node>,
    },
    /// `use "template.twig" with a as b` horizontal reuse
    TraitImport {
        template: Box<Node>,
        targets: Vec<(String, String)>,
    },
    If {
        tests: Vec<(Node, Node)>,
        otherwise: Option<Box<Node>>,
    },
    Embed {
        template: Box<Node>,
        variables: Option<Box<Node>>,
        index: u64,
    },
}

/// AST node: a typed shape, the source line it came from, and the flag bag
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub kind: NodeKind,
    pub line: usize,
    pub attrs: Attrs,
}

impl Node {
    pub fn new(kind: NodeKind, line: usize) -> Self {
        Self {
            kind,
            line,
            attrs: Attrs::default(),
        }
    }

    pub fn body(nodes: Vec<Node>, line: usize) -> Self {
        Self::new(NodeKind::Body { nodes }, line)
    }

    pub fn text(data: impl Into<String>, line: usize) -> Self {
        Self::new(NodeKind::Text { data: data.into() }, line)
    }

    pub fn print(expr: Node, line: usize) -> Self {
        Self::new(NodeKind::Print { expr: Box::new(expr) }, line)
    }

    pub fn constant(value: Value, line: usize) -> Self {
        Self::new(NodeKind::Constant { value }, line)
    }

    pub fn name(name: impl Into<String>, line: usize) -> Self {
        Self::new(NodeKind::Name { name: name.into() }, line)
    }

    pub fn assign_name(name: impl Into<String>, line: usize) -> Self {
        Self::new(NodeKind::AssignName { name: name.into() }, line)
    }

    pub fn array(line: usize) -> Self {
        Self::new(
            NodeKind::Array {
                pairs: Vec::new(),
                index: -1,
            },
            line,
        )
    }

    pub fn arguments(args: Vec<(Option<String>, Node)>, line: usize) -> Self {
        Self::new(NodeKind::Arguments { args }, line)
    }

    pub fn binary(op: impl Into<String>, left: Node, right: Node, line: usize) -> Self {
        Self::new(
            NodeKind::Binary {
                op: op.into(),
                left: Box::new(left),
                right: Box::new(right),
            },
            line,
        )
    }

    pub fn unary(op: impl Into<String>, expr: Node, line: usize) -> Self {
        Self::new(
            NodeKind::Unary {
                op: op.into(),
                expr: Box::new(expr),
            },
            line,
        )
    }

    /// Append an element to an array literal; without an explicit key the
    /// next synthetic integer key is used. No-op on other shapes.
    pub fn array_push(&mut self, key: Option<Node>, value: Node) {
        if let NodeKind::Array { pairs, index } = &mut self.kind {
            let key = match key {
                Some(key) => {
                    // explicit integer keys move the synthetic counter past
                    // them
                    if let NodeKind::Constant {
                        value: Value::Int(n),
                    } = &key.kind
                    {
                        *index = (*index).max(*n);
                    }
                    key
                }
                None => {
                    *index += 1;
                    Node::constant(Value::Int(*index), value.line)
                }
            };
            pairs.push((key, value));
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            NodeKind::Body { .. } => "body",
            NodeKind::Text { .. } => "text",
            NodeKind::Print { .. } => "print",
            NodeKind::Constant { .. } => "constant",
            NodeKind::Name { .. } => "name",
            NodeKind::AssignName { .. } => "assign name",
            NodeKind::Array { .. } => "array",
            NodeKind::Arguments { .. } => "arguments",
            NodeKind::Conditional { .. } => "conditional",
            NodeKind::Binary { .. } => "binary",
            NodeKind::Unary { .. } => "unary",
            NodeKind::GetAttr { .. } => "get attr",
            NodeKind::MethodCall { .. } => "method call",
            NodeKind::Function { .. } => "function",
            NodeKind::Filter { .. } => "filter",
            NodeKind::Parent { .. } => "parent",
            NodeKind::BlockReference { .. } => "block reference",
            NodeKind::BlockExpression { .. } => "block expression",
            NodeKind::Block { .. } => "block",
            NodeKind::Macro { .. } => "macro",
            NodeKind::Module { .. } => "module",
            NodeKind::Set { .. } => "set",
            NodeKind::Import { .. } => "import",
            NodeKind::TraitImport { .. } => "trait import",
            NodeKind::If { .. } => "if",
            NodeKind::Embed { .. } => "embed",
        }
    }

    /// All direct children, in source order
    pub fn children(&self) -> Vec<&Node> {
        let mut out = Vec::new();
        match &self.kind {
            NodeKind::Body { nodes } => out.extend(nodes),
            NodeKind::Text { .. }
            | NodeKind::Constant { .. }
            | NodeKind::Name { .. }
            | NodeKind::AssignName { .. }
            | NodeKind::Parent { .. }
            | NodeKind::BlockReference { .. } => {}
            NodeKind::Print { expr } | NodeKind::Unary { expr, .. } => out.push(expr),
            NodeKind::Array { pairs, .. } => {
                for (key, value) in pairs {
                    out.push(key);
                    out.push(value);
                }
            }
            NodeKind::Arguments { args } => out.extend(args.iter().map(|(_, node)| node)),
            NodeKind::Conditional {
                expr,
                then,
                otherwise,
            } => {
                out.push(expr);
                out.push(then);
                out.push(otherwise);
            }
            NodeKind::Binary { left, right, .. } => {
                out.push(left);
                out.push(right);
            }
            NodeKind::GetAttr {
                node,
                attribute,
                arguments,
                ..
            } => {
                out.push(node);
                out.push(attribute);
                out.push(arguments);
            }
            NodeKind::MethodCall {
                node, arguments, ..
            } => {
                out.push(node);
                out.push(arguments);
            }
            NodeKind::Function { arguments, .. } => out.push(arguments),
            NodeKind::Filter {
                node,
                name,
                arguments,
            } => {
                out.push(node);
                out.push(name);
                out.push(arguments);
            }
            NodeKind::BlockExpression { name } => out.push(name),
            NodeKind::Block { body, .. } => out.push(body),
            NodeKind::Macro {
                arguments, body, ..
            } => {
                out.push(arguments);
                out.push(body);
            }
            NodeKind::Module {
                body,
                parent,
                blocks,
                macros,
                traits,
                embedded,
                ..
            } => {
                if let Some(parent) = parent {
                    out.push(parent);
                }
                out.push(body);
                out.extend(blocks);
                out.extend(macros);
                out.extend(traits);
                out.extend(embedded);
            }
            NodeKind::Set { names, values, .. } => {
                out.push(names);
                out.push(values);
            }
            NodeKind::Import { template, alias } => {
                out.push(template);
                out.push(alias);
            }
            NodeKind::TraitImport { template, .. } => out.push(template),
            NodeKind::If { tests, otherwise } => {
                for (condition, body) in tests {
                    out.push(condition);
                    out.push(body);
                }
                if let Some(otherwise) = otherwise {
                    out.push(otherwise);
                }
            }
            NodeKind::Embed {
                template,
                variables,
                ..
            } => {
                out.push(template);
                if let Some(variables) = variables {
                    out.push(variables);
                }
            }
        }
        out
    }
}
