//! AST rewriting. Visitors see every node twice, on the way down and on the
//! way up, and run one after another over the whole tree in priority order.

use crate::node::{Node, NodeKind};

/// A tree rewriter. `enter` may substitute the node before its children are
/// visited; `leave` may substitute it afterwards or remove it by returning
/// `None`.
pub trait NodeVisitor {
    /// Visitors run in ascending priority; ties keep registration order
    fn priority(&self) -> i32 {
        0
    }

    fn enter(&mut self, node: Node) -> Node;

    fn leave(&mut self, node: Node) -> Option<Node>;
}

/// Runs visitors over a tree. Each visitor finishes the whole tree before
/// the next one starts, so a later visitor sees the earlier one's rewrites.
#[derive(Default)]
pub struct NodeTraverser {
    visitors: Vec<Box<dyn NodeVisitor>>,
}

impl NodeTraverser {
    pub fn new() -> Self {
        Self {
            visitors: Vec::new(),
        }
    }

    pub fn add_visitor(&mut self, visitor: Box<dyn NodeVisitor>) {
        self.visitors.push(visitor);
    }

    /// `None` when a visitor removed the root itself
    pub fn traverse(&mut self, node: Node) -> Option<Node> {
        self.visitors.sort_by_key(|visitor| visitor.priority());

        let mut node = Some(node);
        for visitor in &mut self.visitors {
            match node.take() {
                Some(current) => node = traverse_with(visitor.as_mut(), current),
                None => break,
            }
        }
        node
    }
}

fn traverse_with(visitor: &mut dyn NodeVisitor, node: Node) -> Option<Node> {
    let node = visitor.enter(node);
    let node = traverse_children(visitor, node);
    visitor.leave(node)
}

/// Rebuild the node with every child visited. Children in lists disappear
/// when removed; optional children become absent; removing a child the
/// shape cannot lose is a visitor bug.
fn traverse_children(visitor: &mut dyn NodeVisitor, node: Node) -> Node {
    let Node { kind, line, attrs } = node;
    let kind = match kind {
        NodeKind::Text { .. }
        | NodeKind::Constant { .. }
        | NodeKind::Name { .. }
        | NodeKind::AssignName { .. }
        | NodeKind::Parent { .. }
        | NodeKind::BlockReference { .. } => kind,
        NodeKind::Body { nodes } => NodeKind::Body {
            nodes: visit_list(visitor, nodes),
        },
        NodeKind::Print { expr } => NodeKind::Print {
            expr: visit_required(visitor, expr, "print expression"),
        },
        NodeKind::Array { pairs, index } => NodeKind::Array {
            pairs: visit_pairs(visitor, pairs),
            index,
        },
        NodeKind::Arguments { args } => NodeKind::Arguments {
            args: args
                .into_iter()
                .filter_map(|(name, value)| Some((name, traverse_with(visitor, value)?)))
                .collect(),
        },
        NodeKind::Conditional {
            expr,
            then,
            otherwise,
        } => NodeKind::Conditional {
            expr: visit_required(visitor, expr, "condition"),
            then: visit_required(visitor, then, "then branch"),
            otherwise: visit_required(visitor, otherwise, "else branch"),
        },
        NodeKind::Binary { op, left, right } => NodeKind::Binary {
            op,
            left: visit_required(visitor, left, "left operand"),
            right: visit_required(visitor, right, "right operand"),
        },
        NodeKind::Unary { op, expr } => NodeKind::Unary {
            op,
            expr: visit_required(visitor, expr, "operand"),
        },
        NodeKind::GetAttr {
            node,
            attribute,
            arguments,
            call_type,
        } => NodeKind::GetAttr {
            node: visit_required(visitor, node, "target"),
            attribute: visit_required(visitor, attribute, "attribute"),
            arguments: visit_required(visitor, arguments, "arguments"),
            call_type,
        },
        NodeKind::MethodCall {
            node,
            method,
            arguments,
        } => NodeKind::MethodCall {
            node: visit_required(visitor, node, "target"),
            method,
            arguments: visit_required(visitor, arguments, "arguments"),
        },
        NodeKind::Function { name, arguments } => NodeKind::Function {
            name,
            arguments: visit_required(visitor, arguments, "arguments"),
        },
        NodeKind::Filter {
            node,
            name,
            arguments,
        } => NodeKind::Filter {
            node: visit_required(visitor, node, "filtered value"),
            name: visit_required(visitor, name, "filter name"),
            arguments: visit_required(visitor, arguments, "arguments"),
        },
        NodeKind::BlockExpression { name } => NodeKind::BlockExpression {
            name: visit_required(visitor, name, "block name"),
        },
        NodeKind::Block { name, body } => NodeKind::Block {
            name,
            body: visit_required(visitor, body, "block body"),
        },
        NodeKind::Macro {
            name,
            arguments,
            body,
        } => NodeKind::Macro {
            name,
            arguments: visit_required(visitor, arguments, "arguments"),
            body: visit_required(visitor, body, "macro body"),
        },
        NodeKind::Module {
            body,
            parent,
            blocks,
            macros,
            traits,
            embedded,
            name,
            index,
        } => NodeKind::Module {
            body: visit_required(visitor, body, "module body"),
            parent: visit_optional(visitor, parent),
            blocks: visit_list(visitor, blocks),
            macros: visit_list(visitor, macros),
            traits: visit_list(visitor, traits),
            embedded: visit_list(visitor, embedded),
            name,
            index,
        },
        NodeKind::Set {
            names,
            values,
            capture,
        } => NodeKind::Set {
            names: visit_required(visitor, names, "set targets"),
            values: visit_required(visitor, values, "set values"),
            capture,
        },
        NodeKind::Import { template, alias } => NodeKind::Import {
            template: visit_required(visitor, template, "template"),
            alias: visit_required(visitor, alias, "alias"),
        },
        NodeKind::TraitImport { template, targets } => NodeKind::TraitImport {
            template: visit_required(visitor, template, "template"),
            targets,
        },
        NodeKind::If { tests, otherwise } => NodeKind::If {
            tests: visit_pairs(visitor, tests),
            otherwise: visit_optional(visitor, otherwise),
        },
        NodeKind::Embed {
            template,
            variables,
            index,
        } => NodeKind::Embed {
            template: visit_required(visitor, template, "template"),
            variables: visit_optional(visitor, variables),
            index,
        },
    };
    Node { kind, line, attrs }
}

fn visit_required(visitor: &mut dyn NodeVisitor, node: Box<Node>, slot: &str) -> Box<Node> {
    match traverse_with(visitor, *node) {
        Some(node) => Box::new(node),
        None => panic!("a visitor cannot remove the {} of a node", slot),
    }
}

fn visit_optional(visitor: &mut dyn NodeVisitor, node: Option<Box<Node>>) -> Option<Box<Node>> {
    node.and_then(|node| traverse_with(visitor, *node)).map(Box::new)
}

fn visit_list(visitor: &mut dyn NodeVisitor, nodes: Vec<Node>) -> Vec<Node> {
    nodes
        .into_iter()
        .filter_map(|node| traverse_with(visitor, node))
        .collect()
}

/// Either half going away drops the whole pair
fn visit_pairs(visitor: &mut dyn NodeVisitor, pairs: Vec<(Node, Node)>) -> Vec<(Node, Node)> {
    pairs
        .into_iter()
        .filter_map(|(a, b)| {
            let a = traverse_with(visitor, a)?;
            let b = traverse_with(visitor, b)?;
            Some((a, b))
        })
        .collect()
}
