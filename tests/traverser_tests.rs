use std::cell::RefCell;
use std::rc::Rc;

use sablon::{
    Lexer, Node, NodeKind, NodeTraverser, NodeVisitor, Parser, Registry, Value,
};

fn parse(source: &str) -> Node {
    let registry = Registry::with_defaults();
    let stream = Lexer::new(&registry)
        .tokenize(source, Some("test"))
        .expect("tokenize");
    let mut parser = Parser::new(&registry);
    parser.parse(stream).expect("parse")
}

/// Records its label every time it enters a module
struct Recorder {
    label: &'static str,
    priority: i32,
    log: Rc<RefCell<Vec<&'static str>>>,
}

impl NodeVisitor for Recorder {
    fn priority(&self) -> i32 {
        self.priority
    }

    fn enter(&mut self, node: Node) -> Node {
        if matches!(node.kind, NodeKind::Module { .. }) {
            self.log.borrow_mut().push(self.label);
        }
        node
    }

    fn leave(&mut self, node: Node) -> Option<Node> {
        Some(node)
    }
}

/// Uppercases every text node on enter
struct UppercaseText;

impl NodeVisitor for UppercaseText {
    fn enter(&mut self, mut node: Node) -> Node {
        if let NodeKind::Text { data } = &mut node.kind {
            *data = data.to_uppercase();
        }
        node
    }

    fn leave(&mut self, node: Node) -> Option<Node> {
        Some(node)
    }
}

/// Removes every text node on leave
struct DropText;

impl NodeVisitor for DropText {
    fn enter(&mut self, node: Node) -> Node {
        node
    }

    fn leave(&mut self, node: Node) -> Option<Node> {
        if matches!(node.kind, NodeKind::Text { .. }) {
            None
        } else {
            Some(node)
        }
    }
}

/// Removes the root module itself
struct DropModule;

impl NodeVisitor for DropModule {
    fn enter(&mut self, node: Node) -> Node {
        node
    }

    fn leave(&mut self, node: Node) -> Option<Node> {
        if matches!(node.kind, NodeKind::Module { .. }) {
            None
        } else {
            Some(node)
        }
    }
}

#[test]
fn no_visitors_means_no_changes() {
    let module = parse("a{{ b }}c");
    let mut traverser = NodeTraverser::new();
    let result = traverser.traverse(module.clone());
    assert_eq!(result, Some(module));
}

#[test]
fn visitors_run_in_priority_order() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut traverser = NodeTraverser::new();
    traverser.add_visitor(Box::new(Recorder {
        label: "late",
        priority: 10,
        log: Rc::clone(&log),
    }));
    traverser.add_visitor(Box::new(Recorder {
        label: "early",
        priority: -5,
        log: Rc::clone(&log),
    }));

    traverser.traverse(parse("x"));
    assert_eq!(*log.borrow(), vec!["early", "late"]);
}

#[test]
fn enter_substitutes_before_children_are_visited() {
    let module = parse("hello");
    let mut traverser = NodeTraverser::new();
    traverser.add_visitor(Box::new(UppercaseText));

    let result = traverser.traverse(module).expect("root survives");
    assert!(result.compile_to_string().contains("echo \"HELLO\";"));
}

#[test]
fn leave_removal_drops_list_children() {
    let module = parse("a{{ b }}c");
    let mut traverser = NodeTraverser::new();
    traverser.add_visitor(Box::new(DropText));

    let result = traverser.traverse(module).expect("root survives");
    let NodeKind::Module { body, .. } = result.kind else {
        panic!("expected a module");
    };
    let NodeKind::Body { nodes } = body.kind else {
        panic!("expected a body");
    };
    assert_eq!(nodes.len(), 1);
    assert!(matches!(nodes[0].kind, NodeKind::Print { .. }));
}

#[test]
fn removed_nodes_leave_no_trace_in_the_output() {
    let module = parse("a{{ 1 }}c");
    let mut traverser = NodeTraverser::new();
    traverser.add_visitor(Box::new(DropText));

    let result = traverser.traverse(module).expect("root survives");
    let compiled = result.compile_to_string();
    assert!(!compiled.contains("\"a\""));
    assert!(!compiled.contains("\"c\""));
    assert!(compiled.contains("echo 1;"));
}

#[test]
fn the_root_itself_can_be_removed() {
    let module = parse("x");
    let mut traverser = NodeTraverser::new();
    traverser.add_visitor(Box::new(DropModule));
    assert_eq!(traverser.traverse(module), None);
}

#[test]
fn later_visitors_see_earlier_rewrites() {
    let module = parse("hello{{ b }}");
    let mut traverser = NodeTraverser::new();
    // DropText runs first; UppercaseText must not see the dropped node
    traverser.add_visitor(Box::new(DropText));
    traverser.add_visitor(Box::new(UppercaseText));

    let result = traverser.traverse(module).expect("root survives");
    assert!(!result.compile_to_string().contains("HELLO"));
}

#[test]
fn hash_pairs_drop_whole_when_the_value_goes() {
    // removing constants from an array drops key and value together
    struct DropInts;
    impl NodeVisitor for DropInts {
        fn enter(&mut self, node: Node) -> Node {
            node
        }
        fn leave(&mut self, node: Node) -> Option<Node> {
            match node.kind {
                NodeKind::Constant {
                    value: Value::Int(_),
                } => None,
                _ => Some(node),
            }
        }
    }

    let module = parse(r#"{{ {"a": 1, "b": "x"} }}"#);
    let mut traverser = NodeTraverser::new();
    traverser.add_visitor(Box::new(DropInts));

    let result = traverser.traverse(module).expect("root survives");
    let NodeKind::Module { body, .. } = result.kind else {
        panic!("expected a module");
    };
    let NodeKind::Print { expr } = body.kind else {
        panic!("expected a print statement");
    };
    let NodeKind::Array { pairs, .. } = expr.kind else {
        panic!("expected an array");
    };
    assert_eq!(pairs.len(), 1);
}
