use sablon::{Lexer, Node, NodeKind, Parser, Registry, SyntaxError, TokenValue, Value};

fn parse(source: &str) -> Node {
    let registry = Registry::with_defaults();
    let stream = Lexer::new(&registry)
        .tokenize(source, Some("test"))
        .expect("tokenize");
    let mut parser = Parser::new(&registry);
    parser.parse(stream).expect("parse")
}

fn parse_err(source: &str) -> SyntaxError {
    let registry = Registry::with_defaults();
    let stream = Lexer::new(&registry)
        .tokenize(source, Some("test"))
        .expect("tokenize");
    let mut parser = Parser::new(&registry);
    parser.parse(stream).expect_err("parse should fail")
}

/// The expression of a module whose body is a single print statement
fn print_expr(module: Node) -> Node {
    let NodeKind::Module { body, .. } = module.kind else {
        panic!("expected a module");
    };
    let NodeKind::Print { expr } = body.kind else {
        panic!("expected a print statement, got {:?}", body.kind);
    };
    *expr
}

fn int(node: &Node) -> i64 {
    match &node.kind {
        NodeKind::Constant {
            value: Value::Int(n),
        } => *n,
        other => panic!("expected an integer constant, got {:?}", other),
    }
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    let expr = print_expr(parse("{{ 1 + 2 * 3 }}"));
    let NodeKind::Binary { op, left, right } = expr.kind else {
        panic!("expected a binary node");
    };
    assert_eq!(op, "+");
    assert_eq!(int(&left), 1);
    let NodeKind::Binary { op, left, right } = right.kind else {
        panic!("expected a nested binary node");
    };
    assert_eq!(op, "*");
    assert_eq!(int(&left), 2);
    assert_eq!(int(&right), 3);
}

#[test]
fn parentheses_group() {
    let expr = print_expr(parse("{{ (1 + 2) * 3 }}"));
    let NodeKind::Binary { op, left, right } = expr.kind else {
        panic!("expected a binary node");
    };
    assert_eq!(op, "*");
    assert_eq!(int(&right), 3);
    assert!(matches!(left.kind, NodeKind::Binary { ref op, .. } if op == "+"));
}

#[test]
fn power_is_right_associative() {
    let expr = print_expr(parse("{{ 2 ** 3 ** 2 }}"));
    let NodeKind::Binary { op, left, right } = expr.kind else {
        panic!("expected a binary node");
    };
    assert_eq!(op, "**");
    assert_eq!(int(&left), 2);
    assert!(matches!(right.kind, NodeKind::Binary { ref op, .. } if op == "**"));
}

#[test]
fn unclosed_parenthesis_is_reported() {
    // lexically balanced so the bracket stack stays quiet
    let err = parse_err("{{ (1 2) }}");
    assert_eq!(err.raw_message(), "An opened parenthesis is not properly closed");
}

#[test]
fn interpolated_string_folds_to_concat() {
    let expr = print_expr(parse(r#"{{ "a#{b}c" }}"#));
    // ((("a") ~ b) ~ "c")
    let NodeKind::Binary { op, left, right } = expr.kind else {
        panic!("expected a binary node");
    };
    assert_eq!(op, "~");
    assert!(matches!(
        right.kind,
        NodeKind::Constant { value: Value::Str(ref s) } if s == "c"
    ));
    let NodeKind::Binary { op, left, right } = left.kind else {
        panic!("expected a nested binary node");
    };
    assert_eq!(op, "~");
    assert!(matches!(
        left.kind,
        NodeKind::Constant { value: Value::Str(ref s) } if s == "a"
    ));
    assert!(matches!(right.kind, NodeKind::Name { ref name } if name == "b"));
}

#[test]
fn adjacent_strings_are_rejected() {
    let err = parse_err(r#"{{ "a" "b" }}"#);
    assert!(err.raw_message().starts_with("Unexpected token \"string\""));
}

#[test]
fn full_ternary() {
    let expr = print_expr(parse("{{ a ? b : c }}"));
    assert!(matches!(expr.kind, NodeKind::Conditional { .. }));
}

#[test]
fn ternary_without_else_defaults_to_empty_string() {
    let expr = print_expr(parse("{{ a ? b }}"));
    let NodeKind::Conditional { otherwise, .. } = expr.kind else {
        panic!("expected a conditional");
    };
    assert!(matches!(
        otherwise.kind,
        NodeKind::Constant { value: Value::Str(ref s) } if s.is_empty()
    ));
}

#[test]
fn elvis_repeats_the_condition() {
    let expr = print_expr(parse("{{ a ?: 1 }}"));
    let NodeKind::Conditional { expr, then, .. } = expr.kind else {
        panic!("expected a conditional");
    };
    assert!(matches!(expr.kind, NodeKind::Name { ref name } if name == "a"));
    assert!(matches!(then.kind, NodeKind::Name { ref name } if name == "a"));
}

#[test]
fn array_literal_with_trailing_comma() {
    let expr = print_expr(parse("{{ [1, 2,] }}"));
    let NodeKind::Array { pairs, .. } = expr.kind else {
        panic!("expected an array");
    };
    assert_eq!(pairs.len(), 2);
    assert_eq!(int(&pairs[0].0), 0);
    assert_eq!(int(&pairs[1].0), 1);
}

#[test]
fn hash_keys_can_be_strings_names_or_numbers() {
    let expr = print_expr(parse(r#"{{ {"a": 1, b: 2, 3: "x"} }}"#));
    let NodeKind::Array { pairs, .. } = expr.kind else {
        panic!("expected an array");
    };
    assert_eq!(pairs.len(), 3);
    assert!(matches!(
        pairs[0].0.kind,
        NodeKind::Constant { value: Value::Str(ref s) } if s == "a"
    ));
    assert!(matches!(
        pairs[1].0.kind,
        NodeKind::Constant { value: Value::Str(ref s) } if s == "b"
    ));
    assert_eq!(int(&pairs[2].0), 3);
}

#[test]
fn invalid_hash_key_is_a_long_diagnostic() {
    let err = parse_err("{{ {[]: 1} }}");
    assert!(
        err.raw_message()
            .starts_with("A hash key must be a quoted string, a number, a name,")
    );
}

#[test]
fn filters_chain_left_to_right() {
    let expr = print_expr(parse("{{ a|upper|lower }}"));
    let NodeKind::Filter { node, name, .. } = expr.kind else {
        panic!("expected a filter");
    };
    assert!(matches!(
        name.kind,
        NodeKind::Constant { value: Value::Str(ref s) } if s == "lower"
    ));
    let NodeKind::Filter { name, .. } = node.kind else {
        panic!("expected a nested filter");
    };
    assert!(matches!(
        name.kind,
        NodeKind::Constant { value: Value::Str(ref s) } if s == "upper"
    ));
}

#[test]
fn unknown_filter_gets_a_suggestion() {
    let err = parse_err("{{ a|upperr }}");
    assert_eq!(
        err.raw_message(),
        "Unknown \"upperr\" filter. Did you mean \"upper\"?"
    );
}

#[test]
fn unknown_function_gets_a_suggestion() {
    let err = parse_err("{{ cycl() }}");
    assert_eq!(
        err.raw_message(),
        "Unknown \"cycl\" function. Did you mean \"cycle\"?"
    );
}

#[test]
fn unknown_function_without_a_close_match() {
    let err = parse_err("{{ foobar() }}");
    assert_eq!(err.raw_message(), "Unknown \"foobar\" function.");
    assert_eq!(
        err.to_string(),
        "Unknown \"foobar\" function in \"test\" at line 1."
    );
}

#[test]
fn dotted_subscript_is_an_any_lookup() {
    let expr = print_expr(parse("{{ a.b }}"));
    let NodeKind::GetAttr {
        attribute,
        call_type,
        ..
    } = expr.kind
    else {
        panic!("expected an attribute lookup");
    };
    assert_eq!(call_type, sablon::CallType::Any);
    assert!(matches!(
        attribute.kind,
        NodeKind::Constant { value: Value::Str(ref s) } if s == "b"
    ));
}

#[test]
fn bracket_subscript_is_an_array_lookup() {
    let expr = print_expr(parse(r#"{{ a["b"] }}"#));
    let NodeKind::GetAttr { call_type, .. } = expr.kind else {
        panic!("expected an attribute lookup");
    };
    assert_eq!(call_type, sablon::CallType::Array);
}

#[test]
fn dotted_call_is_a_method_lookup() {
    let expr = print_expr(parse("{{ a.b(1) }}"));
    let NodeKind::GetAttr {
        call_type,
        arguments,
        ..
    } = expr.kind
    else {
        panic!("expected an attribute lookup");
    };
    assert_eq!(call_type, sablon::CallType::Method);
    let NodeKind::Array { pairs, .. } = arguments.kind else {
        panic!("expected arguments collected into an array");
    };
    assert_eq!(pairs.len(), 1);
}

#[test]
fn slice_shorthand_rewrites_to_the_slice_filter() {
    let expr = print_expr(parse("{{ a[1:2] }}"));
    let NodeKind::Filter {
        name, arguments, ..
    } = expr.kind
    else {
        panic!("expected the slice filter");
    };
    assert!(matches!(
        name.kind,
        NodeKind::Constant { value: Value::Str(ref s) } if s == "slice"
    ));
    let NodeKind::Arguments { args } = arguments.kind else {
        panic!("expected arguments");
    };
    assert_eq!(int(&args[0].1), 1);
    assert_eq!(int(&args[1].1), 2);
}

#[test]
fn open_ended_slices_fill_in_defaults() {
    let expr = print_expr(parse("{{ a[:2] }}"));
    let NodeKind::Filter { arguments, .. } = expr.kind else {
        panic!("expected the slice filter");
    };
    let NodeKind::Arguments { args } = arguments.kind else {
        panic!("expected arguments");
    };
    assert_eq!(int(&args[0].1), 0);

    let expr = print_expr(parse("{{ a[2:] }}"));
    let NodeKind::Filter { arguments, .. } = expr.kind else {
        panic!("expected the slice filter");
    };
    let NodeKind::Arguments { args } = arguments.kind else {
        panic!("expected arguments");
    };
    assert!(matches!(
        args[1].1.kind,
        NodeKind::Constant { value: Value::Null }
    ));
}

#[test]
fn word_operators_read_as_names_in_value_position() {
    let expr = print_expr(parse("{{ matches }}"));
    assert!(matches!(expr.kind, NodeKind::Name { ref name } if name == "matches"));
}

#[test]
fn symbol_operators_cannot_start_an_expression() {
    let err = parse_err("{{ * 5 }}");
    assert_eq!(err.raw_message(), "Unexpected unary operator \"*\"");
}

#[test]
fn named_arguments() {
    let expr = print_expr(parse("{{ cycle(values=[1], position=0) }}"));
    let NodeKind::Function { name, arguments } = expr.kind else {
        panic!("expected a function");
    };
    assert_eq!(name, "cycle");
    let NodeKind::Arguments { args } = arguments.kind else {
        panic!("expected arguments");
    };
    assert_eq!(args[0].0.as_deref(), Some("values"));
    assert_eq!(args[1].0.as_deref(), Some("position"));
}

#[test]
fn parameter_names_must_be_names() {
    let err = parse_err("{{ cycle(1=2) }}");
    assert_eq!(
        err.raw_message(),
        "A parameter name must be a string, \"constant\" given"
    );
}

#[test]
fn deeply_nested_expressions_are_capped() {
    let source = format!("{{{{ {}1 }}}}", "not ".repeat(150));
    let err = parse_err(&source);
    assert_eq!(err.raw_message(), "Maximum nesting level exceeded");
}

#[test]
fn number_tokens_keep_their_representation() {
    let registry = Registry::with_defaults();
    let stream = Lexer::new(&registry)
        .tokenize("{{ 3 }}", None)
        .expect("tokenize");
    assert_eq!(stream.tokens()[1].value, TokenValue::Int(3));
    let expr = print_expr(parse("{{ 3.5 }}"));
    assert!(matches!(
        expr.kind,
        NodeKind::Constant {
            value: Value::Float(_)
        }
    ));
}
