//! Expression parsing: precedence climbing over the registry's operator
//! tables, primaries, literals, and the postfix chain (subscripts, calls,
//! filters).

use super::Parser;
use crate::error::SyntaxError;
use crate::lexer::is_name;
use crate::lexer::token::{TokenKind, TokenValue};
use crate::node::{CallType, Node, NodeKind, Value};
use crate::registry::Assoc;

impl Parser<'_> {
    /// Parse an expression, consuming binary operators of at least
    /// `precedence`. `0` parses a full expression including ternaries.
    pub fn parse_expression(&mut self, precedence: u32) -> Result<Node, SyntaxError> {
        self.enter_recursion()?;
        let result = self.parse_expression_inner(precedence);
        self.leave_recursion();
        result
    }

    fn parse_expression_inner(&mut self, precedence: u32) -> Result<Node, SyntaxError> {
        let registry = self.registry();
        let mut expr = self.get_primary()?;

        loop {
            let token = self.current_token();
            if token.kind != TokenKind::Operator {
                break;
            }
            let Some(op) = registry.binary_operator(token.value_str()).copied() else {
                break;
            };
            if op.precedence < precedence {
                break;
            }
            self.stream_mut().next()?;
            let right = match op.assoc {
                Assoc::Left => self.parse_expression(op.precedence + 1)?,
                Assoc::Right => self.parse_expression(op.precedence)?,
            };
            expr = Node::binary(token.value_str(), expr, right, token.line);
        }

        if precedence == 0 {
            return self.parse_conditional_expression(expr);
        }
        Ok(expr)
    }

    /// `a ? b : c`, plus the short forms `a ? b` and `a ?: c`
    fn parse_conditional_expression(&mut self, mut expr: Node) -> Result<Node, SyntaxError> {
        while self
            .stream_mut()
            .next_if(TokenKind::Punctuation, Some("?"))
            .is_some()
        {
            let (then, otherwise);
            if self
                .stream_mut()
                .next_if(TokenKind::Punctuation, Some(":"))
                .is_none()
            {
                then = self.parse_expression(0)?;
                if self
                    .stream_mut()
                    .next_if(TokenKind::Punctuation, Some(":"))
                    .is_some()
                {
                    otherwise = self.parse_expression(0)?;
                } else {
                    otherwise =
                        Node::constant(Value::Str(String::new()), self.current_token().line);
                }
            } else {
                then = expr.clone();
                otherwise = self.parse_expression(0)?;
            }
            let line = self.current_token().line;
            expr = Node::new(
                NodeKind::Conditional {
                    expr: Box::new(expr),
                    then: Box::new(then),
                    otherwise: Box::new(otherwise),
                },
                line,
            );
        }
        Ok(expr)
    }

    /// Unary operators, parenthesized groups, or a primary, each with its
    /// postfix chain
    fn get_primary(&mut self) -> Result<Node, SyntaxError> {
        let token = self.current_token();

        if token.kind == TokenKind::Operator {
            if let Some(op) = self.registry().unary_operator(token.value_str()).copied() {
                self.stream_mut().next()?;
                let expr = self.parse_expression(op.precedence)?;
                let node = Node::unary(token.value_str(), expr, token.line);
                return self.parse_postfix_expression(node);
            }
        }

        if token.is_value(TokenKind::Punctuation, "(") {
            self.stream_mut().next()?;
            let expr = self.parse_expression(0)?;
            if self
                .stream_mut()
                .next_if(TokenKind::Punctuation, Some(")"))
                .is_none()
            {
                return Err(self.error(
                    "An opened parenthesis is not properly closed",
                    Some(token.line),
                ));
            }
            return self.parse_postfix_expression(expr);
        }

        self.parse_primary_expression()
    }

    fn parse_primary_expression(&mut self) -> Result<Node, SyntaxError> {
        let token = self.current_token();
        let node = match token.kind {
            TokenKind::Name => {
                self.stream_mut().next()?;
                match token.value_str() {
                    "true" | "TRUE" => Node::constant(Value::Bool(true), token.line),
                    "false" | "FALSE" => Node::constant(Value::Bool(false), token.line),
                    "none" | "NONE" | "null" | "NULL" => Node::constant(Value::Null, token.line),
                    name => {
                        if self.current_token().is_value(TokenKind::Punctuation, "(") {
                            self.get_function_node(name, token.line)?
                        } else {
                            Node::name(name, token.line)
                        }
                    }
                }
            }
            TokenKind::Number => {
                self.stream_mut().next()?;
                let value = match token.value {
                    TokenValue::Int(n) => Value::Int(n),
                    TokenValue::Float(x) => Value::Float(x),
                    _ => Value::Null,
                };
                Node::constant(value, token.line)
            }
            TokenKind::String | TokenKind::InterpolationStart => self.parse_string_expression()?,
            TokenKind::Operator => {
                if is_name(token.value_str()) {
                    // word operators double as variable names outside
                    // operator position
                    self.stream_mut().next()?;
                    Node::name(token.value_str(), token.line)
                } else if token.value_str() == "-" || token.value_str() == "+" {
                    // sign in constant position, e.g. an argument default
                    self.stream_mut().next()?;
                    let expr = self.parse_primary_expression()?;
                    return Ok(Node::unary(token.value_str(), expr, token.line));
                } else {
                    return Err(self.error(
                        format!("Unexpected unary operator \"{}\"", token.value_str()),
                        Some(token.line),
                    ));
                }
            }
            _ => {
                if token.is_value(TokenKind::Punctuation, "[") {
                    self.parse_array_expression()?
                } else if token.is_value(TokenKind::Punctuation, "{") {
                    self.parse_hash_expression()?
                } else {
                    return Err(self.error(
                        format!(
                            "Unexpected token \"{}\" of value \"{}\"",
                            token.kind.english(),
                            token.value
                        ),
                        Some(token.line),
                    ));
                }
            }
        };
        self.parse_postfix_expression(node)
    }

    /// An interpolated string becomes a left-leaning `~` chain of its parts
    fn parse_string_expression(&mut self) -> Result<Node, SyntaxError> {
        let mut expr: Option<Node> = None;
        // two literal parts never sit side by side
        let mut next_can_be_string = true;

        loop {
            let part = if next_can_be_string && self.stream().test(TokenKind::String) {
                let token = self.stream_mut().next()?;
                next_can_be_string = false;
                Node::constant(Value::Str(token.value_str().to_string()), token.line)
            } else if self
                .stream_mut()
                .next_if(TokenKind::InterpolationStart, None)
                .is_some()
            {
                let part = self.parse_expression(0)?;
                self.stream_mut()
                    .expect(TokenKind::InterpolationEnd, None, None)?;
                next_can_be_string = true;
                part
            } else {
                break;
            };
            expr = Some(match expr {
                None => part,
                Some(prev) => {
                    let line = part.line;
                    Node::binary("~", prev, part, line)
                }
            });
        }

        let token = self.current_token();
        expr.ok_or_else(|| {
            self.error(
                format!(
                    "Unexpected token \"{}\" of value \"{}\"",
                    token.kind.english(),
                    token.value
                ),
                Some(token.line),
            )
        })
    }

    fn parse_array_expression(&mut self) -> Result<Node, SyntaxError> {
        let line = self.current_token().line;
        self.stream_mut().expect(
            TokenKind::Punctuation,
            Some("["),
            Some("An array element was expected"),
        )?;

        let mut node = Node::array(line);
        let mut first = true;
        while !self.stream().test_value(TokenKind::Punctuation, "]") {
            if !first {
                self.stream_mut().expect(
                    TokenKind::Punctuation,
                    Some(","),
                    Some("An array element must be followed by a comma"),
                )?;
                // trailing comma
                if self.stream().test_value(TokenKind::Punctuation, "]") {
                    break;
                }
            }
            first = false;
            let value = self.parse_expression(0)?;
            node.array_push(None, value);
        }
        self.stream_mut().expect(
            TokenKind::Punctuation,
            Some("]"),
            Some("An opened array is not properly closed"),
        )?;
        Ok(node)
    }

    fn parse_hash_expression(&mut self) -> Result<Node, SyntaxError> {
        let line = self.current_token().line;
        self.stream_mut().expect(
            TokenKind::Punctuation,
            Some("{"),
            Some("A hash element was expected"),
        )?;

        let mut node = Node::array(line);
        let mut first = true;
        while !self.stream().test_value(TokenKind::Punctuation, "}") {
            if !first {
                self.stream_mut().expect(
                    TokenKind::Punctuation,
                    Some(","),
                    Some("A hash value must be followed by a comma"),
                )?;
                if self.stream().test_value(TokenKind::Punctuation, "}") {
                    break;
                }
            }
            first = false;

            // keys are strings, names (lexed as strings), numbers, or a
            // parenthesized expression
            let key = if self.stream().test(TokenKind::String)
                || self.stream().test(TokenKind::Name)
                || self.stream().test(TokenKind::Number)
            {
                let token = self.stream_mut().next()?;
                let value = match &token.value {
                    TokenValue::Int(n) => Value::Int(*n),
                    TokenValue::Float(x) => Value::Float(*x),
                    _ => Value::Str(token.value_str().to_string()),
                };
                Node::constant(value, token.line)
            } else if self.stream().test_value(TokenKind::Punctuation, "(") {
                self.parse_expression(0)?
            } else {
                let token = self.current_token();
                return Err(self.error(
                    format!(
                        "A hash key must be a quoted string, a number, a name, or an expression enclosed in parentheses (unexpected token \"{}\" of value \"{}\")",
                        token.kind.english(),
                        token.value
                    ),
                    Some(token.line),
                ));
            };

            self.stream_mut().expect(
                TokenKind::Punctuation,
                Some(":"),
                Some("A hash key must be followed by a colon (:)"),
            )?;
            let value = self.parse_expression(0)?;
            node.array_push(Some(key), value);
        }
        self.stream_mut().expect(
            TokenKind::Punctuation,
            Some("}"),
            Some("An opened hash is not properly closed"),
        )?;
        Ok(node)
    }

    fn parse_postfix_expression(&mut self, mut node: Node) -> Result<Node, SyntaxError> {
        loop {
            let token = self.current_token();
            if token.kind == TokenKind::Punctuation {
                match token.value_str() {
                    "." | "[" => {
                        node = self.parse_subscript_expression(node)?;
                        continue;
                    }
                    "|" => {
                        node = self.parse_filter_expression(node)?;
                        continue;
                    }
                    _ => {}
                }
            }
            break;
        }
        Ok(node)
    }

    fn parse_subscript_expression(&mut self, node: Node) -> Result<Node, SyntaxError> {
        let token = self.stream_mut().next()?;
        let line = token.line;

        if token.value_str() == "." {
            return self.parse_dotted_subscript(node, line);
        }

        // `[`: plain index or slice
        let mut slice = false;
        let arg = if self.stream().test_value(TokenKind::Punctuation, ":") {
            slice = true;
            Node::constant(Value::Int(0), line)
        } else {
            self.parse_expression(0)?
        };
        if self
            .stream_mut()
            .next_if(TokenKind::Punctuation, Some(":"))
            .is_some()
        {
            slice = true;
        }

        if slice {
            let length = if self.stream().test_value(TokenKind::Punctuation, "]") {
                Node::constant(Value::Null, line)
            } else {
                self.parse_expression(0)?
            };
            // the shorthand rewrites to the filter, which must exist
            if self.registry().filter("slice").is_none() {
                let mut err = self.error("Unknown \"slice\" filter.", Some(line));
                err.add_suggestions("slice", &self.registry().filter_names());
                return Err(err);
            }
            let arguments = Node::arguments(vec![(None, arg), (None, length)], line);
            let filter = Node::new(
                NodeKind::Filter {
                    node: Box::new(node),
                    name: Box::new(Node::constant(Value::Str("slice".to_string()), line)),
                    arguments: Box::new(arguments),
                },
                line,
            );
            self.stream_mut()
                .expect(TokenKind::Punctuation, Some("]"), None)?;
            return Ok(filter);
        }

        self.stream_mut()
            .expect(TokenKind::Punctuation, Some("]"), None)?;
        Ok(Node::new(
            NodeKind::GetAttr {
                node: Box::new(node),
                attribute: Box::new(arg),
                arguments: Box::new(Node::arguments(Vec::new(), line)),
                call_type: CallType::Array,
            },
            line,
        ))
    }

    fn parse_dotted_subscript(&mut self, node: Node, line: usize) -> Result<Node, SyntaxError> {
        let token = self.stream_mut().next()?;
        let attr_ok = token.kind == TokenKind::Name
            || token.kind == TokenKind::Number
            || (token.kind == TokenKind::Operator && is_name(token.value_str()));
        if !attr_ok {
            return Err(self.error("Expected name or number", Some(line)));
        }

        let attribute = match &token.value {
            TokenValue::Int(n) => Node::constant(Value::Int(*n), line),
            TokenValue::Float(x) => Node::constant(Value::Float(*x), line),
            _ => Node::constant(Value::Str(token.value_str().to_string()), line),
        };

        let mut call_type = CallType::Any;
        let mut arguments = Node::array(line);
        if self.stream().test_value(TokenKind::Punctuation, "(") {
            call_type = CallType::Method;
            let args = self.parse_arguments(false, false)?;
            if let NodeKind::Arguments { args } = args.kind {
                for (_, value) in args {
                    arguments.array_push(None, value);
                }
            }
        }

        // a call through an `import` alias is a macro call on that template
        if let NodeKind::Name { name } = &node.kind {
            if self.imported_symbol("template", name).is_some() {
                let NodeKind::Constant {
                    value: Value::Str(method),
                } = &attribute.kind
                else {
                    return Err(self.error(
                        format!("Dynamic macro names are not supported (called on \"{}\")", name),
                        Some(token.line),
                    ));
                };
                let mut call = Node::new(
                    NodeKind::MethodCall {
                        node: Box::new(node.clone()),
                        method: format!("macro_{}", method),
                        arguments: Box::new(arguments),
                    },
                    line,
                );
                call.attrs.set("safe", Value::Bool(true));
                return Ok(call);
            }
        }

        Ok(Node::new(
            NodeKind::GetAttr {
                node: Box::new(node),
                attribute: Box::new(attribute),
                arguments: Box::new(arguments),
                call_type,
            },
            line,
        ))
    }

    fn parse_filter_expression(&mut self, node: Node) -> Result<Node, SyntaxError> {
        self.stream_mut().next()?;
        self.parse_filter_expression_raw(node)
    }

    /// `|name(args)|name2(...)…`, cursor already past the first `|`
    pub fn parse_filter_expression_raw(&mut self, mut node: Node) -> Result<Node, SyntaxError> {
        let registry = self.registry();
        loop {
            let token = self.stream_mut().expect(TokenKind::Name, None, None)?;
            let name = token.value_str().to_string();

            let Some(filter) = registry.filter(&name) else {
                let mut err = self.error(format!("Unknown \"{}\" filter.", name), Some(token.line));
                err.add_suggestions(&name, &registry.filter_names());
                return Err(err);
            };
            let deprecated = filter.deprecated;
            let alternative = filter.alternative.clone();

            let arguments = if self.stream().test_value(TokenKind::Punctuation, "(") {
                self.parse_arguments(true, false)?
            } else {
                Node::arguments(Vec::new(), token.line)
            };

            let mut filter_node = Node::new(
                NodeKind::Filter {
                    node: Box::new(node),
                    name: Box::new(Node::constant(Value::Str(name), token.line)),
                    arguments: Box::new(arguments),
                },
                token.line,
            );
            if deprecated {
                filter_node.attrs.set("deprecated", Value::Bool(true));
                if let Some(alternative) = alternative {
                    filter_node.attrs.set("alternative", Value::Str(alternative));
                }
            }
            node = filter_node;

            if self
                .stream_mut()
                .next_if(TokenKind::Punctuation, Some("|"))
                .is_none()
            {
                break;
            }
        }
        Ok(node)
    }

    /// `name(...)` in expression position: the special forms `parent`,
    /// `block`, and `attribute`, then `from`-imported macros, then
    /// registered functions.
    fn get_function_node(&mut self, name: &str, line: usize) -> Result<Node, SyntaxError> {
        match name {
            "parent" => {
                self.parse_arguments(false, false)?;
                let Some(block) = self.peek_block_stack().map(str::to_string) else {
                    return Err(
                        self.error("Calling \"parent\" outside a block is forbidden", Some(line))
                    );
                };
                if self.parent().is_none() && !self.has_traits() {
                    return Err(self.error(
                        "Calling \"parent\" on a template that does not extend nor \"use\" another template is forbidden",
                        Some(line),
                    ));
                }
                Ok(Node::new(NodeKind::Parent { name: block }, line))
            }
            "block" => {
                let args = self.parse_arguments(false, false)?;
                let NodeKind::Arguments { mut args } = args.kind else {
                    return Err(self.error(
                        "The \"block\" function takes one argument (the block name)",
                        Some(line),
                    ));
                };
                if args.is_empty() {
                    return Err(self.error(
                        "The \"block\" function takes one argument (the block name)",
                        Some(line),
                    ));
                }
                let (_, block_name) = args.remove(0);
                Ok(Node::new(
                    NodeKind::BlockExpression {
                        name: Box::new(block_name),
                    },
                    line,
                ))
            }
            "attribute" => {
                let args = self.parse_arguments(false, false)?;
                let NodeKind::Arguments { mut args } = args.kind else {
                    return Err(self.error(
                        "The \"attribute\" function takes at least two arguments (the variable and the attributes)",
                        Some(line),
                    ));
                };
                if args.len() < 2 {
                    return Err(self.error(
                        "The \"attribute\" function takes at least two arguments (the variable and the attributes)",
                        Some(line),
                    ));
                }
                let (_, target) = args.remove(0);
                let (_, attribute) = args.remove(0);
                let arguments = if args.is_empty() {
                    Node::array(line)
                } else {
                    let (_, arguments) = args.remove(0);
                    arguments
                };
                Ok(Node::new(
                    NodeKind::GetAttr {
                        node: Box::new(target),
                        attribute: Box::new(attribute),
                        arguments: Box::new(arguments),
                        call_type: CallType::Any,
                    },
                    line,
                ))
            }
            _ => {
                if let Some(symbol) = self.imported_symbol("function", name) {
                    let args = self.parse_arguments(false, false)?;
                    let mut arguments = Node::array(line);
                    if let NodeKind::Arguments { args } = args.kind {
                        for (_, value) in args {
                            arguments.array_push(None, value);
                        }
                    }
                    let (Some(alias_node), Some(method)) = (symbol.node, symbol.name) else {
                        return Err(
                            self.error(format!("Unknown \"{}\" function.", name), Some(line))
                        );
                    };
                    let mut call = Node::new(
                        NodeKind::MethodCall {
                            node: Box::new(alias_node),
                            method,
                            arguments: Box::new(arguments),
                        },
                        line,
                    );
                    call.attrs.set("safe", Value::Bool(true));
                    return Ok(call);
                }

                let arguments = self.parse_arguments(true, false)?;
                let registry = self.registry();
                let Some(function) = registry.function(name) else {
                    let mut err = self.error(format!("Unknown \"{}\" function.", name), Some(line));
                    err.add_suggestions(name, &registry.function_names());
                    return Err(err);
                };
                let deprecated = function.deprecated;
                let alternative = function.alternative.clone();

                let mut node = Node::new(
                    NodeKind::Function {
                        name: name.to_string(),
                        arguments: Box::new(arguments),
                    },
                    line,
                );
                if deprecated {
                    node.attrs.set("deprecated", Value::Bool(true));
                    if let Some(alternative) = alternative {
                        node.attrs.set("alternative", Value::Str(alternative));
                    }
                }
                Ok(node)
            }
        }
    }

    /// A parenthesized argument list. `named` allows `name=value` pairs;
    /// `definition` parses a signature (names with constant defaults).
    pub fn parse_arguments(&mut self, named: bool, definition: bool) -> Result<Node, SyntaxError> {
        let line = self.current_token().line;
        let mut args: Vec<(Option<String>, Node)> = Vec::new();

        self.stream_mut().expect(
            TokenKind::Punctuation,
            Some("("),
            Some("A list of arguments must begin with an opening parenthesis"),
        )?;
        while !self.stream().test_value(TokenKind::Punctuation, ")") {
            if !args.is_empty() {
                self.stream_mut().expect(
                    TokenKind::Punctuation,
                    Some(","),
                    Some("Arguments must be separated by a comma"),
                )?;
            }

            let mut value = if definition {
                let token = self.stream_mut().expect(
                    TokenKind::Name,
                    None,
                    Some("An argument must be a name"),
                )?;
                Node::name(token.value_str(), self.current_token().line)
            } else {
                self.parse_expression(0)?
            };

            let mut name: Option<String> = None;
            if named {
                if let Some(eq) = self.stream_mut().next_if(TokenKind::Operator, Some("=")) {
                    let NodeKind::Name { name: param } = &value.kind else {
                        return Err(self.error(
                            format!("A parameter name must be a string, \"{}\" given", value.kind_name()),
                            Some(eq.line),
                        ));
                    };
                    name = Some(param.clone());
                    if definition {
                        value = self.parse_primary_expression()?;
                        if !Self::is_constant_expression(&value) {
                            return Err(self.error(
                                "A default value for an argument must be a constant (a boolean, a string, a number, or an array).",
                                Some(eq.line),
                            ));
                        }
                    } else {
                        value = self.parse_expression(0)?;
                    }
                }
            }

            if definition && name.is_none() {
                // a parameter without a default gets a null one
                if let NodeKind::Name { name: param } = &value.kind {
                    name = Some(param.clone());
                }
                value = Node::constant(Value::Null, self.current_token().line);
            }

            args.push((name, value));
        }
        self.stream_mut().expect(
            TokenKind::Punctuation,
            Some(")"),
            Some("A list of arguments must be closed by a parenthesis"),
        )?;

        Ok(Node::arguments(args, line))
    }

    /// Comma-separated assignment targets, plain variable names only
    pub fn parse_assignment_expression(&mut self) -> Result<Node, SyntaxError> {
        let line = self.current_token().line;
        let mut targets = Vec::new();
        loop {
            let token = self.stream_mut().expect(
                TokenKind::Name,
                None,
                Some("Only variables can be assigned to"),
            )?;
            let value = token.value_str();
            if matches!(value.to_lowercase().as_str(), "true" | "false" | "none") {
                return Err(self.error(
                    format!("You cannot assign a value to \"{}\"", value),
                    Some(token.line),
                ));
            }
            targets.push(Node::assign_name(value, token.line));

            if self
                .stream_mut()
                .next_if(TokenKind::Punctuation, Some(","))
                .is_none()
            {
                break;
            }
        }
        Ok(Node::body(targets, line))
    }

    /// Comma-separated expression list
    pub fn parse_multitarget_expression(&mut self) -> Result<Node, SyntaxError> {
        let line = self.current_token().line;
        let mut targets = vec![self.parse_expression(0)?];
        while self
            .stream_mut()
            .next_if(TokenKind::Punctuation, Some(","))
            .is_some()
        {
            targets.push(self.parse_expression(0)?);
        }
        Ok(Node::body(targets, line))
    }

    /// Constant enough to be an argument default: scalars, arrays of
    /// constants, and signed constants
    fn is_constant_expression(node: &Node) -> bool {
        match &node.kind {
            NodeKind::Constant { .. } => true,
            NodeKind::Array { pairs, .. } => pairs
                .iter()
                .all(|(k, v)| Self::is_constant_expression(k) && Self::is_constant_expression(v)),
            NodeKind::Unary { op, expr } => {
                (op == "-" || op == "+") && Self::is_constant_expression(expr)
            }
            _ => false,
        }
    }
}
