use super::{CallType, Node, NodeKind, Value};

/// Accumulates compiled output. Thin builder: raw text, indented lines,
/// quoted strings, scalar literals, and sub-node compilation all chain.
pub struct Compiler {
    source: String,
    indentation: usize,
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            source: String::new(),
            indentation: 0,
        }
    }

    pub fn raw(&mut self, text: &str) -> &mut Self {
        self.source.push_str(text);
        self
    }

    /// Start an indented line
    pub fn write(&mut self, text: &str) -> &mut Self {
        for _ in 0..self.indentation {
            self.source.push_str("    ");
        }
        self.source.push_str(text);
        self
    }

    /// A double-quoted, escaped string literal
    pub fn string(&mut self, value: &str) -> &mut Self {
        self.source.push('"');
        for c in value.chars() {
            match c {
                '\\' => self.source.push_str("\\\\"),
                '"' => self.source.push_str("\\\""),
                '$' => self.source.push_str("\\$"),
                '\n' => self.source.push_str("\\n"),
                '\t' => self.source.push_str("\\t"),
                _ => self.source.push(c),
            }
        }
        self.source.push('"');
        self
    }

    /// Literal form of a scalar
    pub fn repr(&mut self, value: &Value) -> &mut Self {
        match value {
            Value::Null => self.raw("null"),
            Value::Bool(true) => self.raw("true"),
            Value::Bool(false) => self.raw("false"),
            Value::Int(n) => self.raw(&n.to_string()),
            Value::Float(x) => self.raw(&format!("{:?}", x)),
            Value::Str(s) => self.string(s),
        }
    }

    pub fn subcompile(&mut self, node: &Node) -> &mut Self {
        node.compile(self);
        self
    }

    pub fn indent(&mut self) -> &mut Self {
        self.indentation += 1;
        self
    }

    pub fn outdent(&mut self) -> &mut Self {
        match self.indentation.checked_sub(1) {
            Some(level) => self.indentation = level,
            None => panic!("unable to outdent below zero"),
        }
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn into_source(self) -> String {
        self.source
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Node {
    /// Convenience for tests and the CLI
    pub fn compile_to_string(&self) -> String {
        let mut compiler = Compiler::new();
        self.compile(&mut compiler);
        compiler.into_source()
    }

    /// Emit the node. Children compile in a fixed, documented order;
    /// visitors that reorder or remove children change the output in the
    /// obvious way.
    pub fn compile(&self, compiler: &mut Compiler) {
        match &self.kind {
            NodeKind::Body { nodes } => {
                for node in nodes {
                    node.compile(compiler);
                }
            }
            NodeKind::Text { data } => {
                compiler.write("echo ").string(data).raw(";\n");
            }
            NodeKind::Print { expr } => {
                compiler.write("echo ").subcompile(expr).raw(";\n");
            }
            NodeKind::Constant { value } => {
                compiler.repr(value);
            }
            NodeKind::Name { name } | NodeKind::AssignName { name } => {
                compiler.raw("$context[").string(name).raw("]");
            }
            NodeKind::Array { pairs, .. } => {
                compiler.raw("array(");
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        compiler.raw(", ");
                    }
                    compiler.subcompile(key).raw(" => ").subcompile(value);
                }
                compiler.raw(")");
            }
            NodeKind::Arguments { args } => {
                for (i, (name, value)) in args.iter().enumerate() {
                    if i > 0 {
                        compiler.raw(", ");
                    }
                    if let Some(name) = name {
                        compiler.string(name).raw(" => ");
                    }
                    compiler.subcompile(value);
                }
            }
            NodeKind::Conditional {
                expr,
                then,
                otherwise,
            } => {
                compiler
                    .raw("((")
                    .subcompile(expr)
                    .raw(") ? (")
                    .subcompile(then)
                    .raw(") : (")
                    .subcompile(otherwise)
                    .raw("))");
            }
            NodeKind::Binary { op, left, right } => {
                compile_binary(compiler, op, left, right);
            }
            NodeKind::Unary { op, expr } => {
                let symbol = match op.as_str() {
                    "not" => "!",
                    other => other,
                };
                compiler.raw(symbol).raw("(").subcompile(expr).raw(")");
            }
            NodeKind::GetAttr {
                node,
                attribute,
                arguments,
                call_type,
            } => {
                let call_type = match call_type {
                    CallType::Any => "any",
                    CallType::Method => "method",
                    CallType::Array => "array",
                };
                compiler
                    .raw("$this->getAttribute(")
                    .subcompile(node)
                    .raw(", ")
                    .subcompile(attribute)
                    .raw(", array(")
                    .subcompile(arguments)
                    .raw("), ")
                    .string(call_type)
                    .raw(")");
            }
            NodeKind::MethodCall {
                node,
                method,
                arguments,
            } => {
                compiler
                    .subcompile(node)
                    .raw("->")
                    .raw(method)
                    .raw("(")
                    .subcompile(arguments)
                    .raw(")");
            }
            NodeKind::Function { name, arguments } => {
                compiler
                    .raw("$this->callFunction(")
                    .string(name)
                    .raw(", array(")
                    .subcompile(arguments)
                    .raw("))");
            }
            NodeKind::Filter {
                node,
                name,
                arguments,
            } => {
                compiler
                    .raw("$this->callFilter(")
                    .subcompile(name)
                    .raw(", ")
                    .subcompile(node)
                    .raw(", array(")
                    .subcompile(arguments)
                    .raw("))");
            }
            NodeKind::Parent { name } => {
                compiler
                    .raw("$this->renderParentBlock(")
                    .string(name)
                    .raw(", $context, $blocks)");
            }
            NodeKind::BlockReference { name } => {
                compiler
                    .write("$this->displayBlock(")
                    .string(name)
                    .raw(", $context, $blocks);\n");
            }
            NodeKind::BlockExpression { name } => {
                compiler
                    .raw("$this->renderBlock(")
                    .subcompile(name)
                    .raw(", $context, $blocks)");
            }
            NodeKind::Block { name, body } => {
                compiler
                    .write("public function block_")
                    .raw(name)
                    .raw("($context, array $blocks = array())\n")
                    .write("{\n")
                    .indent()
                    .subcompile(body)
                    .outdent()
                    .write("}\n\n");
            }
            NodeKind::Macro {
                name,
                arguments,
                body,
            } => {
                compiler
                    .write("public function macro_")
                    .raw(name)
                    .raw("(");
                if let NodeKind::Arguments { args } = &arguments.kind {
                    for (i, (param, default)) in args.iter().enumerate() {
                        if i > 0 {
                            compiler.raw(", ");
                        }
                        compiler.raw("$");
                        compiler.raw(param.as_deref().unwrap_or("_"));
                        compiler.raw(" = ").subcompile(default);
                    }
                }
                compiler
                    .raw(")\n")
                    .write("{\n")
                    .indent()
                    .subcompile(body)
                    .outdent()
                    .write("}\n\n");
            }
            NodeKind::Module {
                body,
                parent,
                blocks,
                macros,
                traits,
                embedded,
                name,
                index,
            } => {
                if let Some(name) = name {
                    compiler.write("/* ").raw(name);
                    if let Some(index) = index {
                        compiler.raw(&format!(" ({})", index));
                    }
                    compiler.raw(" */\n");
                }
                compiler
                    .write("public function display($context, array $blocks = array())\n")
                    .write("{\n")
                    .indent();
                for trait_import in traits {
                    trait_import.compile(compiler);
                }
                if let Some(parent) = parent {
                    compiler
                        .write("$this->parent = $this->loadTemplate(")
                        .subcompile(parent)
                        .raw(");\n");
                }
                compiler.subcompile(body);
                if parent.is_some() {
                    compiler.write("$this->parent->display($context, $blocks);\n");
                }
                compiler.outdent().write("}\n\n");
                for block in blocks {
                    block.compile(compiler);
                }
                for macro_node in macros {
                    macro_node.compile(compiler);
                }
                for module in embedded {
                    module.compile(compiler);
                }
            }
            NodeKind::Set {
                names,
                values,
                capture,
            } => {
                if *capture {
                    compiler.write("ob_start();\n").subcompile(values);
                    compiler
                        .write("")
                        .subcompile(names)
                        .raw(" = ob_get_clean();\n");
                    return;
                }
                let targets = match &names.kind {
                    NodeKind::Body { nodes } => nodes.as_slice(),
                    _ => std::slice::from_ref(&**names),
                };
                if targets.len() == 1 {
                    compiler
                        .write("")
                        .subcompile(&targets[0])
                        .raw(" = ")
                        .subcompile(values)
                        .raw(";\n");
                } else {
                    compiler.write("list(");
                    for (i, target) in targets.iter().enumerate() {
                        if i > 0 {
                            compiler.raw(", ");
                        }
                        compiler.subcompile(target);
                    }
                    compiler.raw(") = array(");
                    let sources = match &values.kind {
                        NodeKind::Body { nodes } => nodes.as_slice(),
                        _ => std::slice::from_ref(&**values),
                    };
                    for (i, source) in sources.iter().enumerate() {
                        if i > 0 {
                            compiler.raw(", ");
                        }
                        compiler.subcompile(source);
                    }
                    compiler.raw(");\n");
                }
            }
            NodeKind::Import { template, alias } => {
                compiler
                    .write("")
                    .subcompile(alias)
                    .raw(" = $this->loadTemplate(")
                    .subcompile(template)
                    .raw(");\n");
            }
            NodeKind::TraitImport { template, targets } => {
                compiler
                    .write("$this->importTrait(")
                    .subcompile(template)
                    .raw(", array(");
                for (i, (from, to)) in targets.iter().enumerate() {
                    if i > 0 {
                        compiler.raw(", ");
                    }
                    compiler.string(from).raw(" => ").string(to);
                }
                compiler.raw("));\n");
            }
            NodeKind::If { tests, otherwise } => {
                for (i, (condition, body)) in tests.iter().enumerate() {
                    if i == 0 {
                        compiler.write("if (");
                    } else {
                        compiler.outdent().write("} elseif (");
                    }
                    compiler.subcompile(condition).raw(") {\n").indent();
                    compiler.subcompile(body);
                }
                if let Some(otherwise) = otherwise {
                    compiler.outdent().write("} else {\n").indent();
                    compiler.subcompile(otherwise);
                }
                compiler.outdent().write("}\n");
            }
            NodeKind::Embed {
                template,
                variables,
                index,
            } => {
                compiler
                    .write("$this->displayEmbedded(")
                    .raw(&index.to_string())
                    .raw(", ")
                    .subcompile(template)
                    .raw(", ");
                match variables {
                    Some(variables) => compiler.subcompile(variables),
                    None => compiler.raw("array()"),
                };
                compiler.raw(", $context);\n");
            }
        }
    }
}

/// Infix where the host language has the operator, helper calls elsewhere
fn compile_binary(compiler: &mut Compiler, op: &str, left: &Node, right: &Node) {
    match op {
        "**" => call2(compiler, "pow", left, right),
        "//" => call2(compiler, "intdiv", left, right),
        ".." => call2(compiler, "range", left, right),
        "in" => call2(compiler, "in_array", left, right),
        "not in" => {
            compiler.raw("!");
            call2(compiler, "in_array", left, right);
        }
        "starts with" => call2(compiler, "str_starts_with", left, right),
        "ends with" => call2(compiler, "str_ends_with", left, right),
        // pattern first
        "matches" => call2(compiler, "preg_match", right, left),
        _ => {
            let symbol = match op {
                "and" => "&&",
                "or" => "||",
                "b-or" => "|",
                "b-and" => "&",
                "b-xor" => "^",
                "~" => ".",
                "is" => "===",
                "is not" => "!==",
                other => other,
            };
            compiler
                .raw("(")
                .subcompile(left)
                .raw(" ")
                .raw(symbol)
                .raw(" ")
                .subcompile(right)
                .raw(")");
        }
    }
}

fn call2(compiler: &mut Compiler, function: &str, a: &Node, b: &Node) {
    compiler
        .raw(function)
        .raw("(")
        .subcompile(a)
        .raw(", ")
        .subcompile(b)
        .raw(")");
}
