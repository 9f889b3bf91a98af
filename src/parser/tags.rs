//! Built-in statement tags. Each handler owns one tag name; the parser
//! dispatches to it with the tag's name token and the cursor just past it.

use std::sync::Arc;

use super::{EndTest, Parser};
use crate::error::SyntaxError;
use crate::lexer::token::{Token, TokenKind, TokenValue};
use crate::node::{Node, NodeKind, Value};
use crate::registry::TagParser;

pub fn default_tag_parsers() -> Vec<Arc<dyn TagParser>> {
    vec![
        Arc::new(BlockTagParser) as Arc<dyn TagParser>,
        Arc::new(SetTagParser),
        Arc::new(ExtendsTagParser),
        Arc::new(UseTagParser),
        Arc::new(ImportTagParser),
        Arc::new(FromTagParser),
        Arc::new(MacroTagParser),
        Arc::new(IfTagParser),
        Arc::new(EmbedTagParser),
    ]
}

fn count_targets(node: &Node) -> usize {
    match &node.kind {
        NodeKind::Body { nodes } => nodes.len(),
        _ => 1,
    }
}

/// `{% block name %}…{% endblock %}` and the inline `{% block name expr %}`
pub struct BlockTagParser;

impl TagParser for BlockTagParser {
    fn tag(&self) -> &str {
        "block"
    }

    fn parse(&self, parser: &mut Parser, token: &Token) -> Result<Option<Node>, SyntaxError> {
        let line = token.line;
        let name = parser
            .stream_mut()
            .expect(TokenKind::Name, None, None)?
            .value_str()
            .to_string();

        if let Some(existing) = parser.block(&name) {
            let defined = existing.line;
            let current = parser.current_token().line;
            return Err(parser.error(
                format!("The block '{}' has already been defined line {}", name, defined),
                Some(current),
            ));
        }

        // placeholder so nested duplicates are caught; the body lands below
        parser.set_block(
            &name,
            Node::new(
                NodeKind::Block {
                    name: name.clone(),
                    body: Box::new(Node::body(Vec::new(), line)),
                },
                line,
            ),
        );
        parser.push_local_scope();
        parser.push_block_stack(&name);

        let body;
        if parser
            .stream_mut()
            .next_if(TokenKind::BlockEnd, None)
            .is_some()
        {
            let end = EndTest {
                tag: "block",
                test: &|t: &Token| t.is_value(TokenKind::Name, "endblock"),
            };
            body = parser.subparse(Some(&end), true)?;
            // `{% endblock name %}` must name the block it closes
            if let Some(closing) = parser.stream_mut().next_if(TokenKind::Name, None) {
                if closing.value_str() != name {
                    return Err(parser.error(
                        format!(
                            "Expected endblock for block \"{}\" (but \"{}\" given)",
                            name,
                            closing.value_str()
                        ),
                        Some(closing.line),
                    ));
                }
            }
        } else {
            let expr = parser.parse_expression(0)?;
            body = Node::body(vec![Node::print(expr, line)], line);
        }
        parser.stream_mut().expect(TokenKind::BlockEnd, None, None)?;

        parser.pop_block_stack();
        parser.pop_local_scope();
        parser.set_block(
            &name,
            Node::new(
                NodeKind::Block {
                    name: name.clone(),
                    body: Box::new(body),
                },
                line,
            ),
        );

        Ok(Some(Node::new(NodeKind::BlockReference { name }, line)))
    }
}

/// `{% set a = expr %}`, `{% set a, b = e1, e2 %}`, and the capturing
/// `{% set a %}…{% endset %}`
pub struct SetTagParser;

impl TagParser for SetTagParser {
    fn tag(&self) -> &str {
        "set"
    }

    fn parse(&self, parser: &mut Parser, token: &Token) -> Result<Option<Node>, SyntaxError> {
        let line = token.line;
        let names = parser.parse_assignment_expression()?;

        let capture;
        let values;
        if parser
            .stream_mut()
            .next_if(TokenKind::Operator, Some("="))
            .is_some()
        {
            capture = false;
            values = parser.parse_multitarget_expression()?;
            parser.stream_mut().expect(TokenKind::BlockEnd, None, None)?;
            if count_targets(&names) != count_targets(&values) {
                return Err(parser.error(
                    "When using set, you must have the same number of variables and assignments.",
                    Some(line),
                ));
            }
        } else {
            capture = true;
            if count_targets(&names) > 1 {
                return Err(parser.error(
                    "When using set with a block, you cannot have a multi-target.",
                    Some(line),
                ));
            }
            parser.stream_mut().expect(TokenKind::BlockEnd, None, None)?;
            let end = EndTest {
                tag: "set",
                test: &|t: &Token| t.is_value(TokenKind::Name, "endset"),
            };
            values = parser.subparse(Some(&end), true)?;
            parser.stream_mut().expect(TokenKind::BlockEnd, None, None)?;
        }

        Ok(Some(Node::new(
            NodeKind::Set {
                names: Box::new(names),
                values: Box::new(values),
                capture,
            },
            line,
        )))
    }
}

/// `{% extends expr %}`
pub struct ExtendsTagParser;

impl TagParser for ExtendsTagParser {
    fn tag(&self) -> &str {
        "extends"
    }

    fn parse(&self, parser: &mut Parser, token: &Token) -> Result<Option<Node>, SyntaxError> {
        if !parser.is_main_scope() {
            return Err(parser.error("Cannot extend from a block", Some(token.line)));
        }
        if parser.parent().is_some() {
            return Err(parser.error("Multiple extends tags are forbidden", Some(token.line)));
        }
        let parent = parser.parse_expression(0)?;
        parser.set_parent(parent);
        parser.stream_mut().expect(TokenKind::BlockEnd, None, None)?;
        Ok(None)
    }
}

/// `{% use "blocks.twig" %}` with optional `with a as b` renames
pub struct UseTagParser;

impl TagParser for UseTagParser {
    fn tag(&self) -> &str {
        "use"
    }

    fn parse(&self, parser: &mut Parser, token: &Token) -> Result<Option<Node>, SyntaxError> {
        let template = parser.parse_expression(0)?;
        if !matches!(
            template.kind,
            NodeKind::Constant {
                value: Value::Str(_)
            }
        ) {
            return Err(parser.error(
                "The template references in a \"use\" statement must be a string.",
                Some(token.line),
            ));
        }

        let mut targets = Vec::new();
        if parser
            .stream_mut()
            .next_if(TokenKind::Name, Some("with"))
            .is_some()
        {
            loop {
                let name = parser
                    .stream_mut()
                    .expect(TokenKind::Name, None, None)?
                    .value_str()
                    .to_string();
                let alias = if parser
                    .stream_mut()
                    .next_if(TokenKind::Name, Some("as"))
                    .is_some()
                {
                    parser
                        .stream_mut()
                        .expect(TokenKind::Name, None, None)?
                        .value_str()
                        .to_string()
                } else {
                    name.clone()
                };
                targets.push((name, alias));
                if parser
                    .stream_mut()
                    .next_if(TokenKind::Punctuation, Some(","))
                    .is_none()
                {
                    break;
                }
            }
        }
        parser.stream_mut().expect(TokenKind::BlockEnd, None, None)?;

        parser.add_trait(Node::new(
            NodeKind::TraitImport {
                template: Box::new(template),
                targets,
            },
            token.line,
        ));
        Ok(None)
    }
}

/// `{% import expr as alias %}`
pub struct ImportTagParser;

impl TagParser for ImportTagParser {
    fn tag(&self) -> &str {
        "import"
    }

    fn parse(&self, parser: &mut Parser, token: &Token) -> Result<Option<Node>, SyntaxError> {
        let template = parser.parse_expression(0)?;
        parser
            .stream_mut()
            .expect(TokenKind::Name, Some("as"), None)?;
        let alias = parser
            .stream_mut()
            .expect(TokenKind::Name, None, None)?
            .value_str()
            .to_string();
        parser.stream_mut().expect(TokenKind::BlockEnd, None, None)?;

        parser.add_imported_symbol("template", &alias, None, None);
        Ok(Some(Node::new(
            NodeKind::Import {
                template: Box::new(template),
                alias: Box::new(Node::assign_name(alias, token.line)),
            },
            token.line,
        )))
    }
}

/// `{% from expr import a, b as c %}`
pub struct FromTagParser;

impl TagParser for FromTagParser {
    fn tag(&self) -> &str {
        "from"
    }

    fn parse(&self, parser: &mut Parser, token: &Token) -> Result<Option<Node>, SyntaxError> {
        let template = parser.parse_expression(0)?;
        parser
            .stream_mut()
            .expect(TokenKind::Name, Some("import"), None)?;

        let mut targets = Vec::new();
        loop {
            let name = parser
                .stream_mut()
                .expect(TokenKind::Name, None, None)?
                .value_str()
                .to_string();
            let alias = if parser
                .stream_mut()
                .next_if(TokenKind::Name, Some("as"))
                .is_some()
            {
                parser
                    .stream_mut()
                    .expect(TokenKind::Name, None, None)?
                    .value_str()
                    .to_string()
            } else {
                name.clone()
            };
            targets.push((name, alias));
            if parser
                .stream_mut()
                .next_if(TokenKind::Punctuation, Some(","))
                .is_none()
            {
                break;
            }
        }
        parser.stream_mut().expect(TokenKind::BlockEnd, None, None)?;

        // the source template binds to a hidden variable; aliases resolve
        // to macro calls on it
        let var = parser.var_name();
        for (name, alias) in &targets {
            parser.add_imported_symbol(
                "function",
                alias,
                Some(&format!("macro_{}", name)),
                Some(Node::name(var.clone(), token.line)),
            );
        }

        Ok(Some(Node::new(
            NodeKind::Import {
                template: Box::new(template),
                alias: Box::new(Node::assign_name(var, token.line)),
            },
            token.line,
        )))
    }
}

/// `{% macro name(args) %}…{% endmacro %}`
pub struct MacroTagParser;

impl TagParser for MacroTagParser {
    fn tag(&self) -> &str {
        "macro"
    }

    fn parse(&self, parser: &mut Parser, token: &Token) -> Result<Option<Node>, SyntaxError> {
        let line = token.line;
        let name = parser
            .stream_mut()
            .expect(TokenKind::Name, None, None)?
            .value_str()
            .to_string();
        let arguments = parser.parse_arguments(true, true)?;
        parser.stream_mut().expect(TokenKind::BlockEnd, None, None)?;

        parser.push_local_scope();
        let end = EndTest {
            tag: "macro",
            test: &|t: &Token| t.is_value(TokenKind::Name, "endmacro"),
        };
        let body = parser.subparse(Some(&end), true)?;
        if let Some(closing) = parser.stream_mut().next_if(TokenKind::Name, None) {
            if closing.value_str() != name {
                return Err(parser.error(
                    format!(
                        "Expected endmacro for macro \"{}\" (but \"{}\" given)",
                        name,
                        closing.value_str()
                    ),
                    Some(closing.line),
                ));
            }
        }
        parser.pop_local_scope();
        parser.stream_mut().expect(TokenKind::BlockEnd, None, None)?;

        let node = Node::new(
            NodeKind::Macro {
                name: name.clone(),
                arguments: Box::new(arguments),
                body: Box::new(body),
            },
            line,
        );
        parser.set_macro(&name, node);
        Ok(None)
    }
}

/// `{% if %}` with any number of `{% elseif %}` forks and one `{% else %}`
pub struct IfTagParser;

impl TagParser for IfTagParser {
    fn tag(&self) -> &str {
        "if"
    }

    fn parse(&self, parser: &mut Parser, token: &Token) -> Result<Option<Node>, SyntaxError> {
        let line = token.line;
        let fork = EndTest {
            tag: "if",
            test: &|t: &Token| {
                t.is_value(TokenKind::Name, "else")
                    || t.is_value(TokenKind::Name, "elseif")
                    || t.is_value(TokenKind::Name, "endif")
            },
        };
        let end = EndTest {
            tag: "if",
            test: &|t: &Token| t.is_value(TokenKind::Name, "endif"),
        };

        let condition = parser.parse_expression(0)?;
        parser.stream_mut().expect(TokenKind::BlockEnd, None, None)?;
        let body = parser.subparse(Some(&fork), false)?;

        let mut tests = vec![(condition, body)];
        let mut otherwise = None;
        loop {
            let next = parser.stream_mut().next()?;
            match next.value_str() {
                "elseif" => {
                    let condition = parser.parse_expression(0)?;
                    parser.stream_mut().expect(TokenKind::BlockEnd, None, None)?;
                    let body = parser.subparse(Some(&fork), false)?;
                    tests.push((condition, body));
                }
                "else" => {
                    parser.stream_mut().expect(TokenKind::BlockEnd, None, None)?;
                    otherwise = Some(Box::new(parser.subparse(Some(&end), false)?));
                }
                "endif" => break,
                _ => {
                    return Err(parser.error(
                        format!(
                            "Unexpected end of template. The \"else\", \"elseif\", or \"endif\" tag is expected to close the \"if\" block started at line {}.",
                            line
                        ),
                        Some(next.line),
                    ));
                }
            }
        }
        parser.stream_mut().expect(TokenKind::BlockEnd, None, None)?;

        Ok(Some(Node::new(NodeKind::If { tests, otherwise }, line)))
    }
}

/// `{% embed expr [with vars] %}…{% endembed %}`. The body parses as its
/// own template extending a placeholder, so block overrides work inside it.
pub struct EmbedTagParser;

impl TagParser for EmbedTagParser {
    fn tag(&self) -> &str {
        "embed"
    }

    fn parse(&self, parser: &mut Parser, token: &Token) -> Result<Option<Node>, SyntaxError> {
        let line = token.line;
        let template = parser.parse_expression(0)?;
        let variables = if parser
            .stream_mut()
            .next_if(TokenKind::Name, Some("with"))
            .is_some()
        {
            Some(parser.parse_expression(0)?)
        } else {
            None
        };
        parser.stream_mut().expect(TokenKind::BlockEnd, None, None)?;

        // a synthetic extends makes the nested parse treat the body as an
        // extending template
        parser.stream_mut().inject_tokens(vec![
            Token::new(TokenKind::BlockStart, TokenValue::None, line),
            Token::new(TokenKind::Name, TokenValue::Str("extends".to_string()), line),
            Token::new(TokenKind::String, TokenValue::Str("__parent__".to_string()), line),
            Token::new(TokenKind::BlockEnd, TokenValue::None, line),
        ]);

        let end = EndTest {
            tag: "embed",
            test: &|t: &Token| t.is_value(TokenKind::Name, "endembed"),
        };
        let mut module = parser.parse_nested(Some(&end), true)?;
        if let NodeKind::Module { parent, .. } = &mut module.kind {
            *parent = Some(Box::new(template.clone()));
        }
        let index = parser.embed_template(module)?;
        parser.stream_mut().expect(TokenKind::BlockEnd, None, None)?;

        Ok(Some(Node::new(
            NodeKind::Embed {
                template: Box::new(template),
                variables: variables.map(Box::new),
                index,
            },
            line,
        )))
    }
}
