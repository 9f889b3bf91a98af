use sablon::{Lexer, Registry, TokenKind, TokenStream, TokenValue};

fn lex(source: &str) -> TokenStream {
    let registry = Registry::with_defaults();
    Lexer::new(&registry)
        .tokenize(source, Some("test"))
        .expect("tokenize")
}

fn lex_err(source: &str) -> sablon::LexError {
    let registry = Registry::with_defaults();
    Lexer::new(&registry)
        .tokenize(source, Some("test"))
        .expect_err("tokenize should fail")
}

fn kinds(stream: &TokenStream) -> Vec<TokenKind> {
    stream.tokens().iter().map(|t| t.kind).collect()
}

#[test]
fn plain_text_is_one_token() {
    let stream = lex("just some text");
    assert_eq!(kinds(&stream), vec![TokenKind::Text, TokenKind::Eof]);
    assert_eq!(stream.tokens()[0].value_str(), "just some text");
}

#[test]
fn variable_with_non_ascii_name() {
    let stream = lex("{{ § }}");
    assert_eq!(
        kinds(&stream),
        vec![
            TokenKind::VarStart,
            TokenKind::Name,
            TokenKind::VarEnd,
            TokenKind::Eof
        ]
    );
    assert_eq!(stream.tokens()[1].value_str(), "§");
}

#[test]
fn brackets_nest_inside_a_hash() {
    let stream = lex(r#"{{ {"a": {"b": "c"}} }}"#);
    let values: Vec<&str> = stream.tokens().iter().map(|t| t.value_str()).collect();
    assert_eq!(
        values,
        vec!["", "{", "a", ":", "{", "b", ":", "c", "}", "}", "", ""]
    );
}

#[test]
fn line_directive_resets_the_counter() {
    let stream = lex("foo\n{% line 10 %}\nbar");
    let texts: Vec<_> = stream
        .tokens()
        .iter()
        .filter(|t| t.kind == TokenKind::Text)
        .collect();
    assert_eq!(texts.len(), 2);
    assert_eq!(texts[0].value_str(), "foo\n");
    assert_eq!(texts[1].value_str(), "\nbar");
    assert_eq!(texts[1].line, 10);
}

#[test]
fn integers_that_fit_stay_integers() {
    let stream = lex("{{ 12 }}");
    assert_eq!(stream.tokens()[1].value, TokenValue::Int(12));
}

#[test]
fn fractions_are_floats() {
    let stream = lex("{{ 12.5 }}");
    assert_eq!(stream.tokens()[1].value, TokenValue::Float(12.5));
}

#[test]
fn huge_integers_become_floats() {
    let stream = lex("{{ 922337203685477580700 }}");
    assert_eq!(stream.tokens()[1].kind, TokenKind::Number);
    assert!(matches!(stream.tokens()[1].value, TokenValue::Float(_)));
}

#[test]
fn escaped_quotes_in_strings() {
    let stream = lex(r#"{{ 'a \'b\' c' }}"#);
    assert_eq!(stream.tokens()[1].value_str(), "a 'b' c");

    let stream = lex(r#"{{ "a \"b\" c" }}"#);
    assert_eq!(stream.tokens()[1].value_str(), "a \"b\" c");
}

#[test]
fn string_interpolation_splits_the_string() {
    let stream = lex(r#"{{ "a #{b} c" }}"#);
    assert_eq!(
        kinds(&stream),
        vec![
            TokenKind::VarStart,
            TokenKind::String,
            TokenKind::InterpolationStart,
            TokenKind::Name,
            TokenKind::InterpolationEnd,
            TokenKind::String,
            TokenKind::VarEnd,
            TokenKind::Eof
        ]
    );
    assert_eq!(stream.tokens()[1].value_str(), "a ");
    assert_eq!(stream.tokens()[5].value_str(), " c");
}

#[test]
fn escaped_interpolation_opener_is_literal() {
    let stream = lex(r#"{{ "\#{a}" }}"#);
    assert_eq!(
        kinds(&stream),
        vec![
            TokenKind::VarStart,
            TokenKind::String,
            TokenKind::VarEnd,
            TokenKind::Eof
        ]
    );
    assert_eq!(stream.tokens()[1].value_str(), "#{a}");
}

#[test]
fn hash_without_brace_is_plain_text_in_strings() {
    let stream = lex(r#"{{ "a # b" }}"#);
    assert_eq!(stream.tokens()[1].value_str(), "a # b");
}

#[test]
fn unclosed_interpolated_string_reports_the_quote() {
    let err = lex_err(r#"{{ "a#{b} "#);
    assert_eq!(err.raw_message(), "Unclosed \"\"\"");
}

#[test]
fn operators_span_lines() {
    let stream = lex("{{ 1 and\n0 }}");
    assert_eq!(stream.tokens()[2].kind, TokenKind::Operator);
    assert_eq!(stream.tokens()[2].value_str(), "and");
    assert_eq!(stream.tokens()[3].line, 2);
}

#[test]
fn multi_word_operators_lex_as_one_token() {
    let stream = lex("{{ a is not b }}");
    assert_eq!(stream.tokens()[2].value_str(), "is not");

    let stream = lex("{{ a not in b }}");
    assert_eq!(stream.tokens()[2].value_str(), "not in");
}

#[test]
fn word_operators_need_a_boundary() {
    // `include_me` must not lex as the `in` operator
    let stream = lex("{{ include_me }}");
    assert_eq!(stream.tokens()[1].kind, TokenKind::Name);
    assert_eq!(stream.tokens()[1].value_str(), "include_me");
}

#[test]
fn unterminated_variable_cites_its_opening_line() {
    let err = lex_err("\n\n{{ bar\n\n");
    assert_eq!(err.raw_message(), "Unclosed \"variable\"");
    assert_eq!(err.line(), 3);
}

#[test]
fn unterminated_block_cites_its_opening_line() {
    let err = lex_err("\n\n{% bar\n\n");
    assert_eq!(err.raw_message(), "Unclosed \"block\"");
    assert_eq!(err.line(), 3);
}

#[test]
fn mismatched_brackets_cite_the_opening_line() {
    let err = lex_err("{{ [1,\n2) }}");
    assert_eq!(err.raw_message(), "Unclosed \"[\"");
    assert_eq!(err.line(), 1);
}

#[test]
fn stray_closing_bracket_is_rejected() {
    let err = lex_err("{{ a) }}");
    assert_eq!(err.raw_message(), "Unexpected \")\"");
}

#[test]
fn raw_block_keeps_delimiters_as_text() {
    let stream = lex("{% raw %}aaa {{ bbb }} ccc{% endraw %}");
    assert_eq!(kinds(&stream), vec![TokenKind::Text, TokenKind::Eof]);
    assert_eq!(stream.tokens()[0].value_str(), "aaa {{ bbb }} ccc");
}

#[test]
fn verbatim_is_an_alias_for_raw() {
    let stream = lex("{% verbatim %}{% if %}{% endverbatim %}");
    assert_eq!(kinds(&stream), vec![TokenKind::Text, TokenKind::Eof]);
    assert_eq!(stream.tokens()[0].value_str(), "{% if %}");
}

#[test]
fn unclosed_raw_block_fails() {
    let err = lex_err("{% raw %}aaa");
    assert_eq!(
        err.raw_message(),
        "Unexpected end of file: Unclosed \"raw\" block"
    );
}

#[test]
fn trim_markers_eat_surrounding_whitespace() {
    let stream = lex("hello  {{- name -}}  world");
    let texts: Vec<&str> = stream
        .tokens()
        .iter()
        .filter(|t| t.kind == TokenKind::Text)
        .map(|t| t.value_str())
        .collect();
    assert_eq!(texts, vec!["hello", "world"]);
}

#[test]
fn comments_disappear() {
    let stream = lex("a{# note #}b");
    let texts: Vec<&str> = stream
        .tokens()
        .iter()
        .filter(|t| t.kind == TokenKind::Text)
        .map(|t| t.value_str())
        .collect();
    assert_eq!(texts, vec!["a", "b"]);
}

#[test]
fn comment_close_swallows_one_newline() {
    let stream = lex("a{# note #}\nb");
    let texts: Vec<&str> = stream
        .tokens()
        .iter()
        .filter(|t| t.kind == TokenKind::Text)
        .map(|t| t.value_str())
        .collect();
    assert_eq!(texts, vec!["a", "b"]);
}

#[test]
fn unclosed_comment_fails() {
    let err = lex_err("a{# note");
    assert_eq!(err.raw_message(), "Unclosed comment");
}

#[test]
fn carriage_returns_are_normalized() {
    let stream = lex("a\r\nb\rc");
    assert_eq!(stream.tokens()[0].value_str(), "a\nb\nc");
}

#[test]
fn token_lines_never_decrease() {
    let stream = lex("foo\n{{ bar }}\nbaz\n{% if x %}\n{% endif %}");
    let mut last = 0;
    for token in stream.tokens() {
        assert!(token.line >= last, "line went backwards at {}", token);
        last = token.line;
    }
}

#[test]
fn many_tags_lex_without_rescanning() {
    let source = "{{ a }}".repeat(300);
    let stream = lex(&source);
    // VarStart, Name, VarEnd per tag, plus EOF
    assert_eq!(stream.tokens().len(), 3 * 300 + 1);
}

#[test]
fn block_end_swallows_one_newline_but_var_end_does_not() {
    let registry = Registry::with_defaults();
    let lexer = Lexer::new(&registry);

    let stream = lexer.tokenize("{% set a = 1 %}\nb", Some("t")).expect("lex");
    let text = stream
        .tokens()
        .iter()
        .find(|t| t.kind == TokenKind::Text)
        .expect("text token");
    assert_eq!(text.value_str(), "b");

    let stream = lexer.tokenize("{{ a }}\nb", Some("t")).expect("lex");
    let text = stream
        .tokens()
        .iter()
        .find(|t| t.kind == TokenKind::Text)
        .expect("text token");
    assert_eq!(text.value_str(), "\nb");
}
