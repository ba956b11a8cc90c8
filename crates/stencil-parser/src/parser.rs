//! Statement parser for stencil templates.
//!
//! Consumes the flat token stream from `stencil-lexer` and builds the
//! nested [`Template`] tree with recursive descent. Statement tokens are
//! dispatched on their first word (`if`, `for`, `set`, `block`); expression
//! bodies are handed to [`ExprParser`].
//!
//! The parser never aborts. Unknown statements become `Error` nodes, a
//! missing closing tag ends the body at end of input, and stray closing
//! tags are dropped, each with a diagnostic.

use crate::ast::{
    BlockNode, ExprKind, Expression, ForNode, IfNode, Node, NodeKind, SetNode, Template,
};
use crate::expr_parser::{is_identifier, ExprParser};
use crate::{ParseError, ParseErrorKind, ParseOutput};
use stencil_lexer::{Span, Token, TokenKind};

const STATEMENTS: &[&str] = &["if", "for", "set", "block"];

/// Deepest `if`/`for`/`block` nesting the parser descends into. Anything
/// deeper is skipped up to its closing tag and reported.
pub const MAX_NESTING: usize = 128;

/// Template parser.
///
/// Owns the token cursor and the diagnostics collected so far; a fresh
/// parser is created for every [`Parser::parse`] call.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<ParseError>,
    depth: usize,
}

impl Parser {
    /// Create a new parser for the given tokens.
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
            depth: 0,
        }
    }

    /// Parse a token stream into a template plus diagnostics.
    pub fn parse(tokens: Vec<Token>) -> ParseOutput {
        let mut parser = Parser::new(tokens);
        let ast = parser.parse_template();
        ParseOutput {
            ast,
            errors: parser.errors,
        }
    }

    fn parse_template(&mut self) -> Template {
        let span = match (self.tokens.first(), self.tokens.last()) {
            (Some(first), Some(last)) => first.span.to(last.span),
            _ => Span::default(),
        };
        let children = self.parse_body(&[]);
        Template { children, span }
    }

    /// Parse nodes until end of input or a statement whose keyword is in
    /// `close`. The closing statement is left for the caller.
    fn parse_body(&mut self, close: &[&str]) -> Vec<Node> {
        let mut nodes = Vec::new();

        while let Some(token) = self.peek() {
            match token.kind {
                TokenKind::Text => {
                    let node = Node::new(NodeKind::Text(token.content.clone()), token.span);
                    nodes.push(node);
                    self.advance();
                }
                TokenKind::Comment => self.advance(),
                TokenKind::Expression => {
                    let node = self.parse_output();
                    nodes.push(node);
                }
                TokenKind::Statement => {
                    let keyword = keyword(token);
                    if close.contains(&keyword) {
                        break;
                    }
                    if is_closing_keyword(keyword) {
                        self.skip_unexpected_close();
                        continue;
                    }
                    let node = self.parse_statement();
                    nodes.push(node);
                }
            }
        }

        nodes
    }

    /// `{{ expr }}`
    fn parse_output(&mut self) -> Node {
        let Some(token) = self.next_token() else {
            return Node::new(
                NodeKind::Error {
                    message: "Unexpected end of input".into(),
                    recovered: false,
                },
                self.last_span(),
            );
        };
        let value = self.expression(token.inner(), token.span);
        Node::new(NodeKind::Expression(value), token.span)
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn parse_statement(&mut self) -> Node {
        let Some(token) = self.next_token() else {
            return Node::new(
                NodeKind::Error {
                    message: "Unexpected end of input".into(),
                    recovered: false,
                },
                self.last_span(),
            );
        };
        let (keyword, rest) = split_keyword(token.inner());

        match keyword {
            "if" | "for" | "block" if self.depth >= MAX_NESTING => self.skip_too_deep(token.span),
            "if" => self.nested(|p| p.parse_if(rest, token.span)),
            "for" => self.nested(|p| p.parse_for(rest, token.span)),
            "set" => self.parse_set(rest, token.span),
            "block" => self.nested(|p| p.parse_block(rest, token.span)),
            "" => {
                let message = "Empty statement".to_string();
                self.error(ParseErrorKind::Syntax, message.clone(), token.span);
                Node::new(
                    NodeKind::Error {
                        message,
                        recovered: true,
                    },
                    token.span,
                )
            }
            other => {
                let message = format!("Unknown statement '{other}'");
                self.push_error(
                    ParseError::new(ParseErrorKind::Syntax, message.clone(), token.span)
                        .with_suggestion(format!("Expected one of: {}", STATEMENTS.join(", "))),
                );
                Node::new(
                    NodeKind::Error {
                        message,
                        recovered: true,
                    },
                    token.span,
                )
            }
        }
    }

    /// `{% if cond %}` through its `endif`, including `elif`/`else` branches.
    fn parse_if(&mut self, condition: &str, open: Span) -> Node {
        let condition = if condition.is_empty() {
            self.missing_expression("Missing condition in 'if' statement", open)
        } else {
            self.expression(condition, open)
        };

        let body = self.parse_body(&["elif", "elseif", "else", "endif"]);

        let (else_body, end) = match self.peek().map(keyword) {
            Some("elif" | "elseif") => match self.next_token() {
                Some(token) if self.depth >= MAX_NESTING => {
                    let nested = self.skip_too_deep(token.span);
                    let end = nested.span;
                    (Some(vec![nested]), end)
                }
                Some(token) => {
                    let (_, rest) = split_keyword(token.inner());
                    let nested = self.nested(|p| p.parse_if(rest, token.span));
                    let end = nested.span;
                    (Some(vec![nested]), end)
                }
                None => (None, self.last_span()),
            },
            Some("else") => {
                self.advance();
                let else_body = self.parse_body(&["endif"]);
                let end = self.expect_close("endif", "if", open);
                (Some(else_body), end)
            }
            _ => (None, self.expect_close("endif", "if", open)),
        };

        Node::new(
            NodeKind::If(IfNode {
                condition,
                body,
                else_body,
            }),
            open.to(end),
        )
    }

    /// `{% for item in items %}` through `endfor`.
    fn parse_for(&mut self, header: &str, open: Span) -> Node {
        let parsed = parse_for_header(header);
        let body = self.parse_body(&["endfor"]);
        let end = self.expect_close("endfor", "for", open);
        let span = open.to(end);

        let Some((iterator, iterable)) = parsed else {
            let message = format!("Invalid 'for' statement '{}'", header.trim());
            self.push_error(
                ParseError::new(ParseErrorKind::Syntax, message.clone(), open)
                    .with_suggestion("Use 'for <name> in <expression>'"),
            );
            return Node::new(
                NodeKind::Error {
                    message,
                    recovered: true,
                },
                span,
            );
        };

        if iterator == "loop" {
            self.push_error(
                ParseError::new(
                    ParseErrorKind::Validation,
                    "'loop' is reserved for loop metadata",
                    open,
                )
                .with_suggestion("Choose a different loop variable name"),
            );
        } else if !is_identifier(iterator) {
            self.error(
                ParseErrorKind::Validation,
                format!("Invalid loop variable name '{iterator}'"),
                open,
            );
        }

        let iterable = self.expression(iterable, open);
        Node::new(
            NodeKind::For(ForNode {
                iterator: iterator.to_string(),
                iterable,
                body,
            }),
            span,
        )
    }

    /// `{% set name = expr %}`
    fn parse_set(&mut self, rest: &str, open: Span) -> Node {
        let assignment = rest
            .split_once('=')
            .map(|(name, value)| (name.trim(), value.trim()))
            .filter(|(name, value)| !name.is_empty() && !value.starts_with('='));

        let Some((name, value)) = assignment else {
            let message = format!("Invalid 'set' statement '{}'", rest.trim());
            self.push_error(
                ParseError::new(ParseErrorKind::Syntax, message.clone(), open)
                    .with_suggestion("Use 'set <name> = <expression>'"),
            );
            return Node::new(
                NodeKind::Error {
                    message,
                    recovered: true,
                },
                open,
            );
        };

        if !is_identifier(name) {
            self.error(
                ParseErrorKind::Validation,
                format!("Invalid variable name '{name}'"),
                open,
            );
        }

        let value = if value.is_empty() {
            self.missing_expression("Missing value in 'set' statement", open)
        } else {
            self.expression(value, open)
        };
        Node::new(
            NodeKind::Set(SetNode {
                name: name.to_string(),
                value,
            }),
            open,
        )
    }

    /// `{% block name %}` through `endblock`.
    fn parse_block(&mut self, rest: &str, open: Span) -> Node {
        let name = rest.split_whitespace().next().unwrap_or_default().to_string();
        let body = self.parse_body(&["endblock"]);
        let end = self.expect_close("endblock", "block", open);
        let span = open.to(end);

        if name.is_empty() {
            let message = "Missing name in 'block' statement".to_string();
            self.push_error(
                ParseError::new(ParseErrorKind::Syntax, message.clone(), open)
                    .with_suggestion("Use 'block <name>'"),
            );
            return Node::new(
                NodeKind::Error {
                    message,
                    recovered: true,
                },
                span,
            );
        }

        Node::new(NodeKind::Block(BlockNode { name, body }), span)
    }

    fn nested(&mut self, f: impl FnOnce(&mut Self) -> Node) -> Node {
        self.depth += 1;
        let node = f(self);
        self.depth -= 1;
        node
    }

    /// Consume a statement body that is nested too deeply, through its
    /// matching closing tag, without descending into it.
    fn skip_too_deep(&mut self, open: Span) -> Node {
        let message = format!("Statements nested deeper than {MAX_NESTING} levels");
        self.push_error(
            ParseError::new(ParseErrorKind::Syntax, message.clone(), open)
                .with_suggestion("Flatten the template or split it into blocks"),
        );

        let mut open_bodies = 1usize;
        let mut end = open;
        while let Some(token) = self.peek() {
            if token.kind == TokenKind::Statement {
                match keyword(token) {
                    "if" | "for" | "block" => open_bodies += 1,
                    "endif" | "endfor" | "endblock" => open_bodies -= 1,
                    _ => {}
                }
            }
            end = token.span;
            self.advance();
            if open_bodies == 0 {
                break;
            }
        }

        Node::new(
            NodeKind::Error {
                message,
                recovered: true,
            },
            open.to(end),
        )
    }

    // =========================================================================
    // Closing tags
    // =========================================================================

    /// Consume the expected closing tag, or record that it is missing.
    /// Returns the span the enclosing node should end at.
    fn expect_close(&mut self, close: &str, opener: &str, open: Span) -> Span {
        if self.peek().map(keyword) == Some(close) {
            if let Some(token) = self.next_token() {
                return token.span;
            }
        }

        self.push_error(
            ParseError::new(
                ParseErrorKind::Recovery,
                format!("Missing closing tag for '{opener}' statement"),
                open,
            )
            .with_suggestion(format!("Add '{close}' to close the '{opener}' statement")),
        );
        self.last_span()
    }

    fn skip_unexpected_close(&mut self) {
        if let Some(token) = self.next_token() {
            let (keyword, _) = split_keyword(token.inner());
            self.push_error(
                ParseError::new(
                    ParseErrorKind::Recovery,
                    format!("Unexpected closing tag '{keyword}'"),
                    token.span,
                )
                .with_suggestion(format!(
                    "Remove '{keyword}' or add the statement it should close"
                )),
            );
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn expression(&mut self, source: &str, span: Span) -> Expression {
        let (expr, errors) = ExprParser::parse(source, span);
        for error in errors {
            self.push_error(error);
        }
        expr
    }

    fn missing_expression(&mut self, message: &str, span: Span) -> Expression {
        self.error(ParseErrorKind::Syntax, message.to_string(), span);
        Expression::new(
            ExprKind::Error {
                message: message.to_string(),
            },
            span,
        )
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    /// Take the current token out of the cursor.
    fn next_token(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.advance();
        token
    }

    /// Span of the last consumed token.
    fn last_span(&self) -> Span {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.span)
            .unwrap_or_default()
    }

    fn error(&mut self, kind: ParseErrorKind, message: String, span: Span) {
        self.push_error(ParseError::new(kind, message, span));
    }

    fn push_error(&mut self, error: ParseError) {
        tracing::debug!(
            kind = %error.kind,
            line = error.location.start.line,
            column = error.location.start.column,
            "{}",
            error.message
        );
        self.errors.push(error);
    }
}

/// First word of a statement body.
fn keyword(token: &Token) -> &str {
    split_keyword(token.inner()).0
}

/// Split a statement body into its keyword and the trimmed remainder.
fn split_keyword(inner: &str) -> (&str, &str) {
    let inner = inner.trim();
    match inner.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, rest.trim()),
        None => (inner, ""),
    }
}

fn is_closing_keyword(keyword: &str) -> bool {
    matches!(
        keyword,
        "endif" | "endfor" | "endblock" | "else" | "elif" | "elseif"
    )
}

/// `item in items` → `("item", "items")`.
fn parse_for_header(header: &str) -> Option<(&str, &str)> {
    let (iterator, rest) = header.trim().split_once(char::is_whitespace)?;
    let iterable = rest.trim_start().strip_prefix("in")?;
    if !iterable.starts_with(char::is_whitespace) {
        return None;
    }
    let iterable = iterable.trim();
    (!iterable.is_empty()).then_some((iterator, iterable))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Literal, PathSegment};
    use pretty_assertions::assert_eq;
    use stencil_lexer::Scanner;

    fn parse(source: &str) -> ParseOutput {
        Parser::parse(Scanner::tokenize(source).unwrap())
    }

    /// Parse and require a clean result.
    fn parse_ok(source: &str) -> Template {
        let out = parse(source);
        assert!(out.errors.is_empty(), "unexpected errors: {:?}", out.errors);
        out.ast
    }

    fn kinds(nodes: &[Node]) -> Vec<&'static str> {
        nodes
            .iter()
            .map(|n| match n.kind {
                NodeKind::Text(_) => "text",
                NodeKind::Expression(_) => "expr",
                NodeKind::If(_) => "if",
                NodeKind::For(_) => "for",
                NodeKind::Set(_) => "set",
                NodeKind::Block(_) => "block",
                NodeKind::Error { .. } => "error",
            })
            .collect()
    }

    fn first_if(template: &Template) -> &IfNode {
        match &template.children[0].kind {
            NodeKind::If(node) => node,
            other => panic!("Expected If, got {other:?}"),
        }
    }

    // =========================================================================
    // Text and expressions
    // =========================================================================

    #[test]
    fn test_empty_template() {
        assert!(parse_ok("").children.is_empty());
    }

    #[test]
    fn test_text_and_expression() {
        let t = parse_ok("Hello {{ name }}!");
        assert_eq!(kinds(&t.children), vec!["text", "expr", "text"]);
        let NodeKind::Expression(expr) = &t.children[1].kind else {
            panic!("expected expression");
        };
        assert_eq!(
            expr.kind,
            ExprKind::Variable {
                name: "name".into(),
                path: Vec::new(),
            }
        );
    }

    #[test]
    fn test_comments_dropped() {
        let t = parse_ok("a{# hidden #}b");
        assert_eq!(kinds(&t.children), vec!["text", "text"]);
    }

    #[test]
    fn test_empty_expression_is_error_expression() {
        let out = parse("{{ }}");
        let NodeKind::Expression(expr) = &out.ast.children[0].kind else {
            panic!("expected expression");
        };
        assert!(matches!(expr.kind, ExprKind::Error { .. }));
        assert_eq!(out.errors.len(), 1);
    }

    // =========================================================================
    // If
    // =========================================================================

    #[test]
    fn test_if_else() {
        let t = parse_ok("{% if x %}A{% else %}B{% endif %}");
        let node = first_if(&t);
        assert_eq!(kinds(&node.body), vec!["text"]);
        assert_eq!(kinds(node.else_body.as_deref().unwrap()), vec!["text"]);
    }

    #[test]
    fn test_if_without_else() {
        let t = parse_ok("{% if x %}A{% endif %}tail");
        assert!(first_if(&t).else_body.is_none());
        assert_eq!(kinds(&t.children), vec!["if", "text"]);
    }

    #[test]
    fn test_elif_chain_nests() {
        let t = parse_ok("{% if a %}1{% elif b %}2{% else %}3{% endif %}");
        let outer = first_if(&t);
        let else_body = outer.else_body.as_deref().unwrap();
        assert_eq!(kinds(else_body), vec!["if"]);
        let NodeKind::If(inner) = &else_body[0].kind else {
            panic!("expected nested if");
        };
        assert_eq!(kinds(inner.else_body.as_deref().unwrap()), vec!["text"]);
    }

    #[test]
    fn test_elseif_alias_nests() {
        let t = parse_ok("{% if a %}1{% elseif b %}2{% endif %}");
        let outer = first_if(&t);
        let else_body = outer.else_body.as_deref().unwrap();
        assert_eq!(kinds(else_body), vec!["if"]);
        let NodeKind::If(inner) = &else_body[0].kind else {
            panic!("expected nested if");
        };
        assert_eq!(
            inner.condition.kind,
            ExprKind::Variable {
                name: "b".into(),
                path: Vec::new(),
            }
        );
        assert!(inner.else_body.is_none());
    }

    #[test]
    fn test_if_span_covers_endif() {
        let t = parse_ok("{% if x %}A{% endif %}");
        assert_eq!(t.children[0].span.start.column, 0);
        assert_eq!(t.children[0].span.end.column, 22);
    }

    #[test]
    fn test_missing_endif() {
        let out = parse("{% if x %}A");
        assert_eq!(kinds(&out.ast.children), vec!["if"]);
        assert_eq!(out.errors.len(), 1);
        let error = &out.errors[0];
        assert_eq!(error.kind, ParseErrorKind::Recovery);
        assert!(error.message.contains("Missing closing tag"));
        assert!(error.suggestion.as_deref().unwrap().contains("endif"));
    }

    #[test]
    fn test_missing_condition() {
        let out = parse("{% if %}A{% endif %}");
        assert!(matches!(first_if(&out.ast).condition.kind, ExprKind::Error { .. }));
        assert_eq!(out.errors[0].message, "Missing condition in 'if' statement");
    }

    // =========================================================================
    // For
    // =========================================================================

    #[test]
    fn test_for_loop() {
        let t = parse_ok("{% for item in items.list %}{{ item }}{% endfor %}");
        let NodeKind::For(node) = &t.children[0].kind else {
            panic!("expected for");
        };
        assert_eq!(node.iterator, "item");
        assert_eq!(
            node.iterable.kind,
            ExprKind::Variable {
                name: "items".into(),
                path: vec![PathSegment::Property("list".into())],
            }
        );
        assert_eq!(kinds(&node.body), vec!["expr"]);
    }

    #[test]
    fn test_for_over_literal_array() {
        let t = parse_ok("{% for n in [1, 2] %}{{ n }}{% endfor %}");
        let NodeKind::For(node) = &t.children[0].kind else {
            panic!("expected for");
        };
        assert!(matches!(node.iterable.kind, ExprKind::Array(_)));
    }

    #[test]
    fn test_malformed_for_becomes_error_leaf() {
        let out = parse("{% for items %}x{% endfor %}after");
        assert_eq!(kinds(&out.ast.children), vec!["error", "text"]);
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].kind, ParseErrorKind::Syntax);
    }

    #[test]
    fn test_reserved_loop_name() {
        let out = parse("{% for loop in xs %}{% endfor %}");
        assert_eq!(kinds(&out.ast.children), vec!["for"]);
        assert_eq!(out.errors[0].kind, ParseErrorKind::Validation);
    }

    #[test]
    fn test_invalid_loop_variable_name() {
        let out = parse("{% for 1x in xs %}{{ x }}{% endfor %}");
        assert_eq!(kinds(&out.ast.children), vec!["for"]);
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].kind, ParseErrorKind::Validation);
        assert_eq!(out.errors[0].message, "Invalid loop variable name '1x'");
    }

    #[test]
    fn test_nested_loops() {
        let t = parse_ok(
            "{% for row in rows %}{% for cell in row %}{{ cell }}{% endfor %}{% endfor %}",
        );
        let NodeKind::For(outer) = &t.children[0].kind else {
            panic!("expected for");
        };
        assert_eq!(kinds(&outer.body), vec!["for"]);
    }

    // =========================================================================
    // Set and block
    // =========================================================================

    #[test]
    fn test_set() {
        let t = parse_ok("{% set total = a == b %}");
        let NodeKind::Set(node) = &t.children[0].kind else {
            panic!("expected set");
        };
        assert_eq!(node.name, "total");
        assert!(matches!(node.value.kind, ExprKind::Binary { .. }));
    }

    #[test]
    fn test_set_literal() {
        let t = parse_ok("{% set greeting = 'hi' %}");
        let NodeKind::Set(node) = &t.children[0].kind else {
            panic!("expected set");
        };
        assert_eq!(node.value.kind, ExprKind::Literal(Literal::String("hi".into())));
    }

    #[test]
    fn test_invalid_set() {
        let out = parse("{% set nothing %}");
        assert_eq!(kinds(&out.ast.children), vec!["error"]);
        assert_eq!(out.errors[0].kind, ParseErrorKind::Syntax);
    }

    #[test]
    fn test_invalid_set_name() {
        let out = parse("{% set a.b = 1 %}");
        assert_eq!(kinds(&out.ast.children), vec!["set"]);
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].kind, ParseErrorKind::Validation);
        assert_eq!(out.errors[0].message, "Invalid variable name 'a.b'");
    }

    #[test]
    fn test_block() {
        let t = parse_ok("{% block header %}Hi{% endblock header %}");
        let NodeKind::Block(node) = &t.children[0].kind else {
            panic!("expected block");
        };
        assert_eq!(node.name, "header");
        assert_eq!(kinds(&node.body), vec!["text"]);
    }

    // =========================================================================
    // Recovery
    // =========================================================================

    #[test]
    fn test_unknown_statement() {
        let out = parse("a{% frobnicate x %}b");
        assert_eq!(kinds(&out.ast.children), vec!["text", "error", "text"]);
        assert_eq!(out.errors[0].message, "Unknown statement 'frobnicate'");
        assert!(out.errors[0].suggestion.is_some());
    }

    #[test]
    fn test_stray_close_tag_discarded() {
        let out = parse("a{% endfor %}b");
        assert_eq!(kinds(&out.ast.children), vec!["text", "text"]);
        assert_eq!(out.errors[0].kind, ParseErrorKind::Recovery);
        assert_eq!(out.errors[0].message, "Unexpected closing tag 'endfor'");
    }

    #[test]
    fn test_word_starting_with_end_is_unknown() {
        let out = parse("a{% ending %}b");
        assert_eq!(kinds(&out.ast.children), vec!["text", "error", "text"]);
        assert_eq!(out.errors[0].kind, ParseErrorKind::Syntax);
        assert_eq!(out.errors[0].message, "Unknown statement 'ending'");
    }

    #[test]
    fn test_deep_nesting_is_cut_off() {
        let depth = 20_000;
        let source = format!(
            "{}x{}after",
            "{% if a %}".repeat(depth),
            "{% endif %}".repeat(depth)
        );
        let out = parse(&source);
        assert_eq!(kinds(&out.ast.children), vec!["if", "text"]);
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].kind, ParseErrorKind::Syntax);
        assert_eq!(
            out.errors[0].message,
            format!("Statements nested deeper than {MAX_NESTING} levels")
        );
    }

    #[test]
    fn test_deep_unclosed_nesting_terminates() {
        let out = parse(&"{% for x in xs %}".repeat(1_000));
        assert_eq!(kinds(&out.ast.children), vec!["for"]);
        assert!(out.errors[0].message.starts_with("Statements nested deeper"));
        assert_eq!(out.errors.len(), MAX_NESTING + 1);
    }

    #[test]
    fn test_nesting_below_limit_is_clean() {
        let depth = MAX_NESTING;
        let source = format!(
            "{}x{}",
            "{% block b %}".repeat(depth),
            "{% endblock %}".repeat(depth)
        );
        parse_ok(&source);
    }

    #[test]
    fn test_mismatched_close_inside_if() {
        let out = parse("{% if x %}a{% endfor %}b{% endif %}");
        let node = first_if(&out.ast);
        assert_eq!(kinds(&node.body), vec!["text", "text"]);
        assert_eq!(out.errors.len(), 1);
    }

    #[test]
    fn test_error_nodes_are_leaves() {
        let out = parse("{% block %}{{ a }}{% endblock %}");
        assert_eq!(
            out.ast.children[0].kind,
            NodeKind::Error {
                message: "Missing name in 'block' statement".into(),
                recovered: true,
            }
        );
    }

    #[test]
    fn test_split_keyword() {
        assert_eq!(split_keyword("  for x in y "), ("for", "x in y"));
        assert_eq!(split_keyword("endif"), ("endif", ""));
        assert_eq!(split_keyword(""), ("", ""));
    }

    #[test]
    fn test_for_header() {
        assert_eq!(parse_for_header("x in xs"), Some(("x", "xs")));
        assert_eq!(parse_for_header("x inxs"), None);
        assert_eq!(parse_for_header("x in"), None);
    }
}
