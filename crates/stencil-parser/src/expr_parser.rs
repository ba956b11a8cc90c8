//! Expression parser for directive bodies.
//!
//! Works directly on the body text of a `{{ }}` or statement token rather
//! than on a separate token stream. Each level finds its operator at the
//! top level of the string (outside brackets and quotes) and recurses into
//! the pieces:
//!
//! ```text
//! ternary   cond ? a : b
//! binary    ||  &&  == != === !==  < > <= >=  + -  * / %   (left-associative)
//! unary     !x  -x
//! primary   (x)  [..]  {..}  x | f(a)  "str"  1.5  true  null  path.to[i]  f(a)  x.m(a)
//! ```
//!
//! Problems are reported as diagnostics and replaced by `Error` expressions;
//! an unparseable variable head degrades to a `Variable` carrying the raw text.

use crate::ast::{
    BinaryOp, ExprKind, Expression, FilterCall, Literal, ObjectProperty, PathSegment, UnaryOp,
};
use crate::{ParseError, ParseErrorKind};
use stencil_lexer::Span;

/// Deepest grouping (brackets, ternaries, prefix operators) accepted in one
/// expression.
pub const MAX_EXPR_DEPTH: usize = 64;

/// Expression parser state: the span to attach and the diagnostics so far.
pub struct ExprParser {
    span: Span,
    errors: Vec<ParseError>,
    depth: usize,
}

impl ExprParser {
    /// Create a parser whose nodes and diagnostics carry `span`.
    pub fn new(span: Span) -> Self {
        Self {
            span,
            errors: Vec::new(),
            depth: 0,
        }
    }

    /// Parse an expression string, returning the tree and any diagnostics.
    pub fn parse(source: &str, span: Span) -> (Expression, Vec<ParseError>) {
        let mut parser = ExprParser::new(span);
        if !is_balanced(source) {
            parser.error(format!(
                "Unbalanced brackets or quotes in '{}'",
                source.trim()
            ));
        }
        let expr = parser.expression(source);
        (expr, parser.errors)
    }

    fn expression(&mut self, source: &str) -> Expression {
        let source = source.trim();
        if source.is_empty() {
            return self.error("Empty expression");
        }
        self.nested(|p| p.ternary(source))
    }

    /// Run `f` one level deeper, or report the expression as too deep.
    fn nested(&mut self, f: impl FnOnce(&mut Self) -> Expression) -> Expression {
        if self.depth >= MAX_EXPR_DEPTH {
            return self.error(format!(
                "Expression nested deeper than {MAX_EXPR_DEPTH} levels"
            ));
        }
        self.depth += 1;
        let expr = f(self);
        self.depth -= 1;
        expr
    }

    // =========================================================================
    // Operators
    // =========================================================================

    fn ternary(&mut self, source: &str) -> Expression {
        let top = top_level(source);
        let Some(q) = top.iter().position(|&(_, c)| c == '?') else {
            return self.binary(source);
        };
        let question = top[q].0;

        let mut nesting = 0usize;
        let mut colon = None;
        for &(i, c) in &top[q + 1..] {
            match c {
                '?' => nesting += 1,
                ':' if nesting == 0 => {
                    colon = Some(i);
                    break;
                }
                ':' => nesting -= 1,
                _ => {}
            }
        }
        let Some(colon) = colon else {
            return self.error(format!("Expected ':' in ternary expression '{source}'"));
        };

        let condition = self.expression(&source[..question]);
        let true_value = self.expression(&source[question + 1..colon]);
        let false_value = self.expression(&source[colon + 1..]);
        self.make(ExprKind::Ternary {
            condition: Box::new(condition),
            true_value: Box::new(true_value),
            false_value: Box::new(false_value),
        })
    }

    /// Splits at every operator of the loosest tier present and folds the
    /// operands from the left.
    fn binary(&mut self, source: &str) -> Expression {
        let points = split_points(source);
        let Some(&(first, first_op)) = points.first() else {
            return self.unary(source);
        };

        let mut left = self.operand(&source[..first], first_op.symbol());
        for (n, &(at, op)) in points.iter().enumerate() {
            let end = points.get(n + 1).map_or(source.len(), |&(next, _)| next);
            let right = self.operand(&source[at + op.symbol().len()..end], op.symbol());
            left = self.make(ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            });
        }
        left
    }

    fn unary(&mut self, source: &str) -> Expression {
        let (op, rest) = if let Some(rest) = source.strip_prefix('!') {
            (UnaryOp::Not, rest)
        } else if let Some(rest) = source.strip_prefix('-') {
            if let Some(n) = parse_number(rest.trim_start()) {
                return self.make(ExprKind::Literal(Literal::Number(-n)));
            }
            (UnaryOp::Neg, rest)
        } else {
            return self.primary(source);
        };

        let rest = rest.trim();
        let operand = if rest.is_empty() {
            self.error(format!("Missing operand for '{}'", op.symbol()))
        } else {
            self.nested(|p| p.unary(rest))
        };
        self.make(ExprKind::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn operand(&mut self, source: &str, symbol: &str) -> Expression {
        if source.trim().is_empty() {
            self.error(format!("Missing operand for '{symbol}'"))
        } else {
            self.expression(source)
        }
    }

    // =========================================================================
    // Primaries
    // =========================================================================

    fn primary(&mut self, source: &str) -> Expression {
        if let Some(inner) = enclosed(source, '(') {
            let inner = self.expression(inner);
            return self.make(ExprKind::Paren(Box::new(inner)));
        }
        if let Some(inner) = enclosed(source, '[') {
            let elements = self.list(inner);
            return self.make(ExprKind::Array(elements));
        }
        if let Some(inner) = enclosed(source, '{') {
            let properties = self.object(inner);
            return self.make(ExprKind::Object(properties));
        }
        if top_level(source).iter().any(|&(_, c)| c == '|') {
            return self.filter_chain(source);
        }
        if let Some(s) = parse_string(source) {
            return self.make(ExprKind::Literal(Literal::String(s)));
        }
        if let Some(n) = parse_number(source) {
            return self.make(ExprKind::Literal(Literal::Number(n)));
        }
        match source {
            "true" => self.make(ExprKind::Literal(Literal::Boolean(true))),
            "false" => self.make(ExprKind::Literal(Literal::Boolean(false))),
            "null" => self.make(ExprKind::Literal(Literal::Null)),
            _ => self.variable(source),
        }
    }

    /// Comma-separated expressions; a single trailing comma is allowed.
    fn list(&mut self, source: &str) -> Vec<Expression> {
        if source.trim().is_empty() {
            return Vec::new();
        }
        let mut pieces = split_top_level(source, ',');
        if pieces.len() > 1 && pieces.last().is_some_and(|p| p.trim().is_empty()) {
            pieces.pop();
        }
        pieces.into_iter().map(|p| self.expression(p)).collect()
    }

    fn object(&mut self, source: &str) -> Vec<ObjectProperty> {
        let mut properties = Vec::new();
        if source.trim().is_empty() {
            return properties;
        }
        let mut pieces = split_top_level(source, ',');
        if pieces.len() > 1 && pieces.last().is_some_and(|p| p.trim().is_empty()) {
            pieces.pop();
        }

        for piece in pieces {
            let piece = piece.trim();
            let colon = top_level(piece)
                .into_iter()
                .find(|&(_, c)| c == ':')
                .map(|(i, _)| i);

            match colon {
                Some(at) => {
                    let raw_key = piece[..at].trim();
                    let key = parse_string(raw_key).unwrap_or_else(|| raw_key.to_string());
                    if key.is_empty() {
                        self.error(format!("Missing key in object property '{piece}'"));
                        continue;
                    }
                    let value = self.expression(&piece[at + 1..]);
                    properties.push(ObjectProperty { key, value });
                }
                // Shorthand `{ name }`
                None if is_identifier(piece) => {
                    let value = self.make(ExprKind::Variable {
                        name: piece.to_string(),
                        path: Vec::new(),
                    });
                    properties.push(ObjectProperty {
                        key: piece.to_string(),
                        value,
                    });
                }
                None => {
                    self.error(format!("Expected 'key: value' in object, got '{piece}'"));
                }
            }
        }
        properties
    }

    fn filter_chain(&mut self, source: &str) -> Expression {
        let segments = split_top_level(source, '|');
        let head = segments[0];
        let value = if head.trim().is_empty() {
            self.error("Missing value before '|'")
        } else {
            self.expression(head)
        };

        let filters: Vec<FilterCall> = segments[1..]
            .iter()
            .filter_map(|clause| self.filter_call(clause.trim()))
            .collect();

        if filters.is_empty() {
            return value;
        }
        self.make(ExprKind::Filter {
            source: Box::new(value),
            filters,
        })
    }

    /// `name` or `name(arg, ...)`.
    fn filter_call(&mut self, clause: &str) -> Option<FilterCall> {
        if clause.is_empty() {
            self.error("Missing filter name after '|'");
            return None;
        }
        let len = identifier_len(clause);
        if len == 0 {
            self.error(format!("Invalid filter name '{clause}'"));
            return None;
        }
        let name = clause[..len].to_string();
        let rest = clause[len..].trim_start();

        if rest.is_empty() {
            return Some(FilterCall {
                name,
                args: Vec::new(),
            });
        }
        match enclosed(rest, '(') {
            Some(inner) => {
                let args = self.list(inner);
                Some(FilterCall { name, args })
            }
            None => {
                self.error(format!("Invalid arguments for filter '{name}': '{rest}'"));
                None
            }
        }
    }

    /// An identifier followed by `.prop` / `[expr]` accessors, optionally
    /// ending in a call.
    fn variable(&mut self, source: &str) -> Expression {
        let head = identifier_len(source);
        if head == 0 {
            return self.raw_variable(source);
        }
        let name = source[..head].to_string();
        let mut path = Vec::new();
        let mut rest = &source[head..];

        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix('.') {
                let len = identifier_len(after);
                if len == 0 {
                    return self.raw_variable(source);
                }
                path.push(PathSegment::Property(after[..len].to_string()));
                rest = &after[len..];
            } else if rest.starts_with('[') {
                let Some(close) = matching_close(rest, 0) else {
                    return self.raw_variable(source);
                };
                let index = self.expression(&rest[1..close]);
                path.push(PathSegment::Index(Box::new(index)));
                rest = &rest[close + 1..];
            } else if let Some(inner) = enclosed(rest, '(') {
                let args = self.list(inner);
                return self.call(name, path, args, source);
            } else {
                return self.raw_variable(source);
            }
        }

        self.make(ExprKind::Variable { name, path })
    }

    /// A call ending a path: `f(a)` or `receiver.method(a)`.
    fn call(
        &mut self,
        name: String,
        mut path: Vec<PathSegment>,
        args: Vec<Expression>,
        source: &str,
    ) -> Expression {
        match path.pop() {
            None => self.make(ExprKind::FunctionCall {
                name,
                args,
                object: None,
            }),
            Some(PathSegment::Property(method)) => {
                let receiver = self.make(ExprKind::Variable { name, path });
                self.make(ExprKind::FunctionCall {
                    name: method,
                    args,
                    object: Some(Box::new(receiver)),
                })
            }
            Some(PathSegment::Index(_)) => self.raw_variable(source),
        }
    }

    fn raw_variable(&self, source: &str) -> Expression {
        self.make(ExprKind::Variable {
            name: source.to_string(),
            path: Vec::new(),
        })
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn make(&self, kind: ExprKind) -> Expression {
        Expression::new(kind, self.span)
    }

    fn error(&mut self, message: impl Into<String>) -> Expression {
        let message = message.into();
        self.errors.push(ParseError::new(
            ParseErrorKind::Syntax,
            message.clone(),
            self.span,
        ));
        self.make(ExprKind::Error { message })
    }
}

/// Whether `source` is a plain identifier (`[A-Za-z_$][A-Za-z0-9_$]*`).
pub fn is_identifier(source: &str) -> bool {
    !source.is_empty() && identifier_len(source) == source.len()
}

/// Byte length of the identifier at the start of `source` (0 if none).
fn identifier_len(source: &str) -> usize {
    let mut chars = source.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return 0,
    }
    for (i, c) in chars {
        if !(c.is_alphanumeric() || c == '_' || c == '$') {
            return i;
        }
    }
    source.len()
}

/// Characters outside brackets and string literals, with byte offsets.
/// Bracket and quote characters themselves are never included.
fn top_level(source: &str) -> Vec<(usize, char)> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in source.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            _ if depth == 0 => out.push((i, c)),
            _ => {}
        }
    }
    out
}

fn is_balanced(source: &str) -> bool {
    let mut stack = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in source.chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' => stack.push(')'),
            '[' => stack.push(']'),
            '{' => stack.push('}'),
            ')' | ']' | '}' => {
                if stack.pop() != Some(c) {
                    return false;
                }
            }
            _ => {}
        }
    }
    quote.is_none() && stack.is_empty()
}

/// Offset of the bracket closing the one at `open`.
fn matching_close(source: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in source[open..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// The inside of `source` when the whole string is one bracketed group
/// opened by `open`.
fn enclosed(source: &str, open: char) -> Option<&str> {
    if !source.starts_with(open) {
        return None;
    }
    let close = matching_close(source, 0)?;
    (close == source.len() - 1).then(|| &source[1..close])
}

fn split_top_level(source: &str, separator: char) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for (i, c) in top_level(source) {
        if c == separator {
            pieces.push(&source[start..i]);
            start = i + c.len_utf8();
        }
    }
    pieces.push(&source[start..]);
    pieces
}

/// Where to split a binary expression: every top-level operator of the
/// loosest precedence tier present, in source order.
fn split_points(source: &str) -> Vec<(usize, BinaryOp)> {
    let mut found = Vec::new();
    let mut skip_to = 0;

    for (i, _) in top_level(source) {
        if i < skip_to {
            continue;
        }
        let Some(op) = BinaryOp::ALL
            .into_iter()
            .find(|op| source[i..].starts_with(op.symbol()))
        else {
            continue;
        };
        skip_to = i + op.symbol().len();

        if matches!(op, BinaryOp::Add | BinaryOp::Sub)
            && (is_prefix_position(source, i) || is_exponent_sign(source, i))
        {
            continue;
        }
        found.push((i, op));
    }

    let Some(loosest) = found.iter().map(|(_, op)| op.precedence()).min() else {
        return found;
    };
    found.retain(|(_, op)| op.precedence() == loosest);
    found
}

/// A `+`/`-` with no left operand is a sign, not a binary operator.
fn is_prefix_position(source: &str, at: usize) -> bool {
    match source[..at].trim_end().chars().last() {
        None => true,
        Some(c) => "+-*/%<>=!&|?:,".contains(c),
    }
}

/// The sign of an exponent, as in `1e-5` or `2.5E+3`: directly preceded by
/// an `e` that ends a run of digits, itself not part of an identifier.
fn is_exponent_sign(source: &str, at: usize) -> bool {
    let Some(mantissa) = source[..at]
        .strip_suffix('e')
        .or_else(|| source[..at].strip_suffix('E'))
    else {
        return false;
    };
    let run = mantissa
        .trim_end_matches(|c: char| c.is_ascii_digit() || c == '.')
        .len();
    let digits = &mantissa[run..];
    let starts_word = mantissa[..run]
        .chars()
        .last()
        .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$');
    digits.chars().any(|c| c.is_ascii_digit()) && !starts_word
}

/// A complete quoted string literal, with escapes processed.
fn parse_string(source: &str) -> Option<String> {
    let mut chars = source.char_indices();
    let quote = match chars.next() {
        Some((_, q @ ('"' | '\''))) => q,
        _ => return None,
    };

    let mut value = String::new();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, 'n')) => value.push('\n'),
                Some((_, 't')) => value.push('\t'),
                Some((_, 'r')) => value.push('\r'),
                Some((_, '\\')) => value.push('\\'),
                Some((_, c)) if c == quote => value.push(c),
                Some((_, c)) => {
                    value.push('\\');
                    value.push(c);
                }
                None => return None,
            },
            c if c == quote => {
                return (i + c.len_utf8() == source.len()).then_some(value);
            }
            c => value.push(c),
        }
    }
    None
}

/// Decimal number literal (`42`, `3.14`, `.5`, `1e3`). Words such as
/// `inf` or `NaN` are not numbers here.
fn parse_number(source: &str) -> Option<f64> {
    let mut chars = source.chars();
    let starts_numeric = match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('.') => chars.next().is_some_and(|c| c.is_ascii_digit()),
        _ => false,
    };
    if !starts_numeric
        || !source
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
    {
        return None;
    }
    source.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Expression {
        let (expr, errors) = ExprParser::parse(source, Span::default());
        assert!(errors.is_empty(), "unexpected errors for {source:?}: {errors:?}");
        expr
    }

    fn parse_with_errors(source: &str) -> (Expression, Vec<ParseError>) {
        ExprParser::parse(source, Span::default())
    }

    fn var(name: &str) -> Expression {
        Expression::new(
            ExprKind::Variable {
                name: name.into(),
                path: Vec::new(),
            },
            Span::default(),
        )
    }

    fn num(n: f64) -> Expression {
        Expression::new(ExprKind::Literal(Literal::Number(n)), Span::default())
    }

    fn bin(op: BinaryOp, left: Expression, right: Expression) -> Expression {
        Expression::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            Span::default(),
        )
    }

    // =========================================================================
    // Literals
    // =========================================================================

    #[test]
    fn test_number_literals() {
        assert_eq!(parse("42"), num(42.0));
        assert_eq!(parse("3.5"), num(3.5));
        assert_eq!(parse("-2"), num(-2.0));
    }

    #[test]
    fn test_signed_exponent_literals() {
        assert_eq!(parse("1e-5"), num(1e-5));
        assert_eq!(parse("2.5e+1"), num(25.0));
        assert_eq!(parse("1E3"), num(1000.0));
        assert_eq!(parse("-1e-2"), num(-0.01));
        assert_eq!(parse("x * 1e-3"), bin(BinaryOp::Mul, var("x"), num(1e-3)));
        assert_eq!(parse("1e2-5"), bin(BinaryOp::Sub, num(100.0), num(5.0)));
    }

    #[test]
    fn test_identifier_ending_in_e_still_subtracts() {
        assert_eq!(parse("size-1"), bin(BinaryOp::Sub, var("size"), num(1.0)));
        assert_eq!(parse("x2e-1"), bin(BinaryOp::Sub, var("x2e"), num(1.0)));
    }

    #[test]
    fn test_string_literals() {
        assert_eq!(
            parse(r#""a \"q\" b""#).kind,
            ExprKind::Literal(Literal::String("a \"q\" b".into()))
        );
        assert_eq!(
            parse("'it\\'s'").kind,
            ExprKind::Literal(Literal::String("it's".into()))
        );
    }

    #[test]
    fn test_keyword_literals() {
        assert_eq!(parse("true").kind, ExprKind::Literal(Literal::Boolean(true)));
        assert_eq!(parse("false").kind, ExprKind::Literal(Literal::Boolean(false)));
        assert_eq!(parse("null").kind, ExprKind::Literal(Literal::Null));
    }

    #[test]
    fn test_inf_is_a_variable() {
        assert_eq!(parse("inf"), var("inf"));
    }

    // =========================================================================
    // Variables and paths
    // =========================================================================

    #[test]
    fn test_dotted_path() {
        let expr = parse("user.address.city");
        assert_eq!(
            expr.kind,
            ExprKind::Variable {
                name: "user".into(),
                path: vec![
                    PathSegment::Property("address".into()),
                    PathSegment::Property("city".into()),
                ],
            }
        );
    }

    #[test]
    fn test_bracket_path_keeps_order() {
        let expr = parse("rows[0].cells[\"name\"]");
        let ExprKind::Variable { name, path } = expr.kind else {
            panic!("expected variable");
        };
        assert_eq!(name, "rows");
        assert_eq!(path.len(), 3);
        assert_eq!(path[0], PathSegment::Index(Box::new(num(0.0))));
        assert_eq!(path[1], PathSegment::Property("cells".into()));
        assert_eq!(
            path[2],
            PathSegment::Index(Box::new(Expression::new(
                ExprKind::Literal(Literal::String("name".into())),
                Span::default()
            )))
        );
    }

    #[test]
    fn test_dynamic_index() {
        let ExprKind::Variable { path, .. } = parse("row[key]").kind else {
            panic!("expected variable");
        };
        assert_eq!(path, vec![PathSegment::Index(Box::new(var("key")))]);
    }

    #[test]
    fn test_unparseable_head_degrades() {
        assert_eq!(parse("9lives"), var("9lives"));
        assert_eq!(parse("a b"), var("a b"));
    }

    // =========================================================================
    // Calls
    // =========================================================================

    #[test]
    fn test_function_call() {
        assert_eq!(
            parse("range(1, 3)").kind,
            ExprKind::FunctionCall {
                name: "range".into(),
                args: vec![num(1.0), num(3.0)],
                object: None,
            }
        );
    }

    #[test]
    fn test_method_call_receiver() {
        let ExprKind::FunctionCall { name, args, object } = parse("user.name.upper()").kind else {
            panic!("expected call");
        };
        assert_eq!(name, "upper");
        assert!(args.is_empty());
        assert_eq!(
            object.unwrap().kind,
            ExprKind::Variable {
                name: "user".into(),
                path: vec![PathSegment::Property("name".into())],
            }
        );
    }

    // =========================================================================
    // Operators
    // =========================================================================

    #[test]
    fn test_precedence_mul_over_add() {
        assert_eq!(
            parse("a + b * c"),
            bin(BinaryOp::Add, var("a"), bin(BinaryOp::Mul, var("b"), var("c")))
        );
    }

    #[test]
    fn test_left_associative_subtraction() {
        assert_eq!(
            parse("a - b - c"),
            bin(BinaryOp::Sub, bin(BinaryOp::Sub, var("a"), var("b")), var("c"))
        );
    }

    #[test]
    fn test_mixed_additive_chain_folds_left() {
        assert_eq!(
            parse("a - b + c - d"),
            bin(
                BinaryOp::Sub,
                bin(BinaryOp::Add, bin(BinaryOp::Sub, var("a"), var("b")), var("c")),
                var("d")
            )
        );
    }

    #[test]
    fn test_long_chain_is_not_a_nesting_problem() {
        let source = vec!["x"; 500].join(" + ");
        let (expr, errors) = parse_with_errors(&source);
        assert!(errors.is_empty());
        let ExprKind::Binary { op, right, .. } = expr.kind else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Add);
        assert_eq!(*right, var("x"));
    }

    #[test]
    fn test_logical_looser_than_comparison() {
        assert_eq!(
            parse("a == 1 && b > 2 || c"),
            bin(
                BinaryOp::Or,
                bin(
                    BinaryOp::And,
                    bin(BinaryOp::Eq, var("a"), num(1.0)),
                    bin(BinaryOp::Gt, var("b"), num(2.0))
                ),
                var("c")
            )
        );
    }

    #[test]
    fn test_strict_and_compound_operators() {
        assert_eq!(parse("a === b"), bin(BinaryOp::StrictEq, var("a"), var("b")));
        assert_eq!(parse("a !== b"), bin(BinaryOp::StrictNeq, var("a"), var("b")));
        assert_eq!(parse("a <= b"), bin(BinaryOp::Lte, var("a"), var("b")));
        assert_eq!(parse("a != b"), bin(BinaryOp::Neq, var("a"), var("b")));
    }

    #[test]
    fn test_negative_operand() {
        assert_eq!(parse("a * -2"), bin(BinaryOp::Mul, var("a"), num(-2.0)));
    }

    #[test]
    fn test_operators_inside_strings_ignored() {
        assert_eq!(
            parse("'a + b'").kind,
            ExprKind::Literal(Literal::String("a + b".into()))
        );
    }

    #[test]
    fn test_unary_not() {
        assert_eq!(
            parse("!done").kind,
            ExprKind::Unary {
                op: UnaryOp::Not,
                operand: Box::new(var("done")),
            }
        );
    }

    #[test]
    fn test_paren_overrides_precedence() {
        let expr = parse("(a + b) * c");
        let ExprKind::Binary { op, left, .. } = expr.kind else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Mul);
        assert!(matches!(left.kind, ExprKind::Paren(_)));
    }

    #[test]
    fn test_ternary_nested_in_false_branch() {
        let ExprKind::Ternary { false_value, .. } = parse("a ? 1 : b ? 2 : 3").kind else {
            panic!("expected ternary");
        };
        assert!(matches!(false_value.kind, ExprKind::Ternary { .. }));
    }

    // =========================================================================
    // Filters
    // =========================================================================

    #[test]
    fn test_filter_chain_order() {
        let ExprKind::Filter { source, filters } =
            parse("name | lower | truncate(10, '...')").kind
        else {
            panic!("expected filter");
        };
        assert_eq!(*source, var("name"));
        let names: Vec<&str> = filters.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["lower", "truncate"]);
        assert_eq!(filters[1].args.len(), 2);
    }

    #[test]
    fn test_filter_binds_tighter_than_binary() {
        let ExprKind::Binary { op, left, .. } = parse("a | length + 1").kind else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Add);
        assert!(matches!(left.kind, ExprKind::Filter { .. }));
    }

    #[test]
    fn test_or_is_not_a_pipe() {
        assert_eq!(parse("a || b"), bin(BinaryOp::Or, var("a"), var("b")));
    }

    #[test]
    fn test_pipe_inside_argument_string() {
        let ExprKind::Filter { filters, .. } = parse("items | join(' | ')").kind else {
            panic!("expected filter");
        };
        assert_eq!(filters.len(), 1);
    }

    // =========================================================================
    // Collections
    // =========================================================================

    #[test]
    fn test_array_literal() {
        assert_eq!(
            parse("[1, 2, 3,]").kind,
            ExprKind::Array(vec![num(1.0), num(2.0), num(3.0)])
        );
        assert_eq!(parse("[]").kind, ExprKind::Array(Vec::new()));
    }

    #[test]
    fn test_object_literal() {
        let ExprKind::Object(props) = parse("{ name: 'x', \"n-2\": 2, short }").kind else {
            panic!("expected object");
        };
        let keys: Vec<&str> = props.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["name", "n-2", "short"]);
        assert_eq!(props[2].value, var("short"));
    }

    // =========================================================================
    // Errors
    // =========================================================================

    #[test]
    fn test_empty_expression() {
        let (expr, errors) = parse_with_errors("   ");
        assert!(matches!(expr.kind, ExprKind::Error { .. }));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ParseErrorKind::Syntax);
    }

    #[test]
    fn test_missing_operand() {
        let (expr, errors) = parse_with_errors("a +");
        let ExprKind::Binary { right, .. } = expr.kind else {
            panic!("expected binary");
        };
        assert!(matches!(right.kind, ExprKind::Error { .. }));
        assert_eq!(errors[0].message, "Missing operand for '+'");
    }

    #[test]
    fn test_unbalanced_reported() {
        let (_, errors) = parse_with_errors("f(a");
        assert!(errors.iter().any(|e| e.message.starts_with("Unbalanced")));
    }

    #[test]
    fn test_deep_parens_are_rejected() {
        let source = format!("{}1{}", "(".repeat(1000), ")".repeat(1000));
        let (_, errors) = parse_with_errors(&source);
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].message,
            format!("Expression nested deeper than {MAX_EXPR_DEPTH} levels")
        );
    }

    #[test]
    fn test_deep_prefix_operators_are_rejected() {
        let source = format!("{}x", "!".repeat(1000));
        let (_, errors) = parse_with_errors(&source);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ParseErrorKind::Syntax);
    }

    #[test]
    fn test_moderate_nesting_is_accepted() {
        let source = format!("{}1{}", "(".repeat(20), ")".repeat(20));
        let (_, errors) = parse_with_errors(&source);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_ternary_without_colon() {
        let (expr, errors) = parse_with_errors("a ? b");
        assert!(matches!(expr.kind, ExprKind::Error { .. }));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_empty_filter_name() {
        let (_, errors) = parse_with_errors("a | ");
        assert_eq!(errors[0].message, "Missing filter name after '|'");
    }

    #[test]
    fn test_identifier_check() {
        assert!(is_identifier("item_2"));
        assert!(!is_identifier("2item"));
        assert!(!is_identifier("a.b"));
        assert!(!is_identifier(""));
    }
}
