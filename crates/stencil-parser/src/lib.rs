//! Stencil Parser
//!
//! Turns the token stream from `stencil-lexer` into a [`Template`] AST.
//! Statement structure (`if`/`for`/`set`/`block`) is handled by
//! [`Parser`]; the inline expression language (operators, filters, paths,
//! literals) by [`expr_parser`].
//!
//! Parsing never fails. Broken or half-typed templates still produce a
//! best-effort tree plus a list of [`ParseError`] diagnostics, so editor
//! tooling can keep working on documents mid-edit.
//!
//! ```
//! use stencil_parser::parse_source;
//! use stencil_lexer::Delimiters;
//!
//! let out = parse_source("{% if x %}yes", &Delimiters::default()).unwrap();
//! assert_eq!(out.ast.children.len(), 1);
//! assert_eq!(out.errors.len(), 1);
//! ```

pub mod ast;
pub mod expr_parser;
pub mod parser;
pub mod schema;

pub use ast::{Expression, ExprKind, Node, NodeKind, Template};
pub use parser::Parser;

use stencil_lexer::{Delimiters, LexerError, Scanner, Span, Token};

/// Diagnostic category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseErrorKind {
    /// Malformed statement or expression.
    Syntax,
    /// Structure the parser had to repair (missing or stray closing tags).
    Recovery,
    /// Well-formed but suspicious input (reserved or invalid names, unknown data paths).
    Validation,
}

impl std::fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ParseErrorKind::Syntax => "syntax",
            ParseErrorKind::Recovery => "recovery",
            ParseErrorKind::Validation => "validation",
        })
    }
}

/// Parser diagnostic with position information.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error(
    "Parse error at line {}, column {}: {message}",
    location.start.line,
    location.start.column
)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub location: Span,
    pub suggestion: Option<String>,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, message: impl Into<String>, location: Span) -> Self {
        Self {
            kind,
            message: message.into(),
            location,
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Result of parsing: always a tree, plus whatever went wrong along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutput {
    pub ast: Template,
    pub errors: Vec<ParseError>,
}

/// Parse an already tokenized template.
pub fn parse(tokens: Vec<Token>) -> ParseOutput {
    Parser::parse(tokens)
}

/// Tokenize and parse in one step. Only tokenization can fail.
pub fn parse_source(source: &str, delimiters: &Delimiters) -> Result<ParseOutput, LexerError> {
    let tokens = Scanner::tokenize_with(source, delimiters)?;
    Ok(Parser::parse(tokens))
}
