//! Stencil Lexer
//!
//! Splits template source into a flat stream of position-annotated tokens:
//! literal text runs, `{% statements %}`, `{{ expressions }}` and
//! `{# comments #}`. Delimiters are literal strings and can be swapped out
//! through [`Delimiters`].
//!
//! # Example
//!
//! ```
//! use stencil_lexer::{Scanner, TokenKind};
//!
//! let tokens = Scanner::tokenize("Hello {{ name }}!").unwrap();
//! assert_eq!(tokens.len(), 3);
//! assert_eq!(tokens[1].kind, TokenKind::Expression);
//! assert_eq!(tokens[1].inner(), " name ");
//! ```

pub mod delimiters;
pub mod scanner;
pub mod token;

pub use delimiters::Delimiters;
pub use scanner::Scanner;
pub use token::{Position, Span, Token, TokenKind};

/// Lexer error with position information.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LexerError {
    /// A start delimiter was opened but its end delimiter never appeared.
    #[error(
        "Unclosed delimiter '{delimiter}' at line {}, column {}",
        position.line,
        position.column
    )]
    UnclosedDelimiter {
        delimiter: String,
        position: Position,
    },

    /// A delimiter in the configuration is the empty string.
    #[error("Delimiter '{which}' must not be empty")]
    EmptyDelimiter { which: &'static str },
}

impl LexerError {
    /// Source position the error refers to, if any.
    pub fn position(&self) -> Option<Position> {
        match self {
            LexerError::UnclosedDelimiter { position, .. } => Some(*position),
            LexerError::EmptyDelimiter { .. } => None,
        }
    }
}
