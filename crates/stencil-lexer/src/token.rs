use std::ops::Range;

/// A position in source text. Lines are 1-indexed, columns 0-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new(1, 0)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A half-open source range: `end` is the position just past the last character.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

/// Token classification for template source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Literal text between directives.
    Text,
    /// `{% keyword ... %}`
    Statement,
    /// `{{ expr }}`
    Expression,
    /// `{# ... #}`
    Comment,
}

/// A token produced by the lexer.
///
/// `content` holds the exact source slice, delimiters included, so that
/// concatenating every token's content reproduces the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub content: String,
    pub span: Span,
    /// Byte range of the body inside `content` (between the delimiters).
    pub inner: Range<usize>,
}

impl Token {
    pub fn new(kind: TokenKind, content: String, span: Span, inner: Range<usize>) -> Self {
        Self {
            kind,
            content,
            span,
            inner,
        }
    }

    /// A text token whose body is its whole content.
    pub fn text(content: String, span: Span) -> Self {
        let len = content.len();
        Self::new(TokenKind::Text, content, span, 0..len)
    }

    /// The body between the delimiters (the whole content for text tokens).
    pub fn inner(&self) -> &str {
        &self.content[self.inner.clone()]
    }
}
