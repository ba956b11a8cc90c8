use crate::delimiters::Delimiters;
use crate::token::{Position, Span, Token, TokenKind};
use crate::LexerError;

/// Template source scanner.
///
/// A single forward pass over the source. At every position the configured
/// start delimiters are tried in priority order (comment, statement,
/// expression); on a match the scanner jumps to the matching end delimiter
/// and emits one token covering both delimiters and the body. Everything
/// else accumulates into text tokens.
///
/// Positions are tracked on every token. `\n`, `\r\n` and a bare `\r` each
/// count as exactly one line break.
pub struct Scanner<'a> {
    source: &'a str,
    delimiters: &'a Delimiters,
    pos: usize,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
    text_start: Option<(usize, Position)>,
}

impl<'a> Scanner<'a> {
    /// Create a new scanner for the given source and delimiters.
    pub fn new(source: &'a str, delimiters: &'a Delimiters) -> Self {
        Self {
            source,
            delimiters,
            pos: 0,
            line: 1,
            column: 0,
            tokens: Vec::new(),
            text_start: None,
        }
    }

    /// Tokenize with the default `{% %}`, `{{ }}`, `{# #}` delimiters.
    pub fn tokenize(source: &str) -> Result<Vec<Token>, LexerError> {
        Self::tokenize_with(source, &Delimiters::default())
    }

    /// Tokenize with a custom delimiter configuration.
    pub fn tokenize_with(source: &str, delimiters: &Delimiters) -> Result<Vec<Token>, LexerError> {
        delimiters.validate()?;
        let mut scanner = Scanner::new(source, delimiters);
        scanner.scan_tokens()?;
        Ok(scanner.tokens)
    }

    /// Scan all tokens from the source.
    fn scan_tokens(&mut self) -> Result<(), LexerError> {
        while !self.is_at_end() {
            match self.match_open() {
                Some((kind, open, close)) => {
                    self.flush_text();
                    self.scan_directive(kind, open, close)?;
                }
                None => {
                    if self.text_start.is_none() {
                        self.text_start = Some((self.pos, self.position()));
                    }
                    self.advance();
                }
            }
        }

        self.flush_text();
        Ok(())
    }

    /// Find the highest-priority start delimiter at the current position.
    fn match_open(&self) -> Option<(TokenKind, &'a str, &'a str)> {
        let rest = &self.source[self.pos..];
        self.delimiters
            .pairs()
            .into_iter()
            .find(|(_, open, _)| rest.starts_with(open))
    }

    /// Scan one directive from its start delimiter through its end delimiter.
    fn scan_directive(
        &mut self,
        kind: TokenKind,
        open: &str,
        close: &str,
    ) -> Result<(), LexerError> {
        let start_pos = self.pos;
        let start = self.position();

        self.advance_bytes(open.len());

        let Some(offset) = self.source[self.pos..].find(close) else {
            return Err(LexerError::UnclosedDelimiter {
                delimiter: open.to_string(),
                position: start,
            });
        };

        self.advance_bytes(offset + close.len());

        let content = self.source[start_pos..self.pos].to_string();
        let inner = open.len()..content.len() - close.len();
        let span = Span::new(start, self.position());
        self.tokens.push(Token::new(kind, content, span, inner));
        Ok(())
    }

    /// Emit the pending text run, if any.
    fn flush_text(&mut self) {
        if let Some((start_pos, start)) = self.text_start.take() {
            let content = self.source[start_pos..self.pos].to_string();
            let span = Span::new(start, self.position());
            self.tokens.push(Token::text(content, span));
        }
    }

    // --- Helpers ---

    fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    /// Advance one character, updating line and column.
    fn advance(&mut self) {
        let Some(ch) = self.peek() else {
            return;
        };
        self.pos += ch.len_utf8();

        match ch {
            '\n' => {
                self.line += 1;
                self.column = 0;
            }
            // `\r\n` breaks once, on the `\n`
            '\r' if self.peek() == Some('\n') => {
                self.column += 1;
            }
            '\r' => {
                self.line += 1;
                self.column = 0;
            }
            _ => self.column += 1,
        }
    }

    /// Advance by `count` bytes, one character at a time.
    fn advance_bytes(&mut self, count: usize) {
        let target = self.pos + count;
        while self.pos < target && !self.is_at_end() {
            self.advance();
        }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.source.len()
    }
}
