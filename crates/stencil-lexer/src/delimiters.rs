use crate::token::TokenKind;
use crate::LexerError;

/// The six literal strings that open and close directives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    pub statement_start: String,
    pub statement_end: String,
    pub expression_start: String,
    pub expression_end: String,
    pub comment_start: String,
    pub comment_end: String,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            statement_start: "{%".into(),
            statement_end: "%}".into(),
            expression_start: "{{".into(),
            expression_end: "}}".into(),
            comment_start: "{#".into(),
            comment_end: "#}".into(),
        }
    }
}

impl Delimiters {
    /// Reject configurations the scanner could never make progress with.
    pub fn validate(&self) -> Result<(), LexerError> {
        let fields = [
            ("statement_start", self.statement_start.as_str()),
            ("statement_end", self.statement_end.as_str()),
            ("expression_start", self.expression_start.as_str()),
            ("expression_end", self.expression_end.as_str()),
            ("comment_start", self.comment_start.as_str()),
            ("comment_end", self.comment_end.as_str()),
        ];
        for (which, value) in fields {
            if value.is_empty() {
                return Err(LexerError::EmptyDelimiter { which });
            }
        }
        Ok(())
    }

    /// Start/end pairs in match priority order: comment, statement, expression.
    pub fn pairs(&self) -> [(TokenKind, &str, &str); 3] {
        [
            (TokenKind::Comment, self.comment_start.as_str(), self.comment_end.as_str()),
            (TokenKind::Statement, self.statement_start.as_str(), self.statement_end.as_str()),
            (TokenKind::Expression, self.expression_start.as_str(), self.expression_end.as_str()),
        ]
    }
}
