use std::fmt;

use serde::Serialize;

use crate::span::Span;

/// A lexer error with its location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LexError {
    pub kind: LexErrorKind,
    pub span: Span,
}

impl LexError {
    pub fn new(kind: LexErrorKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LexErrorKind {
    UnexpectedCharacter(char),
    /// A `(*` comment that never reached its `*)`.
    UnterminatedComment,
    /// Digits that do not fit in a signed 64-bit integer.
    IntegerOverflow(String),
}

impl fmt::Display for LexErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedCharacter(c) => write!(f, "unexpected character: {c:?}"),
            Self::UnterminatedComment => write!(f, "unterminated comment"),
            Self::IntegerOverflow(s) => write!(f, "integer literal out of range: {s}"),
        }
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for LexError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lex_error_display() {
        let err = LexError::new(LexErrorKind::UnexpectedCharacter('@'), Span::new(0, 1));
        assert_eq!(err.to_string(), "unexpected character: '@'");
        assert_eq!(
            LexErrorKind::UnterminatedComment.to_string(),
            "unterminated comment"
        );
        assert_eq!(
            LexErrorKind::IntegerOverflow("99999999999999999999".into()).to_string(),
            "integer literal out of range: 99999999999999999999"
        );
    }
}
