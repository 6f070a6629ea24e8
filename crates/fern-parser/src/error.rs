//! Parse error types for the Fern parser.

use std::fmt;

use fern_common::error::LexError;
use fern_common::span::Span;

/// A parse error with location information and optional related span.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    /// Where the problem was detected.
    pub span: Span,
    /// Extra context, e.g. where an unclosed parenthesis was opened.
    pub related: Option<(String, Span)>,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            related: None,
        }
    }

    pub fn with_related(
        message: impl Into<String>,
        span: Span,
        related_message: impl Into<String>,
        related_span: Span,
    ) -> Self {
        Self {
            message: message.into(),
            span,
            related: Some((related_message.into(), related_span)),
        }
    }
}

impl From<LexError> for ParseError {
    fn from(err: LexError) -> Self {
        ParseError::new(err.kind.to_string(), err.span)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseError {}
