//! Recursive descent parser over the lexer's token stream.
//!
//! Parsing stops at the first error; there is no recovery. The token vector
//! always ends with `Eof`, so lookahead never runs off the end.

pub(crate) mod expressions;
pub(crate) mod items;

use fern_common::span::Span;
use fern_common::token::{Token, TokenKind};

use crate::ast::AstBuilder;
use crate::error::ParseError;

pub(crate) type PResult<T> = Result<T, ParseError>;

pub(crate) struct Parser<'src> {
    source: &'src str,
    tokens: Vec<Token>,
    pos: usize,
    pub(crate) ast: AstBuilder,
}

impl<'src> Parser<'src> {
    pub(crate) fn new(source: &'src str, tokens: Vec<Token>) -> Self {
        debug_assert!(matches!(tokens.last(), Some(t) if t.kind == TokenKind::Eof));
        Self {
            source,
            tokens,
            pos: 0,
            ast: AstBuilder::new(),
        }
    }

    // ── Lookahead ──────────────────────────────────────────────────────

    fn token(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.pos.min(last)]
    }

    pub(crate) fn current(&self) -> TokenKind {
        self.token().kind
    }

    pub(crate) fn current_span(&self) -> Span {
        self.token().span
    }

    pub(crate) fn at(&self, kind: TokenKind) -> bool {
        self.current() == kind
    }

    // ── Consumption ────────────────────────────────────────────────────

    pub(crate) fn advance(&mut self) -> Token {
        let tok = self.token().clone();
        if tok.kind != TokenKind::Eof {
            self.pos += 1;
        }
        tok
    }

    pub(crate) fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, kind: TokenKind) -> PResult<Token> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            Err(self.error_expected(kind.describe()))
        }
    }

    /// Consume an identifier and return its text.
    pub(crate) fn expect_ident(&mut self) -> PResult<String> {
        let tok = self.expect(TokenKind::Ident)?;
        Ok(self.text(&tok).to_string())
    }

    pub(crate) fn text(&self, tok: &Token) -> &'src str {
        tok.span.text(self.source)
    }

    // ── Errors ─────────────────────────────────────────────────────────

    pub(crate) fn error_expected(&self, what: &str) -> ParseError {
        ParseError::new(
            format!("expected {what}, found {}", self.current().describe()),
            self.current_span(),
        )
    }
}
