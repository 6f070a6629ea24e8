use serde::Serialize;

use crate::span::Span;

/// A token produced by the Fern lexer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, start: u32, end: u32) -> Self {
        Self {
            kind,
            span: Span::new(start, end),
        }
    }
}

/// Every kind of token in Fern.
///
/// Comments and whitespace never reach the parser, so there are no trivia
/// kinds here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    // ── Keywords ───────────────────────────────────────────────────────
    Let,
    Rec,
    In,
    If,
    Then,
    Else,
    Fun,
    True,
    False,
    /// `div`, an alias for `/`.
    Div,
    Mod,

    // ── Operators ──────────────────────────────────────────────────────
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `=`, both the binding sign and structural equality.
    Eq,
    /// `<>`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
    /// `->`
    Arrow,

    // ── Delimiters and punctuation ─────────────────────────────────────
    LParen,
    RParen,
    Comma,
    /// `;`, sequencing inside an expression.
    Semicolon,
    /// `;;`, terminates a top-level item.
    SemiSemi,

    // ── Literals and names ─────────────────────────────────────────────
    IntLiteral,
    Ident,

    // ── Special ────────────────────────────────────────────────────────
    Eof,
    /// Input the lexer could not make sense of. The parser reports it.
    Error,
}

impl TokenKind {
    /// How the token is spelled in diagnostics.
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Let => "`let`",
            TokenKind::Rec => "`rec`",
            TokenKind::In => "`in`",
            TokenKind::If => "`if`",
            TokenKind::Then => "`then`",
            TokenKind::Else => "`else`",
            TokenKind::Fun => "`fun`",
            TokenKind::True => "`true`",
            TokenKind::False => "`false`",
            TokenKind::Div => "`div`",
            TokenKind::Mod => "`mod`",
            TokenKind::Plus => "`+`",
            TokenKind::Minus => "`-`",
            TokenKind::Star => "`*`",
            TokenKind::Slash => "`/`",
            TokenKind::Eq => "`=`",
            TokenKind::NotEq => "`<>`",
            TokenKind::Lt => "`<`",
            TokenKind::LtEq => "`<=`",
            TokenKind::Gt => "`>`",
            TokenKind::GtEq => "`>=`",
            TokenKind::Arrow => "`->`",
            TokenKind::LParen => "`(`",
            TokenKind::RParen => "`)`",
            TokenKind::Comma => "`,`",
            TokenKind::Semicolon => "`;`",
            TokenKind::SemiSemi => "`;;`",
            TokenKind::IntLiteral => "integer literal",
            TokenKind::Ident => "identifier",
            TokenKind::Eof => "end of input",
            TokenKind::Error => "invalid input",
        }
    }
}

/// Map an identifier-shaped word to its keyword, if it is one.
pub fn keyword_from_str(s: &str) -> Option<TokenKind> {
    match s {
        "let" => Some(TokenKind::Let),
        "rec" => Some(TokenKind::Rec),
        "in" => Some(TokenKind::In),
        "if" => Some(TokenKind::If),
        "then" => Some(TokenKind::Then),
        "else" => Some(TokenKind::Else),
        "fun" => Some(TokenKind::Fun),
        "true" => Some(TokenKind::True),
        "false" => Some(TokenKind::False),
        "div" => Some(TokenKind::Div),
        "mod" => Some(TokenKind::Mod),
        _ => None,
    }
}
