//! Fern parser: recursive descent parser producing an owned AST.
//!
//! The tree is a closed sum type ([`ExprKind`]) so that every later pass can
//! match on it exhaustively. Multi-parameter functions are desugared into
//! curried lambdas here; nothing downstream sees them.

pub mod ast;
pub mod error;
mod parser;

pub use ast::{AstBuilder, BinOp, Expr, ExprKind, Item, NodeId, Program};
pub use error::ParseError;

use fern_common::token::TokenKind;
use fern_lexer::Lexer;

use parser::Parser;

/// Parse a Fern source file.
///
/// Lexing problems are reported as parse errors. Only the first error is
/// returned.
pub fn parse(source: &str) -> Result<Program, ParseError> {
    let mut p = parser_for(source)?;
    parser::items::program(&mut p)
}

/// Parse a single expression, optionally followed by `;;`.
pub fn parse_expr(source: &str) -> Result<Expr, ParseError> {
    let mut p = parser_for(source)?;
    let expr = parser::expressions::expr(&mut p)?;
    parser::items::end_of_item(&mut p)?;
    if !p.at(TokenKind::Eof) {
        return Err(p.error_expected(TokenKind::Eof.describe()));
    }
    Ok(expr)
}

fn parser_for(source: &str) -> Result<Parser<'_>, ParseError> {
    let lexed = Lexer::tokenize(source);
    if let Some(err) = lexed.errors.into_iter().next() {
        return Err(err.into());
    }
    Ok(Parser::new(source, lexed.tokens))
}
