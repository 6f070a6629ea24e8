//! Top-level items.
//!
//! A `let` at the top level is either a global binding (`let x = e;;`) or the
//! head of an ordinary `let ... in` expression; the token after the value
//! decides which. The last item may omit its `;;`.

use fern_common::token::TokenKind;

use crate::ast::{Item, Program};

use super::expressions::{self, Binding};
use super::{PResult, Parser};

pub(crate) fn program(p: &mut Parser) -> PResult<Program> {
    let mut items = Vec::new();
    while !p.at(TokenKind::Eof) {
        // Stray separators between items are harmless.
        if p.eat(TokenKind::SemiSemi) {
            continue;
        }
        items.push(item(p)?);
        end_of_item(p)?;
    }
    Ok(Program { items })
}

fn item(p: &mut Parser) -> PResult<Item> {
    if !p.at(TokenKind::Let) {
        return Ok(Item::Expr(expressions::expr(p)?));
    }

    let Binding {
        name,
        value,
        recursive,
    } = expressions::binding(p)?;

    if p.eat(TokenKind::In) {
        let body = expressions::expr(p)?;
        let expr = p.ast.let_in(&name, value, body, recursive);
        return Ok(Item::Expr(expr));
    }

    Ok(Item::Let {
        name,
        value,
        recursive,
    })
}

pub(crate) fn end_of_item(p: &mut Parser) -> PResult<()> {
    if p.eat(TokenKind::SemiSemi) || p.at(TokenKind::Eof) {
        Ok(())
    } else {
        Err(p.error_expected(TokenKind::SemiSemi.describe()))
    }
}
