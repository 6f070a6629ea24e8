//! Expression parsing.
//!
//! Binary operators use a Pratt loop over binding powers; everything else is
//! plain recursive descent. `let`, `if` and `fun` extend as far right as
//! possible, as in OCaml, so they may appear as the right operand of an
//! operator but never need parentheses to end.

use fern_common::span::Span;
use fern_common::token::TokenKind;

use crate::ast::{BinOp, Expr, ExprKind};
use crate::error::ParseError;

use super::{PResult, Parser};

// ── Binding Power Tables ───────────────────────────────────────────────

/// Returns (left_bp, right_bp) for infix operators. All are left-associative.
fn infix_binding_power(op: TokenKind) -> Option<(BinOp, u8, u8)> {
    let entry = match op {
        TokenKind::Eq => (BinOp::Eq, 1, 2),
        TokenKind::NotEq => (BinOp::NotEq, 1, 2),
        TokenKind::Lt => (BinOp::Lt, 1, 2),
        TokenKind::LtEq => (BinOp::LtEq, 1, 2),
        TokenKind::Gt => (BinOp::Gt, 1, 2),
        TokenKind::GtEq => (BinOp::GtEq, 1, 2),

        TokenKind::Plus => (BinOp::Add, 3, 4),
        TokenKind::Minus => (BinOp::Sub, 3, 4),

        TokenKind::Star => (BinOp::Mul, 5, 6),
        TokenKind::Slash | TokenKind::Div => (BinOp::Div, 5, 6),
        TokenKind::Mod => (BinOp::Mod, 5, 6),

        _ => return None,
    };
    Some(entry)
}

/// Tokens that can begin an application argument.
fn starts_atom(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::IntLiteral
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Ident
            | TokenKind::LParen
    )
}

/// `expr := stmt (';' expr)?`
pub(crate) fn expr(p: &mut Parser) -> PResult<Expr> {
    let first = stmt(p)?;
    if p.eat(TokenKind::Semicolon) {
        let second = expr(p)?;
        return Ok(p.ast.sequence(first, second));
    }
    Ok(first)
}

/// A sequence-free expression.
pub(crate) fn stmt(p: &mut Parser) -> PResult<Expr> {
    match p.current() {
        TokenKind::Let => let_in(p),
        TokenKind::If => if_expr(p),
        TokenKind::Fun => lambda(p),
        _ => expr_bp(p, 0),
    }
}

fn expr_bp(p: &mut Parser, min_bp: u8) -> PResult<Expr> {
    let mut lhs = application(p)?;

    loop {
        let Some((op, l_bp, r_bp)) = infix_binding_power(p.current()) else {
            break;
        };
        if l_bp < min_bp {
            break;
        }
        p.advance();

        let rhs = match p.current() {
            TokenKind::Let | TokenKind::If | TokenKind::Fun => stmt(p)?,
            _ => expr_bp(p, r_bp)?,
        };
        lhs = p.ast.binary(op, lhs, rhs);
    }

    Ok(lhs)
}

/// `app := atom atom*`, left-associative.
fn application(p: &mut Parser) -> PResult<Expr> {
    let mut callee = atom(p)?;
    while starts_atom(p.current()) {
        let arg = atom(p)?;
        callee = p.ast.apply(callee, arg);
    }
    Ok(callee)
}

fn atom(p: &mut Parser) -> PResult<Expr> {
    match p.current() {
        TokenKind::IntLiteral => {
            let tok = p.advance();
            let text = p.text(&tok);
            // The lexer already rejected literals that overflow.
            let value = text.parse::<i64>().map_err(|_| {
                ParseError::new(format!("invalid integer literal `{text}`"), tok.span)
            })?;
            Ok(p.ast.int(value))
        }
        TokenKind::True => {
            p.advance();
            Ok(p.ast.bool(true))
        }
        TokenKind::False => {
            p.advance();
            Ok(p.ast.bool(false))
        }
        TokenKind::Ident => {
            let name = p.expect_ident()?;
            Ok(p.ast.expr(ExprKind::Ident(name)))
        }
        TokenKind::LParen => paren(p),
        _ => Err(p.error_expected("expression")),
    }
}

/// `()`, `(e)` or `(e1, e2, ...)`.
fn paren(p: &mut Parser) -> PResult<Expr> {
    let open = p.advance().span;
    if p.eat(TokenKind::RParen) {
        return Ok(p.ast.unit());
    }

    let first = expr(p)?;
    if !p.at(TokenKind::Comma) {
        close_paren(p, open)?;
        return Ok(first);
    }

    let mut elems = vec![first];
    while p.eat(TokenKind::Comma) {
        elems.push(expr(p)?);
    }
    close_paren(p, open)?;
    Ok(p.ast.tuple(elems))
}

fn close_paren(p: &mut Parser, open: Span) -> PResult<()> {
    if p.eat(TokenKind::RParen) {
        return Ok(());
    }
    let err = p.error_expected(TokenKind::RParen.describe());
    Err(ParseError::with_related(
        err.message,
        err.span,
        "parenthesis opened here",
        open,
    ))
}

/// The part of a binding shared by `let ... in` and top-level `let ... ;;`:
/// `'let' 'rec'? IDENT IDENT* '=' expr`. Parameters become curried lambdas.
pub(crate) struct Binding {
    pub name: String,
    pub value: Expr,
    pub recursive: bool,
}

pub(crate) fn binding(p: &mut Parser) -> PResult<Binding> {
    p.expect(TokenKind::Let)?;
    let recursive = p.eat(TokenKind::Rec);
    let name = p.expect_ident()?;

    let mut params = Vec::new();
    while p.at(TokenKind::Ident) {
        params.push(p.expect_ident()?);
    }

    p.expect(TokenKind::Eq)?;
    let body = expr(p)?;
    let value = p.ast.lambdas(&params, body);

    Ok(Binding {
        name,
        value,
        recursive,
    })
}

fn let_in(p: &mut Parser) -> PResult<Expr> {
    let Binding {
        name,
        value,
        recursive,
    } = binding(p)?;
    p.expect(TokenKind::In)?;
    let body = expr(p)?;
    Ok(p.ast.let_in(&name, value, body, recursive))
}

fn if_expr(p: &mut Parser) -> PResult<Expr> {
    p.expect(TokenKind::If)?;
    let cond = expr(p)?;
    p.expect(TokenKind::Then)?;
    let then_branch = stmt(p)?;
    p.expect(TokenKind::Else)?;
    let else_branch = stmt(p)?;
    Ok(p.ast.if_else(cond, then_branch, else_branch))
}

/// `fun x y -> body`, curried.
fn lambda(p: &mut Parser) -> PResult<Expr> {
    p.expect(TokenKind::Fun)?;
    let mut params = vec![p.expect_ident()?];
    while p.at(TokenKind::Ident) {
        params.push(p.expect_ident()?);
    }
    p.expect(TokenKind::Arrow)?;
    let body = expr(p)?;
    Ok(p.ast.lambdas(&params, body))
}
