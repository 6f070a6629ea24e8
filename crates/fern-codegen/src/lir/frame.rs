//! Frame sizing.
//!
//! Before a function body is lowered, [`slots_needed`] walks it once and
//! counts the frame slots lowering will allocate. Nested non-function lets
//! share the enclosing frame; lambda bodies get frames of their own and are
//! not entered.
//!
//! The count mirrors [`super::lower`] exactly: one slot per `let`, binary
//! operator, tuple and non-intrinsic application, plus one per inline
//! application of a two-argument builtin.

use fern_parser::{Expr, ExprKind, Item, Program};
use fern_typeck::builtins::Builtin;

/// Slots needed to lower `body`, where `bound` holds every name visible to
/// it that is not a builtin (parameter, captures, enclosing locals).
pub fn slots_needed(body: &Expr, bound: &[&str]) -> u32 {
    let mut scope: Vec<&str> = bound.to_vec();
    count(body, &mut scope)
}

/// Slots the entry block needs for a whole program. Every top-level `let`
/// keeps its slot for the rest of the program.
pub fn program_slots(program: &Program) -> u32 {
    let mut scope: Vec<&str> = Vec::new();
    let mut total = 0;
    for item in &program.items {
        match item {
            Item::Let {
                name,
                value,
                recursive,
            } => {
                if !*recursive {
                    total += count(value, &mut scope);
                }
                total += 1;
                scope.push(name);
            }
            Item::Expr(expr) => total += count(expr, &mut scope),
        }
    }
    total
}

/// Slot space in bytes, rounded up so `rsp` stays 16-byte aligned.
pub fn frame_bytes(slots: u32) -> u32 {
    (slots * 8).div_ceil(16) * 16
}

/// An application of an unshadowed builtin, expanded inline instead of
/// called through a closure.
#[derive(Debug)]
pub(crate) enum Intrinsic<'e> {
    /// `b arg`. For a two-argument builtin this is a partial application.
    Unary(Builtin, &'e Expr),
    /// `b first second` for a two-argument builtin.
    Saturated(Builtin, &'e Expr, &'e Expr),
}

/// Classify the application `callee arg`.
pub(crate) fn intrinsic<'e>(
    callee: &'e Expr,
    arg: &'e Expr,
    is_bound: impl Fn(&str) -> bool,
) -> Option<Intrinsic<'e>> {
    let builtin = |expr: &Expr| match &expr.kind {
        ExprKind::Ident(name) if !is_bound(name) => Builtin::from_name(name),
        _ => None,
    };
    if let Some(b) = builtin(callee) {
        return Some(Intrinsic::Unary(b, arg));
    }
    match &callee.kind {
        ExprKind::Apply {
            callee: inner,
            arg: first,
        } => match builtin(inner) {
            Some(b) if b.arity() == 2 => Some(Intrinsic::Saturated(b, &**first, arg)),
            _ => None,
        },
        _ => None,
    }
}

/// Slots an inline `Unary` application of `builtin` needs for itself. A
/// partially applied builtin keeps its argument while the closure record
/// is allocated.
pub(crate) fn partial_slots(builtin: Builtin) -> u32 {
    u32::from(builtin.arity() == 2)
}

fn count<'e>(expr: &'e Expr, scope: &mut Vec<&'e str>) -> u32 {
    match &expr.kind {
        ExprKind::Int(_)
        | ExprKind::Bool(_)
        | ExprKind::Unit
        | ExprKind::Ident(_)
        | ExprKind::Lambda { .. } => 0,

        ExprKind::Apply { callee, arg } => {
            match intrinsic(callee, arg, |n| scope.iter().any(|s| *s == n)) {
                Some(Intrinsic::Unary(builtin, arg)) => partial_slots(builtin) + count(arg, scope),
                Some(Intrinsic::Saturated(_, first, second)) => {
                    1 + count(first, scope) + count(second, scope)
                }
                None => 1 + count(callee, scope) + count(arg, scope),
            }
        }

        ExprKind::Let {
            name,
            value,
            body,
            recursive,
        } => {
            let value_slots = if *recursive { 0 } else { count(value, scope) };
            scope.push(name);
            let body_slots = count(body, scope);
            scope.pop();
            1 + value_slots + body_slots
        }

        ExprKind::If {
            cond,
            then_branch,
            else_branch,
        } => count(cond, scope) + count(then_branch, scope) + count(else_branch, scope),

        ExprKind::Binary { lhs, rhs, .. } => 1 + count(lhs, scope) + count(rhs, scope),

        ExprKind::Sequence { first, second } => count(first, scope) + count(second, scope),

        ExprKind::Tuple(elems) => 1 + elems.iter().map(|e| count(e, scope)).sum::<u32>(),
    }
}
