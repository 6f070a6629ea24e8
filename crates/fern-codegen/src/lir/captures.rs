//! Free-variable analysis for closure conversion.

use fern_parser::{Expr, ExprKind};

/// Names `expr` refers to that are not bound inside it or in `bound`, in
/// order of first reference and without duplicates.
pub fn free_vars(expr: &Expr, bound: &[&str]) -> Vec<String> {
    let mut scope: Vec<&str> = bound.to_vec();
    let mut out = Vec::new();
    collect(expr, &mut scope, &mut out);
    out
}

fn collect<'e>(expr: &'e Expr, scope: &mut Vec<&'e str>, out: &mut Vec<String>) {
    match &expr.kind {
        ExprKind::Int(_) | ExprKind::Bool(_) | ExprKind::Unit => {}
        ExprKind::Ident(name) => {
            if !scope.contains(&name.as_str()) && !out.contains(name) {
                out.push(name.clone());
            }
        }
        ExprKind::Lambda { param, body } => {
            scope.push(param);
            collect(body, scope, out);
            scope.pop();
        }
        ExprKind::Apply { callee, arg } => {
            collect(callee, scope, out);
            collect(arg, scope, out);
        }
        ExprKind::Let {
            name,
            value,
            body,
            recursive,
        } => {
            if *recursive {
                scope.push(name);
                collect(value, scope, out);
            } else {
                collect(value, scope, out);
                scope.push(name);
            }
            collect(body, scope, out);
            scope.pop();
        }
        ExprKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            collect(cond, scope, out);
            collect(then_branch, scope, out);
            collect(else_branch, scope, out);
        }
        ExprKind::Binary { lhs, rhs, .. } => {
            collect(lhs, scope, out);
            collect(rhs, scope, out);
        }
        ExprKind::Sequence { first, second } => {
            collect(first, scope, out);
            collect(second, scope, out);
        }
        ExprKind::Tuple(elems) => {
            for elem in elems {
                collect(elem, scope, out);
            }
        }
    }
}
