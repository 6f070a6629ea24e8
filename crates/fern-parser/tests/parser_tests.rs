use std::collections::HashSet;

use fern_common::span::Span;
use fern_parser::{parse, parse_expr, Expr, ExprKind, Item, NodeId};

fn expr(source: &str) -> String {
    match parse_expr(source) {
        Ok(e) => e.to_string(),
        Err(err) => panic!("parse failed for {source:?}: {err}"),
    }
}

fn items(source: &str) -> Vec<String> {
    match parse(source) {
        Ok(program) => program.items.iter().map(|i| i.to_string()).collect(),
        Err(err) => panic!("parse failed for {source:?}: {err}"),
    }
}

fn error(source: &str) -> fern_parser::ParseError {
    match parse(source) {
        Ok(program) => panic!("expected a parse error, got {program:?}"),
        Err(err) => err,
    }
}

// ── Operators ──────────────────────────────────────────────────────────

#[test]
fn multiplication_binds_tighter_than_addition() {
    assert_eq!(expr("1 + 2 * 3"), "(1 + (2 * 3))");
    assert_eq!(expr("1 * 2 + 3"), "((1 * 2) + 3)");
}

#[test]
fn arithmetic_is_left_associative() {
    assert_eq!(expr("1 - 2 - 3"), "((1 - 2) - 3)");
    assert_eq!(expr("x div 2 mod 3"), "((x / 2) mod 3)");
}

#[test]
fn comparisons_bind_loosest() {
    assert_eq!(expr("a < b + 1"), "(a < (b + 1))");
    assert_eq!(expr("n = 0"), "(n = 0)");
    assert_eq!(expr("a <> b"), "(a <> b)");
}

#[test]
fn control_forms_may_follow_an_operator() {
    assert_eq!(expr("1 + if b then 2 else 3"), "(1 + (if b then 2 else 3))");
}

// ── Application ────────────────────────────────────────────────────────

#[test]
fn application_is_left_associative() {
    assert_eq!(expr("f x y"), "((f x) y)");
}

#[test]
fn application_binds_tighter_than_operators() {
    assert_eq!(expr("f x + g y"), "((f x) + (g y))");
    assert_eq!(expr("exit (f 100)"), "(exit (f 100))");
}

// ── Binding forms ──────────────────────────────────────────────────────

#[test]
fn let_with_parameters_desugars_to_lambdas() {
    assert_eq!(
        expr("let f x y = x + y in f 1 2"),
        "(let f = (fun x -> (fun y -> (x + y))) in ((f 1) 2))"
    );
}

#[test]
fn multi_parameter_fun_is_curried() {
    assert_eq!(expr("fun x y -> x"), "(fun x -> (fun y -> x))");
}

#[test]
fn lambda_body_extends_over_sequences() {
    assert_eq!(expr("fun x -> x; 1"), "(fun x -> (x; 1))");
}

#[test]
fn recursive_factorial() {
    assert_eq!(
        expr("let rec fact n = if n = 0 then 1 else n * fact (n - 1) in fact 5"),
        "(let rec fact = (fun n -> (if (n = 0) then 1 else (n * (fact (n - 1))))) in (fact 5))"
    );
}

// ── Sequences, tuples, literals ────────────────────────────────────────

#[test]
fn sequences_nest_to_the_right() {
    assert_eq!(expr("a 1; b 2; 3"), "((a 1); ((b 2); 3))");
}

#[test]
fn if_branches_end_before_a_semicolon() {
    assert_eq!(
        expr("if c then 1 else 2; 3"),
        "((if c then 1 else 2); 3)"
    );
}

#[test]
fn tuples_units_and_grouping() {
    assert_eq!(expr("(id 1, id true)"), "((id 1), (id true))");
    assert_eq!(expr("(1, 2, 3)"), "(1, 2, 3)");
    assert_eq!(expr("()"), "()");
    assert_eq!(expr("(1)"), "1");
    assert_eq!(expr("false"), "false");
}

#[test]
fn comments_are_ignored() {
    assert_eq!(expr("1 (* one (* nested *) *) + 2"), "(1 + 2)");
}

// ── Programs ───────────────────────────────────────────────────────────

#[test]
fn top_level_binding_and_expression() {
    assert_eq!(
        items("let f x = x + 1;; exit (f 100);;"),
        vec!["let f = (fun x -> (x + 1));;", "(exit (f 100));;"]
    );
}

#[test]
fn top_level_let_in_is_an_expression() {
    let program = parse("let x = 1 in x;;").unwrap();
    assert!(matches!(program.items.as_slice(), [Item::Expr(_)]));
}

#[test]
fn recursive_top_level_binding() {
    let program = parse("let rec loop n = loop n;;").unwrap();
    match program.items.as_slice() {
        [Item::Let {
            name, recursive, ..
        }] => {
            assert_eq!(name, "loop");
            assert!(*recursive);
        }
        other => panic!("unexpected items: {other:?}"),
    }
}

#[test]
fn final_separator_is_optional() {
    assert_eq!(items("let x = 5;; exit x"), vec!["let x = 5;;", "(exit x);;"]);
    assert!(parse("").unwrap().items.is_empty());
    assert!(parse(";;").unwrap().items.is_empty());
}

#[test]
fn final_expr_is_the_last_item() {
    let program = parse("let x = 1;; x + 1;;").unwrap();
    assert_eq!(program.final_expr().unwrap().to_string(), "(x + 1)");

    let program = parse("1;; let y = 2;;").unwrap();
    assert!(program.final_expr().is_none());
}

fn collect_ids(e: &Expr, out: &mut Vec<NodeId>) {
    out.push(e.id);
    match &e.kind {
        ExprKind::Int(_) | ExprKind::Bool(_) | ExprKind::Unit | ExprKind::Ident(_) => {}
        ExprKind::Lambda { body, .. } => collect_ids(body, out),
        ExprKind::Apply { callee, arg } => {
            collect_ids(callee, out);
            collect_ids(arg, out);
        }
        ExprKind::Let { value, body, .. } => {
            collect_ids(value, out);
            collect_ids(body, out);
        }
        ExprKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            collect_ids(cond, out);
            collect_ids(then_branch, out);
            collect_ids(else_branch, out);
        }
        ExprKind::Binary { lhs, rhs, .. } => {
            collect_ids(lhs, out);
            collect_ids(rhs, out);
        }
        ExprKind::Sequence { first, second } => {
            collect_ids(first, out);
            collect_ids(second, out);
        }
        ExprKind::Tuple(elems) => elems.iter().for_each(|e| collect_ids(e, out)),
    }
}

#[test]
fn node_ids_are_unique_across_the_program() {
    let program = parse("let f x y = (x, y);; let g = f 1;; g (if true then 2 else 3);;").unwrap();
    let mut ids = Vec::new();
    for item in &program.items {
        match item {
            Item::Let { value, .. } => collect_ids(value, &mut ids),
            Item::Expr(e) => collect_ids(e, &mut ids),
        }
    }
    let distinct: HashSet<_> = ids.iter().copied().collect();
    assert_eq!(distinct.len(), ids.len());
}

// ── Errors ─────────────────────────────────────────────────────────────

#[test]
fn missing_expression() {
    let err = error("let x = ;;");
    assert_eq!(err.message, "expected expression, found `;;`");
    assert_eq!(err.span, Span::new(8, 10));
}

#[test]
fn unclosed_parenthesis_points_at_the_opener() {
    let err = error("(1 + 2");
    assert_eq!(err.message, "expected `)`, found end of input");
    assert_eq!(
        err.related,
        Some(("parenthesis opened here".to_string(), Span::new(0, 1)))
    );
}

#[test]
fn if_without_else() {
    let err = error("if true then 1;;");
    assert_eq!(err.message, "expected `else`, found `;;`");
}

#[test]
fn binding_needs_a_name() {
    let err = error("let 3 = 1;;");
    assert_eq!(err.message, "expected identifier, found integer literal");
    assert_eq!(err.span, Span::new(4, 5));
}

#[test]
fn missing_item_separator() {
    let err = error("let x = 1 let y = 2;;");
    assert_eq!(err.message, "expected `;;`, found `let`");
}

#[test]
fn lex_errors_surface_as_parse_errors() {
    let err = error("1 @ 2");
    assert_eq!(err.message, "unexpected character: '@'");
    assert_eq!(err.span, Span::new(2, 3));
}
