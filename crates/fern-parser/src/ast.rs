//! The Fern abstract syntax tree.
//!
//! A closed sum type over every node kind, so the checker and the code
//! generator both match exhaustively. Each node owns its children and carries
//! a [`NodeId`]; the type checker records resolved types in a side table keyed
//! by that id instead of mutating the tree.

use std::fmt;

/// Identity of an expression node, unique within one [`Program`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Int(i64),
    Bool(bool),
    Unit,
    Ident(String),
    /// `fun param -> body`. Multi-parameter lambdas are curried by the parser.
    Lambda { param: String, body: Box<Expr> },
    /// `callee arg`.
    Apply { callee: Box<Expr>, arg: Box<Expr> },
    /// `let [rec] name = value in body`.
    Let {
        name: String,
        value: Box<Expr>,
        body: Box<Expr>,
        recursive: bool,
    },
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `first; second`. The value of `first` is discarded.
    Sequence { first: Box<Expr>, second: Box<Expr> },
    /// `(e1, e2, ...)` with at least two components.
    Tuple(Vec<Expr>),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "mod",
            BinOp::Eq => "=",
            BinOp::NotEq => "<>",
            BinOp::Lt => "<",
            BinOp::LtEq => "<=",
            BinOp::Gt => ">",
            BinOp::GtEq => ">=",
        }
    }

    /// Comparison operators yield `Bool`; the rest are integer arithmetic.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::NotEq | BinOp::Lt | BinOp::LtEq | BinOp::Gt | BinOp::GtEq
        )
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A top-level phrase terminated by `;;`.
#[derive(Clone, Debug, PartialEq)]
pub enum Item {
    /// `let [rec] name = value;;`, in scope for every later item.
    Let {
        name: String,
        value: Expr,
        recursive: bool,
    },
    /// `expr;;`, evaluated for its effect (or, if last, its value).
    Expr(Expr),
}

/// A whole source file.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Program {
    pub items: Vec<Item>,
}

impl Program {
    /// The final expression item, whose value becomes the exit status.
    pub fn final_expr(&self) -> Option<&Expr> {
        match self.items.last() {
            Some(Item::Expr(expr)) => Some(expr),
            _ => None,
        }
    }
}

/// Allocates node ids while building trees.
///
/// The parser owns one, and tests use it to write ASTs by hand.
#[derive(Debug, Default)]
pub struct AstBuilder {
    next_id: u32,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expr(&mut self, kind: ExprKind) -> Expr {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        Expr { id, kind }
    }

    pub fn int(&mut self, value: i64) -> Expr {
        self.expr(ExprKind::Int(value))
    }

    pub fn bool(&mut self, value: bool) -> Expr {
        self.expr(ExprKind::Bool(value))
    }

    pub fn unit(&mut self) -> Expr {
        self.expr(ExprKind::Unit)
    }

    pub fn ident(&mut self, name: &str) -> Expr {
        self.expr(ExprKind::Ident(name.to_string()))
    }

    pub fn lambda(&mut self, param: &str, body: Expr) -> Expr {
        self.expr(ExprKind::Lambda {
            param: param.to_string(),
            body: Box::new(body),
        })
    }

    /// Curry `params` around `body`: `fun a -> fun b -> body`.
    pub fn lambdas(&mut self, params: &[String], body: Expr) -> Expr {
        params
            .iter()
            .rev()
            .fold(body, |body, param| self.lambda(param, body))
    }

    pub fn apply(&mut self, callee: Expr, arg: Expr) -> Expr {
        self.expr(ExprKind::Apply {
            callee: Box::new(callee),
            arg: Box::new(arg),
        })
    }

    pub fn let_in(&mut self, name: &str, value: Expr, body: Expr, recursive: bool) -> Expr {
        self.expr(ExprKind::Let {
            name: name.to_string(),
            value: Box::new(value),
            body: Box::new(body),
            recursive,
        })
    }

    pub fn if_else(&mut self, cond: Expr, then_branch: Expr, else_branch: Expr) -> Expr {
        self.expr(ExprKind::If {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        })
    }

    pub fn binary(&mut self, op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        self.expr(ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    pub fn sequence(&mut self, first: Expr, second: Expr) -> Expr {
        self.expr(ExprKind::Sequence {
            first: Box::new(first),
            second: Box::new(second),
        })
    }

    pub fn tuple(&mut self, elems: Vec<Expr>) -> Expr {
        self.expr(ExprKind::Tuple(elems))
    }
}

// ── Display ────────────────────────────────────────────────────────────
//
// Fully parenthesized, so tests can assert on tree shape as text.

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Int(n) => write!(f, "{n}"),
            ExprKind::Bool(b) => write!(f, "{b}"),
            ExprKind::Unit => write!(f, "()"),
            ExprKind::Ident(name) => write!(f, "{name}"),
            ExprKind::Lambda { param, body } => write!(f, "(fun {param} -> {body})"),
            ExprKind::Apply { callee, arg } => write!(f, "({callee} {arg})"),
            ExprKind::Let {
                name,
                value,
                body,
                recursive,
            } => {
                let rec = if *recursive { "rec " } else { "" };
                write!(f, "(let {rec}{name} = {value} in {body})")
            }
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => write!(f, "(if {cond} then {then_branch} else {else_branch})"),
            ExprKind::Binary { op, lhs, rhs } => write!(f, "({lhs} {op} {rhs})"),
            ExprKind::Sequence { first, second } => write!(f, "({first}; {second})"),
            ExprKind::Tuple(elems) => {
                write!(f, "(")?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Item::Let {
                name,
                value,
                recursive,
            } => {
                let rec = if *recursive { "rec " } else { "" };
                write!(f, "let {rec}{name} = {value};;")
            }
            Item::Expr(expr) => write!(f, "{expr};;"),
        }
    }
}
