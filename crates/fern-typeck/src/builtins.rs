//! Built-in functions and operator signatures.
//!
//! The builtins seed the root frame of every environment. Their quantified
//! variables are allocated from the same inference context as everything
//! else, so they can never collide with variables created later.

use fern_parser::BinOp;

use crate::env::TypeEnv;
use crate::ty::{Scheme, Ty};
use crate::unify::InferCtx;

/// A function every program can refer to without defining it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Builtin {
    /// `exit : Int -> Unit`, terminates the process.
    Exit,
    Succ,
    Pred,
    /// `zero : Int -> Bool`, true for 0.
    Zero,
    Not,
    Fst,
    Snd,
    /// `pair : 'a -> 'b -> ('a, 'b)`, the curried tuple constructor.
    Pair,
    Times,
    /// `null : List<'a> -> Bool`, true for the empty list.
    Null,
    Tail,
}

impl Builtin {
    pub const ALL: [Builtin; 11] = [
        Builtin::Exit,
        Builtin::Succ,
        Builtin::Pred,
        Builtin::Zero,
        Builtin::Not,
        Builtin::Fst,
        Builtin::Snd,
        Builtin::Pair,
        Builtin::Times,
        Builtin::Null,
        Builtin::Tail,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Exit => "exit",
            Builtin::Succ => "succ",
            Builtin::Pred => "pred",
            Builtin::Zero => "zero",
            Builtin::Not => "not",
            Builtin::Fst => "fst",
            Builtin::Snd => "snd",
            Builtin::Pair => "pair",
            Builtin::Times => "times",
            Builtin::Null => "null",
            Builtin::Tail => "tail",
        }
    }

    /// How many curried arguments the builtin takes before it computes.
    pub fn arity(self) -> usize {
        match self {
            Builtin::Pair | Builtin::Times => 2,
            _ => 1,
        }
    }

    pub fn from_name(name: &str) -> Option<Builtin> {
        Builtin::ALL.into_iter().find(|b| b.name() == name)
    }

    pub fn scheme(self, ctx: &mut InferCtx) -> Scheme {
        match self {
            Builtin::Exit => Scheme::mono(Ty::fun(Ty::int(), Ty::unit())),
            Builtin::Succ | Builtin::Pred => Scheme::mono(Ty::fun(Ty::int(), Ty::int())),
            Builtin::Zero => Scheme::mono(Ty::fun(Ty::int(), Ty::bool())),
            Builtin::Not => Scheme::mono(Ty::fun(Ty::bool(), Ty::bool())),
            Builtin::Fst | Builtin::Snd => {
                let a = ctx.fresh();
                let b = ctx.fresh();
                let pair = Ty::tuple(vec![Ty::Var(a), Ty::Var(b)]);
                let projected = if self == Builtin::Fst { a } else { b };
                Scheme {
                    vars: vec![a, b],
                    ty: Ty::fun(pair, Ty::Var(projected)),
                }
            }
            Builtin::Pair => {
                let a = ctx.fresh();
                let b = ctx.fresh();
                let pair = Ty::tuple(vec![Ty::Var(a), Ty::Var(b)]);
                Scheme {
                    vars: vec![a, b],
                    ty: Ty::fun_n(vec![Ty::Var(a), Ty::Var(b)], pair),
                }
            }
            Builtin::Times => Scheme::mono(Ty::fun_n(vec![Ty::int(), Ty::int()], Ty::int())),
            Builtin::Null => {
                let a = ctx.fresh();
                Scheme {
                    vars: vec![a],
                    ty: Ty::fun(Ty::list(Ty::Var(a)), Ty::bool()),
                }
            }
            Builtin::Tail => {
                let a = ctx.fresh();
                let list = Ty::list(Ty::Var(a));
                Scheme {
                    vars: vec![a],
                    ty: Ty::fun(list.clone(), list),
                }
            }
        }
    }
}

/// An environment whose root frame holds every builtin.
pub fn builtin_env(ctx: &mut InferCtx) -> TypeEnv {
    let bindings: Vec<(&str, Scheme)> = Builtin::ALL
        .into_iter()
        .map(|b| (b.name(), b.scheme(ctx)))
        .collect();
    TypeEnv::with_root(bindings)
}

/// A fresh instance of `op`'s signature as `(lhs, rhs, result)`.
///
/// Every operator takes two `Int`s. Arithmetic yields `Int` and
/// comparisons yield `Bool`; values are compared as machine words, so only
/// integers have a meaningful order and equality.
pub fn operator_signature(op: BinOp) -> (Ty, Ty, Ty) {
    let result = if op.is_comparison() { Ty::bool() } else { Ty::int() };
    (Ty::int(), Ty::int(), result)
}
