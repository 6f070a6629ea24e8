//! Fern type checker: Hindley-Milner inference with let-polymorphism.
//!
//! [`check`] walks a parsed program once, unifying as it goes, and stops at
//! the first type error. On success every expression node has a fully
//! resolved type in [`TypeckResult::types`], which the code generator reads.

pub mod builtins;
pub mod env;
pub mod error;
mod infer;
pub mod ty;
pub mod unify;

pub use error::{ConstraintOrigin, TypeError, TypeErrorKind};
pub use ty::{Scheme, Ty, TyCon, TyVar};

use fern_parser::{Expr, Item, NodeId, Program};
use rustc_hash::FxHashMap;
use tracing::debug_span;

use infer::Checker;

/// What type checking learned about a program.
#[derive(Debug)]
pub struct TypeckResult {
    /// The resolved type of every expression node.
    pub types: FxHashMap<NodeId, Ty>,
    /// Top-level bindings in source order, with their generalized schemes.
    pub bindings: Vec<(String, Scheme)>,
    /// The type of the final item, when that item is an expression.
    pub result_type: Option<Ty>,
}

impl TypeckResult {
    pub fn type_of(&self, id: NodeId) -> Option<&Ty> {
        self.types.get(&id)
    }

    /// The scheme of the last top-level binding named `name`.
    pub fn binding(&self, name: &str) -> Option<&Scheme> {
        self.bindings
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, scheme)| scheme)
    }
}

/// Type-check a whole program.
///
/// Each top-level `let` is checked like a `let ... in` whose body is the rest
/// of the program, so its name is generalized and visible to later items.
pub fn check(program: &Program) -> Result<TypeckResult, TypeError> {
    let _span = debug_span!("typeck", items = program.items.len()).entered();

    let mut checker = Checker::new();
    let mut frame = checker.env.root();
    let mut bindings = Vec::new();
    let mut result_type = None;

    for (i, item) in program.items.iter().enumerate() {
        let is_last = i + 1 == program.items.len();
        match item {
            Item::Let {
                name,
                value,
                recursive,
            } => {
                let scheme = checker.infer_binding(name, value, *recursive, frame)?;
                frame = checker.env.child(frame);
                checker.env.insert(frame, name.as_str(), scheme.clone());
                bindings.push((name.clone(), scheme));
            }
            Item::Expr(expr) => {
                let ty = checker.infer(expr, frame)?;
                if is_last {
                    result_type = Some(ty);
                }
            }
        }
    }

    Ok(finish(checker, bindings, result_type))
}

/// Type-check a single expression against the builtins.
pub fn check_expr(expr: &Expr) -> Result<TypeckResult, TypeError> {
    let mut checker = Checker::new();
    let root = checker.env.root();
    let ty = checker.infer(expr, root)?;
    Ok(finish(checker, Vec::new(), Some(ty)))
}

fn finish(
    checker: Checker,
    bindings: Vec<(String, Scheme)>,
    result_type: Option<Ty>,
) -> TypeckResult {
    let Checker {
        mut ctx, types, ..
    } = checker;
    let types = types
        .into_iter()
        .map(|(id, ty)| (id, ctx.resolve(&ty)))
        .collect();
    let bindings = bindings
        .into_iter()
        .map(|(name, scheme)| {
            let ty = ctx.resolve(&scheme.ty);
            (name, Scheme { vars: scheme.vars, ty })
        })
        .collect();
    let result_type = result_type.map(|ty| ctx.resolve(&ty));
    TypeckResult {
        types,
        bindings,
        result_type,
    }
}
