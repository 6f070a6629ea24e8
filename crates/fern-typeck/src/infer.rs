//! Algorithm W over the Fern AST.
//!
//! Every node's inferred type is recorded in a side table keyed by
//! [`NodeId`]. Entries are stored as inferred and only resolved once the
//! whole program has been checked, because later constraints keep refining
//! earlier variables.

use fern_parser::{Expr, ExprKind, NodeId};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::builtins::{builtin_env, operator_signature};
use crate::env::{FrameId, TypeEnv};
use crate::error::{ConstraintOrigin, TypeError};
use crate::ty::{Scheme, Ty};
use crate::unify::InferCtx;

pub(crate) struct Checker {
    pub(crate) ctx: InferCtx,
    pub(crate) env: TypeEnv,
    pub(crate) types: FxHashMap<NodeId, Ty>,
}

impl Checker {
    pub(crate) fn new() -> Self {
        let mut ctx = InferCtx::new();
        let env = builtin_env(&mut ctx);
        Checker {
            ctx,
            env,
            types: FxHashMap::default(),
        }
    }

    pub(crate) fn infer(&mut self, expr: &Expr, frame: FrameId) -> Result<Ty, TypeError> {
        let ty = self.infer_kind(expr, frame)?;
        self.types.insert(expr.id, ty.clone());
        Ok(ty)
    }

    fn infer_kind(&mut self, expr: &Expr, frame: FrameId) -> Result<Ty, TypeError> {
        match &expr.kind {
            ExprKind::Int(_) => Ok(Ty::int()),
            ExprKind::Bool(_) => Ok(Ty::bool()),
            ExprKind::Unit => Ok(Ty::unit()),

            ExprKind::Ident(name) => {
                let scheme = self
                    .env
                    .lookup(frame, name)
                    .cloned()
                    .ok_or_else(|| TypeError::UnboundVariable { name: name.clone() })?;
                Ok(self.ctx.instantiate(&scheme))
            }

            ExprKind::Lambda { param, body } => {
                let param_ty = self.ctx.fresh_var();
                let scope = self.env.child(frame);
                self.env
                    .insert(scope, param.as_str(), Scheme::mono(param_ty.clone()));
                let body_ty = self.infer(body, scope)?;
                self.env.release(scope);
                Ok(Ty::fun(param_ty, body_ty))
            }

            ExprKind::Apply { callee, arg } => {
                let callee_ty = self.infer(callee, frame)?;
                let arg_ty = self.infer(arg, frame)?;
                self.infer_apply(callee_ty, arg_ty)
            }

            ExprKind::Let {
                name,
                value,
                body,
                recursive,
            } => {
                let scheme = self.infer_binding(name, value, *recursive, frame)?;
                let scope = self.env.child(frame);
                self.env.insert(scope, name.as_str(), scheme);
                let body_ty = self.infer(body, scope)?;
                self.env.release(scope);
                Ok(body_ty)
            }

            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond_ty = self.infer(cond, frame)?;
                self.ctx
                    .unify(Ty::bool(), cond_ty, ConstraintOrigin::IfCondition)?;
                let then_ty = self.infer(then_branch, frame)?;
                let else_ty = self.infer(else_branch, frame)?;
                self.ctx
                    .unify(then_ty.clone(), else_ty, ConstraintOrigin::IfBranches)?;
                Ok(then_ty)
            }

            ExprKind::Binary { op, lhs, rhs } => {
                let lhs_ty = self.infer(lhs, frame)?;
                let rhs_ty = self.infer(rhs, frame)?;
                let (expect_l, expect_r, result) = operator_signature(*op);
                let origin = ConstraintOrigin::BinOp { op: *op };
                self.ctx.unify(expect_l, lhs_ty, origin.clone())?;
                self.ctx.unify(expect_r, rhs_ty, origin)?;
                Ok(result)
            }

            ExprKind::Sequence { first, second } => {
                self.infer(first, frame)?;
                self.infer(second, frame)
            }

            ExprKind::Tuple(elems) => {
                let tys = elems
                    .iter()
                    .map(|e| self.infer(e, frame))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Ty::tuple(tys))
            }
        }
    }

    fn infer_apply(&mut self, callee_ty: Ty, arg_ty: Ty) -> Result<Ty, TypeError> {
        let resolved = self.ctx.shallow_resolve(callee_ty.clone());
        if let Some((param, ret)) = resolved.as_fun() {
            let (param, ret) = (param.clone(), ret.clone());
            self.ctx.unify(param, arg_ty, ConstraintOrigin::FnArg)?;
            return Ok(ret);
        }
        match resolved {
            Ty::Var(_) => {
                let ret = self.ctx.fresh_var();
                self.ctx.unify(
                    callee_ty,
                    Ty::fun(arg_ty, ret.clone()),
                    ConstraintOrigin::FnArg,
                )?;
                Ok(ret)
            }
            Ty::Con(..) => Err(TypeError::NotAFunction {
                ty: self.ctx.resolve(&callee_ty),
            }),
        }
    }

    /// Infer and generalize the value of a `let`, returning the scheme its
    /// name is bound to.
    ///
    /// A recursive binding is first given a fresh monomorphic type in a
    /// frame of its own, so the value can refer to itself.
    pub(crate) fn infer_binding(
        &mut self,
        name: &str,
        value: &Expr,
        recursive: bool,
        frame: FrameId,
    ) -> Result<Scheme, TypeError> {
        let value_ty = if recursive {
            if !matches!(value.kind, ExprKind::Lambda { .. }) {
                return Err(TypeError::RecursiveValue {
                    name: name.to_string(),
                });
            }
            let rec_scope = self.env.child(frame);
            let self_ty = self.ctx.fresh_var();
            self.env.insert(rec_scope, name, Scheme::mono(self_ty.clone()));
            let value_ty = self.infer(value, rec_scope)?;
            self.ctx.unify(
                self_ty,
                value_ty.clone(),
                ConstraintOrigin::LetBinding {
                    name: name.to_string(),
                },
            )?;
            self.env.release(rec_scope);
            value_ty
        } else {
            self.infer(value, frame)?
        };

        let scheme = self.ctx.generalize(&value_ty, &self.env, frame);
        debug!(name, scheme = %scheme, quantified = scheme.vars.len(), "generalized");
        Ok(scheme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fern_parser::AstBuilder;

    fn infer_resolved(expr: &Expr) -> Result<Ty, TypeError> {
        let mut checker = Checker::new();
        let root = checker.env.root();
        let ty = checker.infer(expr, root)?;
        Ok(checker.ctx.resolve(&ty))
    }

    #[test]
    fn literals() {
        let mut b = AstBuilder::new();
        assert_eq!(infer_resolved(&b.int(3)), Ok(Ty::int()));
        assert_eq!(infer_resolved(&b.bool(false)), Ok(Ty::bool()));
        assert_eq!(infer_resolved(&b.unit()), Ok(Ty::unit()));
    }

    #[test]
    fn every_node_gets_a_type() {
        let mut b = AstBuilder::new();
        let x = b.ident("x");
        let one = b.int(1);
        let sum = b.binary(fern_parser::BinOp::Add, x, one);
        let f = b.lambda("x", sum);

        let mut checker = Checker::new();
        let root = checker.env.root();
        checker.infer(&f, root).unwrap();
        assert_eq!(checker.types.len(), 4);
        let f_ty = checker.types[&f.id].clone();
        assert_eq!(checker.ctx.resolve(&f_ty), Ty::fun(Ty::int(), Ty::int()));
    }

    #[test]
    fn scopes_are_released_after_checking() {
        let mut b = AstBuilder::new();
        let expr = {
            let x = b.ident("x");
            let inner = b.lambda("y", x);
            let one = b.int(1);
            let body = b.apply(inner, one);
            let five = b.int(5);
            b.let_in("x", five, body, false)
        };
        let mut checker = Checker::new();
        let root = checker.env.root();
        let frames_before = checker.env.frame_count();
        let ty = checker.infer(&expr, root).unwrap();
        assert_eq!(checker.ctx.resolve(&ty), Ty::int());
        assert_eq!(checker.env.frame_count(), frames_before);
    }

    #[test]
    fn recursive_value_must_be_a_lambda() {
        let mut b = AstBuilder::new();
        let value = b.ident("x");
        let body = b.ident("x");
        let expr = b.let_in("x", value, body, true);
        assert_eq!(
            infer_resolved(&expr),
            Err(TypeError::RecursiveValue { name: "x".into() })
        );
    }

    #[test]
    fn applying_an_integer_is_rejected() {
        let mut b = AstBuilder::new();
        let callee = b.int(1);
        let arg = b.int(2);
        let expr = b.apply(callee, arg);
        assert_eq!(
            infer_resolved(&expr),
            Err(TypeError::NotAFunction { ty: Ty::int() })
        );
    }
}
