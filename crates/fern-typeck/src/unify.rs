//! Unification engine.
//!
//! Type variables live in an `ena` union-find table whose values are the
//! optional concrete type bound to each equivalence class. `find` compresses
//! paths as it goes. Bindings are never undone: once a class is bound it
//! stays bound for the rest of the compilation.

use ena::unify::InPlaceUnificationTable;
use rustc_hash::FxHashMap;

use crate::env::{FrameId, TypeEnv};
use crate::error::{ConstraintOrigin, TypeError};
use crate::ty::{Scheme, Ty, TyVar};

/// Why a low-level unifier operation failed, before it is attributed to a
/// construct in the program.
#[derive(Clone, Debug, PartialEq)]
pub enum UnifyError {
    /// Different constructor names or argument counts.
    Mismatch { left: Ty, right: Ty },
    /// Binding `var` to `ty` would make an infinite type.
    Occurs { var: TyVar, ty: Ty },
}

/// The inference context: owns the union-find table for one compilation.
pub struct InferCtx {
    table: InPlaceUnificationTable<TyVar>,
}

impl InferCtx {
    pub fn new() -> Self {
        InferCtx {
            table: InPlaceUnificationTable::new(),
        }
    }

    // ── Variables ──────────────────────────────────────────────────────

    /// A new, unbound variable that is its own representative.
    pub fn fresh(&mut self) -> TyVar {
        self.table.new_key(None)
    }

    pub fn fresh_var(&mut self) -> Ty {
        Ty::Var(self.fresh())
    }

    /// Number of variables created so far.
    pub fn var_count(&self) -> usize {
        self.table.len()
    }

    /// The representative of `v`'s class.
    pub fn find(&mut self, v: TyVar) -> TyVar {
        self.table.find(v)
    }

    /// The type bound to `v`'s class, if any.
    pub fn probe(&mut self, v: TyVar) -> Option<Ty> {
        self.table.probe_value(v)
    }

    // ── Union-find primitives ──────────────────────────────────────────

    /// Bind the unbound class of `var` to `ty`.
    pub fn bind(&mut self, var: TyVar, ty: Ty) -> Result<(), UnifyError> {
        let root = self.find(var);
        debug_assert!(self.probe(root).is_none(), "rebinding a bound class");
        if let Ty::Var(other) = &ty {
            if self.find(*other) == root {
                return Ok(());
            }
        }
        if self.occurs_in(root, &ty) {
            return Err(UnifyError::Occurs { var: root, ty });
        }
        self.table.union_value(root, Some(ty));
        Ok(())
    }

    /// Merge the classes of `a` and `b`.
    ///
    /// If only one side is bound the merged class inherits that binding; if
    /// both are, their types are unified first.
    pub fn union(&mut self, a: TyVar, b: TyVar) -> Result<(), UnifyError> {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return Ok(());
        }
        match (self.probe(ra), self.probe(rb)) {
            (None, None) => {}
            (Some(ty), None) => {
                if self.occurs_in(rb, &ty) {
                    return Err(UnifyError::Occurs { var: rb, ty });
                }
            }
            (None, Some(ty)) => {
                if self.occurs_in(ra, &ty) {
                    return Err(UnifyError::Occurs { var: ra, ty });
                }
            }
            (Some(ta), Some(tb)) => {
                self.unify_inner(ta, tb)?;
                // Unifying the bodies may already have merged the classes.
                if self.find(ra) == self.find(rb) {
                    return Ok(());
                }
            }
        }
        self.table.union(ra, rb);
        Ok(())
    }

    // ── Resolution ─────────────────────────────────────────────────────

    /// Follow bindings at the top of `ty` only. Unbound variables come back
    /// as their representative.
    pub fn shallow_resolve(&mut self, ty: Ty) -> Ty {
        match ty {
            Ty::Var(v) => {
                let root = self.find(v);
                match self.probe(root) {
                    Some(inner) => self.shallow_resolve(inner),
                    None => Ty::Var(root),
                }
            }
            con => con,
        }
    }

    /// Substitute every bound variable in `ty`, recursively.
    ///
    /// Unbound variables are normalized to their representative so that two
    /// unified-but-unbound variables print and compare as the same one.
    pub fn resolve(&mut self, ty: &Ty) -> Ty {
        match ty {
            Ty::Var(v) => {
                let root = self.find(*v);
                match self.probe(root) {
                    Some(inner) => self.resolve(&inner),
                    None => Ty::Var(root),
                }
            }
            Ty::Con(con, args) => {
                let args = args.iter().map(|a| self.resolve(a)).collect();
                Ty::Con(con.clone(), args)
            }
        }
    }

    /// Whether `var`'s class appears anywhere inside `ty`.
    pub fn occurs_in(&mut self, var: TyVar, ty: &Ty) -> bool {
        match ty {
            Ty::Var(v) => {
                let root = self.find(*v);
                if root == self.find(var) {
                    return true;
                }
                match self.probe(root) {
                    Some(inner) => self.occurs_in(var, &inner),
                    None => false,
                }
            }
            Ty::Con(_, args) => args.iter().any(|a| self.occurs_in(var, a)),
        }
    }

    // ── Unification ────────────────────────────────────────────────────

    /// Make `expected` and `found` equal.
    ///
    /// Sub-unifications that succeed before a failure keep their effect;
    /// callers abandon the whole program on error.
    pub fn unify(
        &mut self,
        expected: Ty,
        found: Ty,
        origin: ConstraintOrigin,
    ) -> Result<(), TypeError> {
        let expected_before = self.resolve(&expected);
        let found_before = self.resolve(&found);

        match self.unify_inner(expected, found) {
            Ok(()) => Ok(()),
            Err(UnifyError::Mismatch { .. }) => Err(TypeError::Mismatch {
                expected: expected_before,
                found: found_before,
                origin,
            }),
            Err(UnifyError::Occurs { var, ty }) => {
                let ty = self.resolve(&ty);
                Err(TypeError::InfiniteType { var, ty, origin })
            }
        }
    }

    fn unify_inner(&mut self, a: Ty, b: Ty) -> Result<(), UnifyError> {
        let a = self.shallow_resolve(a);
        let b = self.shallow_resolve(b);

        match (a, b) {
            (Ty::Var(v1), Ty::Var(v2)) => self.union(v1, v2),
            (Ty::Var(v), ty) | (ty, Ty::Var(v)) => self.bind(v, ty),
            (Ty::Con(c1, a1), Ty::Con(c2, a2)) => {
                if c1 != c2 || a1.len() != a2.len() {
                    return Err(UnifyError::Mismatch {
                        left: Ty::Con(c1, a1),
                        right: Ty::Con(c2, a2),
                    });
                }
                for (x, y) in a1.into_iter().zip(a2) {
                    self.unify_inner(x, y)?;
                }
                Ok(())
            }
        }
    }

    // ── Generalization ─────────────────────────────────────────────────

    /// Free variables of `ty` under the current bindings, as representatives.
    pub fn free_vars(&mut self, ty: &Ty) -> Vec<TyVar> {
        self.resolve(ty).vars()
    }

    /// Quantify the variables of `ty` that nothing visible from `frame`
    /// still mentions.
    ///
    /// The environment's free variables are recomputed on every call since
    /// bindings keep evolving during the traversal.
    pub fn generalize(&mut self, ty: &Ty, env: &TypeEnv, frame: FrameId) -> Scheme {
        let ty = self.resolve(ty);
        let env_vars = self.env_free_vars(env, frame);
        let vars = ty
            .vars()
            .into_iter()
            .filter(|v| !env_vars.contains(v))
            .collect();
        Scheme { vars, ty }
    }

    fn env_free_vars(&mut self, env: &TypeEnv, frame: FrameId) -> Vec<TyVar> {
        let mut out = Vec::new();
        for scheme in env.visible(frame) {
            let quantified: Vec<TyVar> = scheme.vars.iter().map(|v| self.find(*v)).collect();
            for v in self.free_vars(&scheme.ty) {
                if !quantified.contains(&v) && !out.contains(&v) {
                    out.push(v);
                }
            }
        }
        out
    }

    // ── Instantiation ──────────────────────────────────────────────────

    /// Replace each quantified variable with a fresh one, consistently.
    pub fn instantiate(&mut self, scheme: &Scheme) -> Ty {
        if scheme.vars.is_empty() {
            return scheme.ty.clone();
        }
        let subst: FxHashMap<TyVar, Ty> = scheme
            .vars
            .iter()
            .map(|v| (*v, self.fresh_var()))
            .collect();
        self.substitute(&scheme.ty, &subst)
    }

    fn substitute(&mut self, ty: &Ty, subst: &FxHashMap<TyVar, Ty>) -> Ty {
        match ty {
            Ty::Var(v) => {
                if let Some(replacement) = subst.get(v) {
                    return replacement.clone();
                }
                match self.probe(*v) {
                    Some(inner) => self.substitute(&inner, subst),
                    None => ty.clone(),
                }
            }
            Ty::Con(con, args) => {
                let args = args.iter().map(|a| self.substitute(a, subst)).collect();
                Ty::Con(con.clone(), args)
            }
        }
    }
}

impl Default for InferCtx {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> ConstraintOrigin {
        ConstraintOrigin::Builtin
    }

    #[test]
    fn fresh_vars_are_distinct_roots() {
        let mut ctx = InferCtx::new();
        let a = ctx.fresh();
        let b = ctx.fresh();
        assert_ne!(a, b);
        assert_eq!(ctx.find(a), a);
        assert_eq!(ctx.probe(b), None);
        assert_eq!(ctx.var_count(), 2);
    }

    #[test]
    fn bind_then_resolve() {
        let mut ctx = InferCtx::new();
        let a = ctx.fresh();
        ctx.bind(a, Ty::int()).unwrap();
        assert_eq!(ctx.resolve(&Ty::Var(a)), Ty::int());
    }

    #[test]
    fn bind_rejects_cycles() {
        let mut ctx = InferCtx::new();
        let a = ctx.fresh();
        let err = ctx.bind(a, Ty::fun(Ty::Var(a), Ty::int())).unwrap_err();
        assert!(matches!(err, UnifyError::Occurs { var, .. } if var == a));
        assert_eq!(ctx.probe(a), None);
    }

    #[test]
    fn union_chains_share_a_representative() {
        let mut ctx = InferCtx::new();
        let vars: Vec<TyVar> = (0..5).map(|_| ctx.fresh()).collect();
        for pair in vars.windows(2) {
            ctx.union(pair[0], pair[1]).unwrap();
        }
        let root = ctx.find(vars[0]);
        for v in &vars {
            assert_eq!(ctx.find(*v), root);
        }
    }

    #[test]
    fn union_inherits_a_binding() {
        let mut ctx = InferCtx::new();
        let a = ctx.fresh();
        let b = ctx.fresh();
        ctx.bind(b, Ty::bool()).unwrap();
        ctx.union(a, b).unwrap();
        assert_eq!(ctx.resolve(&Ty::Var(a)), Ty::bool());
    }

    #[test]
    fn union_of_two_bound_classes_unifies_their_types() {
        let mut ctx = InferCtx::new();
        let a = ctx.fresh();
        let b = ctx.fresh();
        let inner = ctx.fresh();
        ctx.bind(a, Ty::fun(Ty::Var(inner), Ty::int())).unwrap();
        ctx.bind(b, Ty::fun(Ty::bool(), Ty::int())).unwrap();
        ctx.union(a, b).unwrap();
        assert_eq!(ctx.find(a), ctx.find(b));
        assert_eq!(ctx.resolve(&Ty::Var(inner)), Ty::bool());

        let c = ctx.fresh();
        ctx.bind(c, Ty::unit()).unwrap();
        assert!(matches!(ctx.union(a, c), Err(UnifyError::Mismatch { .. })));
    }

    #[test]
    fn unify_con_con_same() {
        let mut ctx = InferCtx::new();
        assert!(ctx.unify(Ty::int(), Ty::int(), origin()).is_ok());
    }

    #[test]
    fn unify_con_con_different() {
        let mut ctx = InferCtx::new();
        let err = ctx.unify(Ty::int(), Ty::bool(), origin()).unwrap_err();
        assert_eq!(
            err,
            TypeError::Mismatch {
                expected: Ty::int(),
                found: Ty::bool(),
                origin: origin(),
            }
        );
    }

    #[test]
    fn mismatch_reports_the_original_types() {
        let mut ctx = InferCtx::new();
        let lhs = Ty::fun(Ty::int(), Ty::bool());
        let rhs = Ty::fun(Ty::int(), Ty::unit());
        let err = ctx.unify(lhs.clone(), rhs.clone(), origin()).unwrap_err();
        assert!(matches!(
            err,
            TypeError::Mismatch { expected, found, .. } if expected == lhs && found == rhs
        ));
    }

    #[test]
    fn arity_mismatch_is_a_mismatch() {
        let mut ctx = InferCtx::new();
        let pair = Ty::tuple(vec![Ty::int(), Ty::int()]);
        let triple = Ty::tuple(vec![Ty::int(), Ty::int(), Ty::int()]);
        assert!(matches!(
            ctx.unify(pair, triple, origin()),
            Err(TypeError::Mismatch { .. })
        ));
    }

    #[test]
    fn unify_functions_binds_components() {
        let mut ctx = InferCtx::new();
        let a = ctx.fresh_var();
        let b = ctx.fresh_var();
        ctx.unify(
            Ty::fun(a.clone(), b.clone()),
            Ty::fun(Ty::int(), Ty::bool()),
            origin(),
        )
        .unwrap();
        assert_eq!(ctx.resolve(&a), Ty::int());
        assert_eq!(ctx.resolve(&b), Ty::bool());
    }

    #[test]
    fn occurs_check_through_unify() {
        let mut ctx = InferCtx::new();
        let v = ctx.fresh_var();
        let err = ctx
            .unify(v.clone(), Ty::fun(v, Ty::int()), origin())
            .unwrap_err();
        assert!(matches!(err, TypeError::InfiniteType { .. }));
    }

    #[test]
    fn occurs_check_sees_through_bindings() {
        let mut ctx = InferCtx::new();
        let a = ctx.fresh();
        let b = ctx.fresh();
        // b := a -> Int, then a ~ b must fail.
        ctx.bind(b, Ty::fun(Ty::Var(a), Ty::int())).unwrap();
        let err = ctx.unify(Ty::Var(a), Ty::Var(b), origin()).unwrap_err();
        assert!(matches!(err, TypeError::InfiniteType { .. }));
    }

    #[test]
    fn unify_is_symmetric() {
        let shapes: Vec<fn(&mut InferCtx) -> (Ty, Ty)> = vec![
            |_| (Ty::int(), Ty::int()),
            |_| (Ty::int(), Ty::bool()),
            |ctx| (ctx.fresh_var(), Ty::unit()),
            |ctx| {
                let v = ctx.fresh_var();
                (v.clone(), Ty::fun(v, Ty::int()))
            },
            |ctx| {
                let v = ctx.fresh_var();
                (
                    Ty::fun(v.clone(), v),
                    Ty::fun(Ty::int(), Ty::bool()),
                )
            },
            |ctx| {
                let v = ctx.fresh_var();
                (
                    Ty::tuple(vec![v.clone(), Ty::int()]),
                    Ty::tuple(vec![Ty::bool(), v]),
                )
            },
        ];
        for shape in shapes {
            let mut forward = InferCtx::new();
            let (a, b) = shape(&mut forward);
            let ok_forward = forward.unify(a, b, origin()).is_ok();

            let mut backward = InferCtx::new();
            let (a, b) = shape(&mut backward);
            let ok_backward = backward.unify(b, a, origin()).is_ok();

            assert_eq!(ok_forward, ok_backward);
        }
    }

    #[test]
    fn unify_with_self_changes_nothing() {
        let mut ctx = InferCtx::new();
        let a = ctx.fresh_var();
        let b = ctx.fresh_var();
        let t = Ty::fun(a.clone(), Ty::tuple(vec![b.clone(), Ty::int()]));
        ctx.unify(t.clone(), t.clone(), origin()).unwrap();
        assert_eq!(ctx.resolve(&a), a);
        assert_eq!(ctx.resolve(&b), b);
        assert_ne!(ctx.resolve(&a), ctx.resolve(&b));
    }

    #[test]
    fn instantiate_uses_one_fresh_var_per_quantifier() {
        let mut ctx = InferCtx::new();
        let a = ctx.fresh();
        let scheme = Scheme {
            vars: vec![a],
            ty: Ty::fun(Ty::Var(a), Ty::Var(a)),
        };
        let t1 = ctx.instantiate(&scheme);
        let t2 = ctx.instantiate(&scheme);
        let (p1, r1) = t1.as_fun().unwrap();
        assert_eq!(p1, r1);
        assert_ne!(p1, &Ty::Var(a));
        assert_ne!(t1, t2);
    }

    #[test]
    fn generalize_skips_vars_free_in_the_env() {
        let mut ctx = InferCtx::new();
        let mut env = TypeEnv::new();
        let outer = ctx.fresh();
        let frame = env.child(env.root());
        env.insert(frame, "x", Scheme::mono(Ty::Var(outer)));

        let inner = ctx.fresh();
        let ty = Ty::fun(Ty::Var(inner), Ty::Var(outer));
        let scheme = ctx.generalize(&ty, &env, frame);
        assert_eq!(scheme.vars, vec![inner]);

        // Once the env's variable is bound, nothing else is held back.
        ctx.bind(outer, Ty::int()).unwrap();
        let scheme = ctx.generalize(&Ty::Var(inner), &env, frame);
        assert_eq!(scheme.vars, vec![inner]);
    }

    #[test]
    fn generalize_sees_through_unions_with_env_vars() {
        let mut ctx = InferCtx::new();
        let mut env = TypeEnv::new();
        let outer = ctx.fresh();
        let frame = env.child(env.root());
        env.insert(frame, "x", Scheme::mono(Ty::Var(outer)));

        let local = ctx.fresh();
        ctx.union(local, outer).unwrap();
        let scheme = ctx.generalize(&Ty::Var(local), &env, frame);
        assert!(scheme.vars.is_empty());
    }
}
