//! Type representation for Fern.
//!
//! A type is either an inference variable or a named constructor applied to
//! argument types. `Int`, `Bool` and `Unit` are nullary constructors;
//! functions are `Fn(arg, ret)`, tuples are `Tuple(t1, ..., tn)` and lists
//! are `List(elem)`.

use std::fmt;

use ena::unify::{NoError, UnifyKey, UnifyValue};
use rustc_hash::FxHashMap;

/// A type variable, identified by its index in the unification table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TyVar(pub u32);

/// A type constructor, identified by name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TyCon {
    pub name: String,
}

impl TyCon {
    pub fn new(name: impl Into<String>) -> Self {
        TyCon { name: name.into() }
    }
}

impl fmt::Display for TyCon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

pub const INT: &str = "Int";
pub const BOOL: &str = "Bool";
pub const UNIT: &str = "Unit";
pub const FN: &str = "Fn";
pub const TUPLE: &str = "Tuple";
pub const LIST: &str = "List";

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Ty {
    /// An inference variable.
    Var(TyVar),
    /// A constructor and its ordered arguments.
    Con(TyCon, Vec<Ty>),
}

impl Ty {
    fn nullary(name: &str) -> Ty {
        Ty::Con(TyCon::new(name), Vec::new())
    }

    pub fn int() -> Ty {
        Ty::nullary(INT)
    }

    pub fn bool() -> Ty {
        Ty::nullary(BOOL)
    }

    pub fn unit() -> Ty {
        Ty::nullary(UNIT)
    }

    pub fn fun(arg: Ty, ret: Ty) -> Ty {
        Ty::Con(TyCon::new(FN), vec![arg, ret])
    }

    /// A curried function over `params`: `fun_n([a, b], r)` is `a -> b -> r`.
    pub fn fun_n(params: Vec<Ty>, ret: Ty) -> Ty {
        params
            .into_iter()
            .rev()
            .fold(ret, |ret, param| Ty::fun(param, ret))
    }

    pub fn tuple(elems: Vec<Ty>) -> Ty {
        Ty::Con(TyCon::new(TUPLE), elems)
    }

    pub fn list(elem: Ty) -> Ty {
        Ty::Con(TyCon::new(LIST), vec![elem])
    }

    /// `Some((arg, ret))` if this is a function type.
    pub fn as_fun(&self) -> Option<(&Ty, &Ty)> {
        match self {
            Ty::Con(con, args) if con.name == FN && args.len() == 2 => Some((&args[0], &args[1])),
            _ => None,
        }
    }

    /// Every variable in the type, left to right, without duplicates.
    ///
    /// Does not look through the unifier; resolve first if that matters.
    pub fn vars(&self) -> Vec<TyVar> {
        let mut out = Vec::new();
        self.collect_vars(&mut out);
        out
    }

    fn collect_vars(&self, out: &mut Vec<TyVar>) {
        match self {
            Ty::Var(v) => {
                if !out.contains(v) {
                    out.push(*v);
                }
            }
            Ty::Con(_, args) => args.iter().for_each(|a| a.collect_vars(out)),
        }
    }

    fn fmt_with(&self, f: &mut fmt::Formatter<'_>, names: &FxHashMap<TyVar, String>) -> fmt::Result {
        match self {
            Ty::Var(v) => match names.get(v) {
                Some(name) => f.write_str(name),
                None => write!(f, "?{}", v.0),
            },
            Ty::Con(con, args) if con.name == FN && args.len() == 2 => {
                // Arrows associate to the right.
                if args[0].as_fun().is_some() {
                    f.write_str("(")?;
                    args[0].fmt_with(f, names)?;
                    f.write_str(")")?;
                } else {
                    args[0].fmt_with(f, names)?;
                }
                f.write_str(" -> ")?;
                args[1].fmt_with(f, names)
            }
            Ty::Con(con, args) if con.name == TUPLE => {
                f.write_str("(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    a.fmt_with(f, names)?;
                }
                f.write_str(")")
            }
            Ty::Con(con, args) => {
                write!(f, "{con}")?;
                if !args.is_empty() {
                    f.write_str("<")?;
                    for (i, a) in args.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        a.fmt_with(f, names)?;
                    }
                    f.write_str(">")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_with(f, &FxHashMap::default())
    }
}

/// A polymorphic type scheme: `vars` are universally quantified in `ty`.
///
/// `fun x -> x` generalizes to `Scheme { vars: [a], ty: a -> a }`.
#[derive(Clone, Debug, PartialEq)]
pub struct Scheme {
    pub vars: Vec<TyVar>,
    pub ty: Ty,
}

impl Scheme {
    /// A scheme with nothing quantified.
    pub fn mono(ty: Ty) -> Self {
        Scheme {
            vars: Vec::new(),
            ty,
        }
    }
}

/// Quantified variables print as `'a`, `'b`, ... in order of first
/// appearance; anything left free prints as `?n`.
impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: FxHashMap<TyVar, String> = self
            .ty
            .vars()
            .into_iter()
            .filter(|v| self.vars.contains(v))
            .enumerate()
            .map(|(i, v)| (v, quantifier_name(i)))
            .collect();
        self.ty.fmt_with(f, &names)
    }
}

fn quantifier_name(index: usize) -> String {
    let letter = (b'a' + (index % 26) as u8) as char;
    match index / 26 {
        0 => format!("'{letter}"),
        n => format!("'{letter}{n}"),
    }
}

// ── ena trait implementations ──────────────────────────────────────────

impl UnifyKey for TyVar {
    type Value = Option<Ty>;

    fn index(&self) -> u32 {
        self.0
    }

    fn from_index(u: u32) -> Self {
        TyVar(u)
    }

    fn tag() -> &'static str {
        "TyVar"
    }
}

/// Two bound classes are only linked after `InferCtx::unify` has made their
/// types agree, so merging keeps either side.
impl UnifyValue for Ty {
    type Error = NoError;

    fn unify_values(a: &Self, _b: &Self) -> Result<Self, NoError> {
        Ok(a.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrows_are_right_associative() {
        let t = Ty::fun_n(vec![Ty::int(), Ty::int()], Ty::int());
        assert_eq!(t.to_string(), "Int -> Int -> Int");

        let higher = Ty::fun(Ty::fun(Ty::int(), Ty::bool()), Ty::unit());
        assert_eq!(higher.to_string(), "(Int -> Bool) -> Unit");
    }

    #[test]
    fn tuples_and_vars_display() {
        let t = Ty::tuple(vec![Ty::int(), Ty::Var(TyVar(3))]);
        assert_eq!(t.to_string(), "(Int, ?3)");
    }

    #[test]
    fn scheme_names_quantified_vars_in_order() {
        let a = TyVar(7);
        let b = TyVar(2);
        let scheme = Scheme {
            vars: vec![b, a],
            ty: Ty::fun(Ty::tuple(vec![Ty::Var(a), Ty::Var(b)]), Ty::Var(a)),
        };
        assert_eq!(scheme.to_string(), "('a, 'b) -> 'a");
    }

    #[test]
    fn free_vars_in_a_scheme_stay_visible() {
        let scheme = Scheme {
            vars: vec![TyVar(0)],
            ty: Ty::fun(Ty::Var(TyVar(0)), Ty::Var(TyVar(1))),
        };
        assert_eq!(scheme.to_string(), "'a -> ?1");
    }

    #[test]
    fn lists_display_their_element() {
        assert_eq!(Ty::list(Ty::int()).to_string(), "List<Int>");
        let nested = Ty::list(Ty::tuple(vec![Ty::bool(), Ty::unit()]));
        assert_eq!(nested.to_string(), "List<(Bool, Unit)>");
    }

    #[test]
    fn vars_are_deduplicated() {
        let v = Ty::Var(TyVar(4));
        let t = Ty::fun(v.clone(), Ty::tuple(vec![v, Ty::Var(TyVar(5))]));
        assert_eq!(t.vars(), vec![TyVar(4), TyVar(5)]);
    }

    #[test]
    fn as_fun_only_matches_functions() {
        let f = Ty::fun(Ty::int(), Ty::bool());
        assert_eq!(f.as_fun(), Some((&Ty::int(), &Ty::bool())));
        assert!(Ty::int().as_fun().is_none());
        assert!(Ty::tuple(vec![Ty::int(), Ty::int()]).as_fun().is_none());
    }

    #[test]
    fn quantifier_names_wrap() {
        assert_eq!(quantifier_name(0), "'a");
        assert_eq!(quantifier_name(25), "'z");
        assert_eq!(quantifier_name(26), "'a1");
    }
}
