//! Type errors and their provenance.
//!
//! Every unification carries a [`ConstraintOrigin`] naming the construct that
//! asked for it. The broad error variants stay few; the origin is what lets
//! [`TypeError::kind`] tell a non-boolean condition from a bad argument.

use std::fmt;

use fern_parser::BinOp;

use crate::ty::{Ty, TyVar};

/// Where a unification constraint came from.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstraintOrigin {
    /// `f x`: the argument must match the parameter type.
    FnArg,
    /// `if c then ...`: the condition must be `Bool`.
    IfCondition,
    /// Both branches of an `if` must agree.
    IfBranches,
    /// An operand of a binary operator.
    BinOp { op: BinOp },
    /// `let rec name = ...`: the pre-bound variable against the inferred value.
    LetBinding { name: String },
    /// Constraints made directly through the unifier.
    Builtin,
}

impl fmt::Display for ConstraintOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintOrigin::FnArg => write!(f, "in function argument"),
            ConstraintOrigin::IfCondition => write!(f, "in `if` condition"),
            ConstraintOrigin::IfBranches => write!(f, "in `if` branches"),
            ConstraintOrigin::BinOp { op } => write!(f, "in operand of `{op}`"),
            ConstraintOrigin::LetBinding { name } => write!(f, "in definition of `{name}`"),
            ConstraintOrigin::Builtin => write!(f, "in builtin constraint"),
        }
    }
}

/// A type error. Checking stops at the first one.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeError {
    /// Two types that had to be equal are not. Both are reported as they
    /// stood when the failing unification began.
    Mismatch {
        expected: Ty,
        found: Ty,
        origin: ConstraintOrigin,
    },
    /// A variable would have to contain itself.
    InfiniteType {
        var: TyVar,
        ty: Ty,
        origin: ConstraintOrigin,
    },
    UnboundVariable { name: String },
    /// A value of non-function type was applied to an argument.
    NotAFunction { ty: Ty },
    /// `let rec` whose right-hand side is not a function.
    RecursiveValue { name: String },
}

/// The classification of a [`TypeError`] used for codes and summaries.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeErrorKind {
    UnboundIdentifier,
    Unification,
    OccursCheck,
    ConditionNotBool,
    BranchMismatch,
    OperatorType,
    ArgumentMismatch,
    NotAFunction,
    RecursiveValue,
}

impl TypeErrorKind {
    /// Stable diagnostic code.
    pub fn code(self) -> &'static str {
        match self {
            TypeErrorKind::UnboundIdentifier => "E0001",
            TypeErrorKind::Unification => "E0002",
            TypeErrorKind::OccursCheck => "E0003",
            TypeErrorKind::ConditionNotBool => "E0004",
            TypeErrorKind::BranchMismatch => "E0005",
            TypeErrorKind::OperatorType => "E0006",
            TypeErrorKind::ArgumentMismatch => "E0007",
            TypeErrorKind::NotAFunction => "E0008",
            TypeErrorKind::RecursiveValue => "E0009",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TypeErrorKind::UnboundIdentifier => "unbound identifier",
            TypeErrorKind::Unification => "type mismatch",
            TypeErrorKind::OccursCheck => "infinite type",
            TypeErrorKind::ConditionNotBool => "condition is not a boolean",
            TypeErrorKind::BranchMismatch => "if branches differ",
            TypeErrorKind::OperatorType => "operator type error",
            TypeErrorKind::ArgumentMismatch => "argument type mismatch",
            TypeErrorKind::NotAFunction => "not a function",
            TypeErrorKind::RecursiveValue => "recursive value",
        }
    }
}

impl TypeError {
    pub fn kind(&self) -> TypeErrorKind {
        match self {
            TypeError::Mismatch { origin, .. } => match origin {
                ConstraintOrigin::IfCondition => TypeErrorKind::ConditionNotBool,
                ConstraintOrigin::IfBranches => TypeErrorKind::BranchMismatch,
                ConstraintOrigin::BinOp { .. } => TypeErrorKind::OperatorType,
                ConstraintOrigin::FnArg => TypeErrorKind::ArgumentMismatch,
                ConstraintOrigin::LetBinding { .. } | ConstraintOrigin::Builtin => {
                    TypeErrorKind::Unification
                }
            },
            TypeError::InfiniteType { .. } => TypeErrorKind::OccursCheck,
            TypeError::UnboundVariable { .. } => TypeErrorKind::UnboundIdentifier,
            TypeError::NotAFunction { .. } => TypeErrorKind::NotAFunction,
            TypeError::RecursiveValue { .. } => TypeErrorKind::RecursiveValue,
        }
    }

    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    /// True for every failure that came out of unification, however the
    /// origin specialized it.
    pub fn is_unification_failure(&self) -> bool {
        matches!(self, TypeError::Mismatch { .. })
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeError::Mismatch {
                expected,
                found,
                origin,
            } => {
                write!(f, "type mismatch: expected `{expected}`, found `{found}`")?;
                match origin {
                    ConstraintOrigin::Builtin => Ok(()),
                    other => write!(f, " ({other})"),
                }
            }
            TypeError::InfiniteType { var, ty, .. } => {
                write!(f, "infinite type: `?{}` occurs in `{}`", var.0, ty)
            }
            TypeError::UnboundVariable { name } => write!(f, "unbound variable `{name}`"),
            TypeError::NotAFunction { ty } => write!(f, "`{ty}` is not a function"),
            TypeError::RecursiveValue { name } => write!(
                f,
                "`let rec {name}` must define a function (write `fun ... -> ...`)"
            ),
        }
    }
}

impl std::error::Error for TypeError {}
