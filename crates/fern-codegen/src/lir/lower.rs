//! Typed AST to LIR lowering.
//!
//! Every function value becomes a heap closure record
//! `[code pointer, capture 0, capture 1, ...]` and every call goes through
//! the record's code pointer. Free variables are captured by value when the
//! record is built. A `let rec` function reaches itself through its own
//! closure pointer, so recursion needs no capture.
//!
//! Directly applied builtins are expanded inline. A builtin used as a value
//! gets a small wrapper block the first time it is needed. Two-argument
//! builtins are curried: applied to one argument they build a closure over
//! a shared block that takes the second.
//!
//! A list is a pointer to a cell `[head, tail]`, and the empty list is 0.
//!
//! The program has already been type-checked, so a name that does not
//! resolve or a `let rec` over a non-function is a bug in the checker, and
//! lowering panics on it.

use std::mem;

use fern_parser::{BinOp, Expr, ExprKind, Item, Program};
use fern_typeck::builtins::Builtin;
use fern_typeck::{Ty, TypeckResult};
use rustc_hash::FxHashMap;
use tracing::{debug, debug_span};

use super::captures::free_vars;
use super::frame::{
    frame_bytes, intrinsic, partial_slots, program_slots, slots_needed, Intrinsic,
};
use super::{
    ArithOp, Block, Cond, Label, LabelKind, LirProgram, Op, Operand, Reg, CALL_ARG_BYTES, WORD,
};

// ── Function context ─────────────────────────────────────────────────

/// Where a name's value lives, seen from the function being lowered.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Place {
    Slot(u32),
    Param,
    /// The function's own closure, for `let rec` self-references.
    SelfClosure,
    Capture(usize),
    Builtin(Builtin),
}

/// Lowering state for one function block.
struct FnCtx {
    label: Label,
    /// Position of this block in the output.
    index: usize,
    param: Option<String>,
    self_name: Option<String>,
    captures: Vec<String>,
    /// Local bindings in scope, innermost last.
    locals: Vec<(String, u32)>,
    ops: Vec<Op>,
    next_slot: u32,
    reserved_slots: u32,
}

impl FnCtx {
    fn new(
        label: Label,
        index: usize,
        param: Option<String>,
        self_name: Option<String>,
        captures: Vec<String>,
        reserved_slots: u32,
    ) -> Self {
        FnCtx {
            label,
            index,
            param,
            self_name,
            captures,
            locals: Vec::new(),
            ops: vec![Op::Enter {
                bytes: frame_bytes(reserved_slots),
            }],
            next_slot: 0,
            reserved_slots,
        }
    }

    /// Locals shadow the parameter, which shadows the function's own name.
    fn resolve(&self, name: &str) -> Option<Place> {
        if let Some((_, slot)) = self.locals.iter().rev().find(|(n, _)| n == name) {
            return Some(Place::Slot(*slot));
        }
        if self.param.as_deref() == Some(name) {
            return Some(Place::Param);
        }
        if self.self_name.as_deref() == Some(name) {
            return Some(Place::SelfClosure);
        }
        if let Some(i) = self.captures.iter().position(|c| c == name) {
            return Some(Place::Capture(i));
        }
        Builtin::from_name(name).map(Place::Builtin)
    }

    /// Whether `name` refers to something other than a builtin.
    fn is_bound(&self, name: &str) -> bool {
        !matches!(self.resolve(name), None | Some(Place::Builtin(_)))
    }
}

// ── Lowerer ──────────────────────────────────────────────────────────

struct Lowerer<'a> {
    typeck: &'a TypeckResult,
    /// Blocks in the order their functions were reached, filled in as each
    /// function is finished.
    blocks: Vec<Option<Block>>,
    /// The function being lowered. Enclosing functions wait on the Rust stack.
    current: FnCtx,
    /// Label ids handed out so far. Id 0 is the entry block.
    next_label: u32,
    /// Wrapper blocks for builtins used as values.
    wrappers: FxHashMap<Builtin, Label>,
    /// Blocks taking the second argument of a two-argument builtin.
    curried: FxHashMap<Builtin, Label>,
}

impl<'a> Lowerer<'a> {
    fn new(typeck: &'a TypeckResult, entry_slots: u32) -> Self {
        Lowerer {
            typeck,
            blocks: vec![None],
            current: FnCtx::new(Label::entry(), 0, None, None, Vec::new(), entry_slots),
            next_label: 0,
            wrappers: FxHashMap::default(),
            curried: FxHashMap::default(),
        }
    }

    fn emit(&mut self, op: Op) {
        self.current.ops.push(op);
    }

    fn mov(&mut self, dst: Operand, src: Operand) {
        self.emit(Op::Mov { dst, src });
    }

    fn fresh_label(&mut self, kind: LabelKind) -> Label {
        self.next_label += 1;
        Label {
            id: self.next_label,
            kind,
        }
    }

    fn local_label(&mut self) -> Label {
        self.fresh_label(LabelKind::Local)
    }

    fn alloc_slot(&mut self) -> u32 {
        let slot = self.current.next_slot;
        self.current.next_slot += 1;
        slot
    }

    fn resolve(&self, name: &str) -> Place {
        match self.current.resolve(name) {
            Some(place) => place,
            None => panic!(
                "`{name}` is unbound in `{}`; the type checker should have rejected it",
                self.current.label
            ),
        }
    }

    // ── Blocks ───────────────────────────────────────────────────────

    /// Make `ctx` the current function, returning the one it replaces.
    fn enter_fn(&mut self, ctx: FnCtx) -> FnCtx {
        mem::replace(&mut self.current, ctx)
    }

    /// Close the current function and go back to `parent`.
    fn leave_fn(&mut self, parent: FnCtx) {
        let ctx = mem::replace(&mut self.current, parent);
        self.finish_block(ctx);
    }

    fn reserve_block(&mut self) -> usize {
        self.blocks.push(None);
        self.blocks.len() - 1
    }

    fn finish_block(&mut self, ctx: FnCtx) {
        debug_assert_eq!(
            ctx.next_slot, ctx.reserved_slots,
            "frame size of `{}` disagrees with its body",
            ctx.label
        );
        let block = Block {
            label: ctx.label,
            param: ctx.param,
            frame_bytes: frame_bytes(ctx.reserved_slots),
            ops: ctx.ops,
        };
        debug!(
            block = %block.label,
            frame_bytes = block.frame_bytes,
            captures = ctx.captures.len(),
            ops = block.ops.len(),
            "emitted block"
        );
        self.blocks[ctx.index] = Some(block);
    }

    fn finish(mut self) -> LirProgram {
        let entry = self.current;
        debug_assert_eq!(entry.next_slot, entry.reserved_slots, "entry frame size");
        let index = entry.index;
        let block = Block {
            label: entry.label,
            param: None,
            frame_bytes: frame_bytes(entry.reserved_slots),
            ops: entry.ops,
        };
        debug!(frame_bytes = block.frame_bytes, ops = block.ops.len(), "emitted entry block");
        self.blocks[index] = Some(block);
        LirProgram {
            blocks: self.blocks.into_iter().flatten().collect(),
        }
    }

    // ── Program ──────────────────────────────────────────────────────

    fn lower_program(&mut self, program: &Program) {
        for item in &program.items {
            match item {
                Item::Let {
                    name,
                    value,
                    recursive,
                } => self.lower_binding(name, value, *recursive),
                Item::Expr(expr) => self.lower_expr(expr),
            }
        }

        if matches!(self.current.ops.last(), Some(Op::Exit(_))) {
            return;
        }
        let status = match program.final_expr() {
            Some(expr) if self.typeck.type_of(expr.id) == Some(&Ty::int()) => Operand::rax(),
            _ => Operand::Imm(0),
        };
        self.emit(Op::Exit(status));
    }

    /// Evaluate a `let` value and give `name` a slot holding it. The caller
    /// pops the local once its scope ends.
    fn lower_binding(&mut self, name: &str, value: &Expr, recursive: bool) {
        if recursive {
            let ExprKind::Lambda { param, body } = &value.kind else {
                panic!("`let rec {name}` is not a function; the type checker should have rejected it");
            };
            self.lower_lambda(param, body, name, Some(name));
        } else {
            self.lower_value(value, name);
        }
        let slot = self.alloc_slot();
        self.mov(Operand::Slot(slot), Operand::rax());
        self.current.locals.push((name.to_string(), slot));
    }

    /// Lower `expr`, naming its block after `hint` if it is a function.
    fn lower_value(&mut self, expr: &Expr, hint: &str) {
        match &expr.kind {
            ExprKind::Lambda { param, body } => self.lower_lambda(param, body, hint, None),
            _ => self.lower_expr(expr),
        }
    }

    // ── Expressions ──────────────────────────────────────────────────

    /// Lower `expr`, leaving its value in `rax`.
    fn lower_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Int(n) => self.mov(Operand::rax(), Operand::Imm(*n)),
            ExprKind::Bool(b) => self.mov(Operand::rax(), Operand::Imm(i64::from(*b))),
            ExprKind::Unit => self.mov(Operand::rax(), Operand::Imm(0)),
            ExprKind::Ident(name) => self.load(name),
            ExprKind::Lambda { param, body } => self.lower_lambda(param, body, "lambda", None),
            ExprKind::Apply { callee, arg } => self.lower_apply(callee, arg),
            ExprKind::Let {
                name,
                value,
                body,
                recursive,
            } => {
                self.lower_binding(name, value, *recursive);
                self.lower_expr(body);
                self.current.locals.pop();
            }
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => self.lower_if(cond, then_branch, else_branch),
            ExprKind::Binary { op, lhs, rhs } => self.lower_binary(*op, lhs, rhs),
            ExprKind::Sequence { first, second } => {
                self.lower_expr(first);
                self.lower_expr(second);
            }
            ExprKind::Tuple(elems) => {
                let elems: Vec<&Expr> = elems.iter().collect();
                self.lower_tuple(&elems);
            }
        }
    }

    /// Load the value of `name` into `rax`.
    fn load(&mut self, name: &str) {
        match self.resolve(name) {
            Place::Slot(slot) => self.mov(Operand::rax(), Operand::Slot(slot)),
            Place::Param => self.mov(Operand::rax(), Operand::Param),
            Place::SelfClosure => self.mov(Operand::rax(), Operand::Env),
            Place::Capture(i) => {
                self.mov(Operand::rcx(), Operand::Env);
                self.mov(Operand::rax(), Operand::field(Reg::Rcx, i + 1));
            }
            Place::Builtin(builtin) => {
                let label = self.wrapper(builtin);
                self.emit_closure(label, &[]);
            }
        }
    }

    fn lower_lambda(&mut self, param: &str, body: &Expr, hint: &str, self_name: Option<&str>) {
        let mut own: Vec<&str> = vec![param];
        own.extend(self_name);
        let captures: Vec<String> = free_vars(body, &own)
            .into_iter()
            .filter(|name| !matches!(self.resolve(name), Place::Builtin(_)))
            .collect();

        let label = self.fresh_label(LabelKind::Function(hint.to_string()));
        let index = self.reserve_block();
        let mut bound: Vec<&str> = captures.iter().map(String::as_str).collect();
        bound.extend(own);
        let slots = slots_needed(body, &bound);

        let ctx = FnCtx::new(
            label.clone(),
            index,
            Some(param.to_string()),
            self_name.map(str::to_string),
            captures.clone(),
            slots,
        );
        let parent = self.enter_fn(ctx);
        self.lower_value(body, hint);
        self.emit(Op::Leave);
        self.emit(Op::Ret {
            pop_bytes: CALL_ARG_BYTES,
        });
        self.leave_fn(parent);

        self.emit_closure(label, &captures);
    }

    /// Allocate a closure record for `code`, filled with the current values
    /// of `captures`. The record pointer ends up in `rax`.
    fn emit_closure(&mut self, code: Label, captures: &[String]) {
        let bytes = WORD as u32 * (1 + captures.len() as u32);
        self.emit(Op::Alloc { bytes });
        self.mov(Operand::r8(), Operand::rax());
        self.mov(Operand::rcx(), Operand::Code(code));
        self.mov(Operand::field(Reg::R8, 0), Operand::rcx());
        for (i, name) in captures.iter().enumerate() {
            self.load(name);
            self.mov(Operand::field(Reg::R8, i + 1), Operand::rax());
        }
        self.mov(Operand::rax(), Operand::r8());
    }

    fn lower_apply(&mut self, callee: &Expr, arg: &Expr) {
        match intrinsic(callee, arg, |n| self.current.is_bound(n)) {
            Some(Intrinsic::Unary(builtin, arg)) => {
                self.lower_expr(arg);
                self.emit_intrinsic(builtin);
                return;
            }
            Some(Intrinsic::Saturated(builtin, first, second)) => {
                self.lower_saturated(builtin, first, second);
                return;
            }
            None => {}
        }

        self.lower_expr(callee);
        let closure = self.alloc_slot();
        self.mov(Operand::Slot(closure), Operand::rax());
        self.lower_expr(arg);
        self.emit(Op::Push(Operand::Slot(closure)));
        self.emit(Op::Push(Operand::rax()));
        self.mov(Operand::rax(), Operand::Slot(closure));
        self.emit(Op::CallIndirect(Operand::field(Reg::Rax, 0)));
    }

    /// Apply `builtin` to the value in `rax`.
    fn emit_intrinsic(&mut self, builtin: Builtin) {
        match builtin {
            Builtin::Exit => self.emit(Op::Exit(Operand::rax())),
            Builtin::Succ => self.emit(Op::Arith {
                op: ArithOp::Add,
                dst: Reg::Rax,
                src: Operand::Imm(1),
            }),
            Builtin::Pred => self.emit(Op::Arith {
                op: ArithOp::Sub,
                dst: Reg::Rax,
                src: Operand::Imm(1),
            }),
            Builtin::Zero => {
                self.emit(Op::Cmp {
                    lhs: Operand::rax(),
                    rhs: Operand::Imm(0),
                });
                self.emit_flag(Cond::Eq);
            }
            Builtin::Not => {
                self.mov(Operand::rcx(), Operand::rax());
                self.mov(Operand::rax(), Operand::Imm(1));
                self.emit(Op::Arith {
                    op: ArithOp::Sub,
                    dst: Reg::Rax,
                    src: Operand::rcx(),
                });
            }
            Builtin::Fst => self.mov(Operand::rax(), Operand::field(Reg::Rax, 0)),
            Builtin::Snd => self.mov(Operand::rax(), Operand::field(Reg::Rax, 1)),
            Builtin::Null => {
                self.emit(Op::Cmp {
                    lhs: Operand::rax(),
                    rhs: Operand::Imm(0),
                });
                self.emit_flag(Cond::Eq);
            }
            Builtin::Tail => self.mov(Operand::rax(), Operand::field(Reg::Rax, 1)),
            Builtin::Pair | Builtin::Times => self.emit_partial(builtin),
        }
    }

    /// Close over the first argument of a two-argument `builtin`, held in
    /// `rax`. The record is `[curried block, first]`.
    fn emit_partial(&mut self, builtin: Builtin) {
        let code = self.curried_block(builtin);
        let first = self.alloc_slot();
        self.mov(Operand::Slot(first), Operand::rax());
        self.emit(Op::Alloc {
            bytes: 2 * WORD as u32,
        });
        self.mov(Operand::r8(), Operand::rax());
        self.mov(Operand::rcx(), Operand::Code(code));
        self.mov(Operand::field(Reg::R8, 0), Operand::rcx());
        self.mov(Operand::rax(), Operand::Slot(first));
        self.mov(Operand::field(Reg::R8, 1), Operand::rax());
        self.mov(Operand::rax(), Operand::r8());
    }

    /// `builtin first second`, with both arguments known.
    fn lower_saturated(&mut self, builtin: Builtin, first: &Expr, second: &Expr) {
        match builtin {
            Builtin::Pair => self.lower_tuple(&[first, second]),
            Builtin::Times => self.lower_binary(BinOp::Mul, first, second),
            other => panic!("`{}` takes one argument", other.name()),
        }
    }

    /// The block a partially applied `builtin` calls with its second
    /// argument, created on first use. The first is capture 0.
    fn curried_block(&mut self, builtin: Builtin) -> Label {
        if let Some(label) = self.curried.get(&builtin) {
            return label.clone();
        }
        let label = self.fresh_label(LabelKind::Function(format!(
            "builtin_{}_curried",
            builtin.name()
        )));
        let index = self.reserve_block();
        let ctx = FnCtx::new(
            label.clone(),
            index,
            Some("y".to_string()),
            None,
            vec!["x".to_string()],
            0,
        );
        let parent = self.enter_fn(ctx);
        match builtin {
            Builtin::Pair => {
                self.emit(Op::Alloc {
                    bytes: 2 * WORD as u32,
                });
                self.mov(Operand::r8(), Operand::rax());
                self.load("x");
                self.mov(Operand::field(Reg::R8, 0), Operand::rax());
                self.mov(Operand::rax(), Operand::Param);
                self.mov(Operand::field(Reg::R8, 1), Operand::rax());
                self.mov(Operand::rax(), Operand::r8());
            }
            Builtin::Times => {
                self.load("x");
                self.emit(Op::Arith {
                    op: ArithOp::Mul,
                    dst: Reg::Rax,
                    src: Operand::Param,
                });
            }
            other => panic!("`{}` takes one argument", other.name()),
        }
        self.emit(Op::Leave);
        self.emit(Op::Ret {
            pop_bytes: CALL_ARG_BYTES,
        });
        self.leave_fn(parent);

        self.curried.insert(builtin, label.clone());
        label
    }

    /// Turn the flags of the preceding `cmp` into 1 or 0 in `rax`.
    fn emit_flag(&mut self, cond: Cond) {
        let done = self.local_label();
        self.mov(Operand::rax(), Operand::Imm(1));
        self.emit(Op::JmpIf {
            cond,
            target: done.clone(),
        });
        self.mov(Operand::rax(), Operand::Imm(0));
        self.emit(Op::Label(done));
    }

    /// The wrapper block for `builtin`, created on first use.
    fn wrapper(&mut self, builtin: Builtin) -> Label {
        if let Some(label) = self.wrappers.get(&builtin) {
            return label.clone();
        }
        let label = self.fresh_label(LabelKind::Function(format!("builtin_{}", builtin.name())));
        let index = self.reserve_block();
        let ctx = FnCtx::new(
            label.clone(),
            index,
            Some("x".to_string()),
            None,
            Vec::new(),
            partial_slots(builtin),
        );
        let parent = self.enter_fn(ctx);
        self.mov(Operand::rax(), Operand::Param);
        self.emit_intrinsic(builtin);
        self.emit(Op::Leave);
        self.emit(Op::Ret {
            pop_bytes: CALL_ARG_BYTES,
        });
        self.leave_fn(parent);

        self.wrappers.insert(builtin, label.clone());
        label
    }

    fn lower_if(&mut self, cond: &Expr, then_branch: &Expr, else_branch: &Expr) {
        let then_label = self.local_label();
        let else_label = self.local_label();
        let end_label = self.local_label();

        self.lower_expr(cond);
        self.emit(Op::Cmp {
            lhs: Operand::rax(),
            rhs: Operand::Imm(0),
        });
        self.emit(Op::JmpIf {
            cond: Cond::Eq,
            target: else_label.clone(),
        });
        self.emit(Op::Label(then_label));
        self.lower_expr(then_branch);
        self.emit(Op::Jmp(end_label.clone()));
        self.emit(Op::Label(else_label));
        self.lower_expr(else_branch);
        self.emit(Op::Label(end_label));
    }

    fn lower_binary(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr) {
        self.lower_expr(lhs);
        let saved = self.alloc_slot();
        self.mov(Operand::Slot(saved), Operand::rax());
        self.lower_expr(rhs);
        self.mov(Operand::rcx(), Operand::rax());
        self.mov(Operand::rax(), Operand::Slot(saved));

        let arith = match op {
            BinOp::Add => ArithOp::Add,
            BinOp::Sub => ArithOp::Sub,
            BinOp::Mul => ArithOp::Mul,
            BinOp::Div => ArithOp::Div,
            BinOp::Mod => ArithOp::Rem,
            BinOp::Eq => return self.compare(Cond::Eq),
            BinOp::NotEq => return self.compare(Cond::Ne),
            BinOp::Lt => return self.compare(Cond::Lt),
            BinOp::LtEq => return self.compare(Cond::Le),
            BinOp::Gt => return self.compare(Cond::Gt),
            BinOp::GtEq => return self.compare(Cond::Ge),
        };
        self.emit(Op::Arith {
            op: arith,
            dst: Reg::Rax,
            src: Operand::rcx(),
        });
    }

    /// Compare `rax` with `rcx`. Operands are always integers.
    fn compare(&mut self, cond: Cond) {
        self.emit(Op::Cmp {
            lhs: Operand::rax(),
            rhs: Operand::rcx(),
        });
        self.emit_flag(cond);
    }

    fn lower_tuple(&mut self, elems: &[&Expr]) {
        self.emit(Op::Alloc {
            bytes: WORD as u32 * elems.len() as u32,
        });
        let record = self.alloc_slot();
        self.mov(Operand::Slot(record), Operand::rax());
        for (i, elem) in elems.iter().enumerate() {
            self.lower_expr(elem);
            self.mov(Operand::rcx(), Operand::Slot(record));
            self.mov(Operand::field(Reg::Rcx, i), Operand::rax());
        }
        self.mov(Operand::rax(), Operand::Slot(record));
    }
}

/// Lower a type-checked program to LIR.
///
/// # Panics
///
/// Panics if `program` did not pass [`fern_typeck::check`] with `typeck` as
/// the result.
pub fn lower_program(program: &Program, typeck: &TypeckResult) -> LirProgram {
    let _span = debug_span!("lower", items = program.items.len()).entered();
    let mut lowerer = Lowerer::new(typeck, program_slots(program));
    lowerer.lower_program(program);
    lowerer.finish()
}
