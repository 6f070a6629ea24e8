//! Low-level IR (LIR) definitions.
//!
//! The LIR is a flat, closure-converted, x86-64 flavoured instruction list.
//! Every function value in the source becomes one [`Block`] with its own
//! stack frame; the synthesized entry block comes first. Values live in
//! `rax` between operations and in 8-byte frame slots across them.
//!
//! There is no optimizer and no instruction scheduling: [`crate::nasm`]
//! renders the listing one instruction at a time.

pub mod captures;
pub mod frame;
pub mod lower;

use std::fmt;

// ── Labels ───────────────────────────────────────────────────────────

/// What a label names, which decides how it is spelled in assembly.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum LabelKind {
    /// The program entry point, always `main`.
    Entry,
    /// A function block. The hint is the binding it came from, or `lambda`.
    Function(String),
    /// A jump target inside a block.
    Local,
}

/// A jump or call target. Ids are unique within one [`LirProgram`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Label {
    pub id: u32,
    pub kind: LabelKind,
}

impl Label {
    pub fn entry() -> Self {
        Label {
            id: 0,
            kind: LabelKind::Entry,
        }
    }

    pub fn is_local(&self) -> bool {
        self.kind == LabelKind::Local
    }

    /// The assembler symbol for this label.
    ///
    /// Function symbols end in `_<id>`, so two functions with the same hint
    /// (or a user function called `main`) never clash. Local labels start with
    /// a dot and are scoped to the function symbol before them.
    pub fn symbol(&self) -> String {
        match &self.kind {
            LabelKind::Entry => "main".to_string(),
            LabelKind::Function(hint) => format!("{}_{}", sanitize(hint), self.id),
            LabelKind::Local => format!(".L{}", self.id),
        }
    }
}

/// Identifiers may contain `'`, which assemblers do not accept in symbols.
fn sanitize(hint: &str) -> String {
    hint.replace('\'', "_prime")
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.symbol())
    }
}

// ── Operands ─────────────────────────────────────────────────────────

/// The registers lowering uses. `rax` carries every intermediate value,
/// `rcx` is scratch and `r8` holds a record while its fields are stored.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Reg {
    Rax,
    Rcx,
    R8,
}

impl Reg {
    pub fn name(self) -> &'static str {
        match self {
            Reg::Rax => "rax",
            Reg::Rcx => "rcx",
            Reg::R8 => "r8",
        }
    }
}

/// Size of every value: integers, booleans, unit and pointers alike.
pub const WORD: i32 = 8;

/// Bytes a caller pushes for one call: the closure pointer and the argument.
pub const CALL_ARG_BYTES: u32 = 16;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    Imm(i64),
    Reg(Reg),
    /// Frame slot `n`, at `[rbp - 8(n+1)]`.
    Slot(u32),
    /// The current function's argument, at `[rbp+16]`.
    Param,
    /// The current function's closure record pointer, at `[rbp+24]`.
    Env,
    /// A word at `base + offset`.
    Mem { base: Reg, offset: i32 },
    /// The address of a function block.
    Code(Label),
}

impl Operand {
    pub fn rax() -> Self {
        Operand::Reg(Reg::Rax)
    }

    pub fn rcx() -> Self {
        Operand::Reg(Reg::Rcx)
    }

    pub fn r8() -> Self {
        Operand::Reg(Reg::R8)
    }

    /// Field `index` of the record `base` points at.
    pub fn field(base: Reg, index: usize) -> Self {
        Operand::Mem {
            base,
            offset: WORD * index as i32,
        }
    }

    pub fn is_memory(&self) -> bool {
        matches!(
            self,
            Operand::Slot(_) | Operand::Param | Operand::Env | Operand::Mem { .. }
        )
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Imm(n) => write!(f, "{n}"),
            Operand::Reg(r) => f.write_str(r.name()),
            Operand::Slot(n) => write!(f, "[rbp-{}]", (*n as i32 + 1) * WORD),
            Operand::Param => f.write_str("[rbp+16]"),
            Operand::Env => f.write_str("[rbp+24]"),
            Operand::Mem { base, offset: 0 } => write!(f, "[{}]", base.name()),
            Operand::Mem { base, offset } => write!(f, "[{}+{}]", base.name(), offset),
            Operand::Code(label) => write!(f, "{label}"),
        }
    }
}

// ── Operations ───────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl ArithOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            ArithOp::Add => "add",
            ArithOp::Sub => "sub",
            ArithOp::Mul => "mul",
            ArithOp::Div => "div",
            ArithOp::Rem => "rem",
        }
    }
}

/// Signed comparison outcomes a conditional jump can test.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Cond {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Cond {
    pub fn jump_mnemonic(self) -> &'static str {
        match self {
            Cond::Eq => "je",
            Cond::Ne => "jne",
            Cond::Lt => "jl",
            Cond::Le => "jle",
            Cond::Gt => "jg",
            Cond::Ge => "jge",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Op {
    /// A local jump target.
    Label(Label),
    Mov {
        dst: Operand,
        src: Operand,
    },
    /// `dst = dst <op> src`.
    Arith {
        op: ArithOp,
        dst: Reg,
        src: Operand,
    },
    Cmp {
        lhs: Operand,
        rhs: Operand,
    },
    Jmp(Label),
    JmpIf {
        cond: Cond,
        target: Label,
    },
    /// Open a stack frame with `bytes` of slot space.
    Enter {
        bytes: u32,
    },
    Leave,
    /// Heap-allocate `bytes`; the pointer lands in `rax`.
    Alloc {
        bytes: u32,
    },
    Push(Operand),
    /// Call through a code pointer; the result lands in `rax`.
    CallIndirect(Operand),
    /// Return, popping `pop_bytes` of arguments off the caller's stack.
    Ret {
        pop_bytes: u32,
    },
    /// Terminate the process with `status`.
    Exit(Operand),
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Label(label) => write!(f, "{label}:"),
            Op::Mov { dst, src } => write!(f, "mov {dst}, {src}"),
            Op::Arith { op, dst, src } => write!(f, "{} {}, {src}", op.mnemonic(), dst.name()),
            Op::Cmp { lhs, rhs } => write!(f, "cmp {lhs}, {rhs}"),
            Op::Jmp(label) => write!(f, "jmp {label}"),
            Op::JmpIf { cond, target } => write!(f, "{} {target}", cond.jump_mnemonic()),
            Op::Enter { bytes } => write!(f, "enter {bytes}"),
            Op::Leave => f.write_str("leave"),
            Op::Alloc { bytes } => write!(f, "alloc {bytes}"),
            Op::Push(src) => write!(f, "push {src}"),
            Op::CallIndirect(target) => write!(f, "call {target}"),
            Op::Ret { pop_bytes } => write!(f, "ret {pop_bytes}"),
            Op::Exit(status) => write!(f, "exit {status}"),
        }
    }
}

// ── Blocks and programs ──────────────────────────────────────────────

/// One function: a label, its frame and its instructions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub label: Label,
    /// The parameter name, for listings. `None` for the entry block.
    pub param: Option<String>,
    /// Slot space reserved by the prologue, a multiple of 16.
    pub frame_bytes: u32,
    pub ops: Vec<Op>,
}

impl Block {
    pub fn is_entry(&self) -> bool {
        self.label.kind == LabelKind::Entry
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.param {
            Some(param) => writeln!(f, "{}:  ; param {param}", self.label)?,
            None => writeln!(f, "{}:", self.label)?,
        }
        for op in &self.ops {
            match op {
                Op::Label(_) => writeln!(f, "  {op}")?,
                _ => writeln!(f, "    {op}")?,
            }
        }
        Ok(())
    }
}

/// A whole compiled program. `blocks[0]` is the entry block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LirProgram {
    pub blocks: Vec<Block>,
}

impl LirProgram {
    pub fn entry(&self) -> &Block {
        &self.blocks[0]
    }

    /// The function blocks, in the order their definitions were reached.
    pub fn functions(&self) -> &[Block] {
        &self.blocks[1..]
    }
}

impl fmt::Display for LirProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, block) in self.blocks.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{block}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function_label(id: u32, hint: &str) -> Label {
        Label {
            id,
            kind: LabelKind::Function(hint.to_string()),
        }
    }

    #[test]
    fn label_symbols() {
        assert_eq!(Label::entry().symbol(), "main");
        assert_eq!(function_label(3, "f").symbol(), "f_3");
        assert_eq!(function_label(4, "main").symbol(), "main_4");
        assert_eq!(function_label(5, "x'").symbol(), "x_prime_5");
        let local = Label {
            id: 9,
            kind: LabelKind::Local,
        };
        assert!(local.is_local());
        assert_eq!(local.symbol(), ".L9");
    }

    #[test]
    fn operand_display() {
        assert_eq!(Operand::Imm(-3).to_string(), "-3");
        assert_eq!(Operand::Slot(0).to_string(), "[rbp-8]");
        assert_eq!(Operand::Slot(2).to_string(), "[rbp-24]");
        assert_eq!(Operand::Param.to_string(), "[rbp+16]");
        assert_eq!(Operand::Env.to_string(), "[rbp+24]");
        assert_eq!(Operand::field(Reg::Rax, 0).to_string(), "[rax]");
        assert_eq!(Operand::field(Reg::Rcx, 2).to_string(), "[rcx+16]");
        assert!(Operand::Slot(1).is_memory());
        assert!(!Operand::rax().is_memory());
    }

    #[test]
    fn block_listing() {
        let block = Block {
            label: function_label(1, "f"),
            param: Some("x".to_string()),
            frame_bytes: 0,
            ops: vec![
                Op::Enter { bytes: 0 },
                Op::Mov {
                    dst: Operand::rax(),
                    src: Operand::Param,
                },
                Op::Arith {
                    op: ArithOp::Add,
                    dst: Reg::Rax,
                    src: Operand::Imm(1),
                },
                Op::Leave,
                Op::Ret {
                    pop_bytes: CALL_ARG_BYTES,
                },
            ],
        };
        assert_eq!(
            block.to_string(),
            "f_1:  ; param x\n    enter 0\n    mov rax, [rbp+16]\n    add rax, 1\n    leave\n    ret 16\n"
        );
    }
}
