//! NASM rendering of LIR for x86-64 Linux.
//!
//! Each LIR operation maps to one or a few instructions. Heap allocation
//! calls the C library's `malloc` with the stack realigned to 16 bytes, and
//! process exit is the raw `exit` system call.

use std::fmt::Write;

use crate::lir::{ArithOp, Block, LirProgram, Op, Operand};

const SYS_EXIT: i64 = 60;

/// The largest frame `enter` can set up; its size operand is 16 bits.
const MAX_ENTER_BYTES: u32 = u16::MAX as u32;

/// Render `program` as a complete NASM source file.
pub fn render(program: &LirProgram) -> String {
    let mut out = String::new();
    out.push_str("; generated by fernc\n");
    out.push_str("default rel\n");
    out.push_str("extern malloc\n");
    out.push_str("global main\n");
    out.push('\n');
    out.push_str("section .text\n");
    for block in &program.blocks {
        out.push('\n');
        render_block(&mut out, block);
    }
    out.push('\n');
    out.push_str("section .note.GNU-stack noalloc noexec nowrite progbits\n");
    out
}

fn render_block(out: &mut String, block: &Block) {
    match &block.param {
        Some(param) => line(out, format_args!("{}:  ; fun {param}", block.label)),
        None => line(out, format_args!("{}:", block.label)),
    }
    for op in &block.ops {
        render_op(out, op);
    }
}

fn line(out: &mut String, args: std::fmt::Arguments<'_>) {
    // Writing to a String cannot fail.
    let _ = out.write_fmt(args);
    out.push('\n');
}

fn ins(out: &mut String, text: impl AsRef<str>) {
    out.push_str("    ");
    out.push_str(text.as_ref());
    out.push('\n');
}

/// An operand in NASM syntax. Memory operands are always qualified as
/// 64-bit words.
fn operand(op: &Operand) -> String {
    if op.is_memory() {
        format!("qword {op}")
    } else {
        op.to_string()
    }
}

fn render_op(out: &mut String, op: &Op) {
    match op {
        Op::Label(label) => line(out, format_args!("{label}:")),
        Op::Mov {
            dst,
            src: Operand::Code(label),
        } => ins(out, format!("lea {}, [rel {label}]", operand(dst))),
        Op::Mov { dst, src } => ins(out, format!("mov {}, {}", operand(dst), operand(src))),
        Op::Arith { op, dst, src } => {
            let dst = dst.name();
            let src = operand(src);
            match op {
                ArithOp::Add => ins(out, format!("add {dst}, {src}")),
                ArithOp::Sub => ins(out, format!("sub {dst}, {src}")),
                ArithOp::Mul => ins(out, format!("imul {dst}, {src}")),
                ArithOp::Div | ArithOp::Rem => {
                    debug_assert_eq!(dst, "rax", "division works on rax");
                    ins(out, "cqo");
                    ins(out, format!("idiv {src}"));
                    if *op == ArithOp::Rem {
                        ins(out, "mov rax, rdx");
                    }
                }
            }
        }
        Op::Cmp { lhs, rhs } => ins(out, format!("cmp {}, {}", operand(lhs), operand(rhs))),
        Op::Jmp(label) => ins(out, format!("jmp {label}")),
        Op::JmpIf { cond, target } => ins(out, format!("{} {target}", cond.jump_mnemonic())),
        Op::Enter { bytes } if *bytes <= MAX_ENTER_BYTES => {
            ins(out, format!("enter {bytes}, 0"));
        }
        Op::Enter { bytes } => {
            ins(out, "push rbp");
            ins(out, "mov rbp, rsp");
            ins(out, format!("sub rsp, {bytes}"));
        }
        Op::Leave => ins(out, "leave"),
        Op::Alloc { bytes } => {
            // r12 is callee-saved, so it survives the call.
            ins(out, "mov r12, rsp");
            ins(out, "and rsp, -16");
            ins(out, format!("mov rdi, {bytes}"));
            ins(out, "call malloc");
            ins(out, "mov rsp, r12");
        }
        Op::Push(src) => ins(out, format!("push {}", operand(src))),
        Op::CallIndirect(target) => ins(out, format!("call {}", operand(target))),
        Op::Ret { pop_bytes } => ins(out, format!("ret {pop_bytes}")),
        Op::Exit(status) => {
            ins(out, format!("mov rdi, {}", operand(status)));
            ins(out, format!("mov rax, {SYS_EXIT}"));
            ins(out, "syscall");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lir::{Cond, Label, LabelKind, Reg};

    fn rendered(op: Op) -> String {
        let mut out = String::new();
        render_op(&mut out, &op);
        out
    }

    #[test]
    fn memory_operands_are_word_sized() {
        assert_eq!(
            rendered(Op::Mov {
                dst: Operand::Slot(1),
                src: Operand::rax(),
            }),
            "    mov qword [rbp-16], rax\n"
        );
        assert_eq!(
            rendered(Op::Push(Operand::Slot(0))),
            "    push qword [rbp-8]\n"
        );
        assert_eq!(
            rendered(Op::CallIndirect(Operand::field(Reg::Rax, 0))),
            "    call qword [rax]\n"
        );
    }

    #[test]
    fn code_addresses_are_rip_relative() {
        let label = Label {
            id: 1,
            kind: LabelKind::Function("f".into()),
        };
        assert_eq!(
            rendered(Op::Mov {
                dst: Operand::rcx(),
                src: Operand::Code(label),
            }),
            "    lea rcx, [rel f_1]\n"
        );
    }

    #[test]
    fn division_and_remainder() {
        let div = Op::Arith {
            op: ArithOp::Div,
            dst: Reg::Rax,
            src: Operand::rcx(),
        };
        assert_eq!(rendered(div), "    cqo\n    idiv rcx\n");
        let rem = Op::Arith {
            op: ArithOp::Rem,
            dst: Reg::Rax,
            src: Operand::rcx(),
        };
        assert_eq!(rendered(rem), "    cqo\n    idiv rcx\n    mov rax, rdx\n");
    }

    #[test]
    fn control_flow() {
        let target = Label {
            id: 4,
            kind: LabelKind::Local,
        };
        assert_eq!(rendered(Op::Label(target.clone())), ".L4:\n");
        assert_eq!(
            rendered(Op::JmpIf {
                cond: Cond::Le,
                target,
            }),
            "    jle .L4\n"
        );
        assert_eq!(rendered(Op::Enter { bytes: 32 }), "    enter 32, 0\n");
        assert_eq!(rendered(Op::Ret { pop_bytes: 16 }), "    ret 16\n");
    }

    #[test]
    fn large_frames_are_set_up_by_hand() {
        assert_eq!(
            rendered(Op::Enter { bytes: 65520 }),
            "    enter 65520, 0\n"
        );
        assert_eq!(
            rendered(Op::Enter { bytes: 65536 }),
            "    push rbp\n    mov rbp, rsp\n    sub rsp, 65536\n"
        );
    }

    #[test]
    fn exit_is_a_system_call() {
        assert_eq!(
            rendered(Op::Exit(Operand::Imm(0))),
            "    mov rdi, 0\n    mov rax, 60\n    syscall\n"
        );
    }

    #[test]
    fn file_layout() {
        let program = LirProgram {
            blocks: vec![Block {
                label: Label::entry(),
                param: None,
                frame_bytes: 0,
                ops: vec![Op::Enter { bytes: 0 }, Op::Exit(Operand::Imm(0))],
            }],
        };
        let asm = render(&program);
        assert!(asm.contains("extern malloc\nglobal main\n"));
        assert!(asm.contains("section .text\n\nmain:\n    enter 0, 0\n"));
        assert!(asm.ends_with("section .note.GNU-stack noalloc noexec nowrite progbits\n"));
    }
}
