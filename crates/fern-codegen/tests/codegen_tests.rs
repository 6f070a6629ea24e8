//! Lowering and rendering whole programs.

use fern_codegen::lir::Op;
use fern_codegen::{compile_to_asm, lower, LirProgram};

fn lower_source(src: &str) -> LirProgram {
    let program = fern_parser::parse(src).expect("test source should parse");
    let typeck = fern_typeck::check(&program).expect("test source should type-check");
    lower(&program, &typeck)
}

fn asm_for(src: &str) -> String {
    let program = fern_parser::parse(src).expect("test source should parse");
    let typeck = fern_typeck::check(&program).expect("test source should type-check");
    compile_to_asm(&program, &typeck)
}

#[test]
fn test_increment_then_exit_listing() {
    let lir = lower_source("let f x = x + 1;; exit (f 100);;");
    insta::assert_snapshot!(lir.to_string(), @r"
    main:
        enter 16
        alloc 8
        mov r8, rax
        mov rcx, f_1
        mov [r8], rcx
        mov rax, r8
        mov [rbp-8], rax
        mov rax, [rbp-8]
        mov [rbp-16], rax
        mov rax, 100
        push [rbp-16]
        push rax
        mov rax, [rbp-16]
        call [rax]
        exit rax

    f_1:  ; param x
        enter 16
        mov rax, [rbp+16]
        mov [rbp-8], rax
        mov rax, 1
        mov rcx, rax
        mov rax, [rbp-8]
        add rax, rcx
        leave
        ret 16
    ");
}

#[test]
fn test_if_listing() {
    let lir = lower_source("if zero 0 then 1 else 2;;");
    insta::assert_snapshot!(lir.to_string(), @r"
    main:
        enter 0
        mov rax, 0
        cmp rax, 0
        mov rax, 1
        je .L4
        mov rax, 0
      .L4:
        cmp rax, 0
        je .L2
      .L1:
        mov rax, 1
        jmp .L3
      .L2:
        mov rax, 2
      .L3:
        exit rax
    ");
}

#[test]
fn test_blocks_follow_definition_order() {
    let lir = lower_source("let a x = x;; let b y = y;; let c z = z;; a (b (c 1));;");
    let symbols: Vec<String> = lir.blocks.iter().map(|b| b.label.symbol()).collect();
    assert_eq!(symbols, vec!["main", "a_1", "b_2", "c_3"]);
}

#[test]
fn test_every_function_returns_its_arguments() {
    let lir = lower_source("let compose f g x = f (g x);; compose succ pred 5;;");
    for block in lir.functions() {
        assert_eq!(block.ops.first(), Some(&Op::Enter { bytes: block.frame_bytes }));
        assert_eq!(block.ops.last(), Some(&Op::Ret { pop_bytes: 16 }));
        assert_eq!(block.frame_bytes % 16, 0);
    }
}

#[test]
fn test_asm_is_complete() {
    let asm = asm_for("let f x = x + 1;; exit (f 100);;");
    assert!(asm.contains("extern malloc"));
    assert!(asm.contains("global main"));
    assert!(asm.contains("\nmain:\n"));
    assert!(asm.contains("\nf_1:  ; fun x\n"));
    assert!(asm.contains("    lea rcx, [rel f_1]\n"));
    assert!(asm.contains("    call malloc\n"));
    assert!(asm.contains("    call qword [rax]\n"));
    assert!(asm.contains("    ret 16\n"));
    assert!(asm.contains("    mov rax, 60\n    syscall\n"));
}

#[test]
fn test_tuples_are_heap_records() {
    let asm = asm_for("fst (snd (1, (2, 3)));;");
    assert_eq!(asm.matches("call malloc").count(), 2);
    assert!(asm.contains("mov rax, qword [rax+8]"));
    assert!(asm.contains("mov rax, qword [rax]"));
}
