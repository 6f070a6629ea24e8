//! Fern code generation.
//!
//! Lowers a type-checked program to the LIR ([`lir`]), renders the LIR as
//! NASM ([`nasm`]) and drives the system assembler and linker ([`link`]).

pub mod link;
pub mod lir;
pub mod nasm;

pub use lir::LirProgram;

use std::path::Path;

use fern_parser::Program;
use fern_typeck::TypeckResult;

/// Lower a type-checked program to LIR.
pub fn lower(program: &Program, typeck: &TypeckResult) -> LirProgram {
    lir::lower::lower_program(program, typeck)
}

/// Compile a type-checked program to NASM source.
pub fn compile_to_asm(program: &Program, typeck: &TypeckResult) -> String {
    nasm::render(&lower(program, typeck))
}

/// Compile a type-checked program to a native executable at `output_path`.
///
/// With `keep_asm`, the generated assembly is left next to the executable
/// with an `.asm` extension.
///
/// # Errors
///
/// Returns an error string if writing, assembling or linking fails.
pub fn compile_to_binary(
    program: &Program,
    typeck: &TypeckResult,
    output_path: &Path,
    keep_asm: bool,
) -> Result<(), String> {
    let asm = compile_to_asm(program, typeck);
    link::build_executable(&asm, output_path, keep_asm)
}
