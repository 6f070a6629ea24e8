//! Assembling and linking via the system `nasm` and `cc`.
//!
//! `cc` is only used as the linker driver, so the C runtime's startup code
//! calls `main` and `malloc` resolves against libc. Set `FERN_NASM` or
//! `FERN_CC` to use a different assembler or linker.

use std::path::Path;
use std::process::Command;

use tracing::debug;

fn tool(var: &str, default: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| default.to_string())
}

/// Assemble a NASM source file into an ELF64 object file.
///
/// # Errors
///
/// Returns an error string if the assembler cannot be run or rejects the
/// input.
pub fn assemble(asm_path: &Path, object_path: &Path) -> Result<(), String> {
    let nasm = tool("FERN_NASM", "nasm");
    debug!(%nasm, asm = %asm_path.display(), "assembling");
    let output = Command::new(&nasm)
        .arg("-f")
        .arg("elf64")
        .arg("-o")
        .arg(object_path)
        .arg(asm_path)
        .output()
        .map_err(|e| format!("Failed to invoke assembler ({}): {}", nasm, e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("Assembly failed:\n{}", stderr));
    }
    Ok(())
}

/// Link an object file into a native executable.
///
/// # Errors
///
/// Returns an error string if the linker cannot be run or linking fails.
pub fn link(object_path: &Path, output_path: &Path) -> Result<(), String> {
    let cc = tool("FERN_CC", "cc");
    debug!(%cc, output = %output_path.display(), "linking");
    let output = Command::new(&cc)
        .arg("-no-pie")
        .arg(object_path)
        .arg("-o")
        .arg(output_path)
        .output()
        .map_err(|e| format!("Failed to invoke linker ({}): {}", cc, e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("Linking failed:\n{}", stderr));
    }
    Ok(())
}

/// Write `asm` next to `output_path`, assemble it and link the result.
///
/// The assembly is written to `output_path` with an `.asm` extension and
/// removed afterwards unless `keep_asm` is set. The object file is always
/// removed.
///
/// # Errors
///
/// Returns an error string if any step fails.
pub fn build_executable(asm: &str, output_path: &Path, keep_asm: bool) -> Result<(), String> {
    let asm_path = output_path.with_extension("asm");
    let object_path = output_path.with_extension("o");

    std::fs::write(&asm_path, asm)
        .map_err(|e| format!("Failed to write '{}': {}", asm_path.display(), e))?;

    let result = assemble(&asm_path, &object_path).and_then(|()| link(&object_path, output_path));

    std::fs::remove_file(&object_path).ok();
    if !keep_asm {
        std::fs::remove_file(&asm_path).ok();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwritable_output_directory_is_reported() {
        let output = Path::new("/nonexistent-fern-dir/program");
        let err = build_executable("", output, false).unwrap_err();
        assert!(
            err.starts_with("Failed to write '/nonexistent-fern-dir/program.asm'"),
            "{err}"
        );
    }

    #[test]
    fn tool_defaults_without_override() {
        assert_eq!(tool("FERN_TEST_UNSET_TOOL_VARIABLE", "nasm"), "nasm");
    }
}
