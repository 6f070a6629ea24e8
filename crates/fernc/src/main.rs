//! The Fern compiler CLI.
//!
//! `fernc <file>` compiles one Fern source file to a native executable named
//! after the file.
//!
//! Options:
//! - `--output` - Output path for the compiled binary
//! - `--emit-asm` - Keep the generated NASM (.asm) alongside the binary
//! - `--emit-lir` - Print the LIR listing instead of building
//! - `--check` - Stop after type checking and print the top-level bindings
//! - `--json` - Output diagnostics as JSON (one object per line)
//!
//! Set `RUST_LOG=debug` to trace type checking and code generation.

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Once;

use clap::Parser;
use fern_common::span::{LineIndex, Span};
use fern_parser::ParseError;
use fern_typeck::TypeError;

#[derive(Parser)]
#[command(name = "fernc", version, about = "The Fern compiler")]
struct Cli {
    /// Path to the source file
    file: PathBuf,

    /// Output path for the compiled binary
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Keep the generated NASM (.asm file) alongside the binary
    #[arg(long = "emit-asm")]
    emit_asm: bool,

    /// Print the LIR listing to stdout instead of building
    #[arg(long = "emit-lir")]
    emit_lir: bool,

    /// Stop after type checking and print the inferred top-level bindings
    #[arg(long)]
    check: bool,

    /// Output diagnostics as JSON (one object per line) instead of human-readable format
    #[arg(long)]
    json: bool,
}

static TRACING_INIT: Once = Once::new();

/// Install a stderr subscriber when `RUST_LOG` is set.
fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
                .with(EnvFilter::from_default_env())
                .init();
        }
    });
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = compile(&cli) {
        if cli.json {
            // In JSON mode, emit the final error as JSON too.
            let msg = serde_json::json!({
                "code": "C0001",
                "severity": "error",
                "message": e,
                "file": "",
                "spans": [],
            });
            eprintln!("{}", msg);
        } else {
            eprintln!("error: {}", e);
        }
        process::exit(1);
    }
}

/// Execute the pipeline: parse -> typecheck -> lower -> render -> assemble -> link.
fn compile(cli: &Cli) -> Result<(), String> {
    let path = cli.file.as_path();
    let source = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;

    let program = match fern_parser::parse(&source) {
        Ok(program) => program,
        Err(err) => {
            report_parse_error(&source, path, &err, cli.json);
            return Err("Compilation failed due to errors above.".to_string());
        }
    };

    let typeck = match fern_typeck::check(&program) {
        Ok(typeck) => typeck,
        Err(err) => {
            report_type_error(path, &err, cli.json);
            return Err("Compilation failed due to errors above.".to_string());
        }
    };

    if cli.check {
        for (name, scheme) in &typeck.bindings {
            println!("val {name} : {scheme}");
        }
        if let Some(ty) = &typeck.result_type {
            println!("- : {ty}");
        }
        return Ok(());
    }

    if cli.emit_lir {
        print!("{}", fern_codegen::lower(&program, &typeck));
        return Ok(());
    }

    let output_path = match &cli.output {
        Some(p) => p.clone(),
        None => path.with_extension(""),
    };
    if output_path == path {
        return Err(format!(
            "Output path '{}' would overwrite the source file",
            path.display()
        ));
    }

    fern_codegen::compile_to_binary(&program, &typeck, &output_path, cli.emit_asm)?;

    if cli.emit_asm {
        eprintln!("  Assembly: {}", output_path.with_extension("asm").display());
    }
    eprintln!("  Compiled: {}", output_path.display());
    Ok(())
}

fn report_parse_error(source: &str, path: &Path, error: &ParseError, json: bool) {
    let file_name = path.display().to_string();
    if json {
        let mut spans = vec![span_json(error.span, &error.message)];
        if let Some((message, span)) = &error.related {
            spans.push(span_json(*span, message));
        }
        let diag = serde_json::json!({
            "code": "P0001",
            "severity": "error",
            "message": format!("Parse error: {}", error.message),
            "file": file_name,
            "spans": spans,
        });
        eprintln!("{}", diag);
        return;
    }

    let index = LineIndex::new(source);
    let (line, col) = index.line_col(error.span.start);
    eprintln!("{file_name}:{line}:{col}: parse error: {}", error.message);
    if let Some((message, span)) = &error.related {
        let (line, col) = index.line_col(span.start);
        eprintln!("{file_name}:{line}:{col}: note: {message}");
    }
}

/// `{"start": .., "end": .., "label": ..}`
fn span_json(span: Span, label: &str) -> serde_json::Value {
    let mut value = serde_json::json!(span);
    value["label"] = serde_json::Value::from(label);
    value
}

fn report_type_error(path: &Path, error: &TypeError, json: bool) {
    let file_name = path.display().to_string();
    if json {
        let diag = serde_json::json!({
            "code": error.code(),
            "severity": "error",
            "kind": error.kind().name(),
            "message": error.to_string(),
            "file": file_name,
            "spans": [],
        });
        eprintln!("{}", diag);
    } else {
        eprintln!("{file_name}: error[{}]: {error}", error.code());
    }
}
