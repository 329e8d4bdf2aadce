// ABOUTME: Command-line entry point — `ell run` and `ell check`

mod ast;
mod binder;
mod config;
mod diagnostics;
mod driver;
mod error;
mod imports;
mod interpreter;
mod lexer;
mod loader;
mod parser;
mod scope;
mod token;
mod types;

use clap::{Parser, Subcommand};
use config::{DIAGNOSTIC_EXIT_CODE, VERSION};
use diagnostics::Diagnostic;
use loader::Loader;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "ell")]
#[command(version = VERSION)]
#[command(about = "Front-end and tree-walking interpreter for the L language")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile and run a program, exiting with `main`'s return value.
    Run {
        /// Entry source file, e.g. `prog/Main.ell`.
        file: PathBuf,
        /// Arguments passed through to the program's `main`.
        #[arg(last = true)]
        program_args: Vec<String>,
    },
    /// Compile only and report diagnostics, without running `main`.
    Check {
        file: PathBuf,
        /// Emit diagnostics as a JSON array instead of plain text.
        #[arg(long)]
        json: bool,
    },
}

/// The loader resolves dotted module paths under a root directory; a
/// directly-named entry file is just a one-segment path rooted at its own
/// parent.
fn entry_segments(file: &Path) -> Vec<String> {
    vec![file.file_stem().and_then(|s| s.to_str()).unwrap_or(config::ENTRY_FILE_STEM).to_string()]
}

fn open_loader(file: &Path) -> Result<Loader, ExitCode> {
    let root = file.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    Loader::new(&root).map_err(|e| {
        eprintln!("error: {}", e);
        ExitCode::from(DIAGNOSTIC_EXIT_CODE as u8)
    })
}

/// Serializable mirror of a `Diagnostic`, for `ell check --json`.
#[derive(Serialize)]
struct DiagnosticJson {
    category: String,
    message: String,
    span: Option<String>,
    hint: Option<String>,
}

impl From<&Diagnostic> for DiagnosticJson {
    fn from(d: &Diagnostic) -> Self {
        DiagnosticJson {
            category: format!("{:?}", d.category),
            message: d.message.clone(),
            span: d.span.as_ref().map(|s| s.to_string()),
            hint: d.hint.clone(),
        }
    }
}

fn report(diags: &[Diagnostic], json: bool) {
    if json {
        let items: Vec<DiagnosticJson> = diags.iter().map(DiagnosticJson::from).collect();
        match serde_json::to_string(&items) {
            Ok(s) => eprintln!("{}", s),
            Err(e) => eprintln!("error: failed to serialize diagnostics: {}", e),
        }
    } else {
        for d in diags {
            eprintln!("{}", d);
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Run { file, program_args } => {
            let loader = match open_loader(&file) {
                Ok(l) => l,
                Err(code) => return code,
            };
            match driver::compile_and_run(&loader, &entry_segments(&file), &program_args) {
                Ok(code) => ExitCode::from((code & 0xff) as u8),
                Err(diags) => {
                    report(&diags, false);
                    ExitCode::from(DIAGNOSTIC_EXIT_CODE as u8)
                }
            }
        }
        Command::Check { file, json } => {
            let loader = match open_loader(&file) {
                Ok(l) => l,
                Err(code) => return code,
            };
            match driver::compile_and_check(&loader, &entry_segments(&file)) {
                Ok(()) => ExitCode::SUCCESS,
                Err(diags) => {
                    report(&diags, json);
                    ExitCode::from(DIAGNOSTIC_EXIT_CODE as u8)
                }
            }
        }
    }
}
