//! Compiler driver, grounded in `meshc`'s binary structure: a `clap`-derived
//! `Cli`, `tracing`-based stage logging, and a straight-line
//! preprocess/lex/parse/typecheck/codegen pipeline. Preprocess/lex/parse
//! errors are always fatal; type-check diagnostics are printed as they come
//! and only abort the run if at least one is fatal (same-scope
//! redefinition) -- recoverable ones still let codegen run to completion.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser as ClapParser;
use inkwell::context::Context;

use glint_codegen::CodeGen;
use glint_common::{CharStream, Severity};
use glint_lexer::{Lexer, Preprocessor};
use glint_parser::pretty::Dump;
use glint_parser::Parser as GlintParser;
use glint_typeck::TypeAnalyzer;

/// Compile a single glint source file to LLVM IR.
#[derive(ClapParser)]
#[command(name = "glintc", about = "Compiler for the glint contract language")]
struct Cli {
    /// Root source file to compile.
    path: PathBuf,

    /// Print the token stream before parsing.
    #[arg(long)]
    dump_tokens: bool,

    /// Print the parsed AST before type-checking.
    #[arg(long)]
    dump_ast: bool,

    /// Where to write the emitted `.ll` file (defaults to the source path
    /// with its extension replaced).
    #[arg(short = 'o', long = "emit")]
    emit: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(rendered) => {
            eprint!("{rendered}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    tracing::info!(path = %cli.path.display(), "preprocessing");
    let stream = preprocess(&cli.path)?;

    tracing::info!("lexing");
    let tokens = Lexer::tokenize(&stream).map_err(|e| e.to_string())?;
    if cli.dump_tokens {
        for token in &tokens {
            println!("{token:?}");
        }
    }

    tracing::info!("parsing");
    let mut unit = GlintParser::parse_source_unit(&tokens).map_err(|e| e.to_string())?;
    if cli.dump_ast {
        println!("{}", Dump(&unit));
    }

    tracing::info!("type-checking");
    let diagnostics = TypeAnalyzer::analyze(&mut unit);
    let (fatal, warnings): (Vec<_>, Vec<_>) =
        diagnostics.into_iter().partition(|d| d.diagnostic.severity == Severity::Error);
    for warning in &warnings {
        eprint!("{warning}");
    }
    if !fatal.is_empty() {
        let mut rendered = String::new();
        for diagnostic in &fatal {
            rendered.push_str(&diagnostic.to_string());
        }
        return Err(rendered);
    }

    tracing::info!("emitting IR");
    let context = Context::create();
    let mut codegen = CodeGen::new(&context, &module_name(&cli.path));
    codegen.compile(&unit).map_err(|e| e.to_string())?;

    let ll_path = cli.emit.clone().unwrap_or_else(|| cli.path.with_extension("ll"));
    codegen.emit_to_file(&ll_path).map_err(|e| e.to_string())?;
    tracing::info!(path = %ll_path.display(), "wrote IR");
    Ok(())
}

fn preprocess(path: &Path) -> Result<CharStream, String> {
    Preprocessor::new().preprocess(path).map_err(|e| e.to_string())
}

fn module_name(path: &Path) -> String {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or("glint").to_string()
}
