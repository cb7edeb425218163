//! `occ` — Orion++ front-end compiler CLI.
//!
//! Lexes, parses, and lowers a small C-like source file into an Orion++ IR
//! module, then writes it out as either human-readable text (`.hopp`) or
//! the binary container (`.opp`), chosen by the output file's extension.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use orion_core::SourceId;

#[derive(Debug, Parser)]
#[command(name = "occ", version, about = "Compile a source file to Orion++ IR")]
struct Opt {
    /// Source file to compile.
    input: PathBuf,

    /// Output file. Extension `.opp` emits binary; anything else (default
    /// `.hopp`) emits human-readable text.
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Print progress to stderr.
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Print the token stream to stderr before parsing.
    #[arg(long = "debug-tokens")]
    debug_tokens: bool,

    /// Print the parsed AST to stderr before lowering.
    #[arg(long = "debug-ast")]
    debug_ast: bool,
}

fn main() -> ExitCode {
    match real_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn real_main() -> Result<()> {
    let opt = Opt::parse();

    if opt.verbose {
        let _ = tracing_subscriber::fmt::try_init();
    }

    let source = std::fs::read_to_string(&opt.input).with_context(|| format!("reading {}", opt.input.display()))?;

    if opt.verbose {
        eprintln!("tokenizing {}", opt.input.display());
    }
    let tokens = orion_lexer::tokenize(SourceId(0), &source).context("lexing")?;
    if opt.debug_tokens {
        for tok in &tokens {
            eprintln!("{tok:?}");
        }
    }

    if opt.verbose {
        eprintln!("parsing");
    }
    let program = orion_parser::parse(SourceId(0), &source).context("parsing")?;
    if opt.debug_ast {
        eprintln!("{program:#?}");
    }

    if opt.verbose {
        eprintln!("lowering");
    }
    let module = orion_lower::lower_program(&program).context("lowering")?;

    let output_path = opt.output.clone().unwrap_or_else(|| default_output_path(&opt.input));
    let is_binary = output_path.extension().and_then(|e| e.to_str()) == Some("opp");

    if is_binary {
        std::fs::write(&output_path, module.to_bytes()).with_context(|| format!("writing {}", output_path.display()))?;
    } else {
        let text = orion_ir::text::disassemble(&module);
        std::fs::write(&output_path, text).with_context(|| format!("writing {}", output_path.display()))?;
    }

    if opt.verbose {
        eprintln!("wrote {}", output_path.display());
    }
    Ok(())
}

fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("hopp")
}
