//! `oriondump` — inspects Orion object files and Orion++ binaries.
//!
//! Detects the container by magic bytes, then prints whichever sections
//! were asked for (header/sections/symbols/functions/instructions/stats),
//! in human, JSON, or XML form. `-c` switches to header-only validation,
//! emitting one `VALID`/`INVALID` line per file.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};

use orion_dump::{detect_file_kind, dump_object, dump_orionpp_binary, render_human, render_xml, DumpOptions, FileKind, OutputFormat as RenderFormat};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormatArg {
    Human,
    Json,
    Xml,
}

#[derive(Debug, Parser)]
#[command(name = "oriondump", version, about = "Inspect Orion object files and Orion++ binaries")]
struct Opt {
    /// Files to inspect.
    files: Vec<PathBuf>,

    /// Print header fields.
    #[arg(short = 'H', long = "header")]
    header: bool,
    /// Print the section listing (object files).
    #[arg(short = 's', long = "sections")]
    sections: bool,
    /// Print the symbol table (object files).
    #[arg(short = 'S', long = "symbols")]
    symbols: bool,
    /// Print the function listing.
    #[arg(short = 'f', long = "functions")]
    functions: bool,
    /// Print instruction disassembly (Orion++ binaries).
    #[arg(short = 'i', long = "instructions")]
    instructions: bool,
    /// Print summary statistics.
    #[arg(short = 't', long = "stats")]
    stats: bool,
    /// Validate headers only; emit one VALID/INVALID line per file.
    #[arg(short = 'c', long = "validate")]
    validate: bool,
    /// Include a hex dump of each section's body.
    #[arg(short = 'x', long = "hex-dump")]
    hex_dump: bool,
    /// Output format.
    #[arg(short = 'o', long = "format", value_enum, default_value_t = OutputFormatArg::Human)]
    format: OutputFormatArg,
    /// Print every section (the default when no selector flag is given).
    #[arg(short = 'a', long = "all")]
    all: bool,
    /// Include extra detail fields.
    #[arg(short = 'V', long = "verbose")]
    verbose: bool,
}

fn main() -> ExitCode {
    match real_main() {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn real_main() -> Result<u8> {
    let opt = Opt::parse();
    if opt.files.is_empty() {
        bail!("no input files given");
    }

    let mut any_invalid = false;

    for path in &opt.files {
        let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let file_name = path.display().to_string();

        if opt.validate {
            let result = orion_dump::validate(&data, &file_name);
            if result.valid {
                println!("{}: VALID ({})", result.file_name, result.detail);
            } else {
                println!("{}: INVALID ({})", result.file_name, result.detail);
                any_invalid = true;
            }
            continue;
        }

        let selector_given = opt.header || opt.sections || opt.symbols || opt.functions || opt.instructions || opt.stats;
        let mut options = if opt.all || !selector_given { DumpOptions::all() } else { DumpOptions::none() };
        if selector_given && !opt.all {
            options.header = opt.header;
            options.sections = opt.sections;
            options.symbols = opt.symbols;
            options.functions = opt.functions;
            options.instructions = opt.instructions;
            options.stats = opt.stats;
        }
        options.hex_dump = opt.hex_dump;
        options.verbose = opt.verbose;

        let kind = detect_file_kind(&data, &file_name);
        let report = match kind {
            FileKind::Object => dump_object(&data, &file_name, &options)?,
            FileKind::OrionppBinary => dump_orionpp_binary(&data, &file_name, &options)?,
            FileKind::OrionppText | FileKind::Unknown => {
                bail!("{file_name}: not a recognized object or Orion++ binary container");
            }
        };

        match render_format(opt.format) {
            RenderFormat::Human => print!("{}", render_human(&report)),
            RenderFormat::Json => println!("{}", orion_dump::render_json(&report)?),
            RenderFormat::Xml => print!("{}", render_xml(&report)),
        }
    }

    Ok(u8::from(any_invalid))
}

fn render_format(arg: OutputFormatArg) -> RenderFormat {
    match arg {
        OutputFormatArg::Human => RenderFormat::Human,
        OutputFormatArg::Json => RenderFormat::Json,
        OutputFormatArg::Xml => RenderFormat::Xml,
    }
}
