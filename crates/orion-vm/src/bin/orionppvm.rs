//! `orionppvm` — reference interpreter CLI for Orion++ modules.
//!
//! Accepts either a binary `.opp` module (`OPPO` magic) or human-readable
//! Orion++ text (anything else), prepares it at the requested validation
//! level, and runs it to completion, printing the top-level return value.

use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::Parser;

use orion_ir::{FeatureSet, Module};
use orion_vm::{ValidationLevel, Vm, VmOptions};

#[derive(Debug, Parser)]
#[command(name = "orionppvm", version, about = "Run an Orion++ module")]
struct Opt {
    /// Orion++ module to run (binary `.opp` or human-readable text).
    input: PathBuf,

    /// Print each instruction as it executes.
    #[arg(short = 'd', long = "debug")]
    debug: bool,

    /// Reject `LEA` and unbalanced `SCOPE`/`SCOPL` at runtime.
    #[arg(short = 's', long = "strict")]
    strict: bool,

    /// Print progress to stderr.
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Validate and exit without running.
    #[arg(long = "validate-only")]
    validate_only: bool,

    /// How much static validation to run during prepare (0=skip, 1=structural, 2=type-check, 3=strict).
    #[arg(long = "validation-level", default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=3))]
    validation_level: u8,
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

    if opt.verbose {
        let _ = tracing_subscriber::fmt::try_init();
    }

    let bytes = std::fs::read(&opt.input).with_context(|| format!("reading {}", opt.input.display()))?;
    let module = load_module(&bytes).context("loading Orion++ module")?;

    let validation_level = match opt.validation_level {
        0 => ValidationLevel::Skip,
        1 => ValidationLevel::Structural,
        2 => ValidationLevel::TypeCheck,
        _ => ValidationLevel::Strict,
    };
    let options = VmOptions { strict: opt.strict, validation_level, ..VmOptions::default() };

    let mut vm = Vm::new(module, options);
    vm.prepare().context("preparing module")?;

    if opt.validate_only {
        println!("VALID");
        return Ok(0);
    }

    if opt.debug && opt.verbose {
        eprintln!("running...");
    }

    match vm.run() {
        Ok(value) => {
            if opt.debug {
                println!("return: {value}");
            }
            Ok(0)
        }
        Err(e) => {
            eprintln!("fault: {e}");
            Ok(1)
        }
    }
}

fn load_module(bytes: &[u8]) -> Result<Module> {
    if bytes.len() >= 4 {
        let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if magic == orion_ir::binary::MAGIC_OPPO {
            return Module::from_bytes(bytes).map_err(anyhow::Error::from);
        }
    }
    let text = std::str::from_utf8(bytes).context("module text is not valid UTF-8")?;
    let mut strings = orion_core::StringTable::new();
    let instructions = orion_ir::text::assemble(text, &mut strings)?;
    let mut module = Module::new();
    module.enable(FeatureSet::all());
    module.strings = strings;
    for instr in instructions {
        module.push(instr)?;
    }
    Ok(module)
}
