//! Lox interpreter command-line.
//!
//! When called without argument it drops into an interactive read-evaluate-print loop.
//!
//! When called with arguments, it interprets the corresponding files in a single interpreter
//! session (so code and data sharing is possible).

use std::fs;
use std::io;
use std::io::prelude::*;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use plox::Interpreter;

/// Exit status of a script that failed to scan, parse, resolve or run.
const EXIT_DATA_ERR: u8 = 65;
/// Exit status when a script cannot be read.
const EXIT_IO_ERR: u8 = 74;

#[derive(Parser, Debug)]
#[command(name = "plox")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Lox tree-walk interpreter", long_about = None)]
struct Args {
    /// Scripts run in order in one session.  Without any, start a REPL.
    #[arg(value_name = "SCRIPT")]
    scripts: Vec<PathBuf>,

    /// Log level used when RUST_LOG is not set.
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn")]
    log_level: LevelFilter,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.log_level);

    let result = if args.scripts.is_empty() {
        run_prompt().map(|()| ExitCode::SUCCESS)
    } else {
        run_all_files(&args.scripts)
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(EXIT_IO_ERR)
        }
    }
}

// Logs go to stderr so they never mix with program output.
fn init_tracing(default_level: LevelFilter) {
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(true))
        .with(filter)
        .init();
}

fn run_all_files(paths: &[PathBuf]) -> Result<ExitCode, anyhow::Error> {
    let mut interp_stdout = io::stdout();
    let mut interp = Interpreter::new(&mut interp_stdout);

    for p in paths {
        let source = fs::read_to_string(p)
            .with_context(|| format!("failed to read {}", p.display()))?;
        tracing::debug!(path = %p.display(), "running script");
        if let Err(e) = interp.eval(&source) {
            eprintln!("{}: {}", p.display(), e);
            return Ok(ExitCode::from(EXIT_DATA_ERR));
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn run_prompt() -> Result<(), anyhow::Error> {
    let stdin = io::stdin();
    let mut repl_stdout = io::stdout();
    let mut interp_stdout = io::stdout();

    let mut interp = Interpreter::new(&mut interp_stdout);

    let mut input = String::new();
    loop {
        repl_stdout.write_all(b"> ")?;
        repl_stdout.flush()?;

        input.clear();
        let nbytes = stdin
            .read_line(&mut input)
            .context("failed to read from stdin")?;
        if nbytes == 0 {
            break;
        }

        if let Err(e) = interp.eval(&input) {
            eprintln!("{}", e);
        }
    }

    Ok(())
}
