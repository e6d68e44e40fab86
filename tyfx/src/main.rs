//! tyfx CLI

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use tyfx::driver::{self, RunOptions};
use tyfx::error::report_error;
use tyfx::LoadError;

#[derive(Parser)]
#[command(name = "tyfx", version, about = "tyfx - effect interpreter for type-level programs")]
struct Cli {
    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a program
    Run {
        /// Program file
        file: PathBuf,
        /// Arguments passed to the program
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
        /// Exported alias to evaluate
        #[arg(long)]
        entry: Option<String>,
        /// Fault on effects without a handler
        #[arg(long)]
        strict: bool,
        /// Evaluation nesting limit
        #[arg(long)]
        max_depth: Option<usize>,
        /// Print every result entry after the run
        #[arg(long)]
        dump_results: bool,
    },
    /// Load a program and print its entry descriptor
    Check {
        /// Program file
        file: PathBuf,
        /// Exported alias to describe
        #[arg(long, default_value = "main")]
        entry: String,
    },
    /// Tokenize and dump tokens (debug)
    Tokens {
        /// Program file
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = match cli.command {
        Command::Run {
            file,
            args,
            entry,
            strict,
            max_depth,
            dump_results,
        } => {
            let options = RunOptions {
                entry,
                strict,
                max_depth,
                dump_results,
                args,
            };
            run_file(&file, options)
        }
        Command::Check { file, entry } => match driver::describe_entry(&file, &entry) {
            Ok(descriptor) => {
                println!("{descriptor}");
                0
            }
            Err(e) => report(&file, &e),
        },
        Command::Tokens { file } => match tokenize_file(&file) {
            Ok(()) => 0,
            Err(e) => report(&file, &e),
        },
    };

    std::process::exit(code);
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        Some(EnvFilter::new("tyfx=debug"))
    } else {
        EnvFilter::try_from_default_env().ok()
    };
    if let Some(filter) = filter {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn run_file(path: &Path, options: RunOptions) -> i32 {
    match driver::run_file_blocking(path, options) {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => report(path, &e),
    }
}

fn tokenize_file(path: &Path) -> tyfx::Result<()> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| LoadError::io_error(format!("{}: {e}", path.display())))?;

    let tokens = tyfx::lexer::tokenize(&source)?;
    for (tok, span) in &tokens {
        let (line, col) = span.line_col(&source);
        println!("{tok:?} @ {line}:{col}");
    }

    Ok(())
}

/// Report a load error and return the failure status
fn report(path: &Path, error: &LoadError) -> i32 {
    let source = std::fs::read_to_string(path).unwrap_or_default();
    report_error(&path.display().to_string(), &source, error);
    1
}
