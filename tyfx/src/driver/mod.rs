//! Program loading and run orchestration

use crate::config::{Config, UnhandledPolicy};
use crate::error::{LoadError, Result};
use crate::interp::{EvalContext, Evaluator, Fault};
use crate::oracle::{Oracle, TypeOracle};
use std::path::{Path, PathBuf};

/// Native stack reserved per level of evaluation nesting
const STACK_PER_LEVEL: usize = 64 * 1024;
/// Floor for the evaluator thread's stack
const MIN_EVAL_STACK: usize = 8 * 1024 * 1024;

/// Command-line overrides, applied after file and environment configuration
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub entry: Option<String>,
    pub strict: bool,
    pub max_depth: Option<usize>,
    pub dump_results: bool,
    /// Arguments handed to the program
    pub args: Vec<String>,
}

/// How a run ended
#[derive(Debug)]
pub enum Outcome {
    Completed,
    Exited(i32),
    Faulted(Fault),
}

impl Outcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Completed => 0,
            Outcome::Exited(code) => *code,
            Outcome::Faulted(_) => 1,
        }
    }
}

/// Defaults, `tyfx.toml` beside the program, environment, then `options`
pub fn resolve_config(program: &Path, options: &RunOptions) -> Result<Config> {
    let dir = program.parent().unwrap_or_else(|| Path::new("."));
    let mut config = Config::discover(dir)?.apply_env()?;
    if let Some(entry) = &options.entry {
        config.entry = entry.clone();
    }
    if options.strict {
        config.unhandled = UnhandledPolicy::Strict;
    }
    if let Some(depth) = options.max_depth {
        config.max_depth = depth;
    }
    config.dump_results |= options.dump_results;
    if config.max_depth == 0 {
        return Err(LoadError::config("max-depth must be at least 1"));
    }
    Ok(config)
}

/// Load a program and run it against the standard streams
pub async fn run_file(path: &Path, options: RunOptions) -> Result<Outcome> {
    let config = resolve_config(path, &options)?;
    load_and_execute(path, config, options.args).await
}

/// Stack size for an evaluator allowed `max_depth` levels of nesting
pub fn evaluator_stack_size(max_depth: usize) -> usize {
    max_depth.saturating_mul(STACK_PER_LEVEL).max(MIN_EVAL_STACK)
}

/// Run a program on a current-thread runtime hosted by a dedicated thread
/// whose stack fits the configured `max-depth`.
pub fn run_file_blocking(path: &Path, options: RunOptions) -> Result<Outcome> {
    let config = resolve_config(path, &options)?;
    let stack_size = evaluator_stack_size(config.max_depth);
    tracing::debug!(stack_size, max_depth = config.max_depth, "starting evaluator thread");
    let path: PathBuf = path.to_path_buf();
    let handle = std::thread::Builder::new()
        .name("tyfx-eval".to_string())
        .stack_size(stack_size)
        .spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| LoadError::io_error(format!("failed to start runtime: {e}")))?;
            runtime.block_on(load_and_execute(&path, config, options.args))
        })
        .map_err(|e| LoadError::io_error(format!("failed to start evaluator thread: {e}")))?;
    handle
        .join()
        .map_err(|_| LoadError::io_error("evaluator thread panicked"))?
}

async fn load_and_execute(path: &Path, config: Config, args: Vec<String>) -> Result<Outcome> {
    let oracle = TypeOracle::load(path, &config.entry)?;
    tracing::info!(program = %path.display(), entry = %config.entry, "running program");
    let ctx = EvalContext::new(oracle, config).with_args(args);
    Ok(execute(ctx).await)
}

/// Evaluate the entry construct, report the outcome on the diagnostic sink
/// and close the context.
pub async fn execute<O: Oracle>(ctx: EvalContext<O>) -> Outcome {
    let mut evaluator = Evaluator::new(ctx);
    let result = evaluator.run().await;
    let mut ctx = evaluator.into_context();

    let outcome = match result {
        Ok(_) => Outcome::Completed,
        Err(fault) => match fault.exit_code() {
            Some(code) => Outcome::Exited(code),
            None => Outcome::Faulted(fault),
        },
    };

    if let Outcome::Faulted(fault) = &outcome {
        tracing::debug!(kind = ?fault.kind, "uncaught fault");
        report(&mut ctx, &format!("Uncaught fault: {}", fault.message));
    }
    if ctx.config.dump_results {
        dump_results(&mut ctx);
    }
    if let Err(e) = ctx.close() {
        tracing::warn!(error = %e, "failed to flush output");
    }
    tracing::debug!(code = outcome.exit_code(), results = ctx.results.len(), "run finished");
    outcome
}

fn dump_results<O: Oracle>(ctx: &mut EvalContext<O>) {
    let lines: Vec<String> = ctx
        .results
        .iter()
        .map(|entry| format!("{}: {}", entry.key, ctx.oracle.stringify(&entry.output)))
        .collect();
    for line in lines {
        report(ctx, &line);
    }
}

fn report<O: Oracle>(ctx: &mut EvalContext<O>, line: &str) {
    if let Err(e) = ctx.console.diag_line(line) {
        tracing::warn!(error = %e, "failed to write diagnostic");
    }
}

/// Stringified entry descriptor of a program
pub fn describe_entry(path: &Path, entry: &str) -> Result<String> {
    let oracle = TypeOracle::load(path, entry)?;
    Ok(oracle.stringify(&oracle.entry_node()))
}
