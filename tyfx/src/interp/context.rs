//! Per-run evaluation state

use super::io::{Console, InputLines};
use super::refs::ReferenceStore;
use super::registry::EffectRegistry;
use super::results::ResultStore;
use crate::config::Config;
use crate::oracle::Oracle;
use serde_json::{Value, json};

/// Everything one run owns besides the evaluator's own bookkeeping
pub struct EvalContext<O: Oracle> {
    pub oracle: O,
    pub results: ResultStore<O::Node>,
    pub refs: ReferenceStore<O::Node>,
    pub effects: EffectRegistry,
    pub console: Console,
    pub input: InputLines,
    /// Arguments after the program path
    pub program_args: Vec<String>,
    pub config: Config,
}

impl<O: Oracle> EvalContext<O> {
    /// Context wired to the process's standard streams
    pub fn new(oracle: O, config: Config) -> Self {
        EvalContext {
            oracle,
            results: ResultStore::new(),
            refs: ReferenceStore::new(),
            effects: EffectRegistry::new(),
            console: Console::stdio(),
            input: InputLines::stdin(),
            program_args: Vec::new(),
            config,
        }
    }

    pub fn with_console(mut self, console: Console) -> Self {
        self.console = console;
        self
    }

    pub fn with_input(mut self, input: InputLines) -> Self {
        self.input = input;
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.program_args = args;
        self
    }

    /// Context object handed to custom effect handlers
    pub fn handler_context(&self) -> Value {
        json!({
            "args": self.program_args,
            "results": self.results.len(),
        })
    }

    /// Flush sinks and release the input handle
    pub fn close(&mut self) -> std::io::Result<()> {
        self.input.close();
        self.console.flush()
    }
}
