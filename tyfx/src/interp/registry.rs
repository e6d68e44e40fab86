//! Custom effect registry

use crate::script::{Handler, ScriptError, compile_handler};
use serde_json::Value;
use std::collections::HashMap;

/// Runtime-defined effect handlers, keyed by tag
#[derive(Debug, Clone, Default)]
pub struct EffectRegistry {
    handlers: HashMap<String, Handler>,
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and register a handler, replacing any previous one
    pub fn define(&mut self, name: &str, source: &str) -> Result<(), ScriptError> {
        let handler = compile_handler(source)?;
        self.handlers.insert(name.to_string(), handler);
        Ok(())
    }

    pub fn has(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Run a handler; `Ok(None)` when it is absent or returned null
    pub fn invoke(&self, name: &str, args: Vec<Value>, context: Value) -> Result<Option<Value>, ScriptError> {
        let Some(handler) = self.handlers.get(name) else {
            return Ok(None);
        };
        let value = handler.call(&[Value::Array(args), context])?;
        Ok((!value.is_null()).then_some(value))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
