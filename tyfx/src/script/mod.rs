//! Restricted expression language for effect handlers
//!
//! Handlers registered through `DefineEffect` and expressions run by
//! `JsExpr` are written in a small JavaScript-flavoured expression
//! language evaluated over `serde_json::Value`. Supplied source is never
//! handed to a host evaluator.

mod eval;
mod parser;
mod token;

pub(crate) use eval::to_display;

use parser::Lambda;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Handler script error
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("{0}")]
    Runtime(String),
}

impl ScriptError {
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax(message.into())
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime(message.into())
    }
}

/// A compiled handler function
#[derive(Debug, Clone)]
pub struct Handler {
    lambda: Lambda,
}

impl Handler {
    pub fn params(&self) -> &[String] {
        &self.lambda.params
    }

    /// Call the handler, binding arguments positionally; missing ones are `null`
    pub fn call(&self, args: &[Value]) -> Result<Value, ScriptError> {
        let scope: HashMap<&str, Value> = self
            .lambda
            .params
            .iter()
            .enumerate()
            .map(|(i, p)| (p.as_str(), args.get(i).cloned().unwrap_or(Value::Null)))
            .collect();
        eval::eval(&self.lambda.body, &scope)
    }
}

/// Compile arrow-function source into a handler
pub fn compile_handler(source: &str) -> Result<Handler, ScriptError> {
    Ok(Handler {
        lambda: parser::parse_lambda(source)?,
    })
}

/// Evaluate a closed expression
pub fn evaluate_expression(source: &str) -> Result<Value, ScriptError> {
    let expr = parser::parse_expression(source)?;
    eval::eval(&expr, &HashMap::new())
}
