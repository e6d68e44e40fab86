//! Effect evaluator

use super::context::EvalContext;
use super::error::{EvalResult, Fault};
use crate::config::UnhandledPolicy;
use crate::keys::{RefKey, ResultKey};
use crate::oracle::Oracle;
use crate::script::{evaluate_expression, to_display};
use crate::util::{format_suggestion_hint, suggest_effect};
use futures::future::{FutureExt, LocalBoxFuture};
use serde_json::Value;

/// Opcodes with built-in behavior; they shadow custom effects of the same name
pub const BUILTIN_EFFECTS: &[&str] = &[
    "DefineEffect",
    "CreateRef",
    "GetRef",
    "SetRef",
    "DeleteRef",
    "Pure",
    "Print",
    "PutString",
    "Debug",
    "ReadFile",
    "WriteFile",
    "Bind",
    "GetEnv",
    "GetArgs",
    "Exit",
    "Try",
    "Throw",
    "ReadLine",
    "JsExpr",
    "Seq",
    "Do",
];

/// Outcome of dispatching one node
enum Step<N> {
    Done(Option<ResultKey>),
    /// Tail continuation, evaluated in place by `evaluate`
    Continue(N),
}

/// Interprets effect descriptors against an evaluation context
pub struct Evaluator<O: Oracle> {
    ctx: EvalContext<O>,
    /// Current evaluation nesting
    depth: usize,
}

impl<O: Oracle> Evaluator<O> {
    pub fn new(ctx: EvalContext<O>) -> Self {
        Evaluator { ctx, depth: 0 }
    }

    pub fn context(&self) -> &EvalContext<O> {
        &self.ctx
    }

    pub fn into_context(self) -> EvalContext<O> {
        self.ctx
    }

    /// Evaluate the oracle's entry construct
    pub async fn run(&mut self) -> EvalResult<Option<ResultKey>> {
        let root = self.ctx.oracle.entry_node();
        self.evaluate(&root).await
    }

    /// Evaluate one node, producing at most one result.
    ///
    /// Continuations of `Bind` and `Try` run in this loop rather than in a
    /// nested call; each one still counts as a level of nesting.
    pub fn evaluate<'a>(&'a mut self, node: &'a O::Node) -> LocalBoxFuture<'a, EvalResult<Option<ResultKey>>>
    where
        O: 'a,
    {
        async move {
            let base = self.depth;
            let mut current = node.clone();
            let result = loop {
                if self.depth >= self.ctx.config.max_depth {
                    break Err(Fault::depth_exceeded(self.ctx.config.max_depth));
                }
                self.depth += 1;
                match self.dispatch(&current).await {
                    Ok(Step::Continue(next)) => current = next,
                    Ok(Step::Done(result)) => break Ok(result),
                    Err(fault) => break Err(fault),
                }
            };
            self.depth = base;
            result
        }
        .boxed_local()
    }

    async fn dispatch(&mut self, node: &O::Node) -> EvalResult<Step<O::Node>> {
        let tag = self.ctx.oracle.tag_of(node)?;
        let args = self.ctx.oracle.arguments_of(node)?;
        let Some(tag) = tag else {
            return self.unhandled(None, node).map(Step::Done);
        };
        tracing::debug!(tag = %tag, args = args.len(), depth = self.depth, "evaluating effect");

        match tag.as_str() {
            "Bind" => {
                let input = match args.first() {
                    Some(input) => self.evaluate(input).await?,
                    None => None,
                };
                let input = match input {
                    Some(key) => self.project(key),
                    None => self.ctx.oracle.literal(&Value::Null),
                };
                let continuation = self.node_arg(&tag, &args, 1)?;
                self.continue_with(&continuation, input)
            }

            "Try" => {
                let body = self.node_arg(&tag, &args, 0)?;
                let fault = match self.evaluate(&body).await {
                    Ok(result) => return Ok(Step::Done(result)),
                    Err(fault) if fault.exit_code().is_some() => return Err(fault),
                    Err(fault) => fault,
                };
                tracing::debug!(message = %fault.message, "caught fault");
                let catch = self.node_arg(&tag, &args, 1)?;
                let input = self.ctx.oracle.literal(&Value::String(fault.message));
                self.continue_with(&catch, input)
            }

            _ => self.perform(&tag, &args, node).await.map(Step::Done),
        }
    }

    /// Effects that finish within a single dispatch
    async fn perform(&mut self, tag: &str, args: &[O::Node], node: &O::Node) -> EvalResult<Option<ResultKey>> {
        match tag {
            "DefineEffect" => {
                let name = self.string_arg(&tag, &args, 0)?;
                let source = self.string_arg(&tag, &args, 1)?;
                self.ctx.effects.define(&name, &source)?;
                Ok(None)
            }

            "CreateRef" => {
                let value = self.node_arg(&tag, &args, 0)?;
                let key = self.ctx.refs.create(value);
                self.create_literal(Value::String(key.to_string()))
            }

            "GetRef" => {
                let key = self.ref_key(&args)?;
                let value = self.ctx.refs.get(&key)?;
                Ok(Some(self.create(value)))
            }

            "SetRef" => {
                let key = self.ref_key(&args)?;
                let value = self.node_arg(&tag, &args, 1)?;
                self.ctx.refs.set(key, value);
                Ok(None)
            }

            "DeleteRef" => {
                let key = self.ref_key(&args)?;
                self.ctx.refs.delete(&key);
                Ok(None)
            }

            "Pure" => {
                let value = self.node_arg(&tag, &args, 0)?;
                Ok(Some(self.create(value)))
            }

            "Print" => {
                let line = args
                    .iter()
                    .map(|arg| self.ctx.oracle.stringify(arg))
                    .collect::<Vec<_>>()
                    .join(" ");
                self.ctx.console.diag_line(&line)?;
                Ok(None)
            }

            "PutString" => {
                let value = self.node_arg(&tag, &args, 0)?;
                let text = match self.ctx.oracle.literal_value(&value) {
                    Some(Value::String(s)) => s,
                    _ => self.ctx.oracle.stringify(&value),
                };
                self.ctx.console.put(&text)?;
                Ok(None)
            }

            "Debug" => {
                let label = match args.first() {
                    Some(label) => self.text_of(label),
                    None => String::new(),
                };
                let value = args
                    .get(1)
                    .map(|v| self.ctx.oracle.stringify(v))
                    .unwrap_or_default();
                self.ctx.console.diag_line(&format!("{label} {value}"))?;
                self.create_literal(Value::String(value))
            }

            "ReadFile" => {
                let path = self.string_arg(&tag, &args, 0)?;
                let contents = tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|e| Fault::io_error(&format!("{path}: {e}")))?;
                self.create_literal(Value::String(contents))
            }

            "WriteFile" => {
                let path = self.string_arg(&tag, &args, 0)?;
                let contents = self.string_arg(&tag, &args, 1)?;
                tokio::fs::write(&path, contents)
                    .await
                    .map_err(|e| Fault::io_error(&format!("{path}: {e}")))?;
                Ok(None)
            }

            "GetEnv" => {
                let name = self.string_arg(&tag, &args, 0)?;
                let value = std::env::var(&name).unwrap_or_default();
                self.create_literal(Value::String(value))
            }

            "GetArgs" => {
                let args = self.ctx.program_args.iter().cloned().map(Value::String).collect();
                self.create_literal(Value::Array(args))
            }

            "Exit" => {
                let code = match args.first() {
                    None => 0,
                    Some(code) => match self.ctx.oracle.literal_value(code) {
                        Some(Value::Null) | None => 0,
                        Some(value) => match value.as_i64().and_then(|n| i32::try_from(n).ok()) {
                            Some(code) => code,
                            None => {
                                let got = self.ctx.oracle.stringify(code);
                                return Err(Fault::invalid_argument(tag, "an integer exit code", &got));
                            }
                        },
                    },
                };
                tracing::debug!(code, "exit requested");
                Err(Fault::exit(code))
            }

            "Throw" => {
                let (payload, message) = match args.first() {
                    Some(value) => match self.ctx.oracle.literal_value(value) {
                        Some(Value::String(s)) => (Value::String(s.clone()), s),
                        Some(payload) => {
                            let message = self.ctx.oracle.stringify(value);
                            (payload, message)
                        }
                        None => {
                            let message = self.ctx.oracle.stringify(value);
                            (Value::String(message.clone()), message)
                        }
                    },
                    None => (Value::Null, "null".to_string()),
                };
                Err(Fault::thrown(payload, message))
            }

            "ReadLine" => {
                let line = self
                    .ctx
                    .input
                    .next_line()
                    .await?
                    .ok_or_else(|| Fault::io_error("ReadLine: end of input"))?;
                self.create_literal(Value::String(line))
            }

            "JsExpr" => {
                let source = self.string_arg(&tag, &args, 0)?;
                let value = evaluate_expression(&source)?;
                self.create_literal(value)
            }

            "Seq" => {
                let keys = self.evaluate_all(args.first()).await?;
                let outputs = keys.into_iter().map(|key| self.project(key)).collect();
                let composite = self.ctx.oracle.composite(outputs);
                Ok(Some(self.create(composite)))
            }

            "Do" => {
                let elements = match args.first() {
                    Some(list) => self.ctx.oracle.elements_of(list)?,
                    None => Vec::new(),
                };
                let mut last = None;
                for element in &elements {
                    last = self.evaluate(element).await?;
                }
                match last {
                    Some(key) => {
                        let output = self.project(key);
                        Ok(Some(self.create(output)))
                    }
                    None => Ok(None),
                }
            }

            _ if self.ctx.effects.has(&tag) => self.custom(&tag, &args),

            _ => self.unhandled(Some(tag), node),
        }
    }

    /// Specialize a continuation with `input` and resolve its `return` node
    fn continue_with(&mut self, continuation: &O::Node, input: O::Node) -> EvalResult<Step<O::Node>> {
        let specialized = self
            .ctx
            .oracle
            .specialize(continuation, vec![("input".to_string(), input)]);
        let slot = self.create(specialized);
        let resolved = self.project(slot);
        let location = self.ctx.oracle.entry_location();
        let next = self.ctx.oracle.project_field(&resolved, "return", location)?;
        tracing::trace!(slot = %slot, resolved = next.is_some(), "specialized continuation");
        Ok(match next {
            Some(next) => Step::Continue(next),
            None => Step::Done(None),
        })
    }

    /// Evaluate tuple elements in order, keeping the results they produce
    async fn evaluate_all(&mut self, list: Option<&O::Node>) -> EvalResult<Vec<ResultKey>> {
        let elements = match list {
            Some(list) => self.ctx.oracle.elements_of(list)?,
            None => Vec::new(),
        };
        let mut keys = Vec::with_capacity(elements.len());
        for element in &elements {
            if let Some(key) = self.evaluate(element).await? {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    fn custom(&mut self, tag: &str, args: &[O::Node]) -> EvalResult<Option<ResultKey>> {
        let values = args
            .iter()
            .map(|arg| {
                self.ctx
                    .oracle
                    .literal_value(arg)
                    .unwrap_or_else(|| Value::String(self.ctx.oracle.stringify(arg)))
            })
            .collect();
        let context = self.ctx.handler_context();
        match self.ctx.effects.invoke(tag, values, context)? {
            Some(value) => self.create_literal(value),
            None => Ok(None),
        }
    }

    fn unhandled(&mut self, tag: Option<&str>, node: &O::Node) -> EvalResult<Option<ResultKey>> {
        let name = tag.unwrap_or("anonymous");
        tracing::warn!(effect = name, "unhandled effect");
        if self.ctx.config.unhandled == UnhandledPolicy::Strict {
            return Err(Fault::unhandled_effect(name));
        }

        let mut candidates: Vec<&str> = BUILTIN_EFFECTS.to_vec();
        candidates.extend(self.ctx.effects.names());
        let hint = format_suggestion_hint(tag.and_then(|t| suggest_effect(t, &candidates)));
        let rendered = self.ctx.oracle.stringify(node);
        self.ctx
            .console
            .diag_line(&format!("{name} effect is not handled{hint}"))?;
        self.ctx.console.diag_line(&rendered)?;
        Ok(None)
    }

    fn create(&mut self, output: O::Node) -> ResultKey {
        self.ctx.results.create(&mut self.ctx.oracle, output)
    }

    fn project(&self, key: ResultKey) -> O::Node {
        self.ctx.results.project(&self.ctx.oracle, key)
    }

    fn create_literal(&mut self, value: Value) -> EvalResult<Option<ResultKey>> {
        let node = self.ctx.oracle.literal(&value);
        Ok(Some(self.create(node)))
    }

    fn node_arg(&self, opcode: &str, args: &[O::Node], index: usize) -> EvalResult<O::Node> {
        args.get(index)
            .cloned()
            .ok_or_else(|| Fault::invalid_argument(opcode, &format!("argument {}", index + 1), "nothing"))
    }

    /// String literal argument
    fn string_arg(&self, opcode: &str, args: &[O::Node], index: usize) -> EvalResult<String> {
        let node = self.node_arg(opcode, args, index)?;
        match self.ctx.oracle.literal_value(&node) {
            Some(Value::String(s)) => Ok(s),
            _ => Err(Fault::invalid_argument(
                opcode,
                "a string literal",
                &self.ctx.oracle.stringify(&node),
            )),
        }
    }

    /// Decoded ref key; anything unusable reads as a deleted reference
    fn ref_key(&self, args: &[O::Node]) -> EvalResult<RefKey> {
        args.first()
            .and_then(|node| match self.ctx.oracle.literal_value(node) {
                Some(Value::String(s)) => s.parse().ok(),
                _ => None,
            })
            .ok_or_else(Fault::ref_deleted)
    }

    /// Literal text of a node, or its rendering
    fn text_of(&self, node: &O::Node) -> String {
        match self.ctx.oracle.literal_value(node) {
            Some(Value::String(s)) => s,
            Some(value) => to_display(&value),
            None => self.ctx.oracle.stringify(node),
        }
    }
}
