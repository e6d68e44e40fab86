//! Runtime faults for the effect evaluator

use crate::oracle::OracleError;
use crate::script::ScriptError;
use serde_json::Value;
use std::fmt;

/// Fault raised while evaluating an effect program
#[derive(Debug, Clone)]
pub struct Fault {
    pub kind: FaultKind,
    pub message: String,
}

/// Kinds of runtime faults
#[derive(Debug, Clone)]
pub enum FaultKind {
    /// GetRef on an absent, deleted or malformed key
    RefDeleted,
    /// Filesystem or stream failure
    Io,
    /// Raised by the Throw opcode, payload kept as JSON
    Thrown(Value),
    /// Opcode argument is not the literal it needs
    InvalidArgument,
    /// No built-in or custom handler for a tag (strict policy)
    UnhandledEffect,
    /// Handler script failed to compile or run
    Script,
    /// Oracle could not answer
    Oracle,
    /// Evaluation nested past the configured limit
    DepthExceeded,
    /// Control flow: Exit opcode with its status code
    Exit(i32),
}

impl PartialEq for FaultKind {
    fn eq(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl Fault {
    pub fn ref_deleted() -> Self {
        Fault {
            kind: FaultKind::RefDeleted,
            message: "Ref has been deleted".to_string(),
        }
    }

    pub fn io_error(msg: &str) -> Self {
        Fault {
            kind: FaultKind::Io,
            message: msg.to_string(),
        }
    }

    /// Fault carrying a thrown value; its message is the value's text
    pub fn thrown(payload: Value, message: String) -> Self {
        Fault {
            kind: FaultKind::Thrown(payload),
            message,
        }
    }

    pub fn invalid_argument(opcode: &str, expected: &str, got: &str) -> Self {
        Fault {
            kind: FaultKind::InvalidArgument,
            message: format!("{opcode} expects {expected}, got {got}"),
        }
    }

    pub fn unhandled_effect(name: &str) -> Self {
        Fault {
            kind: FaultKind::UnhandledEffect,
            message: format!("{name} effect is not handled"),
        }
    }

    pub fn depth_exceeded(limit: usize) -> Self {
        Fault {
            kind: FaultKind::DepthExceeded,
            message: format!("evaluation exceeded maximum depth of {limit}"),
        }
    }

    pub fn exit(code: i32) -> Self {
        Fault {
            kind: FaultKind::Exit(code),
            message: format!("exit with code {code}"),
        }
    }

    /// Exit status if this fault is the Exit control-flow signal
    pub fn exit_code(&self) -> Option<i32> {
        match self.kind {
            FaultKind::Exit(code) => Some(code),
            _ => None,
        }
    }
}

impl From<ScriptError> for Fault {
    fn from(err: ScriptError) -> Self {
        Fault {
            kind: FaultKind::Script,
            message: err.to_string(),
        }
    }
}

impl From<OracleError> for Fault {
    fn from(err: OracleError) -> Self {
        Fault {
            kind: FaultKind::Oracle,
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for Fault {
    fn from(err: std::io::Error) -> Self {
        Fault::io_error(&err.to_string())
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Runtime error: {}", self.message)
    }
}

impl std::error::Error for Fault {}

/// Result type for evaluator operations
pub type EvalResult<T> = Result<T, Fault>;
