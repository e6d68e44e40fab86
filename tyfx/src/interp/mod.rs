//! Effect interpreter
//!
//! Walks effect descriptors supplied by an [`Oracle`](crate::oracle::Oracle),
//! performs their side effects and threads results into continuations.

mod context;
mod error;
mod eval;
mod io;
mod refs;
mod registry;
mod results;

pub use context::EvalContext;
pub use error::{EvalResult, Fault, FaultKind};
pub use eval::{BUILTIN_EFFECTS, Evaluator};
pub use io::{Capture, Console, InputLines};
pub use refs::ReferenceStore;
pub use registry::EffectRegistry;
pub use results::{ResultEntry, ResultStore};
