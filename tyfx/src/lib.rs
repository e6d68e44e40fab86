//! tyfx - effect interpreter for type-level programs
//!
//! A program is a type alias whose structure describes effects. The
//! interpreter asks an oracle for each node's tag and arguments, performs
//! the effect and feeds results into continuations.

pub mod ast;
pub mod config;
pub mod driver;
pub mod error;
pub mod interp;
pub mod keys;
pub mod lexer;
pub mod oracle;
pub mod parser;
pub mod script;
pub mod util;

pub use ast::Span;
pub use error::{LoadError, Result};
