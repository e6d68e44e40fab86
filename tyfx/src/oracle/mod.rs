//! Static-analysis collaborator
//!
//! The evaluator never inspects descriptors itself. Everything it needs to
//! know about a node (its tag, its arguments, its literal value) and every
//! new node it needs (result slots, specialized continuations) goes through
//! the [`Oracle`] trait. [`TypeOracle`] is the implementation backed by the
//! descriptor language in this crate.

mod checker;
mod ty;

pub use checker::TypeOracle;
pub use ty::{Alias, Ty, format_number, lower_aliases, number_to_json};

use crate::ast::Span;
use crate::keys::ResultKey;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Collaborator failure while resolving a descriptor
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OracleError {
    #[error("type instantiation is excessively deep and possibly infinite: {descriptor}")]
    TooDeep { descriptor: String },

    #[error("result slot {key} has not been synthesized")]
    UnknownSlot { key: String },
}

pub type OracleResult<T> = Result<T, OracleError>;

/// The collaborator contract consumed by the evaluator
pub trait Oracle {
    /// Immutable effect descriptor
    type Node: Clone + fmt::Debug;

    /// Root descriptor of the entry construct
    fn entry_node(&self) -> Self::Node;

    /// Location the entry construct was declared at
    fn entry_location(&self) -> Span;

    /// Opcode name of a node, `None` for anonymous nodes
    fn tag_of(&self, node: &Self::Node) -> OracleResult<Option<String>>;

    /// Ordered arguments of a tagged node
    fn arguments_of(&self, node: &Self::Node) -> OracleResult<Vec<Self::Node>>;

    /// Elements of a tuple node, empty for anything else
    fn elements_of(&self, node: &Self::Node) -> OracleResult<Vec<Self::Node>>;

    /// Human-readable text of a node
    fn stringify(&self, node: &Self::Node) -> String;

    /// Best-effort decoding of a literal node
    fn literal_value(&self, node: &Self::Node) -> Option<Value>;

    /// Node describing a literal value
    fn literal(&self, value: &Value) -> Self::Node;

    /// Tuple node over `items`
    fn composite(&self, items: Vec<Self::Node>) -> Self::Node;

    /// Register the output descriptor of result `key`
    fn synthesize_result_slot(&mut self, key: ResultKey, descriptor: Self::Node);

    /// Node referring to the output of result `key`
    fn project(&self, key: ResultKey) -> Self::Node;

    /// Intersect `generic` with a record of `substitutions`
    fn specialize(&self, generic: &Self::Node, substitutions: Vec<(String, Self::Node)>) -> Self::Node;

    /// Resolve member `field` of `resolved`, `None` if it has no such member
    fn project_field(
        &self,
        resolved: &Self::Node,
        field: &str,
        location: Span,
    ) -> OracleResult<Option<Self::Node>>;
}
