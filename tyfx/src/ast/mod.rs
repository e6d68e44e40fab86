//! Abstract Syntax Tree for descriptor sources

mod span;
mod types;

pub use span::*;
pub use types::*;

use serde::{Deserialize, Serialize};

/// A module is a sequence of type alias declarations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub items: Vec<TypeAlias>,
}

impl Module {
    /// Find an exported alias by name
    pub fn exported(&self, name: &str) -> Option<&TypeAlias> {
        self.items
            .iter()
            .find(|item| item.exported && item.name.node == name)
    }
}

/// `[export] type Name<P, Q> = ty;`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeAlias {
    pub exported: bool,
    pub name: Spanned<String>,
    pub params: Vec<Spanned<String>>,
    pub body: Spanned<TypeExpr>,
    pub span: Span,
}
