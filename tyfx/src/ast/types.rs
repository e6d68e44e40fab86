//! Descriptor expression nodes

use super::Spanned;
use serde::{Deserialize, Serialize};

/// A type-level expression as written in the source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeExpr {
    /// String literal type: `"hi"`
    Str(String),
    /// Numeric literal type: `42`, `-1.5`
    Num(f64),
    /// `true` / `false`
    Bool(bool),
    /// `null`
    Null,
    /// `undefined`
    Undefined,
    /// `unknown`
    Unknown,
    /// `this`
    This,
    /// Name with optional type arguments: `Pure<1>`, `Greet`
    Ref {
        name: Spanned<String>,
        args: Vec<Spanned<TypeExpr>>,
    },
    /// Tuple: `[A, B]`
    Tuple(Vec<Spanned<TypeExpr>>),
    /// Record: `{ a: A; b: B }`
    Record(Vec<Field>),
    /// Indexed access: `T["key"]`
    Index {
        object: Box<Spanned<TypeExpr>>,
        key: Box<Spanned<TypeExpr>>,
    },
    /// Intersection: `A & B & C`
    Intersect(Vec<Spanned<TypeExpr>>),
}

/// Record member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: Spanned<String>,
    pub ty: Spanned<TypeExpr>,
}
