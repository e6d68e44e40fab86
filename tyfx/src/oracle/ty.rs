//! Resolved descriptors and lowering from the source AST

use crate::ast::{Spanned, TypeAlias, TypeExpr};
use crate::error::{LoadError, Result};
use crate::keys::ResultKey;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// A span-free descriptor, the node type of [`super::TypeOracle`]
#[derive(Debug, Clone, PartialEq)]
pub enum Ty {
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
    Undefined,
    Unknown,
    /// The record a member is projected from
    This,
    /// Generic parameter of the enclosing alias
    Param(String),
    /// Alias reference or effect constructor application
    Ref { name: String, args: Vec<Ty> },
    Tuple(Vec<Ty>),
    Record(Vec<(String, Ty)>),
    Index(Box<Ty>, Box<Ty>),
    Intersect(Vec<Ty>),
    /// Output of a synthesized result slot
    Slot(ResultKey),
}

impl Ty {
    pub fn index(object: Ty, key: Ty) -> Ty {
        Ty::Index(Box::new(object), Box::new(key))
    }

    /// Replace alias parameters with arguments
    pub fn substitute(&self, bindings: &HashMap<&str, &Ty>) -> Ty {
        match self {
            Ty::Param(name) => bindings.get(name.as_str()).map_or_else(|| self.clone(), |ty| (*ty).clone()),
            Ty::Ref { name, args } => Ty::Ref {
                name: name.clone(),
                args: args.iter().map(|a| a.substitute(bindings)).collect(),
            },
            Ty::Tuple(items) => Ty::Tuple(items.iter().map(|t| t.substitute(bindings)).collect()),
            Ty::Record(fields) => Ty::Record(
                fields
                    .iter()
                    .map(|(name, ty)| (name.clone(), ty.substitute(bindings)))
                    .collect(),
            ),
            Ty::Index(object, key) => Ty::index(object.substitute(bindings), key.substitute(bindings)),
            Ty::Intersect(parts) => Ty::Intersect(parts.iter().map(|t| t.substitute(bindings)).collect()),
            _ => self.clone(),
        }
    }

    /// Bind `this` to `record`. Nested records introduce their own `this`
    /// and are left untouched.
    pub fn bind_this(&self, record: &Ty) -> Ty {
        match self {
            Ty::This => record.clone(),
            Ty::Ref { name, args } => Ty::Ref {
                name: name.clone(),
                args: args.iter().map(|a| a.bind_this(record)).collect(),
            },
            Ty::Tuple(items) => Ty::Tuple(items.iter().map(|t| t.bind_this(record)).collect()),
            Ty::Index(object, key) => Ty::index(object.bind_this(record), key.bind_this(record)),
            Ty::Intersect(parts) => Ty::Intersect(parts.iter().map(|t| t.bind_this(record)).collect()),
            _ => self.clone(),
        }
    }

    pub fn from_json(value: &Value) -> Ty {
        match value {
            Value::Null => Ty::Null,
            Value::Bool(b) => Ty::Bool(*b),
            Value::Number(n) => Ty::Num(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => Ty::Str(s.clone()),
            Value::Array(items) => Ty::Tuple(items.iter().map(Ty::from_json).collect()),
            Value::Object(map) => Ty::Record(map.iter().map(|(k, v)| (k.clone(), Ty::from_json(v))).collect()),
        }
    }
}

/// Integral numbers print without a fraction, like JavaScript
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

pub fn number_to_json(n: f64) -> Option<Value> {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Some(Value::from(n as i64))
    } else {
        serde_json::Number::from_f64(n).map(Value::Number)
    }
}

pub(crate) fn format_member_name(name: &str) -> String {
    let mut chars = name.chars();
    let is_ident = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if is_ident {
        name.to_string()
    } else {
        Value::from(name).to_string()
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Str(s) => write!(f, "{}", Value::from(s.as_str())),
            Ty::Num(n) => write!(f, "{}", format_number(*n)),
            Ty::Bool(b) => write!(f, "{b}"),
            Ty::Null => write!(f, "null"),
            Ty::Undefined => write!(f, "undefined"),
            Ty::Unknown => write!(f, "unknown"),
            Ty::This => write!(f, "this"),
            Ty::Param(name) => write!(f, "{name}"),
            Ty::Ref { name, args } => {
                write!(f, "{name}")?;
                if !args.is_empty() {
                    write!(f, "<")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
            Ty::Tuple(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Ty::Record(fields) => {
                if fields.is_empty() {
                    return write!(f, "{{}}");
                }
                write!(f, "{{ ")?;
                for (name, ty) in fields {
                    write!(f, "{}: {ty}; ", format_member_name(name))?;
                }
                write!(f, "}}")
            }
            Ty::Index(object, key) => match object.as_ref() {
                Ty::Intersect(_) => write!(f, "({object})[{key}]"),
                _ => write!(f, "{object}[{key}]"),
            },
            Ty::Intersect(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " & ")?;
                    }
                    write!(f, "{part}")?;
                }
                Ok(())
            }
            Ty::Slot(key) => write!(f, "__result[\"{key}\"][\"output\"]"),
        }
    }
}

/// A lowered alias declaration
#[derive(Debug, Clone)]
pub struct Alias {
    pub params: Vec<String>,
    pub body: Ty,
}

impl Alias {
    pub fn instantiate(&self, args: &[Ty]) -> Ty {
        if self.params.is_empty() {
            return self.body.clone();
        }
        let bindings: HashMap<&str, &Ty> = self
            .params
            .iter()
            .map(String::as_str)
            .zip(args.iter())
            .collect();
        self.body.substitute(&bindings)
    }
}

/// Lower every alias of a module, checking names and generic arity
pub fn lower_aliases(items: &[TypeAlias]) -> Result<HashMap<String, Alias>> {
    let mut arity: HashMap<&str, usize> = HashMap::new();
    for item in items {
        if arity.insert(&item.name.node, item.params.len()).is_some() {
            return Err(LoadError::declaration(
                format!("duplicate type alias `{}`", item.name.node),
                item.name.span,
            ));
        }
    }

    let mut aliases = HashMap::new();
    for item in items {
        let params: Vec<String> = item.params.iter().map(|p| p.node.clone()).collect();
        let body = Lowering {
            params: &params,
            arity: &arity,
        }
        .lower(&item.body)?;
        aliases.insert(item.name.node.clone(), Alias { params, body });
    }
    Ok(aliases)
}

struct Lowering<'a> {
    params: &'a [String],
    arity: &'a HashMap<&'a str, usize>,
}

impl Lowering<'_> {
    fn lower(&self, expr: &Spanned<TypeExpr>) -> Result<Ty> {
        Ok(match &expr.node {
            TypeExpr::Str(s) => Ty::Str(s.clone()),
            TypeExpr::Num(n) => Ty::Num(*n),
            TypeExpr::Bool(b) => Ty::Bool(*b),
            TypeExpr::Null => Ty::Null,
            TypeExpr::Undefined => Ty::Undefined,
            TypeExpr::Unknown => Ty::Unknown,
            TypeExpr::This => Ty::This,
            TypeExpr::Ref { name, args } => {
                if self.params.contains(&name.node) {
                    if !args.is_empty() {
                        return Err(LoadError::declaration(
                            format!("type parameter `{}` cannot take arguments", name.node),
                            expr.span,
                        ));
                    }
                    Ty::Param(name.node.clone())
                } else {
                    if let Some(&expected) = self.arity.get(name.node.as_str())
                        && expected != args.len()
                    {
                        return Err(LoadError::declaration(
                            format!(
                                "type `{}` expects {expected} argument(s), got {}",
                                name.node,
                                args.len()
                            ),
                            expr.span,
                        ));
                    }
                    Ty::Ref {
                        name: name.node.clone(),
                        args: args.iter().map(|a| self.lower(a)).collect::<Result<_>>()?,
                    }
                }
            }
            TypeExpr::Tuple(items) => Ty::Tuple(items.iter().map(|t| self.lower(t)).collect::<Result<_>>()?),
            TypeExpr::Record(fields) => Ty::Record(
                fields
                    .iter()
                    .map(|field| Ok((field.name.node.clone(), self.lower(&field.ty)?)))
                    .collect::<Result<_>>()?,
            ),
            TypeExpr::Index { object, key } => Ty::index(self.lower(object)?, self.lower(key)?),
            TypeExpr::Intersect(parts) => {
                Ty::Intersect(parts.iter().map(|t| self.lower(t)).collect::<Result<_>>()?)
            }
        })
    }
}
