//! Descriptor normalization and the [`Oracle`] implementation

use super::ty::{Alias, Ty, lower_aliases, number_to_json};
use super::{Oracle, OracleError, OracleResult};
use crate::ast::Span;
use crate::error::{LoadError, Result};
use crate::keys::ResultKey;
use crate::lexer::tokenize;
use crate::parser::parse;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Alias expansions allowed while resolving one descriptor
const MAX_INSTANTIATION_DEPTH: usize = 1000;

/// Nesting printed by `stringify` before eliding
const MAX_RENDER_DEPTH: usize = 32;

const STACK_RED_ZONE: usize = 64 * 1024;
const STACK_GROW_SIZE: usize = 1024 * 1024;

/// Outcome of indexing a normalized object
enum Indexed {
    Found(Ty),
    Missing,
    /// Object still mentions an unbound `this`
    Stuck,
}

/// Oracle over a loaded descriptor module
#[derive(Debug)]
pub struct TypeOracle {
    aliases: HashMap<String, Alias>,
    entry: String,
    entry_span: Span,
    slots: HashMap<ResultKey, Ty>,
}

impl TypeOracle {
    /// Read, parse and lower a descriptor file
    pub fn load(path: &Path, entry: &str) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| LoadError::io_error(format!("{}: {e}", path.display())))?;
        Self::from_source(&path.display().to_string(), &source, entry)
    }

    /// Parse and lower descriptor source, requiring an exported `entry` alias
    pub fn from_source(filename: &str, source: &str, entry: &str) -> Result<Self> {
        let tokens = tokenize(source)?;
        let module = parse(filename, source, tokens)?;
        let aliases = lower_aliases(&module.items)?;

        let Some(decl) = module.exported(entry) else {
            return Err(LoadError::missing_entry(entry));
        };
        if !decl.params.is_empty() {
            return Err(LoadError::declaration(
                format!("entrypoint `{entry}` must not take type parameters"),
                decl.name.span,
            ));
        }

        tracing::debug!(aliases = aliases.len(), entry, "loaded descriptor module");
        Ok(TypeOracle {
            aliases,
            entry: entry.to_string(),
            entry_span: decl.span,
            slots: HashMap::new(),
        })
    }

    /// Number of synthesized result slots
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Weak-head normal form: the outermost constructor is resolved,
    /// arguments and members stay lazy.
    pub fn normalize(&self, ty: &Ty) -> OracleResult<Ty> {
        self.whnf(ty, 0)
    }

    fn whnf(&self, ty: &Ty, depth: usize) -> OracleResult<Ty> {
        if depth > MAX_INSTANTIATION_DEPTH {
            return Err(OracleError::TooDeep {
                descriptor: ty.to_string(),
            });
        }
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.whnf_inner(ty, depth))
    }

    fn whnf_inner(&self, ty: &Ty, depth: usize) -> OracleResult<Ty> {
        match ty {
            Ty::Ref { name, args } => match self.aliases.get(name) {
                Some(alias) => self.whnf(&alias.instantiate(args), depth + 1),
                None => Ok(ty.clone()),
            },
            Ty::Slot(key) => match self.slots.get(key) {
                Some(output) => self.whnf(output, depth + 1),
                None => Err(OracleError::UnknownSlot { key: key.to_string() }),
            },
            Ty::Index(object, key) => {
                let object = self.whnf(object, depth + 1)?;
                let key = self.whnf(key, depth + 1)?;
                match index(&object, &key) {
                    Indexed::Found(member) => self.whnf(&member, depth + 1),
                    Indexed::Missing => Ok(Ty::Unknown),
                    Indexed::Stuck => Ok(Ty::index(object, key)),
                }
            }
            Ty::Intersect(parts) => {
                let parts = parts
                    .iter()
                    .map(|part| self.whnf(part, depth + 1))
                    .collect::<OracleResult<Vec<_>>>()?;
                Ok(intersect(parts))
            }
            Ty::Param(_) => Ok(Ty::Unknown),
            _ => Ok(ty.clone()),
        }
    }

    fn render(&self, ty: &Ty, depth: usize) -> String {
        if depth > MAX_RENDER_DEPTH {
            return "...".to_string();
        }
        let ty = self.normalize(ty).unwrap_or_else(|_| ty.clone());
        let join = |items: &[Ty], sep: &str| {
            items
                .iter()
                .map(|item| self.render(item, depth + 1))
                .collect::<Vec<_>>()
                .join(sep)
        };
        match &ty {
            Ty::Ref { name, args } if !args.is_empty() => format!("{name}<{}>", join(args, ", ")),
            Ty::Tuple(items) => format!("[{}]", join(items, ", ")),
            Ty::Intersect(parts) => join(parts, " & "),
            Ty::Record(fields) if !fields.is_empty() => {
                let members: String = fields
                    .iter()
                    .map(|(name, member)| {
                        format!(
                            "{}: {}; ",
                            super::ty::format_member_name(name),
                            self.render(member, depth + 1)
                        )
                    })
                    .collect();
                format!("{{ {members}}}")
            }
            other => other.to_string(),
        }
    }

    fn decode(&self, ty: &Ty, depth: usize) -> Option<Value> {
        if depth > MAX_RENDER_DEPTH {
            return None;
        }
        match self.normalize(ty).ok()? {
            Ty::Str(s) => Some(Value::String(s)),
            Ty::Num(n) => number_to_json(n),
            Ty::Bool(b) => Some(Value::Bool(b)),
            Ty::Null => Some(Value::Null),
            Ty::Tuple(items) => items
                .iter()
                .map(|item| self.decode(item, depth + 1))
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            Ty::Record(fields) => fields
                .iter()
                .map(|(name, member)| Some((name.clone(), self.decode(member, depth + 1)?)))
                .collect::<Option<serde_json::Map<_, _>>>()
                .map(Value::Object),
            _ => None,
        }
    }
}

fn index(object: &Ty, key: &Ty) -> Indexed {
    match (object, key) {
        (Ty::Record(fields), Ty::Str(name)) => fields
            .iter()
            .rev()
            .find(|(field, _)| field == name)
            .map_or(Indexed::Missing, |(_, member)| Indexed::Found(member.bind_this(object))),
        (Ty::Tuple(items), Ty::Num(n)) => {
            if n.fract() == 0.0 && *n >= 0.0 && (*n as usize) < items.len() {
                Indexed::Found(items[*n as usize].clone())
            } else {
                Indexed::Missing
            }
        }
        (Ty::Tuple(items), Ty::Str(name)) if name == "length" => Indexed::Found(Ty::Num(items.len() as f64)),
        (Ty::Str(s), Ty::Str(name)) if name == "length" => Indexed::Found(Ty::Num(s.chars().count() as f64)),
        (Ty::This | Ty::Index(..) | Ty::Intersect(_), _) | (_, Ty::This | Ty::Index(..)) => Indexed::Stuck,
        _ => Indexed::Missing,
    }
}

/// Merge normalized intersection parts. Records combine member-wise with
/// later members overriding earlier ones; `unknown` is the identity.
fn intersect(parts: Vec<Ty>) -> Ty {
    let mut parts: Vec<Ty> = parts.into_iter().filter(|p| *p != Ty::Unknown).collect();
    match parts.len() {
        0 => return Ty::Unknown,
        1 => return parts.remove(0),
        _ => {}
    }
    if !parts.iter().all(|p| matches!(p, Ty::Record(_))) {
        return Ty::Intersect(parts);
    }

    let mut merged: Vec<(String, Ty)> = Vec::new();
    for part in parts {
        let Ty::Record(fields) = part else { continue };
        for (name, member) in fields {
            match merged.iter_mut().find(|(existing, _)| *existing == name) {
                Some(slot) => slot.1 = member,
                None => merged.push((name, member)),
            }
        }
    }
    Ty::Record(merged)
}

impl Oracle for TypeOracle {
    type Node = Ty;

    fn entry_node(&self) -> Ty {
        Ty::Ref {
            name: self.entry.clone(),
            args: Vec::new(),
        }
    }

    fn entry_location(&self) -> Span {
        self.entry_span
    }

    fn tag_of(&self, node: &Ty) -> OracleResult<Option<String>> {
        Ok(match self.normalize(node)? {
            Ty::Ref { name, .. } => Some(name),
            _ => None,
        })
    }

    fn arguments_of(&self, node: &Ty) -> OracleResult<Vec<Ty>> {
        Ok(match self.normalize(node)? {
            Ty::Ref { args, .. } => args,
            _ => Vec::new(),
        })
    }

    fn elements_of(&self, node: &Ty) -> OracleResult<Vec<Ty>> {
        Ok(match self.normalize(node)? {
            Ty::Tuple(items) => items,
            _ => Vec::new(),
        })
    }

    fn stringify(&self, node: &Ty) -> String {
        self.render(node, 0)
    }

    fn literal_value(&self, node: &Ty) -> Option<Value> {
        self.decode(node, 0)
    }

    fn literal(&self, value: &Value) -> Ty {
        Ty::from_json(value)
    }

    fn composite(&self, items: Vec<Ty>) -> Ty {
        Ty::Tuple(items)
    }

    fn synthesize_result_slot(&mut self, key: ResultKey, descriptor: Ty) {
        self.slots.insert(key, descriptor);
    }

    fn project(&self, key: ResultKey) -> Ty {
        Ty::Slot(key)
    }

    fn specialize(&self, generic: &Ty, substitutions: Vec<(String, Ty)>) -> Ty {
        Ty::Intersect(vec![generic.clone(), Ty::Record(substitutions)])
    }

    fn project_field(&self, resolved: &Ty, field: &str, location: Span) -> OracleResult<Option<Ty>> {
        let member = self.normalize(&Ty::index(resolved.clone(), Ty::Str(field.to_string())))?;
        tracing::trace!(%location, field, member = %member, "projected member");
        Ok(match member {
            Ty::Unknown | Ty::Undefined => None,
            other => Some(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn oracle(source: &str) -> TypeOracle {
        TypeOracle::from_source("test.tfx", source, "main").expect("source should load")
    }

    fn alias(name: &str) -> Ty {
        Ty::Ref {
            name: name.to_string(),
            args: Vec::new(),
        }
    }

    #[test]
    fn test_missing_entry_is_load_error() {
        let err = TypeOracle::from_source("t.tfx", "type main = Pure<1>;", "main").unwrap_err();
        assert!(matches!(err, LoadError::MissingEntry { .. }));
    }

    #[test]
    fn test_generic_entry_is_rejected() {
        let err = TypeOracle::from_source("t.tfx", "export type main<T> = Pure<T>;", "main").unwrap_err();
        assert!(matches!(err, LoadError::Declaration { .. }));
    }

    #[test]
    fn test_custom_entry_name() {
        let o = TypeOracle::from_source("t.tfx", "export type start = Pure<1>;", "start").unwrap();
        assert_eq!(o.tag_of(&o.entry_node()).unwrap(), Some("Pure".to_string()));
    }

    #[test]
    fn test_tag_and_arguments_through_aliases() {
        let o = oracle("type Greeting = \"hi\"; export type main = Print<Greeting, 2>;");
        let root = o.entry_node();
        assert_eq!(o.tag_of(&root).unwrap(), Some("Print".to_string()));
        let args = o.arguments_of(&root).unwrap();
        assert_eq!(args.len(), 2);
        assert_eq!(o.literal_value(&args[0]), Some(json!("hi")));
        assert_eq!(o.literal_value(&args[1]), Some(json!(2)));
    }

    #[test]
    fn test_anonymous_nodes_have_no_tag() {
        let o = oracle("export type main = { a: 1 };");
        assert_eq!(o.tag_of(&o.entry_node()).unwrap(), None);
        assert!(o.arguments_of(&o.entry_node()).unwrap().is_empty());
    }

    #[test]
    fn test_generic_alias_instantiation() {
        let o = oracle("type Twice<E> = Seq<[E, E]>; export type main = Twice<Print<\"x\">>;");
        assert_eq!(o.stringify(&o.entry_node()), r#"Seq<[Print<"x">, Print<"x">]>"#);
    }

    #[test]
    fn test_specialize_then_project_return() {
        let o = oracle(
            "type Double = { return: Pure<[this[\"input\"], this[\"input\"]]> };
             export type main = Double;",
        );
        let specialized = o.specialize(&alias("Double"), vec![("input".to_string(), Ty::Num(5.0))]);
        let next = o.project_field(&specialized, "return", o.entry_location()).unwrap().unwrap();
        assert_eq!(o.tag_of(&next).unwrap(), Some("Pure".to_string()));
        let args = o.arguments_of(&next).unwrap();
        assert_eq!(o.literal_value(&args[0]), Some(json!([5, 5])));
    }

    #[test]
    fn test_specialized_input_overrides_declared_input() {
        let o = oracle("type K = { input: unknown; return: this[\"input\"] }; export type main = K;");
        let specialized = o.specialize(&alias("K"), vec![("input".to_string(), Ty::Str("x".to_string()))]);
        let member = o.project_field(&specialized, "return", Span::default()).unwrap();
        assert_eq!(member, Some(Ty::Str("x".to_string())));
    }

    #[test]
    fn test_project_missing_field_is_none() {
        let o = oracle("type K = { other: 1 }; export type main = K;");
        let specialized = o.specialize(&alias("K"), vec![("input".to_string(), Ty::Null)]);
        assert_eq!(o.project_field(&specialized, "return", Span::default()).unwrap(), None);
    }

    #[test]
    fn test_slots_resolve_after_synthesis() {
        let mut o = oracle("export type main = Pure<1>;");
        let key = ResultKey::new();
        assert!(matches!(o.normalize(&o.project(key)), Err(OracleError::UnknownSlot { .. })));
        o.synthesize_result_slot(key, Ty::Str("hello".to_string()));
        assert_eq!(o.literal_value(&o.project(key)), Some(json!("hello")));
        assert_eq!(o.slot_count(), 1);
    }

    #[test]
    fn test_slot_feeds_continuation() {
        let mut o = oracle("type Echo = { return: PutString<this[\"input\"]> }; export type main = Echo;");
        let key = ResultKey::new();
        o.synthesize_result_slot(key, Ty::Str("line".to_string()));
        let specialized = o.specialize(&alias("Echo"), vec![("input".to_string(), o.project(key))]);
        let next = o.project_field(&specialized, "return", Span::default()).unwrap().unwrap();
        let args = o.arguments_of(&next).unwrap();
        assert_eq!(o.literal_value(&args[0]), Some(json!("line")));
    }

    #[test]
    fn test_tuple_indexing_and_length() {
        let o = oracle("type T = [\"a\", \"b\"]; export type main = Pure<[T[1], T[\"length\"], T[5]]>;");
        let args = o.arguments_of(&o.entry_node()).unwrap();
        assert_eq!(o.stringify(&args[0]), r#"["b", 2, unknown]"#);
    }

    #[test]
    fn test_recursive_alias_is_lazy() {
        let o = oracle("type Loop = Do<[Print<1>, Loop]>; export type main = Loop;");
        assert_eq!(o.tag_of(&o.entry_node()).unwrap(), Some("Do".to_string()));
        let elements = o.elements_of(&o.arguments_of(&o.entry_node()).unwrap()[0]).unwrap();
        assert_eq!(elements.len(), 2);
        assert!(o.stringify(&o.entry_node()).contains("..."));
    }

    #[test]
    fn test_divergent_alias_is_too_deep() {
        let o = oracle("type A = B; type B = A; export type main = A;");
        assert!(matches!(o.tag_of(&o.entry_node()), Err(OracleError::TooDeep { .. })));
    }

    #[test]
    fn test_stringify_keeps_unbound_this() {
        let o = oracle("type K = { return: Pure<this[\"input\"]> }; export type main = K;");
        assert_eq!(o.stringify(&o.entry_node()), r#"{ return: Pure<this["input"]>; }"#);
    }

    #[test]
    fn test_literal_value_of_record_and_non_literal() {
        let o = oracle("export type main = Pure<{ a: 1; b: [true, null] }, Print<1>>;");
        let args = o.arguments_of(&o.entry_node()).unwrap();
        assert_eq!(o.literal_value(&args[0]), Some(json!({"a": 1, "b": [true, null]})));
        assert_eq!(o.literal_value(&args[1]), None);
    }

    #[test]
    fn test_literal_and_composite_synthesis() {
        let o = oracle("export type main = Pure<1>;");
        let lit = o.literal(&json!(["x", 2]));
        assert_eq!(o.literal_value(&lit), Some(json!(["x", 2])));
        let composite = o.composite(vec![Ty::Num(1.0), Ty::Num(2.0)]);
        assert_eq!(o.stringify(&composite), "[1, 2]");
    }

    #[test]
    fn test_intersection_of_non_records_stays_symbolic() {
        let o = oracle("export type main = Pure<\"a\" & unknown & 1>;");
        let args = o.arguments_of(&o.entry_node()).unwrap();
        assert_eq!(o.stringify(&args[0]), r#""a" & 1"#);
    }
}
