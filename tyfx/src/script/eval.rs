//! Handler script evaluation over JSON values

use super::ScriptError;
use super::parser::{BinOp, Expr, UnOp};
use crate::oracle::{format_number, number_to_json};
use serde_json::{Map, Value};
use std::collections::HashMap;

type Scope<'a> = HashMap<&'a str, Value>;

const STACK_RED_ZONE: usize = 64 * 1024;
const STACK_GROW_SIZE: usize = 1024 * 1024;

pub(super) fn eval(expr: &Expr, scope: &Scope<'_>) -> Result<Value, ScriptError> {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || eval_inner(expr, scope))
}

fn eval_inner(expr: &Expr, scope: &Scope<'_>) -> Result<Value, ScriptError> {
    match expr {
        Expr::Lit(v) => Ok(v.clone()),
        Expr::Ident(name) => scope
            .get(name.as_str())
            .cloned()
            .ok_or_else(|| ScriptError::runtime(format!("{name} is not defined"))),
        Expr::Array(items) => items
            .iter()
            .map(|item| eval(item, scope))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Expr::Object(fields) => {
            let mut map = Map::new();
            for (key, value) in fields {
                map.insert(key.clone(), eval(value, scope)?);
            }
            Ok(Value::Object(map))
        }
        Expr::Index(object, key) => {
            let object = eval(object, scope)?;
            let key = eval(key, scope)?;
            index(&object, &key)
        }
        Expr::Member(object, name) => {
            let object = eval(object, scope)?;
            index(&object, &Value::String(name.clone()))
        }
        Expr::Call { callee, args } => call(callee, args, scope),
        Expr::Unary(UnOp::Not, operand) => Ok(Value::Bool(!truthy(&eval(operand, scope)?))),
        Expr::Unary(UnOp::Neg, operand) => Ok(num(-to_number(&eval(operand, scope)?))),
        Expr::Binary(BinOp::And, lhs, rhs) => {
            let lhs = eval(lhs, scope)?;
            if truthy(&lhs) { eval(rhs, scope) } else { Ok(lhs) }
        }
        Expr::Binary(BinOp::Or, lhs, rhs) => {
            let lhs = eval(lhs, scope)?;
            if truthy(&lhs) { Ok(lhs) } else { eval(rhs, scope) }
        }
        Expr::Binary(op, lhs, rhs) => {
            let lhs = eval(lhs, scope)?;
            let rhs = eval(rhs, scope)?;
            Ok(binary(*op, &lhs, &rhs))
        }
        Expr::Cond(cond, then, otherwise) => {
            if truthy(&eval(cond, scope)?) {
                eval(then, scope)
            } else {
                eval(otherwise, scope)
            }
        }
    }
}

fn binary(op: BinOp, lhs: &Value, rhs: &Value) -> Value {
    match op {
        BinOp::Add => {
            if lhs.is_string() || rhs.is_string() {
                Value::String(to_display(lhs) + &to_display(rhs))
            } else {
                num(to_number(lhs) + to_number(rhs))
            }
        }
        BinOp::Sub => num(to_number(lhs) - to_number(rhs)),
        BinOp::Mul => num(to_number(lhs) * to_number(rhs)),
        BinOp::Div => num(to_number(lhs) / to_number(rhs)),
        BinOp::Rem => num(to_number(lhs) % to_number(rhs)),
        BinOp::Eq => Value::Bool(loose_eq(lhs, rhs)),
        BinOp::NotEq => Value::Bool(!loose_eq(lhs, rhs)),
        BinOp::Lt | BinOp::LtEq | BinOp::Gt | BinOp::GtEq => {
            let ordering = match (lhs, rhs) {
                (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                _ => to_number(lhs).partial_cmp(&to_number(rhs)),
            };
            Value::Bool(ordering.is_some_and(|o| match op {
                BinOp::Lt => o.is_lt(),
                BinOp::LtEq => o.is_le(),
                BinOp::Gt => o.is_gt(),
                _ => o.is_ge(),
            }))
        }
        BinOp::And => if truthy(lhs) { rhs.clone() } else { lhs.clone() },
        BinOp::Or => if truthy(lhs) { lhs.clone() } else { rhs.clone() },
    }
}

fn call(callee: &Expr, args: &[Expr], scope: &Scope<'_>) -> Result<Value, ScriptError> {
    let args = args
        .iter()
        .map(|arg| eval(arg, scope))
        .collect::<Result<Vec<_>, _>>()?;
    let arg = |i: usize| args.get(i).cloned().unwrap_or(Value::Null);

    match callee {
        Expr::Ident(name) if !scope.contains_key(name.as_str()) => match name.as_str() {
            "Number" => Ok(num(to_number(&arg(0)))),
            "String" => Ok(Value::String(to_display(&arg(0)))),
            _ => Err(ScriptError::runtime(format!("{name} is not a function"))),
        },
        Expr::Member(object, method) => {
            if matches!(object.as_ref(), Expr::Ident(g) if g == "JSON" && !scope.contains_key("JSON")) {
                return json_global(method, &arg(0));
            }
            let receiver = eval(object, scope)?;
            method_call(&receiver, method, &args)
        }
        _ => Err(ScriptError::runtime("expression is not callable")),
    }
}

fn json_global(method: &str, arg: &Value) -> Result<Value, ScriptError> {
    match method {
        "stringify" => Ok(Value::String(arg.to_string())),
        "parse" => {
            let text = to_display(arg);
            serde_json::from_str(&text).map_err(|e| ScriptError::runtime(format!("JSON.parse: {e}")))
        }
        _ => Err(ScriptError::runtime(format!("JSON.{method} is not a function"))),
    }
}

fn method_call(receiver: &Value, method: &str, args: &[Value]) -> Result<Value, ScriptError> {
    let arg = |i: usize| args.get(i).cloned().unwrap_or(Value::Null);
    match (receiver, method) {
        (Value::String(s), "toUpperCase") => Ok(Value::String(s.to_uppercase())),
        (Value::String(s), "toLowerCase") => Ok(Value::String(s.to_lowercase())),
        (Value::String(s), "trim") => Ok(Value::String(s.trim().to_string())),
        (Value::String(s), "split") => {
            let parts: Vec<Value> = match arg(0) {
                Value::Null => vec![Value::String(s.clone())],
                sep => {
                    let sep = to_display(&sep);
                    if sep.is_empty() {
                        s.chars().map(|c| Value::String(c.to_string())).collect()
                    } else {
                        s.split(sep.as_str()).map(|p| Value::String(p.to_string())).collect()
                    }
                }
            };
            Ok(Value::Array(parts))
        }
        (Value::String(s), "includes") => Ok(Value::Bool(s.contains(to_display(&arg(0)).as_str()))),
        (Value::String(s), "startsWith") => Ok(Value::Bool(s.starts_with(to_display(&arg(0)).as_str()))),
        (Value::String(s), "endsWith") => Ok(Value::Bool(s.ends_with(to_display(&arg(0)).as_str()))),
        (Value::String(s), "slice") => {
            let chars: Vec<char> = s.chars().collect();
            let (start, end) = slice_bounds(chars.len(), &arg(0), &arg(1));
            Ok(Value::String(chars[start..end].iter().collect()))
        }
        (Value::Array(items), "join") => {
            let sep = match arg(0) {
                Value::Null => ",".to_string(),
                sep => to_display(&sep),
            };
            Ok(Value::String(
                items.iter().map(join_element).collect::<Vec<_>>().join(&sep),
            ))
        }
        (Value::Array(items), "includes") => {
            let needle = arg(0);
            Ok(Value::Bool(items.iter().any(|item| strict_eq(item, &needle))))
        }
        (Value::Array(items), "slice") => {
            let (start, end) = slice_bounds(items.len(), &arg(0), &arg(1));
            Ok(Value::Array(items[start..end].to_vec()))
        }
        _ => Err(ScriptError::runtime(format!("{method} is not a function"))),
    }
}

/// Resolve relative `slice` bounds against a length
fn slice_bounds(len: usize, start: &Value, end: &Value) -> (usize, usize) {
    let resolve = |v: &Value, default: usize| -> usize {
        if v.is_null() {
            return default;
        }
        let n = to_number(v);
        if n.is_nan() {
            0
        } else if n < 0.0 {
            len.saturating_sub((-n) as usize)
        } else {
            (n as usize).min(len)
        }
    };
    let start = resolve(start, 0);
    let end = resolve(end, len);
    (start, end.max(start))
}

fn index(object: &Value, key: &Value) -> Result<Value, ScriptError> {
    if let Value::String(k) = key
        && k == "length"
    {
        match object {
            Value::String(s) => return Ok(Value::from(s.chars().count())),
            Value::Array(items) => return Ok(Value::from(items.len())),
            _ => {}
        }
    }
    match object {
        Value::Null => Err(ScriptError::runtime(format!(
            "cannot read properties of null (reading {})",
            to_display(key)
        ))),
        Value::Array(items) => Ok(position(key)
            .and_then(|i| items.get(i).cloned())
            .unwrap_or(Value::Null)),
        Value::String(s) => Ok(position(key)
            .and_then(|i| s.chars().nth(i))
            .map(|c| Value::String(c.to_string()))
            .unwrap_or(Value::Null)),
        Value::Object(map) => Ok(map.get(&to_display(key)).cloned().unwrap_or(Value::Null)),
        _ => Ok(Value::Null),
    }
}

fn position(key: &Value) -> Option<usize> {
    let n = to_number(key);
    (n >= 0.0 && n.fract() == 0.0).then_some(n as usize)
}

fn num(n: f64) -> Value {
    number_to_json(n).unwrap_or(Value::Null)
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn to_number(v: &Value) -> f64 {
    match v {
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() { 0.0 } else { s.parse().unwrap_or(f64::NAN) }
        }
        Value::Array(items) if items.is_empty() => 0.0,
        Value::Array(items) if items.len() == 1 => to_number(&items[0]),
        _ => f64::NAN,
    }
}

/// String conversion the way `String(v)` renders it
pub(crate) fn to_display(v: &Value) -> String {
    match v {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.as_f64().map(format_number).unwrap_or_else(|| n.to_string()),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(join_element).collect::<Vec<_>>().join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

fn join_element(v: &Value) -> String {
    if v.is_null() { String::new() } else { to_display(v) }
}

fn strict_eq(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => false,
        _ => lhs == rhs,
    }
}

fn loose_eq(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Number(_), Value::String(_))
        | (Value::String(_), Value::Number(_))
        | (Value::Bool(_), _)
        | (_, Value::Bool(_))
            if !lhs.is_null() && !rhs.is_null() =>
        {
            to_number(lhs) == to_number(rhs)
        }
        _ => strict_eq(lhs, rhs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!("")));
        assert!(!truthy(&Value::Null));
        assert!(truthy(&json!([])));
        assert!(truthy(&json!("0")));
    }

    #[test]
    fn test_to_number() {
        assert_eq!(to_number(&json!(" 42 ")), 42.0);
        assert_eq!(to_number(&json!(true)), 1.0);
        assert_eq!(to_number(&Value::Null), 0.0);
        assert!(to_number(&json!("abc")).is_nan());
        assert!(to_number(&json!({})).is_nan());
    }

    #[test]
    fn test_to_display() {
        assert_eq!(to_display(&json!(3.0)), "3");
        assert_eq!(to_display(&json!(2.5)), "2.5");
        assert_eq!(to_display(&json!([1, null, "a"])), "1,,a");
        assert_eq!(to_display(&json!({"a": 1})), "[object Object]");
    }

    #[test]
    fn test_loose_and_strict_equality() {
        assert!(loose_eq(&json!(1), &json!("1")));
        assert!(!strict_eq(&json!(1), &json!("1")));
        assert!(strict_eq(&json!(1), &json!(1.0)));
        assert!(!loose_eq(&Value::Null, &json!(false)));
    }

    #[test]
    fn test_slice_bounds() {
        assert_eq!(slice_bounds(5, &json!(1), &Value::Null), (1, 5));
        assert_eq!(slice_bounds(5, &json!(-2), &Value::Null), (3, 5));
        assert_eq!(slice_bounds(5, &json!(4), &json!(2)), (4, 4));
        assert_eq!(slice_bounds(5, &json!(0), &json!(99)), (0, 5));
    }
}
