//! Verb semantics over values.
//!
//! Every backend evaluates verbs through these functions. Collection verbs
//! take the per-element callback as a closure so each backend decides how an
//! element is bound and memoised.

use std::rc::Rc;

use rust_decimal::{Decimal, prelude::FromPrimitive, prelude::ToPrimitive};
use thiserror::Error;

use crate::{
    ast::{BinOp, Collection, UnaryOp},
    value::{Map, Value},
};

/// Errors raised while evaluating a verb.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// Type mismatch or invalid operation for the given type
    #[error("type error: {0}")]
    TypeError(String),

    /// Integer division or modulo by zero
    #[error("division by zero")]
    DivisionByZero,

    /// `call` target missing from the function library
    #[error("unknown function `{0}`")]
    UnknownFunction(String),

    /// Well-typed operand with an unusable value
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

fn type_error(verb: &str, expected: &str, found: &Value) -> EvalError {
    EvalError::TypeError(format!(
        "{} expects {}, got {}",
        verb,
        expected,
        found.type_name()
    ))
}

// ========================================
// Access
// ========================================

/// Object field name for a key, as used by `get`, `keyBy`, `mapKeys` and
/// `groupBy`. Containers cannot be keys.
pub fn property_key(key: &Value) -> Result<String, EvalError> {
    match key {
        Value::String(s) => Ok(s.to_string()),
        Value::Null => Ok("null".to_string()),
        Value::Boolean(b) => Ok(b.to_string()),
        Value::Integer(n) => Ok(n.to_string()),
        Value::Float(_) => match key.as_int() {
            Some(n) => Ok(n.to_string()),
            None => Ok(key.to_string()),
        },
        Value::Array(_) | Value::Object(_) => Err(EvalError::TypeError(format!(
            "cannot use {} as an object key",
            key.type_name()
        ))),
    }
}

/// Array position for a key: whole numbers or numeric strings.
pub fn array_index(key: &Value) -> Option<i64> {
    match key {
        Value::String(s) => s.parse().ok(),
        _ => key.as_int(),
    }
}

/// `get`: field or index access.
///
/// `null` receivers and missing keys yield `null`; scalar receivers fail.
pub fn get(object: &Value, key: &Value) -> Result<Value, EvalError> {
    match object {
        Value::Null => Ok(Value::Null),
        Value::Object(map) => {
            let field = property_key(key)?;
            Ok(map.get(&field).cloned().unwrap_or_default())
        }
        Value::Array(items) => {
            if matches!(key, Value::Array(_) | Value::Object(_)) {
                return Err(EvalError::TypeError(format!(
                    "cannot index an array with {}",
                    key.type_name()
                )));
            }
            let item = array_index(key)
                .and_then(|n| usize::try_from(n).ok())
                .and_then(|n| items.get(n));
            Ok(item.cloned().unwrap_or_default())
        }
        v => Err(EvalError::TypeError(format!(
            "cannot access {} with {} key",
            v.type_name(),
            key.type_name()
        ))),
    }
}

// ========================================
// Collection verbs
// ========================================

fn require_array<'a>(verb: Collection, source: &'a Value) -> Result<&'a [Value], EvalError> {
    source
        .as_array()
        .ok_or_else(|| type_error(verb.token().name(), "an array", source))
}

fn require_object<'a>(verb: Collection, source: &'a Value) -> Result<&'a Map, EvalError> {
    source
        .as_object()
        .ok_or_else(|| type_error(verb.token().name(), "an object", source))
}

/// Applies a collection verb, calling `body(key, element)` per element in
/// order. `any` and `anyValues` stop at the first truthy result.
pub fn iterate<F>(verb: Collection, source: &Value, mut body: F) -> Result<Value, EvalError>
where
    F: FnMut(&Value, &Value) -> Result<Value, EvalError>,
{
    match verb {
        Collection::Map => {
            let items = require_array(verb, source)?;
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                out.push(body(&Value::from(i), item)?);
            }
            Ok(Value::array(out))
        }
        Collection::Filter => {
            let items = require_array(verb, source)?;
            let mut out = Vec::new();
            for (i, item) in items.iter().enumerate() {
                if body(&Value::from(i), item)?.is_truthy() {
                    out.push(item.clone());
                }
            }
            Ok(Value::array(out))
        }
        Collection::Any => {
            let items = require_array(verb, source)?;
            for (i, item) in items.iter().enumerate() {
                if body(&Value::from(i), item)?.is_truthy() {
                    return Ok(Value::Boolean(true));
                }
            }
            Ok(Value::Boolean(false))
        }
        Collection::KeyBy => {
            let items = require_array(verb, source)?;
            let mut out = Map::new();
            for (i, item) in items.iter().enumerate() {
                let key = property_key(&body(&Value::from(i), item)?)?;
                out.insert(key, item.clone());
            }
            Ok(Value::object(out))
        }
        Collection::MapValues => {
            let map = require_object(verb, source)?;
            let mut out = Map::new();
            for (k, v) in map.iter() {
                out.insert(k.clone(), body(&Value::from(k.as_str()), v)?);
            }
            Ok(Value::object(out))
        }
        Collection::MapKeys => {
            let map = require_object(verb, source)?;
            let mut out = Map::new();
            for (k, v) in map.iter() {
                let key = property_key(&body(&Value::from(k.as_str()), v)?)?;
                out.insert(key, v.clone());
            }
            Ok(Value::object(out))
        }
        Collection::GroupBy => match source {
            Value::Array(items) => {
                let mut groups: std::collections::BTreeMap<String, Vec<Value>> =
                    Default::default();
                for (i, item) in items.iter().enumerate() {
                    let key = property_key(&body(&Value::from(i), item)?)?;
                    groups.entry(key).or_default().push(item.clone());
                }
                Ok(Value::object(
                    groups
                        .into_iter()
                        .map(|(k, v)| (k, Value::array(v)))
                        .collect(),
                ))
            }
            Value::Object(map) => {
                let mut groups: std::collections::BTreeMap<String, Map> = Default::default();
                for (k, v) in map.iter() {
                    let key = property_key(&body(&Value::from(k.as_str()), v)?)?;
                    groups.entry(key).or_default().insert(k.clone(), v.clone());
                }
                Ok(Value::object(
                    groups
                        .into_iter()
                        .map(|(k, v)| (k, Value::object(v)))
                        .collect(),
                ))
            }
            v => Err(type_error("groupBy", "an array or object", v)),
        },
        Collection::FilterBy => {
            let map = require_object(verb, source)?;
            let mut out = Map::new();
            for (k, v) in map.iter() {
                if body(&Value::from(k.as_str()), v)?.is_truthy() {
                    out.insert(k.clone(), v.clone());
                }
            }
            Ok(Value::object(out))
        }
        Collection::AnyValues => {
            let map = require_object(verb, source)?;
            for (k, v) in map.iter() {
                if body(&Value::from(k.as_str()), v)?.is_truthy() {
                    return Ok(Value::Boolean(true));
                }
            }
            Ok(Value::Boolean(false))
        }
    }
}

// ========================================
// Container verbs
// ========================================

fn merge(source: &Value, earlier_wins: bool) -> Result<Value, EvalError> {
    let verb = if earlier_wins { "defaults" } else { "assign" };
    let items = source
        .as_array()
        .ok_or_else(|| type_error(verb, "an array of objects", source))?;
    let mut out: Option<Rc<Map>> = None;
    for item in items {
        let map = match item {
            Value::Null => continue,
            Value::Object(map) => map,
            v => return Err(type_error(verb, "an array of objects", v)),
        };
        match &mut out {
            None => out = Some(map.clone()),
            Some(acc) => {
                let acc = Rc::make_mut(acc);
                for (k, v) in map.iter() {
                    if earlier_wins {
                        acc.entry(k.clone()).or_insert_with(|| v.clone());
                    } else {
                        acc.insert(k.clone(), v.clone());
                    }
                }
            }
        }
    }
    Ok(out.map(Value::Object).unwrap_or_else(Value::empty_object))
}

pub fn unary(op: UnaryOp, operand: &Value) -> Result<Value, EvalError> {
    match op {
        UnaryOp::Not => Ok(Value::Boolean(!operand.is_truthy())),
        UnaryOp::Values => match operand {
            Value::Object(map) => Ok(Value::array(map.values().cloned().collect())),
            Value::Array(_) => Ok(operand.clone()),
            Value::Null => Ok(Value::empty_array()),
            v => Err(type_error("values", "an object", v)),
        },
        UnaryOp::Keys => match operand {
            Value::Object(map) => Ok(Value::array(
                map.keys().map(|k| Value::from(k.as_str())).collect(),
            )),
            Value::Array(items) => Ok(Value::array((0..items.len()).map(Value::from).collect())),
            Value::Null => Ok(Value::empty_array()),
            v => Err(type_error("keys", "an object", v)),
        },
        UnaryOp::Assign => merge(operand, false),
        UnaryOp::Defaults => merge(operand, true),
        UnaryOp::Size => match operand {
            Value::Array(items) => Ok(Value::from(items.len())),
            Value::Object(map) => Ok(Value::from(map.len())),
            Value::String(s) => Ok(Value::from(s.chars().count())),
            Value::Null => Ok(Value::Integer(0)),
            v => Err(type_error("size", "a collection", v)),
        },
    }
}

/// Longest sequence `range` will build.
const RANGE_LIMIT: usize = 1 << 24;

fn range_len(count: f64) -> Result<usize, EvalError> {
    if !count.is_finite() || count > RANGE_LIMIT as f64 {
        return Err(EvalError::InvalidArgument(format!(
            "range of {} elements exceeds the limit of {}",
            count, RANGE_LIMIT
        )));
    }
    Ok(count.max(0.0) as usize)
}

/// `range`: `[start, start + step, ...)` stopping before `end`.
pub fn range(end: &Value, start: &Value, step: &Value) -> Result<Value, EvalError> {
    if let (Some(end), Some(start), Some(step)) = (end.as_int(), start.as_int(), step.as_int()) {
        if step == 0 {
            return Err(EvalError::InvalidArgument("range step cannot be 0".to_string()));
        }
        let (end, start, step) = (end as i128, start as i128, step as i128);
        let span = end - start;
        let count = if (span > 0) == (step > 0) && span != 0 {
            (span.abs() + step.abs() - 1) / step.abs()
        } else {
            0
        };
        let count = range_len(count as f64)?;
        // every element lies between start and end, so it fits in i64
        let out = (0..count as i128)
            .map(|i| Value::Integer((start + i * step) as i64))
            .collect();
        return Ok(Value::array(out));
    }

    let number = |v: &Value| v.as_float().ok_or_else(|| type_error("range", "numbers", v));
    let (end, start, step) = (number(end)?, number(start)?, number(step)?);
    if step == 0.0 || !step.is_finite() {
        return Err(EvalError::InvalidArgument(format!("invalid range step {}", step)));
    }
    if start.is_nan() || end.is_nan() {
        return Ok(Value::empty_array());
    }
    let count = range_len(((end - start) / step).ceil())?;
    let out = (0..count)
        .map(|i| Value::Float(start + i as f64 * step))
        .collect();
    Ok(Value::array(out))
}

// ========================================
// Scalars
// ========================================

fn decimal_op(op: BinOp, a: Decimal, b: Decimal) -> Option<Decimal> {
    match op {
        BinOp::Add => a.checked_add(b),
        BinOp::Subtract => a.checked_sub(b),
        BinOp::Multiply => a.checked_mul(b),
        BinOp::Divide => a.checked_div(b),
        BinOp::Modulo => a.checked_rem(b),
        _ => None,
    }
}

fn float_op(op: BinOp, a: f64, b: f64) -> f64 {
    match op {
        BinOp::Add => a + b,
        BinOp::Subtract => a - b,
        BinOp::Multiply => a * b,
        BinOp::Divide => a / b,
        _ => a % b,
    }
}

fn integer_op(op: BinOp, a: i64, b: i64) -> Result<Value, EvalError> {
    let exact = match op {
        BinOp::Add => a.checked_add(b),
        BinOp::Subtract => a.checked_sub(b),
        BinOp::Multiply => a.checked_mul(b),
        BinOp::Divide => {
            if b == 0 {
                return Err(EvalError::DivisionByZero);
            }
            // inexact or overflowing quotients fall through to floats
            match a.checked_rem(b) {
                Some(0) => a.checked_div(b),
                _ => None,
            }
        }
        _ => {
            if b == 0 {
                return Err(EvalError::DivisionByZero);
            }
            // only `MIN % -1` overflows, and its remainder is 0
            Some(a.wrapping_rem(b))
        }
    };
    Ok(match exact {
        Some(n) => Value::Integer(n),
        None => Value::Float(float_op(op, a as f64, b as f64)),
    })
}

/// Mixed integer and float operands go through exact decimal arithmetic,
/// so `0.1 + 2` is `2.1` and `2.5 * 2` is the integer `5`.
fn mixed_op(op: BinOp, a: f64, b: f64, da: Option<Decimal>, db: Option<Decimal>) -> Value {
    if let Some(ad) = da
        && let Some(bd) = db
        && let Some(rd) = decimal_op(op, ad, bd)
    {
        if rd.is_integer()
            && let Some(r) = rd.to_i64()
        {
            return Value::Integer(r);
        } else if let Some(r) = rd.to_f64() {
            return Value::Float(r);
        }
    }
    Value::Float(float_op(op, a, b))
}

fn arithmetic(op: BinOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => integer_op(op, *a, *b),
        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(float_op(op, *a, *b))),
        (Value::Integer(a), Value::Float(b)) => Ok(mixed_op(
            op,
            *a as f64,
            *b,
            Decimal::from_i64(*a),
            Decimal::from_f64(*b),
        )),
        (Value::Float(a), Value::Integer(b)) => Ok(mixed_op(
            op,
            *a,
            *b as f64,
            Decimal::from_f64(*a),
            Decimal::from_i64(*b),
        )),
        (Value::String(a), Value::String(b)) if op == BinOp::Add => {
            Ok(Value::from(format!("{}{}", a, b)))
        }
        (a, b) => Err(EvalError::TypeError(format!(
            "cannot apply `{}` to {} and {}",
            op.token(),
            a.type_name(),
            b.type_name()
        ))),
    }
}

fn compare(op: BinOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    use std::cmp::Ordering;

    let ordering = match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => match (left.as_float(), right.as_float()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => {
                return Err(EvalError::TypeError(format!(
                    "cannot compare {} with {} using `{}`",
                    left.type_name(),
                    right.type_name(),
                    op.token()
                )));
            }
        },
    };
    // NaN compares false against everything
    let result = match (op, ordering) {
        (_, None) => false,
        (BinOp::GreaterThan, Some(o)) => o == Ordering::Greater,
        (BinOp::LessThan, Some(o)) => o == Ordering::Less,
        (BinOp::GreaterEqual, Some(o)) => o != Ordering::Less,
        (BinOp::LessEqual, Some(o)) => o != Ordering::Greater,
        _ => false,
    };
    Ok(Value::Boolean(result))
}

pub fn binary(op: BinOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    match op {
        BinOp::Equal => Ok(Value::Boolean(left == right)),
        BinOp::GreaterThan | BinOp::LessThan | BinOp::GreaterEqual | BinOp::LessEqual => {
            compare(op, left, right)
        }
        BinOp::Add | BinOp::Subtract | BinOp::Multiply | BinOp::Divide | BinOp::Modulo => {
            arithmetic(op, left, right)
        }
    }
}
