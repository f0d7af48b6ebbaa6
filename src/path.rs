//! Writes through setter and splice paths.
//!
//! Writes copy only the containers on the written path (see
//! [`Rc::make_mut`]); every other branch of the model stays shared with the
//! previous version.

use std::rc::Rc;

use thiserror::Error;

use crate::{ast::PathSegment, ops, value::Value};

/// Errors raised while resolving a mutation path.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PathError {
    #[error("no value at {0}")]
    Missing(String),

    #[error("index {index} out of bounds for array of length {len} at {path}")]
    IndexOutOfBounds {
        path: String,
        index: usize,
        len: usize,
    },

    #[error("cannot descend into {found} at {path}")]
    NotAContainer { path: String, found: &'static str },

    #[error("splice target {path} is {found}, not an array")]
    NotAnArray { path: String, found: &'static str },

    #[error("invalid path key {0}")]
    InvalidKey(String),
}

fn describe(keys: &[Value]) -> String {
    if keys.is_empty() {
        return "the model root".to_string();
    }
    keys.iter().map(|k| format!("[{}]", k)).collect()
}

/// Fills the positional segments of `path` with `args`.
pub fn resolve(path: &[PathSegment], args: &[Value]) -> Result<Vec<Value>, PathError> {
    path.iter()
        .map(|segment| match segment {
            PathSegment::Field(name) => Ok(Value::from(name.as_str())),
            PathSegment::Index(n) => Ok(Value::from(*n)),
            PathSegment::Arg(i) => match args.get(*i) {
                Some(key @ (Value::String(_) | Value::Integer(_))) => Ok(key.clone()),
                Some(key @ Value::Float(_)) if key.as_int().is_some() => Ok(key.clone()),
                Some(other) => Err(PathError::InvalidKey(format!(
                    "{} (argument {} must be a string or an integer)",
                    other, i
                ))),
                None => Err(PathError::InvalidKey(format!("missing argument {}", i))),
            },
        })
        .collect()
}

fn field_name(key: &Value) -> Result<String, PathError> {
    ops::property_key(key).map_err(|_| PathError::InvalidKey(key.to_string()))
}

fn array_index(key: &Value) -> Result<usize, PathError> {
    ops::array_index(key)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| PathError::InvalidKey(format!("{} is not an array index", key)))
}

/// Walks `keys` from `root`, copying each container on the way.
fn descend<'a>(root: &'a mut Value, keys: &[Value]) -> Result<&'a mut Value, PathError> {
    let mut current = root;
    for (depth, key) in keys.iter().enumerate() {
        let at = || describe(&keys[..=depth]);
        current = match current {
            Value::Object(map) => {
                let field = field_name(key)?;
                Rc::make_mut(map)
                    .get_mut(&field)
                    .ok_or_else(|| PathError::Missing(at()))?
            }
            Value::Array(items) => {
                let index = array_index(key)?;
                let len = items.len();
                Rc::make_mut(items)
                    .get_mut(index)
                    .ok_or_else(|| PathError::IndexOutOfBounds {
                        path: at(),
                        index,
                        len,
                    })?
            }
            other => {
                return Err(PathError::NotAContainer {
                    path: describe(&keys[..depth]),
                    found: other.type_name(),
                });
            }
        };
    }
    Ok(current)
}

/// Writes `value` at `keys`.
///
/// A missing object field is created and index `len` of an array appends;
/// every intermediate location must already exist. An empty path replaces
/// the whole model.
pub fn set(root: &mut Value, keys: &[Value], value: Value) -> Result<(), PathError> {
    let Some((last, parents)) = keys.split_last() else {
        *root = value;
        return Ok(());
    };
    match descend(root, parents)? {
        Value::Object(map) => {
            let field = field_name(last)?;
            Rc::make_mut(map).insert(field, value);
            Ok(())
        }
        Value::Array(items) => {
            let index = array_index(last)?;
            let len = items.len();
            let items = Rc::make_mut(items);
            if index < len {
                items[index] = value;
            } else if index == len {
                items.push(value);
            } else {
                return Err(PathError::IndexOutOfBounds {
                    path: describe(keys),
                    index,
                    len,
                });
            }
            Ok(())
        }
        other => Err(PathError::NotAContainer {
            path: describe(parents),
            found: other.type_name(),
        }),
    }
}

/// Array splice at `keys`: removes `delete_count` elements from `start` and
/// inserts `items` there.
///
/// A negative `start` counts from the end. Both bounds are clamped to the
/// array.
pub fn splice(
    root: &mut Value,
    keys: &[Value],
    start: i64,
    delete_count: usize,
    items: Vec<Value>,
) -> Result<(), PathError> {
    match descend(root, keys)? {
        Value::Array(array) => {
            let len = array.len() as i64;
            let from = if start < 0 {
                (len + start).max(0)
            } else {
                start.min(len)
            } as usize;
            let to = from + delete_count.min(array.len() - from);
            Rc::make_mut(array).splice(from..to, items);
            Ok(())
        }
        other => Err(PathError::NotAnArray {
            path: describe(keys),
            found: other.type_name(),
        }),
    }
}
