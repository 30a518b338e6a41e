//! Path expressions over untyped JSON trees.
//!
//! The path language is dot-separated keys with `name[index]` for array
//! access (e.g. `columns[0].label`, `indexes[1]`), backed by a single
//! regex. A path that does not match this shape refers to the root-level
//! key spelled exactly as written.
//!
//! `set` allocates intermediate maps but refuses to grow arrays; `delete`
//! treats missing paths as a no-op but rejects out-of-range array indices.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// One step of a parsed path expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    /// A named key for accessing map members
    Key(String),
    /// A numeric index for accessing array elements
    Index(usize),
}

fn indexed_key() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z0-9_-]+)\[([0-9]+)\]$").unwrap())
}

/// Parse a path string into segments.
///
/// `columns[0].label` becomes `[Key(columns), Index(0), Key(label)]`. A
/// path outside the grammar collapses to a single root-level key.
pub fn parse(path: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    for part in path.split('.') {
        if let Some(caps) = indexed_key().captures(part) {
            segments.push(Segment::Key(caps[1].to_string()));
            match caps[2].parse::<usize>() {
                Ok(idx) => segments.push(Segment::Index(idx)),
                Err(_) => return vec![Segment::Key(path.to_string())],
            }
        } else if !part.is_empty()
            && part
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            segments.push(Segment::Key(part.to_string()));
        } else {
            return vec![Segment::Key(path.to_string())];
        }
    }
    segments
}

/// Look up a value by path. Returns `None` when any step is missing or of
/// the wrong kind.
pub fn get<'a>(tree: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = tree;
    for segment in parse(path) {
        current = match segment {
            Segment::Key(key) => current.as_object()?.get(&key)?,
            Segment::Index(idx) => current.as_array()?.get(idx)?,
        };
    }
    Some(current)
}

/// Mutable lookup, same semantics as [`get`].
pub fn get_mut<'a>(tree: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let mut current = tree;
    for segment in parse(path) {
        current = match segment {
            Segment::Key(key) => current.as_object_mut()?.get_mut(&key)?,
            Segment::Index(idx) => current.as_array_mut()?.get_mut(idx)?,
        };
    }
    Some(current)
}

/// Set a value at a path. Missing intermediate map nodes are created;
/// a missing array index is fatal (arrays are never grown).
pub fn set(tree: &mut Value, path: &str, value: Value) -> Result<()> {
    let segments = parse(path);
    let (last, parents) = match segments.split_last() {
        Some(split) => split,
        None => return Ok(()),
    };

    let mut current = tree;
    for segment in parents {
        current = match segment {
            Segment::Key(key) => enter_map(current, path, key)?
                .entry(key.clone())
                .or_insert_with(|| Value::Object(Map::new())),
            Segment::Index(idx) => enter_array(current, path, *idx)?,
        };
    }

    match last {
        Segment::Key(key) => {
            enter_map(current, path, key)?.insert(key.clone(), value);
        }
        Segment::Index(idx) => {
            let array = match current {
                Value::Array(array) => array,
                _ => {
                    return Err(Error::shape(
                        path,
                        format!("expected an array at index {}", idx),
                    ))
                }
            };
            if *idx >= array.len() {
                return Err(Error::shape(
                    path,
                    format!("array index {} out of range (len {})", idx, array.len()),
                ));
            }
            array[*idx] = value;
        }
    }
    Ok(())
}

/// Remove a value at a path. A missing path is a no-op; an out-of-range
/// index into an existing array is an error. Removing an array element
/// shifts subsequent indices down.
pub fn delete(tree: &mut Value, path: &str) -> Result<()> {
    let segments = parse(path);
    let (last, parents) = match segments.split_last() {
        Some(split) => split,
        None => return Ok(()),
    };

    let mut current = tree;
    for segment in parents {
        let next = match segment {
            Segment::Key(key) => match current {
                Value::Object(map) => map.get_mut(key),
                _ => None,
            },
            Segment::Index(idx) => match current {
                Value::Array(array) => array.get_mut(*idx),
                _ => None,
            },
        };
        current = match next {
            Some(next) => next,
            None => return Ok(()),
        };
    }

    match last {
        Segment::Key(key) => {
            if let Value::Object(map) = current {
                map.remove(key);
            }
            Ok(())
        }
        Segment::Index(idx) => match current {
            Value::Array(array) => {
                if *idx >= array.len() {
                    return Err(Error::shape(
                        path,
                        format!("array index {} out of range (len {})", idx, array.len()),
                    ));
                }
                array.remove(*idx);
                Ok(())
            }
            _ => Ok(()),
        },
    }
}

fn enter_map<'a>(
    current: &'a mut Value,
    path: &str,
    key: &str,
) -> Result<&'a mut Map<String, Value>> {
    if current.is_null() {
        *current = Value::Object(Map::new());
    }
    match current {
        Value::Object(map) => Ok(map),
        _ => Err(Error::shape(path, format!("expected a map at '{}'", key))),
    }
}

fn enter_array<'a>(current: &'a mut Value, path: &str, idx: usize) -> Result<&'a mut Value> {
    let array = match current {
        Value::Array(array) => array,
        _ => {
            return Err(Error::shape(
                path,
                format!("expected an array at index {}", idx),
            ))
        }
    };
    if idx >= array.len() {
        return Err(Error::shape(
            path,
            format!("array index {} out of range (len {})", idx, array.len()),
        ));
    }
    Ok(&mut array[idx])
}
