//! Structural diffs between plain lot trees, as ordered JSON-patch style
//! change lists.
//!
//! `diff(src, dst)` produces the operations that turn `src` into `dst`;
//! `apply` replays them. Operation order is significant and preserved:
//! within an array, trailing removals are emitted from the highest index
//! down so that each path is valid at the moment it is applied.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::pointer::{array_index, escape, step_mut, Pointer, PointerError};

/// The kind of a single change operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    Add,
    Remove,
    Replace,
}

/// One change: `{"op": .., "path": .., "value": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeOp {
    pub op: Op,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl ChangeOp {
    pub fn add(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: Op::Add,
            path: path.into(),
            value: Some(value),
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            op: Op::Remove,
            path: path.into(),
            value: None,
        }
    }

    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: Op::Replace,
            path: path.into(),
            value: Some(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    #[error(transparent)]
    Pointer(#[from] PointerError),
    #[error("cannot apply {op:?} at '{path}': parent does not exist")]
    MissingParent { op: Op, path: String },
    #[error("cannot apply {op:?} at '{path}': target does not exist")]
    MissingTarget { op: Op, path: String },
    #[error("cannot apply {op:?} at '{path}': operation requires a value")]
    MissingValue { op: Op, path: String },
    #[error("cannot apply {op:?} at '{path}': the root cannot be removed")]
    RemoveRoot { op: Op, path: String },
}

/// Compute the ordered change list that turns `src` into `dst`.
pub fn diff(src: &Value, dst: &Value) -> Vec<ChangeOp> {
    let mut ops = Vec::new();
    diff_into(&mut ops, "", src, dst);
    ops
}

fn diff_into(ops: &mut Vec<ChangeOp>, path: &str, src: &Value, dst: &Value) {
    match (src, dst) {
        (Value::Object(a), Value::Object(b)) => diff_objects(ops, path, a, b),
        (Value::Array(a), Value::Array(b)) => diff_arrays(ops, path, a, b),
        _ if src == dst => {}
        _ => ops.push(ChangeOp::replace(path, dst.clone())),
    }
}

fn diff_objects(ops: &mut Vec<ChangeOp>, path: &str, a: &Map<String, Value>, b: &Map<String, Value>) {
    for key in a.keys().filter(|k| !b.contains_key(*k)) {
        ops.push(ChangeOp::remove(format!("{path}/{}", escape(key))));
    }
    for (key, old) in a {
        if let Some(new) = b.get(key) {
            diff_into(ops, &format!("{path}/{}", escape(key)), old, new);
        }
    }
    for (key, new) in b.iter().filter(|(k, _)| !a.contains_key(*k)) {
        ops.push(ChangeOp::add(format!("{path}/{}", escape(key)), new.clone()));
    }
}

fn diff_arrays(ops: &mut Vec<ChangeOp>, path: &str, a: &[Value], b: &[Value]) {
    let common = a.len().min(b.len());
    for i in 0..common {
        diff_into(ops, &format!("{path}/{i}"), &a[i], &b[i]);
    }
    for i in (common..a.len()).rev() {
        ops.push(ChangeOp::remove(format!("{path}/{i}")));
    }
    for (i, new) in b.iter().enumerate().skip(common) {
        ops.push(ChangeOp::add(format!("{path}/{i}"), new.clone()));
    }
}

/// Apply `ops` to `target` in order. On error `target` may be partially
/// patched; apply to a clone when atomicity matters.
pub fn apply(target: &mut Value, ops: &[ChangeOp]) -> Result<(), PatchError> {
    for op in ops {
        apply_one(target, op)?;
    }
    Ok(())
}

fn apply_one(target: &mut Value, change: &ChangeOp) -> Result<(), PatchError> {
    let pointer = Pointer::parse(&change.path)?;
    let op = change.op;
    let path = || change.path.clone();
    let value = || {
        change
            .value
            .clone()
            .ok_or_else(|| PatchError::MissingValue { op, path: path() })
    };

    let Some(parent_ptr) = pointer.parent() else {
        return match op {
            Op::Remove => Err(PatchError::RemoveRoot { op, path: path() }),
            Op::Add | Op::Replace => {
                *target = value()?;
                Ok(())
            }
        };
    };
    let key = pointer.last().unwrap_or_default();

    let mut parent = target;
    for t in parent_ptr.tokens() {
        parent = step_mut(parent, t).ok_or_else(|| PatchError::MissingParent { op, path: path() })?;
    }

    match parent {
        Value::Object(map) => match op {
            Op::Add => {
                map.insert(key.to_string(), value()?);
            }
            Op::Replace => {
                let slot = map
                    .get_mut(key)
                    .ok_or_else(|| PatchError::MissingTarget { op, path: path() })?;
                *slot = value()?;
            }
            Op::Remove => {
                map.remove(key)
                    .ok_or_else(|| PatchError::MissingTarget { op, path: path() })?;
            }
        },
        Value::Array(items) => {
            if op == Op::Add && key == "-" {
                items.push(value()?);
                return Ok(());
            }
            let idx = array_index(key).ok_or_else(|| PatchError::MissingTarget { op, path: path() })?;
            match op {
                Op::Add if idx <= items.len() => items.insert(idx, value()?),
                Op::Replace if idx < items.len() => items[idx] = value()?,
                Op::Remove if idx < items.len() => {
                    items.remove(idx);
                }
                _ => return Err(PatchError::MissingTarget { op, path: path() }),
            }
        }
        _ => return Err(PatchError::MissingParent { op, path: path() }),
    }
    Ok(())
}
