//! Deep merge of partial updates into a plain lot tree.

use serde_json::Value;

/// Merge `data` into `src`. Returns `None` if the result equals `src`.
///
/// Objects merge key by key, keeping keys `data` does not mention. Arrays
/// merge element by element and take the length of the array in `data`.
/// Anything else in `data`, `null` included, replaces the value in `src`.
pub fn apply_data_patch(src: &Value, data: &Value) -> Option<Value> {
    let merged = merge(src, data);
    (merged != *src).then_some(merged)
}

fn merge(src: &Value, data: &Value) -> Value {
    match (src, data) {
        (Value::Object(s), Value::Object(d)) => {
            let mut out = s.clone();
            for (key, value) in d {
                let merged = match s.get(key) {
                    Some(existing) => merge(existing, value),
                    None => value.clone(),
                };
                out.insert(key.clone(), merged);
            }
            Value::Object(out)
        }
        (Value::Array(s), Value::Array(d)) => Value::Array(
            d.iter()
                .enumerate()
                .map(|(i, value)| match s.get(i) {
                    Some(existing) => merge(existing, value),
                    None => value.clone(),
                })
                .collect(),
        ),
        _ => data.clone(),
    }
}
