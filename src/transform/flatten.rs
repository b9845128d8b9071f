//! Flattening of nested API records
//!
//! Nested objects are collapsed into `_`-joined keys (`publisher_metadata` →
//! `publisher_metadata_isrc`). Arrays are never descended into: the first time
//! the recursion meets one it is serialized to JSON text under the current key.

use super::coerce::json_text;
use serde_json::{Map, Value};

/// Flattens a raw record into a single-level map
///
/// # Examples
///
/// ```
/// use harvester::transform::flatten;
/// use serde_json::json;
///
/// let flat = flatten(&json!({"id": 1, "pm": {"isrc": "X"}, "tags": ["a"]}));
/// assert_eq!(flat["pm_isrc"], json!("X"));
/// assert_eq!(flat["tags"], json!("[\"a\"]"));
/// ```
pub fn flatten(record: &Value) -> Map<String, Value> {
    let mut out = Map::new();
    flatten_into(record, "", &mut out);
    out
}

fn flatten_into(value: &Value, prefix: &str, out: &mut Map<String, Value>) {
    match value {
        Value::Object(fields) => {
            for (key, child) in fields {
                let joined = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}_{}", prefix, key)
                };
                flatten_into(child, &joined, out);
            }
        }
        Value::Array(_) => {
            out.insert(prefix.to_string(), Value::String(json_text(value)));
        }
        scalar => {
            out.insert(prefix.to_string(), scalar.clone());
        }
    }
}
