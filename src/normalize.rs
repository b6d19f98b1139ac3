//! Turns the editor's raw block export into [`BlockInstance`] trees.
//!
//! The raw form keeps values under per-socket `inputs` wrappers and nests the
//! successor under `next.block`. Normalizing flattens every socket's `fields`
//! into one map and links `next`/`body` directly. It is total: missing or
//! oddly shaped parts degrade to empty values instead of failing.

use crate::program::BlockInstance;
use serde_json::{Map, Value};

/// Socket that holds the enclosed chain of a loop-like block.
pub const BODY_SOCKET: &str = "DO";

/// Keys consumed by normalization; `inputs` is fully folded into `fields`/`body`.
const MODEL_KEYS: [&str; 6] = ["id", "type", "fields", "inputs", "next", "body"];

pub fn normalize(raw: &Value) -> BlockInstance {
    let id = raw
        .get("id")
        .map(value_as_key)
        .unwrap_or_default();
    let type_id = raw
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();

    let mut fields = raw
        .get("fields")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let mut body = None;
    if let Some(inputs) = raw.get("inputs").and_then(Value::as_object) {
        for (socket, input) in inputs {
            if let Some(socket_fields) = input.get("fields").and_then(Value::as_object) {
                for (name, value) in socket_fields {
                    fields.insert(name.clone(), value.clone());
                }
            }
            if socket.eq_ignore_ascii_case(BODY_SOCKET) {
                if let Some(inner) = input.get("block").filter(|b| b.is_object()) {
                    body = Some(Box::new(normalize(inner)));
                }
            }
        }
    }

    let next = raw
        .get("next")
        .and_then(|next| next.get("block"))
        .filter(|b| b.is_object())
        .map(|b| Box::new(normalize(b)));

    let extra = raw
        .as_object()
        .map(|obj| {
            obj.iter()
                .filter(|(key, _)| !MODEL_KEYS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect::<Map<String, Value>>()
        })
        .unwrap_or_default();

    BlockInstance {
        id,
        type_id,
        fields,
        next,
        body,
        extra,
    }
}

/// Normalizes every top-level node of an exported program, in order.
pub fn normalize_program(raw_blocks: &[Value]) -> Vec<BlockInstance> {
    raw_blocks.iter().map(normalize).collect()
}

fn value_as_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
