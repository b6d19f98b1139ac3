use crate::blocks::WHEN_FLAG_CLICKED;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// One normalized block. `next` and `body` own their successors, so a chain
/// can never share a block between two predecessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockInstance {
    pub id: String,
    #[serde(rename = "type")]
    pub type_id: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<Box<BlockInstance>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Box<BlockInstance>>,
    /// Top-level keys of the raw node that are not part of the block model
    /// (editor coordinates and the like), kept verbatim.
    #[serde(default, flatten)]
    pub extra: Map<String, Value>,
}

impl BlockInstance {
    pub fn new(id: impl Into<String>, type_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_id: type_id.into(),
            fields: Map::new(),
            next: None,
            body: None,
            extra: Map::new(),
        }
    }

    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn with_next(mut self, next: BlockInstance) -> Self {
        self.next = Some(Box::new(next));
        self
    }

    pub fn next_block(&self) -> Option<&BlockInstance> {
        self.next.as_deref()
    }

    pub fn number_field(&self, name: &str) -> f64 {
        number_field(&self.fields, name)
    }

    pub fn text_field(&self, name: &str) -> String {
        text_field(&self.fields, name)
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Iterates this block and every successor reachable through `next`.
    pub fn chain(&self) -> ChainIter<'_> {
        ChainIter {
            current: Some(self),
        }
    }

    pub fn chain_len(&self) -> usize {
        self.chain().count()
    }

    /// Copy of this block alone, with the successor link cut.
    pub fn detached(&self) -> BlockInstance {
        BlockInstance {
            id: self.id.clone(),
            type_id: self.type_id.clone(),
            fields: self.fields.clone(),
            next: None,
            body: self.body.clone(),
            extra: self.extra.clone(),
        }
    }
}

pub struct ChainIter<'a> {
    current: Option<&'a BlockInstance>,
}

impl<'a> Iterator for ChainIter<'a> {
    type Item = &'a BlockInstance;

    fn next(&mut self) -> Option<Self::Item> {
        let block = self.current?;
        self.current = block.next_block();
        Some(block)
    }
}

/// Reads a field as a number the way the editor's loosely typed values
/// behave: absent or non-numeric values become NaN, blank strings and null
/// become zero, booleans become 0/1.
pub fn number_field(fields: &Map<String, Value>, name: &str) -> f64 {
    match fields.get(name) {
        None => f64::NAN,
        Some(value) => coerce_number(value),
    }
}

pub fn coerce_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(flag) => f64::from(u8::from(*flag)),
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse::<f64>().unwrap_or(f64::NAN)
            }
        }
        Value::Array(_) | Value::Object(_) => f64::NAN,
    }
}

/// Editor truthiness: null, false, zero, NaN and the empty string are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().map(|n| n != 0.0 && !n.is_nan()).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

pub fn text_field(fields: &Map<String, Value>, name: &str) -> String {
    match fields.get(name) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Chain heads of a sprite's program that no other block in the collection
/// names as its `next`.
pub fn top_level_blocks(blocks: &[BlockInstance]) -> Vec<&BlockInstance> {
    let referenced = blocks
        .iter()
        .filter_map(|block| block.next_block())
        .map(|next| next.id.as_str())
        .collect::<HashSet<_>>();
    blocks
        .iter()
        .filter(|block| !referenced.contains(block.id.as_str()))
        .collect()
}

/// Entry points for a manual run: every flag hat in the program.
pub fn flag_entries(blocks: &[BlockInstance]) -> Vec<&BlockInstance> {
    blocks
        .iter()
        .filter(|block| block.type_id == WHEN_FLAG_CLICKED)
        .collect()
}

/// Pulls the block list out of an editor export. Accepts a bare array or the
/// workspace envelope `{"blocks": {"blocks": [...]}}`; anything else is an
/// empty program.
pub fn workspace_blocks(export: &Value) -> Vec<Value> {
    if let Some(arr) = export.as_array() {
        return arr.clone();
    }
    export
        .get("blocks")
        .and_then(|blocks| blocks.get("blocks"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn number_field_coerces_like_the_editor() {
        let fields = json!({
            "a": 5,
            "b": " 2.5 ",
            "c": "",
            "d": "abc",
            "e": null,
            "f": true,
            "g": [1],
        });
        let fields = fields.as_object().expect("object").clone();
        assert_eq!(number_field(&fields, "a"), 5.0);
        assert_eq!(number_field(&fields, "b"), 2.5);
        assert_eq!(number_field(&fields, "c"), 0.0);
        assert!(number_field(&fields, "d").is_nan());
        assert_eq!(number_field(&fields, "e"), 0.0);
        assert_eq!(number_field(&fields, "f"), 1.0);
        assert!(number_field(&fields, "g").is_nan());
        assert!(number_field(&fields, "missing").is_nan());
    }

    #[test]
    fn truthiness_follows_the_editor() {
        for falsy in [json!(null), json!(false), json!(0), json!(0.0), json!("")] {
            assert!(!is_truthy(&falsy), "{} should be falsy", falsy);
        }
        for truthy in [json!(true), json!(-1), json!("0"), json!(" "), json!([]), json!({})] {
            assert!(is_truthy(&truthy), "{} should be truthy", truthy);
        }
    }

    #[test]
    fn text_field_stringifies_numbers() {
        let block = BlockInstance::new("s", "say")
            .with_field("message", 42)
            .with_field("empty", Value::Null);
        assert_eq!(block.text_field("message"), "42");
        assert_eq!(block.text_field("empty"), "");
        assert_eq!(block.text_field("missing"), "");
    }

    #[test]
    fn top_level_excludes_referenced_blocks() {
        let tail = BlockInstance::new("b", "move");
        let head = BlockInstance::new("a", "when_flag_clicked").with_next(tail.clone());
        let loose = BlockInstance::new("c", "say");
        let blocks = vec![head, tail, loose];
        let ids = top_level_blocks(&blocks)
            .iter()
            .map(|block| block.id.clone())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(flag_entries(&blocks).len(), 1);
    }

    #[test]
    fn chain_walks_next_links() {
        let chain = BlockInstance::new("1", "move")
            .with_next(BlockInstance::new("2", "move").with_next(BlockInstance::new("3", "wait")));
        let ids = chain.chain().map(|b| b.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(chain.detached().chain_len(), 1);
    }

    #[test]
    fn workspace_blocks_accepts_both_shapes() {
        let bare = json!([{ "id": "a", "type": "move" }]);
        let envelope = json!({ "blocks": { "languageVersion": 0, "blocks": [{ "id": "a" }, { "id": "b" }] } });
        assert_eq!(workspace_blocks(&bare).len(), 1);
        assert_eq!(workspace_blocks(&envelope).len(), 2);
        assert!(workspace_blocks(&json!({ "blocks": 3 })).is_empty());
    }

    #[test]
    fn serializes_with_editor_key_names() {
        let block = BlockInstance::new("a", "move").with_field("x_position", 10);
        let value = serde_json::to_value(&block).expect("serializes");
        assert_eq!(value["type"], "move");
        assert_eq!(value["fields"]["x_position"], 10);
        assert!(value.get("next").is_none());
    }
}
