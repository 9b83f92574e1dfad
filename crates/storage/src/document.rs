use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::StorageError;

/// A stored document: an id, the store-assigned revision token and an
/// arbitrary JSON object body.
///
/// Serializes to the flat layout `{"_id": .., "_rev": .., ...body}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: String,
    /// `None` for a document that has never been stored.
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl Document {
    /// An empty, never-stored document.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rev: None,
            body: Map::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.body.insert(key.into(), value)
    }

    /// Parse a document from its flat JSON layout.
    pub fn from_value(value: Value) -> Result<Self, StorageError> {
        serde_json::from_value(value)
            .map_err(|e| StorageError::Backend(format!("malformed document: {e}")))
    }

    /// The flat JSON layout, `_id` and `_rev` included.
    pub fn to_value(&self) -> Value {
        let mut out = Map::with_capacity(self.body.len() + 2);
        out.insert("_id".to_string(), Value::String(self.id.clone()));
        if let Some(rev) = &self.rev {
            out.insert("_rev".to_string(), Value::String(rev.clone()));
        }
        for (k, v) in &self.body {
            if k != "_id" && k != "_rev" {
                out.insert(k.clone(), v.clone());
            }
        }
        Value::Object(out)
    }
}

/// Compute the revision token that follows `current` for a document with
/// `body`: `"<generation>-<digest>"`, where the generation counts stored
/// versions starting at 1 and the digest is the first 16 hex characters of
/// the SHA-256 of the serialized body.
pub fn next_rev(current: Option<&str>, body: &Map<String, Value>) -> String {
    let generation = current
        .and_then(|rev| rev.split_once('-'))
        .and_then(|(n, _)| n.parse::<u64>().ok())
        .unwrap_or(0)
        + 1;

    let mut hasher = Sha256::new();
    // Map serialization cannot fail: keys are strings and values are JSON.
    hasher.update(serde_json::to_vec(body).unwrap_or_default());
    let digest = hasher.finalize();
    let hex: String = digest[..8].iter().map(|b| format!("{b:02x}")).collect();

    format!("{generation}-{hex}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flat_layout_round_trips() {
        let doc = Document::from_value(json!({
            "_id": "lotID",
            "_rev": "3-abc",
            "2024-03-05": 7
        }))
        .unwrap();
        assert_eq!(doc.id, "lotID");
        assert_eq!(doc.rev.as_deref(), Some("3-abc"));
        assert_eq!(doc.get("2024-03-05"), Some(&json!(7)));
        assert_eq!(doc.to_value()["_rev"], json!("3-abc"));
    }

    #[test]
    fn new_document_has_no_rev_in_layout() {
        let doc = Document::new("x");
        assert!(doc.to_value().get("_rev").is_none());
    }

    #[test]
    fn next_rev_increments_generation() {
        let body = Map::new();
        let first = next_rev(None, &body);
        assert!(first.starts_with("1-"), "{first}");
        let second = next_rev(Some(&first), &body);
        assert!(second.starts_with("2-"), "{second}");
        assert_eq!(second.len(), "2-".len() + 16);
    }

    #[test]
    fn next_rev_digest_tracks_body() {
        let mut a = Map::new();
        a.insert("k".into(), json!(1));
        let mut b = Map::new();
        b.insert("k".into(), json!(2));
        assert_ne!(next_rev(Some("4-x"), &a), next_rev(Some("4-x"), &b));
        assert_eq!(next_rev(Some("4-x"), &a), next_rev(Some("4-y"), &a));
    }
}
