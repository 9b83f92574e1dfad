//! Listing views of stored lots.

use lotreg_core::lot_type::lot_type_name;
use lotreg_core::LotTypeRegistry;
use serde_json::{Map, Value};

/// Keys never shown in a listing.
const HIDDEN: &[&str] = &["_id", "_rev", "doc_type", "revisions"];

/// The listing form of a lot given as stored JSON (`_id`) or plain JSON
/// (`id`).
///
/// For a registered lot type the result holds the requested `fields` that
/// are present, or every visible field when `fields` is empty. A document of
/// an unregistered type yields only `lotType`, `dateModified` and `id`, each
/// defaulting to an empty string.
pub fn listing_view(
    registry: &LotTypeRegistry,
    data: &Map<String, Value>,
    fields: &[&str],
) -> Map<String, Value> {
    let id = data
        .get("id")
        .or_else(|| data.get("_id"))
        .cloned()
        .unwrap_or_else(|| Value::String(String::new()));

    if registry.get(lot_type_name(data)).is_none() {
        let text = |key: &str| {
            data.get(key)
                .cloned()
                .unwrap_or_else(|| Value::String(String::new()))
        };
        let mut out = Map::new();
        out.insert("lotType".to_string(), text("lotType"));
        out.insert("dateModified".to_string(), text("dateModified"));
        out.insert("id".to_string(), id);
        return out;
    }

    let mut out: Map<String, Value> = data
        .iter()
        .filter(|(k, _)| !HIDDEN.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    out.insert("id".to_string(), id);
    if !fields.is_empty() {
        out.retain(|k, _| fields.contains(&k.as_str()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn known_type_is_restricted_to_fields() {
        let registry = LotTypeRegistry::with_defaults().unwrap();
        let doc = map(json!({
            "_id": "UA-1", "_rev": "1-a", "doc_type": "Lot", "revisions": [],
            "lotType": "basic", "title": "t", "status": "pending"
        }));

        let view = listing_view(&registry, &doc, &["id", "status", "missing"]);
        assert_eq!(Value::Object(view), json!({"id": "UA-1", "status": "pending"}));

        let all = listing_view(&registry, &doc, &[]);
        assert_eq!(
            Value::Object(all),
            json!({"id": "UA-1", "lotType": "basic", "title": "t", "status": "pending"})
        );
    }

    #[test]
    fn unknown_type_shows_identity_only() {
        let registry = LotTypeRegistry::with_defaults().unwrap();
        let doc = map(json!({"id": "UA-2", "lotType": "compound", "title": "t"}));
        assert_eq!(
            Value::Object(listing_view(&registry, &doc, &["title"])),
            json!({"lotType": "compound", "dateModified": "", "id": "UA-2"})
        );
    }
}
