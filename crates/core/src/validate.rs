//! Model validation of lot documents.
//!
//! Validation reports every offending field at once so a caller can fix all
//! problems in one resubmission.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// Message reported for a required field that is absent or null.
pub const REQUIRED_MESSAGE: &str = "This field is required.";

/// Validation messages keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// `Ok(())` if no errors were collected.
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            if !first {
                write!(f, "; ")?;
            }
            first = false;
            write!(f, "{}: {}", field, messages.join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for FieldErrors {}

/// Validates the plain form of a lot before it is persisted.
pub trait Validator: Send + Sync {
    fn validate(&self, data: &Value) -> Result<(), FieldErrors>;
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("schema must be a JSON object")]
    NotAnObject,
    #[error("failed to compile schema for field '{field}': {message}")]
    Compile { field: String, message: String },
}

/// JSON Schema validator that reports errors per top-level field.
///
/// The object schema's `properties` are compiled individually, and its
/// `required` list is checked by hand, so every failing field gets its own
/// entry in the resulting [`FieldErrors`].
pub struct SchemaValidator {
    properties: BTreeMap<String, jsonschema::Validator>,
    required: Vec<String>,
}

impl SchemaValidator {
    pub fn new(schema: &Value) -> Result<Self, SchemaError> {
        let obj = schema.as_object().ok_or(SchemaError::NotAnObject)?;

        let mut properties = BTreeMap::new();
        if let Some(props) = obj.get("properties").and_then(Value::as_object) {
            for (field, sub) in props {
                let v = jsonschema::validator_for(sub).map_err(|e| SchemaError::Compile {
                    field: field.clone(),
                    message: e.to_string(),
                })?;
                properties.insert(field.clone(), v);
            }
        }

        let required = obj
            .get("required")
            .and_then(Value::as_array)
            .map(|r| {
                r.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            properties,
            required,
        })
    }
}

impl fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaValidator")
            .field("properties", &self.properties.keys().collect::<Vec<_>>())
            .field("required", &self.required)
            .finish()
    }
}

impl Validator for SchemaValidator {
    fn validate(&self, data: &Value) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        let Some(obj) = data.as_object() else {
            errors.add("data", "Data must be an object.");
            return Err(errors);
        };

        for field in &self.required {
            if obj.get(field).map_or(true, Value::is_null) {
                errors.add(field.as_str(), REQUIRED_MESSAGE);
            }
        }
        for (field, validator) in &self.properties {
            let Some(value) = obj.get(field).filter(|v| !v.is_null()) else {
                continue;
            };
            for error in validator.iter_errors(value) {
                errors.add(field.as_str(), error.to_string());
            }
        }

        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "type": "object",
            "required": ["id", "title"],
            "properties": {
                "title": {"type": "string"},
                "status": {"enum": ["draft", "pending", "active"]},
                "items": {
                    "type": "array",
                    "items": {"type": "object", "properties": {"status": {"type": "string"}}}
                }
            }
        })
    }

    #[test]
    fn valid_document_passes() {
        let v = SchemaValidator::new(&schema()).unwrap();
        assert!(v
            .validate(&json!({"id": "x", "title": "Lot", "status": "draft"}))
            .is_ok());
    }

    #[test]
    fn reports_every_failing_field() {
        let v = SchemaValidator::new(&schema()).unwrap();
        let errors = v
            .validate(&json!({
                "title": 42,
                "status": "sold",
                "items": [{"status": 1}]
            }))
            .unwrap_err();
        let fields: Vec<&str> = errors.fields().collect();
        assert_eq!(fields, ["id", "items", "status", "title"]);
        assert_eq!(errors.get("id"), Some(&[REQUIRED_MESSAGE.to_string()][..]));
    }

    #[test]
    fn null_required_field_is_missing() {
        let v = SchemaValidator::new(&schema()).unwrap();
        let errors = v.validate(&json!({"id": "x", "title": null})).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors.get("title").is_some());
    }

    #[test]
    fn display_lists_fields_in_order() {
        let mut errors = FieldErrors::new();
        errors.add("b", "bad");
        errors.add("a", "worse");
        errors.add("a", "worst");
        assert_eq!(errors.to_string(), "a: worse, worst; b: bad");
    }

    #[test]
    fn non_object_schema_is_rejected() {
        assert!(matches!(
            SchemaValidator::new(&json!(true)),
            Err(SchemaError::NotAnObject)
        ));
    }
}
