//! Lot type definitions and the registry that maps `lotType` names to them.
//!
//! A lot type fixes, at definition time, everything the revision engine
//! needs to know about a kind of lot that the plain data cannot tell it:
//! which sub-objects carry a `date` paired with their `status`, which
//! fields are titles, and how the document is validated.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::pointer::{Pointer, PointerError};
use crate::test_mode::{default_title_markers, TitleMarker};
use crate::validate::{SchemaError, SchemaValidator, Validator};

/// `lotType` assumed when a document does not name one.
pub const DEFAULT_LOT_TYPE: &str = "basic";

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("lot type '{0}' is not implemented")]
    UnknownLotType(String),
    #[error("invalid dated path template: {0}")]
    Template(#[from] PointerError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// A pointer template where a `*` token matches any single token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    tokens: Vec<String>,
}

impl PathTemplate {
    pub fn parse(s: &str) -> Result<Self, PointerError> {
        let p = Pointer::parse(s)?;
        Ok(Self {
            tokens: p.tokens().to_vec(),
        })
    }

    pub fn matches(&self, pointer: &Pointer) -> bool {
        let tokens = pointer.tokens();
        tokens.len() == self.tokens.len()
            && self
                .tokens
                .iter()
                .zip(tokens)
                .all(|(t, p)| t == "*" || t == p)
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for t in &self.tokens {
            write!(f, "/{t}")?;
        }
        Ok(())
    }
}

/// Definition of one kind of lot.
#[derive(Clone)]
pub struct LotType {
    name: String,
    dated_paths: Vec<PathTemplate>,
    title_markers: Vec<TitleMarker>,
    validator: Arc<dyn Validator>,
}

impl LotType {
    /// A lot type validated against `schema`, with no dated sub-objects and
    /// the default title markers.
    pub fn new(name: impl Into<String>, schema: &Value) -> Result<Self, RegistryError> {
        Ok(Self::with_validator(name, Arc::new(SchemaValidator::new(schema)?)))
    }

    pub fn with_validator(name: impl Into<String>, validator: Arc<dyn Validator>) -> Self {
        Self {
            name: name.into(),
            dated_paths: Vec::new(),
            title_markers: default_title_markers(),
            validator,
        }
    }

    /// Declare that objects at `template` (e.g. `/items/*`) carry a `date`
    /// that follows their `status`.
    pub fn dated(mut self, template: &str) -> Result<Self, RegistryError> {
        self.dated_paths.push(PathTemplate::parse(template)?);
        Ok(self)
    }

    pub fn title_markers(mut self, markers: Vec<TitleMarker>) -> Self {
        self.title_markers = markers;
        self
    }

    /// The built-in `basic` lot type.
    pub fn basic() -> Result<Self, RegistryError> {
        Self::new(DEFAULT_LOT_TYPE, &basic_schema())?
            .dated("/items/*")?
            .dated("/milestones/*")
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn validator(&self) -> &dyn Validator {
        self.validator.as_ref()
    }

    pub fn test_title_markers(&self) -> &[TitleMarker] {
        &self.title_markers
    }

    /// Whether the sub-object at `pointer` exposes a `date` attribute.
    pub fn exposes_date(&self, pointer: &Pointer) -> bool {
        self.dated_paths.iter().any(|t| t.matches(pointer))
    }
}

impl fmt::Debug for LotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LotType")
            .field("name", &self.name)
            .field("dated_paths", &self.dated_paths)
            .field("title_markers", &self.title_markers)
            .finish_non_exhaustive()
    }
}

fn dated_object_schema() -> Value {
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "status": {"type": "string"},
                "date": {"type": ["string", "null"]}
            }
        }
    })
}

/// Schema of the plain form of a `basic` lot.
pub fn basic_schema() -> Value {
    json!({
        "type": "object",
        "required": ["id", "lotType", "title"],
        "properties": {
            "id": {"type": "string", "minLength": 1},
            "lotType": {"type": "string"},
            "mode": {"enum": ["test"]},
            "title": {"type": "string"},
            "title_en": {"type": "string"},
            "title_ru": {"type": "string"},
            "description": {"type": "string"},
            "status": {"type": "string"},
            "date": {"type": ["string", "null"]},
            "items": dated_object_schema(),
            "milestones": dated_object_schema()
        }
    })
}

/// Registered lot types keyed by `lotType`.
#[derive(Debug, Clone, Default)]
pub struct LotTypeRegistry {
    types: BTreeMap<String, Arc<LotType>>,
}

impl LotTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in `basic` type.
    pub fn with_defaults() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        registry.register(LotType::basic()?);
        Ok(registry)
    }

    /// Register `lot_type` under its name, replacing any earlier definition.
    pub fn register(&mut self, lot_type: LotType) {
        self.types
            .insert(lot_type.name().to_string(), Arc::new(lot_type));
    }

    pub fn get(&self, name: &str) -> Option<Arc<LotType>> {
        self.types.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// The lot type named by `data["lotType"]` (default `basic`).
    pub fn resolve(&self, data: &Map<String, Value>) -> Result<Arc<LotType>, RegistryError> {
        let name = lot_type_name(data);
        self.get(name)
            .ok_or_else(|| RegistryError::UnknownLotType(name.to_string()))
    }
}

/// `data["lotType"]`, or the default when absent.
pub fn lot_type_name(data: &Map<String, Value>) -> &str {
    data.get("lotType")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_LOT_TYPE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_matches_single_token_wildcards() {
        let t = PathTemplate::parse("/items/*").unwrap();
        assert!(t.matches(&Pointer::parse("/items/0").unwrap()));
        assert!(t.matches(&Pointer::parse("/items/17").unwrap()));
        assert!(!t.matches(&Pointer::parse("/items").unwrap()));
        assert!(!t.matches(&Pointer::parse("/items/0/unit").unwrap()));
        assert!(!t.matches(&Pointer::parse("/bids/0").unwrap()));
    }

    #[test]
    fn root_template_matches_root_only() {
        let t = PathTemplate::parse("").unwrap();
        assert!(t.matches(&Pointer::root()));
        assert!(!t.matches(&Pointer::parse("/items").unwrap()));
    }

    #[test]
    fn basic_type_declares_dated_collections() {
        let basic = LotType::basic().unwrap();
        assert!(basic.exposes_date(&Pointer::parse("/milestones/3").unwrap()));
        assert!(basic.exposes_date(&Pointer::parse("/items/0").unwrap()));
        assert!(!basic.exposes_date(&Pointer::root()));
    }

    #[test]
    fn registry_resolves_default_and_unknown_types() {
        let registry = LotTypeRegistry::with_defaults().unwrap();
        let data = Map::new();
        assert_eq!(registry.resolve(&data).unwrap().name(), "basic");

        let mut data = Map::new();
        data.insert("lotType".into(), json!("compound"));
        assert!(matches!(
            registry.resolve(&data),
            Err(RegistryError::UnknownLotType(name)) if name == "compound"
        ));
    }

    #[test]
    fn register_replaces_existing_definition() {
        let mut registry = LotTypeRegistry::with_defaults().unwrap();
        let custom = LotType::new("basic", &json!({"type": "object"}))
            .unwrap()
            .dated("")
            .unwrap();
        registry.register(custom);
        let basic = registry.get("basic").unwrap();
        assert!(basic.exposes_date(&Pointer::root()));
        assert_eq!(registry.names().collect::<Vec<_>>(), ["basic"]);
    }
}
