//! The lot record and its serialized forms.
//!
//! A lot has three views:
//!
//! - the in-memory [`Lot`], with bookkeeping fields typed and the business
//!   field tree held as JSON;
//! - the *plain* form ([`Lot::to_plain`]): business fields plus `id`,
//!   `lotType` and `mode`. This is what revisions are diffed on;
//! - the stored [`Document`] ([`Lot::to_document`]): the plain form plus
//!   `_rev`, `doc_type`, `dateModified` and `revisions`.

use lotreg_storage::Document;
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::lot_type::DEFAULT_LOT_TYPE;
use crate::pointer::{step_mut, Pointer};
use crate::revision::RevisionEntry;
use crate::test_mode::TEST_MODE;
use crate::timestamp::{format_timestamp, parse_timestamp};

/// `doc_type` of stored lot documents.
pub const LOT_DOC_TYPE: &str = "Lot";

/// Keys the lot manages itself; never part of the business field tree.
const RESERVED: &[&str] = &[
    "id",
    "_id",
    "_rev",
    "doc_type",
    "lotType",
    "mode",
    "dateModified",
    "revisions",
];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("lot document '{id}' has an invalid {field}: {message}")]
    InvalidField {
        id: String,
        field: &'static str,
        message: String,
    },
    #[error("lot data must be a JSON object")]
    NotAnObject,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lot {
    pub id: String,
    pub rev: Option<String>,
    pub lot_type: String,
    pub mode: Option<String>,
    pub date_modified: Option<OffsetDateTime>,
    pub revisions: Vec<RevisionEntry>,
    /// Transient: `Some(false)` keeps `date_modified` untouched on the next
    /// save. Never persisted.
    pub modified: Option<bool>,
    /// Business field tree.
    pub fields: Map<String, Value>,
}

impl Lot {
    pub fn new(id: impl Into<String>, lot_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rev: None,
            lot_type: lot_type.into(),
            mode: None,
            date_modified: None,
            revisions: Vec::new(),
            modified: None,
            fields: Map::new(),
        }
    }

    /// A new, never-stored lot built from client data.
    pub fn from_data(id: impl Into<String>, data: &Value) -> Result<Self, ModelError> {
        let data = data.as_object().ok_or(ModelError::NotAnObject)?;
        let mut lot = Self::new(id, DEFAULT_LOT_TYPE);
        lot.import_data(data);
        Ok(lot)
    }

    /// Copy `data` into the lot. `lotType` and `mode` are picked up;
    /// `id` and bookkeeping keys are ignored; everything else replaces the
    /// business field of the same name.
    pub fn import_data(&mut self, data: &Map<String, Value>) {
        for (key, value) in data {
            match key.as_str() {
                "lotType" => {
                    if let Some(t) = value.as_str() {
                        self.lot_type = t.to_string();
                    }
                }
                "mode" => self.mode = value.as_str().map(str::to_string),
                k if RESERVED.contains(&k) => {}
                _ => {
                    self.fields.insert(key.clone(), value.clone());
                }
            }
        }
    }

    pub fn is_test_mode(&self) -> bool {
        self.mode.as_deref() == Some(TEST_MODE)
    }

    /// Whether a save should bump `date_modified`.
    pub fn bumps_modified(&self) -> bool {
        self.modified.unwrap_or(true)
    }

    pub fn to_plain(&self) -> Value {
        let mut out = self.fields.clone();
        out.insert("id".to_string(), Value::String(self.id.clone()));
        out.insert("lotType".to_string(), Value::String(self.lot_type.clone()));
        if let Some(mode) = &self.mode {
            out.insert("mode".to_string(), Value::String(mode.clone()));
        }
        Value::Object(out)
    }

    pub fn to_document(&self) -> Result<Document, ModelError> {
        let mut body = match self.to_plain() {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        body.remove("id");
        body.insert("doc_type".to_string(), Value::String(LOT_DOC_TYPE.to_string()));
        if let Some(ts) = self.date_modified {
            body.insert("dateModified".to_string(), Value::String(format_timestamp(ts)));
        }
        let revisions =
            serde_json::to_value(&self.revisions).map_err(|e| ModelError::InvalidField {
                id: self.id.clone(),
                field: "revisions",
                message: e.to_string(),
            })?;
        body.insert("revisions".to_string(), revisions);

        Ok(Document {
            id: self.id.clone(),
            rev: self.rev.clone(),
            body,
        })
    }

    /// Rebuild a lot from its stored document. Does not check `doc_type`.
    pub fn from_document(doc: &Document) -> Result<Self, ModelError> {
        let invalid = |field: &'static str, message: String| ModelError::InvalidField {
            id: doc.id.clone(),
            field,
            message,
        };

        let date_modified = match doc.get("dateModified") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => {
                Some(parse_timestamp(s).map_err(|e| invalid("dateModified", e.to_string()))?)
            }
            Some(other) => {
                return Err(invalid("dateModified", format!("expected a string, got {other}")))
            }
        };
        let revisions = match doc.get("revisions") {
            None | Some(Value::Null) => Vec::new(),
            Some(v) => serde_json::from_value(v.clone())
                .map_err(|e| invalid("revisions", e.to_string()))?,
        };

        let mut lot = Self::new(doc.id.clone(), DEFAULT_LOT_TYPE);
        lot.rev = doc.rev.clone();
        lot.date_modified = date_modified;
        lot.revisions = revisions;
        lot.import_data(&doc.body);
        Ok(lot)
    }

    /// The object at `pointer` in the plain tree. The root pointer is the
    /// business field tree itself.
    pub fn sub_object_mut(&mut self, pointer: &Pointer) -> Option<&mut Map<String, Value>> {
        let Some((first, rest)) = pointer.tokens().split_first() else {
            return Some(&mut self.fields);
        };
        let start = self.fields.get_mut(first)?;
        rest.iter()
            .try_fold(start, |cur, t| step_mut(cur, t))?
            .as_object_mut()
    }
}
