//! Marking of test-mode lots.
//!
//! Lots saved with `mode = "test"` get their title-like fields prefixed
//! with a per-language marker, so test data is recognisable wherever the
//! title is shown.

use serde_json::{Map, Value};

/// Mode value that marks a lot as test data.
pub const TEST_MODE: &str = "test";

/// A title field and the marker it receives in test mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleMarker {
    pub field: String,
    pub marker: String,
}

impl TitleMarker {
    pub fn new(field: impl Into<String>, marker: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            marker: marker.into(),
        }
    }
}

/// Markers for the `title`, `title_en` and `title_ru` fields.
pub fn default_title_markers() -> Vec<TitleMarker> {
    vec![
        TitleMarker::new("title", "[ТЕСТУВАННЯ]"),
        TitleMarker::new("title_en", "[TESTING]"),
        TitleMarker::new("title_ru", "[ТЕСТИРОВАНИЕ]"),
    ]
}

/// Prefix each title field with its marker unless the marker is already
/// present. Absent or null titles become the bare marker. Fields holding
/// non-string values are left alone.
///
/// Idempotent: applying it twice gives the same result as applying it once.
pub fn set_test_titles(fields: &mut Map<String, Value>, markers: &[TitleMarker]) {
    for TitleMarker { field, marker } in markers {
        let current = match fields.get(field) {
            None | Some(Value::Null) => "",
            Some(Value::String(s)) if !s.contains(marker.as_str()) => s.as_str(),
            Some(_) => continue,
        };
        let marked = format!("{marker} {current}");
        fields.insert(field.clone(), Value::String(marked));
    }
}
