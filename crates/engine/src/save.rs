//! The revision engine: diff, invariant pass, audit append, persist.
//!
//! Every save works on a clone of the caller's lot. The clone is committed
//! back only when the store accepts the write, so a rejected save leaves the
//! caller's record exactly as it was.

use std::sync::Arc;

use lotreg_core::{
    diff, format_timestamp, set_test_titles, ChangeOp, FieldErrors, Lot, LotType,
    LotTypeRegistry, Op, Pointer, RevisionEntry,
};
use lotreg_storage::{DocumentStore, StorageError};
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;

use crate::load::{load_lot, LoadError};
use crate::merge::apply_data_patch;

const STATUS_SUFFIX: &str = "/status";
const BIDS_PREFIX: &str = "/bids/";

/// Audit data for a successful save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveReceipt {
    pub lot_id: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub old_date_modified: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub new_date_modified: Option<OffsetDateTime>,
    pub rev: String,
}

/// Result of [`RevisionEngine::save`].
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// Stored. `None` when there was nothing to store.
    Success(Option<SaveReceipt>),
    /// Rejected by validation before reaching the store.
    ValidationFailed(FieldErrors),
    /// The lot's revision token is stale.
    Conflict(String),
    /// Any other store failure.
    StoreError(String),
}

impl SaveOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SaveOutcome::Success(_))
    }

    pub fn receipt(&self) -> Option<&SaveReceipt> {
        match self {
            SaveOutcome::Success(receipt) => receipt.as_ref(),
            _ => None,
        }
    }
}

pub struct RevisionEngine<S> {
    store: S,
    registry: Arc<LotTypeRegistry>,
}

impl<S: DocumentStore> RevisionEngine<S> {
    pub fn new(store: S, registry: Arc<LotTypeRegistry>) -> Self {
        Self { store, registry }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &LotTypeRegistry {
        &self.registry
    }

    pub async fn load(&self, id: &str) -> Result<Lot, LoadError> {
        load_lot(&self.store, &self.registry, id).await
    }

    /// Persist `lot`, recording its changes against `src`, the plain form it
    /// was last read as.
    pub async fn save(
        &self,
        lot: &mut Lot,
        src: &Value,
        author: &str,
        now: OffsetDateTime,
    ) -> SaveOutcome {
        let Some(lot_type) = self.registry.get(&lot.lot_type) else {
            let mut errors = FieldErrors::new();
            errors.add("lotType", "Not implemented");
            tracing::info!(lot_id = %lot.id, lot_type = %lot.lot_type, "save rejected: unknown lot type");
            return SaveOutcome::ValidationFailed(errors);
        };

        let mut candidate = lot.clone();
        if candidate.is_test_mode() {
            set_test_titles(&mut candidate.fields, lot_type.test_title_markers());
        }

        let mut changes = diff(src, &candidate.to_plain());
        if changes.is_empty() {
            tracing::debug!(lot_id = %lot.id, "no changes, save skipped");
            return SaveOutcome::Success(None);
        }

        sync_status_dates(&mut candidate, &lot_type, &mut changes, now);

        candidate.revisions.push(RevisionEntry {
            author: author.to_string(),
            changes,
            rev: candidate.rev.clone(),
        });

        let old_date_modified = candidate.date_modified;
        if candidate.bumps_modified() {
            candidate.date_modified = Some(now);
        }

        if let Err(errors) = lot_type.validator().validate(&candidate.to_plain()) {
            tracing::info!(
                lot_id = %lot.id,
                fields = %errors.fields().collect::<Vec<_>>().join(","),
                "save rejected by validation"
            );
            return SaveOutcome::ValidationFailed(errors);
        }

        let doc = match candidate.to_document() {
            Ok(doc) => doc,
            Err(e) => return SaveOutcome::StoreError(e.to_string()),
        };

        match self.store.put(&doc).await {
            Ok(rev) => {
                candidate.rev = Some(rev.clone());
                let receipt = SaveReceipt {
                    lot_id: candidate.id.clone(),
                    old_date_modified,
                    new_date_modified: candidate.date_modified,
                    rev,
                };
                tracing::info!(
                    message_id = "save_lot",
                    lot_id = %receipt.lot_id,
                    old_date_modified = ?receipt.old_date_modified.map(format_timestamp),
                    new_date_modified = ?receipt.new_date_modified.map(format_timestamp),
                    rev = %receipt.rev,
                    "saved lot"
                );
                *lot = candidate;
                SaveOutcome::Success(Some(receipt))
            }
            Err(e @ StorageError::Conflict { .. }) => {
                tracing::warn!(lot_id = %lot.id, error = %e, "save conflict");
                SaveOutcome::Conflict(e.to_string())
            }
            Err(e) => {
                tracing::warn!(lot_id = %lot.id, error = %e, "save failed");
                SaveOutcome::StoreError(e.to_string())
            }
        }
    }

    /// Merge the partial update `data` into `lot` and, if `save` is set,
    /// persist it against the pre-merge plain form. A merge that changes
    /// nothing is a no-op. With `save` unset the merged data is applied to
    /// `lot` in memory only.
    pub async fn patch(
        &self,
        lot: &mut Lot,
        data: &Value,
        author: &str,
        now: OffsetDateTime,
        save: bool,
    ) -> SaveOutcome {
        let src = lot.to_plain();
        let Some(merged) = apply_data_patch(&src, data) else {
            return SaveOutcome::Success(None);
        };
        let Value::Object(merged) = merged else {
            let mut errors = FieldErrors::new();
            errors.add("data", "Data not available");
            return SaveOutcome::ValidationFailed(errors);
        };

        let mut candidate = lot.clone();
        candidate.import_data(&merged);
        if !save {
            *lot = candidate;
            return SaveOutcome::Success(None);
        }

        let outcome = self.save(&mut candidate, &src, author, now).await;
        if outcome.is_success() {
            *lot = candidate;
        }
        outcome
    }
}

/// Pair every status change with a date change on dated sub-objects.
///
/// For each `replace` of a `.../status` path outside `/bids/`, if the
/// sub-object is declared dated by `lot_type`, a `/date` operation is
/// appended to `changes` (`replace` if the sub-object has a date and no
/// change already targets it, `remove` if it has none) and the in-memory
/// date is set to `now`.
pub fn sync_status_dates(
    lot: &mut Lot,
    lot_type: &LotType,
    changes: &mut Vec<ChangeOp>,
    now: OffsetDateTime,
) {
    let stamp = format_timestamp(now);
    let bases: Vec<String> = changes
        .iter()
        .filter(|c| c.op == Op::Replace && !c.path.starts_with(BIDS_PREFIX))
        .filter_map(|c| c.path.strip_suffix(STATUS_SUFFIX))
        .map(str::to_string)
        .collect();

    for base in bases {
        let Ok(pointer) = Pointer::parse(&base) else {
            continue;
        };
        if !lot_type.exposes_date(&pointer) {
            continue;
        }
        let Some(obj) = lot.sub_object_mut(&pointer) else {
            continue;
        };

        let date_path = format!("{base}/date");
        let has_date = obj
            .get("date")
            .is_some_and(|d| !d.is_null() && d.as_str() != Some(""));
        if !has_date {
            changes.push(ChangeOp::remove(date_path));
        } else if !changes.iter().any(|c| c.path == date_path) {
            changes.push(ChangeOp::replace(date_path, Value::String(stamp.clone())));
        }
        obj.insert("date".to_string(), Value::String(stamp.clone()));
    }
}
