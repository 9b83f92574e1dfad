//! Loading lots from the document store.

use lotreg_core::lot_type::lot_type_name;
use lotreg_core::{Lot, LotTypeRegistry, ModelError, LOT_DOC_TYPE};
use lotreg_storage::{DocumentStore, StorageError};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("lot '{id}' not found")]
    NotFound { id: String },
    #[error("lot type '{0}' is not implemented")]
    UnknownLotType(String),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Fetch and rebuild the lot `id`. Documents that are not lots are reported
/// as not found.
pub async fn load_lot<S: DocumentStore + ?Sized>(
    store: &S,
    registry: &LotTypeRegistry,
    id: &str,
) -> Result<Lot, LoadError> {
    let not_found = || LoadError::NotFound { id: id.to_string() };

    let doc = match store.get(id).await {
        Ok(doc) => doc,
        Err(StorageError::NotFound { .. }) => return Err(not_found()),
        Err(e) => return Err(e.into()),
    };
    if doc.get("doc_type").and_then(Value::as_str) != Some(LOT_DOC_TYPE) {
        return Err(not_found());
    }

    let name = lot_type_name(&doc.body);
    if registry.get(name).is_none() {
        return Err(LoadError::UnknownLotType(name.to_string()));
    }
    Ok(Lot::from_document(&doc)?)
}
