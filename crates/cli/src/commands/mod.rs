pub(crate) mod allocate;
pub(crate) mod create;
pub(crate) mod history;
pub(crate) mod patch;
pub(crate) mod show;

use std::path::Path;

use lotreg_engine::{LoadError, SaveOutcome, SaveReceipt};
use serde_json::Value;

use crate::{CliError, EXIT_CONFLICT, EXIT_VALIDATION};

pub(crate) fn read_json(path: &Path) -> Result<Value, CliError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| CliError::new(format!("error reading file '{}': {}", path.display(), e)))?;
    serde_json::from_str(&content)
        .map_err(|e| CliError::new(format!("error parsing JSON in '{}': {}", path.display(), e)))
}

/// Map a save outcome onto the CLI's exit statuses.
pub(crate) fn check_outcome(outcome: SaveOutcome) -> Result<Option<SaveReceipt>, CliError> {
    match outcome {
        SaveOutcome::Success(receipt) => Ok(receipt),
        SaveOutcome::ValidationFailed(errors) => {
            let detail = serde_json::to_value(&errors).unwrap_or(Value::Null);
            Err(CliError::new("validation failed")
                .with_code(EXIT_VALIDATION)
                .with_detail(detail))
        }
        SaveOutcome::Conflict(message) => {
            Err(CliError::new(format!("conflict: {message}")).with_code(EXIT_CONFLICT))
        }
        SaveOutcome::StoreError(message) => Err(CliError::new(format!("store error: {message}"))),
    }
}

pub(crate) fn load_failed(err: LoadError) -> CliError {
    CliError::new(err.to_string())
}

pub(crate) fn receipt_json(receipt: &SaveReceipt) -> Value {
    serde_json::to_value(receipt).unwrap_or(Value::Null)
}
