use serde::{Deserialize, Serialize};

use crate::patch::ChangeOp;

/// One entry of a lot's audit trail: who saved, what changed, and the
/// revision the change was made against.
///
/// Entries are append-only; nothing in lotreg edits or removes one once it
/// has been stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionEntry {
    pub author: String,
    pub changes: Vec<ChangeOp>,
    /// `_rev` of the lot before this save; `None` for the creating save.
    #[serde(default)]
    pub rev: Option<String>,
}
