//! lotreg domain model.
//!
//! Pure, I/O-free building blocks shared by the allocator and the revision
//! engine: the [`Lot`] record and its plain/stored forms, JSON pointers into
//! the lot's field tree, structural diffs as ordered [`ChangeOp`] lists,
//! [`RevisionEntry`] audit records, [`LotId`] identifiers, lot type
//! definitions, test-mode title marking and schema validation.

pub mod lot;
pub mod lot_id;
pub mod lot_type;
pub mod patch;
pub mod pointer;
pub mod revision;
pub mod test_mode;
pub mod timestamp;
pub mod validate;

pub use lot::{Lot, ModelError, LOT_DOC_TYPE};
pub use lot_id::{counter_doc_id, date_key, LotId, LotIdError, COUNTER_DOC_ID, DEFAULT_PREFIX};
pub use lot_type::{LotType, LotTypeRegistry, PathTemplate, RegistryError, DEFAULT_LOT_TYPE};
pub use patch::{apply, diff, ChangeOp, Op, PatchError};
pub use pointer::{Pointer, PointerError};
pub use revision::RevisionEntry;
pub use test_mode::{set_test_titles, TitleMarker, TEST_MODE};
pub use timestamp::{format_timestamp, parse_timestamp};
pub use validate::{FieldErrors, SchemaError, SchemaValidator, Validator};
