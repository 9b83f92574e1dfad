//! Document storage for lotreg.
//!
//! Defines the [`DocumentStore`] trait that the allocator and the revision
//! engine persist through, the [`Document`] shape they exchange, and two
//! reference backends: [`MemoryStore`] and [`FileStore`].
//!
//! Every backend must implement a revision-gated put: a document without
//! `_rev` may only be created, a document with `_rev` may only replace the
//! document currently stored at that revision. Backends prove this by
//! passing [`conformance::run_conformance_suite`].

pub mod conformance;
mod document;
mod error;
mod fs;
mod memory;
mod traits;

pub use document::{next_rev, Document};
pub use error::StorageError;
pub use fs::FileStore;
pub use memory::MemoryStore;
pub use traits::DocumentStore;
