use std::sync::Arc;

use async_trait::async_trait;

use crate::document::Document;
use crate::error::StorageError;

/// The storage trait for lotreg backends.
///
/// A `DocumentStore` is a flat id → document map with optimistic
/// concurrency control on single documents.
///
/// ## Revision semantics
///
/// `put` is a compare-and-swap on the document's `_rev`:
///
/// - `doc.rev == None` creates the document. If a document with that id
///   already exists the put fails with `StorageError::Conflict`.
/// - `doc.rev == Some(r)` replaces the stored document only if its current
///   revision is `r`. A missing document or a different revision fails with
///   `StorageError::Conflict`.
///
/// On success the store assigns and returns the new revision token. The
/// comparison and the write must be atomic with respect to other `put`
/// calls on the same id; all correctness of the allocator and the revision
/// engine rests on this.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so a single store can be
/// shared behind `Arc` by concurrent tasks.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Read a document by id.
    ///
    /// Returns `Err(StorageError::NotFound)` if no such document exists.
    async fn get(&self, id: &str) -> Result<Document, StorageError>;

    /// Revision-gated write of `doc`. Returns the new revision token.
    async fn put(&self, doc: &Document) -> Result<String, StorageError>;
}

#[async_trait]
impl<S: DocumentStore + ?Sized> DocumentStore for Arc<S> {
    async fn get(&self, id: &str) -> Result<Document, StorageError> {
        (**self).get(id).await
    }

    async fn put(&self, doc: &Document) -> Result<String, StorageError> {
        (**self).put(doc).await
    }
}
