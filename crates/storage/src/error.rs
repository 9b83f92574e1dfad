/// All errors that can be returned by a DocumentStore implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// Optimistic concurrency conflict: the document was written by someone
    /// else since `rev` was read, or a create hit an existing document.
    #[error("document update conflict on {doc_id}: revision {} is stale", .rev.as_deref().unwrap_or("<new>"))]
    Conflict { doc_id: String, rev: Option<String> },

    /// No document with the given id.
    #[error("document not found: {doc_id}")]
    NotFound { doc_id: String },

    /// A backend-specific storage error (I/O, serialization, availability).
    #[error("storage backend error: {0}")]
    Backend(String),
}
