use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::document::{next_rev, Document};
use crate::error::StorageError;
use crate::traits::DocumentStore;

/// In-process document store.
///
/// Cloning yields another handle to the same documents. Backend failures
/// can be injected with [`MemoryStore::fail_next_gets`] and
/// [`MemoryStore::fail_next_puts`] to exercise retry and error paths.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
    yield_after_read: bool,
}

#[derive(Default)]
struct MemoryInner {
    docs: HashMap<String, Document>,
    failing_gets: usize,
    failing_puts: usize,
    writes: usize,
    conflicts: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that yields to the scheduler after every read, so concurrent
    /// read-modify-write callers interleave and actually race.
    pub fn contended() -> Self {
        Self {
            inner: Arc::default(),
            yield_after_read: true,
        }
    }

    /// Make the next `n` reads fail with a backend error.
    pub fn fail_next_gets(&self, n: usize) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.failing_gets = n;
        }
    }

    /// Make the next `n` writes fail with a backend error.
    pub fn fail_next_puts(&self, n: usize) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.failing_puts = n;
        }
    }

    /// Number of successful writes since creation.
    pub fn write_count(&self) -> usize {
        self.inner.lock().map(|i| i.writes).unwrap_or(0)
    }

    /// Number of writes rejected with a conflict since creation.
    pub fn conflict_count(&self) -> usize {
        self.inner.lock().map(|i| i.conflicts).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|i| i.docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store `doc` unconditionally, bypassing revision checks. Returns the
    /// assigned revision. Intended for seeding fixtures.
    pub fn seed(&self, mut doc: Document) -> Result<String, StorageError> {
        let mut inner = self.lock()?;
        let current = inner.docs.get(&doc.id).and_then(|d| d.rev.clone());
        let rev = next_rev(current.as_deref(), &doc.body);
        doc.rev = Some(rev.clone());
        inner.docs.insert(doc.id.clone(), doc);
        Ok(rev)
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryInner>, StorageError> {
        self.inner
            .lock()
            .map_err(|_| StorageError::Backend("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Document, StorageError> {
        let result = {
            let mut inner = self.lock()?;
            if inner.failing_gets > 0 {
                inner.failing_gets -= 1;
                Err(StorageError::Backend(format!("injected read failure for {id}")))
            } else {
                inner
                    .docs
                    .get(id)
                    .cloned()
                    .ok_or_else(|| StorageError::NotFound {
                        doc_id: id.to_string(),
                    })
            }
        };
        if self.yield_after_read {
            tokio::task::yield_now().await;
        }
        result
    }

    async fn put(&self, doc: &Document) -> Result<String, StorageError> {
        let mut inner = self.lock()?;
        if inner.failing_puts > 0 {
            inner.failing_puts -= 1;
            return Err(StorageError::Backend(format!(
                "injected write failure for {}",
                doc.id
            )));
        }

        let current = inner.docs.get(&doc.id).and_then(|d| d.rev.clone());
        let exists = inner.docs.contains_key(&doc.id);
        let matches = match (&doc.rev, &current) {
            (None, _) => !exists,
            (Some(expected), Some(actual)) => expected == actual,
            (Some(_), None) => false,
        };
        if !matches {
            inner.conflicts += 1;
            return Err(StorageError::Conflict {
                doc_id: doc.id.clone(),
                rev: doc.rev.clone(),
            });
        }

        let rev = next_rev(current.as_deref(), &doc.body);
        let mut stored = doc.clone();
        stored.rev = Some(rev.clone());
        inner.docs.insert(stored.id.clone(), stored);
        inner.writes += 1;
        Ok(rev)
    }
}
