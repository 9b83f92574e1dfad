//! Sequence allocation of lot identifiers.
//!
//! Each day's counter lives in a single counter document (`lotID`, or
//! `lotID_<server>`), mapping ISO date keys to the next free index. An
//! allocation is a read-modify-write of that document guarded only by the
//! store's revision check: a conflict means another caller claimed the index
//! first, so the read is discarded and the claim re-issued immediately. Any
//! other store failure pauses for the configured delay before retrying.
//!
//! No index is ever handed out twice for the same date key, provided the
//! store's put is a true compare-and-swap. By default the loop retries
//! forever; [`RetryPolicy`] caps and a cancellation flag bound it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lotreg_core::{counter_doc_id, date_key, LotId};
use lotreg_storage::{Document, DocumentStore, StorageError};
use serde_json::Value;
use time::OffsetDateTime;

use crate::config::AllocatorConfig;

/// How the allocator reacts to failed attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Pause after a non-conflict store error. Conflicts never pause.
    pub delay: Duration,
    /// Fail with [`AllocateError::StoreUnavailable`] after this many store
    /// errors in one call. `None` retries forever.
    pub max_store_errors: Option<u32>,
    /// Fail with [`AllocateError::Contended`] after this many conflicts in
    /// one call. `None` retries forever.
    pub max_conflicts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(1),
            max_store_errors: None,
            max_conflicts: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AllocateError {
    #[error("allocation cancelled")]
    Cancelled,

    #[error("store unavailable after {attempts} failed attempts: {last}")]
    StoreUnavailable { attempts: u32, last: StorageError },

    #[error("gave up on {doc_id} after {attempts} write conflicts")]
    Contended { doc_id: String, attempts: u32 },

    /// The counter for the date is not a positive integer. Retrying cannot
    /// fix this, so it is reported instead of looping.
    #[error("counter document {doc_id} holds an invalid index for {date_key}: {value}")]
    CorruptCounter {
        doc_id: String,
        date_key: String,
        value: Value,
    },
}

/// Outcome of one read-modify-write attempt.
enum Attempt {
    Claimed(u64),
    Conflict,
    StoreError(StorageError),
}

/// Mints `PREFIX-YYYY-MM-DD-NNNNNN[-SERVERID]` identifiers.
pub struct SequenceAllocator<S> {
    store: S,
    prefix: String,
    server_id: String,
    policy: RetryPolicy,
    cancel: Option<Arc<AtomicBool>>,
}

impl<S: DocumentStore> SequenceAllocator<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            prefix: lotreg_core::DEFAULT_PREFIX.to_string(),
            server_id: String::new(),
            policy: RetryPolicy::default(),
            cancel: None,
        }
    }

    pub fn from_config(store: S, config: &AllocatorConfig) -> Self {
        Self::new(store)
            .prefix(&config.prefix)
            .server_id(&config.server_id)
            .retry_policy(config.retry_policy())
    }

    pub fn prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    pub fn server_id(mut self, server_id: &str) -> Self {
        self.server_id = server_id.to_string();
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Abort pending allocations once `flag` is set. Checked before every
    /// attempt; an attempt already in flight completes first.
    pub fn cancel_on(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn counter_doc_id(&self) -> String {
        counter_doc_id(&self.server_id)
    }

    /// Allocate the next identifier for the calendar day of `now`.
    pub async fn allocate(&self, now: OffsetDateTime) -> Result<LotId, AllocateError> {
        let date = now.date();
        let key = date_key(date);
        let doc_id = self.counter_doc_id();

        let mut conflicts = 0u32;
        let mut store_errors = 0u32;

        loop {
            if self.is_cancelled() {
                return Err(AllocateError::Cancelled);
            }

            match self.claim(&doc_id, &key).await? {
                Attempt::Claimed(index) => {
                    let id = LotId::new(&self.prefix, date, index, &self.server_id);
                    tracing::info!(lot_id = %id, counter = %doc_id, conflicts, store_errors, "allocated lot id");
                    return Ok(id);
                }
                Attempt::Conflict => {
                    conflicts += 1;
                    tracing::debug!(counter = %doc_id, date_key = %key, attempt = conflicts, "counter conflict, retrying");
                    if self.policy.max_conflicts.is_some_and(|max| conflicts >= max) {
                        return Err(AllocateError::Contended {
                            doc_id,
                            attempts: conflicts,
                        });
                    }
                    tokio::task::yield_now().await;
                }
                Attempt::StoreError(e) => {
                    store_errors += 1;
                    tracing::warn!(
                        counter = %doc_id,
                        error = %e,
                        attempt = store_errors,
                        delay_ms = self.policy.delay.as_millis() as u64,
                        "counter store error, retrying after delay"
                    );
                    if self.policy.max_store_errors.is_some_and(|max| store_errors >= max) {
                        return Err(AllocateError::StoreUnavailable {
                            attempts: store_errors,
                            last: e,
                        });
                    }
                    tokio::time::sleep(self.policy.delay).await;
                }
            }
        }
    }

    async fn claim(&self, doc_id: &str, key: &str) -> Result<Attempt, AllocateError> {
        let mut doc = match self.store.get(doc_id).await {
            Ok(doc) => doc,
            Err(StorageError::NotFound { .. }) => Document::new(doc_id),
            Err(e) => return Ok(Attempt::StoreError(e)),
        };

        let index = match doc.get(key) {
            None => 1,
            Some(v) => v
                .as_u64()
                .filter(|n| (1..u64::MAX).contains(n))
                .ok_or_else(|| AllocateError::CorruptCounter {
                    doc_id: doc_id.to_string(),
                    date_key: key.to_string(),
                    value: v.clone(),
                })?,
        };
        doc.insert(key, Value::from(index + 1));

        Ok(match self.store.put(&doc).await {
            Ok(_) => Attempt::Claimed(index),
            Err(StorageError::Conflict { .. }) => Attempt::Conflict,
            Err(e) => Attempt::StoreError(e),
        })
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}
