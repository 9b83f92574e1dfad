//! Directory-backed document store: one `<id>.json` file per document.
//!
//! Writes are serialized through an exclusive lock file in the store
//! directory, so the revision check and the write form one atomic step for
//! every process sharing the directory. Document files are replaced by
//! rename, so readers never observe a partial write.
//!
//! The lock file records the holder's pid and acquisition time. A lock whose
//! holder is gone, or that outlived [`LOCK_TIMEOUT`], is broken by the next
//! writer instead of wedging the store.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{next_rev, Document};
use crate::error::StorageError;
use crate::traits::DocumentStore;

const LOCK_FILE: &str = ".lock";
const LOCK_POLL: Duration = Duration::from_millis(2);
const LOCK_TIMEOUT: Duration = Duration::from_secs(5);
/// How long an empty or unreadable lock file may exist before it is broken.
/// Covers the window between creating the file and writing its metadata.
const LOCK_STALE_GRACE: Duration = Duration::from_secs(1);

/// Document store persisted as JSON files under a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            StorageError::Backend(format!("could not create '{}': {}", root.display(), e))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn doc_path(root: &Path, id: &str) -> Result<PathBuf, StorageError> {
    let valid = !id.is_empty()
        && !id.starts_with('.')
        && !id.contains(|c: char| c == '/' || c == '\\')
        && !id.chars().any(char::is_control);
    if !valid {
        return Err(StorageError::Backend(format!("invalid document id '{id}'")));
    }
    Ok(root.join(format!("{id}.json")))
}

fn read_doc(root: &Path, id: &str) -> Result<Document, StorageError> {
    let path = doc_path(root, id)?;
    let content = match fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(StorageError::NotFound {
                doc_id: id.to_string(),
            })
        }
        Err(e) => {
            return Err(StorageError::Backend(format!(
                "could not read '{}': {}",
                path.display(),
                e
            )))
        }
    };
    let value: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
        StorageError::Backend(format!("could not parse '{}': {}", path.display(), e))
    })?;
    Document::from_value(value)
}

/// Metadata written into the lock file by its holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct LockMeta {
    pid: u32,
    acquired_at_ms: u64,
}

impl LockMeta {
    fn current() -> Self {
        Self {
            pid: std::process::id(),
            acquired_at_ms: now_ms(),
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Whether `pid` names a running process. Without a cheap way to tell on
/// this platform, every holder counts as alive and only age breaks a lock.
#[cfg(target_os = "linux")]
fn pid_is_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

#[cfg(not(target_os = "linux"))]
fn pid_is_alive(_pid: u32) -> bool {
    true
}

/// Decide whether the lock at `path` was abandoned by its holder.
fn lock_is_stale(path: &Path) -> bool {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return false,
    };
    match serde_json::from_str::<LockMeta>(&content) {
        Ok(meta) => {
            let expired =
                now_ms().saturating_sub(meta.acquired_at_ms) > LOCK_TIMEOUT.as_millis() as u64;
            let orphaned = meta.pid != std::process::id() && !pid_is_alive(meta.pid);
            expired || orphaned
        }
        // Empty or garbled: either a holder mid-acquire or one that died there.
        Err(_) => fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .is_some_and(|age| age > LOCK_STALE_GRACE),
    }
}

/// Held for the duration of one put; removes the lock file on drop.
struct DirLock {
    path: PathBuf,
}

impl DirLock {
    fn acquire(root: &Path) -> Result<Self, StorageError> {
        let path = root.join(LOCK_FILE);
        let started = Instant::now();
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let lock = Self { path };
                    let meta = serde_json::to_vec(&LockMeta::current()).map_err(|e| {
                        StorageError::Backend(format!("could not encode lock metadata: {e}"))
                    })?;
                    file.write_all(&meta).map_err(|e| {
                        StorageError::Backend(format!(
                            "could not write '{}': {}",
                            lock.path.display(),
                            e
                        ))
                    })?;
                    return Ok(lock);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if lock_is_stale(&path) {
                        tracing::warn!(path = %path.display(), "breaking stale store lock");
                        match fs::remove_file(&path) {
                            Ok(()) => continue,
                            Err(e) if e.kind() == ErrorKind::NotFound => continue,
                            Err(e) => {
                                return Err(StorageError::Backend(format!(
                                    "could not break stale lock '{}': {}",
                                    path.display(),
                                    e
                                )))
                            }
                        }
                    }
                    if started.elapsed() > LOCK_TIMEOUT {
                        return Err(StorageError::Backend(format!(
                            "timed out waiting for '{}'",
                            path.display()
                        )));
                    }
                    std::thread::sleep(LOCK_POLL);
                }
                Err(e) => {
                    return Err(StorageError::Backend(format!(
                        "could not lock '{}': {}",
                        path.display(),
                        e
                    )))
                }
            }
        }
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn write_doc(root: &Path, doc: &Document) -> Result<String, StorageError> {
    let path = doc_path(root, &doc.id)?;
    let _lock = DirLock::acquire(root)?;

    let current = match read_doc(root, &doc.id) {
        Ok(d) => d.rev,
        Err(StorageError::NotFound { .. }) => None,
        Err(e) => return Err(e),
    };
    let exists = path.exists();
    let matches = match (&doc.rev, &current) {
        (None, _) => !exists,
        (Some(expected), Some(actual)) => expected == actual,
        (Some(_), None) => false,
    };
    if !matches {
        return Err(StorageError::Conflict {
            doc_id: doc.id.clone(),
            rev: doc.rev.clone(),
        });
    }

    let rev = next_rev(current.as_deref(), &doc.body);
    let mut stored = doc.clone();
    stored.rev = Some(rev.clone());
    let json = serde_json::to_string_pretty(&stored.to_value())
        .map_err(|e| StorageError::Backend(format!("could not serialize {}: {}", doc.id, e)))?;

    let tmp = root.join(format!(".{}.tmp", doc.id));
    fs::write(&tmp, json)
        .map_err(|e| StorageError::Backend(format!("could not write '{}': {}", tmp.display(), e)))?;
    fs::rename(&tmp, &path).map_err(|e| {
        StorageError::Backend(format!("could not replace '{}': {}", path.display(), e))
    })?;

    tracing::trace!(doc_id = %doc.id, rev = %rev, "document written");
    Ok(rev)
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn get(&self, id: &str) -> Result<Document, StorageError> {
        let root = self.root.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || read_doc(&root, &id))
            .await
            .map_err(|e| StorageError::Backend(format!("read task failed: {e}")))?
    }

    async fn put(&self, doc: &Document) -> Result<String, StorageError> {
        let root = self.root.clone();
        let doc = doc.clone();
        tokio::task::spawn_blocking(move || write_doc(&root, &doc))
            .await
            .map_err(|e| StorageError::Backend(format!("write task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_path_like_ids() {
        let root = Path::new("/tmp/store");
        assert!(doc_path(root, "../etc/passwd").is_err());
        assert!(doc_path(root, ".lock").is_err());
        assert!(doc_path(root, "").is_err());
        assert!(doc_path(root, "UA-2024-03-05-000001").is_ok());
    }

    #[tokio::test]
    async fn documents_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let mut doc = Document::new("lotID");
        doc.insert("2024-03-05", serde_json::json!(2));
        let rev = store.put(&doc).await.unwrap();

        let reopened = FileStore::open(dir.path()).unwrap();
        let read = reopened.get("lotID").await.unwrap();
        assert_eq!(read.rev, Some(rev));
        assert_eq!(read.get("2024-03-05"), Some(&serde_json::json!(2)));
        assert!(!dir.path().join(LOCK_FILE).exists());
    }

    fn seed_lock(dir: &Path, meta: &LockMeta) {
        fs::write(dir.join(LOCK_FILE), serde_json::to_vec(meta).unwrap()).unwrap();
    }

    fn counter_doc() -> Document {
        let mut doc = Document::new("lotID");
        doc.insert("2024-03-05", serde_json::json!(1));
        doc
    }

    #[test]
    fn held_lock_records_holder() {
        let dir = tempfile::tempdir().unwrap();
        let lock = DirLock::acquire(dir.path()).unwrap();
        let raw = fs::read_to_string(dir.path().join(LOCK_FILE)).unwrap();
        let meta: LockMeta = serde_json::from_str(&raw).unwrap();
        assert_eq!(meta.pid, std::process::id());
        assert!(!lock_is_stale(&dir.path().join(LOCK_FILE)));
        drop(lock);
        assert!(!dir.path().join(LOCK_FILE).exists());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn lock_of_dead_holder_is_broken() {
        let dir = tempfile::tempdir().unwrap();
        seed_lock(
            dir.path(),
            &LockMeta {
                pid: u32::MAX,
                acquired_at_ms: now_ms(),
            },
        );
        let store = FileStore::open(dir.path()).unwrap();

        let started = Instant::now();
        store.put(&counter_doc()).await.unwrap();
        assert!(started.elapsed() < LOCK_TIMEOUT);
        assert!(!dir.path().join(LOCK_FILE).exists());
    }

    #[tokio::test]
    async fn expired_lock_is_broken() {
        let dir = tempfile::tempdir().unwrap();
        seed_lock(
            dir.path(),
            &LockMeta {
                pid: std::process::id(),
                acquired_at_ms: 0,
            },
        );
        let store = FileStore::open(dir.path()).unwrap();

        let started = Instant::now();
        store.put(&counter_doc()).await.unwrap();
        assert!(started.elapsed() < LOCK_TIMEOUT);
        let read = store.get("lotID").await.unwrap();
        assert_eq!(read.get("2024-03-05"), Some(&serde_json::json!(1)));
    }

    #[tokio::test]
    async fn abandoned_empty_lock_is_broken() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join(LOCK_FILE);
        let file = fs::File::create(&lock_path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(60))
            .unwrap();
        drop(file);
        let store = FileStore::open(dir.path()).unwrap();

        let started = Instant::now();
        store.put(&counter_doc()).await.unwrap();
        assert!(started.elapsed() < LOCK_TIMEOUT);
    }

    #[test]
    fn fresh_empty_lock_is_not_broken() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join(LOCK_FILE);
        fs::File::create(&lock_path).unwrap();
        assert!(!lock_is_stale(&lock_path));
    }
}
