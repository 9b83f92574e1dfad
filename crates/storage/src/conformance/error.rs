use std::future::Future;

use super::{make_counter, TestResult};
use crate::{DocumentStore, StorageError};

pub(super) async fn run_error_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "error",
        "get_nonexistent_returns_not_found",
        get_nonexistent_returns_not_found(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "not_found_has_correct_doc_id",
        not_found_has_correct_doc_id(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "other_documents_do_not_satisfy_get",
        other_documents_do_not_satisfy_get(factory).await,
    ));

    results
}

// ── 1. get on empty store returns NotFound ────────────────────────────────────

async fn get_nonexistent_returns_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get("lotID").await {
        Err(StorageError::NotFound { .. }) => Ok(()),
        other => Err(format!("expected NotFound, got {:?}", other)),
    }
}

// ── 2. NotFound carries the requested id ──────────────────────────────────────

async fn not_found_has_correct_doc_id<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get("UA-2024-03-05-000042").await {
        Err(StorageError::NotFound { doc_id }) if doc_id == "UA-2024-03-05-000042" => Ok(()),
        Err(StorageError::NotFound { doc_id }) => Err(format!(
            "expected doc_id 'UA-2024-03-05-000042', got '{doc_id}'"
        )),
        other => Err(format!("expected NotFound, got {:?}", other)),
    }
}

// ── 3. A stored document does not leak into lookups of other ids ─────────────

async fn other_documents_do_not_satisfy_get<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.put(&make_counter("lotID", "2024-03-05", 2))
        .await
        .map_err(|e| format!("put: {e}"))?;
    match s.get("lotID_srv1").await {
        Err(StorageError::NotFound { .. }) => Ok(()),
        other => Err(format!("expected NotFound, got {:?}", other)),
    }
}
