use std::future::Future;

use serde_json::json;

use super::{make_counter, TestResult};
use crate::{DocumentStore, StorageError};

pub(super) async fn run_revision_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    // Creation
    results.push(TestResult::from_result(
        "revision",
        "create_assigns_revision",
        create_assigns_revision(factory).await,
    ));
    results.push(TestResult::from_result(
        "revision",
        "create_over_existing_conflicts",
        create_over_existing_conflicts(factory).await,
    ));

    // Revision-gated replace
    results.push(TestResult::from_result(
        "revision",
        "put_with_current_rev_replaces",
        put_with_current_rev_replaces(factory).await,
    ));
    results.push(TestResult::from_result(
        "revision",
        "put_with_stale_rev_conflicts",
        put_with_stale_rev_conflicts(factory).await,
    ));
    results.push(TestResult::from_result(
        "revision",
        "put_with_rev_on_missing_document_conflicts",
        put_with_rev_on_missing_document_conflicts(factory).await,
    ));
    results.push(TestResult::from_result(
        "revision",
        "revision_changes_on_every_write",
        revision_changes_on_every_write(factory).await,
    ));

    // Conflict details
    results.push(TestResult::from_result(
        "revision",
        "conflict_has_correct_fields",
        conflict_has_correct_fields(factory).await,
    ));
    results.push(TestResult::from_result(
        "revision",
        "conflicting_put_leaves_document_unchanged",
        conflicting_put_leaves_document_unchanged(factory).await,
    ));

    results
}

// ── Creation ──────────────────────────────────────────────────────────────────

async fn create_assigns_revision<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let rev = s
        .put(&make_counter("lotID", "2024-03-05", 2))
        .await
        .map_err(|e| format!("put: {e}"))?;
    let stored = s.get("lotID").await.map_err(|e| format!("get: {e}"))?;
    if stored.rev.as_deref() != Some(rev.as_str()) {
        return Err(format!(
            "stored rev {:?} does not match returned rev {rev}",
            stored.rev
        ));
    }
    if stored.get("2024-03-05") != Some(&json!(2)) {
        return Err(format!("unexpected body: {:?}", stored.body));
    }
    Ok(())
}

async fn create_over_existing_conflicts<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.put(&make_counter("lotID", "2024-03-05", 2))
        .await
        .map_err(|e| format!("first put: {e}"))?;
    match s.put(&make_counter("lotID", "2024-03-05", 2)).await {
        Err(StorageError::Conflict { .. }) => Ok(()),
        other => Err(format!("expected Conflict, got {:?}", other)),
    }
}

// ── Revision-gated replace ────────────────────────────────────────────────────

async fn put_with_current_rev_replaces<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.put(&make_counter("lotID", "2024-03-05", 2))
        .await
        .map_err(|e| format!("create: {e}"))?;
    let mut doc = s.get("lotID").await.map_err(|e| format!("get: {e}"))?;
    doc.insert("2024-03-05", json!(3));
    s.put(&doc).await.map_err(|e| format!("replace: {e}"))?;

    let stored = s.get("lotID").await.map_err(|e| format!("reread: {e}"))?;
    if stored.get("2024-03-05") != Some(&json!(3)) {
        return Err(format!("expected counter 3, got {:?}", stored.body));
    }
    Ok(())
}

async fn put_with_stale_rev_conflicts<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.put(&make_counter("lotID", "2024-03-05", 2))
        .await
        .map_err(|e| format!("create: {e}"))?;

    // Two readers observe the same revision; the second writer is stale.
    let mut first = s.get("lotID").await.map_err(|e| format!("get 1: {e}"))?;
    let mut second = s.get("lotID").await.map_err(|e| format!("get 2: {e}"))?;
    first.insert("2024-03-05", json!(3));
    second.insert("2024-03-05", json!(3));

    s.put(&first).await.map_err(|e| format!("first writer: {e}"))?;
    match s.put(&second).await {
        Err(StorageError::Conflict { .. }) => Ok(()),
        other => Err(format!("expected Conflict, got {:?}", other)),
    }
}

async fn put_with_rev_on_missing_document_conflicts<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut doc = make_counter("lotID", "2024-03-05", 2);
    doc.rev = Some("1-0000000000000000".to_string());
    match s.put(&doc).await {
        Err(StorageError::Conflict { .. }) => Ok(()),
        other => Err(format!("expected Conflict, got {:?}", other)),
    }
}

async fn revision_changes_on_every_write<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut seen = Vec::new();
    let mut doc = make_counter("lotID", "2024-03-05", 1);
    for next in 2..6 {
        doc.insert("2024-03-05", json!(next));
        let rev = s
            .put(&doc)
            .await
            .map_err(|e| format!("write {next}: {e}"))?;
        if seen.contains(&rev) {
            return Err(format!("revision {rev} was reused"));
        }
        seen.push(rev.clone());
        doc.rev = Some(rev);
    }
    Ok(())
}

// ── Conflict details ──────────────────────────────────────────────────────────

async fn conflict_has_correct_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.put(&make_counter("lotID_srv1", "2024-03-05", 2))
        .await
        .map_err(|e| format!("create: {e}"))?;
    let mut stale = make_counter("lotID_srv1", "2024-03-05", 3);
    stale.rev = Some("99-ffffffffffffffff".to_string());
    match s.put(&stale).await {
        Err(StorageError::Conflict { doc_id, rev }) => {
            if doc_id != "lotID_srv1" {
                return Err(format!("expected doc_id 'lotID_srv1', got '{doc_id}'"));
            }
            if rev.as_deref() != Some("99-ffffffffffffffff") {
                return Err(format!("expected stale rev in conflict, got {:?}", rev));
            }
            Ok(())
        }
        other => Err(format!("expected Conflict, got {:?}", other)),
    }
}

async fn conflicting_put_leaves_document_unchanged<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let rev = s
        .put(&make_counter("lotID", "2024-03-05", 2))
        .await
        .map_err(|e| format!("create: {e}"))?;
    let _ = s.put(&make_counter("lotID", "2024-03-05", 9)).await;

    let stored = s.get("lotID").await.map_err(|e| format!("get: {e}"))?;
    if stored.rev.as_deref() != Some(rev.as_str()) {
        return Err(format!("rev moved to {:?} after a conflict", stored.rev));
    }
    if stored.get("2024-03-05") != Some(&json!(2)) {
        return Err(format!("body changed after a conflict: {:?}", stored.body));
    }
    Ok(())
}
