use std::future::Future;
use std::sync::Arc;

use serde_json::json;

use super::{make_counter, TestResult};
use crate::{DocumentStore, StorageError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_replaces_exactly_one_wins",
        concurrent_replaces_exactly_one_wins(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_creates_exactly_one_wins",
        concurrent_creates_exactly_one_wins(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_puts_different_documents_all_succeed",
        concurrent_puts_different_documents_all_succeed(factory).await,
    ));

    results
}

/// Tally spawned put outcomes: `Ok(true)` won, `Ok(false)` lost on conflict.
async fn tally(
    handles: Vec<tokio::task::JoinHandle<Result<bool, StorageError>>>,
) -> Result<(usize, usize), String> {
    let mut winners = 0usize;
    let mut losers = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        } else {
            losers += 1;
        }
    }
    Ok((winners, losers))
}

fn conflict_is_loss(result: Result<String, StorageError>) -> Result<bool, StorageError> {
    match result {
        Ok(_) => Ok(true),
        Err(StorageError::Conflict { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}

// ── Concurrent replace: exactly one wins ─────────────────────────────────────

/// N tasks each write the same document at the same revision. Exactly one
/// put succeeds; the rest must get Conflict.
async fn concurrent_replaces_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);

    let rev = storage
        .put(&make_counter("lotID", "2024-03-05", 1))
        .await
        .map_err(|e| format!("create: {e}"))?;

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        let mut doc = make_counter("lotID", "2024-03-05", 2);
        doc.rev = Some(rev.clone());
        doc.insert("writer", json!(i));
        handles.push(tokio::spawn(
            async move { conflict_is_loss(s.put(&doc).await) },
        ));
    }

    let (winners, losers) = tally(handles).await?;
    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    if losers != N - 1 {
        return Err(format!("expected {} losers, got {losers}", N - 1));
    }
    Ok(())
}

// ── Concurrent create: exactly one wins ──────────────────────────────────────

async fn concurrent_creates_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        let mut doc = make_counter("lotID", "2024-03-05", 2);
        doc.insert("writer", json!(i));
        handles.push(tokio::spawn(
            async move { conflict_is_loss(s.put(&doc).await) },
        ));
    }

    let (winners, losers) = tally(handles).await?;
    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    if losers != N - 1 {
        return Err(format!("expected {} losers, got {losers}", N - 1));
    }
    Ok(())
}

// ── Concurrent puts to different documents: all succeed ──────────────────────

/// N tasks each create a different document. All should succeed; there are
/// no false conflicts without contention.
async fn concurrent_puts_different_documents_all_succeed<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        let doc = make_counter(&format!("lotID_srv{i}"), "2024-03-05", 2);
        handles.push(tokio::spawn(
            async move { conflict_is_loss(s.put(&doc).await) },
        ));
    }

    let (winners, losers) = tally(handles).await?;
    if winners != N {
        return Err(format!("expected {N} winners, got {winners} ({losers} conflicts)"));
    }
    for i in 0..N {
        storage
            .get(&format!("lotID_srv{i}"))
            .await
            .map_err(|e| format!("get lotID_srv{i}: {e}"))?;
    }
    Ok(())
}
