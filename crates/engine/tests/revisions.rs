//! Revision engine behaviour against real stores.

use std::sync::Arc;

use lotreg_core::{apply, format_timestamp, ChangeOp, Lot, LotTypeRegistry};
use lotreg_engine::{RevisionEngine, SaveOutcome, SequenceAllocator};
use lotreg_storage::{DocumentStore, FileStore, MemoryStore};
use serde_json::{json, Value};
use time::macros::datetime;
use time::OffsetDateTime;

const T0: OffsetDateTime = datetime!(2024-03-05 10:00 UTC);
const T1: OffsetDateTime = datetime!(2024-03-06 11:30 UTC);
const LOT_ID: &str = "UA-2024-03-05-000001";

fn engine() -> RevisionEngine<MemoryStore> {
    RevisionEngine::new(
        MemoryStore::new(),
        Arc::new(LotTypeRegistry::with_defaults().unwrap()),
    )
}

async fn create<S: DocumentStore>(engine: &RevisionEngine<S>, data: Value) -> Lot {
    let mut lot = Lot::from_data(LOT_ID, &data).unwrap();
    let outcome = engine.save(&mut lot, &json!({}), "broker", T0).await;
    assert!(outcome.is_success(), "create failed: {outcome:?}");
    lot
}

fn milestone_lot(milestone: Value) -> Value {
    json!({"title": "Lot", "status": "active", "milestones": [milestone]})
}

#[tokio::test]
async fn first_save_records_the_whole_lot() {
    let engine = engine();
    let mut lot = Lot::from_data(LOT_ID, &json!({"title": "Lot", "status": "draft"})).unwrap();

    let outcome = engine.save(&mut lot, &json!({}), "broker", T0).await;

    let receipt = outcome.receipt().cloned().expect("receipt");
    assert_eq!(receipt.lot_id, LOT_ID);
    assert_eq!(receipt.old_date_modified, None);
    assert_eq!(receipt.new_date_modified, Some(T0));
    assert_eq!(lot.rev.as_deref(), Some(receipt.rev.as_str()));
    assert_eq!(lot.date_modified, Some(T0));

    assert_eq!(lot.revisions.len(), 1);
    let entry = &lot.revisions[0];
    assert_eq!(entry.author, "broker");
    assert_eq!(entry.rev, None);
    assert!(entry.changes.contains(&ChangeOp::add("/title", json!("Lot"))));

    let stored = engine.load(LOT_ID).await.unwrap();
    assert_eq!(stored, lot);
}

#[tokio::test]
async fn unchanged_lot_is_not_written() {
    let engine = engine();
    create(&engine, json!({"title": "Lot"})).await;
    let writes = engine.store().write_count();

    let mut lot = engine.load(LOT_ID).await.unwrap();
    let src = lot.to_plain();
    let before = lot.clone();

    let outcome = engine.save(&mut lot, &src, "broker", T1).await;

    assert_eq!(outcome, SaveOutcome::Success(None));
    assert_eq!(engine.store().write_count(), writes);
    assert_eq!(lot, before);
}

#[tokio::test]
async fn milestone_status_change_stamps_its_date() {
    let engine = engine();
    create(
        &engine,
        milestone_lot(json!({"status": "active", "date": "2024-01-01"})),
    )
    .await;

    let mut lot = engine.load(LOT_ID).await.unwrap();
    let created_rev = lot.rev.clone();
    let src = lot.to_plain();
    lot.fields["milestones"][0]["status"] = json!("complete");

    let outcome = engine.save(&mut lot, &src, "broker", T1).await;
    assert!(outcome.is_success(), "{outcome:?}");

    let stamp = format_timestamp(T1);
    let entry = lot.revisions.last().unwrap();
    assert_eq!(entry.rev, created_rev);
    assert_eq!(
        entry.changes,
        vec![
            ChangeOp::replace("/milestones/0/status", json!("complete")),
            ChangeOp::replace("/milestones/0/date", json!(stamp.clone())),
        ]
    );
    assert_eq!(lot.fields["milestones"][0]["date"], json!(stamp.clone()));

    let stored = engine.load(LOT_ID).await.unwrap();
    assert_eq!(stored.fields["milestones"][0]["date"], json!(stamp));
    assert_eq!(stored.revisions.len(), 2);
}

#[tokio::test]
async fn undated_milestone_records_a_date_removal() {
    let engine = engine();
    create(&engine, milestone_lot(json!({"status": "active"}))).await;

    let mut lot = engine.load(LOT_ID).await.unwrap();
    let src = lot.to_plain();
    lot.fields["milestones"][0]["status"] = json!("complete");

    assert!(engine.save(&mut lot, &src, "broker", T1).await.is_success());

    let entry = lot.revisions.last().unwrap();
    assert_eq!(entry.changes[1], ChangeOp::remove("/milestones/0/date"));
    assert_eq!(
        lot.fields["milestones"][0]["date"],
        json!(format_timestamp(T1))
    );
}

#[tokio::test]
async fn bid_status_changes_leave_dates_alone() {
    let engine = engine();
    create(
        &engine,
        json!({"title": "Lot", "bids": [{"status": "active", "date": "2024-01-01"}]}),
    )
    .await;

    let mut lot = engine.load(LOT_ID).await.unwrap();
    let src = lot.to_plain();
    lot.fields["bids"][0]["status"] = json!("invalid");

    assert!(engine.save(&mut lot, &src, "broker", T1).await.is_success());

    let entry = lot.revisions.last().unwrap();
    assert_eq!(
        entry.changes,
        vec![ChangeOp::replace("/bids/0/status", json!("invalid"))]
    );
    assert_eq!(lot.fields["bids"][0]["date"], json!("2024-01-01"));
}

#[tokio::test]
async fn validation_failure_reports_every_field_and_changes_nothing() {
    let engine = engine();
    create(&engine, json!({"title": "Lot", "status": "draft"})).await;
    let writes = engine.store().write_count();

    let mut lot = engine.load(LOT_ID).await.unwrap();
    let src = lot.to_plain();
    lot.fields.remove("title");
    lot.fields.insert("status".into(), json!(5));
    let before = lot.clone();

    let outcome = engine.save(&mut lot, &src, "broker", T1).await;

    let SaveOutcome::ValidationFailed(errors) = outcome else {
        panic!("expected ValidationFailed, got {outcome:?}");
    };
    assert_eq!(errors.fields().collect::<Vec<_>>(), ["status", "title"]);
    assert_eq!(lot, before);
    assert_eq!(lot.revisions.len(), 1);
    assert_eq!(lot.date_modified, Some(T0));
    assert_eq!(engine.store().write_count(), writes);
}

#[tokio::test]
async fn stale_revision_is_a_conflict() {
    let engine = engine();
    create(&engine, json!({"title": "Lot"})).await;

    let mut first = engine.load(LOT_ID).await.unwrap();
    let mut second = engine.load(LOT_ID).await.unwrap();
    let src = first.to_plain();

    first.fields.insert("description".into(), json!("first"));
    assert!(engine.save(&mut first, &src, "a", T1).await.is_success());

    second.fields.insert("description".into(), json!("second"));
    let before = second.clone();
    let outcome = engine.save(&mut second, &src, "b", T1).await;

    assert!(matches!(outcome, SaveOutcome::Conflict(_)), "{outcome:?}");
    assert_eq!(second, before);
    let stored = engine.load(LOT_ID).await.unwrap();
    assert_eq!(stored.fields["description"], json!("first"));
}

#[tokio::test]
async fn store_failure_is_reported_and_not_retried() {
    let engine = engine();
    create(&engine, json!({"title": "Lot"})).await;

    let mut lot = engine.load(LOT_ID).await.unwrap();
    let src = lot.to_plain();
    lot.fields.insert("description".into(), json!("d"));
    let before = lot.clone();

    engine.store().fail_next_puts(1);
    let outcome = engine.save(&mut lot, &src, "broker", T1).await;

    assert!(matches!(outcome, SaveOutcome::StoreError(_)), "{outcome:?}");
    assert_eq!(lot, before);
}

#[tokio::test]
async fn test_mode_marks_titles_before_diffing() {
    let engine = engine();
    let lot = create(
        &engine,
        json!({"title": "Лот", "title_en": "Lot", "mode": "test"}),
    )
    .await;

    assert_eq!(lot.fields["title"], json!("[ТЕСТУВАННЯ] Лот"));
    assert_eq!(lot.fields["title_en"], json!("[TESTING] Lot"));
    assert_eq!(lot.fields["title_ru"], json!("[ТЕСТИРОВАНИЕ] "));
    assert!(lot.revisions[0]
        .changes
        .contains(&ChangeOp::add("/title", json!("[ТЕСТУВАННЯ] Лот"))));

    let mut again = engine.load(LOT_ID).await.unwrap();
    let src = again.to_plain();
    let outcome = engine.save(&mut again, &src, "broker", T1).await;
    assert_eq!(outcome, SaveOutcome::Success(None));
}

#[tokio::test]
async fn cleared_modified_flag_keeps_date_modified() {
    let engine = engine();
    create(&engine, json!({"title": "Lot"})).await;

    let mut lot = engine.load(LOT_ID).await.unwrap();
    let src = lot.to_plain();
    lot.modified = Some(false);
    lot.fields.insert("description".into(), json!("backdated"));

    let outcome = engine.save(&mut lot, &src, "admin", T1).await;

    let receipt = outcome.receipt().cloned().expect("receipt");
    assert_eq!(receipt.old_date_modified, Some(T0));
    assert_eq!(receipt.new_date_modified, Some(T0));
    assert_eq!(lot.revisions.len(), 2);
    let stored = engine.load(LOT_ID).await.unwrap();
    assert_eq!(stored.date_modified, Some(T0));
}

#[tokio::test]
async fn recorded_changes_replay_onto_the_snapshot() {
    let engine = engine();
    create(
        &engine,
        json!({"title": "Lot", "description": "old", "items": [{"status": "a"}, {"status": "b"}]}),
    )
    .await;

    let mut lot = engine.load(LOT_ID).await.unwrap();
    let src = lot.to_plain();
    lot.fields.insert("title".into(), json!("New"));
    lot.fields.remove("description");
    lot.fields.insert("items".into(), json!([{"status": "a", "unit": "kg"}]));

    assert!(engine.save(&mut lot, &src, "broker", T1).await.is_success());

    let mut replayed = src.clone();
    apply(&mut replayed, &lot.revisions.last().unwrap().changes).unwrap();
    assert_eq!(replayed, lot.to_plain());
}

#[tokio::test]
async fn patch_merges_and_applies_the_invariant() {
    let engine = engine();
    create(
        &engine,
        milestone_lot(json!({"status": "active", "date": "2024-01-01"})),
    )
    .await;
    let mut lot = engine.load(LOT_ID).await.unwrap();

    let outcome = engine
        .patch(
            &mut lot,
            &json!({"milestones": [{"status": "complete"}]}),
            "broker",
            T1,
            true,
        )
        .await;

    assert!(outcome.is_success(), "{outcome:?}");
    assert_eq!(lot.fields["milestones"][0]["status"], json!("complete"));
    assert_eq!(
        lot.fields["milestones"][0]["date"],
        json!(format_timestamp(T1))
    );

    let writes = engine.store().write_count();
    let outcome = engine
        .patch(&mut lot, &json!({"title": "Lot"}), "broker", T1, true)
        .await;
    assert_eq!(outcome, SaveOutcome::Success(None));
    assert_eq!(engine.store().write_count(), writes);
}

#[tokio::test]
async fn file_store_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::open(dir.path()).unwrap());
    let allocator = SequenceAllocator::new(store.clone());
    let engine = RevisionEngine::new(
        store.clone(),
        Arc::new(LotTypeRegistry::with_defaults().unwrap()),
    );

    let id = allocator.allocate(T0).await.unwrap().to_string();
    let mut lot = Lot::from_data(id.clone(), &json!({"title": "Lot"})).unwrap();
    assert!(engine.save(&mut lot, &json!({}), "broker", T0).await.is_success());

    let mut loaded = engine.load(&id).await.unwrap();
    let outcome = engine
        .patch(&mut loaded, &json!({"status": "active"}), "broker", T1, true)
        .await;
    assert!(outcome.is_success(), "{outcome:?}");

    let reloaded = engine.load(&id).await.unwrap();
    assert_eq!(reloaded.fields["status"], json!("active"));
    assert_eq!(reloaded.revisions.len(), 2);
    assert_eq!(reloaded.date_modified, Some(T1));
    assert!(dir.path().join(format!("{id}.json")).exists());
}
