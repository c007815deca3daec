// tests/progress_tests.rs
//! Progress tracker and retry queue against a real datastore file

mod support;
use support::TestDatastore;

use pii_key_rotation::db::progress::{self, ErrorLogEntry, ProgressUpdate, RotationRun};
use pii_key_rotation::db::retry_queue;
use pii_key_rotation::{ProgressStatus, RotationError};

fn entry(record_id: i64) -> ErrorLogEntry {
    ErrorLogEntry {
        record_id,
        error: "decryption failed for column `email`: wrong key or corrupt ciphertext".into(),
        timestamp: "2026-10-16T00:00:00+00:00".into(),
    }
}

#[test]
fn get_or_create_is_idempotent() {
    let db = TestDatastore::new();
    let first = progress::get_or_create(&db.conn, "rot-a", "contacts", "h-old", "h-new").unwrap();
    assert_eq!(first.status, ProgressStatus::InProgress);
    assert_eq!(first.processed_records, 0);
    assert!(first.last_checkpoint_id.is_none());
    assert!(first.error_log.is_empty());

    let again = progress::get_or_create(&db.conn, "rot-a", "contacts", "h-old", "h-new").unwrap();
    assert_eq!(first.id, again.id);

    let other = progress::get_or_create(&db.conn, "rot-b", "contacts", "h-old", "h-new").unwrap();
    assert_ne!(first.id, other.id);
}

#[test]
fn error_log_is_appended_never_replaced() {
    let db = TestDatastore::new();
    let p = progress::get_or_create(&db.conn, "rot-a", "contacts", "h-old", "h-new").unwrap();

    progress::update(
        &db.conn,
        p.id,
        &ProgressUpdate {
            failed_records: Some(1),
            append_errors: vec![entry(4)],
            ..Default::default()
        },
    )
    .unwrap();
    let p = progress::update(
        &db.conn,
        p.id,
        &ProgressUpdate {
            failed_records: Some(2),
            append_errors: vec![entry(9)],
            ..Default::default()
        },
    )
    .unwrap();

    let ids: Vec<i64> = p.error_log.iter().map(|e| e.record_id).collect();
    assert_eq!(ids, vec![4, 9]);
    assert_eq!(p.failed_records, 2);

    let reloaded = progress::load(&db.conn, p.id).unwrap();
    assert_eq!(reloaded.error_log, p.error_log);
}

#[test]
fn checkpoint_never_moves_backwards() {
    let db = TestDatastore::new();
    let p = progress::get_or_create(&db.conn, "rot-a", "deals", "h-old", "h-new").unwrap();

    let forward = |id| ProgressUpdate {
        last_checkpoint_id: Some(id),
        ..Default::default()
    };
    progress::update(&db.conn, p.id, &forward(200)).unwrap();
    let p = progress::update(&db.conn, p.id, &forward(150)).unwrap();
    assert_eq!(p.last_checkpoint_id, Some(200));
}

#[test]
fn untouched_fields_survive_partial_updates() {
    let db = TestDatastore::new();
    let p = progress::get_or_create(&db.conn, "rot-a", "deals", "h-old", "h-new").unwrap();
    progress::update(
        &db.conn,
        p.id,
        &ProgressUpdate {
            total_records: Some(10),
            processed_records: Some(4),
            ..Default::default()
        },
    )
    .unwrap();

    let p = progress::update(
        &db.conn,
        p.id,
        &ProgressUpdate {
            status: Some(ProgressStatus::Completed),
            completed_at: Some("2026-10-16T01:00:00+00:00".into()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(p.total_records, 10);
    assert_eq!(p.processed_records, 4);
    assert_eq!(p.status, ProgressStatus::Completed);
    assert!(p.completed_at.is_some());
}

fn run(id: &str, old: &str, dry_run: bool) -> RotationRun {
    RotationRun {
        rotation_id: id.into(),
        old_key_hash: old.into(),
        new_key_hash: "h-new".into(),
        started_at: "2026-10-16T00:00:00+00:00".into(),
        dry_run,
    }
}

#[test]
fn run_record_is_written_once() {
    let db = TestDatastore::new();
    let first = progress::record_run(&db.conn, &run("rot-a", "h-old", false)).unwrap();

    let mut later = run("rot-a", "h-old", false);
    later.started_at = "2026-10-17T00:00:00+00:00".into();
    let stored = progress::record_run(&db.conn, &later).unwrap();
    assert_eq!(stored.started_at, first.started_at);
}

#[test]
fn run_id_cannot_be_reused_with_other_keys_or_mode() {
    let db = TestDatastore::new();
    progress::record_run(&db.conn, &run("rot-a", "h-old", false)).unwrap();

    assert!(matches!(
        progress::record_run(&db.conn, &run("rot-a", "h-other", false)),
        Err(RotationError::Configuration(_))
    ));
    assert!(matches!(
        progress::record_run(&db.conn, &run("rot-a", "h-old", true)),
        Err(RotationError::Configuration(_))
    ));
}

#[test]
fn retry_queue_counts_attempts_and_resolves() {
    let db = TestDatastore::new();
    retry_queue::enqueue(&db.conn, "rot-a", "contacts", 12, "first").unwrap();
    retry_queue::enqueue(&db.conn, "rot-a", "contacts", 3, "first").unwrap();
    retry_queue::enqueue(&db.conn, "rot-a", "contacts", 12, "second").unwrap();

    assert_eq!(
        retry_queue::pending_ids(&db.conn, "rot-a", "contacts").unwrap(),
        vec![3, 12]
    );
    assert_eq!(
        retry_queue::attempts(&db.conn, "rot-a", "contacts").unwrap(),
        vec![(3, 1), (12, 2)]
    );

    retry_queue::resolve(&db.conn, "rot-a", "contacts", &[3]).unwrap();
    assert_eq!(
        retry_queue::pending_ids(&db.conn, "rot-a", "contacts").unwrap(),
        vec![12]
    );
    assert!(retry_queue::pending_ids(&db.conn, "rot-b", "contacts")
        .unwrap()
        .is_empty());
}
