//! Integration tests for feed files

use serde_json::Value;
use shadowswap::adapters::memory::MemoryStore;
use shadowswap::adapters::store::ReloadStore;
use shadowswap::core::reload::ReloadCoordinator;
use shadowswap::core::source::seed::write_seed_file;
use shadowswap::core::source::{open_records, RecordFormat};
use shadowswap::domain::{EntityKind, ReloadError, Result, Table};
use std::io::Write;
use std::sync::Arc;
use tempfile::{Builder, NamedTempFile};

fn feed(suffix: &str, contents: &str) -> NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn collect(path: &std::path::Path, kind: EntityKind) -> Vec<Result<Value>> {
    open_records(path, kind, None).unwrap().collect()
}

#[test]
fn test_json_array_feed() {
    let file = feed(
        ".json",
        r#"[{"externalId": "usr1", "firstName": "Rick", "lastName": "Deckard", "dateOfBirth": "2000-01-01"},
            {"externalId": "usr2", "firstName": "Ann", "lastName": "Lee", "dateOfBirth": "1990-05-05"}]"#,
    );
    let records = collect(file.path(), EntityKind::Patient);
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].as_ref().unwrap()["externalId"], "usr2");
}

#[test]
fn test_truncated_json_array_fails_at_the_broken_record() {
    let file = feed(
        ".json",
        r#"[{"externalId": "usr1", "firstName": "Rick", "lastName": "Deckard", "dateOfBirth": "2000-01-01"}, {"#,
    );
    let records = collect(file.path(), EntityKind::Patient);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].as_ref().unwrap()["externalId"], "usr1");
    assert!(matches!(records[1], Err(ReloadError::Ingestion(_))));
}

#[tokio::test]
async fn test_truncated_json_feed_rejects_reload_at_position() {
    let store = MemoryStore::new();
    let (_tx, rx) = tokio::sync::watch::channel(false);
    let coordinator = ReloadCoordinator::new(Arc::new(store.clone()), 16, rx);

    let good = feed(
        ".json",
        r#"[{"externalId": "usr9", "firstName": "Ann", "lastName": "Lee", "dateOfBirth": "1990-05-05"}]"#,
    );
    let records = open_records(good.path(), EntityKind::Patient, None).unwrap();
    coordinator.reload_source(EntityKind::Patient, records).await.unwrap();

    let broken = feed(
        ".json",
        r#"[{"externalId": "usr1", "firstName": "Rick", "lastName": "Deckard", "dateOfBirth": "2000-01-01"}, {"#,
    );
    let records = open_records(broken.path(), EntityKind::Patient, None).unwrap();
    let err = coordinator
        .reload_source(EntityKind::Patient, records)
        .await
        .unwrap_err();

    match err {
        ReloadError::Ingestion(e) => {
            assert_eq!(e.position, Some(1));
            assert!(e.reason.contains("Malformed JSON"));
        }
        other => panic!("expected an ingestion error, got {other:?}"),
    }
    assert_eq!(store.live_count(Table::Patients).await.unwrap(), 1);
}

#[test]
fn test_ndjson_feed_stops_at_first_error() {
    let file = feed(
        ".ndjson",
        "{\"externalId\": \"pay1\", \"patientId\": \"usr1\", \"amount\": 1.5}\n{\"externalId\": \n",
    );
    let records = collect(file.path(), EntityKind::Payment);
    assert_eq!(records.len(), 2);
    assert!(records[0].is_ok());
    assert!(records[1].is_err());
}

#[test]
fn test_csv_feed() {
    let file = feed(
        ".csv",
        "usr1, Rick, Deckard, 2000-01-01\nusr2,Ann,Lee,1990-05-05,Marie\n",
    );
    let records = collect(file.path(), EntityKind::Patient);
    assert_eq!(records.len(), 2);

    let first = records[0].as_ref().unwrap();
    assert_eq!(first["firstName"], "Rick");
    assert!(first.get("middleName").is_none());
    assert_eq!(records[1].as_ref().unwrap()["middleName"], "Marie");
}

#[test]
fn test_explicit_format_overrides_extension() {
    let file = feed(".txt", "pay1,usr1,12.50\n");
    let records: Vec<_> = open_records(file.path(), EntityKind::Payment, Some(RecordFormat::Csv))
        .unwrap()
        .collect();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].as_ref().unwrap()["amount"], "12.50");

    let err = open_records(file.path(), EntityKind::Payment, None).err().unwrap();
    assert!(matches!(err, ReloadError::Configuration(_)));
}

#[tokio::test]
async fn test_seed_feed_reloads_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("patients.json");
    write_seed_file(&path, EntityKind::Patient, 50).unwrap();

    let store = MemoryStore::new();
    let (_tx, rx) = tokio::sync::watch::channel(false);
    let coordinator = ReloadCoordinator::new(Arc::new(store.clone()), 16, rx);
    let records = open_records(&path, EntityKind::Patient, None).unwrap();
    let summary = coordinator
        .reload_source(EntityKind::Patient, records)
        .await
        .unwrap();

    assert_eq!(summary.report.received, 50);
    assert_eq!(summary.report.staged, 50);
    assert_eq!(summary.report.chunks, 4);
    assert_eq!(store.live_count(Table::Patients).await.unwrap(), 50);
}
