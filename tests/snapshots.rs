//! Behavioural tests for the snapshot lifecycle manager.

use chrono::{TimeZone, Utc};
use snapctl::test_support::{BackendCall, BackendOp, InMemoryBackend};
use snapctl::{FailureKind, SnapshotError, SnapshotManager};

#[tokio::test]
async fn create_names_the_snapshot_after_base_and_epoch_seconds() {
    let backend = InMemoryBackend::new();
    let volume = backend.add_volume("db01", "svm0");
    let at = Utc
        .timestamp_opt(1_700_000_000, 0)
        .single()
        .expect("valid instant");

    let snapshot = SnapshotManager::new(&backend)
        .create_at(&volume, "daily", at)
        .await
        .expect("create succeeds");

    assert_eq!(snapshot.name, "daily_1700000000");
    assert_eq!(snapshot.volume, volume.uuid);
    assert_eq!(backend.snapshot_names(&volume), vec!["daily_1700000000"]);
}

#[tokio::test]
async fn create_rejects_a_blank_base_name_without_contacting_the_controller() {
    let backend = InMemoryBackend::new();
    let volume = backend.add_volume("db01", "svm0");
    backend.clear_calls();

    let err = SnapshotManager::new(&backend)
        .create(&volume, "  ")
        .await
        .expect_err("blank base name");

    assert!(matches!(err, SnapshotError::MissingBaseName));
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn list_returns_most_recent_first() {
    let backend = InMemoryBackend::new();
    let volume = backend.add_volume("db01", "svm0");
    for name in ["hourly_1", "hourly_2", "hourly_3"] {
        let _snapshot = backend.add_snapshot(&volume, name);
    }

    let listed = SnapshotManager::new(&backend)
        .list(&volume)
        .await
        .expect("list succeeds");

    let names: Vec<_> = listed.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["hourly_3", "hourly_2", "hourly_1"]);
}

#[tokio::test]
async fn list_of_an_empty_volume_is_empty() {
    let backend = InMemoryBackend::new();
    let volume = backend.add_volume("db01", "svm0");

    let listed = SnapshotManager::new(&backend)
        .list(&volume)
        .await
        .expect("list succeeds");

    assert!(listed.is_empty());
}

#[tokio::test]
async fn rename_updates_the_controller_and_returns_the_new_name() {
    let backend = InMemoryBackend::new();
    let volume = backend.add_volume("db01", "svm0");
    let snapshot = backend.add_snapshot(&volume, "daily_1");

    let renamed = SnapshotManager::new(&backend)
        .rename(&snapshot, "keep_me")
        .await
        .expect("rename succeeds");

    assert_eq!(renamed.name, "keep_me");
    assert_eq!(renamed.uuid, snapshot.uuid);
    assert_eq!(backend.snapshot_names(&volume), vec!["keep_me"]);
}

#[tokio::test]
async fn rename_failure_is_reported_once() {
    let backend = InMemoryBackend::new();
    let volume = backend.add_volume("db01", "svm0");
    let snapshot = backend.add_snapshot(&volume, "daily_1");
    backend.fail(BackendOp::RenameSnapshot, FailureKind::Rejected);
    backend.clear_calls();

    let err = SnapshotManager::new(&backend)
        .rename(&snapshot, "keep_me")
        .await
        .expect_err("rename rejected");

    assert!(matches!(err, SnapshotError::Rename { .. }));
    assert_eq!(
        err.backend_error().map(|source| source.kind),
        Some(FailureKind::Rejected)
    );
    assert_eq!(
        backend.calls(),
        vec![BackendCall::RenameSnapshot {
            from: String::from("daily_1"),
            to: String::from("keep_me"),
        }]
    );
    assert_eq!(backend.snapshot_names(&volume), vec!["daily_1"]);
}

#[tokio::test]
async fn delete_removes_only_the_named_snapshot() {
    let backend = InMemoryBackend::new();
    let volume = backend.add_volume("db01", "svm0");
    let first = backend.add_snapshot(&volume, "daily_1");
    let _second = backend.add_snapshot(&volume, "daily_2");

    SnapshotManager::new(&backend)
        .delete(&first)
        .await
        .expect("delete succeeds");

    assert_eq!(backend.snapshot_names(&volume), vec!["daily_2"]);
}

#[tokio::test]
async fn delete_failure_carries_the_backend_error() {
    let backend = InMemoryBackend::new();
    let volume = backend.add_volume("db01", "svm0");
    let snapshot = backend.add_snapshot(&volume, "daily_1");
    backend.fail_snapshot_delete("daily_1");

    let err = SnapshotManager::new(&backend)
        .delete(&snapshot)
        .await
        .expect_err("delete rejected");

    assert!(matches!(err, SnapshotError::Delete { .. }));
    assert!(err.to_string().contains("daily_1"));
    assert_eq!(backend.snapshot_names(&volume), vec!["daily_1"]);
}
