//! Behavioural tests for retention rotation against the in-memory backend.

use rstest::rstest;
use snapctl::test_support::{BackendCall, BackendOp, InMemoryBackend};
use snapctl::{FailureKind, Retention, RotationError, RotationOutcome, Rotator, Volume};

fn seeded(count: usize) -> (InMemoryBackend, Volume) {
    let backend = InMemoryBackend::new();
    let volume = backend.add_volume("db01", "svm0");
    for index in 0..count {
        let _snapshot = backend.add_snapshot(&volume, &format!("daily_{index}"));
    }
    backend.clear_calls();
    (backend, volume)
}

fn delete_calls(backend: &InMemoryBackend) -> Vec<String> {
    backend
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            BackendCall::DeleteSnapshot(name) => Some(name),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn zero_retention_deletes_every_snapshot() {
    let (backend, volume) = seeded(5);

    let outcome = Rotator::new(&backend)
        .rotate(&volume, Retention::new(0).expect("valid retention"))
        .await
        .expect("rotation succeeds");

    assert_eq!(outcome.deleted_count(), 5);
    assert!(backend.snapshot_names(&volume).is_empty());
}

#[tokio::test]
async fn retention_above_count_leaves_volume_untouched() {
    let (backend, volume) = seeded(3);

    let outcome = Rotator::new(&backend)
        .rotate(&volume, Retention::new(10).expect("valid retention"))
        .await
        .expect("rotation succeeds");

    assert!(matches!(
        outcome,
        RotationOutcome::NothingToRotate { found: 3 }
    ));
    assert!(delete_calls(&backend).is_empty());
    assert_eq!(backend.snapshot_names(&volume).len(), 3);
}

#[tokio::test]
async fn oldest_snapshots_are_deleted_newest_first() {
    let (backend, volume) = seeded(5);

    let outcome = Rotator::new(&backend)
        .rotate(&volume, Retention::new(2).expect("valid retention"))
        .await
        .expect("rotation succeeds");

    assert_eq!(outcome.deleted_count(), 3);
    assert_eq!(
        delete_calls(&backend),
        vec!["daily_2", "daily_1", "daily_0"]
    );
    assert_eq!(backend.snapshot_names(&volume), vec!["daily_3", "daily_4"]);
}

#[tokio::test]
async fn a_failed_delete_does_not_stop_the_batch() {
    let (backend, volume) = seeded(7);
    // Candidates in order: daily_4, daily_3, daily_2, daily_1, daily_0.
    backend.fail_snapshot_delete("daily_2");

    let outcome = Rotator::new(&backend)
        .rotate(&volume, Retention::new(2).expect("valid retention"))
        .await
        .expect("rotation succeeds");

    assert_eq!(
        delete_calls(&backend),
        vec!["daily_4", "daily_3", "daily_2", "daily_1", "daily_0"]
    );
    let RotationOutcome::Rotated(report) = outcome else {
        panic!("expected a rotation report");
    };
    assert_eq!(report.found, 7);
    assert_eq!(report.deleted_count(), 4);
    assert!(!report.is_complete());
    let failed: Vec<_> = report
        .failed
        .iter()
        .map(|failure| failure.snapshot.name.as_str())
        .collect();
    assert_eq!(failed, vec!["daily_2"]);
    assert_eq!(
        backend.snapshot_names(&volume),
        vec!["daily_2", "daily_5", "daily_6"]
    );
}

#[tokio::test]
async fn negative_retention_is_rejected_before_contacting_the_controller() {
    let (backend, volume) = seeded(3);

    let err = Rotator::new(&backend)
        .rotate_count(&volume, -1)
        .await
        .expect_err("negative retention");

    assert!(matches!(err, RotationError::Retention(_)));
    assert!(err.backend_error().is_none());
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn listing_failure_aborts_without_deleting() {
    let (backend, volume) = seeded(3);
    backend.fail(BackendOp::ListSnapshots, FailureKind::Transport);

    let err = Rotator::new(&backend)
        .rotate(&volume, Retention::new(0).expect("valid retention"))
        .await
        .expect_err("listing fails");

    assert!(matches!(err, RotationError::List { .. }));
    assert!(delete_calls(&backend).is_empty());
}

#[rstest]
#[case(0, 0)]
#[case(0, 4)]
#[case(1, 1)]
#[case(2, 6)]
#[case(4, 4)]
#[case(5, 2)]
#[tokio::test]
async fn survivors_are_the_most_recent_min_of_retention_and_count(
    #[case] retention: usize,
    #[case] count: usize,
) {
    let (backend, volume) = seeded(count);
    let keep = i64::try_from(retention).expect("small retention");

    let outcome = Rotator::new(&backend)
        .rotate_count(&volume, keep)
        .await
        .expect("rotation succeeds");

    let kept = retention.min(count);
    assert_eq!(outcome.deleted_count(), count - kept);
    let expected: Vec<String> = (count - kept..count)
        .map(|index| format!("daily_{index}"))
        .collect();
    assert_eq!(backend.snapshot_names(&volume), expected);
}
