//! Unit tests for the ONTAP wire format and error classification.

use std::time::Duration;

use reqwest::StatusCode;
use rstest::rstest;
use serde_json::json;
use uuid::Uuid;

use super::jobs::{JobProgress, judge_poll};
use super::transport::{decode_slice, next_page_url, parse_error};
use super::wire::{
    Accepted, CloneCreateBody, CloneCreateSpec, Collection, JobRecord, JobState, LunMapBody,
    NameRef, SnapshotRecord, SplitBody, SplitSpec, VolumeRecord,
};
use super::*;
use crate::backend::{BackendFailure, FailureKind};
use crate::clone::{CloneState, ProvisionedClone};
use crate::volume::Volume;

fn settings() -> ConnectionSettings {
    ConnectionSettings {
        host: String::from("svm1.example.net"),
        username: String::from("vsadmin"),
        password: String::from("secret"),
        verify_tls: false,
        request_timeout: Duration::from_secs(5),
        job_poll_interval: Duration::from_millis(10),
        job_timeout: None,
    }
}

#[test]
fn endpoints_are_rooted_at_the_api_prefix() {
    let backend = OntapBackend::connect(&settings()).expect("client builds");
    assert_eq!(backend.base_url(), "https://svm1.example.net/api");
    assert_eq!(
        backend.endpoint("/storage/volumes"),
        "https://svm1.example.net/api/storage/volumes"
    );
}

#[test]
fn debug_output_omits_password() {
    let backend = OntapBackend::connect(&settings()).expect("client builds");
    assert!(!format!("{backend:?}").contains("secret"));
}

#[test]
fn volume_record_carries_clone_metadata() {
    let parent = Uuid::new_v4();
    let body = json!({
        "uuid": Uuid::new_v4(),
        "name": "db01_clone",
        "svm": { "name": "svm1", "uuid": Uuid::new_v4() },
        "clone": {
            "is_flexclone": true,
            "split_initiated": false,
            "parent_volume": { "name": "db01", "uuid": parent }
        }
    });
    let record: VolumeRecord = serde_json::from_value(body).expect("decodes");
    let volume = Volume::from(record);

    assert_eq!(volume.svm, "svm1");
    let clone = volume.clone.expect("clone metadata");
    assert!(clone.is_flexclone);
    assert_eq!(clone.parent_volume, Some(parent));
    assert_eq!(clone.parent_snapshot, None);
}

#[test]
fn plain_volume_record_has_no_clone_metadata() {
    let record: VolumeRecord =
        serde_json::from_value(json!({ "uuid": Uuid::new_v4(), "name": "db01" }))
            .expect("decodes");
    let volume = Volume::from(record);
    assert!(volume.clone.is_none());
    assert_eq!(volume.svm, "");
}

#[test]
fn ordinary_volume_with_clone_fields_is_not_a_clone() {
    let record: VolumeRecord = serde_json::from_value(json!({
        "uuid": Uuid::new_v4(),
        "name": "plain_db",
        "svm": { "name": "svm1" },
        "clone": { "is_flexclone": false }
    }))
    .expect("decodes");
    let volume = Volume::from(record);

    assert!(volume.clone.is_none());
    assert!(ProvisionedClone::from_volume(volume).is_none());
}

#[test]
fn split_clone_keeps_its_clone_metadata() {
    let parent = Uuid::new_v4();
    let record: VolumeRecord = serde_json::from_value(json!({
        "uuid": Uuid::new_v4(),
        "name": "db01_clone",
        "svm": { "name": "svm1" },
        "clone": {
            "is_flexclone": false,
            "split_initiated": true,
            "parent_volume": { "name": "db01", "uuid": parent }
        }
    }))
    .expect("decodes");
    let clone = ProvisionedClone::from_volume(Volume::from(record)).expect("still a clone");

    assert_eq!(clone.state(), CloneState::SplitComplete);
    let relationship = clone.volume().clone.as_ref().expect("clone metadata");
    assert_eq!(relationship.parent_volume, Some(parent));
}

#[test]
fn snapshot_collection_keeps_controller_order_and_next_link() {
    let body = json!({
        "records": [
            {
                "uuid": Uuid::new_v4(),
                "name": "daily_1",
                "create_time": "2019-10-15T00:00:00+00:00"
            },
            { "uuid": Uuid::new_v4(), "name": "daily_2" }
        ],
        "num_records": 2,
        "_links": { "next": { "href": "/api/storage/volumes/x/snapshots?start.uuid=y" } }
    });
    let page: Collection<SnapshotRecord> = serde_json::from_value(body).expect("decodes");

    assert_eq!(
        page.next_href(),
        Some("/api/storage/volumes/x/snapshots?start.uuid=y")
    );
    let names: Vec<_> = page.records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["daily_1", "daily_2"]);
    assert!(page.records.first().and_then(|r| r.create_time).is_some());
    assert!(page.records.get(1).and_then(|r| r.create_time).is_none());
}

#[test]
fn empty_collection_decodes_without_records_key() {
    let page: Collection<SnapshotRecord> =
        decode_slice(br#"{"num_records":0}"#).expect("decodes");
    assert!(page.records.is_empty());
    assert_eq!(page.next_href(), None);
}

#[rstest]
#[case("queued", JobState::Queued)]
#[case("running", JobState::Running)]
#[case("paused", JobState::Paused)]
#[case("success", JobState::Success)]
#[case("failure", JobState::Failure)]
#[case("exploded", JobState::Unknown)]
fn job_states_decode(#[case] raw: &str, #[case] expected: JobState) {
    let record: JobRecord =
        serde_json::from_value(json!({ "state": raw })).expect("decodes");
    assert_eq!(record.state, expected);
}

fn job_record(state: JobState) -> JobRecord {
    JobRecord {
        state,
        message: None,
        code: None,
    }
}

#[rstest]
#[case(JobState::Queued)]
#[case(JobState::Running)]
#[case(JobState::Paused)]
#[case(JobState::Unknown)]
fn pending_jobs_keep_polling_without_a_limit(#[case] state: JobState) {
    let waited = Duration::from_secs(86_400);
    let progress = judge_poll(Uuid::nil(), job_record(state), waited, None).expect("pending");
    assert_eq!(progress, JobProgress::Pending(state));
}

#[test]
fn pending_job_under_the_limit_keeps_polling() {
    let progress = judge_poll(
        Uuid::nil(),
        job_record(JobState::Running),
        Duration::from_secs(29),
        Some(Duration::from_secs(30)),
    )
    .expect("pending");
    assert_eq!(progress, JobProgress::Pending(JobState::Running));
}

#[test]
fn pending_job_at_the_limit_times_out() {
    let job = Uuid::new_v4();
    let err = judge_poll(
        job,
        job_record(JobState::Queued),
        Duration::from_secs(31),
        Some(Duration::from_secs(30)),
    )
    .expect_err("timed out");
    assert_eq!(
        err,
        OntapBackendError::JobTimeout {
            job,
            waited_secs: 31
        }
    );
}

#[test]
fn successful_job_finishes_even_past_the_limit() {
    let progress = judge_poll(
        Uuid::nil(),
        job_record(JobState::Success),
        Duration::from_secs(60),
        Some(Duration::from_secs(30)),
    )
    .expect("finished");
    assert_eq!(progress, JobProgress::Finished);
}

#[test]
fn failed_job_reports_message_and_code() {
    let job = Uuid::new_v4();
    let record = JobRecord {
        state: JobState::Failure,
        message: Some(String::from("Clone split failed: volume busy")),
        code: Some(13_001),
    };
    let err = judge_poll(job, record, Duration::ZERO, None).expect_err("failed");
    assert_eq!(
        err,
        OntapBackendError::JobFailed {
            job,
            message: String::from("Clone split failed: volume busy"),
            code: 13_001,
        }
    );
}

/// Feeds a scripted sequence of job records through the poll decision the
/// way the waiting loop does, advancing a fake clock by one interval each
/// round. Returns the number of polls, or `None` if the script runs out
/// while the job is still pending.
fn drive_job(
    states: &[JobState],
    interval: Duration,
    limit: Option<Duration>,
) -> Result<Option<usize>, OntapBackendError> {
    let mut waited = Duration::ZERO;
    for (polls, state) in states.iter().enumerate() {
        if judge_poll(Uuid::nil(), job_record(*state), waited, limit)? == JobProgress::Finished {
            return Ok(Some(polls + 1));
        }
        waited += interval;
    }
    Ok(None)
}

#[test]
fn job_that_finishes_in_time_is_awaited() {
    let states = [JobState::Queued, JobState::Running, JobState::Success];
    let polls = drive_job(&states, Duration::from_secs(2), Some(Duration::from_secs(10)))
        .expect("job finishes");
    assert_eq!(polls, Some(3));
}

#[test]
fn slow_job_times_out_before_finishing() {
    let states = [
        JobState::Running,
        JobState::Running,
        JobState::Running,
        JobState::Success,
    ];
    let err = drive_job(&states, Duration::from_secs(5), Some(Duration::from_secs(10)))
        .expect_err("times out");
    assert!(matches!(err, OntapBackendError::JobTimeout { waited_secs: 10, .. }));
}

#[rstest]
#[case(
    "/api/storage/volumes?start.uuid=7f1c&max_records=20",
    "https://svm1.example.net/api/storage/volumes?start.uuid=7f1c&max_records=20"
)]
#[case(
    "https://other.example.net/api/storage/volumes?start.uuid=7f1c",
    "https://other.example.net/api/storage/volumes?start.uuid=7f1c"
)]
fn next_page_links_resolve_against_the_origin(#[case] href: &str, #[case] expected: &str) {
    assert_eq!(next_page_url("https://svm1.example.net", href), expected);
}

#[test]
fn last_page_has_no_next_url() {
    let page: Collection<SnapshotRecord> = decode_slice(
        br#"{"records":[],"_links":{"self":{"href":"/api/storage/volumes/x/snapshots"}}}"#,
    )
    .expect("decodes");
    let next = page
        .next_href()
        .map(|href| next_page_url("https://svm1.example.net", href));
    assert_eq!(next, None);
}

#[test]
fn accepted_body_yields_job_uuid() {
    let job = Uuid::new_v4();
    let accepted: Accepted = serde_json::from_value(json!({
        "job": { "uuid": job, "_links": { "self": { "href": "/api/cluster/jobs/x" } } }
    }))
    .expect("decodes");
    assert_eq!(accepted.job.map(|link| link.uuid), Some(job));
}

#[test]
fn request_bodies_match_the_rest_schema() {
    let parent = Uuid::new_v4();
    let snapshot = Uuid::new_v4();
    let clone = CloneCreateBody {
        name: String::from("db01_clone"),
        svm: NameRef::named("svm1"),
        clone: CloneCreateSpec {
            parent_volume: NameRef::identified(parent),
            parent_snapshot: NameRef::identified(snapshot),
            is_flexclone: true,
        },
    };
    assert_eq!(
        serde_json::to_value(&clone).expect("encodes"),
        json!({
            "name": "db01_clone",
            "svm": { "name": "svm1" },
            "clone": {
                "parent_volume": { "uuid": parent },
                "parent_snapshot": { "uuid": snapshot },
                "is_flexclone": true
            }
        })
    );

    let split = SplitBody {
        clone: SplitSpec {
            split_initiated: true,
        },
    };
    assert_eq!(
        serde_json::to_value(&split).expect("encodes"),
        json!({ "clone": { "split_initiated": true } })
    );

    let key = crate::lun::LunMapKey::new("/vol/db01/lun0", "hosts", "svm1");
    assert_eq!(
        serde_json::to_value(LunMapBody::from(&key)).expect("encodes"),
        json!({
            "svm": { "name": "svm1" },
            "lun": { "name": "/vol/db01/lun0" },
            "igroup": { "name": "hosts" }
        })
    );
}

#[rstest]
#[case(
    StatusCode::NOT_FOUND,
    r#"{"error":{"message":"entry doesn't exist","code":"4"}}"#,
    FailureKind::NotFound
)]
#[case(
    StatusCode::BAD_REQUEST,
    r#"{"error":{"message":"LUN already mapped to this group","code":"5374922"}}"#,
    FailureKind::AlreadyMapped
)]
#[case(
    StatusCode::CONFLICT,
    r#"{"error":{"message":"LUN already mapped to this group"}}"#,
    FailureKind::AlreadyMapped
)]
#[case(
    StatusCode::UNAUTHORIZED,
    "",
    FailureKind::Transport
)]
#[case(
    StatusCode::BAD_REQUEST,
    r#"{"error":{"message":"duplicate volume name","code":"917835"}}"#,
    FailureKind::Rejected
)]
#[case(StatusCode::INTERNAL_SERVER_ERROR, "<html>oops</html>", FailureKind::Rejected)]
fn error_responses_are_classified(
    #[case] status: StatusCode,
    #[case] body: &str,
    #[case] expected: FailureKind,
) {
    assert_eq!(parse_error(status, body).kind(), expected);
}

#[test]
fn error_envelope_fields_are_preserved() {
    let err = parse_error(
        StatusCode::BAD_REQUEST,
        r#"{"error":{"message":"duplicate volume name","code":"917835"}}"#,
    );
    assert_eq!(
        err,
        OntapBackendError::Api {
            status: 400,
            code: String::from("917835"),
            message: String::from("duplicate volume name"),
        }
    );
}

#[test]
fn empty_error_body_falls_back_to_status_reason() {
    let err = parse_error(StatusCode::SERVICE_UNAVAILABLE, "  ");
    assert!(err.to_string().contains("Service Unavailable"), "{err}");
}

#[rstest]
#[case(OntapBackendError::Transport { message: String::from("refused") }, FailureKind::Transport)]
#[case(
    OntapBackendError::JobFailed { job: Uuid::nil(), message: String::from("busy"), code: 1 },
    FailureKind::Rejected
)]
#[case(
    OntapBackendError::JobTimeout { job: Uuid::nil(), waited_secs: 30 },
    FailureKind::Rejected
)]
fn local_errors_are_classified(#[case] err: OntapBackendError, #[case] expected: FailureKind) {
    assert_eq!(err.kind(), expected);
}
