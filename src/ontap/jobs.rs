//! Background job polling.

use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::debug;
use uuid::Uuid;

use crate::backend::Job;

use super::wire::{JobRecord, JobState};
use super::{OntapBackend, OntapBackendError};

const JOB_FIELDS: &str = "uuid,state,message,code";

/// What a single poll of a job tells the waiting loop.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(super) enum JobProgress {
    Finished,
    Pending(JobState),
}

/// Judges one job record after `waited` has elapsed. A pending job fails
/// with [`OntapBackendError::JobTimeout`] once `limit` is reached; with no
/// limit it stays pending until the controller reports a final state.
pub(super) fn judge_poll(
    job: Uuid,
    record: JobRecord,
    waited: Duration,
    limit: Option<Duration>,
) -> Result<JobProgress, OntapBackendError> {
    match record.state {
        JobState::Success => Ok(JobProgress::Finished),
        JobState::Failure => Err(OntapBackendError::JobFailed {
            job,
            message: record.message.unwrap_or_default(),
            code: record.code.unwrap_or_default(),
        }),
        state => match limit {
            Some(max) if waited >= max => Err(OntapBackendError::JobTimeout {
                job,
                waited_secs: waited.as_secs(),
            }),
            _ => Ok(JobProgress::Pending(state)),
        },
    }
}

impl OntapBackend {
    /// Polls the job until it succeeds or fails.
    pub(super) async fn wait_for_job(&self, job: &Job) -> Result<(), OntapBackendError> {
        let path = format!("/cluster/jobs/{}", job.uuid);
        let started = Instant::now();

        loop {
            let record: JobRecord = self.get(&path, &[("fields", JOB_FIELDS)]).await?;
            match judge_poll(job.uuid, record, started.elapsed(), self.job_timeout)? {
                JobProgress::Finished => {
                    debug!(job = %job.uuid, "job finished");
                    return Ok(());
                }
                JobProgress::Pending(state) => {
                    debug!(job = %job.uuid, ?state, "job still pending");
                }
            }
            sleep(self.job_poll_interval).await;
        }
    }
}
