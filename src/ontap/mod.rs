//! ONTAP REST backend implementation of [`StorageBackend`].

mod error;
mod jobs;
mod lun_maps;
mod snapshots;
mod transport;
mod volumes;
mod wire;

use std::time::Duration;

use uuid::Uuid;

use crate::backend::{BackendFuture, CloneRequest, Job, StorageBackend};
use crate::config::ConnectionSettings;
use crate::lun::{LunMapKey, LunMapping};
use crate::snapshot::Snapshot;
use crate::volume::Volume;

pub use error::{LUN_ALREADY_MAPPED_CODE, OntapBackendError};

const API_ROOT: &str = "/api";

/// Backend that manages volumes, snapshots, clones, and LUN maps through
/// the ONTAP REST API of one storage virtual machine.
#[derive(Clone)]
pub struct OntapBackend {
    http: reqwest::Client,
    origin: String,
    username: String,
    password: String,
    job_poll_interval: Duration,
    job_timeout: Option<Duration>,
}

impl std::fmt::Debug for OntapBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OntapBackend")
            .field("origin", &self.origin)
            .field("username", &self.username)
            .field("job_poll_interval", &self.job_poll_interval)
            .field("job_timeout", &self.job_timeout)
            .finish_non_exhaustive()
    }
}

impl OntapBackend {
    /// Builds a session for the controller named in `settings`.
    ///
    /// No request is sent until the first operation; an unreachable
    /// controller surfaces as a transport error from that operation.
    ///
    /// # Errors
    ///
    /// Returns [`OntapBackendError::Transport`] when the HTTP client cannot
    /// be constructed.
    pub fn connect(settings: &ConnectionSettings) -> Result<Self, OntapBackendError> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(!settings.verify_tls)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| OntapBackendError::Transport {
                message: err.to_string(),
            })?;

        Ok(Self {
            http,
            origin: format!("https://{}", settings.host),
            username: settings.username.clone(),
            password: settings.password.clone(),
            job_poll_interval: settings.job_poll_interval,
            job_timeout: settings.job_timeout,
        })
    }

    /// Returns the API base URL, for example `https://svm1.example.net/api`.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("{}{API_ROOT}", self.origin)
    }
}

impl StorageBackend for OntapBackend {
    type Error = OntapBackendError;

    fn find_volume<'a>(&'a self, name: &'a str) -> BackendFuture<'a, Option<Volume>, Self::Error> {
        Box::pin(self.lookup_volume(name))
    }

    fn get_volume<'a>(&'a self, uuid: &'a Uuid) -> BackendFuture<'a, Option<Volume>, Self::Error> {
        Box::pin(self.fetch_volume(uuid))
    }

    fn find_snapshot<'a>(
        &'a self,
        volume: &'a Uuid,
        name: &'a str,
    ) -> BackendFuture<'a, Option<Snapshot>, Self::Error> {
        Box::pin(self.lookup_snapshot(volume, name))
    }

    fn list_snapshots<'a>(
        &'a self,
        volume: &'a Uuid,
    ) -> BackendFuture<'a, Vec<Snapshot>, Self::Error> {
        Box::pin(self.snapshot_collection(volume))
    }

    fn create_snapshot<'a>(
        &'a self,
        volume: &'a Uuid,
        name: &'a str,
    ) -> BackendFuture<'a, Snapshot, Self::Error> {
        Box::pin(self.post_snapshot(volume, name))
    }

    fn delete_snapshot<'a>(&'a self, snapshot: &'a Snapshot) -> BackendFuture<'a, (), Self::Error> {
        Box::pin(self.remove_snapshot(snapshot))
    }

    fn rename_snapshot<'a>(
        &'a self,
        snapshot: &'a Snapshot,
        new_name: &'a str,
    ) -> BackendFuture<'a, (), Self::Error> {
        Box::pin(self.patch_snapshot_name(snapshot, new_name))
    }

    fn create_clone<'a>(
        &'a self,
        request: &'a CloneRequest,
    ) -> BackendFuture<'a, Volume, Self::Error> {
        Box::pin(self.post_clone(request))
    }

    fn initiate_split<'a>(
        &'a self,
        clone: &'a Uuid,
    ) -> BackendFuture<'a, Option<Job>, Self::Error> {
        Box::pin(self.patch_split(clone))
    }

    fn await_job<'a>(&'a self, job: &'a Job) -> BackendFuture<'a, (), Self::Error> {
        Box::pin(self.wait_for_job(job))
    }

    fn delete_volume<'a>(&'a self, uuid: &'a Uuid) -> BackendFuture<'a, (), Self::Error> {
        Box::pin(self.remove_volume(uuid))
    }

    fn find_lun_map<'a>(
        &'a self,
        key: &'a LunMapKey,
    ) -> BackendFuture<'a, Option<LunMapping>, Self::Error> {
        Box::pin(self.lookup_lun_map(key))
    }

    fn create_lun_map<'a>(
        &'a self,
        key: &'a LunMapKey,
    ) -> BackendFuture<'a, LunMapping, Self::Error> {
        Box::pin(self.post_lun_map(key))
    }

    fn delete_lun_map<'a>(
        &'a self,
        mapping: &'a LunMapping,
    ) -> BackendFuture<'a, (), Self::Error> {
        Box::pin(self.remove_lun_map(mapping))
    }
}

#[cfg(test)]
mod tests;
