//! Volume and clone requests.

use reqwest::Method;
use tracing::debug;
use uuid::Uuid;

use crate::backend::{BackendFailure, CloneRequest, FailureKind, Job};
use crate::volume::Volume;

use super::wire::{CloneCreateBody, CloneCreateSpec, NameRef, SplitBody, SplitSpec, VolumeRecord};
use super::{OntapBackend, OntapBackendError};

const VOLUMES: &str = "/storage/volumes";
const VOLUME_FIELDS: &str = "uuid,name,svm,clone";

impl OntapBackend {
    pub(super) async fn lookup_volume(
        &self,
        name: &str,
    ) -> Result<Option<Volume>, OntapBackendError> {
        let records: Vec<VolumeRecord> = self
            .get_collection(VOLUMES, &[("name", name), ("fields", VOLUME_FIELDS)])
            .await?;
        Ok(records.into_iter().next().map(Volume::from))
    }

    pub(super) async fn fetch_volume(
        &self,
        uuid: &Uuid,
    ) -> Result<Option<Volume>, OntapBackendError> {
        let path = format!("{VOLUMES}/{uuid}");
        match self
            .get::<VolumeRecord>(&path, &[("fields", VOLUME_FIELDS)])
            .await
        {
            Ok(record) => Ok(Some(record.into())),
            Err(err) if err.kind() == FailureKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub(super) async fn post_clone(
        &self,
        request: &CloneRequest,
    ) -> Result<Volume, OntapBackendError> {
        let body = CloneCreateBody {
            name: request.name.clone(),
            svm: NameRef::named(&request.svm),
            clone: CloneCreateSpec {
                parent_volume: NameRef::identified(request.parent_volume),
                parent_snapshot: NameRef::identified(request.parent_snapshot),
                is_flexclone: true,
            },
        };
        let job = self.send_body(Method::POST, VOLUMES, &body).await?;
        self.settle(job).await?;

        self.lookup_volume(&request.name)
            .await?
            .ok_or_else(|| OntapBackendError::MissingRecord {
                kind: "volume",
                name: request.name.clone(),
            })
    }

    pub(super) async fn patch_split(&self, clone: &Uuid) -> Result<Option<Job>, OntapBackendError> {
        let body = SplitBody {
            clone: SplitSpec {
                split_initiated: true,
            },
        };
        let job = self
            .send_body(Method::PATCH, &format!("{VOLUMES}/{clone}"), &body)
            .await?;
        debug!(clone = %clone, background = job.is_some(), "split requested");
        Ok(job)
    }

    pub(super) async fn remove_volume(&self, uuid: &Uuid) -> Result<(), OntapBackendError> {
        let job = self.send_delete(&format!("{VOLUMES}/{uuid}")).await?;
        self.settle(job).await
    }
}
