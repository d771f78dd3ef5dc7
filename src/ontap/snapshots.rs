//! Snapshot requests.

use reqwest::Method;
use uuid::Uuid;

use crate::snapshot::Snapshot;

use super::wire::{NameBody, SnapshotRecord};
use super::{OntapBackend, OntapBackendError};

const SNAPSHOT_FIELDS: &str = "uuid,name,create_time";

fn snapshots_path(volume: &Uuid) -> String {
    format!("/storage/volumes/{volume}/snapshots")
}

impl OntapBackend {
    pub(super) async fn lookup_snapshot(
        &self,
        volume: &Uuid,
        name: &str,
    ) -> Result<Option<Snapshot>, OntapBackendError> {
        let records: Vec<SnapshotRecord> = self
            .get_collection(
                &snapshots_path(volume),
                &[("name", name), ("fields", SNAPSHOT_FIELDS)],
            )
            .await?;
        Ok(records
            .into_iter()
            .next()
            .map(|record| record.into_snapshot(*volume)))
    }

    pub(super) async fn snapshot_collection(
        &self,
        volume: &Uuid,
    ) -> Result<Vec<Snapshot>, OntapBackendError> {
        let records: Vec<SnapshotRecord> = self
            .get_collection(
                &snapshots_path(volume),
                &[("name", "*"), ("fields", SNAPSHOT_FIELDS)],
            )
            .await?;
        Ok(records
            .into_iter()
            .map(|record| record.into_snapshot(*volume))
            .collect())
    }

    pub(super) async fn post_snapshot(
        &self,
        volume: &Uuid,
        name: &str,
    ) -> Result<Snapshot, OntapBackendError> {
        let job = self
            .send_body(Method::POST, &snapshots_path(volume), &NameBody { name })
            .await?;
        self.settle(job).await?;

        self.lookup_snapshot(volume, name)
            .await?
            .ok_or_else(|| OntapBackendError::MissingRecord {
                kind: "snapshot",
                name: name.to_owned(),
            })
    }

    pub(super) async fn remove_snapshot(
        &self,
        snapshot: &Snapshot,
    ) -> Result<(), OntapBackendError> {
        let path = format!("{}/{}", snapshots_path(&snapshot.volume), snapshot.uuid);
        let job = self.send_delete(&path).await?;
        self.settle(job).await
    }

    pub(super) async fn patch_snapshot_name(
        &self,
        snapshot: &Snapshot,
        new_name: &str,
    ) -> Result<(), OntapBackendError> {
        let path = format!("{}/{}", snapshots_path(&snapshot.volume), snapshot.uuid);
        let job = self
            .send_body(Method::PATCH, &path, &NameBody { name: new_name })
            .await?;
        self.settle(job).await
    }
}
