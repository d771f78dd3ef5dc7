//! LUN map requests.

use reqwest::Method;

use crate::lun::{LunMapKey, LunMapping};

use super::wire::{LunMapBody, LunMapRecord};
use super::{OntapBackend, OntapBackendError};

const LUN_MAPS: &str = "/protocols/san/lun-maps";
const LUN_MAP_FIELDS: &str = "lun.uuid,igroup.uuid,logical_unit_number";

impl OntapBackend {
    pub(super) async fn lookup_lun_map(
        &self,
        key: &LunMapKey,
    ) -> Result<Option<LunMapping>, OntapBackendError> {
        let records: Vec<LunMapRecord> = self
            .get_collection(
                LUN_MAPS,
                &[
                    ("lun.name", key.lun_path.as_str()),
                    ("igroup.name", key.igroup.as_str()),
                    ("svm.name", key.svm.as_str()),
                    ("fields", LUN_MAP_FIELDS),
                ],
            )
            .await?;
        Ok(records
            .into_iter()
            .next()
            .map(|record| record.into_mapping(key)))
    }

    pub(super) async fn post_lun_map(
        &self,
        key: &LunMapKey,
    ) -> Result<LunMapping, OntapBackendError> {
        let job = self
            .send_body(Method::POST, LUN_MAPS, &LunMapBody::from(key))
            .await?;
        self.settle(job).await?;

        self.lookup_lun_map(key)
            .await?
            .ok_or_else(|| OntapBackendError::MissingRecord {
                kind: "LUN map",
                name: format!("{} -> {}", key.lun_path, key.igroup),
            })
    }

    pub(super) async fn remove_lun_map(
        &self,
        mapping: &LunMapping,
    ) -> Result<(), OntapBackendError> {
        let (Some(lun), Some(igroup)) = (mapping.lun_uuid, mapping.igroup_uuid) else {
            return Err(OntapBackendError::MissingRecord {
                kind: "LUN map identifiers",
                name: format!("{} -> {}", mapping.key.lun_path, mapping.key.igroup),
            });
        };
        let job = self.send_delete(&format!("{LUN_MAPS}/{lun}/{igroup}")).await?;
        self.settle(job).await
    }
}
