//! JSON documents exchanged with the ONTAP REST API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lun::{LunMapKey, LunMapping};
use crate::snapshot::Snapshot;
use crate::volume::{CloneRelationship, Volume};

/// Generic record collection.
#[derive(Debug, Deserialize)]
pub(super) struct Collection<T> {
    #[serde(default = "Vec::new")]
    pub(super) records: Vec<T>,
    #[serde(rename = "_links", default)]
    pub(super) links: Option<CollectionLinks>,
}

impl<T> Collection<T> {
    pub(super) fn next_href(&self) -> Option<&str> {
        self.links
            .as_ref()
            .and_then(|links| links.next.as_ref())
            .map(|link| link.href.as_str())
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct CollectionLinks {
    pub(super) next: Option<Href>,
}

#[derive(Debug, Deserialize)]
pub(super) struct Href {
    pub(super) href: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub(super) struct NameRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) uuid: Option<Uuid>,
}

impl NameRef {
    pub(super) fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_owned()),
            uuid: None,
        }
    }

    pub(super) const fn identified(uuid: Uuid) -> Self {
        Self {
            name: None,
            uuid: Some(uuid),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct VolumeRecord {
    pub(super) uuid: Uuid,
    pub(super) name: String,
    #[serde(default)]
    pub(super) svm: NameRef,
    #[serde(default)]
    pub(super) clone: Option<CloneRecord>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct CloneRecord {
    #[serde(default)]
    pub(super) parent_volume: Option<NameRef>,
    #[serde(default)]
    pub(super) parent_snapshot: Option<NameRef>,
    #[serde(default)]
    pub(super) is_flexclone: bool,
    #[serde(default)]
    pub(super) split_initiated: bool,
}

impl CloneRecord {
    /// The controller reports `{"is_flexclone": false}` for ordinary volumes,
    /// so a record without a parent or a split in flight is no clone at all.
    fn into_relationship(self) -> Option<CloneRelationship> {
        let parent_volume = self.parent_volume.and_then(|parent| parent.uuid);
        let parent_snapshot = self.parent_snapshot.and_then(|parent| parent.uuid);
        if !self.is_flexclone
            && !self.split_initiated
            && parent_volume.is_none()
            && parent_snapshot.is_none()
        {
            return None;
        }
        Some(CloneRelationship {
            parent_volume,
            parent_snapshot,
            is_flexclone: self.is_flexclone,
            split_initiated: self.split_initiated,
        })
    }
}

impl From<VolumeRecord> for Volume {
    fn from(record: VolumeRecord) -> Self {
        Self {
            uuid: record.uuid,
            name: record.name,
            svm: record.svm.name.unwrap_or_default(),
            clone: record.clone.and_then(CloneRecord::into_relationship),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct SnapshotRecord {
    pub(super) uuid: Uuid,
    pub(super) name: String,
    #[serde(default)]
    pub(super) create_time: Option<DateTime<Utc>>,
}

impl SnapshotRecord {
    pub(super) fn into_snapshot(self, volume: Uuid) -> Snapshot {
        Snapshot {
            uuid: self.uuid,
            volume,
            name: self.name,
            create_time: self.create_time,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct LunMapRecord {
    #[serde(default)]
    pub(super) lun: NameRef,
    #[serde(default)]
    pub(super) igroup: NameRef,
    #[serde(default)]
    pub(super) logical_unit_number: Option<u32>,
}

impl LunMapRecord {
    pub(super) fn into_mapping(self, key: &LunMapKey) -> LunMapping {
        LunMapping {
            key: key.clone(),
            lun_uuid: self.lun.uuid,
            igroup_uuid: self.igroup.uuid,
            logical_unit_number: self.logical_unit_number,
        }
    }
}

/// Body of a `202 Accepted` response.
#[derive(Debug, Deserialize)]
pub(super) struct Accepted {
    pub(super) job: Option<JobLink>,
}

#[derive(Debug, Deserialize)]
pub(super) struct JobLink {
    pub(super) uuid: Uuid,
}

#[derive(Debug, Deserialize)]
pub(super) struct JobRecord {
    pub(super) state: JobState,
    #[serde(default)]
    pub(super) message: Option<String>,
    #[serde(default)]
    pub(super) code: Option<i64>,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub(super) enum JobState {
    Queued,
    Running,
    Paused,
    Success,
    Failure,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
pub(super) struct ErrorEnvelope {
    pub(super) error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(super) struct ErrorBody {
    #[serde(default)]
    pub(super) message: Option<String>,
    #[serde(default)]
    pub(super) code: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct NameBody<'a> {
    pub(super) name: &'a str,
}

#[derive(Debug, Serialize)]
pub(super) struct CloneCreateBody {
    pub(super) name: String,
    pub(super) svm: NameRef,
    pub(super) clone: CloneCreateSpec,
}

#[derive(Debug, Serialize)]
pub(super) struct CloneCreateSpec {
    pub(super) parent_volume: NameRef,
    pub(super) parent_snapshot: NameRef,
    pub(super) is_flexclone: bool,
}

#[derive(Debug, Serialize)]
pub(super) struct SplitBody {
    pub(super) clone: SplitSpec,
}

#[derive(Debug, Serialize)]
pub(super) struct SplitSpec {
    pub(super) split_initiated: bool,
}

#[derive(Debug, Serialize)]
pub(super) struct LunMapBody {
    pub(super) svm: NameRef,
    pub(super) lun: NameRef,
    pub(super) igroup: NameRef,
}

impl From<&LunMapKey> for LunMapBody {
    fn from(key: &LunMapKey) -> Self {
        Self {
            svm: NameRef::named(&key.svm),
            lun: NameRef::named(&key.lun_path),
            igroup: NameRef::named(&key.igroup),
        }
    }
}
