//! Flexible volumes and their clone metadata.

use uuid::Uuid;

/// A flexible volume as reported by the controller.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Volume {
    /// Controller-assigned identifier.
    pub uuid: Uuid,
    /// Volume name, unique within its storage virtual machine.
    pub name: String,
    /// Name of the owning storage virtual machine.
    pub svm: String,
    /// Clone metadata, present when the volume was created as a clone.
    pub clone: Option<CloneRelationship>,
}

impl Volume {
    /// Creates a plain volume without clone metadata.
    #[must_use]
    pub fn new(uuid: Uuid, name: impl Into<String>, svm: impl Into<String>) -> Self {
        Self {
            uuid,
            name: name.into(),
            svm: svm.into(),
            clone: None,
        }
    }
}

/// Link between a clone and the `(volume, snapshot)` pair it was cut from.
///
/// Once a split completes the link stays on the volume for reference but no
/// longer implies shared storage.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CloneRelationship {
    /// Parent volume UUID, when the controller still reports it.
    pub parent_volume: Option<Uuid>,
    /// Parent snapshot UUID, when the controller still reports it.
    pub parent_snapshot: Option<Uuid>,
    /// True while the volume is a flex-clone of its parent.
    pub is_flexclone: bool,
    /// True once a split from the parent has been requested.
    pub split_initiated: bool,
}
