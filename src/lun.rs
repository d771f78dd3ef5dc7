//! Idempotent LUN-to-initiator-group mapping.
//!
//! Mapping a LUN that is already mapped to the same group counts as
//! success, and unmapping a mapping that does not exist is a no-op.

use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::backend::{BackendFailure, FailureKind, StorageBackend};

/// Builds the LUN path for a LUN living in a volume.
#[must_use]
pub fn lun_path(volume: &str, lun: &str) -> String {
    format!("/vol/{volume}/{lun}")
}

/// Identifies a mapping: LUN path, initiator group, and storage VM.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct LunMapKey {
    /// Full LUN path (for example `/vol/db01/lun0`).
    pub lun_path: String,
    /// Initiator group name.
    pub igroup: String,
    /// Storage virtual machine name.
    pub svm: String,
}

impl LunMapKey {
    /// Creates a key, trimming whitespace from every component.
    #[must_use]
    pub fn new(
        lun_path: impl Into<String>,
        igroup: impl Into<String>,
        svm: impl Into<String>,
    ) -> Self {
        Self {
            lun_path: lun_path.into().trim().to_owned(),
            igroup: igroup.into().trim().to_owned(),
            svm: svm.into().trim().to_owned(),
        }
    }
}

/// An active mapping as reported by the controller.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LunMapping {
    /// Mapping identity.
    pub key: LunMapKey,
    /// Controller identifier of the LUN.
    pub lun_uuid: Option<Uuid>,
    /// Controller identifier of the initiator group.
    pub igroup_uuid: Option<Uuid>,
    /// Logical unit number the hosts see.
    pub logical_unit_number: Option<u32>,
}

/// Result of a map request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MapOutcome {
    /// A new mapping was created.
    Mapped(LunMapping),
    /// The controller reported the pair as already mapped.
    AlreadyMapped,
}

/// Result of an unmap request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum UnmapOutcome {
    /// The mapping existed and was removed.
    Removed(LunMapping),
    /// No mapping existed; nothing was changed.
    NothingToRemove,
}

/// Errors raised by the LUN mapping resolver.
#[derive(Debug, Error)]
pub enum LunMapError<BackendError>
where
    BackendError: std::error::Error + 'static,
{
    /// Raised when a key component is blank.
    #[error("missing {0} for LUN mapping")]
    MissingField(&'static str),
    /// Raised when the mapping lookup fails.
    #[error("cannot look up mapping of {lun_path} to {igroup}: {source}")]
    Lookup {
        /// LUN path.
        lun_path: String,
        /// Initiator group name.
        igroup: String,
        /// Provider-specific error.
        #[source]
        source: BackendError,
    },
    /// Raised when the controller rejects the map request.
    #[error("cannot map {lun_path} to {igroup}: {source}")]
    Map {
        /// LUN path.
        lun_path: String,
        /// Initiator group name.
        igroup: String,
        /// Provider-specific error.
        #[source]
        source: BackendError,
    },
    /// Raised when the controller rejects the unmap request.
    #[error("cannot unmap {lun_path} from {igroup}: {source}")]
    Unmap {
        /// LUN path.
        lun_path: String,
        /// Initiator group name.
        igroup: String,
        /// Provider-specific error.
        #[source]
        source: BackendError,
    },
}

impl<BackendError> LunMapError<BackendError>
where
    BackendError: std::error::Error + 'static,
{
    /// Returns the underlying backend error, if any.
    #[must_use]
    pub const fn backend_error(&self) -> Option<&BackendError> {
        match self {
            Self::MissingField(_) => None,
            Self::Lookup { source, .. } | Self::Map { source, .. } | Self::Unmap { source, .. } => {
                Some(source)
            }
        }
    }
}

/// Maps and unmaps LUNs to initiator groups.
#[derive(Debug)]
pub struct LunMapper<'a, B> {
    backend: &'a B,
}

impl<'a, B> LunMapper<'a, B>
where
    B: StorageBackend,
{
    /// Creates a resolver bound to the given backend session.
    #[must_use]
    pub const fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Returns the existing mapping for the key, if any.
    ///
    /// # Errors
    ///
    /// Returns [`LunMapError::Lookup`] when the controller cannot be queried.
    pub async fn resolve(
        &self,
        key: &LunMapKey,
    ) -> Result<Option<LunMapping>, LunMapError<B::Error>> {
        validate(key)?;
        self.backend
            .find_lun_map(key)
            .await
            .map_err(|source| LunMapError::Lookup {
                lun_path: key.lun_path.clone(),
                igroup: key.igroup.clone(),
                source,
            })
    }

    /// Maps the LUN to the initiator group.
    ///
    /// # Errors
    ///
    /// Returns [`LunMapError::Map`] for any controller error other than the
    /// pair already being mapped.
    pub async fn map(&self, key: &LunMapKey) -> Result<MapOutcome, LunMapError<B::Error>> {
        validate(key)?;
        match self.backend.create_lun_map(key).await {
            Ok(mapping) => {
                info!(
                    lun = %key.lun_path,
                    igroup = %key.igroup,
                    lun_id = ?mapping.logical_unit_number,
                    "mapped LUN"
                );
                Ok(MapOutcome::Mapped(mapping))
            }
            Err(err) if err.kind() == FailureKind::AlreadyMapped => {
                debug!(lun = %key.lun_path, igroup = %key.igroup, "LUN already mapped");
                Ok(MapOutcome::AlreadyMapped)
            }
            Err(source) => Err(LunMapError::Map {
                lun_path: key.lun_path.clone(),
                igroup: key.igroup.clone(),
                source,
            }),
        }
    }

    /// Removes the mapping when one exists.
    ///
    /// # Errors
    ///
    /// Returns [`LunMapError::Lookup`] when the existing mapping cannot be
    /// read and [`LunMapError::Unmap`] when the controller rejects removal.
    pub async fn unmap(&self, key: &LunMapKey) -> Result<UnmapOutcome, LunMapError<B::Error>> {
        let Some(mapping) = self.resolve(key).await? else {
            debug!(lun = %key.lun_path, igroup = %key.igroup, "no mapping to remove");
            return Ok(UnmapOutcome::NothingToRemove);
        };

        self.backend
            .delete_lun_map(&mapping)
            .await
            .map_err(|source| LunMapError::Unmap {
                lun_path: key.lun_path.clone(),
                igroup: key.igroup.clone(),
                source,
            })?;
        info!(lun = %key.lun_path, igroup = %key.igroup, "unmapped LUN");
        Ok(UnmapOutcome::Removed(mapping))
    }
}

const fn validate<E>(key: &LunMapKey) -> Result<(), LunMapError<E>>
where
    E: std::error::Error + 'static,
{
    if key.lun_path.is_empty() {
        return Err(LunMapError::MissingField("LUN path"));
    }
    if key.igroup.is_empty() {
        return Err(LunMapError::MissingField("initiator group"));
    }
    if key.svm.is_empty() {
        return Err(LunMapError::MissingField("storage VM"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lun_path_nests_lun_under_volume() {
        assert_eq!(lun_path("db01", "lun0"), "/vol/db01/lun0");
    }

    #[test]
    fn key_trims_components() {
        let key = LunMapKey::new(" /vol/a/l ", " ig ", " svm0 ");
        assert_eq!(key, LunMapKey::new("/vol/a/l", "ig", "svm0"));
    }
}
