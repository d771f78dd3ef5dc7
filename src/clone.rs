//! Flex-clone provisioning: create from a snapshot, split from the parent,
//! delete.
//!
//! A clone moves through `Requested → Created → SplitInProgress →
//! SplitComplete`; `Created` and `SplitComplete` clones may be deleted.

use std::fmt;

use thiserror::Error;
use tracing::{debug, info};

use crate::backend::{CloneRequest, Job, StorageBackend};
use crate::snapshot::Snapshot;
use crate::volume::Volume;

/// Lifecycle position of a clone.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CloneState {
    /// The create request has not been accepted yet.
    Requested,
    /// The clone exists and shares blocks with its parent.
    Created,
    /// A split has been requested and has not finished.
    SplitInProgress,
    /// The clone no longer shares blocks with its parent.
    SplitComplete,
    /// The clone volume has been removed.
    Deleted,
}

impl CloneState {
    /// Derives the state of an existing volume from its clone metadata.
    ///
    /// Returns `None` for volumes that were never cloned.
    #[must_use]
    pub fn of(volume: &Volume) -> Option<Self> {
        let clone = volume.clone.as_ref()?;
        Some(match (clone.is_flexclone, clone.split_initiated) {
            (true, false) => Self::Created,
            (true, true) => Self::SplitInProgress,
            (false, _) => Self::SplitComplete,
        })
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Created => "created",
            Self::SplitInProgress => "split in progress",
            Self::SplitComplete => "split complete",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for CloneState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A clone volume paired with its lifecycle state.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProvisionedClone {
    volume: Volume,
    state: CloneState,
}

impl ProvisionedClone {
    /// Wraps an existing volume, deriving its state from clone metadata.
    ///
    /// Returns `None` when the volume carries no clone metadata.
    #[must_use]
    pub fn from_volume(volume: Volume) -> Option<Self> {
        let state = CloneState::of(&volume)?;
        Some(Self { volume, state })
    }

    /// Returns the clone volume.
    #[must_use]
    pub const fn volume(&self) -> &Volume {
        &self.volume
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> CloneState {
        self.state
    }
}

/// How a split finished.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SplitOutcome {
    /// The controller completed the split within the update request.
    Synchronous,
    /// The controller ran the split as a background job that has finished.
    Awaited(Job),
}

/// Errors raised by clone provisioning.
#[derive(Debug, Error)]
pub enum CloneError<BackendError>
where
    BackendError: std::error::Error + 'static,
{
    /// Raised when the clone name is blank.
    #[error("clone name must not be empty")]
    MissingName,
    /// Raised when the controller rejects the clone request.
    #[error("cannot create clone {name} of volume {parent} from snapshot {snapshot}: {source}")]
    Create {
        /// Requested clone name.
        name: String,
        /// Parent volume name.
        parent: String,
        /// Parent snapshot name.
        snapshot: String,
        /// Provider-specific error.
        #[source]
        source: BackendError,
    },
    /// Raised when an operation is not legal from the clone's state.
    #[error("clone {name} is {from}; cannot move to {to}")]
    InvalidTransition {
        /// Clone name.
        name: String,
        /// Current state.
        from: CloneState,
        /// Requested state.
        to: CloneState,
    },
    /// Raised when the split request is rejected.
    #[error("cannot split clone volume {name} from parent: {source}")]
    Split {
        /// Clone name.
        name: String,
        /// Provider-specific error.
        #[source]
        source: BackendError,
    },
    /// Raised when the background split job fails.
    #[error("split job for clone volume {name} failed: {source}")]
    SplitJob {
        /// Clone name.
        name: String,
        /// Provider-specific error.
        #[source]
        source: BackendError,
    },
    /// Raised when the clone's current state cannot be fetched.
    #[error("cannot refresh clone volume {name}: {source}")]
    Refresh {
        /// Clone name.
        name: String,
        /// Provider-specific error.
        #[source]
        source: BackendError,
    },
    /// Raised when the clone disappeared before it could be deleted.
    #[error("clone volume {name} no longer exists")]
    Vanished {
        /// Clone name.
        name: String,
    },
    /// Raised when the controller rejects the delete.
    #[error("cannot delete volume {name}: {source}")]
    Delete {
        /// Clone name.
        name: String,
        /// Provider-specific error.
        #[source]
        source: BackendError,
    },
}

impl<BackendError> CloneError<BackendError>
where
    BackendError: std::error::Error + 'static,
{
    /// Returns the underlying backend error, if any.
    #[must_use]
    pub const fn backend_error(&self) -> Option<&BackendError> {
        match self {
            Self::MissingName | Self::InvalidTransition { .. } | Self::Vanished { .. } => None,
            Self::Create { source, .. }
            | Self::Split { source, .. }
            | Self::SplitJob { source, .. }
            | Self::Refresh { source, .. }
            | Self::Delete { source, .. } => Some(source),
        }
    }
}

/// Drives clones through create, split, and delete.
#[derive(Debug)]
pub struct CloneProvisioner<'a, B> {
    backend: &'a B,
}

impl<'a, B> CloneProvisioner<'a, B>
where
    B: StorageBackend,
{
    /// Creates a provisioner bound to the given backend session.
    #[must_use]
    pub const fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Creates a flex-clone of `parent` from `snapshot` on `svm`.
    ///
    /// # Errors
    ///
    /// Returns [`CloneError::MissingName`] for a blank name and
    /// [`CloneError::Create`] when the controller rejects the request.
    pub async fn create(
        &self,
        parent: &Volume,
        snapshot: &Snapshot,
        svm: &str,
        name: &str,
    ) -> Result<ProvisionedClone, CloneError<B::Error>> {
        let clone_name = name.trim();
        if clone_name.is_empty() {
            return Err(CloneError::MissingName);
        }

        let request = CloneRequest {
            parent_volume: parent.uuid,
            parent_snapshot: snapshot.uuid,
            svm: svm.to_owned(),
            name: clone_name.to_owned(),
        };
        debug!(clone = clone_name, state = %CloneState::Requested, "requesting clone");
        let volume = self
            .backend
            .create_clone(&request)
            .await
            .map_err(|source| CloneError::Create {
                name: clone_name.to_owned(),
                parent: parent.name.clone(),
                snapshot: snapshot.name.clone(),
                source,
            })?;
        info!(
            clone = %volume.name,
            parent = %parent.name,
            snapshot = %snapshot.name,
            "created clone"
        );

        Ok(ProvisionedClone {
            volume,
            state: CloneState::Created,
        })
    }

    /// Splits a clone from its parent, waiting for a background job when the
    /// controller starts one.
    ///
    /// The wait has no client-side limit; it ends when the controller reports
    /// the job finished.
    ///
    /// # Errors
    ///
    /// Returns [`CloneError::InvalidTransition`] unless the clone is
    /// [`CloneState::Created`], [`CloneError::Split`] when the request is
    /// rejected, and [`CloneError::SplitJob`] when the job fails.
    pub async fn split(
        &self,
        clone: &mut ProvisionedClone,
    ) -> Result<SplitOutcome, CloneError<B::Error>> {
        if clone.state != CloneState::Created {
            return Err(CloneError::InvalidTransition {
                name: clone.volume.name.clone(),
                from: clone.state,
                to: CloneState::SplitInProgress,
            });
        }

        let requested = self
            .backend
            .initiate_split(&clone.volume.uuid)
            .await
            .map_err(|source| CloneError::Split {
                name: clone.volume.name.clone(),
                source,
            })?;
        clone.state = CloneState::SplitInProgress;

        let Some(job) = requested else {
            clone.state = CloneState::SplitComplete;
            info!(clone = %clone.volume.name, "split completed synchronously");
            return Ok(SplitOutcome::Synchronous);
        };

        info!(clone = %clone.volume.name, job = %job.uuid, "waiting for split job");
        self.backend
            .await_job(&job)
            .await
            .map_err(|source| CloneError::SplitJob {
                name: clone.volume.name.clone(),
                source,
            })?;
        clone.state = CloneState::SplitComplete;
        info!(clone = %clone.volume.name, "split job finished");
        Ok(SplitOutcome::Awaited(job))
    }

    /// Deletes a clone after re-reading its state from the controller.
    ///
    /// # Errors
    ///
    /// Returns [`CloneError::InvalidTransition`] when the clone (as currently
    /// reported) is mid-split, [`CloneError::Vanished`] when it no longer
    /// exists, and [`CloneError::Refresh`] or [`CloneError::Delete`] when the
    /// controller rejects a request.
    pub async fn delete(
        &self,
        clone: ProvisionedClone,
    ) -> Result<CloneState, CloneError<B::Error>> {
        Self::ensure_deletable(&clone.volume.name, clone.state)?;

        let name = clone.volume.name;
        let current = self
            .backend
            .get_volume(&clone.volume.uuid)
            .await
            .map_err(|source| CloneError::Refresh {
                name: name.clone(),
                source,
            })?
            .ok_or_else(|| CloneError::Vanished { name: name.clone() })?;
        if let Some(state) = CloneState::of(&current) {
            Self::ensure_deletable(&name, state)?;
        }

        self.backend
            .delete_volume(&current.uuid)
            .await
            .map_err(|source| CloneError::Delete {
                name: name.clone(),
                source,
            })?;
        info!(clone = %name, "deleted clone volume");
        Ok(CloneState::Deleted)
    }

    fn ensure_deletable(name: &str, state: CloneState) -> Result<(), CloneError<B::Error>> {
        match state {
            CloneState::Created | CloneState::SplitComplete => Ok(()),
            other => Err(CloneError::InvalidTransition {
                name: name.to_owned(),
                from: other,
                to: CloneState::Deleted,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::CloneRelationship;
    use rstest::rstest;
    use uuid::Uuid;

    fn volume_with(clone: Option<CloneRelationship>) -> Volume {
        Volume {
            clone,
            ..Volume::new(Uuid::new_v4(), "vol", "svm0")
        }
    }

    #[rstest]
    #[case(true, false, CloneState::Created)]
    #[case(true, true, CloneState::SplitInProgress)]
    #[case(false, true, CloneState::SplitComplete)]
    #[case(false, false, CloneState::SplitComplete)]
    fn state_is_derived_from_clone_metadata(
        #[case] is_flexclone: bool,
        #[case] split_initiated: bool,
        #[case] expected: CloneState,
    ) {
        let volume = volume_with(Some(CloneRelationship {
            is_flexclone,
            split_initiated,
            ..CloneRelationship::default()
        }));
        assert_eq!(CloneState::of(&volume), Some(expected));
    }

    #[test]
    fn plain_volumes_are_not_clones() {
        let volume = volume_with(None);
        assert_eq!(CloneState::of(&volume), None);
        assert!(ProvisionedClone::from_volume(volume).is_none());
    }

    #[test]
    fn state_display_is_lowercase_prose() {
        assert_eq!(CloneState::SplitInProgress.to_string(), "split in progress");
    }
}
