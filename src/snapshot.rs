//! Snapshot lifecycle: create, enumerate, rename, and delete.
//!
//! Enumeration is ordered most recent first by reversing the controller's
//! collection order. Timestamps are never consulted for ordering, so the
//! result is fully defined even when creation times are missing or equal.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::backend::StorageBackend;
use crate::volume::Volume;

/// Point-in-time image of a volume.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Snapshot {
    /// Controller-assigned identifier.
    pub uuid: Uuid,
    /// UUID of the owning volume.
    pub volume: Uuid,
    /// Snapshot name.
    pub name: String,
    /// Creation time, when the controller reports it.
    pub create_time: Option<DateTime<Utc>>,
}

/// Builds the generated snapshot name `{base_name}_{unix_seconds}`.
///
/// Two names generated for the same base within one second are identical;
/// the controller decides what happens to the second create.
#[must_use]
pub fn snapshot_name(base_name: &str, at: DateTime<Utc>) -> String {
    format!("{base_name}_{}", at.timestamp())
}

/// Reorders a controller collection so the most recently created snapshot
/// comes first.
#[must_use]
pub fn newest_first(mut collection: Vec<Snapshot>) -> Vec<Snapshot> {
    collection.reverse();
    collection
}

/// Errors raised by snapshot lifecycle operations.
#[derive(Debug, Error)]
pub enum SnapshotError<BackendError>
where
    BackendError: std::error::Error + 'static,
{
    /// Raised when the base name for a generated snapshot name is blank.
    #[error("snapshot base name must not be empty")]
    MissingBaseName,
    /// Raised when a rename target is blank.
    #[error("new snapshot name must not be empty")]
    MissingNewName,
    /// Raised when the controller refuses to create the snapshot.
    #[error("cannot create snapshot {name} for volume {volume}: {source}")]
    Create {
        /// Generated snapshot name.
        name: String,
        /// Volume name.
        volume: String,
        /// Provider-specific error.
        #[source]
        source: BackendError,
    },
    /// Raised when the snapshot collection cannot be read.
    #[error("cannot list snapshots of volume {volume}: {source}")]
    List {
        /// Volume name.
        volume: String,
        /// Provider-specific error.
        #[source]
        source: BackendError,
    },
    /// Raised when the controller refuses the rename.
    #[error("cannot rename snapshot {from} to {to}: {source}")]
    Rename {
        /// Current snapshot name.
        from: String,
        /// Requested snapshot name.
        to: String,
        /// Provider-specific error.
        #[source]
        source: BackendError,
    },
    /// Raised when the controller refuses the delete.
    #[error("cannot delete snapshot {name}: {source}")]
    Delete {
        /// Snapshot name.
        name: String,
        /// Provider-specific error.
        #[source]
        source: BackendError,
    },
}

impl<BackendError> SnapshotError<BackendError>
where
    BackendError: std::error::Error + 'static,
{
    /// Returns the underlying backend error, if any.
    #[must_use]
    pub const fn backend_error(&self) -> Option<&BackendError> {
        match self {
            Self::MissingBaseName | Self::MissingNewName => None,
            Self::Create { source, .. }
            | Self::List { source, .. }
            | Self::Rename { source, .. }
            | Self::Delete { source, .. } => Some(source),
        }
    }
}

/// Creates, lists, renames, and deletes the snapshots of a volume.
#[derive(Debug)]
pub struct SnapshotManager<'a, B> {
    backend: &'a B,
}

impl<'a, B> SnapshotManager<'a, B>
where
    B: StorageBackend,
{
    /// Creates a manager bound to the given backend session.
    #[must_use]
    pub const fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Creates a snapshot named after `base_name` and the current time.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::MissingBaseName`] for a blank base name and
    /// [`SnapshotError::Create`] when the controller rejects the request.
    pub async fn create(
        &self,
        volume: &Volume,
        base_name: &str,
    ) -> Result<Snapshot, SnapshotError<B::Error>> {
        self.create_at(volume, base_name, Utc::now()).await
    }

    /// Creates a snapshot named after `base_name` and the supplied instant.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::MissingBaseName`] for a blank base name and
    /// [`SnapshotError::Create`] when the controller rejects the request.
    pub async fn create_at(
        &self,
        volume: &Volume,
        base_name: &str,
        at: DateTime<Utc>,
    ) -> Result<Snapshot, SnapshotError<B::Error>> {
        let base = base_name.trim();
        if base.is_empty() {
            return Err(SnapshotError::MissingBaseName);
        }

        let name = snapshot_name(base, at);
        let snapshot = self
            .backend
            .create_snapshot(&volume.uuid, &name)
            .await
            .map_err(|source| SnapshotError::Create {
                name: name.clone(),
                volume: volume.name.clone(),
                source,
            })?;
        info!(volume = %volume.name, snapshot = %snapshot.name, "created snapshot");
        Ok(snapshot)
    }

    /// Lists every snapshot of the volume, most recently created first.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::List`] when the collection cannot be read.
    pub async fn list(&self, volume: &Volume) -> Result<Vec<Snapshot>, SnapshotError<B::Error>> {
        let collection = self
            .backend
            .list_snapshots(&volume.uuid)
            .await
            .map_err(|source| SnapshotError::List {
                volume: volume.name.clone(),
                source,
            })?;
        debug!(volume = %volume.name, count = collection.len(), "listed snapshots");
        Ok(newest_first(collection))
    }

    /// Renames a snapshot and returns it under its new name.
    ///
    /// A failed rename is reported once; it is not retried.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::MissingNewName`] for a blank target name and
    /// [`SnapshotError::Rename`] when the controller rejects the request.
    pub async fn rename(
        &self,
        snapshot: &Snapshot,
        new_name: &str,
    ) -> Result<Snapshot, SnapshotError<B::Error>> {
        let target = new_name.trim();
        if target.is_empty() {
            return Err(SnapshotError::MissingNewName);
        }

        self.backend
            .rename_snapshot(snapshot, target)
            .await
            .map_err(|source| SnapshotError::Rename {
                from: snapshot.name.clone(),
                to: target.to_owned(),
                source,
            })?;
        info!(from = %snapshot.name, to = target, "renamed snapshot");
        Ok(Snapshot {
            name: target.to_owned(),
            ..snapshot.clone()
        })
    }

    /// Deletes a snapshot. The caller decides whether a failure is fatal.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Delete`] when the controller rejects the
    /// request.
    pub async fn delete(&self, snapshot: &Snapshot) -> Result<(), SnapshotError<B::Error>> {
        self.backend
            .delete_snapshot(snapshot)
            .await
            .map_err(|source| SnapshotError::Delete {
                name: snapshot.name.clone(),
                source,
            })?;
        info!(snapshot = %snapshot.name, "deleted snapshot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn snapshot(name: &str) -> Snapshot {
        Snapshot {
            uuid: Uuid::new_v4(),
            volume: Uuid::nil(),
            name: name.to_owned(),
            create_time: None,
        }
    }

    #[rstest]
    #[case("daily", 1_571_097_600, "daily_1571097600")]
    #[case("pre-upgrade", 0, "pre-upgrade_0")]
    fn snapshot_name_appends_epoch_seconds(
        #[case] base: &str,
        #[case] epoch: i64,
        #[case] expected: &str,
    ) {
        let at = Utc
            .timestamp_opt(epoch, 0)
            .single()
            .expect("valid timestamp");
        assert_eq!(snapshot_name(base, at), expected);
    }

    #[test]
    fn snapshot_name_ignores_sub_second_precision() {
        let at = Utc
            .timestamp_opt(1_600_000_000, 999_000_000)
            .single()
            .expect("valid timestamp");
        assert_eq!(snapshot_name("hourly", at), "hourly_1600000000");
    }

    #[test]
    fn newest_first_reverses_collection_order_without_sorting() {
        let collection = vec![snapshot("b"), snapshot("a"), snapshot("c")];
        let names: Vec<_> = newest_first(collection)
            .into_iter()
            .map(|snap| snap.name)
            .collect();
        assert_eq!(names, ["c", "a", "b"]);
    }
}
