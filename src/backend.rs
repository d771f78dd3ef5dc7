//! Backend abstraction over a storage controller's volumes, snapshots,
//! clones, and LUN maps.
//!
//! Components borrow a single [`StorageBackend`] for the duration of one
//! invocation and never talk to each other; every remote interaction goes
//! through this seam.

use std::future::Future;
use std::pin::Pin;

use uuid::Uuid;

use crate::lun::{LunMapKey, LunMapping};
use crate::snapshot::Snapshot;
use crate::volume::Volume;

/// Future returned by backend operations.
pub type BackendFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Coarse classification of a backend failure.
///
/// Callers branch on the kind rather than on message text, so the
/// "already mapped" condition is handled as a distinct, expected case.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FailureKind {
    /// The addressed entity does not exist.
    NotFound,
    /// The LUN is already mapped to the requested initiator group.
    AlreadyMapped,
    /// The controller could not be reached or the session failed.
    Transport,
    /// The controller rejected the request.
    Rejected,
}

/// Errors raised by a backend classify themselves for callers.
pub trait BackendFailure: std::error::Error + Send + Sync + 'static {
    /// Returns the failure classification.
    fn kind(&self) -> FailureKind;
}

/// Handle for a long-running operation the controller executes in the
/// background.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Job {
    /// Controller-assigned job identifier.
    pub uuid: Uuid,
}

/// Parameters for creating a flex-clone from a `(volume, snapshot)` pair.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CloneRequest {
    /// UUID of the parent volume.
    pub parent_volume: Uuid,
    /// UUID of the parent snapshot.
    pub parent_snapshot: Uuid,
    /// Storage virtual machine that owns the clone.
    pub svm: String,
    /// Name of the clone volume.
    pub name: String,
}

/// Operations a storage controller exposes to the core components.
///
/// Lookups resolve to `Ok(None)` when the entity does not exist; only real
/// failures surface as `Err`.
pub trait StorageBackend {
    /// Provider specific error type returned by the backend.
    type Error: BackendFailure;

    /// Looks a volume up by name.
    fn find_volume<'a>(&'a self, name: &'a str) -> BackendFuture<'a, Option<Volume>, Self::Error>;

    /// Fetches the current state of a volume by UUID.
    fn get_volume<'a>(&'a self, uuid: &'a Uuid) -> BackendFuture<'a, Option<Volume>, Self::Error>;

    /// Looks a snapshot up by name within a volume.
    fn find_snapshot<'a>(
        &'a self,
        volume: &'a Uuid,
        name: &'a str,
    ) -> BackendFuture<'a, Option<Snapshot>, Self::Error>;

    /// Lists every snapshot of a volume in the controller's collection order
    /// (oldest first).
    fn list_snapshots<'a>(
        &'a self,
        volume: &'a Uuid,
    ) -> BackendFuture<'a, Vec<Snapshot>, Self::Error>;

    /// Creates a snapshot with the given name.
    fn create_snapshot<'a>(
        &'a self,
        volume: &'a Uuid,
        name: &'a str,
    ) -> BackendFuture<'a, Snapshot, Self::Error>;

    /// Deletes a snapshot.
    fn delete_snapshot<'a>(&'a self, snapshot: &'a Snapshot) -> BackendFuture<'a, (), Self::Error>;

    /// Renames a snapshot in place.
    fn rename_snapshot<'a>(
        &'a self,
        snapshot: &'a Snapshot,
        new_name: &'a str,
    ) -> BackendFuture<'a, (), Self::Error>;

    /// Creates a flex-clone volume.
    fn create_clone<'a>(
        &'a self,
        request: &'a CloneRequest,
    ) -> BackendFuture<'a, Volume, Self::Error>;

    /// Flags a clone for split from its parent.
    ///
    /// Returns `Some(job)` when the controller runs the split in the
    /// background and `None` when it completed synchronously.
    fn initiate_split<'a>(
        &'a self,
        clone: &'a Uuid,
    ) -> BackendFuture<'a, Option<Job>, Self::Error>;

    /// Blocks until the job reports completion or failure.
    ///
    /// Implementations wait without a client-side limit unless they were
    /// explicitly configured with one.
    fn await_job<'a>(&'a self, job: &'a Job) -> BackendFuture<'a, (), Self::Error>;

    /// Deletes a volume. Dependent LUN maps go with it.
    fn delete_volume<'a>(&'a self, uuid: &'a Uuid) -> BackendFuture<'a, (), Self::Error>;

    /// Looks up the mapping of a LUN to an initiator group.
    fn find_lun_map<'a>(
        &'a self,
        key: &'a LunMapKey,
    ) -> BackendFuture<'a, Option<LunMapping>, Self::Error>;

    /// Maps a LUN to an initiator group.
    fn create_lun_map<'a>(
        &'a self,
        key: &'a LunMapKey,
    ) -> BackendFuture<'a, LunMapping, Self::Error>;

    /// Removes an existing LUN mapping.
    fn delete_lun_map<'a>(
        &'a self,
        mapping: &'a LunMapping,
    ) -> BackendFuture<'a, (), Self::Error>;
}
