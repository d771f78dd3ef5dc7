//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeSet, HashMap};
use std::env;
use std::ffi::OsString;
use std::future::ready;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};
use uuid::Uuid;

use crate::backend::{
    BackendFailure, BackendFuture, CloneRequest, FailureKind, Job, StorageBackend,
};
use crate::lun::{LunMapKey, LunMapping};
use crate::snapshot::Snapshot;
use crate::volume::{CloneRelationship, Volume};

/// Error returned by [`InMemoryBackend`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("{message}")]
pub struct FakeBackendError {
    /// Classification reported through [`BackendFailure`].
    pub kind: FailureKind,
    /// Human-readable message.
    pub message: String,
}

impl FakeBackendError {
    /// Creates an error of the given kind.
    #[must_use]
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl BackendFailure for FakeBackendError {
    fn kind(&self) -> FailureKind {
        self.kind
    }
}

/// Backend operations that can be made to fail.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BackendOp {
    /// [`StorageBackend::find_volume`].
    FindVolume,
    /// [`StorageBackend::get_volume`].
    GetVolume,
    /// [`StorageBackend::find_snapshot`].
    FindSnapshot,
    /// [`StorageBackend::list_snapshots`].
    ListSnapshots,
    /// [`StorageBackend::create_snapshot`].
    CreateSnapshot,
    /// [`StorageBackend::delete_snapshot`].
    DeleteSnapshot,
    /// [`StorageBackend::rename_snapshot`].
    RenameSnapshot,
    /// [`StorageBackend::create_clone`].
    CreateClone,
    /// [`StorageBackend::initiate_split`].
    InitiateSplit,
    /// [`StorageBackend::await_job`].
    AwaitJob,
    /// [`StorageBackend::delete_volume`].
    DeleteVolume,
    /// [`StorageBackend::find_lun_map`].
    FindLunMap,
    /// [`StorageBackend::create_lun_map`].
    CreateLunMap,
    /// [`StorageBackend::delete_lun_map`].
    DeleteLunMap,
}

/// A call received by [`InMemoryBackend`], in arrival order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BackendCall {
    /// Volume lookup by name.
    FindVolume(String),
    /// Volume refresh by UUID.
    GetVolume(Uuid),
    /// Snapshot lookup by name.
    FindSnapshot(String),
    /// Snapshot enumeration.
    ListSnapshots(Uuid),
    /// Snapshot creation with the generated name.
    CreateSnapshot(String),
    /// Snapshot deletion by name.
    DeleteSnapshot(String),
    /// Snapshot rename.
    RenameSnapshot {
        /// Current name.
        from: String,
        /// Requested name.
        to: String,
    },
    /// Clone creation by clone name.
    CreateClone(String),
    /// Split request by clone UUID.
    InitiateSplit(Uuid),
    /// Job wait by job UUID.
    AwaitJob(Uuid),
    /// Volume deletion by UUID.
    DeleteVolume(Uuid),
    /// Mapping lookup.
    FindLunMap(LunMapKey),
    /// Mapping creation.
    CreateLunMap(LunMapKey),
    /// Mapping removal.
    DeleteLunMap(LunMapKey),
}

/// How [`InMemoryBackend`] answers split requests.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SplitMode {
    /// The split finishes inside the update request.
    #[default]
    Synchronous,
    /// The split runs as a job that finishes when awaited.
    Job,
}

#[derive(Debug, Default)]
struct State {
    volumes: Vec<Volume>,
    snapshots: Vec<Snapshot>,
    lun_maps: Vec<LunMapping>,
    calls: Vec<BackendCall>,
    failures: HashMap<BackendOp, FailureKind>,
    failing_snapshot_deletes: BTreeSet<String>,
    unreachable: bool,
    split_mode: SplitMode,
    pending_splits: HashMap<Uuid, Uuid>,
}

impl State {
    fn volume_mut(&mut self, uuid: &Uuid) -> Result<&mut Volume, FakeBackendError> {
        self.volumes
            .iter_mut()
            .find(|volume| volume.uuid == *uuid)
            .ok_or_else(|| {
                FakeBackendError::new(FailureKind::NotFound, format!("volume {uuid} not found"))
            })
    }

    fn snapshot_mut(&mut self, uuid: &Uuid) -> Result<&mut Snapshot, FakeBackendError> {
        self.snapshots
            .iter_mut()
            .find(|snapshot| snapshot.uuid == *uuid)
            .ok_or_else(|| {
                FakeBackendError::new(FailureKind::NotFound, format!("snapshot {uuid} not found"))
            })
    }

    fn finish_split(&mut self, clone: &Uuid) -> Result<(), FakeBackendError> {
        let volume = self.volume_mut(clone)?;
        if let Some(relationship) = volume.clone.as_mut() {
            relationship.is_flexclone = false;
            relationship.split_initiated = true;
        }
        Ok(())
    }
}

/// In-memory storage controller for exercising components without a
/// network.
///
/// Collections keep insertion order, which stands in for the controller's
/// natural (oldest first) order. Every call is recorded; failures can be
/// injected per operation, per snapshot, or for the whole session.
#[derive(Clone, Debug, Default)]
pub struct InMemoryBackend {
    state: Arc<Mutex<State>>,
}

impl InMemoryBackend {
    /// Creates an empty controller.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_state<T>(
        &self,
        call: BackendCall,
        op: BackendOp,
        apply: impl FnOnce(&mut State) -> Result<T, FakeBackendError>,
    ) -> Result<T, FakeBackendError> {
        let mut state = self.lock();
        state.calls.push(call);
        if state.unreachable {
            return Err(FakeBackendError::new(
                FailureKind::Transport,
                "connection refused",
            ));
        }
        if let Some(kind) = state.failures.get(&op).copied() {
            return Err(FakeBackendError::new(kind, format!("simulated {op:?} failure")));
        }
        apply(&mut state)
    }

    /// Adds a plain volume.
    #[must_use]
    pub fn add_volume(&self, name: &str, svm: &str) -> Volume {
        let volume = Volume::new(Uuid::new_v4(), name, svm);
        self.lock().volumes.push(volume.clone());
        volume
    }

    /// Adds a flex-clone volume whose split has not been requested.
    #[must_use]
    pub fn add_clone(&self, parent: &Volume, snapshot: &Snapshot, name: &str) -> Volume {
        let volume = Volume {
            clone: Some(CloneRelationship {
                parent_volume: Some(parent.uuid),
                parent_snapshot: Some(snapshot.uuid),
                is_flexclone: true,
                split_initiated: false,
            }),
            ..Volume::new(Uuid::new_v4(), name, parent.svm.clone())
        };
        self.lock().volumes.push(volume.clone());
        volume
    }

    /// Appends a snapshot to a volume's collection.
    #[must_use]
    pub fn add_snapshot(&self, volume: &Volume, name: &str) -> Snapshot {
        let snapshot = Snapshot {
            uuid: Uuid::new_v4(),
            volume: volume.uuid,
            name: name.to_owned(),
            create_time: None,
        };
        self.lock().snapshots.push(snapshot.clone());
        snapshot
    }

    /// Adds an existing mapping.
    #[must_use]
    pub fn add_lun_map(&self, key: &LunMapKey, logical_unit_number: u32) -> LunMapping {
        let mapping = LunMapping {
            key: key.clone(),
            lun_uuid: Some(Uuid::new_v4()),
            igroup_uuid: Some(Uuid::new_v4()),
            logical_unit_number: Some(logical_unit_number),
        };
        self.lock().lun_maps.push(mapping.clone());
        mapping
    }

    /// Makes every future call to `op` fail with `kind`.
    pub fn fail(&self, op: BackendOp, kind: FailureKind) {
        self.lock().failures.insert(op, kind);
    }

    /// Makes deletion of the named snapshot fail.
    pub fn fail_snapshot_delete(&self, name: &str) {
        self.lock().failing_snapshot_deletes.insert(name.to_owned());
    }

    /// Makes every call fail as if the controller could not be reached.
    pub fn set_unreachable(&self) {
        self.lock().unreachable = true;
    }

    /// Selects how split requests complete.
    pub fn set_split_mode(&self, mode: SplitMode) {
        self.lock().split_mode = mode;
    }

    /// Returns every call received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<BackendCall> {
        self.lock().calls.clone()
    }

    /// Forgets the recorded calls.
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Returns the current state of the named volume.
    #[must_use]
    pub fn volume(&self, name: &str) -> Option<Volume> {
        self.lock()
            .volumes
            .iter()
            .find(|volume| volume.name == name)
            .cloned()
    }

    /// Returns a volume's snapshot names in collection order.
    #[must_use]
    pub fn snapshot_names(&self, volume: &Volume) -> Vec<String> {
        self.lock()
            .snapshots
            .iter()
            .filter(|snapshot| snapshot.volume == volume.uuid)
            .map(|snapshot| snapshot.name.clone())
            .collect()
    }

    /// Returns every active mapping.
    #[must_use]
    pub fn lun_maps(&self) -> Vec<LunMapping> {
        self.lock().lun_maps.clone()
    }
}

impl StorageBackend for InMemoryBackend {
    type Error = FakeBackendError;

    fn find_volume<'a>(&'a self, name: &'a str) -> BackendFuture<'a, Option<Volume>, Self::Error> {
        let result = self.with_state(
            BackendCall::FindVolume(name.to_owned()),
            BackendOp::FindVolume,
            |state| Ok(state.volumes.iter().find(|v| v.name == name).cloned()),
        );
        Box::pin(ready(result))
    }

    fn get_volume<'a>(&'a self, uuid: &'a Uuid) -> BackendFuture<'a, Option<Volume>, Self::Error> {
        let result = self.with_state(BackendCall::GetVolume(*uuid), BackendOp::GetVolume, |state| {
            Ok(state.volumes.iter().find(|v| v.uuid == *uuid).cloned())
        });
        Box::pin(ready(result))
    }

    fn find_snapshot<'a>(
        &'a self,
        volume: &'a Uuid,
        name: &'a str,
    ) -> BackendFuture<'a, Option<Snapshot>, Self::Error> {
        let result = self.with_state(
            BackendCall::FindSnapshot(name.to_owned()),
            BackendOp::FindSnapshot,
            |state| {
                Ok(state
                    .snapshots
                    .iter()
                    .find(|s| s.volume == *volume && s.name == name)
                    .cloned())
            },
        );
        Box::pin(ready(result))
    }

    fn list_snapshots<'a>(
        &'a self,
        volume: &'a Uuid,
    ) -> BackendFuture<'a, Vec<Snapshot>, Self::Error> {
        let result = self.with_state(
            BackendCall::ListSnapshots(*volume),
            BackendOp::ListSnapshots,
            |state| {
                Ok(state
                    .snapshots
                    .iter()
                    .filter(|s| s.volume == *volume)
                    .cloned()
                    .collect())
            },
        );
        Box::pin(ready(result))
    }

    fn create_snapshot<'a>(
        &'a self,
        volume: &'a Uuid,
        name: &'a str,
    ) -> BackendFuture<'a, Snapshot, Self::Error> {
        let result = self.with_state(
            BackendCall::CreateSnapshot(name.to_owned()),
            BackendOp::CreateSnapshot,
            |state| {
                state.volume_mut(volume)?;
                let snapshot = Snapshot {
                    uuid: Uuid::new_v4(),
                    volume: *volume,
                    name: name.to_owned(),
                    create_time: Some(chrono::Utc::now()),
                };
                state.snapshots.push(snapshot.clone());
                Ok(snapshot)
            },
        );
        Box::pin(ready(result))
    }

    fn delete_snapshot<'a>(&'a self, snapshot: &'a Snapshot) -> BackendFuture<'a, (), Self::Error> {
        let result = self.with_state(
            BackendCall::DeleteSnapshot(snapshot.name.clone()),
            BackendOp::DeleteSnapshot,
            |state| {
                if state.failing_snapshot_deletes.contains(&snapshot.name) {
                    return Err(FakeBackendError::new(
                        FailureKind::Rejected,
                        format!("snapshot {} is busy", snapshot.name),
                    ));
                }
                state.snapshot_mut(&snapshot.uuid)?;
                state.snapshots.retain(|s| s.uuid != snapshot.uuid);
                Ok(())
            },
        );
        Box::pin(ready(result))
    }

    fn rename_snapshot<'a>(
        &'a self,
        snapshot: &'a Snapshot,
        new_name: &'a str,
    ) -> BackendFuture<'a, (), Self::Error> {
        let result = self.with_state(
            BackendCall::RenameSnapshot {
                from: snapshot.name.clone(),
                to: new_name.to_owned(),
            },
            BackendOp::RenameSnapshot,
            |state| {
                state.snapshot_mut(&snapshot.uuid)?.name = new_name.to_owned();
                Ok(())
            },
        );
        Box::pin(ready(result))
    }

    fn create_clone<'a>(
        &'a self,
        request: &'a CloneRequest,
    ) -> BackendFuture<'a, Volume, Self::Error> {
        let result = self.with_state(
            BackendCall::CreateClone(request.name.clone()),
            BackendOp::CreateClone,
            |state| {
                if state.volumes.iter().any(|v| v.name == request.name) {
                    return Err(FakeBackendError::new(
                        FailureKind::Rejected,
                        format!("duplicate volume name {}", request.name),
                    ));
                }
                state.volume_mut(&request.parent_volume)?;
                state.snapshot_mut(&request.parent_snapshot)?;
                let volume = Volume {
                    clone: Some(CloneRelationship {
                        parent_volume: Some(request.parent_volume),
                        parent_snapshot: Some(request.parent_snapshot),
                        is_flexclone: true,
                        split_initiated: false,
                    }),
                    ..Volume::new(Uuid::new_v4(), request.name.clone(), request.svm.clone())
                };
                state.volumes.push(volume.clone());
                Ok(volume)
            },
        );
        Box::pin(ready(result))
    }

    fn initiate_split<'a>(
        &'a self,
        clone: &'a Uuid,
    ) -> BackendFuture<'a, Option<Job>, Self::Error> {
        let result = self.with_state(
            BackendCall::InitiateSplit(*clone),
            BackendOp::InitiateSplit,
            |state| {
                let volume = state.volume_mut(clone)?;
                if let Some(relationship) = volume.clone.as_mut() {
                    relationship.split_initiated = true;
                }
                match state.split_mode {
                    SplitMode::Synchronous => {
                        state.finish_split(clone)?;
                        Ok(None)
                    }
                    SplitMode::Job => {
                        let job = Job {
                            uuid: Uuid::new_v4(),
                        };
                        state.pending_splits.insert(job.uuid, *clone);
                        Ok(Some(job))
                    }
                }
            },
        );
        Box::pin(ready(result))
    }

    fn await_job<'a>(&'a self, job: &'a Job) -> BackendFuture<'a, (), Self::Error> {
        let result = self.with_state(BackendCall::AwaitJob(job.uuid), BackendOp::AwaitJob, |state| {
            let clone = state.pending_splits.remove(&job.uuid).ok_or_else(|| {
                FakeBackendError::new(FailureKind::NotFound, format!("job {} not found", job.uuid))
            })?;
            state.finish_split(&clone)
        });
        Box::pin(ready(result))
    }

    fn delete_volume<'a>(&'a self, uuid: &'a Uuid) -> BackendFuture<'a, (), Self::Error> {
        let result = self.with_state(
            BackendCall::DeleteVolume(*uuid),
            BackendOp::DeleteVolume,
            |state| {
                let name = state.volume_mut(uuid)?.name.clone();
                let prefix = format!("/vol/{name}/");
                state.volumes.retain(|v| v.uuid != *uuid);
                state.snapshots.retain(|s| s.volume != *uuid);
                state
                    .lun_maps
                    .retain(|m| !m.key.lun_path.starts_with(&prefix));
                Ok(())
            },
        );
        Box::pin(ready(result))
    }

    fn find_lun_map<'a>(
        &'a self,
        key: &'a LunMapKey,
    ) -> BackendFuture<'a, Option<LunMapping>, Self::Error> {
        let result = self.with_state(
            BackendCall::FindLunMap(key.clone()),
            BackendOp::FindLunMap,
            |state| Ok(state.lun_maps.iter().find(|m| m.key == *key).cloned()),
        );
        Box::pin(ready(result))
    }

    fn create_lun_map<'a>(
        &'a self,
        key: &'a LunMapKey,
    ) -> BackendFuture<'a, LunMapping, Self::Error> {
        let result = self.with_state(
            BackendCall::CreateLunMap(key.clone()),
            BackendOp::CreateLunMap,
            |state| {
                let duplicate = state
                    .lun_maps
                    .iter()
                    .any(|m| m.key.lun_path == key.lun_path && m.key.igroup == key.igroup);
                if duplicate {
                    return Err(FakeBackendError::new(
                        FailureKind::AlreadyMapped,
                        "LUN already mapped to this group",
                    ));
                }
                let next_id = state
                    .lun_maps
                    .iter()
                    .filter(|m| m.key.igroup == key.igroup)
                    .count();
                let mapping = LunMapping {
                    key: key.clone(),
                    lun_uuid: Some(Uuid::new_v4()),
                    igroup_uuid: Some(Uuid::new_v4()),
                    logical_unit_number: u32::try_from(next_id).ok(),
                };
                state.lun_maps.push(mapping.clone());
                Ok(mapping)
            },
        );
        Box::pin(ready(result))
    }

    fn delete_lun_map<'a>(
        &'a self,
        mapping: &'a LunMapping,
    ) -> BackendFuture<'a, (), Self::Error> {
        let result = self.with_state(
            BackendCall::DeleteLunMap(mapping.key.clone()),
            BackendOp::DeleteLunMap,
            |state| {
                let before = state.lun_maps.len();
                state.lun_maps.retain(|m| m.key != mapping.key);
                if state.lun_maps.len() == before {
                    return Err(FakeBackendError::new(
                        FailureKind::NotFound,
                        format!("no mapping of {} to {}", mapping.key.lun_path, mapping.key.igroup),
                    ));
                }
                Ok(())
            },
        );
        Box::pin(ready(result))
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    /// Pairs with an empty value remove the variable instead.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe {
                if value.is_empty() {
                    env::remove_var(key);
                } else {
                    env::set_var(key, value);
                }
            }
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
