//! Runs a validated [`Operation`] against a backend and prints the result.

use std::io::Write;

use tracing::debug;

use crate::backend::StorageBackend;
use crate::clone::{CloneError, CloneProvisioner, ProvisionedClone, SplitOutcome};
use crate::lun::{LunMapError, LunMapKey, LunMapper, MapOutcome, UnmapOutcome, lun_path};
use crate::rotation::{Retention, RotationOutcome, Rotator};
use crate::snapshot::{Snapshot, SnapshotManager};
use crate::volume::Volume;

use super::{CommandError, Operation};

const SEPARATOR_WIDTH: usize = 50;
const CREATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S+00:00";

/// Executes operations, writing human-readable results to `out`.
#[derive(Debug)]
pub struct Executor<'a, B, W> {
    backend: &'a B,
    out: W,
}

impl<'a, B, W> Executor<'a, B, W>
where
    B: StorageBackend,
    W: Write,
{
    /// Creates an executor bound to one backend session.
    #[must_use]
    pub const fn new(backend: &'a B, out: W) -> Self {
        Self { backend, out }
    }

    /// Consumes the executor and returns the output sink.
    #[must_use]
    pub fn into_output(self) -> W {
        self.out
    }

    /// Runs one operation.
    ///
    /// # Errors
    ///
    /// Returns a [`CommandError`] whose exit code reflects the failure.
    pub async fn execute(&mut self, operation: &Operation) -> Result<(), CommandError> {
        match operation {
            Operation::SnapList { volume } => self.snap_list(volume).await,
            Operation::SnapCreate { volume, base_name } => {
                self.snap_create(volume, base_name).await
            }
            Operation::SnapDelete { volume, snapshot } => self.snap_delete(volume, snapshot).await,
            Operation::SnapRotate { volume, retention } => {
                self.snap_rotate(volume, *retention).await
            }
            Operation::SnapRename {
                volume,
                snapshot,
                new_name,
            } => self.snap_rename(volume, snapshot, new_name).await,
            Operation::CloneCreate {
                volume,
                snapshot,
                clone,
            } => self.clone_create(volume, snapshot, clone).await,
            Operation::CloneSplit { clone } => self.clone_split(clone).await,
            Operation::CloneDelete { clone } => self.clone_delete(clone).await,
            Operation::LunMap {
                volume,
                lun,
                igroup,
            } => self.lun_map(volume, lun, igroup).await,
            Operation::LunUnmap {
                volume,
                lun,
                igroup,
            } => self.lun_unmap(volume, lun, igroup).await,
        }
    }

    async fn resolve_volume(&self, name: &str) -> Result<Volume, CommandError> {
        match self.backend.find_volume(name).await {
            Ok(Some(volume)) => Ok(volume),
            Ok(None) => Err(CommandError::NotFound(format!(
                "Unable to find volume with name '{name}'"
            ))),
            Err(err) => Err(CommandError::from_backend(
                Some(&err),
                format!("Cannot look up volume {name}: {err}"),
                CommandError::Operation,
            )),
        }
    }

    async fn resolve_snapshot(
        &self,
        volume: &Volume,
        name: &str,
    ) -> Result<Snapshot, CommandError> {
        match self.backend.find_snapshot(&volume.uuid, name).await {
            Ok(Some(snapshot)) => Ok(snapshot),
            Ok(None) => Err(CommandError::NotFound(format!(
                "Unable to find snapshot with name '{name}'"
            ))),
            Err(err) => Err(CommandError::from_backend(
                Some(&err),
                format!("Cannot look up snapshot {name}: {err}"),
                CommandError::Operation,
            )),
        }
    }

    async fn snap_list(&mut self, name: &str) -> Result<(), CommandError> {
        let volume = self.resolve_volume(name).await?;
        writeln!(self.out, "Volume: {}\n", volume.name)?;

        let snapshots = SnapshotManager::new(self.backend)
            .list(&volume)
            .await
            .map_err(|err| {
                CommandError::from_backend(
                    err.backend_error(),
                    err.to_string(),
                    CommandError::Operation,
                )
            })?;
        if snapshots.is_empty() {
            writeln!(self.out, "No snapshots found")?;
            return Ok(());
        }

        let separator = "-".repeat(SEPARATOR_WIDTH);
        writeln!(self.out, "{} snapshots found", snapshots.len())?;
        writeln!(self.out, "{separator}")?;
        writeln!(self.out, "Snapshot name           Creation time")?;
        writeln!(self.out, "{separator}")?;
        for snapshot in &snapshots {
            let created = snapshot.create_time.map_or_else(
                || String::from("unknown"),
                |at| at.format(CREATE_TIME_FORMAT).to_string(),
            );
            writeln!(self.out, "{:<24}{created}", snapshot.name)?;
        }
        writeln!(self.out, "{separator}")?;
        Ok(())
    }

    async fn snap_create(&mut self, name: &str, base_name: &str) -> Result<(), CommandError> {
        let volume = self.resolve_volume(name).await?;
        let snapshot = SnapshotManager::new(self.backend)
            .create(&volume, base_name)
            .await
            .map_err(|err| {
                CommandError::from_backend(
                    err.backend_error(),
                    format!("Cannot create snapshot for volume {}: {err}", volume.name),
                    CommandError::Create,
                )
            })?;
        writeln!(
            self.out,
            "Snapshot '{}' created for volume {}",
            snapshot.name, volume.name
        )?;
        Ok(())
    }

    async fn snap_delete(&mut self, name: &str, snapshot_name: &str) -> Result<(), CommandError> {
        let volume = self.resolve_volume(name).await?;
        let snapshot = self.resolve_snapshot(&volume, snapshot_name).await?;
        SnapshotManager::new(self.backend)
            .delete(&snapshot)
            .await
            .map_err(|err| {
                CommandError::from_backend(
                    err.backend_error(),
                    err.to_string(),
                    CommandError::Operation,
                )
            })?;
        writeln!(self.out, "Successfully deleted snapshot {}", snapshot.name)?;
        Ok(())
    }

    async fn snap_rotate(&mut self, name: &str, retention: Retention) -> Result<(), CommandError> {
        let volume = self.resolve_volume(name).await?;
        let outcome = Rotator::new(self.backend)
            .rotate(&volume, retention)
            .await
            .map_err(|err| {
                CommandError::from_backend(
                    err.backend_error(),
                    err.to_string(),
                    CommandError::Operation,
                )
            })?;
        match outcome {
            RotationOutcome::NothingToRotate { found } => {
                writeln!(self.out, "No snapshots to rotate ({found} found)")?;
            }
            RotationOutcome::Rotated(report) => {
                writeln!(self.out, "{} snapshots deleted", report.deleted_count())?;
            }
        }
        Ok(())
    }

    async fn snap_rename(
        &mut self,
        name: &str,
        snapshot_name: &str,
        new_name: &str,
    ) -> Result<(), CommandError> {
        let volume = self.resolve_volume(name).await?;
        let snapshot = self.resolve_snapshot(&volume, snapshot_name).await?;
        let renamed = SnapshotManager::new(self.backend)
            .rename(&snapshot, new_name)
            .await
            .map_err(|err| {
                CommandError::from_backend(
                    err.backend_error(),
                    err.to_string(),
                    CommandError::Operation,
                )
            })?;
        writeln!(
            self.out,
            "Successfully renamed snapshot {} to {}",
            snapshot.name, renamed.name
        )?;
        Ok(())
    }

    async fn clone_create(
        &mut self,
        name: &str,
        snapshot_name: &str,
        clone_name: &str,
    ) -> Result<(), CommandError> {
        let volume = self.resolve_volume(name).await?;
        let snapshot = self.resolve_snapshot(&volume, snapshot_name).await?;
        let clone = CloneProvisioner::new(self.backend)
            .create(&volume, &snapshot, &volume.svm, clone_name)
            .await
            .map_err(|err| {
                CommandError::from_backend(
                    err.backend_error(),
                    err.to_string(),
                    CommandError::Create,
                )
            })?;
        writeln!(
            self.out,
            "Successfully cloned volume {} to {} from snapshot {}",
            volume.name,
            clone.volume().name,
            snapshot.name
        )?;
        Ok(())
    }

    async fn clone_split(&mut self, name: &str) -> Result<(), CommandError> {
        let volume = self.resolve_volume(name).await?;
        let mut clone = ProvisionedClone::from_volume(volume).ok_or_else(|| {
            CommandError::Operation(format!("Volume {name} is not a clone volume"))
        })?;

        writeln!(self.out, "Splitting volume clone {}", clone.volume().name)?;
        self.out.flush()?;
        let outcome = CloneProvisioner::new(self.backend)
            .split(&mut clone)
            .await
            .map_err(|err| {
                CommandError::from_backend(
                    err.backend_error(),
                    err.to_string(),
                    CommandError::Operation,
                )
            })?;
        if let SplitOutcome::Awaited(job) = outcome {
            debug!(job = %job.uuid, "split ran in background");
        }
        writeln!(
            self.out,
            "Successfully splitted clone volume {} from parent.",
            clone.volume().name
        )?;
        Ok(())
    }

    async fn clone_delete(&mut self, name: &str) -> Result<(), CommandError> {
        let volume = self.resolve_volume(name).await?;
        let clone = ProvisionedClone::from_volume(volume).ok_or_else(|| {
            CommandError::Operation(format!(
                "Volume {name} is not a clone volume; refusing to delete it"
            ))
        })?;
        let clone_name = clone.volume().name.clone();

        CloneProvisioner::new(self.backend)
            .delete(clone)
            .await
            .map_err(|err| {
                if matches!(err, CloneError::Vanished { .. }) {
                    return CommandError::NotFound(err.to_string());
                }
                CommandError::from_backend(
                    err.backend_error(),
                    err.to_string(),
                    CommandError::VolumeDelete,
                )
            })?;
        writeln!(self.out, "Successfully deleted volume {clone_name}")?;
        Ok(())
    }

    async fn lun_key(
        &self,
        name: &str,
        lun: &str,
        igroup: &str,
    ) -> Result<LunMapKey, CommandError> {
        let volume = self.resolve_volume(name).await?;
        Ok(LunMapKey::new(lun_path(&volume.name, lun), igroup, volume.svm))
    }

    async fn lun_map(&mut self, name: &str, lun: &str, igroup: &str) -> Result<(), CommandError> {
        let key = self.lun_key(name, lun, igroup).await?;
        let mapper = LunMapper::new(self.backend);

        if let Some(existing) = mapper.resolve(&key).await.map_err(|err| lun_error(&err))? {
            let lun_id = existing
                .logical_unit_number
                .map_or_else(|| String::from("unknown"), |id| id.to_string());
            writeln!(
                self.out,
                "Lun {} already mapped to igroup {} with lun id {lun_id}",
                key.lun_path, key.igroup
            )?;
            return Ok(());
        }

        match mapper.map(&key).await.map_err(|err| lun_error(&err))? {
            MapOutcome::Mapped(_) => writeln!(
                self.out,
                "Successfully mapped lun {} to igroup {}.",
                key.lun_path, key.igroup
            )?,
            MapOutcome::AlreadyMapped => writeln!(
                self.out,
                "Lun {} already mapped to igroup {}",
                key.lun_path, key.igroup
            )?,
        }
        Ok(())
    }

    async fn lun_unmap(&mut self, name: &str, lun: &str, igroup: &str) -> Result<(), CommandError> {
        let key = self.lun_key(name, lun, igroup).await?;
        match LunMapper::new(self.backend)
            .unmap(&key)
            .await
            .map_err(|err| lun_error(&err))?
        {
            UnmapOutcome::NothingToRemove => writeln!(self.out, "No mapping to remove.")?,
            UnmapOutcome::Removed(_) => writeln!(
                self.out,
                "Successfully unmapped lun {} from igroup {}",
                key.lun_path, key.igroup
            )?,
        }
        Ok(())
    }
}

fn lun_error<E>(err: &LunMapError<E>) -> CommandError
where
    E: crate::backend::BackendFailure,
{
    CommandError::from_backend(err.backend_error(), err.to_string(), CommandError::LunMapping)
}
