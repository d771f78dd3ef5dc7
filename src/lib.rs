//! Core library for the `snapctl` storage operations tool.
//!
//! The crate exposes a backend abstraction over an ONTAP storage virtual
//! machine and the components built on it: the snapshot lifecycle manager,
//! the retention rotation engine, the flex-clone state machine
//! (create → split → delete), and an idempotent LUN mapping resolver. An
//! ONTAP REST implementation of the backend and an in-memory test double
//! are included.

pub mod backend;
pub mod clone;
pub mod command;
pub mod config;
pub mod lun;
pub mod ontap;
pub mod rotation;
pub mod snapshot;
pub mod test_support;
pub mod volume;

pub use backend::{BackendFailure, BackendFuture, CloneRequest, FailureKind, Job, StorageBackend};
pub use clone::{CloneError, CloneProvisioner, CloneState, ProvisionedClone, SplitOutcome};
pub use command::{
    CommandError, CommandKind, EXIT_CREATE_FAILED, EXIT_FAILURE, EXIT_LUN_MAPPING_FAILED,
    EXIT_NOT_FOUND, EXIT_SUCCESS, EXIT_VOLUME_DELETE_FAILED, Executor, Operation, OperationArgs,
};
pub use config::{ConfigError, ConnectionConfig, ConnectionOverrides, ConnectionSettings};
pub use lun::{LunMapError, LunMapKey, LunMapper, LunMapping, MapOutcome, UnmapOutcome, lun_path};
pub use ontap::{OntapBackend, OntapBackendError};
pub use rotation::{
    Retention, RetentionError, RotationError, RotationFailure, RotationOutcome, RotationReport,
    Rotator, rotation_candidates,
};
pub use snapshot::{Snapshot, SnapshotError, SnapshotManager, newest_first, snapshot_name};
pub use volume::{CloneRelationship, Volume};
