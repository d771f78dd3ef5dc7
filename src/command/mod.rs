//! Top-level operations and their exit codes.
//!
//! [`OperationArgs`] holds raw parameters as supplied on the command line and
//! validates them into an [`Operation`] before any controller is contacted.
//! [`Executor`] runs one operation and reports failures as [`CommandError`].

mod execute;

use thiserror::Error;

use crate::backend::{BackendFailure, FailureKind};
use crate::config::ConfigError;
use crate::rotation::Retention;

pub use execute::Executor;

/// Exit code for a successful invocation.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for missing parameters and other general failures.
pub const EXIT_FAILURE: i32 = 1;
/// Exit code for a controller error while creating a snapshot or clone.
pub const EXIT_CREATE_FAILED: i32 = 102;
/// Exit code for a volume, snapshot, or mapping that does not exist.
pub const EXIT_NOT_FOUND: i32 = 103;
/// Exit code for a controller error while mapping or unmapping a LUN.
pub const EXIT_LUN_MAPPING_FAILED: i32 = 106;
/// Exit code for a controller error while deleting a volume.
pub const EXIT_VOLUME_DELETE_FAILED: i32 = 156;

/// The top-level operation selected for an invocation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CommandKind {
    /// List all snapshots of a volume.
    SnapList,
    /// Create a snapshot of a volume.
    SnapCreate,
    /// Delete a snapshot.
    SnapDelete,
    /// Delete snapshots beyond a retention count.
    SnapRotate,
    /// Rename a snapshot.
    SnapRename,
    /// Create a clone volume from a snapshot.
    CloneCreate,
    /// Split a clone volume from its parent.
    CloneSplit,
    /// Delete a clone volume.
    CloneDelete,
    /// Map a LUN to an initiator group.
    LunMap,
    /// Unmap a LUN from an initiator group.
    LunUnmap,
}

/// Raw operation parameters.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct OperationArgs {
    /// Selected command, if any.
    pub command: Option<CommandKind>,
    /// Volume name (`--vol`).
    pub volume: Option<String>,
    /// Snapshot name (`--snap`).
    pub snapshot: Option<String>,
    /// Clone volume name (`--clone`).
    pub clone: Option<String>,
    /// LUN name within the volume (`--lun`).
    pub lun: Option<String>,
    /// Initiator group name (`--igroup`).
    pub igroup: Option<String>,
    /// Base name for generated snapshot names (`--base_name`).
    pub base_name: Option<String>,
    /// Target name for a rename (`--new_name`).
    pub new_name: Option<String>,
    /// Retention count as typed (`--retention`).
    pub retention: Option<String>,
}

/// A validated operation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Operation {
    /// List snapshots, most recent first.
    SnapList {
        /// Volume name.
        volume: String,
    },
    /// Create `{base_name}_{epoch}`.
    SnapCreate {
        /// Volume name.
        volume: String,
        /// Base name.
        base_name: String,
    },
    /// Delete one snapshot.
    SnapDelete {
        /// Volume name.
        volume: String,
        /// Snapshot name.
        snapshot: String,
    },
    /// Keep the `retention` most recent snapshots.
    SnapRotate {
        /// Volume name.
        volume: String,
        /// Number of snapshots to keep.
        retention: Retention,
    },
    /// Rename a snapshot.
    SnapRename {
        /// Volume name.
        volume: String,
        /// Current snapshot name.
        snapshot: String,
        /// Requested snapshot name.
        new_name: String,
    },
    /// Clone a volume from one of its snapshots.
    CloneCreate {
        /// Parent volume name.
        volume: String,
        /// Parent snapshot name.
        snapshot: String,
        /// Clone volume name.
        clone: String,
    },
    /// Split a clone from its parent.
    CloneSplit {
        /// Clone volume name.
        clone: String,
    },
    /// Delete a clone volume.
    CloneDelete {
        /// Clone volume name.
        clone: String,
    },
    /// Map `/vol/{volume}/{lun}` to an initiator group.
    LunMap {
        /// Volume name.
        volume: String,
        /// LUN name.
        lun: String,
        /// Initiator group name.
        igroup: String,
    },
    /// Unmap `/vol/{volume}/{lun}` from an initiator group.
    LunUnmap {
        /// Volume name.
        volume: String,
        /// LUN name.
        lun: String,
        /// Initiator group name.
        igroup: String,
    },
}

fn require(value: Option<&String>, prompt: &str) -> Result<String, CommandError> {
    value
        .map(|text| text.trim())
        .filter(|text| !text.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| CommandError::Validation(prompt.to_owned()))
}

const VOLUME_PROMPT: &str = "Please specify target volume with --vol";

impl OperationArgs {
    /// Validates the parameters for the selected command.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Validation`] when no command was selected, a
    /// required parameter is missing, or the retention count is malformed or
    /// negative.
    pub fn validate(&self) -> Result<Operation, CommandError> {
        let Some(command) = self.command else {
            return Err(CommandError::Validation(String::from(
                "Invalid command given.",
            )));
        };

        match command {
            CommandKind::SnapList => Ok(Operation::SnapList {
                volume: require(self.volume.as_ref(), VOLUME_PROMPT)?,
            }),
            CommandKind::SnapCreate => Ok(Operation::SnapCreate {
                volume: require(self.volume.as_ref(), VOLUME_PROMPT)?,
                base_name: require(
                    self.base_name.as_ref(),
                    "Please specify base name for the snapshot with --base_name",
                )?,
            }),
            CommandKind::SnapDelete => Ok(Operation::SnapDelete {
                volume: require(self.volume.as_ref(), VOLUME_PROMPT)?,
                snapshot: require(
                    self.snapshot.as_ref(),
                    "Please specify snapshot name with --snap",
                )?,
            }),
            CommandKind::SnapRotate => {
                let volume = require(self.volume.as_ref(), VOLUME_PROMPT)?;
                let raw = require(
                    self.retention.as_ref(),
                    "Please specify retention with --retention",
                )?;
                let retention = Retention::parse(&raw).map_err(|err| {
                    CommandError::Validation(format!("Invalid --retention: {err}"))
                })?;
                Ok(Operation::SnapRotate { volume, retention })
            }
            CommandKind::SnapRename => Ok(Operation::SnapRename {
                volume: require(self.volume.as_ref(), VOLUME_PROMPT)?,
                new_name: require(
                    self.new_name.as_ref(),
                    "Please specify new snapshot name with --new_name",
                )?,
                snapshot: require(
                    self.snapshot.as_ref(),
                    "Please specify snapshot name with --snap",
                )?,
            }),
            CommandKind::CloneCreate => Ok(Operation::CloneCreate {
                volume: require(self.volume.as_ref(), "Please specify volume with --vol")?,
                clone: require(
                    self.clone.as_ref(),
                    "Please specify name of clone volume with --clone",
                )?,
                snapshot: require(
                    self.snapshot.as_ref(),
                    "Please specify source snapshot name with --snap",
                )?,
            }),
            CommandKind::CloneSplit => Ok(Operation::CloneSplit {
                clone: require(
                    self.clone.as_ref(),
                    "Please specify target clone volume with --clone",
                )?,
            }),
            CommandKind::CloneDelete => Ok(Operation::CloneDelete {
                clone: require(
                    self.clone.as_ref().or(self.volume.as_ref()),
                    "Please specify clone volume with --clone",
                )?,
            }),
            CommandKind::LunMap | CommandKind::LunUnmap => {
                let volume = require(self.volume.as_ref(), VOLUME_PROMPT)?;
                let lun = require(self.lun.as_ref(), "Please specify name of the LUN with --lun")?;
                let igroup = require(
                    self.igroup.as_ref(),
                    "Please specify name of initiator group with --igroup",
                )?;
                Ok(if command == CommandKind::LunMap {
                    Operation::LunMap {
                        volume,
                        lun,
                        igroup,
                    }
                } else {
                    Operation::LunUnmap {
                        volume,
                        lun,
                        igroup,
                    }
                })
            }
        }
    }
}

/// Failures reported by a top-level operation.
#[derive(Debug, Error)]
pub enum CommandError {
    /// A required parameter is missing or malformed.
    #[error("{0}")]
    Validation(String),
    /// Connection settings could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The controller could not be reached.
    #[error("connection to storage controller failed: {0}")]
    Connection(String),
    /// A named entity does not exist.
    #[error("{0}")]
    NotFound(String),
    /// The controller rejected a create request.
    #[error("{0}")]
    Create(String),
    /// The controller rejected a LUN map or unmap request.
    #[error("{0}")]
    LunMapping(String),
    /// The controller rejected a volume delete.
    #[error("{0}")]
    VolumeDelete(String),
    /// Any other failed operation.
    #[error("{0}")]
    Operation(String),
    /// Results could not be written.
    #[error("cannot write output: {0}")]
    Output(#[from] std::io::Error),
}

impl CommandError {
    /// Returns the process exit code for this failure.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::NotFound(_) => EXIT_NOT_FOUND,
            Self::Create(_) => EXIT_CREATE_FAILED,
            Self::LunMapping(_) => EXIT_LUN_MAPPING_FAILED,
            Self::VolumeDelete(_) => EXIT_VOLUME_DELETE_FAILED,
            Self::Validation(_)
            | Self::Config(_)
            | Self::Connection(_)
            | Self::Operation(_)
            | Self::Output(_) => EXIT_FAILURE,
        }
    }

    /// Returns true for usage problems that are reported without the
    /// `Error:` prefix.
    #[must_use]
    pub const fn is_usage(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Builds an error from a component failure, promoting transport
    /// failures to [`CommandError::Connection`].
    pub(crate) fn from_backend<E>(
        backend: Option<&E>,
        message: String,
        otherwise: impl FnOnce(String) -> Self,
    ) -> Self
    where
        E: BackendFailure,
    {
        if backend.is_some_and(|err| err.kind() == FailureKind::Transport) {
            Self::Connection(message)
        } else {
            otherwise(message)
        }
    }
}
