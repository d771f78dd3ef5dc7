//! Command-line interface definitions for the `snapctl` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{ArgGroup, Parser};

/// Top-level CLI for the `snapctl` binary.
#[derive(Debug, Parser)]
#[command(
    name = "snapctl",
    about = "Manage ONTAP snapshots, flex-clones, and LUN mappings over the REST API",
    group(ArgGroup::new("command").multiple(false))
)]
pub(crate) struct Cli {
    /// List all snapshots for a given volume.
    #[arg(long, group = "command")]
    pub(crate) snaplist: bool,
    /// Create snapshot of a given volume.
    #[arg(long, group = "command")]
    pub(crate) snapcreate: bool,
    /// Delete a snapshot.
    #[arg(long, group = "command")]
    pub(crate) snapdelete: bool,
    /// Rotate snapshots in a volume.
    #[arg(long, group = "command")]
    pub(crate) snaprotate: bool,
    /// Rename a snapshot.
    #[arg(long, group = "command")]
    pub(crate) snaprename: bool,
    /// Create a clone volume from a snapshot.
    #[arg(long, group = "command")]
    pub(crate) clonecreate: bool,
    /// Split clone volume from parent.
    #[arg(long, group = "command")]
    pub(crate) clonesplit: bool,
    /// Delete a clone volume.
    #[arg(long, group = "command")]
    pub(crate) clonedelete: bool,
    /// Map LUN to host.
    #[arg(long, group = "command")]
    pub(crate) lunmap: bool,
    /// Unmap LUN from host.
    #[arg(long, group = "command")]
    pub(crate) lununmap: bool,

    /// IP or hostname of the storage virtual machine (overrides `SNAPCTL_HOST`).
    #[arg(long = "na", value_name = "HOST")]
    pub(crate) host: Option<String>,
    /// Username for connecting to the storage virtual machine.
    #[arg(long = "user", value_name = "USER")]
    pub(crate) username: Option<String>,
    /// Password for connecting to the storage virtual machine.
    #[arg(long = "pass", value_name = "PASSWORD")]
    pub(crate) password: Option<String>,

    /// Name of the volume.
    #[arg(long = "vol", value_name = "VOLUME")]
    pub(crate) volume: Option<String>,
    /// Name of the snapshot.
    #[arg(long = "snap", value_name = "SNAPSHOT")]
    pub(crate) snapshot: Option<String>,
    /// Name of the clone volume.
    #[arg(long = "clone", value_name = "CLONE")]
    pub(crate) clone: Option<String>,
    /// Name of the LUN inside the volume.
    #[arg(long = "lun", value_name = "LUN")]
    pub(crate) lun: Option<String>,
    /// Name of the initiator group.
    #[arg(long = "igroup", value_name = "IGROUP")]
    pub(crate) igroup: Option<String>,
    /// Base name for the snapshot.
    #[arg(long = "base_name", value_name = "NAME")]
    pub(crate) base_name: Option<String>,
    /// New name for the snapshot.
    #[arg(long = "new_name", value_name = "NAME")]
    pub(crate) new_name: Option<String>,
    /// Number of snapshots to keep.
    #[arg(long = "retention", value_name = "COUNT", allow_hyphen_values = true)]
    pub(crate) retention: Option<String>,

    /// Enable debug logging, including every REST request.
    #[arg(long)]
    pub(crate) debug: bool,
}
