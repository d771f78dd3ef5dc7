//! Retention rotation: keep the `N` most recent snapshots of a volume and
//! delete the rest.
//!
//! Deletion failures do not stop the batch. Every candidate is attempted
//! once and the outcome reports which deletions succeeded and which did
//! not; nothing is retried.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::backend::StorageBackend;
use crate::snapshot::{Snapshot, newest_first};
use crate::volume::Volume;

/// Number of most recent snapshots to preserve. Always non-negative.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct Retention(usize);

impl Retention {
    /// Validates a signed retention count.
    ///
    /// # Errors
    ///
    /// Returns [`RetentionError::Negative`] for counts below zero.
    pub fn new(count: i64) -> Result<Self, RetentionError> {
        usize::try_from(count)
            .map(Self)
            .map_err(|_| RetentionError::Negative(count))
    }

    /// Parses a retention count from user input.
    ///
    /// # Errors
    ///
    /// Returns [`RetentionError::Malformed`] when the text is not an integer
    /// and [`RetentionError::Negative`] when it is below zero.
    pub fn parse(text: &str) -> Result<Self, RetentionError> {
        let trimmed = text.trim();
        let count = trimmed
            .parse::<i64>()
            .map_err(|_| RetentionError::Malformed(trimmed.to_owned()))?;
        Self::new(count)
    }

    /// Returns the number of snapshots kept.
    #[must_use]
    pub const fn count(self) -> usize {
        self.0
    }
}

/// Errors raised while validating a retention count.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RetentionError {
    /// Raised when the count is below zero.
    #[error("retention must not be negative (got {0})")]
    Negative(i64),
    /// Raised when the input is not an integer.
    #[error("retention '{0}' is not a whole number")]
    Malformed(String),
}

/// Returns the snapshots a rotation would delete: every entry after the
/// first `retention` of a most-recent-first list.
#[must_use]
pub fn rotation_candidates(ordered: &[Snapshot], retention: Retention) -> &[Snapshot] {
    ordered.get(retention.count()..).unwrap_or_default()
}

/// A deletion the controller refused during rotation.
#[derive(Debug)]
pub struct RotationFailure<BackendError> {
    /// Snapshot that remains on the volume.
    pub snapshot: Snapshot,
    /// Provider-specific error.
    pub error: BackendError,
}

/// Per-item result of a rotation that had candidates.
#[derive(Debug)]
pub struct RotationReport<BackendError> {
    /// Number of snapshots present before rotation.
    pub found: usize,
    /// Snapshots removed, in the order they were deleted.
    pub deleted: Vec<Snapshot>,
    /// Snapshots whose deletion failed.
    pub failed: Vec<RotationFailure<BackendError>>,
}

impl<BackendError> RotationReport<BackendError> {
    /// Number of successful deletions.
    #[must_use]
    pub const fn deleted_count(&self) -> usize {
        self.deleted.len()
    }

    /// Returns true when every candidate was deleted.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Result of a rotation request.
#[derive(Debug)]
pub enum RotationOutcome<BackendError> {
    /// The volume holds no more snapshots than the retention count.
    NothingToRotate {
        /// Number of snapshots present.
        found: usize,
    },
    /// Excess snapshots were processed.
    Rotated(RotationReport<BackendError>),
}

impl<BackendError> RotationOutcome<BackendError> {
    /// Number of successful deletions; zero when nothing was rotated.
    #[must_use]
    pub fn deleted_count(&self) -> usize {
        match self {
            Self::NothingToRotate { .. } => 0,
            Self::Rotated(report) => report.deleted_count(),
        }
    }
}

/// Errors that abort a rotation before any deletion is attempted.
#[derive(Debug, Error)]
pub enum RotationError<BackendError>
where
    BackendError: std::error::Error + 'static,
{
    /// Raised when the retention count is invalid.
    #[error(transparent)]
    Retention(#[from] RetentionError),
    /// Raised when the snapshot collection cannot be read.
    #[error("cannot list snapshots of volume {volume}: {source}")]
    List {
        /// Volume name.
        volume: String,
        /// Provider-specific error.
        #[source]
        source: BackendError,
    },
}

impl<BackendError> RotationError<BackendError>
where
    BackendError: std::error::Error + 'static,
{
    /// Returns the underlying backend error, if any.
    #[must_use]
    pub const fn backend_error(&self) -> Option<&BackendError> {
        match self {
            Self::Retention(_) => None,
            Self::List { source, .. } => Some(source),
        }
    }
}

/// Applies retention counts to the snapshots of a volume.
#[derive(Debug)]
pub struct Rotator<'a, B> {
    backend: &'a B,
}

impl<'a, B> Rotator<'a, B>
where
    B: StorageBackend,
{
    /// Creates a rotator bound to the given backend session.
    #[must_use]
    pub const fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Validates a signed retention count and rotates the volume.
    ///
    /// A negative count is rejected before the controller is contacted.
    ///
    /// # Errors
    ///
    /// Returns [`RotationError::Retention`] for a negative count and
    /// [`RotationError::List`] when the snapshot collection cannot be read.
    pub async fn rotate_count(
        &self,
        volume: &Volume,
        retention: i64,
    ) -> Result<RotationOutcome<B::Error>, RotationError<B::Error>> {
        let validated = Retention::new(retention)?;
        self.rotate(volume, validated).await
    }

    /// Deletes every snapshot beyond the `retention` most recent ones.
    ///
    /// # Errors
    ///
    /// Returns [`RotationError::List`] when the snapshot collection cannot be
    /// read. Individual deletion failures are reported in the outcome.
    pub async fn rotate(
        &self,
        volume: &Volume,
        retention: Retention,
    ) -> Result<RotationOutcome<B::Error>, RotationError<B::Error>> {
        let collection = self
            .backend
            .list_snapshots(&volume.uuid)
            .await
            .map_err(|source| RotationError::List {
                volume: volume.name.clone(),
                source,
            })?;
        let ordered = newest_first(collection);
        let found = ordered.len();

        let candidates = rotation_candidates(&ordered, retention);
        if candidates.is_empty() {
            debug!(
                volume = %volume.name,
                found,
                retention = retention.count(),
                "nothing to rotate"
            );
            return Ok(RotationOutcome::NothingToRotate { found });
        }

        let mut deleted = Vec::with_capacity(candidates.len());
        let mut failed = Vec::new();
        for snapshot in candidates {
            match self.backend.delete_snapshot(snapshot).await {
                Ok(()) => {
                    debug!(snapshot = %snapshot.name, "deleted snapshot");
                    deleted.push(snapshot.clone());
                }
                Err(error) => {
                    warn!(snapshot = %snapshot.name, %error, "snapshot delete failed");
                    failed.push(RotationFailure {
                        snapshot: snapshot.clone(),
                        error,
                    });
                }
            }
        }

        info!(
            volume = %volume.name,
            deleted = deleted.len(),
            failed = failed.len(),
            "rotation finished"
        );
        Ok(RotationOutcome::Rotated(RotationReport {
            found,
            deleted,
            failed,
        }))
    }
}
