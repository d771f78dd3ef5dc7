//! Error types for the ONTAP REST backend.

use reqwest::StatusCode;
use thiserror::Error;
use uuid::Uuid;

use crate::backend::{BackendFailure, FailureKind};

/// Error code the controller returns when a LUN is already mapped to the
/// requested initiator group.
pub const LUN_ALREADY_MAPPED_CODE: &str = "5374922";

const LUN_ALREADY_MAPPED_TEXT: &str = "LUN already mapped to this group";

/// Errors raised by the ONTAP backend.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum OntapBackendError {
    /// Raised when the controller cannot be reached.
    #[error("cannot reach storage controller: {message}")]
    Transport {
        /// Message from the HTTP client.
        message: String,
    },
    /// Raised when the controller answers with an error document.
    #[error("controller returned {status}: {message} (code {code})")]
    Api {
        /// HTTP status of the response.
        status: u16,
        /// Controller error code; empty when absent.
        code: String,
        /// Controller error message.
        message: String,
    },
    /// Raised when a response body cannot be decoded.
    #[error("cannot decode controller response: {message}")]
    Decode {
        /// Message from the JSON decoder.
        message: String,
    },
    /// Raised when a background job ends in failure.
    #[error("job {job} failed: {message} (code {code})")]
    JobFailed {
        /// Job identifier.
        job: Uuid,
        /// Controller message describing the failure.
        message: String,
        /// Controller error code; zero when absent.
        code: i64,
    },
    /// Raised when a configured job timeout elapses.
    #[error("job {job} did not finish within {waited_secs}s")]
    JobTimeout {
        /// Job identifier.
        job: Uuid,
        /// Seconds waited before giving up.
        waited_secs: u64,
    },
    /// Raised when a record the controller just created cannot be found.
    #[error("{kind} {name} missing after create")]
    MissingRecord {
        /// Record kind, for example `volume`.
        kind: &'static str,
        /// Record name.
        name: String,
    },
}

impl OntapBackendError {
    pub(super) fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::Decode {
                message: err.to_string(),
            };
        }
        Self::Transport {
            message: err.to_string(),
        }
    }

    pub(super) fn api(status: StatusCode, code: Option<String>, message: Option<String>) -> Self {
        Self::Api {
            status: status.as_u16(),
            code: code.unwrap_or_default(),
            message: message
                .filter(|text| !text.trim().is_empty())
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("unexpected status")
                        .to_owned()
                }),
        }
    }
}

impl BackendFailure for OntapBackendError {
    fn kind(&self) -> FailureKind {
        match self {
            Self::Transport { .. } => FailureKind::Transport,
            Self::Api { status, .. } if *status == 401 || *status == 403 => FailureKind::Transport,
            Self::Api { status, .. } if *status == 404 => FailureKind::NotFound,
            Self::Api { code, message, .. }
                if code == LUN_ALREADY_MAPPED_CODE || message.contains(LUN_ALREADY_MAPPED_TEXT) =>
            {
                FailureKind::AlreadyMapped
            }
            Self::Api { .. }
            | Self::Decode { .. }
            | Self::JobFailed { .. }
            | Self::JobTimeout { .. }
            | Self::MissingRecord { .. } => FailureKind::Rejected,
        }
    }
}
