//! Error taxonomy shared by the editor, commit protocol, channel and transfer layers
//!
//! Every failure is one of a closed set of [`ErrorKind`]s. The messages are
//! the DOM exception texts that callers of a file-system-access style API
//! already know, so they can be surfaced unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Message used when a seek targets a position past the end of the content.
pub const SEEK_FAILED: &str = "seeking position failed.";

/// Result alias used at every API boundary.
pub type FsResult<T> = Result<T, FsError>;

/// Classification of an [`FsError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Entity or channel endpoint gone
    NotFound,
    /// Operation not valid in the current state (e.g. seek beyond size)
    InvalidState,
    /// Entry exists but is not of the requested kind
    TypeMismatch,
    /// The object can not be modified in this way
    InvalidModification,
    /// Missing or invalid command field
    MalformedRequest,
    /// Access refused for safety reasons
    SecurityRestricted,
    /// Access refused by the host
    PermissionDenied,
    /// A peer abandoned the operation with its own reason
    Aborted,
    /// Content would grow past the configured limit
    QuotaExceeded,
}

impl ErrorKind {
    /// Returns the DOM exception name for this kind.
    pub fn dom_name(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NotFoundError",
            ErrorKind::InvalidState => "InvalidStateError",
            ErrorKind::TypeMismatch => "TypeMismatchError",
            ErrorKind::InvalidModification => "InvalidModificationError",
            ErrorKind::MalformedRequest => "SyntaxError",
            ErrorKind::SecurityRestricted => "SecurityError",
            ErrorKind::PermissionDenied => "NotAllowedError",
            ErrorKind::Aborted => "AbortError",
            ErrorKind::QuotaExceeded => "QuotaExceededError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dom_name())
    }
}

/// Errors produced by file, session, channel and transfer operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FsError {
    /// The entity was removed or never existed
    #[error("A requested file or directory could not be found at the time an operation was processed.")]
    NotFound,

    /// The other end of a channel was dropped without closing
    #[error("The channel endpoint is no longer connected.")]
    EndpointGone,

    /// Operation is not valid in the current state
    #[error("{0}")]
    InvalidState(String),

    /// Entry exists but is not of the requested kind
    #[error("The path supplied exists, but was not an entry of requested type.")]
    TypeMismatch,

    /// Modification refused
    #[error("The object can not be modified in this way.")]
    InvalidModification,

    /// Missing or invalid command field
    #[error("Failed to execute 'write' on 'UnderlyingSinkBase': Invalid params passed. {0}")]
    MalformedRequest(String),

    /// Access refused for safety reasons
    #[error("It was determined that certain files are unsafe for access within a Web application, or that too many calls are being made on file resources.")]
    SecurityRestricted,

    /// Access refused by the host
    #[error("The request is not allowed by the user agent or the platform in the current context.")]
    PermissionDenied,

    /// Reason supplied by a consumer error or an abort
    #[error("{0}")]
    Aborted(String),

    /// A write or truncate would take the content past its size limit
    #[error("The requested size of {requested} bytes exceeds the limit of {limit} bytes.")]
    QuotaExceeded { requested: u64, limit: u64 },
}

impl FsError {
    /// Seek past the end of the working content.
    pub fn seek_failed() -> Self {
        FsError::InvalidState(SEEK_FAILED.to_string())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        FsError::InvalidState(message.into())
    }

    pub fn malformed(detail: impl Into<String>) -> Self {
        FsError::MalformedRequest(detail.into())
    }

    pub fn aborted(reason: impl Into<String>) -> Self {
        FsError::Aborted(reason.into())
    }

    /// Returns the classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            FsError::NotFound | FsError::EndpointGone => ErrorKind::NotFound,
            FsError::InvalidState(_) => ErrorKind::InvalidState,
            FsError::TypeMismatch => ErrorKind::TypeMismatch,
            FsError::InvalidModification => ErrorKind::InvalidModification,
            FsError::MalformedRequest(_) => ErrorKind::MalformedRequest,
            FsError::SecurityRestricted => ErrorKind::SecurityRestricted,
            FsError::PermissionDenied => ErrorKind::PermissionDenied,
            FsError::Aborted(_) => ErrorKind::Aborted,
            FsError::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
        }
    }
}
