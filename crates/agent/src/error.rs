//! Top-level error type joining the wire protocol, mount manager, and
//! container runtime error domains, mirroring the teacher's single
//! `AgentError` at the process boundary.

use crate::{mount::MountOpError, runtime::RuntimeError};
use protocol::GcsError;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Protocol(#[from] GcsError),
    #[error(transparent)]
    Mount(#[from] MountOpError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentError {
    /// Whether this error should close the connection rather than be
    /// reported in-band to the host.
    pub fn is_fatal(&self) -> bool {
        match self {
            AgentError::Protocol(e) => e.is_fatal(),
            AgentError::Io(_) => true,
            AgentError::Mount(_) | AgentError::Runtime(_) => false,
        }
    }

    /// Renders this error into the wire-level record, consistent with
    /// [`GcsError::to_error_record`].
    pub fn to_error_record(&self) -> protocol::ErrorRecord {
        match self {
            AgentError::Protocol(e) => e.to_error_record(),
            AgentError::Mount(e) => GcsError::from(e.clone()).to_error_record(),
            AgentError::Runtime(e) => GcsError::RuntimeFailed(e.to_string()).to_error_record(),
            AgentError::Io(e) => GcsError::Transport(std::io::Error::new(e.kind(), e.to_string())).to_error_record(),
        }
    }
}

impl From<MountOpError> for GcsError {
    fn from(err: MountOpError) -> Self {
        match err {
            MountOpError::PathConflict { path } => GcsError::MountPathConflict { path },
            MountOpError::NotFound { path } => GcsError::MountFailed(format!("no mount tracked at {path:?}")),
            MountOpError::MountFailed(msg) => GcsError::MountFailed(msg),
            MountOpError::UnmountFailed(msg) => GcsError::UnmountFailed(msg),
            MountOpError::Cancelled => GcsError::Cancelled,
        }
    }
}
