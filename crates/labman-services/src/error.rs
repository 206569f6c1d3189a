//! Domain errors for lab and notebook-server operations.

use std::fmt;
use std::io;
use std::path::PathBuf;

use labman_protocol::{RpcError, RpcErrorCode};
use serde_json::json;

/// Which seed document a template error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    Notebook,
    Report,
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Notebook => f.write_str("Jupyter"),
            Self::Report => f.write_str("LyX"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LabError {
    #[error("{0} not found!")]
    NotFound(String),

    #[error("Invalid lab name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("{kind} template {} not found ({reason})", path.display())]
    TemplateMissing {
        kind: TemplateKind,
        path: PathBuf,
        reason: String,
    },

    #[error("Unable to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Unable to open {target}: {reason}")]
    Open { target: String, reason: String },

    #[error("Jupyter Lab is not running.")]
    NotRunning,

    #[error("Jupyter Lab is already running.")]
    AlreadyRunning,

    #[error("Config error: {0}")]
    Config(String),
}

impl LabError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }

    /// The filesystem path an error is about, if any.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::TemplateMissing { path, .. } | Self::Io { path, .. } => Some(path),
            _ => None,
        }
    }
}

impl From<LabError> for RpcError {
    fn from(err: LabError) -> Self {
        let code = match &err {
            LabError::NotFound(_) => RpcErrorCode::LabNotFound,
            LabError::InvalidName { .. } => RpcErrorCode::InvalidName,
            LabError::TemplateMissing { .. } => RpcErrorCode::TemplateMissing,
            LabError::Io { .. } | LabError::Open { .. } => RpcErrorCode::IoFailure,
            LabError::NotRunning => RpcErrorCode::NotRunning,
            LabError::AlreadyRunning => RpcErrorCode::AlreadyRunning,
            LabError::Config(_) => RpcErrorCode::ServerError,
        };
        let rpc = RpcError::new(code, err.to_string());
        match err.path() {
            Some(path) => rpc.with_data(json!({ "path": path.to_string_lossy() })),
            None => rpc,
        }
    }
}

pub type LabResult<T> = Result<T, LabError>;
