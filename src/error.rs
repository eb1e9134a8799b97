//! Error types for the transfer pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced by pipeline operations.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("path not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to mount {share} at {}: {reason}", .mount_point.display())]
    Mount {
        share: String,
        mount_point: PathBuf,
        reason: String,
    },

    #[error("transfer command `{command}` failed: {status}")]
    TransferFailure { command: String, status: String },

    #[error("no network connectivity to {target}: {reason}")]
    Connectivity { target: String, reason: String },

    #[error("precondition violated: {0}")]
    Precondition(String),

    #[error("inconsistent session state: {0}")]
    Conflict(String),

    #[error("invalid command template: {0}")]
    Template(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for TransferError {
    fn from(e: toml::de::Error) -> Self {
        TransferError::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for TransferError {
    fn from(e: toml::ser::Error) -> Self {
        TransferError::Config(e.to_string())
    }
}

impl From<walkdir::Error> for TransferError {
    fn from(e: walkdir::Error) -> Self {
        match e.into_io_error() {
            Some(io) => TransferError::Io(io),
            None => TransferError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "filesystem loop detected",
            )),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransferError>;
