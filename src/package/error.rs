// ABOUTME: Error types for artifact packaging and verification.
// ABOUTME: Missing build output is a precondition failure; a bad archive is an integrity failure.

use std::path::PathBuf;
use thiserror::Error;

use crate::error::ErrorClass;

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("build output missing at {path}: {reason}")]
    MissingBuildOutput { path: PathBuf, reason: String },

    #[error("packaging failed while {action}: {source}")]
    Packaging {
        action: String,
        #[source]
        source: std::io::Error,
    },

    #[error("checksum sidecar {path} is malformed: {reason}")]
    InvalidSidecar { path: PathBuf, reason: String },

    #[error("artifact {0} failed its integrity self-test")]
    IntegrityCheckFailed(PathBuf),
}

impl PackageError {
    pub(crate) fn packaging(action: impl Into<String>, source: std::io::Error) -> Self {
        PackageError::Packaging {
            action: action.into(),
            source,
        }
    }

    pub(crate) fn missing(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        PackageError::MissingBuildOutput {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorClass {
        match self {
            PackageError::MissingBuildOutput { .. } => ErrorClass::Precondition,
            PackageError::Packaging { .. } => ErrorClass::Io,
            PackageError::InvalidSidecar { .. } | PackageError::IntegrityCheckFailed(_) => {
                ErrorClass::Integrity
            }
        }
    }
}
