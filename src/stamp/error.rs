// ABOUTME: Error types for version stamping.
// ABOUTME: Distinguishes precondition failures from I/O failures while restoring.

use std::path::PathBuf;
use thiserror::Error;

use crate::error::ErrorClass;

#[derive(Debug, Error)]
pub enum StampError {
    /// A tracked file is missing, read-only, or cannot be rendered. Nothing was written.
    #[error("cannot write version metadata to {path}: {reason}")]
    MetadataWrite { path: PathBuf, reason: String },

    #[error("no snapshot to restore (inject has not succeeded)")]
    NoSnapshot,

    #[error("a snapshot is already active at {0}; restore or clean it up before injecting again")]
    SnapshotActive(PathBuf),

    #[error("failed to persist snapshot at {path}: {source}")]
    SnapshotIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot at {path} is corrupt: {source}")]
    SnapshotCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A write failed part-way and some earlier files could not be put back.
    #[error("write to {path} failed and earlier files could not be put back; the snapshot at {snapshot} is kept for `shipline stamp restore`")]
    PartialWrite { path: PathBuf, snapshot: PathBuf },

    #[error("failed to restore {path}: {source}")]
    Restore {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StampError {
    pub(crate) fn write(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        StampError::MetadataWrite {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorClass {
        match self {
            StampError::MetadataWrite { .. }
            | StampError::NoSnapshot
            | StampError::SnapshotActive(_) => ErrorClass::Precondition,
            StampError::SnapshotCorrupt { .. } => ErrorClass::Integrity,
            StampError::SnapshotIo { .. }
            | StampError::Restore { .. }
            | StampError::PartialWrite { .. } => ErrorClass::Io,
        }
    }
}
