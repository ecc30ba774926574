// ABOUTME: Error types for deployment operations.
// ABOUTME: Covers sync, revision gate, restart, process liveness, HTTP probe and lock failures.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::error::ErrorClass;
use crate::types::CommitId;
use crate::vcs::VcsError;

use super::DeployStage;

/// Information about a lock holder, for error reporting.
#[derive(Debug, Clone)]
pub struct LockHolderInfo {
    pub holder: String,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
}

impl std::fmt::Display for LockHolderInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (pid {}) since {}",
            self.holder, self.pid, self.started_at
        )
    }
}

/// Errors that can occur while driving a deployment.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Pushing or pulling the revision failed.
    #[error("failed to sync revision to remote: {0}")]
    SyncFailed(String),

    /// The remote checkout does not match the local one.
    #[error("revision mismatch: local {local}, remote {remote}")]
    RevisionMismatch { local: CommitId, remote: CommitId },

    /// The restart command exited unsuccessfully.
    #[error("restart command failed (exit {exit_code}): {stderr}")]
    RestartFailed { exit_code: u32, stderr: String },

    /// The service process never reached a running state.
    #[error(
        "container {container} not running after {waited:?} (last status: {})",
        last_status.as_deref().unwrap_or("unknown")
    )]
    ProcessStartTimeout {
        container: String,
        last_status: Option<String>,
        waited: Duration,
    },

    /// The HTTP probe returned a non-success status or could not connect.
    #[error("health probe of {url} failed: {reason}")]
    HealthProbe {
        url: String,
        status: Option<u16>,
        reason: String,
        /// Most recent remote service log lines.
        logs: Vec<String>,
    },

    /// A remote command could not be executed at all.
    #[error("remote command failed: {0}")]
    Remote(#[from] crate::ssh::Error),

    #[error(transparent)]
    Vcs(#[from] VcsError),

    /// A stage was entered out of order.
    #[error("invalid deployment transition from {from} to {to}")]
    InvalidTransition { from: DeployStage, to: DeployStage },

    /// Lock is held by another process.
    #[error("deploy lock held by {0}")]
    LockHeld(LockHolderInfo),

    /// Lock operation failed.
    #[error("lock error: {0}")]
    LockError(String),
}

impl DeployError {
    pub fn lock_held(holder: String, pid: u32, started_at: DateTime<Utc>) -> Self {
        DeployError::LockHeld(LockHolderInfo {
            holder,
            pid,
            started_at,
        })
    }

    pub fn lock_error(msg: impl Into<String>) -> Self {
        DeployError::LockError(msg.into())
    }

    pub fn kind(&self) -> ErrorClass {
        match self {
            DeployError::RevisionMismatch { .. } | DeployError::InvalidTransition { .. } => {
                ErrorClass::Consistency
            }
            DeployError::ProcessStartTimeout { .. }
            | DeployError::HealthProbe { .. }
            | DeployError::RestartFailed { .. }
            | DeployError::LockHeld(_) => ErrorClass::Liveness,
            DeployError::Remote(e) => e.kind(),
            DeployError::Vcs(e) => e.kind(),
            DeployError::SyncFailed(_) | DeployError::LockError(_) => ErrorClass::Io,
        }
    }

    /// Remote log lines gathered while diagnosing the failure.
    pub fn logs(&self) -> &[String] {
        match self {
            DeployError::HealthProbe { logs, .. } => logs,
            _ => &[],
        }
    }
}
