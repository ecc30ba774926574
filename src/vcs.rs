// ABOUTME: Local version-control operations used by the release pipeline.
// ABOUTME: A Vcs trait with a git CLI implementation driven through tokio::process.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

use crate::error::ErrorClass;
use crate::types::CommitId;

#[derive(Debug, Error)]
pub enum VcsError {
    #[error("git is not installed or not on PATH")]
    GitNotFound,

    #[error("git {args} failed (exit {code:?}): {stderr}")]
    CommandFailed {
        args: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("git {args} did not finish within {timeout:?}")]
    TimedOut { args: String, timeout: Duration },

    #[error("git returned an invalid revision: {0}")]
    InvalidRevision(String),

    #[error("I/O error running git: {0}")]
    Io(#[from] std::io::Error),
}

impl VcsError {
    pub fn kind(&self) -> ErrorClass {
        match self {
            VcsError::GitNotFound => ErrorClass::Precondition,
            VcsError::InvalidRevision(_) => ErrorClass::Consistency,
            VcsError::TimedOut { .. } => ErrorClass::Liveness,
            VcsError::CommandFailed { .. } | VcsError::Io(_) => ErrorClass::Io,
        }
    }
}

/// Local repository operations.
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Identifier of the checked-out revision.
    async fn head_commit(&self) -> Result<CommitId, VcsError>;

    /// Push `branch` to `remote`.
    async fn push(&self, remote: &str, branch: &str) -> Result<(), VcsError>;
}

/// Bound on a single git invocation when none is configured.
pub const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(120);

/// `git` invoked as a child process in a fixed working tree.
#[derive(Debug, Clone)]
pub struct GitCli {
    repo: PathBuf,
    timeout: Duration,
}

impl GitCli {
    pub fn new(repo: &Path) -> Self {
        Self {
            repo: repo.to_path_buf(),
            timeout: DEFAULT_GIT_TIMEOUT,
        }
    }

    /// Kill any git invocation still running after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn git(&self, args: &[&str]) -> Result<String, VcsError> {
        tracing::debug!("git {}", args.join(" "));
        let child = Command::new("git")
            .arg("-C")
            .arg(&self.repo)
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| VcsError::TimedOut {
                args: args.join(" "),
                timeout: self.timeout,
            })?
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => VcsError::GitNotFound,
                _ => VcsError::Io(e),
            })?;

        if !output.status.success() {
            return Err(VcsError::CommandFailed {
                args: args.join(" "),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[async_trait]
impl Vcs for GitCli {
    async fn head_commit(&self) -> Result<CommitId, VcsError> {
        let out = self.git(&["rev-parse", "HEAD"]).await?;
        CommitId::new(&out).map_err(|_| VcsError::InvalidRevision(out.trim().to_string()))
    }

    async fn push(&self, remote: &str, branch: &str) -> Result<(), VcsError> {
        self.git(&["push", remote, branch]).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn head_commit_outside_repository_fails() {
        let dir = tempfile::tempdir().unwrap();
        let git = GitCli::new(dir.path());
        // Either git is missing or it reports "not a git repository".
        assert!(git.head_commit().await.is_err());
    }

    #[test]
    fn timeouts_are_liveness() {
        let err = VcsError::TimedOut {
            args: "push origin main".to_string(),
            timeout: Duration::from_secs(5),
        };
        assert_eq!(err.kind(), ErrorClass::Liveness);
        assert!(err.to_string().contains("push origin main"));
    }

    #[tokio::test]
    async fn zero_timeout_fails_instead_of_waiting() {
        let dir = tempfile::tempdir().unwrap();
        let git = GitCli::new(dir.path()).with_timeout(Duration::ZERO);
        match git.push("origin", "main").await {
            Err(VcsError::TimedOut { timeout, .. }) => assert_eq!(timeout, Duration::ZERO),
            // No git binary at all is reported before the clock matters.
            Err(VcsError::GitNotFound) => {}
            other => panic!("expected a timeout, got {other:?}"),
        }
    }
}
