// ABOUTME: Deploy lock to prevent concurrent deployments of the same app.
// ABOUTME: Atomic mkdir on the remote host with lock info stored in ~/.local/state/shipline/.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ssh::{RemoteCommand, RemoteExec};
use crate::types::AppName;

use super::DeployError;

/// Base directory for shipline state files, relative to the login directory.
const STATE_DIR: &str = ".local/state/shipline";

const INFO_FILE: &str = "info.json";

/// Information about who holds a deploy lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Hostname of the machine that holds the lock.
    pub holder: String,
    /// Process ID of the lock holder.
    pub pid: u32,
    /// When the lock was acquired.
    pub started_at: DateTime<Utc>,
    /// App being deployed.
    pub app: String,
}

impl LockInfo {
    /// Create new lock info for the current process.
    pub fn new(app: &AppName) -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            started_at: Utc::now(),
            app: app.to_string(),
        }
    }

    /// Check if this lock is stale (older than 1 hour).
    pub fn is_stale(&self) -> bool {
        let age = Utc::now() - self.started_at;
        age.num_hours() >= 1
    }

    /// Lock directory for an app.
    pub fn lock_path(app: &AppName) -> String {
        format!("{}/{}.lock", STATE_DIR, app)
    }

    fn info_path(app: &AppName) -> String {
        format!("{}/{}", Self::lock_path(app), INFO_FILE)
    }
}

/// A held deploy lock. Must be released explicitly with [`DeployLock::release`].
pub struct DeployLock<'a, R: RemoteExec + ?Sized> {
    remote: &'a R,
    app: AppName,
}

impl<R: RemoteExec + ?Sized> std::fmt::Debug for DeployLock<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployLock").field("app", &self.app).finish()
    }
}

impl<'a, R: RemoteExec + ?Sized> DeployLock<'a, R> {
    /// Acquire the deploy lock for `app`.
    ///
    /// `mkdir` either creates the lock directory or fails, so acquisition has no
    /// check-then-create window. Stale locks (>1 hour) are broken with a warning;
    /// `force` breaks any lock.
    pub async fn acquire(remote: &'a R, app: &AppName, force: bool) -> Result<Self, DeployError> {
        Self::ensure_state_dir(remote).await?;

        if Self::try_create(remote, app).await? {
            return Ok(Self {
                remote,
                app: app.clone(),
            });
        }

        match Self::read_existing(remote, app).await? {
            Some(existing) if !force && !existing.is_stale() => {
                return Err(DeployError::lock_held(
                    existing.holder,
                    existing.pid,
                    existing.started_at,
                ));
            }
            Some(existing) => {
                tracing::warn!(
                    "breaking {} lock held by {} (pid {}) since {}",
                    if force { "forced" } else { "stale" },
                    existing.holder,
                    existing.pid,
                    existing.started_at
                );
            }
            None => tracing::warn!("lock info unreadable, breaking lock"),
        }

        Self::remove(remote, app).await?;

        if !Self::try_create(remote, app).await? {
            return Err(DeployError::lock_error(
                "lock acquired by another process during break",
            ));
        }

        Ok(Self {
            remote,
            app: app.clone(),
        })
    }

    async fn ensure_state_dir(remote: &R) -> Result<(), DeployError> {
        let output = remote
            .run(&RemoteCommand::new("mkdir").args(["-p", STATE_DIR]))
            .await
            .map_err(|e| DeployError::lock_error(format!("failed to create state directory: {e}")))?;

        if !output.success() {
            return Err(DeployError::lock_error(format!(
                "failed to create state directory: {}",
                output.stderr.trim()
            )));
        }
        Ok(())
    }

    /// Create the lock directory and record who holds it. False if it already exists.
    async fn try_create(remote: &R, app: &AppName) -> Result<bool, DeployError> {
        let created = remote
            .run(&RemoteCommand::new("mkdir").arg(LockInfo::lock_path(app)))
            .await
            .map_err(|e| DeployError::lock_error(format!("failed to acquire lock: {e}")))?;
        if !created.success() {
            return Ok(false);
        }

        let info = serde_json::to_string(&LockInfo::new(app))
            .map_err(|e| DeployError::lock_error(format!("failed to serialize lock: {e}")))?;
        let write = RemoteCommand::new("tee")
            .arg(LockInfo::info_path(app))
            .stdin(info);
        match remote.run(&write).await {
            Ok(output) if output.success() => {}
            Ok(output) => tracing::warn!("failed to record lock holder: {}", output.stderr.trim()),
            Err(e) => tracing::warn!("failed to record lock holder: {}", e),
        }
        Ok(true)
    }

    async fn read_existing(remote: &R, app: &AppName) -> Result<Option<LockInfo>, DeployError> {
        let output = remote
            .run(&RemoteCommand::new("cat").arg(LockInfo::info_path(app)))
            .await
            .map_err(|e| DeployError::lock_error(format!("failed to read lock info: {e}")))?;

        if !output.success() {
            return Ok(None);
        }
        Ok(serde_json::from_str(&output.stdout).ok())
    }

    async fn remove(remote: &R, app: &AppName) -> Result<(), DeployError> {
        let output = remote
            .run(&RemoteCommand::new("rm").args(["-rf".to_string(), LockInfo::lock_path(app)]))
            .await
            .map_err(|e| DeployError::lock_error(format!("failed to remove lock: {e}")))?;
        if !output.success() {
            return Err(DeployError::lock_error(format!(
                "failed to remove lock: {}",
                output.stderr.trim()
            )));
        }
        Ok(())
    }

    /// Release the lock.
    pub async fn release(self) -> Result<(), DeployError> {
        tracing::debug!("releasing deploy lock for {}", self.app);
        Self::remove(self.remote, &self.app).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_info_creates_with_current_host_and_pid() {
        let app = AppName::new("test-app").unwrap();
        let info = LockInfo::new(&app);

        assert_eq!(info.app, "test-app");
        assert_eq!(info.pid, std::process::id());
        assert!(!info.holder.is_empty());
    }

    #[test]
    fn lock_path_uses_state_dir() {
        let app = AppName::new("myapp").unwrap();
        assert_eq!(LockInfo::lock_path(&app), ".local/state/shipline/myapp.lock");
    }

    #[test]
    fn fresh_lock_is_not_stale() {
        let app = AppName::new("test").unwrap();
        assert!(!LockInfo::new(&app).is_stale());
    }

    #[test]
    fn old_lock_is_stale() {
        let app = AppName::new("test").unwrap();
        let mut info = LockInfo::new(&app);
        info.started_at = Utc::now() - chrono::Duration::hours(2);
        assert!(info.is_stale());
    }
}
