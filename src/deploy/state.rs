// ABOUTME: Deployment stages and the per-attempt state record.
// ABOUTME: Stages only move forward; any failure parks the state in Failed.

use serde::Serialize;

use crate::types::CommitId;

use super::DeployError;

/// Stage of a single deployment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployStage {
    Idle,
    Syncing,
    CommitVerified,
    Restarting,
    HealthChecking,
    Healthy,
    Failed,
}

impl DeployStage {
    /// The single stage reachable from this one on success.
    pub fn next(self) -> Option<DeployStage> {
        match self {
            DeployStage::Idle => Some(DeployStage::Syncing),
            DeployStage::Syncing => Some(DeployStage::CommitVerified),
            DeployStage::CommitVerified => Some(DeployStage::Restarting),
            DeployStage::Restarting => Some(DeployStage::HealthChecking),
            DeployStage::HealthChecking => Some(DeployStage::Healthy),
            DeployStage::Healthy | DeployStage::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }
}

impl std::fmt::Display for DeployStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DeployStage::Idle => "idle",
            DeployStage::Syncing => "syncing",
            DeployStage::CommitVerified => "commit-verified",
            DeployStage::Restarting => "restarting",
            DeployStage::HealthChecking => "health-checking",
            DeployStage::Healthy => "healthy",
            DeployStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Observations collected during one deployment attempt.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentState {
    stage: DeployStage,
    /// Stage that was active when the attempt failed.
    failed_at: Option<DeployStage>,
    pub local_commit: Option<CommitId>,
    pub remote_commit: Option<CommitId>,
    pub container_status: Option<String>,
    pub http_status: Option<u16>,
}

impl Default for DeploymentState {
    fn default() -> Self {
        Self::new()
    }
}

impl DeploymentState {
    pub fn new() -> Self {
        Self {
            stage: DeployStage::Idle,
            failed_at: None,
            local_commit: None,
            remote_commit: None,
            container_status: None,
            http_status: None,
        }
    }

    pub fn stage(&self) -> DeployStage {
        self.stage
    }

    pub fn failed_at(&self) -> Option<DeployStage> {
        self.failed_at
    }

    /// Both commits are known and byte-identical.
    pub fn commits_match(&self) -> bool {
        matches!(
            (&self.local_commit, &self.remote_commit),
            (Some(local), Some(remote)) if local.as_str() == remote.as_str()
        )
    }

    /// The most recent HTTP probe returned a 2xx status.
    pub fn probe_succeeded(&self) -> bool {
        self.http_status.is_some_and(|s| (200..300).contains(&s))
    }

    /// Move to `to`, which must be the immediate successor of the current stage.
    ///
    /// `Healthy` is reachable only through [`DeploymentState::mark_healthy`].
    pub(crate) fn advance(&mut self, to: DeployStage) -> Result<(), DeployError> {
        if to == DeployStage::Healthy || self.stage.next() != Some(to) {
            return Err(DeployError::InvalidTransition {
                from: self.stage,
                to,
            });
        }
        tracing::info!("deployment stage {} -> {}", self.stage, to);
        self.stage = to;
        Ok(())
    }

    /// Enter `Healthy`, which requires matching commits and a successful probe.
    pub(crate) fn mark_healthy(&mut self) -> Result<(), DeployError> {
        if self.stage != DeployStage::HealthChecking
            || !self.commits_match()
            || !self.probe_succeeded()
        {
            return Err(DeployError::InvalidTransition {
                from: self.stage,
                to: DeployStage::Healthy,
            });
        }
        tracing::info!("deployment stage {} -> healthy", self.stage);
        self.stage = DeployStage::Healthy;
        Ok(())
    }

    /// Park the attempt in `Failed`, remembering where it stopped.
    pub(crate) fn fail(&mut self) {
        if self.stage == DeployStage::Failed {
            return;
        }
        tracing::info!("deployment stage {} -> failed", self.stage);
        self.failed_at = Some(self.stage);
        self.stage = DeployStage::Failed;
    }
}
