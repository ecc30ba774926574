// ABOUTME: Gate methods that move a deployment from one stage to the next.
// ABOUTME: Ordered cheapest first: revision identity, restart, process status, HTTP probe.

use crate::poll::{Attempt, PollError, poll_until};
use crate::ssh::{CommandOutput, RemoteExec};
use crate::types::CommitId;
use crate::vcs::Vcs;

use super::DeploymentDriver;
use super::driver;
use super::probe::HttpProbe;
use super::report::{CHECK_HTTP, CHECK_PROCESS, CHECK_REVISION};
use super::{DeployError, DeployStage};

const RUNNING: &str = "running";

fn exit_summary(output: &CommandOutput) -> String {
    let stderr = output.stderr.trim();
    if stderr.is_empty() {
        format!("exit {}", output.exit_code)
    } else {
        format!("exit {}: {}", output.exit_code, stderr)
    }
}

impl<R, V, P> DeploymentDriver<'_, R, V, P>
where
    R: RemoteExec + ?Sized,
    V: Vcs + ?Sized,
    P: HttpProbe + ?Sized,
{
    // =========================================================================
    // Idle -> Syncing
    // =========================================================================

    /// Push the local revision and fast-forward the remote checkout to it.
    pub async fn sync(&mut self) -> Result<(), DeployError> {
        self.state.advance(DeployStage::Syncing)?;

        let local = self.vcs.head_commit().await?;
        tracing::debug!("local revision {}", local);
        self.state.local_commit = Some(local);

        self.vcs
            .push(&self.config.git_remote, &self.config.branch)
            .await
            .map_err(|e| DeployError::SyncFailed(e.to_string()))?;

        let output = self.remote.run(&driver::pull_command(self.config)).await?;
        if !output.success() {
            return Err(DeployError::SyncFailed(format!(
                "git pull on {}: {}",
                self.remote.target(),
                exit_summary(&output)
            )));
        }
        Ok(())
    }

    // =========================================================================
    // Syncing -> CommitVerified
    // =========================================================================

    /// Read the remote revision back and require it to equal the local one.
    pub async fn verify_revision(&mut self) -> Result<(), DeployError> {
        let output = self.remote.run(&driver::revision_command(self.config)).await?;
        if !output.success() {
            self.report
                .fail(CHECK_REVISION, "could not read remote revision");
            return Err(DeployError::SyncFailed(format!(
                "git rev-parse on {}: {}",
                self.remote.target(),
                exit_summary(&output)
            )));
        }

        let remote = CommitId::new(&output.stdout).map_err(|_| {
            DeployError::SyncFailed(format!(
                "remote returned an invalid revision: {:?}",
                output.stdout.trim()
            ))
        })?;
        self.state.remote_commit = Some(remote.clone());

        let Some(local) = self.state.local_commit.clone() else {
            return Err(DeployError::InvalidTransition {
                from: self.state.stage(),
                to: DeployStage::CommitVerified,
            });
        };

        if !self.state.commits_match() {
            self.report.fail(
                CHECK_REVISION,
                format!("local {}, remote {}", local.short(), remote.short()),
            );
            return Err(DeployError::RevisionMismatch { local, remote });
        }

        self.report.pass(CHECK_REVISION, local.short());
        self.state.advance(DeployStage::CommitVerified)
    }

    // =========================================================================
    // CommitVerified -> Restarting
    // =========================================================================

    /// Run the configured restart command in the remote checkout.
    pub async fn restart(&mut self) -> Result<(), DeployError> {
        self.state.advance(DeployStage::Restarting)?;

        let output = self.remote.run(&driver::restart_command(self.config)).await?;
        if !output.success() {
            return Err(DeployError::RestartFailed {
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(())
    }

    // =========================================================================
    // Restarting -> HealthChecking
    // =========================================================================

    /// Poll the container status until it reports running.
    pub async fn wait_for_process(&mut self) -> Result<(), DeployError> {
        let policy = self.config.health.process_policy();
        let status_command = driver::status_command(self.config);
        let remote = self.remote;
        let command = &status_command;

        let outcome = poll_until(&policy, || async move {
            let output = remote.run(command).await?;
            let status = if output.success() {
                output.stdout.trim().to_string()
            } else {
                "missing".to_string()
            };
            tracing::debug!("container status: {}", status);
            if status == RUNNING {
                Ok::<_, crate::ssh::Error>(Attempt::Ready(status))
            } else {
                Ok(Attempt::NotYet(status))
            }
        })
        .await;

        match outcome {
            Ok(status) => {
                self.report.pass(CHECK_PROCESS, status.clone());
                self.state.container_status = Some(status);
                self.state.advance(DeployStage::HealthChecking)
            }
            Err(PollError::TimedOut { last, waited, .. }) => {
                self.report.fail(
                    CHECK_PROCESS,
                    format!(
                        "{} after {:?}",
                        last.as_deref().unwrap_or("no status"),
                        waited
                    ),
                );
                self.state.container_status = last.clone();
                Err(DeployError::ProcessStartTimeout {
                    container: self.config.container.clone(),
                    last_status: last,
                    waited,
                })
            }
            Err(PollError::Failed(e)) => {
                self.report.fail(CHECK_PROCESS, e.to_string());
                Err(DeployError::Remote(e))
            }
        }
    }

    // =========================================================================
    // HealthChecking -> Healthy
    // =========================================================================

    /// Probe the endpoint once. Anything but 2xx fails with recent logs attached.
    pub async fn probe_health(&mut self) -> Result<(), DeployError> {
        let config = self.config;
        let url = &config.health.url;
        let reason = match self.probe.probe(url, config.health.probe_timeout).await {
            Ok(status) => {
                self.state.http_status = Some(status);
                if (200..300).contains(&status) {
                    self.report.pass(CHECK_HTTP, status.to_string());
                    return self.state.mark_healthy();
                }
                format!("status {status}")
            }
            Err(e) => e.to_string(),
        };

        self.report.fail(CHECK_HTTP, reason.clone());
        let logs = self.recent_logs().await;
        Err(DeployError::HealthProbe {
            url: url.clone(),
            status: self.state.http_status,
            reason,
            logs,
        })
    }

    /// Last lines of the container's output. Failure to fetch is only logged.
    async fn recent_logs(&self) -> Vec<String> {
        match self.remote.run(&driver::logs_command(self.config)).await {
            Ok(output) => {
                let lines: Vec<String> = output
                    .stdout
                    .lines()
                    .chain(output.stderr.lines())
                    .map(str::to_string)
                    .collect();
                let keep = self.config.health.log_lines as usize;
                lines[lines.len().saturating_sub(keep)..].to_vec()
            }
            Err(e) => {
                tracing::warn!("could not fetch container logs: {}", e);
                Vec::new()
            }
        }
    }
}
