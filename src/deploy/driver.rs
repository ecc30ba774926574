// ABOUTME: DeploymentDriver owns one rollout attempt against a remote host.
// ABOUTME: Runs the gates in order and parks the state in Failed on the first error.

use crate::config::DeployConfig;
use crate::ssh::{RemoteCommand, RemoteExec};
use crate::vcs::Vcs;

use super::probe::HttpProbe;
use super::{DeployError, DeploymentState, VerificationReport};

/// Drives a remote rollout through sync, revision gate, restart and health checks.
///
/// Collaborators are borrowed so tests can substitute in-memory fakes for the
/// SSH session, the local repository and the HTTP probe.
pub struct DeploymentDriver<'a, R: ?Sized, V: ?Sized, P: ?Sized> {
    pub(super) config: &'a DeployConfig,
    pub(super) remote: &'a R,
    pub(super) vcs: &'a V,
    pub(super) probe: &'a P,
    pub(super) state: DeploymentState,
    pub(super) report: VerificationReport,
}

impl<'a, R, V, P> DeploymentDriver<'a, R, V, P>
where
    R: RemoteExec + ?Sized,
    V: Vcs + ?Sized,
    P: HttpProbe + ?Sized,
{
    pub fn new(config: &'a DeployConfig, remote: &'a R, vcs: &'a V, probe: &'a P) -> Self {
        Self {
            config,
            remote,
            vcs,
            probe,
            state: DeploymentState::new(),
            report: VerificationReport::new(),
        }
    }

    pub fn remote(&self) -> &'a R {
        self.remote
    }

    pub fn state(&self) -> &DeploymentState {
        &self.state
    }

    pub fn report(&self) -> &VerificationReport {
        &self.report
    }

    pub fn into_parts(self) -> (DeploymentState, VerificationReport) {
        (self.state, self.report)
    }

    /// Run every gate. On failure the state is `Failed` and the report carries
    /// whatever diagnostics were gathered.
    pub async fn run(&mut self) -> Result<(), DeployError> {
        let result = self.run_gates().await;
        if let Err(e) = &result {
            tracing::error!("deployment failed during {}: {}", self.state.stage(), e);
            self.state.fail();
            if !e.logs().is_empty() {
                self.report.attach_logs(e.logs().to_vec());
            }
        }
        result
    }

    async fn run_gates(&mut self) -> Result<(), DeployError> {
        self.sync().await?;
        self.verify_revision().await?;
        self.restart().await?;
        self.wait_for_process().await?;
        self.probe_health().await
    }
}

/// Describe what a rollout against `config` would do, without touching
/// anything. Needs no connection.
pub fn deploy_plan(config: &DeployConfig) -> Vec<String> {
    let target = config.server.target();
    let mut steps = vec![format!("git push {} {}", config.git_remote, config.branch)];
    steps.extend(
        [
            pull_command(config),
            revision_command(config),
            restart_command(config),
            status_command(config),
        ]
        .iter()
        .map(|cmd| format!("{cmd} (on {target})")),
    );
    steps.push(format!("GET {}", config.health.url));
    steps
}

// Remote commands. The git and restart commands run inside the configured checkout.

pub(super) fn pull_command(config: &DeployConfig) -> RemoteCommand {
    RemoteCommand::new("git")
        .args(["pull", "--ff-only"])
        .args([&config.git_remote, &config.branch])
        .cwd(&config.remote_dir)
}

pub(super) fn revision_command(config: &DeployConfig) -> RemoteCommand {
    RemoteCommand::new("git")
        .args(["rev-parse", "HEAD"])
        .cwd(&config.remote_dir)
}

pub(super) fn restart_command(config: &DeployConfig) -> RemoteCommand {
    RemoteCommand::from_argv(&config.restart)
        .unwrap_or_else(|| RemoteCommand::new("true"))
        .cwd(&config.remote_dir)
}

pub(super) fn status_command(config: &DeployConfig) -> RemoteCommand {
    RemoteCommand::new("docker").args([
        "inspect",
        "-f",
        "{{.State.Status}}",
        config.container.as_str(),
    ])
}

pub(super) fn logs_command(config: &DeployConfig) -> RemoteCommand {
    RemoteCommand::new("docker").args([
        "logs".to_string(),
        "--tail".to_string(),
        config.health.log_lines.to_string(),
        config.container.clone(),
    ])
}
