// ABOUTME: Deploy command implementation.
// ABOUTME: Rolls the current revision out to the configured server and prints the verification report.

use super::emit_warnings;
use shipline::config::Config;
use shipline::deploy::{DeploymentDriver, HyperProbe, deploy_plan};
use shipline::diagnostics::{Diagnostics, Warning};
use shipline::error::Result;
use shipline::output::Output;
use shipline::pipeline::deploy_locked;
use shipline::ssh::Session;
use std::path::Path;

/// Deploy without building: push, sync, verify, restart, check.
pub async fn deploy(
    config: &Config,
    root: &Path,
    force: bool,
    dry_run: bool,
    mut output: Output,
) -> Result<()> {
    let deploy_config = config.deploy()?;
    let server = &deploy_config.server;

    if dry_run {
        output.progress(&format!("Would deploy {} to {}", config.app, server.target()));
        for step in deploy_plan(deploy_config) {
            output.progress(&format!("  → {step}"));
        }
        output.success("Deploy dry run complete, nothing was changed");
        return Ok(());
    }

    output.start_timer();
    let vcs = config.git(root);
    let probe = HyperProbe;
    let mut diag = Diagnostics::default();

    output.progress(&format!("Deploying {} to {}", config.app, server.target()));
    output.progress("  → Connecting...");
    let session = Session::connect(server.ssh_session_config()).await?;

    output.progress("  → Acquiring deploy lock...");
    let driver = DeploymentDriver::new(deploy_config, &session, &vcs, &probe);
    let result = deploy_locked(driver, &config.app, force, &mut diag).await;

    // Disconnect SSH session (non-fatal if it fails)
    if let Err(e) = session.disconnect().await {
        diag.warn(Warning::ssh_disconnect(format!(
            "SSH disconnect failed for {}: {}",
            server.host, e
        )));
    }
    emit_warnings(&output, &diag);

    let (state, report) = result?;
    output.report(&report);
    output.success(&format!("Deployment complete! ({})", state.stage()));
    Ok(())
}
