// ABOUTME: Build and release command implementations.
// ABOUTME: Both drive the release pipeline; release adds packaging and an optional rollout.

use super::emit_warnings;
use shipline::config::Config;
use shipline::deploy::HyperProbe;
use shipline::diagnostics::{Diagnostics, Warning};
use shipline::error::Result;
use shipline::output::Output;
use shipline::pipeline::{DeployTarget, ReleaseOptions, ReleaseOutcome, ReleasePipeline};
use shipline::ssh::Session;
use std::path::Path;

/// Stamp, build, restore.
pub async fn build(
    config: &Config,
    root: &Path,
    options: ReleaseOptions,
    mut output: Output,
) -> Result<()> {
    output.start_timer();
    let vcs = config.git(root);

    output.progress(&format!(
        "Building {} for {}",
        config.app, options.target
    ));

    let outcome = ReleasePipeline::new(config, root, &vcs, &output)
        .run(&options, None)
        .await?;

    emit_warnings(&output, &outcome.diagnostics);
    summarize(&output, &options, &outcome, "Build");
    Ok(())
}

/// Stamp, build, package, verify and, with `options.deploy`, roll out.
pub async fn release(
    config: &Config,
    root: &Path,
    options: ReleaseOptions,
    mut output: Output,
) -> Result<()> {
    output.start_timer();
    let vcs = config.git(root);
    let probe = HyperProbe;
    let mut diag = Diagnostics::default();

    // An unreachable host must fail before anything is stamped.
    let session = if options.deploy && !options.dry_run {
        let server = &config.deploy()?.server;
        output.progress(&format!("→ Connecting to {}", server.target()));
        Some(Session::connect(server.ssh_session_config()).await?)
    } else {
        None
    };

    output.progress(&format!(
        "Releasing {} for {}",
        config.app, options.target
    ));

    let target = session.as_ref().map(|session| DeployTarget {
        remote: session,
        probe: &probe,
    });
    let result = ReleasePipeline::new(config, root, &vcs, &output)
        .run(&options, target)
        .await;

    if let Some(session) = session
        && let Err(e) = session.disconnect().await
    {
        diag.warn(Warning::ssh_disconnect(format!("SSH disconnect failed: {e}")));
    }
    emit_warnings(&output, &diag);

    let outcome = result?;
    emit_warnings(&output, &outcome.diagnostics);
    summarize(&output, &options, &outcome, "Release");
    Ok(())
}

fn summarize(output: &Output, options: &ReleaseOptions, outcome: &ReleaseOutcome, what: &str) {
    if let Some(artifact) = &outcome.artifact {
        output.progress(&format!(
            "→ Artifact: {} ({} bytes)",
            artifact.path.display(),
            artifact.size_bytes
        ));
        output.progress(&format!("  sha256 {}", artifact.sha256));
    }
    if let Some((_, report)) = &outcome.deployment {
        output.report(report);
    }

    if options.dry_run {
        output.success(&format!("{what} dry run complete, nothing was changed"));
    } else {
        output.success(&format!(
            "{what} of {} ({}) complete!",
            outcome.metadata.version,
            outcome.metadata.commit_id.short()
        ));
    }
}
