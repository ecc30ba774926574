// ABOUTME: Release pipeline: stamp, build, package, verify, and optionally deploy.
// ABOUTME: Stages run sequentially under a guard that restores stamped files on failure.

mod build;
mod error;
mod guard;
mod stage;

pub use build::{BuildError, BuildRunner};
pub use error::PipelineError;
pub use guard::RunGuard;
pub use stage::Stage;

use chrono::Utc;
use snafu::ResultExt;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::deploy::{
    DeployLock, DeploymentDriver, DeploymentState, HttpProbe, VerificationReport, deploy_plan,
};
use crate::diagnostics::{Diagnostics, Warning};
use crate::hooks::{HookContext, HookPoint, HookRunner};
use crate::output::Output;
use crate::package::{Artifact, ArtifactPackager, PackageError, PackageInfo};
use crate::ssh::RemoteExec;
use crate::stamp::{VersionMetadata, VersionStamper};
use crate::types::{CommitId, Version};
use crate::vcs::Vcs;

use error::{
    BuildSnafu, DeploySnafu, DeployUnavailableSnafu, PackageSnafu, PreReleaseHookSnafu,
    RevisionSnafu, StampSnafu,
};

/// Commit recorded when the working tree is not a repository.
const UNKNOWN_COMMIT: &str = "unknown";

/// What a single run should do.
#[derive(Debug, Clone, Default)]
pub struct ReleaseOptions {
    /// Build target passed to the build tool.
    pub target: String,
    /// Extra arguments passed through to the build tool.
    pub build_args: Vec<String>,
    /// Overrides the configured version.
    pub version: Option<Version>,
    /// Report what would happen without side effects.
    pub dry_run: bool,
    pub skip_stamp: bool,
    /// Leave stamped files in place after a successful run.
    pub no_restore: bool,
    pub package: bool,
    /// Roll the release out after packaging.
    pub deploy: bool,
    /// Break an existing deploy lock.
    pub force: bool,
}

/// Remote collaborators for the deploy stage.
pub struct DeployTarget<'a> {
    pub remote: &'a dyn RemoteExec,
    pub probe: &'a dyn HttpProbe,
}

#[derive(Debug)]
pub struct ReleaseOutcome {
    pub metadata: VersionMetadata,
    pub artifact: Option<Artifact>,
    pub deployment: Option<(DeploymentState, VerificationReport)>,
    pub diagnostics: Diagnostics,
}

pub struct ReleasePipeline<'a> {
    config: &'a Config,
    root: PathBuf,
    vcs: &'a dyn Vcs,
    output: &'a Output,
}

impl<'a> ReleasePipeline<'a> {
    pub fn new(config: &'a Config, root: &Path, vcs: &'a dyn Vcs, output: &'a Output) -> Self {
        Self {
            config,
            root: root.to_path_buf(),
            vcs,
            output,
        }
    }

    /// Run every requested stage in order.
    ///
    /// Any failure restores the tracked files before this returns, then runs
    /// the on-error hook. `deploy` supplies the remote collaborators and is
    /// required when `options.deploy` is set outside a dry run.
    pub async fn run(
        &self,
        options: &ReleaseOptions,
        deploy: Option<DeployTarget<'_>>,
    ) -> Result<ReleaseOutcome, PipelineError> {
        let version = options
            .version
            .clone()
            .unwrap_or_else(|| self.config.version.clone());
        let commit = self.local_commit(options.deploy).await?;
        let metadata = VersionMetadata::new(version, Utc::now(), commit);
        let hooks = HookRunner::new(&self.root);
        let mut diagnostics = Diagnostics::default();

        if !options.dry_run {
            self.run_pre_release_hook(&hooks, &metadata).await?;
        }

        let stamper = VersionStamper::open(&self.root, &self.config.stamp).context(StampSnafu)?;
        let mut guard = RunGuard::new(stamper);

        let result = match self
            .run_stages(options, &metadata, &mut guard, deploy, &mut diagnostics)
            .await
        {
            Ok(done) if !options.dry_run => guard
                .finish(options.no_restore, &mut diagnostics)
                .context(StampSnafu)
                .map(|()| done),
            Ok(done) => Ok(done),
            Err(e) => {
                guard.abort();
                Err(e)
            }
        };

        match result {
            Ok((artifact, deployment)) => {
                if !options.dry_run {
                    self.run_hook(&hooks, HookPoint::PostRelease, &metadata, None, &mut diagnostics)
                        .await;
                }
                Ok(ReleaseOutcome {
                    metadata,
                    artifact,
                    deployment,
                    diagnostics,
                })
            }
            Err(e) => {
                if !options.dry_run {
                    self.run_hook(
                        &hooks,
                        HookPoint::OnError,
                        &metadata,
                        Some(e.stage()),
                        &mut diagnostics,
                    )
                    .await;
                }
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        options: &ReleaseOptions,
        metadata: &VersionMetadata,
        guard: &mut RunGuard,
        deploy: Option<DeployTarget<'_>>,
        diagnostics: &mut Diagnostics,
    ) -> Result<(Option<Artifact>, Option<(DeploymentState, VerificationReport)>), PipelineError>
    {
        self.stamp(options, metadata, guard)?;
        self.build(options).await?;

        let artifact = if options.package {
            self.package_and_verify(options, metadata)?
        } else {
            None
        };

        let deployment = if options.deploy {
            self.deploy(options, deploy, diagnostics).await?
        } else {
            None
        };

        Ok((artifact, deployment))
    }

    async fn local_commit(&self, required: bool) -> Result<CommitId, PipelineError> {
        match self.vcs.head_commit().await {
            Ok(commit) => Ok(commit),
            Err(e) if !required => {
                tracing::warn!("cannot read local revision, recording '{}': {}", UNKNOWN_COMMIT, e);
                CommitId::new(UNKNOWN_COMMIT).map_err(|_| e).context(RevisionSnafu)
            }
            Err(e) => Err(e).context(RevisionSnafu),
        }
    }

    // =========================================================================
    // Stages
    // =========================================================================

    fn stamp(
        &self,
        options: &ReleaseOptions,
        metadata: &VersionMetadata,
        guard: &mut RunGuard,
    ) -> Result<(), PipelineError> {
        if options.skip_stamp {
            self.output.progress("→ Skipping version stamping");
            return Ok(());
        }
        let Some(stamper) = guard.stamper_mut() else {
            return Ok(());
        };

        if options.dry_run {
            for (path, _) in stamper.preview(metadata).context(StampSnafu)? {
                self.output
                    .progress(&format!("→ Would stamp {} into {}", metadata.version, path.display()));
            }
            return Ok(());
        }

        self.output.progress(&format!(
            "→ Stamping {} ({}) into tracked files",
            metadata.version,
            metadata.commit_id.short()
        ));
        stamper.inject(metadata.clone()).context(StampSnafu)
    }

    async fn build(&self, options: &ReleaseOptions) -> Result<(), PipelineError> {
        let runner = BuildRunner::new(&self.config.build.command, &self.root)
            .with_timeout(self.config.build.timeout);
        let argv = runner.argv(&options.target, &options.build_args).join(" ");
        if options.dry_run {
            self.output.progress(&format!("→ Would run: {argv}"));
            return Ok(());
        }
        self.output.progress(&format!("→ Building: {argv}"));
        runner
            .run(&options.target, &options.build_args)
            .await
            .context(BuildSnafu)
    }

    fn packager(&self, metadata: &VersionMetadata) -> ArtifactPackager {
        packager_for(self.config, &self.root, metadata)
    }

    fn package_and_verify(
        &self,
        options: &ReleaseOptions,
        metadata: &VersionMetadata,
    ) -> Result<Option<Artifact>, PipelineError> {
        let packager = self.packager(metadata);
        let build_output = self.root.join(&self.config.build.output_dir);

        if options.dry_run {
            self.output.progress(&format!(
                "→ Would package {} into {}",
                build_output.display(),
                packager.archive_path().display()
            ));
            return Ok(None);
        }

        self.output.progress("→ Packaging build output");
        let artifact = packager.package(&build_output).context(PackageSnafu {
            stage: Stage::Package,
        })?;

        self.output.progress("→ Verifying artifact");
        let intact = packager.verify_integrity(&artifact).context(PackageSnafu {
            stage: Stage::Verify,
        })?;
        if !intact {
            if let Err(e) = artifact.discard() {
                tracing::warn!("failed to discard bad artifact: {}", e);
            }
            return Err(PackageError::IntegrityCheckFailed(artifact.path.clone())).context(
                PackageSnafu {
                    stage: Stage::Verify,
                },
            );
        }
        Ok(Some(artifact))
    }

    async fn deploy(
        &self,
        options: &ReleaseOptions,
        target: Option<DeployTarget<'_>>,
        diagnostics: &mut Diagnostics,
    ) -> Result<Option<(DeploymentState, VerificationReport)>, PipelineError> {
        let Some(config) = self.config.deploy.as_ref() else {
            return DeployUnavailableSnafu {
                reason: "no deploy section configured",
            }
            .fail();
        };

        if options.dry_run {
            for step in deploy_plan(config) {
                self.output.progress(&format!("→ Would run: {step}"));
            }
            return Ok(None);
        }

        let Some(target) = target else {
            return DeployUnavailableSnafu {
                reason: "no remote session",
            }
            .fail();
        };
        self.output
            .progress(&format!("→ Deploying to {}", target.remote.target()));
        let driver = DeploymentDriver::new(config, target.remote, self.vcs, target.probe);
        deploy_locked(driver, &self.config.app, options.force, diagnostics)
            .await
            .map(Some)
    }

    // =========================================================================
    // Hooks
    // =========================================================================

    async fn run_pre_release_hook(
        &self,
        hooks: &HookRunner,
        metadata: &VersionMetadata,
    ) -> Result<(), PipelineError> {
        let context = hook_context(self.config, metadata, None);
        match hooks.run(HookPoint::PreRelease, &context).await {
            Some(result) if !result.success => PreReleaseHookSnafu {
                message: result.summary(),
            }
            .fail(),
            _ => Ok(()),
        }
    }

    async fn run_hook(
        &self,
        hooks: &HookRunner,
        point: HookPoint,
        metadata: &VersionMetadata,
        stage: Option<Stage>,
        diagnostics: &mut Diagnostics,
    ) {
        let context = hook_context(self.config, metadata, stage);
        if let Some(result) = hooks.run(point, &context).await
            && !result.success
        {
            diagnostics.warn(Warning::hook_failed(format!(
                "{} hook {}",
                point.filename(),
                result.summary()
            )));
        }
    }
}

/// Acquire the remote lock, drive the deployment, and always try to release.
pub async fn deploy_locked<R, V, P>(
    mut driver: DeploymentDriver<'_, R, V, P>,
    app: &crate::types::AppName,
    force: bool,
    diagnostics: &mut Diagnostics,
) -> Result<(DeploymentState, VerificationReport), PipelineError>
where
    R: RemoteExec + ?Sized,
    V: Vcs + ?Sized,
    P: HttpProbe + ?Sized,
{
    let lock = match DeployLock::acquire(driver.remote(), app, force).await {
        Ok(lock) => lock,
        Err(source) => {
            return Err(source).context(DeploySnafu {
                report: Box::new(VerificationReport::new()),
            });
        }
    };

    let result = driver.run().await;

    if let Err(e) = lock.release().await {
        diagnostics.warn(Warning::lock_release(format!(
            "failed to release deploy lock: {e}"
        )));
    }

    let (state, report) = driver.into_parts();
    match result {
        Ok(()) => Ok((state, report)),
        Err(source) => Err(source).context(DeploySnafu {
            report: Box::new(report),
        }),
    }
}

pub fn packager_for(config: &Config, root: &Path, metadata: &VersionMetadata) -> ArtifactPackager {
    let info = PackageInfo {
        app: config.app.clone(),
        version: metadata.version.clone(),
        build_date: metadata.build_timestamp,
        arch: config.package.arch(),
        commit: Some(metadata.commit_id.clone()),
    };
    ArtifactPackager::new(
        info,
        config.build.primary_executable.clone(),
        root.join(&config.package.output_dir),
    )
}

fn hook_context(config: &Config, metadata: &VersionMetadata, stage: Option<Stage>) -> HookContext {
    HookContext {
        app: config.app.clone(),
        version: metadata.version.to_string(),
        commit: metadata.commit_id.to_string(),
        stage: stage.map(|s| s.to_string()),
    }
}
