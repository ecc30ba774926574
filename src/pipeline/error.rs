// ABOUTME: Release pipeline error with SNAFU context selectors.
// ABOUTME: Every variant names the stage that failed so the CLI can report it.

use snafu::Snafu;

use crate::deploy::{DeployError, VerificationReport};
use crate::error::ErrorClass;
use crate::package::PackageError;
use crate::stamp::StampError;
use crate::vcs::VcsError;

use super::Stage;
use super::build::BuildError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PipelineError {
    #[snafu(display("pre-release hook failed: {message}"))]
    PreReleaseHook { message: String },

    #[snafu(display("cannot determine the local revision: {source}"))]
    Revision { source: VcsError },

    #[snafu(display("stage 'stamp' failed: {source}"))]
    Stamp { source: StampError },

    #[snafu(display("stage 'build' failed: {source}"))]
    Build { source: BuildError },

    #[snafu(display("stage '{stage}' failed: {source}"))]
    Package { stage: Stage, source: PackageError },

    #[snafu(display("cannot deploy: {reason}"))]
    DeployUnavailable { reason: String },

    #[snafu(display("stage 'deploy' failed: {source}"))]
    Deploy {
        source: DeployError,
        report: Box<VerificationReport>,
    },
}

impl PipelineError {
    /// The stage to blame in user-facing output.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::PreReleaseHook { .. }
            | PipelineError::Revision { .. }
            | PipelineError::Stamp { .. } => Stage::Stamp,
            PipelineError::Build { .. } => Stage::Build,
            PipelineError::Package { stage, .. } => *stage,
            PipelineError::DeployUnavailable { .. } | PipelineError::Deploy { .. } => {
                Stage::Deploy
            }
        }
    }

    pub fn kind(&self) -> ErrorClass {
        match self {
            PipelineError::PreReleaseHook { .. } | PipelineError::DeployUnavailable { .. } => {
                ErrorClass::Precondition
            }
            PipelineError::Revision { source } => source.kind(),
            PipelineError::Stamp { source } => source.kind(),
            PipelineError::Build { source } => source.kind(),
            PipelineError::Package { source, .. } => source.kind(),
            PipelineError::Deploy { source, .. } => source.kind(),
        }
    }

    /// Underlying cause without the stage prefix.
    pub fn cause(&self) -> String {
        match self {
            PipelineError::PreReleaseHook { message } => format!("pre-release hook: {message}"),
            PipelineError::DeployUnavailable { reason } => reason.clone(),
            PipelineError::Revision { source } => source.to_string(),
            PipelineError::Stamp { source } => source.to_string(),
            PipelineError::Build { source } => source.to_string(),
            PipelineError::Package { source, .. } => source.to_string(),
            PipelineError::Deploy { source, .. } => source.to_string(),
        }
    }

    /// Last diagnostic lines from the failing subsystem.
    pub fn diagnostics(&self) -> &[String] {
        match self {
            PipelineError::Build { source } => source.tail(),
            PipelineError::Deploy { source, .. } => source.logs(),
            _ => &[],
        }
    }

    /// Verification report gathered before a deploy failure.
    pub fn report(&self) -> Option<&VerificationReport> {
        match self {
            PipelineError::Deploy { report, .. } => Some(report),
            _ => None,
        }
    }
}
