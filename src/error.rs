// ABOUTME: Application-wide error types for shipline.
// ABOUTME: Aggregates component errors and classifies them for reporting.

use std::path::PathBuf;
use thiserror::Error;

use crate::deploy::DeployError;
use crate::discovery::DiscoveryError;
use crate::package::PackageError;
use crate::pipeline::{BuildError, PipelineError};
use crate::stamp::StampError;
use crate::vcs::VcsError;

/// Broad failure categories shared by every component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Something required was missing; nothing was mutated.
    Precondition,
    /// An artifact failed its checksum or extraction check.
    Integrity,
    /// Local and remote state disagree.
    Consistency,
    /// A process, endpoint, or helper did not become ready in time.
    Liveness,
    /// Filesystem or transport failure.
    Io,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorClass::Precondition => "precondition",
            ErrorClass::Integrity => "integrity",
            ErrorClass::Consistency => "consistency",
            ErrorClass::Liveness => "liveness",
            ErrorClass::Io => "io",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Stamp(#[from] StampError),

    #[error(transparent)]
    Package(#[from] PackageError),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Vcs(#[from] VcsError),

    #[error("SSH error: {0}")]
    Ssh(#[from] crate::ssh::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorClass {
        match self {
            Error::AlreadyExists(_)
            | Error::ConfigNotFound(_)
            | Error::InvalidConfig(_)
            | Error::Yaml(_) => ErrorClass::Precondition,
            Error::Pipeline(e) => e.kind(),
            Error::Stamp(e) => e.kind(),
            Error::Package(e) => e.kind(),
            Error::Deploy(e) => e.kind(),
            Error::Discovery(e) => e.kind(),
            Error::Build(e) => e.kind(),
            Error::Vcs(e) => e.kind(),
            Error::Ssh(e) => e.kind(),
            Error::Io(_) => ErrorClass::Io,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
