// ABOUTME: Packages a build output directory into a checksummed tar.gz artifact.
// ABOUTME: Includes package-info and version sidecar files and an extraction self-test.

mod archive;
mod artifact;
mod checksum;
mod error;

pub use archive::{copy_tree, create_tar_gz, extract_tar_gz};
pub use artifact::Artifact;
pub use checksum::{read_sidecar, sha256_file, sidecar_path, write_sidecar};
pub use error::PackageError;

use chrono::{DateTime, SecondsFormat, Utc};
use std::path::{Path, PathBuf};

use crate::types::{AppName, CommitId, Version};

pub const PACKAGE_INFO_FILENAME: &str = "PACKAGE_INFO.txt";
pub const VERSION_FILENAME: &str = "VERSION";

/// Descriptive fields written into the package-info file.
#[derive(Debug, Clone)]
pub struct PackageInfo {
    pub app: AppName,
    pub version: Version,
    pub build_date: DateTime<Utc>,
    pub arch: String,
    pub commit: Option<CommitId>,
}

impl PackageInfo {
    pub fn archive_name(&self) -> String {
        format!("{}-{}-{}.tar.gz", self.app, self.version, self.arch)
    }

    fn render(&self) -> String {
        let mut text = format!(
            "Package: {}\nVersion: {}\nBuild-Date: {}\nArchitecture: {}\n",
            self.app,
            self.version,
            self.build_date.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.arch
        );
        if let Some(commit) = &self.commit {
            text.push_str(&format!("Commit: {commit}\n"));
        }
        text
    }
}

/// Architecture label for the host, in the names used by release archives.
pub fn host_arch() -> String {
    match std::env::consts::ARCH {
        "x86_64" => "x64".to_string(),
        "aarch64" => "arm64".to_string(),
        "x86" => "x86".to_string(),
        other => other.to_string(),
    }
}

pub struct ArtifactPackager {
    info: PackageInfo,
    primary_executable: PathBuf,
    output_dir: PathBuf,
}

impl ArtifactPackager {
    pub fn new(info: PackageInfo, primary_executable: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            info,
            primary_executable: primary_executable.into(),
            output_dir: output_dir.into(),
        }
    }

    pub fn info(&self) -> &PackageInfo {
        &self.info
    }

    /// Where `package` will write the archive.
    pub fn archive_path(&self) -> PathBuf {
        self.output_dir.join(self.info.archive_name())
    }

    /// Build a distributable archive from `build_output_dir`.
    ///
    /// The build tree is copied into a throwaway staging directory together
    /// with the package-info and version files, compressed, checksummed, and
    /// accompanied by a `.sha256` sidecar. No archive is left behind on failure.
    pub fn package(&self, build_output_dir: &Path) -> Result<Artifact, PackageError> {
        self.check_build_output(build_output_dir)?;

        let staging = tempfile::Builder::new()
            .prefix("shipline-staging-")
            .tempdir()
            .map_err(|e| PackageError::packaging("creating staging directory", e))?;
        tracing::debug!("staging build output in {}", staging.path().display());

        copy_tree(build_output_dir, staging.path())?;
        std::fs::write(staging.path().join(PACKAGE_INFO_FILENAME), self.info.render())
            .map_err(|e| PackageError::packaging("writing package info", e))?;
        std::fs::write(
            staging.path().join(VERSION_FILENAME),
            format!("{}\n", self.info.version),
        )
        .map_err(|e| PackageError::packaging("writing version file", e))?;

        std::fs::create_dir_all(&self.output_dir).map_err(|e| {
            PackageError::packaging(format!("creating {}", self.output_dir.display()), e)
        })?;

        let archive_path = self.archive_path();
        let partial = archive_path.with_extension("partial");
        if let Err(e) = create_tar_gz(staging.path(), &partial) {
            let _ = std::fs::remove_file(&partial);
            return Err(e);
        }
        std::fs::rename(&partial, &archive_path).map_err(|e| {
            let _ = std::fs::remove_file(&partial);
            PackageError::packaging(format!("moving archive to {}", archive_path.display()), e)
        })?;

        let sha256 = sha256_file(&archive_path)?;
        write_sidecar(&archive_path, &sha256)?;
        let size_bytes = std::fs::metadata(&archive_path)
            .map_err(|e| PackageError::packaging("reading archive size", e))?
            .len();

        tracing::info!(
            archive = %archive_path.display(),
            size_bytes,
            "packaged {}",
            self.info.archive_name()
        );

        Ok(Artifact {
            name: self.info.archive_name(),
            path: archive_path,
            size_bytes,
            sha256,
        })
    }

    /// Self-test an artifact: the digest is recomputed from disk and must match,
    /// and the archive must extract with the primary executable present.
    ///
    /// This guards against truncation and corruption, not tampering.
    pub fn verify_integrity(&self, artifact: &Artifact) -> Result<bool, PackageError> {
        let actual = sha256_file(&artifact.path)?;
        if actual != artifact.sha256 {
            tracing::warn!(
                expected = %artifact.sha256,
                actual = %actual,
                "checksum mismatch for {}",
                artifact.name
            );
            return Ok(false);
        }

        let scratch = tempfile::Builder::new()
            .prefix("shipline-verify-")
            .tempdir()
            .map_err(|e| PackageError::packaging("creating verification directory", e))?;

        if let Err(e) = extract_tar_gz(&artifact.path, scratch.path()) {
            tracing::warn!("{} does not extract: {}", artifact.name, e);
            return Ok(false);
        }

        let present = scratch.path().join(&self.primary_executable).is_file();
        if !present {
            tracing::warn!(
                "{} is missing primary entry {}",
                artifact.name,
                self.primary_executable.display()
            );
        }
        Ok(present)
    }

    fn check_build_output(&self, dir: &Path) -> Result<(), PackageError> {
        if !dir.is_dir() {
            return Err(PackageError::missing(dir, "directory does not exist"));
        }
        let primary = dir.join(&self.primary_executable);
        if !primary.is_file() {
            return Err(PackageError::missing(
                primary,
                "primary executable not found",
            ));
        }
        Ok(())
    }
}
