// ABOUTME: A produced, checksummed distributable archive.
// ABOUTME: Immutable once created; a bad checksum means rebuild, never repair.

use serde::Serialize;
use std::path::{Path, PathBuf};

use super::PackageError;
use super::checksum::{read_sidecar, sidecar_path};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub sha256: String,
}

impl Artifact {
    /// Load an artifact from an archive on disk and the digest recorded in its sidecar.
    pub fn from_archive(path: &Path) -> Result<Self, PackageError> {
        let meta = std::fs::metadata(path)
            .map_err(|e| PackageError::packaging(format!("reading {}", path.display()), e))?;
        let sidecar = sidecar_path(path);
        let (sha256, recorded_name) = read_sidecar(&sidecar)?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if recorded_name != name {
            return Err(PackageError::InvalidSidecar {
                path: sidecar,
                reason: format!("records '{recorded_name}' but archive is '{name}'"),
            });
        }

        Ok(Self {
            name,
            path: path.to_path_buf(),
            size_bytes: meta.len(),
            sha256,
        })
    }

    pub fn sidecar_path(&self) -> PathBuf {
        sidecar_path(&self.path)
    }

    /// Delete the archive and its sidecar. Missing files are ignored.
    pub fn discard(&self) -> Result<(), PackageError> {
        for path in [self.path.clone(), self.sidecar_path()] {
            match std::fs::remove_file(&path) {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                    return Err(PackageError::packaging(
                        format!("removing {}", path.display()),
                        e,
                    ));
                }
                _ => {}
            }
        }
        tracing::info!("discarded artifact {}", self.name);
        Ok(())
    }
}
