// ABOUTME: Version stamping of tracked files with snapshot-backed restore.
// ABOUTME: inject/restore form an all-or-nothing pair over the configured file set.

mod error;
mod format;
mod metadata;
mod snapshot;

pub use error::StampError;
pub use format::render;
pub use metadata::VersionMetadata;
pub use snapshot::{SNAPSHOT_FILENAME, Snapshot, SnapshotEntry};

use std::path::{Path, PathBuf};

use crate::config::{StampConfig, StampFileConfig};

/// Rewrites the version-bearing files of a working tree.
///
/// Only one snapshot may be active per working tree at a time: the snapshot is
/// persisted under the configured snapshot directory and `inject` refuses to
/// run while one exists. Concurrent pipeline runs against the same tree are
/// not supported; the persisted snapshot only makes the second one fail fast.
#[derive(Debug)]
pub struct VersionStamper {
    root: PathBuf,
    files: Vec<StampFileConfig>,
    snapshot_path: PathBuf,
    snapshot: Option<Snapshot>,
    metadata: Option<VersionMetadata>,
}

impl VersionStamper {
    /// Create a stamper for `root`, picking up a snapshot left by an earlier run.
    pub fn open(root: &Path, config: &StampConfig) -> Result<Self, StampError> {
        let snapshot_path = root.join(&config.snapshot_dir).join(SNAPSHOT_FILENAME);
        let snapshot = Snapshot::load(&snapshot_path)?;
        if snapshot.is_some() {
            tracing::warn!(
                "found snapshot from an earlier run at {}",
                snapshot_path.display()
            );
        }

        Ok(Self {
            root: root.to_path_buf(),
            files: config.files.iter().cloned().collect(),
            snapshot_path,
            snapshot,
            metadata: None,
        })
    }

    /// Whether a snapshot (in memory or persisted) is currently held.
    pub fn has_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Metadata of the current run, if `inject` has been called.
    pub fn metadata(&self) -> Option<&VersionMetadata> {
        self.metadata.as_ref()
    }

    /// Render every tracked file without touching the filesystem.
    ///
    /// Returns `(path, new contents)` pairs. Fails exactly where `inject` would.
    pub fn preview(&self, metadata: &VersionMetadata) -> Result<Vec<(PathBuf, String)>, StampError> {
        let (_, rendered) = self.prepare(metadata)?;
        Ok(rendered)
    }

    /// Capture the current contents of every tracked file, then overwrite them
    /// with `metadata`.
    ///
    /// All files are read, checked for writability, and rendered before the
    /// first write. If a write still fails part-way, files already written are
    /// put back before the error is returned.
    pub fn inject(&mut self, mut metadata: VersionMetadata) -> Result<(), StampError> {
        if self.snapshot.is_some() || self.snapshot_path.exists() {
            return Err(StampError::SnapshotActive(self.snapshot_path.clone()));
        }

        let (entries, rendered) = self.prepare(&metadata)?;
        let snapshot = Snapshot::new(entries);
        snapshot.save(&self.snapshot_path)?;

        for (written, (path, contents)) in rendered.iter().enumerate() {
            if let Err(e) = std::fs::write(path, contents) {
                tracing::error!("write to {} failed, undoing earlier writes", path.display());
                if let Err(undo) = roll_back(&snapshot, written, &self.snapshot_path) {
                    tracing::error!(
                        "{}; snapshot kept at {}",
                        undo,
                        self.snapshot_path.display()
                    );
                    self.snapshot = Some(snapshot);
                    return Err(StampError::PartialWrite {
                        path: path.clone(),
                        snapshot: self.snapshot_path.clone(),
                    });
                }
                return Err(StampError::write(path, e.to_string()));
            }
            tracing::debug!("stamped {}", path.display());
        }

        metadata.is_injected = true;
        tracing::info!(
            version = %metadata.version,
            commit = %metadata.commit_id,
            "injected build metadata into {} file(s)",
            rendered.len()
        );
        self.snapshot = Some(snapshot);
        self.metadata = Some(metadata);
        Ok(())
    }

    /// Revert every tracked file to the captured snapshot.
    ///
    /// The snapshot stays held until `cleanup`, so restore may be repeated.
    pub fn restore(&mut self) -> Result<(), StampError> {
        let snapshot = self.snapshot.as_ref().ok_or(StampError::NoSnapshot)?;
        snapshot.write_back()?;
        if let Some(metadata) = &mut self.metadata {
            metadata.is_injected = false;
        }
        tracing::info!("restored {} tracked file(s)", snapshot.entries.len());
        Ok(())
    }

    /// Discard the snapshot. Calling it again is a no-op.
    pub fn cleanup(&mut self) -> Result<(), StampError> {
        if self.snapshot.take().is_some() {
            tracing::debug!("discarding snapshot {}", self.snapshot_path.display());
        }
        Snapshot::discard(&self.snapshot_path)
    }

    /// Read, validate, and render every tracked file.
    fn prepare(
        &self,
        metadata: &VersionMetadata,
    ) -> Result<(Vec<SnapshotEntry>, Vec<(PathBuf, String)>), StampError> {
        let mut entries = Vec::with_capacity(self.files.len());
        let mut rendered = Vec::with_capacity(self.files.len());

        for file in &self.files {
            let path = self.root.join(&file.path);

            let meta = std::fs::metadata(&path).map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => StampError::write(&path, "file does not exist"),
                _ => StampError::write(&path, e.to_string()),
            })?;
            if !meta.is_file() {
                return Err(StampError::write(&path, "not a regular file"));
            }
            if meta.permissions().readonly() {
                return Err(StampError::write(&path, "file is not writable"));
            }

            let original = std::fs::read_to_string(&path)
                .map_err(|e| StampError::write(&path, e.to_string()))?;
            let contents = render(file, &original, metadata)
                .map_err(|reason| StampError::write(&path, reason))?;

            entries.push(SnapshotEntry {
                path: path.clone(),
                contents: original,
            });
            rendered.push((path, contents));
        }

        Ok((entries, rendered))
    }
}

/// Put back the first `written` files after a failed write. The persisted
/// snapshot is discarded only once every one of them is back.
fn roll_back(snapshot: &Snapshot, written: usize, snapshot_path: &Path) -> Result<(), StampError> {
    let mut failure = None;
    for entry in &snapshot.entries[..written] {
        if let Err(source) = std::fs::write(&entry.path, &entry.contents) {
            tracing::error!("failed to undo {}: {}", entry.path.display(), source);
            failure.get_or_insert(StampError::Restore {
                path: entry.path.clone(),
                source,
            });
        }
    }
    match failure {
        Some(err) => Err(err),
        None => Snapshot::discard(snapshot_path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn saved_snapshot(dir: &TempDir, entries: Vec<SnapshotEntry>) -> (Snapshot, PathBuf) {
        let path = dir.path().join(".shipline").join(SNAPSHOT_FILENAME);
        let snapshot = Snapshot::new(entries);
        snapshot.save(&path).unwrap();
        (snapshot, path)
    }

    #[test]
    fn roll_back_discards_snapshot_once_everything_is_back() {
        let dir = TempDir::new().unwrap();
        let version = dir.path().join("VERSION");
        std::fs::write(&version, "9.9.9\n").unwrap();
        let (snapshot, snapshot_path) = saved_snapshot(
            &dir,
            vec![SnapshotEntry {
                path: version.clone(),
                contents: "0.0.1\n".to_string(),
            }],
        );

        roll_back(&snapshot, 1, &snapshot_path).unwrap();

        assert_eq!(std::fs::read_to_string(&version).unwrap(), "0.0.1\n");
        assert!(!snapshot_path.exists());
    }

    #[test]
    fn failed_undo_keeps_the_persisted_snapshot() {
        let dir = TempDir::new().unwrap();
        let version = dir.path().join("VERSION");
        std::fs::write(&version, "9.9.9\n").unwrap();
        // A directory where a tracked file used to be cannot be written back.
        let swapped = dir.path().join("version.py");
        std::fs::create_dir(&swapped).unwrap();
        let (snapshot, snapshot_path) = saved_snapshot(
            &dir,
            vec![
                SnapshotEntry {
                    path: swapped.clone(),
                    contents: "VERSION = \"0.0.1\"\n".to_string(),
                },
                SnapshotEntry {
                    path: version.clone(),
                    contents: "0.0.1\n".to_string(),
                },
            ],
        );

        let err = roll_back(&snapshot, 2, &snapshot_path).unwrap_err();

        assert!(matches!(err, StampError::Restore { ref path, .. } if *path == swapped));
        assert!(snapshot_path.exists());
        assert_eq!(Snapshot::load(&snapshot_path).unwrap(), Some(snapshot));
        // Files that could be put back still are.
        assert_eq!(std::fs::read_to_string(&version).unwrap(), "0.0.1\n");
    }
}
