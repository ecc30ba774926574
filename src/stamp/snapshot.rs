// ABOUTME: Captured prior contents of tracked version files.
// ABOUTME: Persisted as JSON so an interrupted run can still be restored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::StampError;

pub const SNAPSHOT_FILENAME: &str = "stamp-snapshot.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub path: PathBuf,
    pub contents: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub taken_at: DateTime<Utc>,
    pub entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    pub fn new(entries: Vec<SnapshotEntry>) -> Self {
        Self {
            taken_at: Utc::now(),
            entries,
        }
    }

    /// Load a persisted snapshot. `Ok(None)` when none exists.
    pub fn load(path: &Path) -> Result<Option<Self>, StampError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StampError::SnapshotIo {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| StampError::SnapshotCorrupt {
                path: path.to_path_buf(),
                source,
            })
    }

    pub fn save(&self, path: &Path) -> Result<(), StampError> {
        let io_err = |source| StampError::SnapshotIo {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| StampError::SnapshotIo {
            path: path.to_path_buf(),
            source: std::io::Error::other(e),
        })?;
        std::fs::write(path, json).map_err(io_err)
    }

    /// Remove a persisted snapshot; absent is not an error.
    pub fn discard(path: &Path) -> Result<(), StampError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StampError::SnapshotIo {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Write every captured file back. Stops at the first failure.
    pub fn write_back(&self) -> Result<(), StampError> {
        for entry in &self.entries {
            std::fs::write(&entry.path, &entry.contents).map_err(|source| {
                StampError::Restore {
                    path: entry.path.clone(),
                    source,
                }
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Snapshot::load(&dir.path().join(SNAPSHOT_FILENAME)).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SNAPSHOT_FILENAME);
        let snapshot = Snapshot::new(vec![SnapshotEntry {
            path: "a.txt".into(),
            contents: "old\n".into(),
        }]);
        snapshot.save(&path).unwrap();
        assert_eq!(Snapshot::load(&path).unwrap(), Some(snapshot));
    }

    #[test]
    fn corrupt_snapshot_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SNAPSHOT_FILENAME);
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            Snapshot::load(&path),
            Err(StampError::SnapshotCorrupt { .. })
        ));
    }

    #[test]
    fn discard_twice_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SNAPSHOT_FILENAME);
        std::fs::write(&path, "{}").unwrap();
        Snapshot::discard(&path).unwrap();
        Snapshot::discard(&path).unwrap();
        assert!(!path.exists());
    }
}
