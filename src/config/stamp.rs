// ABOUTME: Configuration for the version-bearing files rewritten during a release.
// ABOUTME: Each file declares its format and, optionally, which keys carry which value.

use nonempty::NonEmpty;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionFileFormat {
    /// A JSON object; the configured keys are set at the top level.
    Json,
    /// Source or config lines of the form `KEY = value` or `KEY: value`.
    Assignments,
    /// The whole file is the bare version string.
    Plain,
}

/// Which key names receive each metadata field. `None` leaves that field out.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StampKeys {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub build_timestamp: Option<String>,
    #[serde(default)]
    pub commit: Option<String>,
}

impl StampKeys {
    fn all(version: &str, build_timestamp: &str, commit: &str) -> Self {
        Self {
            version: Some(version.to_string()),
            build_timestamp: Some(build_timestamp.to_string()),
            commit: Some(commit.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StampFileConfig {
    pub path: PathBuf,
    pub format: VersionFileFormat,
    #[serde(default)]
    pub keys: Option<StampKeys>,
}

impl StampFileConfig {
    /// Keys to rewrite, falling back to the format's conventional names.
    pub fn keys(&self) -> StampKeys {
        if let Some(keys) = &self.keys {
            return keys.clone();
        }
        match self.format {
            VersionFileFormat::Json => StampKeys::all("version", "build_timestamp", "git_commit"),
            VersionFileFormat::Assignments => {
                StampKeys::all("VERSION", "BUILD_TIMESTAMP", "GIT_COMMIT_HASH")
            }
            VersionFileFormat::Plain => StampKeys {
                version: None,
                build_timestamp: None,
                commit: None,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StampConfig {
    pub files: NonEmpty<StampFileConfig>,

    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,
}

pub(crate) fn default_snapshot_dir() -> PathBuf {
    PathBuf::from(".shipline")
}
