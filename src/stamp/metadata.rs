// ABOUTME: Build-identity metadata written into tracked version files.
// ABOUTME: Version string, build timestamp, commit id, and whether it is currently injected.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::types::{CommitId, Version};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionMetadata {
    pub version: Version,
    pub build_timestamp: DateTime<Utc>,
    pub commit_id: CommitId,
    pub is_injected: bool,
}

impl VersionMetadata {
    pub fn new(version: Version, build_timestamp: DateTime<Utc>, commit_id: CommitId) -> Self {
        Self {
            version,
            build_timestamp,
            commit_id,
            is_injected: false,
        }
    }

    /// Timestamp as written into files, e.g. `2025-01-27T00:00:00Z`.
    pub fn timestamp_string(&self) -> String {
        self.build_timestamp
            .to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamp_uses_zulu_seconds() {
        let meta = VersionMetadata::new(
            Version::parse("1.2.3").unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 27, 0, 0, 0).unwrap(),
            CommitId::new("abc123").unwrap(),
        );
        assert_eq!(meta.timestamp_string(), "2025-01-27T00:00:00Z");
        assert!(!meta.is_injected);
    }
}
