// ABOUTME: Command module aggregator for the shipline CLI.
// ABOUTME: Re-exports the subcommand handlers and the helpers they share.

mod build;
mod daemon;
mod deploy;
mod package;
mod stamp;

pub use build::{build, release};
pub use daemon::{ping, serve};
pub use deploy::deploy;
pub use package::{package, verify_artifact};
pub use stamp::{stamp_cleanup, stamp_inject, stamp_restore};

use chrono::Utc;
use shipline::config::Config;
use shipline::diagnostics::Diagnostics;
use shipline::error::{Error, Result};
use shipline::output::Output;
use shipline::stamp::VersionMetadata;
use shipline::types::{CommitId, Version};
use shipline::vcs::Vcs;
use std::path::Path;

/// Parse a `--release-version` override.
pub fn parse_version(raw: Option<&str>) -> Result<Option<Version>> {
    raw.map(|v| Version::parse(v).map_err(|e| Error::InvalidConfig(format!("--release-version: {e}"))))
        .transpose()
}

/// Metadata for a command that runs outside the release pipeline.
///
/// An unreadable revision is recorded as `unknown` rather than failing.
async fn local_metadata(
    config: &Config,
    root: &Path,
    version: Option<Version>,
) -> Result<VersionMetadata> {
    let commit = match config.git(root).head_commit().await {
        Ok(commit) => commit,
        Err(e) => {
            tracing::warn!("cannot read local revision: {}", e);
            CommitId::new("unknown").map_err(|e| Error::InvalidConfig(e.to_string()))?
        }
    };
    Ok(VersionMetadata::new(
        version.unwrap_or_else(|| config.version.clone()),
        Utc::now(),
        commit,
    ))
}

fn emit_warnings(output: &Output, diag: &Diagnostics) {
    for warning in diag.warnings() {
        output.warning(&warning.message);
    }
}
