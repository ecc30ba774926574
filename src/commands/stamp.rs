// ABOUTME: Stamp subcommands: inject, restore and cleanup of tracked version files.
// ABOUTME: The persisted snapshot carries state between separate invocations.

use super::local_metadata;
use shipline::config::Config;
use shipline::error::Result;
use shipline::output::Output;
use shipline::stamp::VersionStamper;
use shipline::types::Version;
use std::path::Path;

/// Stamp every tracked file and leave the snapshot for a later `stamp restore`.
pub async fn stamp_inject(
    config: &Config,
    root: &Path,
    version: Option<Version>,
    output: Output,
) -> Result<()> {
    let metadata = local_metadata(config, root, version).await?;
    let mut stamper = VersionStamper::open(root, &config.stamp)?;
    let summary = format!("{} ({})", metadata.version, metadata.commit_id.short());

    stamper.inject(metadata)?;

    output.progress(&format!(
        "  snapshot saved to {}",
        stamper.snapshot_path().display()
    ));
    output.success(&format!(
        "Stamped {summary} into {} file(s)",
        config.stamp.files.len()
    ));
    Ok(())
}

/// Put tracked files back from the persisted snapshot and discard it.
pub fn stamp_restore(config: &Config, root: &Path, output: Output) -> Result<()> {
    let mut stamper = VersionStamper::open(root, &config.stamp)?;
    stamper.restore()?;
    stamper.cleanup()?;
    output.success("Restored tracked files");
    Ok(())
}

/// Discard the persisted snapshot without touching tracked files.
pub fn stamp_cleanup(config: &Config, root: &Path, output: Output) -> Result<()> {
    let mut stamper = VersionStamper::open(root, &config.stamp)?;
    let held = stamper.has_snapshot();
    stamper.cleanup()?;
    if held {
        output.success("Discarded snapshot");
    } else {
        output.success("No snapshot to discard");
    }
    Ok(())
}
