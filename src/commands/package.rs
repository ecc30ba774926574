// ABOUTME: Package and verify-artifact command implementations.
// ABOUTME: Package archives existing build output; verify-artifact re-checks an archive on disk.

use super::local_metadata;
use shipline::config::Config;
use shipline::error::Result;
use shipline::output::Output;
use shipline::package::{Artifact, PackageError};
use shipline::pipeline::packager_for;
use shipline::types::Version;
use std::path::Path;

/// Archive the configured build output and write its checksum sidecar.
pub async fn package(
    config: &Config,
    root: &Path,
    version: Option<Version>,
    mut output: Output,
) -> Result<()> {
    output.start_timer();
    let metadata = local_metadata(config, root, version).await?;
    let packager = packager_for(config, root, &metadata);
    let build_output = root.join(&config.build.output_dir);

    output.progress(&format!(
        "Packaging {} into {}",
        build_output.display(),
        packager.archive_path().display()
    ));
    let artifact = packager.package(&build_output)?;

    if !packager.verify_integrity(&artifact)? {
        artifact.discard()?;
        return Err(PackageError::IntegrityCheckFailed(artifact.path).into());
    }

    output.progress(&format!("  sha256 {}", artifact.sha256));
    output.success(&format!(
        "Packaged {} ({} bytes)",
        artifact.name, artifact.size_bytes
    ));
    Ok(())
}

/// Recompute an archive's digest and confirm it extracts with the primary
/// executable present.
pub async fn verify_artifact(
    config: &Config,
    root: &Path,
    archive: &Path,
    mut output: Output,
) -> Result<()> {
    output.start_timer();
    let artifact = Artifact::from_archive(archive)?;
    let metadata = local_metadata(config, root, None).await?;
    let packager = packager_for(config, root, &metadata);

    output.progress(&format!("Verifying {}", artifact.path.display()));
    if !packager.verify_integrity(&artifact)? {
        return Err(PackageError::IntegrityCheckFailed(artifact.path).into());
    }

    output.success(&format!("{} is intact", artifact.name));
    Ok(())
}
