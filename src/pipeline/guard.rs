// ABOUTME: Scoped finalizer for a release run.
// ABOUTME: Dropping the guard restores stamped files and discards the snapshot on any exit path.

use crate::diagnostics::{Diagnostics, Warning};
use crate::stamp::{StampError, VersionStamper};

/// Owns the stamper for the duration of a run.
///
/// Unless [`RunGuard::finish`] is called, dropping the guard restores every
/// tracked file and discards the snapshot, whether the run returned an error,
/// bailed out early, or panicked. Only a snapshot taken by this run is ever
/// touched; one left by another run stays for `stamp restore`.
#[derive(Debug)]
pub struct RunGuard {
    stamper: Option<VersionStamper>,
}

impl RunGuard {
    pub fn new(stamper: VersionStamper) -> Self {
        Self {
            stamper: Some(stamper),
        }
    }

    pub fn stamper(&self) -> Option<&VersionStamper> {
        self.stamper.as_ref()
    }

    pub fn stamper_mut(&mut self) -> Option<&mut VersionStamper> {
        self.stamper.as_mut()
    }

    /// Success path: restore tracked files unless `keep_stamped`, then discard
    /// the snapshot. A snapshot that cannot be discarded is only a warning.
    pub fn finish(
        mut self,
        keep_stamped: bool,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), StampError> {
        let Some(mut stamper) = self.stamper.take() else {
            return Ok(());
        };
        if !injected_by_this_run(&stamper) {
            return Ok(());
        }
        if keep_stamped {
            tracing::info!("keeping stamped files");
        } else {
            stamper.restore()?;
        }
        if let Err(e) = stamper.cleanup() {
            diagnostics.warn(Warning::snapshot_cleanup(format!(
                "failed to discard snapshot {}: {}",
                stamper.snapshot_path().display(),
                e
            )));
        }
        Ok(())
    }

    /// Failure path: restore and discard. Errors are logged, not returned, so
    /// they never mask the error that caused the abort.
    pub fn abort(mut self) {
        self.rollback();
    }

    fn rollback(&mut self) {
        let Some(mut stamper) = self.stamper.take() else {
            return;
        };
        if !injected_by_this_run(&stamper) {
            return;
        }
        tracing::info!("restoring tracked files after failure");
        if let Err(e) = stamper.restore() {
            tracing::error!(
                "failed to restore tracked files, snapshot kept at {}: {}",
                stamper.snapshot_path().display(),
                e
            );
            return;
        }
        if let Err(e) = stamper.cleanup() {
            tracing::warn!("failed to discard snapshot: {}", e);
        }
    }
}

fn injected_by_this_run(stamper: &VersionStamper) -> bool {
    stamper.has_snapshot() && stamper.metadata().is_some()
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.rollback();
    }
}
