// ABOUTME: Non-fatal warnings gathered while a release runs.
// ABOUTME: Cleanup problems land here so they are reported without failing the run.

use std::fmt;

/// Warnings collected over one command. Each is logged as it arrives.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!(kind = warning.kind.label(), "{}", warning.message);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Number of warnings of one kind.
    pub fn count(&self, kind: WarningKind) -> usize {
        self.warnings.iter().filter(|w| w.kind == kind).count()
    }
}

#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    fn of(kind: WarningKind, message: impl Into<String>) -> Self {
        Warning {
            kind,
            message: message.into(),
        }
    }

    /// The remote lock directory could not be removed.
    pub fn lock_release(message: impl Into<String>) -> Self {
        Self::of(WarningKind::LockRelease, message)
    }

    pub fn ssh_disconnect(message: impl Into<String>) -> Self {
        Self::of(WarningKind::SshDisconnect, message)
    }

    /// A post-release or on-error hook exited non-zero. The run result stands.
    pub fn hook_failed(message: impl Into<String>) -> Self {
        Self::of(WarningKind::HookFailed, message)
    }

    pub fn snapshot_cleanup(message: impl Into<String>) -> Self {
        Self::of(WarningKind::SnapshotCleanup, message)
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind.label(), self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    LockRelease,
    SshDisconnect,
    HookFailed,
    SnapshotCleanup,
}

impl WarningKind {
    pub fn label(self) -> &'static str {
        match self {
            WarningKind::LockRelease => "lock",
            WarningKind::SshDisconnect => "ssh",
            WarningKind::HookFailed => "hook",
            WarningKind::SnapshotCleanup => "snapshot",
        }
    }
}
