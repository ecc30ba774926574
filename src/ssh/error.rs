// ABOUTME: Errors from the SSH transport to the deploy host.
// ABOUTME: Connection and credential problems are kept apart from per-command failures.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::error::ErrorClass;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot reach {target}: {reason}")]
    Connect { target: String, reason: String },

    #[error("no SSH handshake with {target} within {timeout:?}")]
    ConnectTimeout { target: String, timeout: Duration },

    #[error("host key for {target} is unknown or has changed; add it to known_hosts or enable trust_first_connection")]
    HostKeyRejected { target: String },

    #[error("{user}@{target} rejected every offered key")]
    AuthenticationFailed { user: String, target: String },

    /// Neither a configured key, an agent, nor a default key was usable.
    #[error("no SSH credentials available: {0}")]
    NoCredentials(String),

    #[error("failed to load key from {path}: {reason}")]
    KeyLoad { path: PathBuf, reason: String },

    #[error("remote channel error: {0}")]
    Channel(String),

    #[error("'{command}' did not finish within {timeout:?}")]
    CommandTimeout { command: String, timeout: Duration },

    /// The channel ended without reporting an exit status.
    #[error("channel closed before '{0}' reported an exit status")]
    ChannelClosed(String),

    #[error("SSH protocol error: {0}")]
    Protocol(#[from] russh::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorClass {
        match self {
            Error::NoCredentials(_) | Error::KeyLoad { .. } | Error::HostKeyRejected { .. } => {
                ErrorClass::Precondition
            }
            Error::AuthenticationFailed { .. } => ErrorClass::Precondition,
            Error::ConnectTimeout { .. } | Error::CommandTimeout { .. } => ErrorClass::Liveness,
            Error::Connect { .. }
            | Error::Channel(_)
            | Error::ChannelClosed(_)
            | Error::Protocol(_) => ErrorClass::Io,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_problems_are_preconditions() {
        let err = Error::NoCredentials("agent not running".to_string());
        assert_eq!(err.kind(), ErrorClass::Precondition);
        let err = Error::HostKeyRejected {
            target: "deploy@host:22".to_string(),
        };
        assert_eq!(err.kind(), ErrorClass::Precondition);
    }

    #[test]
    fn timeouts_are_liveness() {
        let err = Error::CommandTimeout {
            command: "docker inspect web".to_string(),
            timeout: Duration::from_secs(5),
        };
        assert_eq!(err.kind(), ErrorClass::Liveness);
        assert!(err.to_string().contains("docker inspect web"));
    }
}
