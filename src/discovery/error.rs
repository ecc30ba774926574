// ABOUTME: Error types for daemon discovery and the command exchange.
// ABOUTME: Separates a missing helper (timeout) from a corrupt handshake and transport failures.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::error::ErrorClass;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The handshake file never appeared.
    #[error("daemon did not advertise a port in {path} within {waited:?}")]
    DaemonDiscoveryTimeout { path: PathBuf, waited: Duration },

    /// The handshake file exists but does not hold a usable port.
    #[error("invalid handshake in {path}: {contents:?} is not a port number")]
    InvalidHandshake { path: PathBuf, contents: String },

    #[error("cannot read handshake file {path}: {source}")]
    HandshakeIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to bind local listener: {0}")]
    Bind(#[source] std::io::Error),

    #[error("could not connect to daemon on port {port}: {source}")]
    Connect {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("daemon on port {port} did not answer within {timeout:?}")]
    RequestTimeout { port: u16, timeout: Duration },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("daemon returned an error: {0}")]
    Rejected(String),
}

impl DiscoveryError {
    pub fn kind(&self) -> ErrorClass {
        match self {
            DiscoveryError::DaemonDiscoveryTimeout { .. }
            | DiscoveryError::Connect { .. }
            | DiscoveryError::RequestTimeout { .. } => ErrorClass::Liveness,
            DiscoveryError::InvalidHandshake { .. } => ErrorClass::Integrity,
            DiscoveryError::Protocol(_) | DiscoveryError::Rejected(_) => ErrorClass::Consistency,
            DiscoveryError::HandshakeIo { .. } | DiscoveryError::Bind(_) => ErrorClass::Io,
        }
    }
}
