// ABOUTME: The client side of discovery: wait for the handshake, then exchange commands.
// ABOUTME: Both the wait and every request are bounded by explicit timeouts.

use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::poll::{Attempt, PollError, PollPolicy, poll_until};

use super::DiscoveryError;
use super::handshake::{DaemonHandshake, HandshakeState};
use super::protocol::{self, Request, Response};

/// Poll `port_file` until it advertises a port.
///
/// A corrupt file fails immediately instead of being re-read until the
/// deadline. No connection is attempted here; a parsed port only means the
/// helper was alive when it wrote the file.
pub async fn discover(
    port_file: &Path,
    policy: &PollPolicy,
) -> Result<DaemonHandshake, DiscoveryError> {
    let outcome = poll_until(policy, || async move {
        match DaemonHandshake::read(port_file) {
            Ok(HandshakeState::Absent) => Ok(Attempt::NotYet(())),
            Ok(HandshakeState::Advertised { port, age }) => {
                tracing::debug!("handshake advertises port {} (age {:?})", port, age);
                Ok(Attempt::Ready(port))
            }
            Ok(HandshakeState::Corrupt { contents }) => Err(DiscoveryError::InvalidHandshake {
                path: port_file.to_path_buf(),
                contents,
            }),
            Err(source) => Err(DiscoveryError::HandshakeIo {
                path: port_file.to_path_buf(),
                source,
            }),
        }
    })
    .await;

    match outcome {
        Ok(port) => Ok(DaemonHandshake {
            port_file: port_file.to_path_buf(),
            port: Some(port),
            pid: None,
        }),
        Err(PollError::TimedOut { waited, .. }) => Err(DiscoveryError::DaemonDiscoveryTimeout {
            path: port_file.to_path_buf(),
            waited,
        }),
        Err(PollError::Failed(e)) => Err(e),
    }
}

/// Sends commands to a helper on the loopback interface.
#[derive(Debug, Clone)]
pub struct DaemonClient {
    port: u16,
    request_timeout: Duration,
}

impl DaemonClient {
    pub fn new(port: u16, request_timeout: Duration) -> Self {
        Self {
            port,
            request_timeout,
        }
    }

    /// Client for a discovered handshake.
    pub fn for_handshake(
        handshake: &DaemonHandshake,
        request_timeout: Duration,
    ) -> Result<Self, DiscoveryError> {
        let port = handshake.port.ok_or_else(|| DiscoveryError::InvalidHandshake {
            path: handshake.port_file.clone(),
            contents: String::new(),
        })?;
        Ok(Self::new(port, request_timeout))
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Connect, send one request and read one response line, all within the
    /// request timeout.
    pub async fn send(&self, request: &Request) -> Result<Response, DiscoveryError> {
        tokio::time::timeout(self.request_timeout, self.exchange(request))
            .await
            .map_err(|_| DiscoveryError::RequestTimeout {
                port: self.port,
                timeout: self.request_timeout,
            })?
    }

    async fn exchange(&self, request: &Request) -> Result<Response, DiscoveryError> {
        let stream = TcpStream::connect(("127.0.0.1", self.port))
            .await
            .map_err(|source| DiscoveryError::Connect {
                port: self.port,
                source,
            })?;
        let (read_half, mut write_half) = stream.into_split();

        let line = protocol::encode_line(request)
            .map_err(|e| DiscoveryError::Protocol(format!("cannot encode request: {e}")))?;
        tracing::debug!("sending {} to port {}", request.command, self.port);
        write_half
            .write_all(line.as_bytes())
            .await
            .map_err(|e| DiscoveryError::Protocol(format!("write failed: {e}")))?;

        let mut reply = String::new();
        let read = BufReader::new(read_half)
            .read_line(&mut reply)
            .await
            .map_err(|e| DiscoveryError::Protocol(format!("read failed: {e}")))?;
        if read == 0 {
            return Err(DiscoveryError::Protocol(
                "connection closed before a response".to_string(),
            ));
        }

        serde_json::from_str(reply.trim_end())
            .map_err(|e| DiscoveryError::Protocol(format!("malformed response: {e}")))
    }

    /// PING the helper; anything but `{"status":"pong"}` is an error.
    pub async fn ping(&self) -> Result<(), DiscoveryError> {
        match self.send(&Request::ping()).await? {
            Response::Ok { status, .. } if status == "pong" => Ok(()),
            Response::Error { error } => Err(DiscoveryError::Rejected(error)),
            other => Err(DiscoveryError::Protocol(format!(
                "unexpected PING response: {other:?}"
            ))),
        }
    }

    /// Ask the helper for its pid and record it on the handshake.
    pub async fn identify(&self, handshake: &mut DaemonHandshake) -> Result<(), DiscoveryError> {
        match self.send(&Request::new(protocol::VERSION)).await? {
            Response::Ok { data, .. } => {
                handshake.pid = data
                    .as_ref()
                    .and_then(|d| d.get("pid"))
                    .and_then(|p| p.as_u64())
                    .and_then(|p| u32::try_from(p).ok());
                Ok(())
            }
            Response::Error { error } => Err(DiscoveryError::Rejected(error)),
        }
    }
}
