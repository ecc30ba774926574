// ABOUTME: The background helper side of discovery: listen, advertise, answer commands.
// ABOUTME: The listener is bound before the handshake file is written and removed on shutdown.

use parking_lot::Mutex;
use serde_json::json;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use super::DiscoveryError;
use super::handshake::DaemonHandshake;
use super::protocol::{self, Request, Response};

#[derive(Debug, Default)]
struct Counters {
    connections: u64,
    active: u64,
    requests: u64,
}

/// How long a connection may sit without sending a request.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

struct Shared {
    started: Instant,
    counters: Mutex<Counters>,
    shutdown: watch::Sender<bool>,
}

/// Requests shutdown of a running helper from outside `serve`.
#[derive(Clone)]
pub struct ShutdownHandle {
    shared: Arc<Shared>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.shared.shutdown.send_replace(true);
    }
}

/// A bound, advertised helper endpoint.
pub struct DaemonHelper {
    listener: TcpListener,
    port_file: PathBuf,
    idle_timeout: Duration,
    shared: Arc<Shared>,
}

impl DaemonHelper {
    /// Bind an ephemeral loopback port, then advertise it in `port_file`.
    pub async fn bind(port_file: &Path) -> Result<Self, DiscoveryError> {
        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .map_err(DiscoveryError::Bind)?;
        let port = listener.local_addr().map_err(DiscoveryError::Bind)?.port();

        DaemonHandshake::write(port_file, port).map_err(|source| DiscoveryError::HandshakeIo {
            path: port_file.to_path_buf(),
            source,
        })?;
        tracing::info!("helper listening on 127.0.0.1:{}, advertised in {}", port, port_file.display());

        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            listener,
            port_file: port_file.to_path_buf(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            shared: Arc::new(Shared {
                started: Instant::now(),
                counters: Mutex::new(Counters::default()),
                shutdown,
            }),
        })
    }

    /// Close connections that send nothing for `timeout`. Call before `serve`.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn port(&self) -> u16 {
        self.listener.local_addr().map(|a| a.port()).unwrap_or(0)
    }

    pub fn port_file(&self) -> &Path {
        &self.port_file
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Accept connections until a QUIT command or a shutdown request, then
    /// withdraw the handshake file.
    pub async fn serve(self) -> Result<(), DiscoveryError> {
        let mut shutdown = self.shared.shutdown.subscribe();

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let shared = Arc::clone(&self.shared);
                        let idle = self.idle_timeout;
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, peer, idle, &shared).await {
                                tracing::debug!("connection from {} ended: {}", peer, e);
                            }
                        });
                    }
                    Err(e) => tracing::warn!("accept failed: {}", e),
                },
                _ = shutdown.changed() => {}
            }
        }

        tracing::info!("helper shutting down");
        DaemonHandshake::remove(&self.port_file).map_err(|source| DiscoveryError::HandshakeIo {
            path: self.port_file.clone(),
            source,
        })
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    idle: Duration,
    shared: &Shared,
) -> std::io::Result<()> {
    tracing::debug!("connection from {}", peer);
    {
        let mut counters = shared.counters.lock();
        counters.connections += 1;
        counters.active += 1;
    }

    let result = exchange(stream, idle, shared).await;
    shared.counters.lock().active -= 1;
    result
}

async fn exchange(stream: TcpStream, idle: Duration, shared: &Shared) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    loop {
        let Ok(next) = tokio::time::timeout(idle, lines.next_line()).await else {
            tracing::debug!("closing connection idle for {:?}", idle);
            break;
        };
        let Some(line) = next? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        shared.counters.lock().requests += 1;

        let (response, quit) = respond(&line, shared);
        let encoded = protocol::encode_line(&response)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        write_half.write_all(encoded.as_bytes()).await?;
        write_half.flush().await?;

        if quit {
            shared.shutdown.send_replace(true);
            break;
        }
    }
    Ok(())
}

/// Answer one request line. The flag is set when the helper should stop.
fn respond(line: &str, shared: &Shared) -> (Response, bool) {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => return (Response::error(format!("invalid request: {e}")), false),
    };
    tracing::debug!("command {}", request.command);

    match request.command.as_str() {
        protocol::PING => (Response::pong(), false),
        protocol::VERSION => (
            Response::ok_with(json!({
                "version": env!("CARGO_PKG_VERSION"),
                "api_version": protocol::API_VERSION,
                "pid": std::process::id(),
            })),
            false,
        ),
        protocol::STATUS => {
            let counters = shared.counters.lock();
            (
                Response::ok_with(json!({
                    "uptime_secs": shared.started.elapsed().as_secs(),
                    "connections": counters.connections,
                    "active_connections": counters.active,
                    "requests": counters.requests,
                })),
                false,
            )
        }
        protocol::QUIT => (Response::status("ok"), true),
        other => {
            tracing::warn!("unknown command: {}", other);
            (Response::error(format!("unknown command: {other}")), false)
        }
    }
}
