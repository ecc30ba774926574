// ABOUTME: Local rendezvous between a background helper and its client.
// ABOUTME: Port advertised through a well-known file, then JSON-line commands over loopback TCP.

mod client;
mod error;
mod handshake;
mod helper;
pub mod protocol;

pub use client::{DaemonClient, discover};
pub use error::DiscoveryError;
pub use handshake::{DaemonHandshake, HandshakeState, PORT_FILENAME, default_port_file, parse_port};
pub use helper::{DaemonHelper, ShutdownHandle};
pub use protocol::{Request, Response};
