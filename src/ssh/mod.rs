// ABOUTME: SSH client module for remote server connections.
// ABOUTME: Exposes the typed RemoteExec interface and its russh-backed session.

mod client;
mod command;
mod error;

pub use client::{Session, SessionConfig};
pub use command::{CommandOutput, RemoteCommand, RemoteExec, shell_quote};
pub use error::{Error, Result};
