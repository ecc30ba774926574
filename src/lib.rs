// ABOUTME: Library root for shipline - exposes the release pipeline and its components.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod deploy;
pub mod diagnostics;
pub mod discovery;
pub mod error;
pub mod hooks;
pub mod output;
pub mod package;
pub mod pipeline;
pub mod poll;
pub mod ssh;
pub mod stamp;
pub mod types;
pub mod vcs;
