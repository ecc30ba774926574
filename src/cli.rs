// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "shipline")]
#[command(about = "Stamp, build, package and roll out application releases")]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print final results (for CI)
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Emit JSON lines instead of human-readable output
    #[arg(long, global = true)]
    pub json: bool,

    /// Path to the configuration file (defaults to discovery in the working directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a commented shipline.yml template
    Init {
        /// Application name (defaults to the directory name)
        #[arg(long)]
        app: Option<String>,

        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Stamp version metadata, build, and restore the tracked files
    Build(BuildArgs),

    /// Build, package and verify an artifact, optionally deploying it
    Release {
        #[command(flatten)]
        build: BuildArgs,

        /// Roll the release out to the configured server
        #[arg(long)]
        deploy: bool,

        /// Break an existing deploy lock
        #[arg(long)]
        force: bool,
    },

    /// Package the existing build output and write its checksum
    Package {
        /// Version recorded in the archive name
        #[arg(long)]
        release_version: Option<String>,
    },

    /// Recompute an archive's digest and compare it with its sidecar
    VerifyArtifact {
        /// Path to the .tar.gz archive
        archive: PathBuf,
    },

    /// Roll the current revision out to the configured server
    Deploy {
        /// Break an existing deploy lock
        #[arg(long)]
        force: bool,

        /// Print the remote steps without running them
        #[arg(long)]
        dry_run: bool,
    },

    /// Manage version stamps in tracked files
    #[command(subcommand)]
    Stamp(StampCommands),

    /// Run or query the local helper daemon
    #[command(subcommand)]
    Daemon(DaemonCommands),
}

#[derive(Args)]
pub struct BuildArgs {
    /// Build target passed to the build tool (e.g. linux)
    pub target: String,

    /// Override the configured version
    #[arg(long)]
    pub release_version: Option<String>,

    /// Report what would happen without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Build without stamping version metadata
    #[arg(long)]
    pub skip_stamp: bool,

    /// Leave stamped files in place after a successful build
    #[arg(long)]
    pub no_restore: bool,

    /// Extra arguments passed through to the build tool
    #[arg(last = true)]
    pub args: Vec<String>,
}

#[derive(Subcommand)]
pub enum StampCommands {
    /// Write version metadata into every tracked file
    Inject {
        #[arg(long)]
        release_version: Option<String>,
    },

    /// Put tracked files back from the persisted snapshot
    Restore,

    /// Discard the persisted snapshot
    Cleanup,
}

#[derive(Subcommand)]
pub enum DaemonCommands {
    /// Serve helper commands on an ephemeral loopback port
    Serve {
        /// Handshake file to advertise the port in
        #[arg(long)]
        port_file: Option<PathBuf>,
    },

    /// Discover a running helper and send it a command
    Ping {
        #[arg(long)]
        port_file: Option<PathBuf>,

        /// Command to send (PING, VERSION, STATUS, QUIT)
        #[arg(long, default_value = "PING")]
        command: String,
    },
}
