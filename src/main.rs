// ABOUTME: Entry point for the shipline CLI application.
// ABOUTME: Parses arguments, sets up logging and output, and dispatches to command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{BuildArgs, Cli, Commands, DaemonCommands, StampCommands};
use shipline::config::{self, Config};
use shipline::error::{Error, Result};
use shipline::output::{Output, OutputMode};
use shipline::pipeline::ReleaseOptions;
use std::env;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = output_mode(&cli);

    if let Err(e) = run(cli).await {
        report_error(&Output::new(mode), &e);
        std::process::exit(1);
    }
}

fn output_mode(cli: &Cli) -> OutputMode {
    if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    }
}

/// Print a failure, naming the pipeline stage when there is one.
fn report_error(output: &Output, error: &Error) {
    match error {
        Error::Pipeline(e) => {
            if let Some(report) = e.report()
                && !report.checks().is_empty()
            {
                output.report(report);
            }
            output.stage_failed(e.stage().as_str(), &e.cause(), e.diagnostics());
        }
        other => output.error(&other.to_string()),
    }
    tracing::debug!("failure class: {}", error.kind());
}

async fn run(cli: Cli) -> Result<()> {
    let output = Output::new(output_mode(&cli));
    let cwd = env::current_dir()?;

    match cli.command {
        Commands::Init { app, force } => {
            config::init_config(&cwd, app.as_deref(), force)?;
            output.success(&format!("Created {}", config::CONFIG_FILENAME));
            Ok(())
        }
        Commands::Build(args) => {
            let config = load_config(cli.config.as_deref(), &cwd)?;
            let options = release_options(args, false, false, false)?;
            commands::build(&config, &cwd, options, output).await
        }
        Commands::Release {
            build,
            deploy,
            force,
        } => {
            let config = load_config(cli.config.as_deref(), &cwd)?;
            let options = release_options(build, true, deploy, force)?;
            commands::release(&config, &cwd, options, output).await
        }
        Commands::Package { release_version } => {
            let config = load_config(cli.config.as_deref(), &cwd)?;
            let version = commands::parse_version(release_version.as_deref())?;
            commands::package(&config, &cwd, version, output).await
        }
        Commands::VerifyArtifact { archive } => {
            let config = load_config(cli.config.as_deref(), &cwd)?;
            commands::verify_artifact(&config, &cwd, &archive, output).await
        }
        Commands::Deploy { force, dry_run } => {
            let config = load_config(cli.config.as_deref(), &cwd)?;
            commands::deploy(&config, &cwd, force, dry_run, output).await
        }
        Commands::Stamp(command) => {
            let config = load_config(cli.config.as_deref(), &cwd)?;
            match command {
                StampCommands::Inject { release_version } => {
                    let version = commands::parse_version(release_version.as_deref())?;
                    commands::stamp_inject(&config, &cwd, version, output).await
                }
                StampCommands::Restore => commands::stamp_restore(&config, &cwd, output),
                StampCommands::Cleanup => commands::stamp_cleanup(&config, &cwd, output),
            }
        }
        Commands::Daemon(command) => {
            let config = load_config(cli.config.as_deref(), &cwd)?;
            match command {
                DaemonCommands::Serve { port_file } => {
                    commands::serve(&config, port_file, output).await
                }
                DaemonCommands::Ping { port_file, command } => {
                    commands::ping(&config, port_file, &command, output).await
                }
            }
        }
    }
}

fn load_config(explicit: Option<&Path>, cwd: &Path) -> Result<Config> {
    match explicit {
        Some(path) => {
            let path: PathBuf = if path.is_absolute() {
                path.to_path_buf()
            } else {
                cwd.join(path)
            };
            if !path.exists() {
                return Err(Error::ConfigNotFound(path));
            }
            Config::load(&path)
        }
        None => Config::discover(cwd),
    }
}

/// Build never packages; release always does.
fn release_options(
    args: BuildArgs,
    package: bool,
    deploy: bool,
    force: bool,
) -> Result<ReleaseOptions> {
    Ok(ReleaseOptions {
        target: args.target,
        build_args: args.args,
        version: commands::parse_version(args.release_version.as_deref())?,
        dry_run: args.dry_run,
        skip_stamp: args.skip_stamp,
        no_restore: args.no_restore,
        package,
        deploy,
        force,
    })
}
