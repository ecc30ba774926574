// ABOUTME: Daemon subcommands: run the loopback helper, or discover and query one.
// ABOUTME: The helper advertises its port in a handshake file that ping polls for.

use shipline::config::Config;
use shipline::discovery::protocol::{self, Request};
use shipline::discovery::{DaemonClient, DaemonHelper, DiscoveryError, Response, discover};
use shipline::error::Result;
use shipline::output::Output;
use std::path::PathBuf;

/// Serve helper commands until QUIT or Ctrl-C.
pub async fn serve(config: &Config, port_file: Option<PathBuf>, output: Output) -> Result<()> {
    let port_file = match port_file {
        Some(path) => path,
        None => config.daemon.port_file(&config.app)?,
    };

    let helper = DaemonHelper::bind(&port_file)
        .await?
        .with_idle_timeout(config.daemon.idle_timeout);
    output.progress(&format!(
        "Helper listening on 127.0.0.1:{} (advertised in {})",
        helper.port(),
        helper.port_file().display()
    ));

    let handle = helper.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received");
            handle.shutdown();
        }
    });

    helper.serve().await?;
    output.success("Helper stopped");
    Ok(())
}

/// Wait for a helper to advertise itself, then send one command.
pub async fn ping(
    config: &Config,
    port_file: Option<PathBuf>,
    command: &str,
    output: Output,
) -> Result<()> {
    let port_file = match port_file {
        Some(path) => path,
        None => config.daemon.port_file(&config.app)?,
    };

    output.progress(&format!("Waiting for {}", port_file.display()));
    let handshake = discover(&port_file, &config.daemon.discovery_policy()).await?;
    let client = DaemonClient::for_handshake(&handshake, config.daemon.request_timeout)?;

    let command = command.to_ascii_uppercase();
    if command == protocol::PING {
        client.ping().await?;
        output.success(&format!("Helper on port {} answered pong", client.port()));
        return Ok(());
    }

    match client.send(&Request::new(command.as_str())).await? {
        Response::Error { error } => Err(DiscoveryError::Rejected(error).into()),
        Response::Ok { status, data } => {
            match data {
                Some(data) => output.success(&format!("{command}: {status} {data}")),
                None => output.success(&format!("{command}: {status}")),
            }
            Ok(())
        }
    }
}
