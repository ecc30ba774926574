// ABOUTME: russh-backed session to the deploy host.
// ABOUTME: Verifies the host key, authenticates, and runs RemoteCommands with bounded waits.

use super::command::{CommandOutput, RemoteCommand, RemoteExec};
use super::error::{Error, Result};
use async_trait::async_trait;
use russh::client::{self, Config, Handle};
use russh::keys::agent::client::AgentClient;
use russh::keys::known_hosts::{check_known_hosts, learn_known_hosts};
use russh::keys::{PrivateKeyWithHashAlg, load_secret_key, ssh_key};
use russh::{ChannelMsg, Disconnect};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::UnixStream;

/// Keys tried, in order, when neither a key file nor an agent is available.
const DEFAULT_KEYS: [&str; 3] = ["id_ed25519", "id_ecdsa", "id_rsa"];

/// Where and how to connect.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    /// Private key to use instead of the agent and the default keys.
    pub key_path: Option<PathBuf>,
    /// Accept and record a host key missing from known_hosts. A changed key is
    /// always rejected.
    pub trust_on_first_use: bool,
    /// Bound on TCP connect plus the SSH handshake.
    pub connect_timeout: Duration,
    /// Bound on each remote command.
    pub command_timeout: Duration,
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            user: user.into(),
            key_path: None,
            trust_on_first_use: false,
            connect_timeout: Duration::from_secs(15),
            command_timeout: Duration::from_secs(300),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_path = Some(path.into());
        self
    }

    pub fn trust_on_first_use(mut self, trust: bool) -> Self {
        self.trust_on_first_use = trust;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// `user@host:port`.
    pub fn target(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.port)
    }
}

/// Checks the server key against `~/.ssh/known_hosts`.
struct HostKeyCheck {
    host: String,
    port: u16,
    trust_on_first_use: bool,
    rejected: Arc<AtomicBool>,
}

impl HostKeyCheck {
    fn accept_unknown(&self, key: &ssh_key::PublicKey) -> bool {
        if !self.trust_on_first_use {
            return false;
        }
        tracing::warn!(
            "trusting unknown host key for {}:{} on first connection",
            self.host,
            self.port
        );
        if let Err(e) = learn_known_hosts(&self.host, self.port, key) {
            tracing::warn!("could not record host key in known_hosts: {}", e);
        }
        true
    }
}

impl client::Handler for HostKeyCheck {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let accepted = match check_known_hosts(&self.host, self.port, server_public_key) {
            Ok(true) => true,
            Ok(false) => self.accept_unknown(server_public_key),
            Err(russh::keys::Error::KeyChanged { line }) => {
                tracing::error!(
                    "host key for {}:{} differs from known_hosts line {}",
                    self.host,
                    self.port,
                    line
                );
                false
            }
            Err(e) => {
                tracing::debug!("known_hosts unreadable ({}), treating host as unknown", e);
                self.accept_unknown(server_public_key)
            }
        };
        if !accepted {
            self.rejected.store(true, Ordering::SeqCst);
        }
        Ok(accepted)
    }
}

enum Credentials {
    Agent(AgentClient<UnixStream>),
    Key(Arc<ssh_key::PrivateKey>),
}

/// An authenticated connection to the deploy host.
pub struct Session {
    config: SessionConfig,
    handle: Handle<HostKeyCheck>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("target", &self.config.target())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Connect and authenticate, failing within `config.connect_timeout`.
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        let credentials = credentials(&config).await?;
        let target = config.target();
        let rejected = Arc::new(AtomicBool::new(false));

        let handler = HostKeyCheck {
            host: config.host.clone(),
            port: config.port,
            trust_on_first_use: config.trust_on_first_use,
            rejected: Arc::clone(&rejected),
        };
        let russh_config = Arc::new(Config {
            inactivity_timeout: Some(Duration::from_secs(30)),
            ..Default::default()
        });

        let connecting = client::connect(russh_config, (config.host.as_str(), config.port), handler);
        let mut handle = match tokio::time::timeout(config.connect_timeout, connecting).await {
            Ok(Ok(handle)) => handle,
            Ok(Err(_)) if rejected.load(Ordering::SeqCst) => {
                return Err(Error::HostKeyRejected { target });
            }
            Ok(Err(e)) => {
                return Err(Error::Connect {
                    target,
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                return Err(Error::ConnectTimeout {
                    target,
                    timeout: config.connect_timeout,
                });
            }
        };

        if !authenticate(&mut handle, &config.user, credentials).await? {
            return Err(Error::AuthenticationFailed {
                user: config.user.clone(),
                target: format!("{}:{}", config.host, config.port),
            });
        }
        tracing::debug!("SSH session established to {}", target);

        Ok(Self { config, handle })
    }

    async fn exec(&self, line: &str, stdin: Option<&str>) -> Result<CommandOutput> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| Error::Channel(format!("cannot open session channel: {e}")))?;
        channel
            .exec(true, line)
            .await
            .map_err(|e| Error::Channel(format!("exec request refused: {e}")))?;
        if let Some(input) = stdin {
            channel
                .data(input.as_bytes())
                .await
                .map_err(|e| Error::Channel(format!("cannot write stdin: {e}")))?;
        }
        channel
            .eof()
            .await
            .map_err(|e| Error::Channel(format!("cannot close stdin: {e}")))?;

        let mut collected = Collected::default();
        while let Some(msg) = channel.wait().await {
            if collected.absorb(msg) {
                break;
            }
        }
        collected.finish(line)
    }

    /// Close the session politely.
    pub async fn disconnect(self) -> Result<()> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteExec for Session {
    async fn run(&self, command: &RemoteCommand) -> Result<CommandOutput> {
        let line = command.to_shell();
        tracing::debug!(target = %self.config.target(), "exec: {}", line);

        let timeout = self.config.command_timeout;
        let output = tokio::time::timeout(timeout, self.exec(&line, command.stdin.as_deref()))
            .await
            .map_err(|_| Error::CommandTimeout {
                command: command.to_string(),
                timeout,
            })??;

        if !output.success() {
            tracing::debug!(exit_code = output.exit_code, "'{}' failed: {}", command, output.stderr.trim());
        }
        Ok(output)
    }

    fn target(&self) -> String {
        self.config.target()
    }
}

/// Output gathered from one exec channel.
#[derive(Debug, Default)]
struct Collected {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    exit_code: Option<u32>,
    eof: bool,
}

impl Collected {
    /// Fold in one message. Returns true once nothing more is expected.
    fn absorb(&mut self, msg: ChannelMsg) -> bool {
        match msg {
            ChannelMsg::Data { data } => self.stdout.extend_from_slice(&data),
            ChannelMsg::ExtendedData { data, ext: 1 } => self.stderr.extend_from_slice(&data),
            ChannelMsg::ExitStatus { exit_status } => {
                self.exit_code = Some(exit_status);
                return self.eof;
            }
            ChannelMsg::Eof => {
                self.eof = true;
                return self.exit_code.is_some();
            }
            ChannelMsg::Close => return true,
            _ => {}
        }
        false
    }

    fn finish(self, line: &str) -> Result<CommandOutput> {
        let exit_code = self
            .exit_code
            .ok_or_else(|| Error::ChannelClosed(line.to_string()))?;
        Ok(CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&self.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&self.stderr).into_owned(),
        })
    }
}

/// Configured key, then the agent, then the first readable default key.
async fn credentials(config: &SessionConfig) -> Result<Credentials> {
    if let Some(path) = &config.key_path {
        let key = load_secret_key(path, None).map_err(|e| Error::KeyLoad {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        return Ok(Credentials::Key(Arc::new(key)));
    }

    match AgentClient::connect_env().await {
        Ok(agent) => return Ok(Credentials::Agent(agent)),
        Err(e) => tracing::debug!("no SSH agent: {}", e),
    }

    let ssh_dir = dirs::home_dir()
        .map(|home| home.join(".ssh"))
        .ok_or_else(|| Error::NoCredentials("no agent and no home directory".to_string()))?;
    DEFAULT_KEYS
        .iter()
        .map(|name| ssh_dir.join(name))
        .find_map(|path| load_secret_key(&path, None).ok())
        .map(|key| Credentials::Key(Arc::new(key)))
        .ok_or_else(|| {
            Error::NoCredentials(format!("no agent and no usable key in {}", ssh_dir.display()))
        })
}

async fn authenticate(
    handle: &mut Handle<HostKeyCheck>,
    user: &str,
    credentials: Credentials,
) -> Result<bool> {
    match credentials {
        Credentials::Agent(mut agent) => {
            let identities = agent
                .request_identities()
                .await
                .map_err(|e| Error::NoCredentials(format!("cannot list agent keys: {e}")))?;
            if identities.is_empty() {
                return Err(Error::NoCredentials("the SSH agent holds no keys".to_string()));
            }
            for key in identities {
                match handle
                    .authenticate_publickey_with(user, key, None, &mut agent)
                    .await
                {
                    Ok(result) if result.success() => return Ok(true),
                    Ok(_) => continue,
                    Err(e) => tracing::debug!("agent key refused: {:?}", e),
                }
            }
            Ok(false)
        }
        Credentials::Key(key) => {
            let hash_alg = handle.best_supported_rsa_hash().await?.flatten();
            let result = handle
                .authenticate_publickey(user, PrivateKeyWithHashAlg::new(key, hash_alg))
                .await?;
            Ok(result.success())
        }
    }
}
