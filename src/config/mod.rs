// ABOUTME: Configuration types and parsing for shipline.yml.
// ABOUTME: One value built at startup and passed explicitly to every component.

mod healthcheck;
mod init;
mod server;
mod stamp;

pub use healthcheck::HealthcheckConfig;
pub use init::{init_config, template_yaml};
pub use server::ServerConfig;
pub use stamp::{StampConfig, StampFileConfig, StampKeys, VersionFileFormat};

use crate::error::{Error, Result};
use crate::poll::PollPolicy;
use crate::types::{AppName, Version};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "shipline.yml";
pub const CONFIG_FILENAME_ALT: &str = "shipline.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".shipline/config.yml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppName,

    pub version: Version,

    pub stamp: StampConfig,

    pub build: BuildConfig,

    #[serde(default)]
    pub package: PackageConfig,

    #[serde(default)]
    pub deploy: Option<DeployConfig>,

    #[serde(default)]
    pub daemon: DaemonConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildConfig {
    /// Build tool argv; the target name and passthrough arguments are appended.
    pub command: Vec<String>,
    pub output_dir: PathBuf,
    /// Entry that must exist in the build output, relative to `output_dir`.
    pub primary_executable: PathBuf,
    /// The build is killed and fails once this has passed.
    #[serde(default = "default_build_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

pub const DEFAULT_BUILD_TIMEOUT: Duration = Duration::from_secs(30 * 60);

fn default_build_timeout() -> Duration {
    DEFAULT_BUILD_TIMEOUT
}

#[derive(Debug, Clone, Deserialize)]
pub struct PackageConfig {
    #[serde(default = "default_dist_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub arch: Option<String>,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            output_dir: default_dist_dir(),
            arch: None,
        }
    }
}

fn default_dist_dir() -> PathBuf {
    PathBuf::from("dist")
}

impl PackageConfig {
    pub fn arch(&self) -> String {
        self.arch
            .clone()
            .unwrap_or_else(|| crate::package::host_arch().to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeployConfig {
    #[serde(deserialize_with = "deserialize_server")]
    pub server: ServerConfig,

    /// Checkout on the remote host that is synced and restarted.
    pub remote_dir: PathBuf,

    #[serde(default = "default_git_remote")]
    pub git_remote: String,

    #[serde(default = "default_branch")]
    pub branch: String,

    /// Bound on each local git call, `git push` included.
    #[serde(default = "default_push_timeout", with = "humantime_serde")]
    pub push_timeout: Duration,

    #[serde(default = "default_restart")]
    pub restart: Vec<String>,

    /// Container whose status gates the HTTP probe.
    pub container: String,

    pub health: HealthcheckConfig,
}

fn default_git_remote() -> String {
    "origin".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_push_timeout() -> Duration {
    crate::vcs::DEFAULT_GIT_TIMEOUT
}

fn default_restart() -> Vec<String> {
    ["docker", "compose", "up", "-d", "--build"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    /// Handshake file; defaults to `<config dir>/<app>/tray_port`.
    #[serde(default)]
    pub port_file: Option<PathBuf>,

    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    #[serde(default = "default_discovery_timeout", with = "humantime_serde")]
    pub discovery_timeout: Duration,

    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// The helper closes a connection that sends nothing for this long.
    #[serde(default = "default_idle_timeout", with = "humantime_serde")]
    pub idle_timeout: Duration,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            port_file: None,
            poll_interval: default_poll_interval(),
            discovery_timeout: default_discovery_timeout(),
            request_timeout: default_request_timeout(),
            idle_timeout: default_idle_timeout(),
        }
    }
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_discovery_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(2)
}

fn default_idle_timeout() -> Duration {
    Duration::from_secs(60)
}

impl DaemonConfig {
    pub fn discovery_policy(&self) -> PollPolicy {
        PollPolicy::new(self.poll_interval, self.discovery_timeout)
    }

    /// Resolve the handshake file path for `app`.
    pub fn port_file(&self, app: &AppName) -> Result<PathBuf> {
        match &self.port_file {
            Some(path) => Ok(path.clone()),
            None => crate::discovery::default_port_file(app).ok_or_else(|| {
                Error::InvalidConfig(
                    "cannot determine the user configuration directory; set daemon.port_file"
                        .to_string(),
                )
            }),
        }
    }
}

impl Config {
    /// Local git, bounded by the deploy section's push timeout when there is one.
    pub fn git(&self, root: &Path) -> crate::vcs::GitCli {
        let git = crate::vcs::GitCli::new(root);
        match &self.deploy {
            Some(deploy) => git.with_timeout(deploy.push_timeout),
            None => git,
        }
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                tracing::debug!("loading configuration from {}", path.display());
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// The deploy section, or an error naming what is missing.
    pub fn deploy(&self) -> Result<&DeployConfig> {
        self.deploy
            .as_ref()
            .ok_or_else(|| Error::InvalidConfig("no deploy section configured".to_string()))
    }

    fn validate(&self) -> Result<()> {
        if self.build.command.is_empty() {
            return Err(Error::InvalidConfig(
                "build.command must name a program".to_string(),
            ));
        }
        if let Some(deploy) = &self.deploy {
            if deploy.restart.is_empty() {
                return Err(Error::InvalidConfig(
                    "deploy.restart must name a program".to_string(),
                ));
            }
            if deploy.container.trim().is_empty() {
                return Err(Error::InvalidConfig(
                    "deploy.container cannot be empty".to_string(),
                ));
            }
            if !deploy.health.url.starts_with("http://") {
                return Err(Error::InvalidConfig(format!(
                    "deploy.health.url must be an http:// URL, got {}",
                    deploy.health.url
                )));
            }
        }
        Ok(())
    }
}

// Custom deserializers

fn deserialize_server<'de, D>(deserializer: D) -> std::result::Result<ServerConfig, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match ServerEntry::deserialize(deserializer)? {
        ServerEntry::Simple(s) => ServerConfig::parse(&s).map_err(serde::de::Error::custom),
        ServerEntry::Detailed(c) => Ok(c),
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ServerEntry {
    Simple(String),
    Detailed(ServerConfig),
}
