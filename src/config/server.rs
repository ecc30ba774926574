// ABOUTME: Deploy host configuration for SSH connections.
// ABOUTME: Parses formats like "host", "user@host", "host:port", "user@host:port".

use serde::Deserialize;
use std::path::PathBuf;

use crate::ssh::SessionConfig;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub key_path: Option<PathBuf>,
    #[serde(default)]
    pub trust_first_connection: bool,
}

fn default_port() -> u16 {
    22
}

impl ServerConfig {
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("server address cannot be empty".to_string());
        }

        // [user@]host[:port]
        let (user_part, rest) = match s.split_once('@') {
            Some((user, rest)) => (Some(user), rest),
            None => (None, s),
        };

        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port_str)) => {
                let port = port_str
                    .parse::<u16>()
                    .map_err(|_| format!("invalid port: {}", port_str))?;
                (host, port)
            }
            None => (rest, default_port()),
        };

        if host.is_empty() {
            return Err("hostname cannot be empty".to_string());
        }
        if user_part == Some("") {
            return Err("user cannot be empty".to_string());
        }

        Ok(ServerConfig {
            host: host.to_string(),
            port,
            user: user_part.map(|s| s.to_string()),
            key_path: None,
            trust_first_connection: false,
        })
    }

    /// User to log in as, falling back to `$USER` and then `root`.
    pub fn login_user(&self) -> String {
        self.user
            .clone()
            .unwrap_or_else(|| std::env::var("USER").unwrap_or_else(|_| "root".to_string()))
    }

    /// `user@host:port`, as shown in progress output.
    pub fn target(&self) -> String {
        format!("{}@{}:{}", self.login_user(), self.host, self.port)
    }

    pub fn ssh_session_config(&self) -> SessionConfig {
        let mut config = SessionConfig::new(&self.host, self.login_user())
            .port(self.port)
            .trust_on_first_use(self.trust_first_connection);
        if let Some(key) = &self.key_path {
            config = config.key_path(key.clone());
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_host() {
        let server = ServerConfig::parse("example.com").unwrap();
        assert_eq!(server.host, "example.com");
        assert_eq!(server.port, 22);
        assert_eq!(server.user, None);
    }

    #[test]
    fn parses_user_host_port() {
        let server = ServerConfig::parse("deploy@10.0.0.5:2222").unwrap();
        assert_eq!(server.host, "10.0.0.5");
        assert_eq!(server.port, 2222);
        assert_eq!(server.user.as_deref(), Some("deploy"));
    }

    #[test]
    fn rejects_bad_port() {
        assert!(ServerConfig::parse("host:ssh").is_err());
        assert!(ServerConfig::parse("host:70000").is_err());
    }

    #[test]
    fn rejects_empty_parts() {
        assert!(ServerConfig::parse("").is_err());
        assert!(ServerConfig::parse("@host").is_err());
        assert!(ServerConfig::parse("user@:22").is_err());
    }
}
