// ABOUTME: The handshake file through which the helper advertises its port.
// ABOUTME: Reads yield an explicit Absent/Advertised/Corrupt state rather than a boolean.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::types::AppName;

pub const PORT_FILENAME: &str = "tray_port";

/// `<user config dir>/<app>/tray_port`, if the platform has a config dir.
pub fn default_port_file(app: &AppName) -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(app.as_str()).join(PORT_FILENAME))
}

/// What a reader found at the handshake path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeState {
    /// No file; the helper has not started or has shut down cleanly.
    Absent,
    /// A port is advertised. The helper may still have died since writing it.
    Advertised { port: u16, age: Option<Duration> },
    /// The file exists but does not hold a positive port number.
    Corrupt { contents: String },
}

/// A resolved rendezvous with a helper process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonHandshake {
    pub port_file: PathBuf,
    pub port: Option<u16>,
    /// Helper pid, known once the helper has identified itself.
    pub pid: Option<u32>,
}

impl DaemonHandshake {
    pub fn new(port_file: impl Into<PathBuf>) -> Self {
        Self {
            port_file: port_file.into(),
            port: None,
            pid: None,
        }
    }

    /// Inspect the handshake file once.
    pub fn read(path: &Path) -> std::io::Result<HandshakeState> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HandshakeState::Absent),
            Err(e) => return Err(e),
        };

        match parse_port(&contents) {
            Some(port) => {
                let age = std::fs::metadata(path)
                    .and_then(|m| m.modified())
                    .ok()
                    .and_then(|written| SystemTime::now().duration_since(written).ok());
                Ok(HandshakeState::Advertised { port, age })
            }
            None => Ok(HandshakeState::Corrupt {
                contents: contents.trim().to_string(),
            }),
        }
    }

    /// Advertise `port`. The number is written to a sibling file and renamed
    /// into place so a reader never sees a partial value.
    pub fn write(path: &Path, port: u16) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, port.to_string())?;
        std::fs::rename(&tmp, path)
    }

    /// Withdraw the advertisement. A missing file is not an error.
    pub fn remove(path: &Path) -> std::io::Result<()> {
        match std::fs::remove_file(path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// Decimal port number, surrounding whitespace allowed. Zero is rejected.
pub fn parse_port(contents: &str) -> Option<u16> {
    contents.trim().parse::<u16>().ok().filter(|port| *port > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_positive_ports_only() {
        assert_eq!(parse_port("54321"), Some(54321));
        assert_eq!(parse_port(" 8080\n"), Some(8080));
        assert_eq!(parse_port("0"), None);
        assert_eq!(parse_port("-1"), None);
        assert_eq!(parse_port("70000"), None);
        assert_eq!(parse_port("port=1"), None);
        assert_eq!(parse_port(""), None);
    }

    #[test]
    fn read_distinguishes_states() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tray_port");
        assert_eq!(DaemonHandshake::read(&path).unwrap(), HandshakeState::Absent);

        DaemonHandshake::write(&path, 4242).unwrap();
        assert!(matches!(
            DaemonHandshake::read(&path).unwrap(),
            HandshakeState::Advertised { port: 4242, .. }
        ));

        std::fs::write(&path, "garbage").unwrap();
        assert_eq!(
            DaemonHandshake::read(&path).unwrap(),
            HandshakeState::Corrupt {
                contents: "garbage".to_string()
            }
        );
    }

    #[test]
    fn write_creates_parent_and_remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tray_port");
        DaemonHandshake::write(&path, 1234).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1234");
        DaemonHandshake::remove(&path).unwrap();
        DaemonHandshake::remove(&path).unwrap();
        assert!(!path.exists());
    }
}
