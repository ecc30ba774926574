// ABOUTME: Wire format for helper commands: one JSON object per line in each direction.
// ABOUTME: Requests name a command; responses carry a status (with optional data) or an error.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const PING: &str = "PING";
pub const VERSION: &str = "VERSION";
pub const STATUS: &str = "STATUS";
pub const QUIT: &str = "QUIT";

/// Bumped when a command's request or response shape changes.
pub const API_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub command: String,
    /// Command-specific fields, kept for forward compatibility.
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl Request {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            params: Map::new(),
        }
    }

    pub fn ping() -> Self {
        Self::new(PING)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Error {
        error: String,
    },
    Ok {
        status: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },
}

impl Response {
    pub fn pong() -> Self {
        Self::status("pong")
    }

    pub fn status(status: impl Into<String>) -> Self {
        Response::Ok {
            status: status.into(),
            data: None,
        }
    }

    pub fn ok_with(data: Value) -> Self {
        Response::Ok {
            status: "ok".to_string(),
            data: Some(data),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            error: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }
}

/// Serialize as a single newline-terminated line.
pub fn encode_line<T: Serialize>(message: &T) -> serde_json::Result<String> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}
