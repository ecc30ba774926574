// ABOUTME: Version-control revision identifier.
// ABOUTME: Compared byte-for-byte; only surrounding whitespace is stripped on construction.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommitIdError {
    #[error("commit id cannot be empty")]
    Empty,

    #[error("commit id contains whitespace: {0:?}")]
    ContainsWhitespace(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommitId(String);

impl CommitId {
    pub fn new(value: &str) -> Result<Self, CommitIdError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(CommitIdError::Empty);
        }
        if value.chars().any(char::is_whitespace) {
            return Err(CommitIdError::ContainsWhitespace(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First seven characters, as shown in progress output.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(7)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl TryFrom<String> for CommitId {
    type Error = CommitIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CommitId::new(&value)
    }
}

impl From<CommitId> for String {
    fn from(id: CommitId) -> Self {
        id.0
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
