// ABOUTME: Application name validation.
// ABOUTME: Names appear in archive filenames, lock paths, and hook environments.

use serde::{Deserialize, Deserializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AppNameError {
    #[error("app name cannot be empty")]
    Empty,

    #[error("app name exceeds maximum length of 63 characters")]
    TooLong,

    #[error("app name must start with a lowercase letter or digit")]
    BadStart,

    #[error("app name must be lowercase")]
    NotLowercase,

    #[error("invalid character in app name: '{0}'")]
    InvalidChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppName(String);

impl AppName {
    pub fn new(value: &str) -> Result<Self, AppNameError> {
        let Some(first) = value.chars().next() else {
            return Err(AppNameError::Empty);
        };

        if value.len() > 63 {
            return Err(AppNameError::TooLong);
        }

        if !first.is_ascii_lowercase() && !first.is_ascii_digit() {
            return Err(AppNameError::BadStart);
        }

        for c in value.chars() {
            if c.is_ascii_uppercase() {
                return Err(AppNameError::NotLowercase);
            }
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' && c != '_' {
                return Err(AppNameError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for AppName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        AppName::new(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_typical_names() {
        assert!(AppName::new("cloudtolocalllm").is_ok());
        assert!(AppName::new("tray-daemon_2").is_ok());
    }

    #[test]
    fn rejects_uppercase() {
        assert_eq!(AppName::new("MyApp"), Err(AppNameError::NotLowercase));
    }

    #[test]
    fn rejects_leading_hyphen() {
        assert_eq!(AppName::new("-app"), Err(AppNameError::BadStart));
    }

    #[test]
    fn rejects_path_separator() {
        assert_eq!(AppName::new("a/b"), Err(AppNameError::InvalidChar('/')));
    }
}
