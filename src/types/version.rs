// ABOUTME: Semantic version string validation (major.minor.patch).
// ABOUTME: Rejects empty, non-numeric, and wrongly-shaped version strings.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersionError {
    #[error("version cannot be empty")]
    Empty,

    #[error("version must have exactly three dot-separated parts: {0}")]
    WrongShape(String),

    #[error("invalid numeric component '{part}' in version {input}")]
    NotNumeric { input: String, part: String },
}

/// A `major.minor.patch` version with an optional `+build` suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    major: u64,
    minor: u64,
    patch: u64,
    build: Option<String>,
}

impl Version {
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(VersionError::Empty);
        }

        let (core, build) = match input.split_once('+') {
            Some((core, build)) if !build.is_empty() => (core, Some(build.to_string())),
            Some(_) => return Err(VersionError::WrongShape(input.to_string())),
            None => (input, None),
        };

        let parts: Vec<&str> = core.split('.').collect();
        if parts.len() != 3 {
            return Err(VersionError::WrongShape(input.to_string()));
        }

        let mut numbers = [0u64; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            *slot = part.parse().map_err(|_| VersionError::NotNumeric {
                input: input.to_string(),
                part: part.to_string(),
            })?;
        }

        Ok(Self {
            major: numbers[0],
            minor: numbers[1],
            patch: numbers[2],
            build,
        })
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn patch(&self) -> u64 {
        self.patch
    }

    pub fn build(&self) -> Option<&str> {
        self.build.as_deref()
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Build metadata does not participate in precedence.
impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch))
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(build) = &self.build {
            write!(f, "+{build}")?;
        }
        Ok(())
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Version::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_version() {
        let v = Version::parse("1.2.3").unwrap();
        assert_eq!((v.major(), v.minor(), v.patch()), (1, 2, 3));
        assert_eq!(v.build(), None);
        assert_eq!(v.to_string(), "1.2.3");
    }

    #[test]
    fn parses_build_suffix() {
        let v = Version::parse("3.2.0+7").unwrap();
        assert_eq!(v.build(), Some("7"));
        assert_eq!(v.to_string(), "3.2.0+7");
    }

    #[test]
    fn rejects_two_parts() {
        assert!(matches!(
            Version::parse("1.2"),
            Err(VersionError::WrongShape(_))
        ));
    }

    #[test]
    fn rejects_non_numeric() {
        assert!(matches!(
            Version::parse("1.x.3"),
            Err(VersionError::NotNumeric { .. })
        ));
    }

    #[test]
    fn ordering_ignores_build() {
        let a = Version::parse("1.2.3+1").unwrap();
        let b = Version::parse("1.2.3+9").unwrap();
        let c = Version::parse("1.10.0").unwrap();
        assert_eq!(a.cmp(&b), Ordering::Equal);
        assert!(a < c);
    }
}
