//! Protocol versions and invalidation dialects
//!
//! varnishadm renamed its invalidation commands between major versions:
//!
//! | major | invalidate | by url      | list         |
//! |-------|------------|-------------|--------------|
//! | 2     | `purge`    | `purge.url` | `purge.list` |
//! | 3     | `ban`      | `ban.url`   | `ban.list`   |
//!
//! The version is configured, never negotiated.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{AdminError, Result};

/// A configured `major.minor` protocol version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct ProtocolVersion {
    pub major: u32,
    pub minor: u32,
}

impl ProtocolVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Resolve the invalidation dialect for this version
    pub fn dialect(&self) -> Result<Dialect> {
        Dialect::for_version(*self)
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::new(2, 1)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for ProtocolVersion {
    type Err = AdminError;

    /// Accepts `"3"`, `"3.0"` and longer tags such as `"2.1.5"`; only major and
    /// minor are kept.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || AdminError::UnsupportedVersion(s.to_string());

        let mut parts = s.trim().split('.');
        let major = parts
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(invalid)?
            .parse()
            .map_err(|_| invalid())?;
        let minor = match parts.next() {
            Some(p) => p.parse().map_err(|_| invalid())?,
            None => 0,
        };

        Ok(Self { major, minor })
    }
}

impl TryFrom<String> for ProtocolVersion {
    type Error = AdminError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Verb family used for invalidation commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Varnish 2.x
    Purge,

    /// Varnish 3.x
    Ban,
}

impl Dialect {
    /// Map a protocol version to its dialect, rejecting unknown majors
    pub fn for_version(version: ProtocolVersion) -> Result<Self> {
        match version.major {
            2 => Ok(Dialect::Purge),
            3 => Ok(Dialect::Ban),
            _ => Err(AdminError::UnsupportedVersion(version.to_string())),
        }
    }

    /// Verb for invalidation by expression
    pub fn invalidate_verb(&self) -> &'static str {
        match self {
            Dialect::Purge => "purge",
            Dialect::Ban => "ban",
        }
    }

    /// Verb for invalidation by URL pattern
    pub fn invalidate_url_verb(&self) -> &'static str {
        match self {
            Dialect::Purge => "purge.url",
            Dialect::Ban => "ban.url",
        }
    }

    /// Verb listing active invalidations
    pub fn list_verb(&self) -> &'static str {
        match self {
            Dialect::Purge => "purge.list",
            Dialect::Ban => "ban.list",
        }
    }
}
