//! Configuration for varnish-admin
//!
//! Typed target lists with sensible defaults, loadable from TOML or from the
//! legacy single-line client list format.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use percent_encoding::percent_decode_str;
use serde::Deserialize;

use crate::client::DEFAULT_PORT;
use crate::error::{AdminError, Result};
use crate::protocol::ProtocolVersion;

/// Default connect/read timeout (seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// One varnishadm endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Host name or address varnishadm listens on
    pub host: String,

    /// Admin port
    pub port: u16,

    /// Protocol version; selects the invalidation dialect
    pub version: ProtocolVersion,

    /// Shared secret for challenge-response auth (raw bytes, trailing
    /// newline included if the secret file has one)
    pub secret: Option<Vec<u8>>,
}

impl ClientConfig {
    /// Target on the default port and version, without a secret
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            version: ProtocolVersion::default(),
            secret: None,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn version(mut self, version: ProtocolVersion) -> Self {
        self.version = version;
        self
    }

    pub fn secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// `host:port`
    pub fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Main configuration: the targets and how to talk to them
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Targets
    // -------------------------------------------------------------------------
    /// Endpoints, processed in order
    pub clients: Vec<ClientConfig>,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// Applied to connect and to every read and write
    pub timeout: Duration,

    // -------------------------------------------------------------------------
    // Invalidation
    // -------------------------------------------------------------------------
    /// Optional `req.http.host` regex appended to URL invalidations
    pub host_pattern: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            clients: Vec::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            host_pattern: None,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load a TOML config file
    ///
    /// Relative `secret_file` paths resolve against the config file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            AdminError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        parse_toml(&text, path.parent())
    }

    /// Parse a TOML config document
    ///
    /// ```toml
    /// timeout_secs = 3
    /// host_pattern = 'example\.com$'
    ///
    /// [[clients]]
    /// host = "10.0.0.1"
    /// port = 6082
    /// version = "3.0"
    /// secret_file = "/etc/varnish/secret"
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self> {
        parse_toml(text, None)
    }

    /// Build a config from the legacy text formats
    ///
    /// See [`parse_clients`] and [`parse_secrets`].
    pub fn from_legacy(clients: &str, secrets: Option<&str>) -> Result<Self> {
        let mut clients = parse_clients(clients)?;
        if let Some(raw) = secrets {
            attach_secrets(&mut clients, parse_secrets(raw));
        }
        Ok(Self {
            clients,
            ..Self::default()
        })
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Append a target
    pub fn client(mut self, client: ClientConfig) -> Self {
        self.config.clients.push(client);
        self
    }

    /// Append several targets
    pub fn clients(mut self, clients: impl IntoIterator<Item = ClientConfig>) -> Self {
        self.config.clients.extend(clients);
        self
    }

    /// Set the connect/read timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the host pattern for URL invalidations
    pub fn host_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.host_pattern = Some(pattern.into());
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

// =============================================================================
// TOML
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    timeout_secs: Option<u64>,
    host_pattern: Option<String>,
    #[serde(default)]
    clients: Vec<RawClient>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawClient {
    host: String,
    port: Option<u16>,
    #[serde(default)]
    version: ProtocolVersion,
    secret: Option<String>,
    secret_file: Option<PathBuf>,
}

fn parse_toml(text: &str, base_dir: Option<&Path>) -> Result<Config> {
    let raw: RawConfig =
        toml::from_str(text).map_err(|e| AdminError::Config(format!("invalid config: {}", e)))?;

    let timeout = match raw.timeout_secs {
        Some(0) => return Err(AdminError::Config("timeout_secs must be non-zero".to_string())),
        Some(secs) => Duration::from_secs(secs),
        None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
    };

    let clients = raw
        .clients
        .into_iter()
        .map(|client| resolve_client(client, base_dir))
        .collect::<Result<Vec<_>>>()?;

    Ok(Config {
        clients,
        timeout,
        host_pattern: raw.host_pattern.filter(|p| !p.is_empty()),
    })
}

fn resolve_client(raw: RawClient, base_dir: Option<&Path>) -> Result<ClientConfig> {
    if raw.host.trim().is_empty() {
        return Err(AdminError::Config("client host must not be empty".to_string()));
    }
    raw.version.dialect()?;

    let secret = match (raw.secret, raw.secret_file) {
        (Some(_), Some(_)) => {
            return Err(AdminError::Config(format!(
                "client {}: set either secret or secret_file, not both",
                raw.host
            )))
        }
        (Some(secret), None) => Some(secret.into_bytes()),
        (None, Some(file)) => Some(read_secret_file(&file, base_dir)?),
        (None, None) => None,
    };

    Ok(ClientConfig {
        host: raw.host,
        port: raw.port.unwrap_or(DEFAULT_PORT),
        version: raw.version,
        secret,
    })
}

/// Read a varnishd `-S` secret file verbatim
pub fn read_secret_file(path: &Path, base_dir: Option<&Path>) -> Result<Vec<u8>> {
    let path = match base_dir {
        Some(dir) if path.is_relative() => dir.join(path),
        _ => path.to_path_buf(),
    };
    fs::read(&path).map_err(|e| {
        AdminError::Config(format!("cannot read secret file {}: {}", path.display(), e))
    })
}

// =============================================================================
// Legacy text formats
// =============================================================================

/// Parse a legacy client list
///
/// Records are separated by whitespace, commas or semicolons; each record is
/// `host[:port[:version]]`. Port defaults to 6082 and version to 2.1.
pub fn parse_clients(raw: &str) -> Result<Vec<ClientConfig>> {
    raw.split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .filter(|record| !record.is_empty())
        .map(parse_client_record)
        .collect()
}

fn parse_client_record(record: &str) -> Result<ClientConfig> {
    let mut fields = record.splitn(3, ':');

    let host = fields.next().unwrap_or_default();
    if host.is_empty() {
        return Err(AdminError::Config(format!("missing host in client '{}'", record)));
    }

    let port = match fields.next() {
        Some(p) if !p.is_empty() => p
            .parse()
            .map_err(|_| AdminError::Config(format!("invalid port in client '{}'", record)))?,
        _ => DEFAULT_PORT,
    };

    let version = match fields.next() {
        Some(v) if !v.is_empty() => v.parse()?,
        _ => ProtocolVersion::default(),
    };
    version.dialect()?;

    Ok(ClientConfig {
        host: host.to_string(),
        port,
        version,
        secret: None,
    })
}

/// Parse a legacy percent-encoded secret list
///
/// Tokens are separated by runs of any character outside `[A-Za-z0-9_.~%-]`
/// and percent-decoded, so a secret file's trailing newline survives as `%0A`.
pub fn parse_secrets(raw: &str) -> Vec<Vec<u8>> {
    raw.split(|c: char| !is_secret_char(c))
        .filter(|token| !token.is_empty())
        .map(|token| percent_decode_str(token).collect())
        .collect()
}

fn is_secret_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '~' | '%')
}

/// Pair secrets with clients by position; extra secrets are ignored
pub fn attach_secrets(clients: &mut [ClientConfig], secrets: Vec<Vec<u8>>) {
    for (client, secret) in clients.iter_mut().zip(secrets) {
        if !secret.is_empty() {
            client.secret = Some(secret);
        }
    }
}
