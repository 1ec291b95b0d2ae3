//! Admin Connection
//!
//! Owns the socket to one varnishadm endpoint and drives the session:
//! connect (with optional challenge-response auth), half-duplex commands,
//! and close/quit.

use std::fmt;
use std::io::{self, BufReader};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::config::ClientConfig;
use crate::error::{AdminError, Result};
use crate::protocol::{auth, read_response, status, write_line, Dialect, ProtocolVersion, Response};

/// Default varnishadm port
pub const DEFAULT_PORT: u16 = 6082;

/// Socket halves of an established session
struct Session {
    /// Buffered read half; header lines are scanned through it
    reader: BufReader<TcpStream>,

    /// Unbuffered write half so a short write is observable
    writer: TcpStream,
}

/// A session with one varnishadm endpoint
///
/// At most one command may be outstanding at a time. A `Connection` is not
/// meant to be shared between threads without external locking; drive one
/// instance per target server.
pub struct Connection {
    host: String,
    port: u16,
    version: ProtocolVersion,
    dialect: Dialect,

    /// Shared secret for challenge-response auth, used byte-for-byte
    secret: Option<Vec<u8>>,

    /// Live socket, `None` when not connected
    session: Option<Session>,

    /// Banner captured by the last successful connect
    banner: Option<String>,
}

impl Connection {
    /// Create an unconnected client
    ///
    /// Fails with `UnsupportedVersion` when the version has no known dialect;
    /// no socket is opened here.
    pub fn new(host: impl Into<String>, port: u16, version: ProtocolVersion) -> Result<Self> {
        let dialect = Dialect::for_version(version)?;

        Ok(Self {
            host: host.into(),
            port,
            version,
            dialect,
            secret: None,
            session: None,
            banner: None,
        })
    }

    /// Create an unconnected client from a configured target
    pub fn from_config(client: &ClientConfig) -> Result<Self> {
        let mut conn = Self::new(client.host.clone(), client.port, client.version)?;
        conn.secret = client.secret.clone();
        Ok(conn)
    }

    /// Set the shared secret used to answer an authentication challenge
    pub fn with_secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    // =========================================================================
    // Session lifecycle
    // =========================================================================

    /// Open the socket and read the banner, authenticating if challenged
    ///
    /// `timeout` bounds connection establishment and every later read and
    /// write on this session. Returns the banner (the post-auth banner when
    /// authentication took place). On failure the connection is left closed.
    pub fn connect(&mut self, timeout: Duration) -> Result<String> {
        if timeout.is_zero() {
            return Err(AdminError::Config("timeout must be non-zero".to_string()));
        }

        if self.session.is_some() {
            tracing::debug!("Reconnecting to {}:{}", self.host, self.port);
            self.close();
        }

        let stream = self.open_stream(timeout)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;
        self.session = Some(Session {
            reader: BufReader::new(read_stream),
            writer: stream,
        });

        match self.handshake() {
            Ok(banner) => {
                tracing::debug!("Connected to varnishadm on {}:{}", self.host, self.port);
                self.banner = Some(banner.clone());
                Ok(banner)
            }
            Err(e) => {
                self.close();
                Err(e)
            }
        }
    }

    /// Establish the TCP stream, trying each resolved address in turn
    fn open_stream(&self, timeout: Duration) -> Result<TcpStream> {
        let addrs = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|source| self.connection_error(source))?;

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    tracing::debug!("Connect to {} failed: {}", addr, e);
                    last_err = Some(e);
                }
            }
        }

        match last_err {
            Some(e) if e.kind() == io::ErrorKind::TimedOut => Err(AdminError::Timeout(format!(
                "connecting to varnishadm on {}:{} after {:?}",
                self.host, self.port, timeout
            ))),
            Some(e) => Err(self.connection_error(e)),
            None => Err(self.connection_error(io::Error::new(
                io::ErrorKind::NotFound,
                "host resolved to no addresses",
            ))),
        }
    }

    fn connection_error(&self, source: io::Error) -> AdminError {
        AdminError::Connection {
            host: self.host.clone(),
            port: self.port,
            source,
        }
    }

    /// Consume the greeting frame
    fn handshake(&mut self) -> Result<String> {
        let greeting = self.read()?;

        match greeting.code {
            status::OK => Ok(greeting.into_text()),
            status::AUTH => self.authenticate(&greeting.body),
            code => Err(AdminError::Protocol(format!(
                "Bad response from varnishadm on {}:{}: code {}",
                self.host, self.port, code
            ))),
        }
    }

    /// Answer a 107 challenge; the 200 body that follows is the banner
    fn authenticate(&mut self, challenge_body: &[u8]) -> Result<String> {
        let credential = {
            let secret = self.secret.as_deref().ok_or_else(|| AdminError::AuthRequired {
                host: self.host.clone(),
                port: self.port,
            })?;
            auth::credential(auth::challenge(challenge_body)?, secret)
        };

        tracing::debug!("Authenticating with varnishadm on {}:{}", self.host, self.port);

        match self.command(&auth::auth_command(&credential), status::OK) {
            Ok(banner) => Ok(banner),
            Err(AdminError::Command { code, body, .. }) => Err(AdminError::AuthFailed { code, body }),
            Err(e) => Err(e),
        }
    }

    /// Drop the socket without telling the server
    ///
    /// Idempotent and safe on a never-connected client.
    pub fn close(&mut self) {
        if let Some(session) = self.session.take() {
            // Peer may already be gone; dropping the halves releases the fd regardless
            let _ = session.writer.shutdown(Shutdown::Both);
            tracing::debug!("Closed connection to {}:{}", self.host, self.port);
        }
    }

    /// Send `quit`, then close
    ///
    /// Failures of the quit command are logged and swallowed; the socket is
    /// released in every case.
    pub fn quit(&mut self) {
        if let Err(e) = self.command("quit", status::CLOSE) {
            tracing::warn!("quit on {}:{} failed: {}", self.host, self.port, e);
        }
        self.close();
    }

    // =========================================================================
    // Command dispatch
    // =========================================================================

    /// Send one command and require `expected` as the response code
    ///
    /// An empty `verb` sends a bare newline. On a mismatched code the error
    /// carries the verb, the code and the body exactly as received.
    pub fn command(&mut self, verb: &str, expected: u16) -> Result<String> {
        let response = self.request(verb)?;

        if response.code != expected {
            return Err(AdminError::Command {
                verb: verb.to_string(),
                code: response.code,
                body: response.body,
            });
        }

        Ok(response.into_text())
    }

    /// Write a command line and read its response, without checking the code
    pub fn request(&mut self, verb: &str) -> Result<Response> {
        let session = self.session.as_mut().ok_or(AdminError::NotConnected)?;

        // Only the verb keyword is logged; arguments may hold credentials
        tracing::debug!(
            "{}:{} <- {}",
            self.host,
            self.port,
            verb.split(' ').next().unwrap_or_default()
        );

        write_line(&mut session.writer, verb)?;
        read_response(&mut session.reader)
    }

    fn read(&mut self) -> Result<Response> {
        let session = self.session.as_mut().ok_or(AdminError::NotConnected)?;
        read_response(&mut session.reader)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port`, as used in log lines and reports
    pub fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Invalidation dialect resolved from the configured version
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Banner captured by the last successful connect
    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }
}

// The secret stays out of debug output
impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("version", &self.version)
            .field("dialect", &self.dialect)
            .field("has_secret", &self.secret.is_some())
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}
