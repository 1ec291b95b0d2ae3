//! Error types for varnish-admin
//!
//! Provides a unified error type for every admin-socket operation.

use thiserror::Error;

/// Result type alias using AdminError
pub type Result<T> = std::result::Result<T, AdminError>;

/// Unified error type for admin-socket operations
#[derive(Debug, Error)]
pub enum AdminError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Transport Errors
    // -------------------------------------------------------------------------
    #[error("Failed to connect to varnishadm on {host}:{port}: {source}")]
    Connection {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Not connected")]
    NotConnected,

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// `body` holds the response bytes exactly as the server sent them
    #[error("{}", format_command_failure(.verb, .code, .body))]
    Command { verb: String, code: u16, body: Vec<u8> },

    // -------------------------------------------------------------------------
    // Authentication Errors
    // -------------------------------------------------------------------------
    #[error("Authentication required by varnishadm on {host}:{port} but no secret is configured")]
    AuthRequired { host: String, port: u16 },

    #[error("Authentication failed (code {code}): {}", String::from_utf8_lossy(.body).trim())]
    AuthFailed { code: u16, body: Vec<u8> },

    // -------------------------------------------------------------------------
    // Server State Errors
    // -------------------------------------------------------------------------
    #[error("Varnish server stopped on host {0}")]
    ChildStopped(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AdminError {
    /// Map a socket-level I/O error, turning read/write deadline expiry into `Timeout`
    pub(crate) fn from_socket(err: std::io::Error, context: &str) -> Self {
        match err.kind() {
            // Unix reports an expired SO_RCVTIMEO as WouldBlock, Windows as TimedOut
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => {
                AdminError::Timeout(format!("{}: {}", context, err))
            }
            _ => AdminError::Io(err),
        }
    }

    /// True for errors caused by an elapsed deadline
    pub fn is_timeout(&self) -> bool {
        matches!(self, AdminError::Timeout(_))
    }
}

/// Render a rejected command the way varnishadm users expect to read it:
/// the verb, then each body line prefixed with a continuation marker.
fn format_command_failure(verb: &str, code: &u16, body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let lines: Vec<&str> = text.trim().split('\n').collect();
    format!(
        "{}\n - Command responded {}:\n > {}",
        verb,
        code,
        lines.join("\n > ")
    )
}
