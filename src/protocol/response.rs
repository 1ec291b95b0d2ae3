//! Response definitions
//!
//! Represents one framed reply from varnishadm.

use std::borrow::Cow;

/// Well-known status codes consumed by the client
///
/// Any other code is passed through as a plain number and treated as a
/// failure wherever a specific code is expected.
pub mod status {
    /// Command succeeded
    pub const OK: u16 = 200;

    /// Authentication challenge; the body carries the challenge token
    pub const AUTH: u16 = 107;

    /// Acknowledgement of `quit`
    pub const CLOSE: u16 = 500;
}

/// A single response frame: status code plus a body of exactly the declared length
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Three-digit status code
    pub code: u16,

    /// Raw body bytes (never includes the trailing frame newline)
    pub body: Vec<u8>,
}

impl Response {
    /// Create a response from its parts
    pub fn new(code: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            code,
            body: body.into(),
        }
    }

    /// Whether this is a plain success frame
    pub fn is_ok(&self) -> bool {
        self.code == status::OK
    }

    /// Body decoded as text, replacing invalid UTF-8
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Consume the response and return the body as an owned string
    pub fn into_text(self) -> String {
        match String::from_utf8(self.body) {
            Ok(text) => text,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        }
    }
}
