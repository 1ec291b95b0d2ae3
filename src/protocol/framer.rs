//! Protocol framer
//!
//! Byte-exact reading and writing of varnishadm frames over a blocking stream.
//!
//! ## Wire Format
//!
//! ### Request Format
//! ```text
//! <verb> [args...]\n
//! ```
//!
//! ### Response Format
//! ```text
//! ┌────────────┬───┬──────────────┬────┬──────────────────────┬────┐
//! │ Status (3) │ ␠ │ Length (dec) │ \n │  Body (Length bytes) │ \n │
//! └────────────┴───┴──────────────┴────┴──────────────────────┴────┘
//! ```
//!
//! The header line may be padded with spaces after the length. The newline
//! following the body is not counted in the length; it is skipped as a
//! non-header line when the next response is read.

use std::io::{self, BufRead, ErrorKind, Read, Write};

use once_cell::sync::Lazy;
use regex::bytes::Regex;

use super::Response;
use crate::error::{AdminError, Result};

/// Command terminator
pub const LINE_TERMINATOR: u8 = b'\n';

/// Maximum accepted body size (16 MB)
pub const MAX_BODY_SIZE: usize = 16 * 1024 * 1024;

/// Maximum length of a header or chatter line, terminator included
pub const MAX_HEADER_LINE: usize = 1024;

/// Header line: three-digit code, a space, decimal body length
static HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{3}) (\d+)").expect("header pattern is a valid regex")
});

// =============================================================================
// Writing
// =============================================================================

/// Write one command line followed by the terminator
///
/// The line goes out in a single write call. A short write is reported as an
/// I/O error and never retried.
pub fn write_line<W: Write>(writer: &mut W, text: &str) -> Result<()> {
    let mut bytes = Vec::with_capacity(text.len() + 1);
    bytes.extend_from_slice(text.as_bytes());
    bytes.push(LINE_TERMINATOR);

    let written = writer
        .write(&bytes)
        .map_err(|e| AdminError::from_socket(e, "writing command"))?;

    if written != bytes.len() {
        return Err(AdminError::Io(io::Error::new(
            ErrorKind::WriteZero,
            format!("short write: {} of {} bytes", written, bytes.len()),
        )));
    }

    writer
        .flush()
        .map_err(|e| AdminError::from_socket(e, "flushing command"))?;

    tracing::trace!("-> {} bytes", bytes.len());
    Ok(())
}

// =============================================================================
// Reading
// =============================================================================

/// Parse a header line into `(code, body_length)`
///
/// Returns `Ok(None)` for anything that is not a header (server chatter, the
/// newline trailing a previous body, ...). A line that has the header shape
/// but an unrepresentable code or length is a protocol error.
pub fn parse_header(line: &[u8]) -> Result<Option<(u16, usize)>> {
    let caps = match HEADER_RE.captures(line) {
        Some(caps) => caps,
        None => return Ok(None),
    };

    let code = parse_field(&caps[1]);
    let len = parse_field(&caps[2]);

    match (code, len) {
        (Some(code), Some(len)) => Ok(Some((code, len))),
        _ => Err(AdminError::Protocol(format!(
            "invalid response header: {:?}",
            String::from_utf8_lossy(line).trim_end()
        ))),
    }
}

fn parse_field<T: std::str::FromStr>(digits: &[u8]) -> Option<T> {
    std::str::from_utf8(digits).ok()?.parse().ok()
}

/// Read one complete response from a stream
///
/// Scans lines until a header matches, then accumulates exactly the declared
/// number of body bytes, across as many reads as the transport needs.
pub fn read_response<R: BufRead>(reader: &mut R) -> Result<Response> {
    let (code, len) = read_header(reader)?;

    if len > MAX_BODY_SIZE {
        return Err(AdminError::Protocol(format!(
            "Response body too large: {} bytes (max {})",
            len, MAX_BODY_SIZE
        )));
    }

    let body = read_body(reader, len)?;
    tracing::trace!("<- {} ({} bytes)", code, body.len());

    Ok(Response { code, body })
}

/// Skip lines until a header is found
fn read_header<R: BufRead>(reader: &mut R) -> Result<(u16, usize)> {
    let mut line = Vec::new();

    loop {
        line.clear();
        let n = reader
            .by_ref()
            .take(MAX_HEADER_LINE as u64)
            .read_until(LINE_TERMINATOR, &mut line)
            .map_err(|e| AdminError::from_socket(e, "reading response header"))?;

        if n == 0 {
            return Err(AdminError::Protocol(
                "connection closed before a response header was received".to_string(),
            ));
        }

        if n == MAX_HEADER_LINE && line.last() != Some(&LINE_TERMINATOR) {
            return Err(AdminError::Protocol(format!(
                "response line exceeds {} bytes without a terminator",
                MAX_HEADER_LINE
            )));
        }

        if let Some(header) = parse_header(&line)? {
            return Ok(header);
        }

        if line.iter().any(|b| !b.is_ascii_whitespace()) {
            tracing::trace!("skipping non-header line: {:?}", String::from_utf8_lossy(&line));
        }
    }
}

/// Read exactly `len` body bytes
fn read_body<R: BufRead>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut body = vec![0u8; len];
    let mut filled = 0;

    while filled < len {
        match reader.read(&mut body[filled..]) {
            Ok(0) => {
                return Err(AdminError::Protocol(format!(
                    "connection closed after {} of {} body bytes",
                    filled, len
                )));
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(AdminError::from_socket(e, "reading response body")),
        }
    }

    Ok(body)
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode a response frame the way varnishd emits it
///
/// The client never sends responses. This is for tests and scripted
/// stand-in servers. The length field is space-padded to eight columns and
/// the body is followed by a newline.
pub fn encode_response(response: &Response) -> Vec<u8> {
    let header = format!("{:03} {:<8}\n", response.code, response.body.len());

    let mut message = Vec::with_capacity(header.len() + response.body.len() + 1);
    message.extend_from_slice(header.as_bytes());
    message.extend_from_slice(&response.body);
    message.push(LINE_TERMINATOR);

    message
}
