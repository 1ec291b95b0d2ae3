//! Protocol Module
//!
//! Defines the varnishadm CLI wire protocol.
//!
//! ## Protocol Format
//!
//! ### Request Format
//! ```text
//! <verb> [args...]\n
//! ```
//!
//! ### Response Format
//! ```text
//! <code> <length>\n<body: exactly length bytes>\n
//! ```
//!
//! ### Status Codes
//! - 107: AUTH  - Body starts with a 32-byte challenge
//! - 200: OK
//! - 500: CLOSE - Acknowledges `quit`
//!
//! Any other code is a failure wherever a specific code is expected.

pub mod auth;
mod dialect;
mod framer;
mod response;

pub use dialect::{Dialect, ProtocolVersion};
pub use framer::{
    encode_response, parse_header, read_response, write_line, MAX_BODY_SIZE, MAX_HEADER_LINE,
};
pub use response::{status, Response};
