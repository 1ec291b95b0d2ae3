//! Client Module
//!
//! Blocking varnishadm client.
//!
//! ## Lifecycle
//! - `Connection::new` resolves the dialect; no I/O
//! - `connect` reads the banner, answering an auth challenge if one is sent
//! - `command` and the shortcut operations, strictly one at a time
//! - `quit` or `close` (also run on drop)

mod connection;
mod shortcuts;

pub use connection::{Connection, DEFAULT_PORT};
pub use shortcuts::{child_state, Transition};
