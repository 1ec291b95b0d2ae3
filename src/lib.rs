//! # varnish-admin
//!
//! A blocking client for the varnishadm administrative CLI protocol:
//! - Length-framed text responses read byte-exactly
//! - SHA-256 challenge-response authentication
//! - Version-dependent invalidation verbs (`purge.*` on 2.x, `ban.*` on 3.x)
//! - Per-target fan-out with failure isolation
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Fan-out / InvalidationBatch                    │
//! │               (one Connection per target)                   │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                Shortcut Operations                          │
//! │   status / start / stop / invalidate / invalidate_url / list│
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │          Connection (command dispatch, auth)                │
//! └──────────┬──────────────────────────────┬───────────────────┘
//!            │                              │
//!            ▼                              ▼
//!     ┌─────────────┐               ┌─────────────┐
//!     │   Framer    │               │   Dialect   │
//!     │ (TcpStream) │               │ (version)   │
//!     └─────────────┘               └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::time::Duration;
//! use varnish_admin::{Connection, ProtocolVersion};
//!
//! # fn main() -> varnish_admin::Result<()> {
//! let mut conn = Connection::new("127.0.0.1", 6082, ProtocolVersion::new(3, 0))?
//!     .with_secret(std::fs::read("/etc/varnish/secret")?);
//! conn.connect(Duration::from_secs(5))?;
//! if conn.status() {
//!     conn.invalidate_url("^/$")?;
//! }
//! conn.quit();
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod client;
pub mod fanout;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{AdminError, Result};
pub use config::{ClientConfig, Config};
pub use client::{Connection, Transition};
pub use protocol::{Dialect, ProtocolVersion};
pub use fanout::{InvalidationBatch, TargetOutcome, TargetReport};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of varnish-admin
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
