//! Shortcut operations
//!
//! Convenience commands layered on [`Connection::command`]. Invalidation
//! shortcuts pick their verbs from the connection's [`Dialect`].
//!
//! [`Dialect`]: crate::protocol::Dialect

use once_cell::sync::Lazy;
use regex::Regex;

use super::Connection;
use crate::error::Result;
use crate::protocol::status;

static CHILD_STATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Child in state (\w+)").expect("child state pattern is a valid regex")
});

/// Outcome of `start` / `stop`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The command was sent and accepted
    Applied,

    /// The child was already in the requested state; nothing was sent
    AlreadyInState,
}

/// Extract the child state word from a `status` body
pub fn child_state(body: &str) -> Option<&str> {
    CHILD_STATE_RE
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

impl Connection {
    /// Liveness probe: whether the cache child process is running
    ///
    /// Never fails; any error along the way reads as `false`.
    pub fn status(&mut self) -> bool {
        match self.command("status", status::OK) {
            Ok(body) => child_state(&body) == Some("running"),
            Err(e) => {
                tracing::debug!("status on {} failed: {}", self.target(), e);
                false
            }
        }
    }

    /// Start the cache child unless it is already running
    pub fn start(&mut self) -> Result<Transition> {
        if self.status() {
            tracing::info!("varnish host already started on {}", self.target());
            return Ok(Transition::AlreadyInState);
        }
        self.command("start", status::OK)?;
        Ok(Transition::Applied)
    }

    /// Stop the cache child unless it is already stopped
    pub fn stop(&mut self) -> Result<Transition> {
        if !self.status() {
            tracing::info!("varnish host already stopped on {}", self.target());
            return Ok(Transition::AlreadyInState);
        }
        self.command("stop", status::OK)?;
        Ok(Transition::Applied)
    }

    /// Round-trip a `ping`; returns the server's reply body
    pub fn ping(&mut self) -> Result<String> {
        self.command("ping", status::OK)
    }

    /// Invalidate by expression, e.g. `req.url ~ ^/$ && req.http.host ~ example\.com$`
    pub fn invalidate(&mut self, expression: &str) -> Result<String> {
        let verb = self.dialect().invalidate_verb();
        self.command(&format!("{} {}", verb, expression), status::OK)
    }

    /// Invalidate every object whose URL matches `pattern`
    pub fn invalidate_url(&mut self, pattern: &str) -> Result<String> {
        let verb = self.dialect().invalidate_url_verb();
        self.command(&format!("{} {}", verb, pattern), status::OK)
    }

    /// Active invalidations, one entry per line, in server order
    pub fn list_invalidations(&mut self) -> Result<Vec<String>> {
        let verb = self.dialect().list_verb();
        let body = self.command(verb, status::OK)?;

        let trimmed = body.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        Ok(trimmed.lines().map(str::to_string).collect())
    }
}
