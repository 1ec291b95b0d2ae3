//! Multi-target fan-out
//!
//! Drives one [`Connection`] per configured target, sequentially. A failure on
//! one target is recorded in its [`TargetReport`] and never stops the others.
//!
//! [`InvalidationBatch`] is the per-request accumulator: callers add URL
//! patterns while handling a request, then call [`InvalidationBatch::flush`]
//! once at the end. Duplicate patterns are sent only once.

use crate::client::Connection;
use crate::config::{ClientConfig, Config};
use crate::error::{AdminError, Result};

/// Build a URL invalidation expression, optionally restricted by host
///
/// `req.url ~ "<pattern>"`, plus ` && req.http.host ~ "<host_pattern>"`.
pub fn url_expression(pattern: &str, host_pattern: Option<&str>) -> String {
    let mut expr = format!("req.url ~ \"{}\"", pattern);
    if let Some(host) = host_pattern.filter(|h| !h.is_empty()) {
        expr.push_str(&format!(" && req.http.host ~ \"{}\"", host));
    }
    expr
}

// =============================================================================
// Reports
// =============================================================================

/// What happened on one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
    /// Probe: child is running
    Running,

    /// Probe: server answered but the child is not running
    Stopped,

    /// Batch flush: per-pattern results
    Invalidated {
        /// Patterns the server accepted
        applied: Vec<String>,

        /// `(pattern, error)` for patterns the server rejected
        failed: Vec<(String, String)>,
    },

    /// The target could not be used at all
    Failed(String),
}

/// Per-target result of a fan-out operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetReport {
    /// `host:port`
    pub target: String,
    pub outcome: TargetOutcome,
}

impl TargetReport {
    /// True unless the target failed outright or rejected some patterns
    pub fn is_success(&self) -> bool {
        match &self.outcome {
            TargetOutcome::Running | TargetOutcome::Stopped => true,
            TargetOutcome::Invalidated { failed, .. } => failed.is_empty(),
            TargetOutcome::Failed(_) => false,
        }
    }
}

// =============================================================================
// Fan-out
// =============================================================================

/// Connect to a target with the config's timeout
pub fn open(client: &ClientConfig, config: &Config) -> Result<Connection> {
    let mut conn = Connection::from_config(client)?;
    conn.connect(config.timeout)?;
    Ok(conn)
}

/// Run `op` against every target, isolating failures
///
/// The connection is always quit afterwards, whether `op` succeeded or not.
pub fn for_each_target<T, F>(config: &Config, mut op: F) -> Vec<(String, Result<T>)>
where
    F: FnMut(&mut Connection) -> Result<T>,
{
    config
        .clients
        .iter()
        .map(|client| {
            let target = client.target();
            let result = open(client, config).and_then(|mut conn| {
                let result = op(&mut conn);
                conn.quit();
                result
            });
            if let Err(e) = &result {
                tracing::warn!("{}: {}", target, e);
            }
            (target, result)
        })
        .collect()
}

/// Ping/diagnostics: connect to each target and report whether its child runs
pub fn probe_all(config: &Config) -> Vec<TargetReport> {
    for_each_target(config, |conn| Ok(conn.status()))
        .into_iter()
        .map(|(target, result)| TargetReport {
            target,
            outcome: match result {
                Ok(true) => TargetOutcome::Running,
                Ok(false) => TargetOutcome::Stopped,
                Err(e) => TargetOutcome::Failed(e.to_string()),
            },
        })
        .collect()
}

// =============================================================================
// Invalidation batch
// =============================================================================

/// De-duplicating, insertion-ordered set of URL patterns to invalidate
#[derive(Debug, Clone, Default)]
pub struct InvalidationBatch {
    patterns: Vec<String>,
}

impl InvalidationBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a URL pattern; returns `false` if it was already queued
    pub fn add(&mut self, pattern: impl Into<String>) -> bool {
        let pattern = pattern.into();
        if self.patterns.contains(&pattern) {
            return false;
        }
        self.patterns.push(pattern);
        true
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Send every queued pattern to every target
    ///
    /// Each target must report a running child first. A pattern the server
    /// rejects is logged and recorded, and the remaining patterns are still
    /// sent; a transport error abandons that target. An empty batch touches
    /// no target.
    pub fn flush(self, config: &Config) -> Vec<TargetReport> {
        if self.patterns.is_empty() {
            return Vec::new();
        }

        let host_pattern = config.host_pattern.as_deref();

        for_each_target(config, |conn| {
            if !conn.status() {
                return Err(AdminError::ChildStopped(conn.target()));
            }

            let mut applied = Vec::new();
            let mut failed = Vec::new();
            for pattern in &self.patterns {
                match conn.invalidate(&url_expression(pattern, host_pattern)) {
                    Ok(_) => applied.push(pattern.clone()),
                    Err(e @ AdminError::Command { .. }) => {
                        tracing::warn!("{}: {}", conn.target(), e);
                        failed.push((pattern.clone(), e.to_string()));
                    }
                    // Session state is unknown after a transport error
                    Err(e) => return Err(e),
                }
            }
            Ok((applied, failed))
        })
        .into_iter()
        .map(|(target, result)| TargetReport {
            target,
            outcome: match result {
                Ok((applied, failed)) => TargetOutcome::Invalidated { applied, failed },
                Err(e) => TargetOutcome::Failed(e.to_string()),
            },
        })
        .collect()
    }
}
