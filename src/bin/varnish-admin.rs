//! varnish-admin CLI
//!
//! Runs one admin command against every configured varnishadm target.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};
use varnish_admin::config::read_secret_file;
use varnish_admin::fanout::{self, InvalidationBatch, TargetOutcome, TargetReport};
use varnish_admin::{Config, Connection, Transition};

/// varnish-admin CLI
#[derive(Parser, Debug)]
#[command(name = "varnish-admin")]
#[command(about = "Control Varnish caches over the varnishadm admin socket")]
#[command(version)]
struct Args {
    /// TOML config file listing targets
    #[arg(short, long, conflicts_with = "clients")]
    config: Option<PathBuf>,

    /// Targets as "host[:port[:version]]", separated by spaces or commas
    #[arg(long, default_value = "127.0.0.1:6082")]
    clients: String,

    /// Secret file used for targets that have no secret of their own
    #[arg(short = 'S', long)]
    secret_file: Option<PathBuf>,

    /// Connect and read timeout in seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Host name regex appended to URL invalidations (req.http.host ~ ...)
    #[arg(long)]
    host_pattern: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Report whether each cache child is running
    Status,

    /// Ping each server
    Ping,

    /// Print each server's banner
    Banner,

    /// Start the cache child
    Start,

    /// Stop the cache child
    Stop,

    /// Invalidate by expression
    Purge {
        /// e.g. 'req.url ~ ^/$ && req.http.host ~ example\.com$'
        expression: String,
    },

    /// Invalidate by URL pattern
    PurgeUrl {
        /// URL regex
        pattern: String,
    },

    /// List active invalidations
    List,

    /// Invalidate several URL patterns, restricted by --host-pattern
    PurgeUrls {
        /// URL regexes, de-duplicated
        #[arg(required = true)]
        patterns: Vec<String>,
    },
}

fn main() {
    // Logs go to stderr so command output stays clean on stdout
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,varnish_admin=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(2);
        }
    };

    tracing::debug!("varnish-admin v{}: {} target(s)", varnish_admin::VERSION, config.clients.len());

    if !run(&args.command, &config) {
        std::process::exit(1);
    }
}

/// Merge the config source with command-line overrides
fn build_config(args: &Args) -> varnish_admin::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::from_legacy(&args.clients, None)?,
    };

    if let Some(path) = &args.secret_file {
        let secret = read_secret_file(path, None)?;
        for client in config.clients.iter_mut().filter(|c| c.secret.is_none()) {
            client.secret = Some(secret.clone());
        }
    }

    if let Some(secs) = args.timeout {
        if secs == 0 {
            return Err(varnish_admin::AdminError::Config(
                "timeout must be non-zero".to_string(),
            ));
        }
        config.timeout = Duration::from_secs(secs);
    }

    if let Some(pattern) = &args.host_pattern {
        config.host_pattern = Some(pattern.clone());
    }

    Ok(config)
}

/// Dispatch a command across all targets; returns false if any target failed
fn run(command: &Commands, config: &Config) -> bool {
    match command {
        Commands::Status => print_reports(&fanout::probe_all(config)),
        Commands::PurgeUrls { patterns } => {
            let mut batch = InvalidationBatch::new();
            for pattern in patterns {
                batch.add(pattern.as_str());
            }
            print_reports(&batch.flush(config))
        }
        Commands::Ping => each_target(config, |conn| conn.ping().map(|body| body.trim().to_string())),
        Commands::Banner => each_target(config, |conn| {
            Ok(conn.banner().unwrap_or_default().trim().to_string())
        }),
        Commands::Start => each_target(config, |conn| {
            conn.start().map(|t| match t {
                Transition::Applied => "Started".to_string(),
                Transition::AlreadyInState => "Already running".to_string(),
            })
        }),
        Commands::Stop => each_target(config, |conn| {
            conn.stop().map(|t| match t {
                Transition::Applied => "Stopped".to_string(),
                Transition::AlreadyInState => "Already stopped".to_string(),
            })
        }),
        Commands::Purge { expression } => each_target(config, |conn| {
            conn.invalidate(expression).map(|_| "Purged".to_string())
        }),
        Commands::PurgeUrl { pattern } => each_target(config, |conn| {
            conn.invalidate_url(pattern).map(|_| "Purged".to_string())
        }),
        Commands::List => each_target(config, |conn| {
            conn.list_invalidations().map(|entries| entries.join("\n"))
        }),
    }
}

/// Run a single-target operation everywhere and print one line per target
fn each_target<F>(config: &Config, op: F) -> bool
where
    F: FnMut(&mut Connection) -> varnish_admin::Result<String>,
{
    let mut all_ok = true;
    for (target, result) in fanout::for_each_target(config, op) {
        match result {
            Ok(output) => println!("{}: {}", target, output),
            Err(e) => {
                all_ok = false;
                println!("{}: Error: {}", target, e);
            }
        }
    }
    all_ok
}

fn print_reports(reports: &[TargetReport]) -> bool {
    for report in reports {
        println!("{}", render(report));
    }
    reports.iter().all(TargetReport::is_success)
}

fn render(report: &TargetReport) -> String {
    match &report.outcome {
        TargetOutcome::Running => format!("{}: Running :)", report.target),
        TargetOutcome::Stopped => format!("{}: Stopped, but responding", report.target),
        TargetOutcome::Invalidated { applied, failed } => {
            let mut lines = vec![format!("{}: Purged {} pattern(s)", report.target, applied.len())];
            for (pattern, e) in failed {
                lines.push(format!("  {}: Error: {}", pattern, e));
            }
            lines.join("\n")
        }
        TargetOutcome::Failed(e) => format!("{}: Error: {}", report.target, e),
    }
}
