//! Configuration module for the proxy control plane
//!
//! CLI argument parsing with environment variable support. Every knob has a
//! default, so running the binary bare listens on the stock port with state
//! files in the current directory.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Parse duration string (e.g., "30s", "2m", "1h") or plain seconds
fn parse_duration(s: &str) -> Result<Duration, String> {
    if let Ok(d) = humantime::parse_duration(s) {
        return Ok(d);
    }
    s.parse::<u64>().map(Duration::from_secs).map_err(|_| {
        format!(
            "Invalid duration '{}'. Use formats like '30s', '2m', '1h' or plain seconds",
            s
        )
    })
}

/// Default listening port
const DEFAULT_PORT: u16 = 8085;

/// CLI arguments for the proxy control plane
///
/// Supports environment variables with PROXY_GATE_ prefix
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Caching, filtering forwarding proxy")]
pub struct CliArgs {
    /// Listening host
    #[arg(long, env = "PROXY_GATE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Listening port
    #[arg(long, env = "PROXY_GATE_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Data directory for the persisted cache and blocklist files
    #[arg(long, env = "PROXY_GATE_DATA_DIR", default_value = ".")]
    pub data_dir: PathBuf,

    /// Bound on waiting for in-flight handler tasks at shutdown
    /// (e.g., "30s", "2m"; tasks still running afterwards are logged and left behind)
    #[arg(long, env = "PROXY_GATE_DRAIN_TIMEOUT", default_value = "30s", value_parser = parse_duration)]
    pub drain_timeout: Duration,

    /// TCP listen backlog
    #[arg(long, env = "PROXY_GATE_TCP_BACKLOG", default_value_t = 1024)]
    pub tcp_backlog: i32,

    /// Log mode: trace, debug, info, warn, error
    #[arg(long, env = "PROXY_GATE_LOG_MODE", default_value = "info")]
    pub log_mode: String,
}

impl CliArgs {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate argument combinations that clap cannot express
    pub fn validate(&self) -> Result<()> {
        if crate::logger::LogLevel::from_str(&self.log_mode).is_none() {
            return Err(anyhow!(
                "Invalid log mode '{}'. Use trace, debug, info, warn or error",
                self.log_mode
            ));
        }
        if self.drain_timeout.is_zero() {
            return Err(anyhow!("drain_timeout must be greater than zero"));
        }
        if self.tcp_backlog <= 0 {
            return Err(anyhow!("tcp_backlog must be greater than zero"));
        }
        Ok(())
    }
}

/// Runtime server configuration derived from CLI arguments
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub drain_timeout: Duration,
    pub tcp_backlog: i32,
}

impl ServerConfig {
    pub fn from_cli(cli: &CliArgs) -> Self {
        Self {
            host: cli.host.clone(),
            port: cli.port,
            data_dir: cli.data_dir.clone(),
            drain_timeout: cli.drain_timeout,
            tcp_backlog: cli.tcp_backlog,
        }
    }

    /// Socket address string the listener binds to
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
