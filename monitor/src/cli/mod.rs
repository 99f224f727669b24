//! CLI module for endpoint-monitor
//!
//! Provides the command-line interface for the monitor process.

pub mod serve;

use clap::{Parser, Subcommand};

/// Endpoint monitor - periodic HTTP health checks with on-demand probes
#[derive(Parser, Debug)]
#[command(name = "endpoint-monitor")]
#[command(version, about, long_about = None)]
#[command(after_help = r#"ENVIRONMENT VARIABLES:
    MONITOR_HOST                 Bind address (default: 127.0.0.1)
    MONITOR_PORT                 Listen port (default: 8000)
    MONITOR_LOG_LEVEL            Log level (default: info, falls back to RUST_LOG)
    MONITOR_LOG_DIR              Directory for daily-rotated log files
    MONITOR_TICK_INTERVAL_SECS   Periodic check interval (default: 30)
    MONITOR_WORKERS              Probe worker count (default: 10)
    MONITOR_PROBE_TIMEOUT_SECS   Per-probe timeout (default: 5)
    MONITOR_HISTORY_CAPACITY     Results kept per endpoint (default: 10)
    MONITOR_RETRY_ATTEMPTS       Extra attempts on transport failure (default: 0)
    MONITOR_RETRY_BACKOFF_MS     Delay between attempts (default: 500)
    MONITOR_SHUTDOWN_GRACE_SECS  Drain period on shutdown (default: 10)
    MONITOR_TRIGGER_WAIT_SECS    On-demand wait limit (default: timeout x (attempts + 1) + 5)
    MONITOR_CORS_ORIGIN          Allowed CORS origin (default: http://localhost:8000)
"#)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the monitor server
    Serve(serve::ServeArgs),
}
