//! Endpoint Monitor Server Entry Point

use clap::Parser;
use endpoint_monitor::cli::{Cli, Commands};
use endpoint_monitor::common::error::MonitorResult;
use endpoint_monitor::config::{get_env, get_env_parse, MonitorConfig};
use endpoint_monitor::{bootstrap, logging, server};
use tracing::{error, info};

#[derive(Clone)]
struct ServerConfig {
    host: String,
    port: u16,
}

impl ServerConfig {
    fn from_env() -> MonitorResult<Self> {
        let host = get_env("MONITOR_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = get_env_parse("MONITOR_PORT", 8000u16)?;
        Ok(Self { host, port })
    }

    fn from_args(host: String, port: u16) -> Self {
        Self { host, port }
    }

    fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let _log_guard = match logging::init() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let server_config = match cli.command {
        Some(Commands::Serve(args)) => Ok(ServerConfig::from_args(args.host, args.port)),
        // No subcommand - default to serve
        None => ServerConfig::from_env(),
    };

    let result = match server_config {
        Ok(cfg) => run_server(cfg).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        error!(error = %e, "Endpoint monitor exited with error");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run_server(cfg: ServerConfig) -> MonitorResult<()> {
    let config = MonitorConfig::from_env()?;
    info!(
        tick_interval_secs = config.tick_interval.as_secs(),
        workers = config.worker_count,
        probe_timeout_secs = config.probe_timeout.as_secs(),
        "Loaded monitor configuration"
    );

    let ctx = bootstrap::initialize(&config)?;
    let stop = ctx.scheduler.scheduler().shutdown_token();

    let served = server::run(ctx.state, &cfg.bind_addr(), stop).await;
    let stopped = ctx.scheduler.shutdown().await;

    // サーバーのエラーを優先し、次にスケジューラの致命的エラーを返す
    served.and(stopped)
}
