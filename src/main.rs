//! Main entry point for the tick-data-downloader CLI

use anyhow::Context;
use clap::Parser;
use tick_data_downloader::cli::Cli;
use tick_data_downloader::config::DEFAULT_LOG_FILTER;
use tick_data_downloader::metrics::init_metrics;
use tick_data_downloader::shutdown::{self, ShutdownCoordinator};
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing(default_filter: &str) {
    // Check if JSON output is requested via environment variable
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match cli.load_config() {
        Ok(config) => {
            init_tracing(config.log.filter_or_default());
            config
        }
        Err(e) => {
            init_tracing(DEFAULT_LOG_FILTER);
            return Err(e).with_context(|| format!("loading {}", cli.config.display()));
        }
    };

    if let Some(addr) = cli.metrics_addr {
        init_metrics(addr)
            .await
            .map_err(|e| anyhow::anyhow!("{e}"))
            .context("starting metrics exporter")?;
    }

    // Install global shutdown coordinator and Ctrl+C handler
    let shutdown = ShutdownCoordinator::shared();
    shutdown::set_global_shutdown(shutdown.clone());
    shutdown::watch_ctrl_c(shutdown.clone());

    let summary = cli.execute(&config, shutdown).await?;
    if let Some(e) = summary.writer_error {
        anyhow::bail!("writer stopped early: {e}");
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }
}
