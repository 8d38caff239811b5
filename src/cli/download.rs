//! Crawl command implementation

use crate::config::{AppConfig, DEFAULT_CONFIG_PATH};
use crate::downloader::{
    CrawlExecutor, IndicatifProgress, NoopProgress, ProgressSink, RunSummary,
};
use crate::fetcher::HttpTickFetcher;
use crate::output::csv::CsvTickStore;
use crate::shutdown::SharedShutdown;
use crate::DateRange;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::CliError;

/// Maximum allowed worker count
const MAX_WORKERS: usize = crate::downloader::config::MAX_WORKERS;

/// Parse and validate worker count
fn parse_workers(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err("workers must be at least 1".to_string());
    }
    if value > MAX_WORKERS {
        return Err(format!("workers {value} exceeds maximum of {MAX_WORKERS}"));
    }
    Ok(value)
}

/// Summary output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

/// Tick Data Downloader CLI
#[derive(Parser, Debug)]
#[command(name = "tick-data-downloader")]
#[command(about = "Incrementally download historical price ticks into a CSV file", long_about = None)]
#[command(version)]
pub struct Cli {
    /// First day to fetch (YYYYMMDD, inclusive)
    #[arg(long)]
    pub start: String,

    /// Day to stop at (YYYYMMDD, exclusive)
    #[arg(long)]
    pub end: String,

    /// Config file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Number of fetch workers, overrides `[pipeline].workers` (max: 32)
    #[arg(long, value_parser = parse_workers)]
    pub workers: Option<usize>,

    /// Attempts per task before it is dropped, overrides `[pipeline].max_retries`
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=20))]
    pub max_retries: Option<u32>,

    /// Output CSV path, overrides `[output].path`
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Expose Prometheus metrics on this address (e.g. 127.0.0.1:9090)
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,

    /// Hide the progress bar
    #[arg(long, default_value_t = false)]
    pub no_progress: bool,

    /// Summary format (json or human)
    #[arg(long, default_value = "human")]
    pub output_format: OutputFormat,
}

impl Cli {
    /// Parse `--start`/`--end` into a half-open range
    pub fn date_range(&self) -> Result<DateRange, CliError> {
        DateRange::parse_compact(&self.start, &self.end).map_err(CliError::InvalidArgument)
    }

    /// Load the config file and apply flag overrides
    pub fn load_config(&self) -> Result<AppConfig, CliError> {
        let mut config = AppConfig::load_from_file(&self.config)?;
        if let Some(workers) = self.workers {
            config.pipeline.workers = workers;
        }
        if let Some(max_retries) = self.max_retries {
            config.pipeline.max_retries = max_retries;
        }
        if let Some(output) = &self.output {
            config.output.path = output.clone();
        }
        config.validate()?;
        Ok(config)
    }

    /// Run the crawl described by the flags and `config`
    pub async fn execute(
        &self,
        config: &AppConfig,
        shutdown: SharedShutdown,
    ) -> Result<RunSummary, CliError> {
        let range = self.date_range()?;
        let instruments = config.instruments();

        let fetcher = HttpTickFetcher::new(config.request_info()?);
        let store = CsvTickStore::new(config.output.path.clone());
        let progress: Arc<dyn ProgressSink> = if self.no_progress {
            Arc::new(NoopProgress)
        } else {
            Arc::new(IndicatifProgress::new(format!("Crawling {}", instruments.join(","))))
        };

        info!(
            instruments = ?instruments,
            range = %range,
            output = %config.output.path.display(),
            workers = config.pipeline.workers,
            "Starting crawl"
        );

        let executor = CrawlExecutor::new(Arc::new(fetcher), Arc::new(store), range)
            .with_settings(config.pipeline.to_settings())
            .with_progress(progress)
            .with_shutdown(shutdown);

        let result = executor.run(instruments).await;

        match self.output_format {
            OutputFormat::Json => output_json(&range, config, &result),
            OutputFormat::Human => output_human(config, &result),
        }

        result.map_err(CliError::from)
    }
}

/// Output result as JSON
fn output_json(
    range: &DateRange,
    config: &AppConfig,
    result: &Result<RunSummary, crate::downloader::PipelineError>,
) {
    let output = match result {
        Ok(summary) => serde_json::json!({
            "success": summary.writer_error.is_none(),
            "range": range.to_string(),
            "output_path": config.output.path.display().to_string(),
            "summary": summary,
            "error": serde_json::Value::Null,
        }),
        Err(e) => serde_json::json!({
            "success": false,
            "range": range.to_string(),
            "output_path": config.output.path.display().to_string(),
            "summary": serde_json::Value::Null,
            "error": e.to_string(),
        }),
    };

    match serde_json::to_string(&output) {
        Ok(line) => println!("{line}"),
        Err(e) => error!("Failed to serialize summary: {}", e),
    }
}

/// Output result in human-readable format
fn output_human(config: &AppConfig, result: &Result<RunSummary, crate::downloader::PipelineError>) {
    match result {
        Ok(summary) => {
            println!("\nCrawl finished: {}/{}", summary.completed, summary.total);
            println!("Output: {}", config.output.path.display());
            println!("Rows written: {}", summary.rows_written);
            if summary.empty_batches > 0 {
                println!("Already up to date: {}", summary.empty_batches);
            }
            if summary.dropped_tasks > 0 {
                println!("Dropped tasks: {}", summary.dropped_tasks);
            }
            if summary.failed_workers > 0 {
                println!("Failed workers: {}", summary.failed_workers);
            }
            if summary.interrupted {
                warn!("Crawl was interrupted, rerun with the same range to continue");
            }
            if let Some(e) = &summary.writer_error {
                eprintln!("Writer stopped early: {e}");
            }
        }
        Err(e) => {
            eprintln!("\nCrawl failed!");
            eprintln!("Error: {e}");
            error!("Crawl failed: {}", e);
        }
    }
}
