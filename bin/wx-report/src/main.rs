//! WX Report
//!
//! Requests weather data for every location the service supports, spreading
//! the requests over a small pool of channels, and prints one table of
//! results to stdout. Logs go to stderr.
//!
//! The service is the in-process simulator, seeded with built-in data or a
//! JSON file of records (`--data`).

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use wx_config::{AppConfig, ConfigLoader, SimulatorConfig};
use wx_router::{DispatchPolicy, ReportRunner, RunnerConfig};
use wx_service::dataset::Dataset;
use wx_service::simulated::{SimulatedServiceConfig, SimulatedWeatherService};

#[derive(Parser, Debug)]
#[command(name = "wx-report")]
#[command(about = "Weather report across a fixed pool of service channels")]
struct Args {
    /// Configuration file (TOML)
    #[arg(long, env = "WX_CONFIG")]
    config: Option<String>,

    /// JSON file of weather records for the simulated service
    #[arg(long)]
    data: Option<String>,

    /// Number of channels to open
    #[arg(long)]
    pool_size: Option<usize>,

    /// Give up on a location after this many all-busy passes
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Print an example configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    wx_common::logging::init_logging("wx-report");

    let args = Args::parse();
    if args.print_config {
        print!("{}", AppConfig::example_toml());
        return;
    }

    let code = match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, details = ?e, "Weather report could not start");
            1
        }
    };

    std::process::exit(code);
}

async fn run(args: Args) -> Result<i32> {
    let config = load_config(&args)?;

    info!(
        pool_size = config.dispatch.pool_size,
        backoff_ms = config.dispatch.backoff_ms,
        max_attempts = ?config.dispatch.max_attempts,
        poll_interval_ms = config.report.poll_interval_ms,
        "Starting WX Report"
    );

    let service = Arc::new(build_service(&config.simulator)?);
    let runner = ReportRunner::new(service, runner_config(&config));

    Ok(runner.run_to_status(std::io::stdout().lock()).await)
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let loader = match &args.config {
        Some(path) => ConfigLoader::with_path(path),
        None => ConfigLoader::new(),
    };
    let mut config = loader.load().context("Failed to load configuration")?;

    if let Some(data) = &args.data {
        config.simulator.data_file = Some(data.clone());
    }
    if let Some(pool_size) = args.pool_size {
        config.dispatch.pool_size = pool_size;
    }
    if let Some(max_attempts) = args.max_attempts {
        config.dispatch.max_attempts = Some(max_attempts);
    }
    config
        .validate()
        .context("Invalid command line settings")?;

    Ok(config)
}

fn build_service(sim: &SimulatorConfig) -> Result<SimulatedWeatherService> {
    let dataset = match &sim.data_file {
        Some(path) => Dataset::from_json_file(path)
            .with_context(|| format!("Failed to load weather data from {}", path))?,
        None => Dataset::builtin(),
    };

    let service_config = SimulatedServiceConfig {
        max_channels: sim.max_channels,
        max_requests_per_channel: sim.max_requests_per_channel,
        page_size: sim.page_size,
        notify_delay: Duration::from_millis(sim.notify_delay_ms),
        notify_jitter: Duration::from_millis(sim.notify_jitter_ms),
    };

    Ok(SimulatedWeatherService::new(service_config, dataset))
}

fn runner_config(config: &AppConfig) -> RunnerConfig {
    RunnerConfig {
        pool_size: config.dispatch.pool_size,
        policy: DispatchPolicy {
            backoff: config.dispatch.backoff(),
            max_attempts: config.dispatch.max_attempts,
        },
        options: config.dispatch.request_options(),
        poll_interval: config.report.poll_interval(),
        date_format: config.report.date_format.clone(),
    }
}
