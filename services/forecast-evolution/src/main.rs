//! Forecast-evolution command-line front end.
//!
//! Collects the target time, lookback window and preset, runs the pipeline
//! once and prints where the artifacts went.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use forecast_common::ForecastError;
use forecast_evolution::{
    Args, EvolutionPipeline, EvolutionReport, EvolutionRequest, NomadsFetcher,
};
use grib_reader::GribFieldReader;

#[tokio::main]
async fn main() {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args);

    if let Err(e) = run(args).await {
        let code = e
            .downcast_ref::<ForecastError>()
            .map(ForecastError::exit_code)
            .unwrap_or(1);
        error!(error = %format!("{:#}", e), exit_code = code, "Forecast evolution failed");
        eprintln!("Error: {:#}", e);
        std::process::exit(code);
    }
}

fn init_tracing(args: &Args) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    if args.log_json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

async fn run(args: Args) -> Result<()> {
    let request = EvolutionRequest {
        now: Utc::now(),
        target: args.target_time()?,
        lookback_days: args.lookback_days,
        preset: args.preset()?,
    };

    info!(
        target = %request.target,
        preset = %request.preset,
        lookback_days = request.lookback_days,
        "Starting forecast evolution"
    );

    let fetch_config = args.fetch_config();
    tokio::fs::create_dir_all(&fetch_config.cache_dir)
        .await
        .with_context(|| format!("Failed to create cache directory {}", fetch_config.cache_dir.display()))?;

    let fetcher = Arc::new(NomadsFetcher::new(fetch_config)?);
    let reader = Arc::new(GribFieldReader::new());
    let pipeline = EvolutionPipeline::new(fetcher, reader, args.evolution_config());

    // Shutdown signal
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            shutdown_tx.send(()).ok();
        }
    });

    let report = pipeline.run(&request, shutdown_rx).await?;
    print_summary(&report);

    Ok(())
}

fn print_summary(report: &EvolutionReport) {
    println!(
        "Runs: {} selected, {} fetched, {} decoded",
        report.attempted, report.fetched, report.decoded
    );
    println!("Animation: {}", report.artifacts.animation.display());
    match &report.artifacts.chart {
        Some(chart) => println!("RMSE chart: {}", chart.display()),
        None => println!("RMSE chart: not available"),
    }
    for point in &report.artifacts.rmse {
        println!("  {}  {:.2}", point.label, point.rmse);
    }
    println!("Report: {}", report.report.display());
}
