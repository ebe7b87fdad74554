//! Pipeline behavior with in-memory fetcher and reader.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use forecast_common::{ForecastError, ForecastResult, VariablePreset};
use forecast_evolution::{
    EvolutionConfig, EvolutionPipeline, EvolutionRequest, FetchRequest, GridFetcher,
};
use grib_reader::{Field, FieldReader};
use test_utils::{create_constant_grid, temp_test_dir};
use test_utils::time::{scenario_now, scenario_target, utc};

// 2024-01-10 13Z looking back one day at 2024-01-11 06Z selects these runs
const RUN_FILES: [&str; 4] = [
    "gfs_HGT_20240109_18z_f036.grib2",
    "gfs_HGT_20240110_00z_f030.grib2",
    "gfs_HGT_20240110_06z_f024.grib2",
    "gfs_HGT_20240110_12z_f018.grib2",
];

/// Hands out fake paths; older runs take longer so completions arrive out of order.
#[derive(Default)]
struct FakeFetcher {
    failing: HashSet<String>,
    hang: bool,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl FakeFetcher {
    fn failing(files: &[&str]) -> Self {
        Self {
            failing: files.iter().map(|f| f.to_string()).collect(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl GridFetcher for FakeFetcher {
    async fn fetch(&self, request: &FetchRequest) -> ForecastResult<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if self.hang {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(Duration::from_millis(request.candidate.lead_hours as u64)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let name = request.file_name();
        if self.failing.contains(&name) {
            return Err(ForecastError::FetchFailure(format!("{}: HTTP error: 404", name)));
        }
        Ok(PathBuf::from(name))
    }
}

/// Constant fields keyed by file name; unknown files fail to decode.
struct FakeReader {
    values: HashMap<String, f32>,
}

impl FakeReader {
    fn with_values(values: &[(&str, f32)]) -> Self {
        Self {
            values: values.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }

    fn all() -> Self {
        Self::with_values(&[
            (RUN_FILES[0], 5640.0),
            (RUN_FILES[1], 5620.0),
            (RUN_FILES[2], 5610.0),
            (RUN_FILES[3], 5600.0),
        ])
    }
}

impl FieldReader for FakeReader {
    fn read_field(&self, path: &Path, _preset: VariablePreset) -> ForecastResult<Field> {
        let name = path.to_string_lossy().to_string();
        let value = self
            .values
            .get(&name)
            .ok_or_else(|| ForecastError::DecodeFailure(format!("{}: Not a GRIB file", name)))?;
        Field::new(14, 12, create_constant_grid(14, 12, *value), (6.0, 47.0), (1.0, -1.0))
    }
}

fn request() -> EvolutionRequest {
    EvolutionRequest {
        now: scenario_now(),
        target: scenario_target(),
        lookback_days: 1,
        preset: VariablePreset::Hgt500,
    }
}

fn config(output_dir: &Path) -> EvolutionConfig {
    EvolutionConfig {
        output_dir: output_dir.to_path_buf(),
        max_concurrent: 2,
        frame_size: (120, 100),
        ..EvolutionConfig::default()
    }
}

fn pipeline(fetcher: Arc<FakeFetcher>, reader: FakeReader, output_dir: &Path) -> EvolutionPipeline {
    EvolutionPipeline::new(fetcher, Arc::new(reader), config(output_dir))
}

/// Receiver whose sender stays alive for the whole test.
fn no_shutdown() -> (broadcast::Sender<()>, broadcast::Receiver<()>) {
    broadcast::channel(1)
}

// ============================================================================
// Successful runs
// ============================================================================

#[tokio::test]
async fn test_full_evolution_writes_artifacts() {
    let dir = temp_test_dir();
    let fetcher = Arc::new(FakeFetcher::default());
    let pipeline = pipeline(Arc::clone(&fetcher), FakeReader::all(), dir.path());

    let (_tx, rx) = no_shutdown();
    let report = pipeline.run(&request(), rx).await.unwrap();

    assert_eq!((report.attempted, report.fetched, report.decoded), (4, 4, 4));
    assert!(fetcher.max_in_flight.load(Ordering::SeqCst) <= 2);

    let animation = &report.artifacts.animation;
    assert_eq!(animation, &dir.path().join("forecast_20240111_06z_hgt500.gif"));
    assert_eq!(&std::fs::read(animation).unwrap()[0..6], b"GIF89a");

    let chart = report.artifacts.chart.as_ref().unwrap();
    assert_eq!(chart, &dir.path().join("rmse_20240111_06z_hgt500.png"));
    assert!(chart.exists());

    let report_json: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&report.report).unwrap()).unwrap();
    assert_eq!(report_json["attempted"], 4);
    assert_eq!(report_json["preset"], "hgt500");
}

#[tokio::test]
async fn test_runs_stay_chronological_despite_completion_order() {
    let dir = temp_test_dir();
    let pipeline = pipeline(Arc::new(FakeFetcher::default()), FakeReader::all(), dir.path());

    let (_tx, rx) = no_shutdown();
    let report = pipeline.run(&request(), rx).await.unwrap();

    let cycles: Vec<_> = report.runs.iter().map(|r| r.cycle.datetime()).collect();
    assert_eq!(
        cycles,
        vec![
            utc(2024, 1, 9, 18),
            utc(2024, 1, 10, 0),
            utc(2024, 1, 10, 6),
            utc(2024, 1, 10, 12)
        ]
    );

    // reference is the latest run, older runs sit further away
    let rmse: Vec<f64> = report.artifacts.rmse.iter().map(|p| p.rmse).collect();
    assert_eq!(rmse.len(), 4);
    assert!((rmse[0] - 40.0).abs() < 1e-6);
    assert!((rmse[1] - 20.0).abs() < 1e-6);
    assert!((rmse[2] - 10.0).abs() < 1e-6);
    assert_eq!(rmse[3], 0.0);
    assert_eq!(report.artifacts.rmse[0].label, "09/01 18:00");
}

#[tokio::test]
async fn test_per_candidate_failures_are_skipped() {
    let dir = temp_test_dir();
    let fetcher = Arc::new(FakeFetcher::failing(&[RUN_FILES[1]]));
    // RUN_FILES[2] downloads but cannot be decoded
    let reader = FakeReader::with_values(&[(RUN_FILES[0], 5650.0), (RUN_FILES[3], 5600.0)]);
    let pipeline = pipeline(fetcher, reader, dir.path());

    let (_tx, rx) = no_shutdown();
    let report = pipeline.run(&request(), rx).await.unwrap();

    assert_eq!((report.attempted, report.fetched, report.decoded), (4, 3, 2));

    let outcome = &report.runs[1];
    assert!(!outcome.fetched);
    assert!(outcome.error.as_deref().unwrap().contains("404"));

    let outcome = &report.runs[2];
    assert!(outcome.fetched && !outcome.decoded);
    assert!(outcome.error.as_deref().unwrap().contains("Not a GRIB file"));

    assert_eq!(report.artifacts.rmse.len(), 2);
    assert!((report.artifacts.rmse[0].rmse - 50.0).abs() < 1e-6);
}

// ============================================================================
// Aggregate failures
// ============================================================================

#[tokio::test]
async fn test_no_successful_fetches() {
    let dir = temp_test_dir();
    let pipeline = pipeline(
        Arc::new(FakeFetcher::failing(&RUN_FILES)),
        FakeReader::all(),
        dir.path(),
    );

    let (_tx, rx) = no_shutdown();
    let err = pipeline.run(&request(), rx).await.unwrap_err();
    assert!(matches!(err, ForecastError::NoSuccessfulFetches { attempted: 4 }));
    assert!(!dir.path().join("forecast_20240111_06z_hgt500.gif").exists());
}

#[tokio::test]
async fn test_single_usable_dataset_is_not_enough() {
    let dir = temp_test_dir();
    let reader = FakeReader::with_values(&[(RUN_FILES[3], 5600.0)]);
    let pipeline = pipeline(Arc::new(FakeFetcher::default()), reader, dir.path());

    let (_tx, rx) = no_shutdown();
    let err = pipeline.run(&request(), rx).await.unwrap_err();
    assert!(matches!(
        err,
        ForecastError::InsufficientDatasets {
            attempted: 4,
            usable: 1
        }
    ));
}

#[tokio::test]
async fn test_target_out_of_reach_fails_before_fetching() {
    let dir = temp_test_dir();
    let fetcher = Arc::new(FakeFetcher::default());
    let pipeline = pipeline(Arc::clone(&fetcher), FakeReader::all(), dir.path());

    let mut req = request();
    req.target = utc(2024, 1, 1, 0);

    let (_tx, rx) = no_shutdown();
    let err = pipeline.run(&req, rx).await.unwrap_err();
    assert!(matches!(err, ForecastError::InsufficientRuns { found: 0 }));
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_invalid_lookback() {
    let dir = temp_test_dir();
    let pipeline = pipeline(Arc::new(FakeFetcher::default()), FakeReader::all(), dir.path());

    let mut req = request();
    req.lookback_days = 0;

    let (_tx, rx) = no_shutdown();
    let err = pipeline.run(&req, rx).await.unwrap_err();
    assert_eq!(err.exit_code(), 2);
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_shutdown_cancels_in_flight_fetches() {
    let dir = temp_test_dir();
    let fetcher = Arc::new(FakeFetcher {
        hang: true,
        ..FakeFetcher::default()
    });
    let pipeline = pipeline(fetcher, FakeReader::all(), dir.path());

    let (tx, rx) = broadcast::channel(1);
    let handle = tokio::spawn(async move { pipeline.run(&request(), rx).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(result, Err(ForecastError::Cancelled)));
}

#[tokio::test]
async fn test_dropped_shutdown_sender_does_not_cancel() {
    let dir = temp_test_dir();
    let pipeline = pipeline(Arc::new(FakeFetcher::default()), FakeReader::all(), dir.path());

    let (tx, rx) = broadcast::channel::<()>(1);
    drop(tx);

    assert!(pipeline.run(&request(), rx).await.is_ok());
}
