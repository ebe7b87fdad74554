//! Forecast-evolution pipeline.
//!
//! Select runs, fetch them concurrently, decode, render one frame per run,
//! write the animation, then chart how far each run is from the latest one.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{error, info, instrument, warn};

use forecast_common::{ForecastError, ForecastResult, ModelCycle, VariablePreset};
use grib_reader::{Field, FieldReader};
use renderer::png::write_png;
use renderer::{
    load_font, render_frame, render_line_chart, write_gif, ChartPoint, ChartStyle, FrameMeta,
    FrameStyle, SharedFont,
};
use run_selector::{select_runs_with, CandidateRun, MIN_RUNS};

use crate::analysis::{rmse_evolution, run_label, RmsePoint};
use crate::config::EvolutionConfig;
use crate::fetch::{FetchRequest, GridFetcher};

/// What to build: one target time, one preset, one lookback window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvolutionRequest {
    /// Wall clock, sampled once by the caller
    pub now: DateTime<Utc>,
    pub target: DateTime<Utc>,
    pub lookback_days: i64,
    pub preset: VariablePreset,
}

/// A decoded field together with the run it came from.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub candidate: CandidateRun,
    pub field: Field,
}

/// How far one selected run got through the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub cycle: ModelCycle,
    pub lead_hours: u32,
    pub resolved_lead_hours: u32,
    pub valid_time: DateTime<Utc>,
    /// Hours the fetched data lies before (negative) the target
    pub target_offset_hours: i64,
    pub fetched: bool,
    pub decoded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunOutcome {
    fn new(candidate: &CandidateRun, target: DateTime<Utc>) -> Self {
        Self {
            cycle: candidate.cycle,
            lead_hours: candidate.lead_hours,
            resolved_lead_hours: candidate.resolved_lead_hours,
            valid_time: candidate.valid_time(),
            target_offset_hours: candidate.offset_from_target(target),
            fetched: false,
            decoded: false,
            error: None,
        }
    }
}

/// Files written by [`render_artifacts`].
#[derive(Debug, Clone, Serialize)]
pub struct Artifacts {
    pub animation: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<PathBuf>,
    pub rmse: Vec<RmsePoint>,
}

/// Summary of a completed request, also written next to the artifacts.
#[derive(Debug, Clone, Serialize)]
pub struct EvolutionReport {
    pub target: DateTime<Utc>,
    pub preset: VariablePreset,
    pub lookback_days: i64,
    pub attempted: usize,
    pub fetched: usize,
    pub decoded: usize,
    pub runs: Vec<RunOutcome>,
    #[serde(flatten)]
    pub artifacts: Artifacts,
    pub report: PathBuf,
}

/// `{YYYYMMDD}_{HH}z_{preset}`, shared by every artifact of one request.
pub fn artifact_stem(target: DateTime<Utc>, preset: VariablePreset) -> String {
    format!("{}_{}", target.format("%Y%m%d_%Hz"), preset.id())
}

pub struct EvolutionPipeline {
    fetcher: Arc<dyn GridFetcher>,
    reader: Arc<dyn FieldReader>,
    config: EvolutionConfig,
}

impl EvolutionPipeline {
    pub fn new(
        fetcher: Arc<dyn GridFetcher>,
        reader: Arc<dyn FieldReader>,
        config: EvolutionConfig,
    ) -> Self {
        Self {
            fetcher,
            reader,
            config,
        }
    }

    /// Run the whole request, giving up with `Cancelled` on shutdown.
    ///
    /// Completed cache files stay on disk when cancelled; an interrupted
    /// transfer only ever leaves a `.partial` file behind.
    pub async fn run(
        &self,
        request: &EvolutionRequest,
        mut shutdown: broadcast::Receiver<()>,
    ) -> ForecastResult<EvolutionReport> {
        tokio::select! {
            result = self.execute(request) => result,
            _ = wait_for_shutdown(&mut shutdown) => {
                warn!("Shutdown requested, abandoning forecast evolution");
                Err(ForecastError::Cancelled)
            }
        }
    }

    #[instrument(skip(self, request), fields(
        target = %request.target,
        preset = %request.preset,
        lookback_days = request.lookback_days,
    ))]
    async fn execute(&self, request: &EvolutionRequest) -> ForecastResult<EvolutionReport> {
        let runs = select_runs_with(
            request.now,
            request.target,
            request.lookback_days,
            self.config.eligibility,
        )?;

        info!(
            runs = runs.len(),
            first = %runs[0].cycle,
            last = %runs[runs.len() - 1].cycle,
            "Selected runs"
        );

        let attempted = runs.len();
        let mut outcomes: Vec<RunOutcome> = runs
            .iter()
            .map(|run| RunOutcome::new(run, request.target))
            .collect();

        let files = self.fetch_all(&runs, request.preset, &mut outcomes).await?;
        info!(fetched = files.len(), attempted = attempted, "Fetched {}/{}", files.len(), attempted);
        if files.is_empty() {
            return Err(ForecastError::NoSuccessfulFetches { attempted });
        }
        let fetched = files.len();

        let datasets = self.decode_all(files, request.preset, &mut outcomes).await?;
        info!(decoded = datasets.len(), attempted = attempted, "Decoded {}/{}", datasets.len(), attempted);
        if datasets.len() < MIN_RUNS {
            return Err(ForecastError::InsufficientDatasets {
                attempted,
                usable: datasets.len(),
            });
        }
        let decoded = datasets.len();

        let config = self.config.clone();
        let (target, preset) = (request.target, request.preset);
        let artifacts = tokio::task::spawn_blocking(move || {
            render_artifacts(&datasets, target, preset, &config)
        })
        .await
        .map_err(|e| ForecastError::RenderError(format!("render task failed: {}", e)))??;

        let report_path = self
            .config
            .output_dir
            .join(format!("report_{}.json", artifact_stem(target, preset)));

        let report = EvolutionReport {
            target,
            preset,
            lookback_days: request.lookback_days,
            attempted,
            fetched,
            decoded,
            runs: outcomes,
            artifacts,
            report: report_path.clone(),
        };

        tokio::fs::write(&report_path, serde_json::to_vec_pretty(&report)?).await?;
        info!(path = %report_path.display(), "Report written");

        Ok(report)
    }

    /// Fetch every run with at most `max_concurrent` transfers in flight.
    ///
    /// Results come back in selector order whatever order transfers finish in.
    async fn fetch_all(
        &self,
        runs: &[CandidateRun],
        preset: VariablePreset,
        outcomes: &mut [RunOutcome],
    ) -> ForecastResult<Vec<(CandidateRun, PathBuf)>> {
        let mut results: Vec<(usize, ForecastResult<PathBuf>)> = stream::iter(runs.iter().copied().enumerate())
            .map(|(index, candidate)| {
                let fetcher = Arc::clone(&self.fetcher);
                let request = FetchRequest::new(candidate, preset, self.config.region);
                async move { (index, fetcher.fetch(&request).await) }
            })
            .buffer_unordered(self.config.max_concurrent.max(1))
            .collect()
            .await;

        results.sort_by_key(|(index, _)| *index);

        let mut files = Vec::with_capacity(results.len());
        for (index, result) in results {
            let candidate = runs[index];
            match result {
                Ok(path) => {
                    outcomes[index].fetched = true;
                    files.push((candidate, path));
                }
                Err(e) if e.is_per_candidate() => {
                    warn!(cycle = %candidate.cycle, error = %e, "Skipping run, fetch failed");
                    outcomes[index].error = Some(e.to_string());
                }
                Err(e) => {
                    error!(cycle = %candidate.cycle, error = %e, "Fetch aborted");
                    return Err(e);
                }
            }
        }

        Ok(files)
    }

    /// Decode fetched files on the blocking pool, skipping unreadable ones.
    async fn decode_all(
        &self,
        files: Vec<(CandidateRun, PathBuf)>,
        preset: VariablePreset,
        outcomes: &mut [RunOutcome],
    ) -> ForecastResult<Vec<Dataset>> {
        let mut datasets = Vec::with_capacity(files.len());

        for (candidate, path) in files {
            let reader = Arc::clone(&self.reader);
            let task_path = path.clone();
            let result = tokio::task::spawn_blocking(move || reader.read_field(&task_path, preset))
                .await
                .map_err(|e| ForecastError::DecodeFailure(format!("decoder task failed: {}", e)))
                .and_then(|r| r);

            let outcome = outcomes.iter_mut().find(|o| o.cycle == candidate.cycle);

            match result {
                Ok(field) => {
                    check_reference_time(&candidate, &field, &path);
                    if let Some(outcome) = outcome {
                        outcome.decoded = true;
                    }
                    datasets.push(Dataset { candidate, field });
                }
                Err(e) if e.is_per_candidate() => {
                    warn!(cycle = %candidate.cycle, path = %path.display(), error = %e, "Skipping run, decode failed");
                    if let Some(outcome) = outcome {
                        outcome.error = Some(e.to_string());
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Ok(datasets)
    }
}

/// Resolve once a shutdown is signalled; never if every sender is gone.
async fn wait_for_shutdown(shutdown: &mut broadcast::Receiver<()>) {
    if let Err(broadcast::error::RecvError::Closed) = shutdown.recv().await {
        std::future::pending::<()>().await;
    }
}

fn check_reference_time(candidate: &CandidateRun, field: &Field, path: &Path) {
    if let Some(reference) = field.reference_time {
        if reference != candidate.cycle.datetime() {
            warn!(
                cycle = %candidate.cycle,
                reference_time = %reference,
                path = %path.display(),
                "File reference time does not match the requested cycle"
            );
        }
    }
}

/// Render frames, the animation and (when possible) the RMSE chart.
///
/// Synchronous; callers on the async runtime use `spawn_blocking`.
pub fn render_artifacts(
    datasets: &[Dataset],
    target: DateTime<Utc>,
    preset: VariablePreset,
    config: &EvolutionConfig,
) -> ForecastResult<Artifacts> {
    let font = config.font_path.as_deref().and_then(|path| match load_font(path) {
        Ok(font) => Some(font),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Font unavailable, rendering without text");
            None
        }
    });

    std::fs::create_dir_all(&config.output_dir)?;
    let stem = artifact_stem(target, preset);

    let (width, height) = config.frame_size;
    let style = FrameStyle::for_preset(preset)
        .with_size(width, height)
        .with_view(config.view)
        .with_font(font.clone());

    let frames = datasets
        .iter()
        .map(|d| {
            let c = &d.candidate;
            let meta = FrameMeta::new(c.cycle, target, c.lead_hours, c.resolved_lead_hours);
            render_frame(&d.field, &meta, &style)
        })
        .collect::<ForecastResult<Vec<_>>>()?;

    let animation = config.output_dir.join(format!("forecast_{}.gif", stem));
    write_gif(&animation, frames, config.fps)?;

    let pairs: Vec<(ModelCycle, &Field)> = datasets
        .iter()
        .map(|d| (d.candidate.cycle, &d.field))
        .collect();
    let rmse = rmse_evolution(&pairs).unwrap_or_default();

    let chart = if rmse.is_empty() {
        None
    } else {
        let path = config.output_dir.join(format!("rmse_{}.png", stem));
        match write_rmse_chart(&path, &rmse, preset, font) {
            Ok(()) => Some(path),
            Err(e) => {
                warn!(error = %e, "RMSE chart not written");
                None
            }
        }
    };

    Ok(Artifacts {
        animation,
        chart,
        rmse,
    })
}

fn write_rmse_chart(
    path: &Path,
    rmse: &[RmsePoint],
    preset: VariablePreset,
    font: Option<SharedFont>,
) -> ForecastResult<()> {
    let points: Vec<ChartPoint> = rmse
        .iter()
        .map(|p| ChartPoint::new(p.label.clone(), p.rmse))
        .collect();

    let reference = rmse.last().map(|p| run_label(&p.cycle)).unwrap_or_default();
    let style = ChartStyle {
        title: vec![
            format!("Forecast evolution {}", preset.variable().code()),
            format!("Spatial RMSE against the latest run ({})", reference),
        ],
        y_label: format!("Spatial RMSE ({})", preset.units()),
        font,
        ..ChartStyle::default()
    };

    let chart = render_line_chart(&points, &style)?;
    write_png(path, &chart)?;
    Ok(())
}
