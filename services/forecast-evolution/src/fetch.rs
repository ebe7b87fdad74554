//! Archive fetcher for GFS subsets from the NOMADS GRIB filter.
//!
//! Key behavior:
//! - One file per candidate run, named deterministically so reruns hit the cache
//! - Files live under a per-level subdirectory, since the name carries only the variable
//! - Streams into `{name}.partial` and renames only after the body is complete
//! - Single timed attempt by default, optional retries with exponential backoff

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use forecast_common::{cache_file_name, BoundingBox, ForecastError, ForecastResult, VariablePreset};
use run_selector::CandidateRun;

use crate::config::FetchConfig;

/// GRIB filter for the 0.25 degree GFS output.
pub const NOMADS_FILTER_URL: &str = "https://nomads.ncep.noaa.gov/cgi-bin/filter_gfs_0p25.pl";

/// One file to fetch: which run, which field, which area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchRequest {
    pub candidate: CandidateRun,
    pub preset: VariablePreset,
    pub bbox: BoundingBox,
}

impl FetchRequest {
    pub fn new(candidate: CandidateRun, preset: VariablePreset, bbox: BoundingBox) -> Self {
        Self {
            candidate,
            preset,
            bbox,
        }
    }

    /// Cache filename, keyed on variable, cycle and resolved lead.
    pub fn file_name(&self) -> String {
        cache_file_name(
            self.preset.variable(),
            &self.candidate.cycle,
            self.candidate.resolved_lead_hours,
        )
    }

    /// Location relative to the cache root: `{level}/{file_name}`.
    pub fn cache_relative_path(&self) -> PathBuf {
        Path::new(&self.preset.level().filter_key()).join(self.file_name())
    }

    /// Query string understood by the GRIB filter.
    pub fn query_params(&self) -> Vec<(String, String)> {
        let cycle = &self.candidate.cycle;
        vec![
            (
                "dir".to_string(),
                format!("/gfs.{}/{:02}/atmos", cycle.date_string(), cycle.hour()),
            ),
            (
                "file".to_string(),
                format!(
                    "gfs.t{:02}z.pgrb2.0p25.f{:03}",
                    cycle.hour(),
                    self.candidate.resolved_lead_hours
                ),
            ),
            (format!("var_{}", self.preset.variable().code()), "on".to_string()),
            (format!("lev_{}", self.preset.level().filter_key()), "on".to_string()),
            ("subregion".to_string(), String::new()),
            ("leftlon".to_string(), self.bbox.min_lon.to_string()),
            ("rightlon".to_string(), self.bbox.max_lon.to_string()),
            ("toplat".to_string(), self.bbox.max_lat.to_string()),
            ("bottomlat".to_string(), self.bbox.min_lat.to_string()),
        ]
    }
}

/// Produces a local GRIB2 file for a request.
#[async_trait]
pub trait GridFetcher: Send + Sync {
    /// Path of the downloaded (or cached) file, or a `FetchFailure`.
    async fn fetch(&self, request: &FetchRequest) -> ForecastResult<PathBuf>;
}

/// [`GridFetcher`] talking to the NOMADS GRIB filter over HTTP.
pub struct NomadsFetcher {
    client: Client,
    config: FetchConfig,
}

impl NomadsFetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.request_timeout)
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    pub fn cache_path(&self, request: &FetchRequest) -> PathBuf {
        self.config.cache_dir.join(request.cache_relative_path())
    }

    /// One GET into `partial`. Returns the number of bytes written.
    async fn download_to(&self, request: &FetchRequest, partial: &Path) -> Result<u64> {
        let response = self
            .client
            .get(&self.config.base_url)
            .query(&request.query_params())
            .send()
            .await
            .context("HTTP request failed")?;

        match response.status() {
            StatusCode::OK => {}
            status => return Err(anyhow!("HTTP error: {}", status)),
        }

        let mut file = fs::File::create(partial)
            .await
            .context("Failed to open output file")?;

        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Error reading response chunk")?;
            file.write_all(&chunk)
                .await
                .context("Error writing to file")?;
            written += chunk.len() as u64;
        }

        file.flush().await?;
        file.sync_all().await?;

        if written == 0 {
            bail!("empty response body");
        }
        Ok(written)
    }
}

#[async_trait]
impl GridFetcher for NomadsFetcher {
    #[instrument(skip(self, request), fields(
        cycle = %request.candidate.cycle,
        lead = request.candidate.resolved_lead_hours,
    ))]
    async fn fetch(&self, request: &FetchRequest) -> ForecastResult<PathBuf> {
        let final_path = self.cache_path(request);

        if fs::try_exists(&final_path).await.unwrap_or(false) {
            debug!(path = %final_path.display(), "Using cached file");
            return Ok(final_path);
        }

        let level_dir = final_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.cache_dir.clone());
        fs::create_dir_all(&level_dir).await.map_err(|e| {
            ForecastError::FetchFailure(format!(
                "cannot create cache directory {}: {}",
                level_dir.display(),
                e
            ))
        })?;

        let partial = level_dir.join(format!("{}.partial", request.file_name()));

        let mut retry_count = 0;
        let mut delay = self.config.initial_retry_delay;

        loop {
            match self.download_to(request, &partial).await {
                Ok(bytes) => {
                    if let Err(e) = fs::rename(&partial, &final_path).await {
                        let _ = fs::remove_file(&partial).await;
                        return Err(ForecastError::FetchFailure(format!(
                            "cannot move download into {}: {}",
                            final_path.display(),
                            e
                        )));
                    }

                    info!(path = %final_path.display(), bytes = bytes, "Download completed");
                    return Ok(final_path);
                }
                Err(e) => {
                    let _ = fs::remove_file(&partial).await;

                    if retry_count >= self.config.max_retries {
                        warn!(file = %request.file_name(), error = %e, "Download failed");
                        return Err(ForecastError::FetchFailure(format!(
                            "{}: {:#}",
                            request.file_name(),
                            e
                        )));
                    }

                    retry_count += 1;
                    warn!(
                        error = %e,
                        retry = retry_count,
                        max_retries = self.config.max_retries,
                        delay_secs = delay.as_secs_f64(),
                        "Download failed, retrying"
                    );

                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, self.config.max_retry_delay);
                }
            }
        }
    }
}
