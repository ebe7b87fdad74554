//! Command-line arguments and typed configuration.
//!
//! Every flag can also be set from the environment (or a `.env` file loaded
//! by `main`).

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::Parser;

use forecast_common::{parse_target_time, BoundingBox, ForecastResult, VariablePreset};
use renderer::FrameStyle;
use run_selector::EligibilityMode;

use crate::fetch::NOMADS_FILTER_URL;

#[derive(Parser, Debug, Clone)]
#[command(name = "forecast-evolution")]
#[command(about = "Animate how successive GFS runs forecast one target time")]
pub struct Args {
    /// Target time (RFC 3339, YYYY-MM-DDTHH[:MM[:SS]] or YYYY-MM-DD)
    #[arg(long, env = "FORECAST_TARGET")]
    pub target: String,

    /// Hour of day for the target, overrides the parsed hour
    #[arg(long, env = "FORECAST_TARGET_HOUR")]
    pub target_hour: Option<u32>,

    /// Days of model runs to look back from now
    #[arg(long, env = "LOOKBACK_DAYS", default_value = "5")]
    pub lookback_days: i64,

    /// Variable preset (hgt500, apcp, tmp850, tmp500)
    #[arg(long, env = "FORECAST_VARIABLE", default_value = "hgt500")]
    pub variable: String,

    /// Directory for the animation, chart and report
    #[arg(long, env = "OUTPUT_DIR", default_value = "output")]
    pub output_dir: PathBuf,

    /// Directory for downloaded GRIB2 files
    #[arg(long, env = "CACHE_DIR", default_value = "cache")]
    pub cache_dir: PathBuf,

    /// Maximum concurrent downloads
    #[arg(long, env = "MAX_CONCURRENT", default_value = "4")]
    pub max_concurrent: usize,

    /// Per-request timeout in seconds
    #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value = "30")]
    pub timeout_secs: u64,

    /// Retries per file after the first attempt
    #[arg(long, env = "FETCH_MAX_RETRIES", default_value = "0")]
    pub max_retries: u32,

    /// GRIB filter endpoint
    #[arg(long, env = "NOMADS_BASE_URL", default_value = NOMADS_FILTER_URL)]
    pub base_url: String,

    /// TrueType font for titles and labels (text is omitted without one)
    #[arg(long, env = "FORECAST_FONT")]
    pub font: Option<PathBuf>,

    /// Animation frames per second
    #[arg(long, env = "FORECAST_FPS", default_value = "1.5")]
    pub fps: f32,

    /// Use the deprecated one-sided run eligibility check
    #[arg(long, env = "LEGACY_ELIGIBILITY")]
    pub legacy_eligibility: bool,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

impl Args {
    pub fn target_time(&self) -> ForecastResult<DateTime<Utc>> {
        parse_target_time(&self.target, self.target_hour)
    }

    pub fn preset(&self) -> ForecastResult<VariablePreset> {
        self.variable.parse()
    }

    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            base_url: self.base_url.clone(),
            cache_dir: self.cache_dir.clone(),
            request_timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            ..FetchConfig::default()
        }
    }

    pub fn evolution_config(&self) -> EvolutionConfig {
        EvolutionConfig {
            output_dir: self.output_dir.clone(),
            max_concurrent: self.max_concurrent.max(1),
            fps: self.fps,
            font_path: self.font.clone(),
            eligibility: if self.legacy_eligibility {
                EligibilityMode::Legacy
            } else {
                EligibilityMode::Strict
            },
            ..EvolutionConfig::default()
        }
    }
}

/// Settings for the archive fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub base_url: String,
    /// Where completed downloads are kept and looked up
    pub cache_dir: PathBuf,
    pub request_timeout: Duration,
    /// Extra attempts after the first one fails
    pub max_retries: u32,
    /// Initial retry delay (doubles each retry)
    pub initial_retry_delay: Duration,
    pub max_retry_delay: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: NOMADS_FILTER_URL.to_string(),
            cache_dir: PathBuf::from("cache"),
            request_timeout: Duration::from_secs(30),
            max_retries: 0,
            initial_retry_delay: Duration::from_secs(2),
            max_retry_delay: Duration::from_secs(60),
        }
    }
}

/// Settings for one evolution run.
#[derive(Debug, Clone)]
pub struct EvolutionConfig {
    pub output_dir: PathBuf,
    pub max_concurrent: usize,
    pub fps: f32,
    /// Frame width and height in pixels
    pub frame_size: (u32, u32),
    /// Area requested from the archive
    pub region: BoundingBox,
    /// Area drawn in each frame
    pub view: BoundingBox,
    pub font_path: Option<PathBuf>,
    pub eligibility: EligibilityMode,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            max_concurrent: 4,
            fps: renderer::DEFAULT_FPS,
            frame_size: (FrameStyle::DEFAULT_WIDTH, FrameStyle::DEFAULT_HEIGHT),
            region: BoundingBox::DOWNLOAD_REGION,
            view: BoundingBox::PIEMONTE_VIEW,
            font_path: None,
            eligibility: EligibilityMode::Strict,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn parse(args: &[&str]) -> Args {
        let mut argv = vec!["forecast-evolution"];
        argv.extend_from_slice(args);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["--target", "2024-01-11T06"]);
        assert_eq!(args.lookback_days, 5);
        assert_eq!(args.preset().unwrap(), VariablePreset::Hgt500);

        let fetch = args.fetch_config();
        assert_eq!(fetch.base_url, NOMADS_FILTER_URL);
        assert_eq!(fetch.request_timeout, Duration::from_secs(30));
        assert_eq!(fetch.max_retries, 0);

        let evolution = args.evolution_config();
        assert_eq!(evolution.max_concurrent, 4);
        assert_eq!(evolution.eligibility, EligibilityMode::Strict);
        assert_eq!(evolution.view, BoundingBox::PIEMONTE_VIEW);
    }

    #[test]
    fn test_target_hour_overrides() {
        let args = parse(&["--target", "2024-01-11", "--target-hour", "18"]);
        assert_eq!(
            args.target_time().unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 11, 18, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_invalid_inputs_are_parameter_errors() {
        let args = parse(&["--target", "2024-01-11", "--target-hour", "24"]);
        assert_eq!(args.target_time().unwrap_err().exit_code(), 2);

        let args = parse(&["--target", "2024-01-11", "--variable", "rh700"]);
        assert_eq!(args.preset().unwrap_err().exit_code(), 2);
    }

    #[test]
    fn test_legacy_flag_and_concurrency_floor() {
        let args = parse(&[
            "--target",
            "2024-01-11",
            "--legacy-eligibility",
            "--max-concurrent",
            "0",
        ]);
        let evolution = args.evolution_config();
        assert_eq!(evolution.eligibility, EligibilityMode::Legacy);
        assert_eq!(evolution.max_concurrent, 1);
    }
}
