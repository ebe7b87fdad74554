//! Forecast-evolution service.
//!
//! Fetches every GFS run able to forecast one target time, renders the
//! fields as an animation and charts how each run differs from the latest.
//!
//! - [`fetch`]: NOMADS GRIB filter client with a file cache
//! - [`analysis`]: spatial RMSE against the most recent run
//! - [`pipeline`]: selection, concurrent fetch, decode and rendering
//! - [`config`]: command-line arguments and typed settings

pub mod analysis;
pub mod config;
pub mod fetch;
pub mod pipeline;

pub use analysis::{rmse_evolution, spatial_rmse, RmsePoint};
pub use config::{Args, EvolutionConfig, FetchConfig};
pub use fetch::{FetchRequest, GridFetcher, NomadsFetcher, NOMADS_FILTER_URL};
pub use pipeline::{
    artifact_stem, render_artifacts, Artifacts, Dataset, EvolutionPipeline, EvolutionReport,
    EvolutionRequest, RunOutcome,
};
