//! Common types and utilities shared across the forecast-evolution workspace.

pub mod bbox;
pub mod error;
pub mod time;
pub mod variable;

pub use bbox::BoundingBox;
pub use error::{ForecastError, ForecastResult};
pub use time::{parse_target_time, ModelCycle, CYCLE_INTERVAL_HOURS};
pub use variable::{cache_file_name, Level, Variable, VariablePreset};
