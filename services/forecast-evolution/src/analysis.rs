//! Spatial RMSE of each run against the most recent one.

use serde::Serialize;
use tracing::{debug, warn};

use forecast_common::ModelCycle;
use grib_reader::Field;

/// Fewest points worth drawing as an evolution chart.
const MIN_POINTS: usize = 2;

/// RMSE of one run against the reference run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RmsePoint {
    pub cycle: ModelCycle,
    /// Run time as shown on the chart axis ("%d/%m %H:00")
    pub label: String,
    pub rmse: f64,
}

/// Root-mean-square difference over the cells finite in both grids.
///
/// `None` when the grids have different shapes or share no finite cell.
pub fn spatial_rmse(field: &Field, reference: &Field) -> Option<f64> {
    if !field.same_shape(reference) {
        return None;
    }

    let (sum, count) = field
        .values
        .iter()
        .zip(&reference.values)
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .fold((0.0_f64, 0usize), |(sum, count), (a, b)| {
            let diff = (*a - *b) as f64;
            (sum + diff * diff, count + 1)
        });

    (count > 0).then(|| (sum / count as f64).sqrt())
}

/// Axis label for a run.
pub fn run_label(cycle: &ModelCycle) -> String {
    cycle.datetime().format("%d/%m %H:00").to_string()
}

/// RMSE of every run against the last one, in input order.
///
/// Runs whose RMSE cannot be computed are skipped. Returns `None` when fewer
/// than two points remain; a missing chart never fails the request.
pub fn rmse_evolution(fields: &[(ModelCycle, &Field)]) -> Option<Vec<RmsePoint>> {
    let (reference_cycle, reference) = fields.last()?;

    let points: Vec<RmsePoint> = fields
        .iter()
        .filter_map(|(cycle, field)| match spatial_rmse(field, reference) {
            Some(rmse) => {
                debug!(cycle = %cycle, rmse = rmse, "Spatial RMSE");
                Some(RmsePoint {
                    cycle: *cycle,
                    label: run_label(cycle),
                    rmse,
                })
            }
            None => {
                warn!(
                    cycle = %cycle,
                    reference = %reference_cycle,
                    "Cannot compare run with reference, skipping"
                );
                None
            }
        })
        .collect();

    if points.len() < MIN_POINTS {
        warn!(points = points.len(), runs = fields.len(), "Not enough runs for an RMSE chart");
        return None;
    }

    Some(points)
}
