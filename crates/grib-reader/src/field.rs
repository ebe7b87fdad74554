//! Decoded regular lat/lon field.

use chrono::{DateTime, Utc};

use forecast_common::{BoundingBox, ForecastError, ForecastResult};

/// Offset between Kelvin and Celsius.
pub const KELVIN_OFFSET: f32 = 273.15;

/// A single decoded 2-D field on a regular lat/lon grid.
///
/// Values are row-major: `values[row * width + col]` lies at
/// (`lon0 + col * dlon`, `lat0 + row * dlat`). Archive files scan north to
/// south, so `dlat` is usually negative. Missing points are NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub width: usize,
    pub height: usize,
    pub values: Vec<f32>,
    pub lon0: f64,
    pub lat0: f64,
    pub dlon: f64,
    pub dlat: f64,
    /// Reference time from the identification section, if readable
    pub reference_time: Option<DateTime<Utc>>,
    pub units: String,
}

impl Field {
    /// Build a field, checking that `values` fills the grid.
    pub fn new(
        width: usize,
        height: usize,
        values: Vec<f32>,
        (lon0, lat0): (f64, f64),
        (dlon, dlat): (f64, f64),
    ) -> ForecastResult<Self> {
        if width == 0 || height == 0 {
            return Err(ForecastError::DecodeFailure(format!(
                "empty grid {}x{}",
                width, height
            )));
        }
        if values.len() != width * height {
            return Err(ForecastError::DecodeFailure(format!(
                "grid {}x{} expects {} values, got {}",
                width,
                height,
                width * height,
                values.len()
            )));
        }

        Ok(Self {
            width,
            height,
            values,
            lon0,
            lat0,
            dlon,
            dlat,
            reference_time: None,
            units: String::new(),
        })
    }

    /// Derive grid geometry from the decoder's (lat, lon) sequence.
    ///
    /// Longitudes in 0..360 are folded into -180..180.
    pub fn from_latlons(
        width: usize,
        height: usize,
        values: Vec<f32>,
        latlons: &[(f32, f32)],
    ) -> ForecastResult<Self> {
        if latlons.len() != width * height {
            return Err(ForecastError::DecodeFailure(format!(
                "grid {}x{} has {} coordinates",
                width,
                height,
                latlons.len()
            )));
        }

        let Some(&(lat0, lon0)) = latlons.first() else {
            return Err(ForecastError::DecodeFailure(format!(
                "grid {}x{} has no cells",
                width, height
            )));
        };
        let dlon = if width > 1 {
            normalize_lon(latlons[1].1 as f64) - normalize_lon(lon0 as f64)
        } else {
            0.0
        };
        let dlat = if height > 1 {
            (latlons[width].0 - lat0) as f64
        } else {
            0.0
        };

        Self::new(
            width,
            height,
            values,
            (normalize_lon(lon0 as f64), lat0 as f64),
            (dlon, dlat),
        )
    }

    pub fn with_reference_time(mut self, reference_time: Option<DateTime<Utc>>) -> Self {
        self.reference_time = reference_time;
        self
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = units.into();
        self
    }

    /// Convert every value from Kelvin to Celsius in place.
    pub fn kelvin_to_celsius(&mut self) {
        for v in &mut self.values {
            *v -= KELVIN_OFFSET;
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn same_shape(&self, other: &Field) -> bool {
        self.width == other.width && self.height == other.height
    }

    pub fn get(&self, col: usize, row: usize) -> Option<f32> {
        if col >= self.width || row >= self.height {
            return None;
        }
        self.values.get(row * self.width + col).copied()
    }

    pub fn lon_at(&self, col: usize) -> f64 {
        self.lon0 + col as f64 * self.dlon
    }

    pub fn lat_at(&self, row: usize) -> f64 {
        self.lat0 + row as f64 * self.dlat
    }

    /// Value of the grid cell nearest to (lon, lat), or None outside the grid.
    pub fn value_at(&self, lon: f64, lat: f64) -> Option<f32> {
        let col = nearest_index(lon, self.lon0, self.dlon, self.width)?;
        let row = nearest_index(lat, self.lat0, self.dlat, self.height)?;
        self.get(col, row)
    }

    /// Extent covered by the grid points.
    pub fn bbox(&self) -> BoundingBox {
        let lon_end = self.lon_at(self.width - 1);
        let lat_end = self.lat_at(self.height - 1);
        BoundingBox::new(
            self.lon0.min(lon_end),
            self.lat0.min(lat_end),
            self.lon0.max(lon_end),
            self.lat0.max(lat_end),
        )
    }

    /// Minimum and maximum of the finite values.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        self.values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

fn normalize_lon(lon: f64) -> f64 {
    if lon > 180.0 {
        lon - 360.0
    } else {
        lon
    }
}

fn nearest_index(coord: f64, origin: f64, step: f64, count: usize) -> Option<usize> {
    if step == 0.0 {
        return (count == 1 && (coord - origin).abs() < f64::EPSILON).then_some(0);
    }
    let idx = ((coord - origin) / step).round();
    if idx < 0.0 || idx >= count as f64 {
        return None;
    }
    Some(idx as usize)
}
