//! Reading one preset's field out of a downloaded GRIB2 file.

use std::io::Cursor;
use std::path::Path;

use tracing::{debug, instrument, warn};

use forecast_common::{ForecastError, ForecastResult, VariablePreset};

use crate::field::Field;
use crate::header::parse_identification;
use crate::tables::{ParameterCode, SurfaceCode};

/// Decodes a local grid file into a [`Field`].
///
/// Implementations are synchronous; async callers run them on the blocking
/// pool.
pub trait FieldReader: Send + Sync {
    fn read_field(&self, path: &Path, preset: VariablePreset) -> ForecastResult<Field>;
}

/// [`FieldReader`] backed by the `grib` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct GribFieldReader;

impl GribFieldReader {
    pub fn new() -> Self {
        Self
    }

    /// Decode the first submessage in `data` that carries `preset`.
    pub fn decode_bytes(&self, data: &[u8], preset: VariablePreset) -> ForecastResult<Field> {
        let identification =
            parse_identification(data).map_err(|e| ForecastError::DecodeFailure(e.to_string()))?;

        let mut field = decode_submessage(data, preset)?
            .with_reference_time(Some(identification.reference_time))
            .with_units(preset.units());

        if preset.converts_kelvin_to_celsius() {
            field.kelvin_to_celsius();
        }

        Ok(field)
    }
}

impl FieldReader for GribFieldReader {
    #[instrument(skip(self), fields(path = %path.display()))]
    fn read_field(&self, path: &Path, preset: VariablePreset) -> ForecastResult<Field> {
        let data = std::fs::read(path).map_err(|e| {
            ForecastError::DecodeFailure(format!("cannot read {}: {}", path.display(), e))
        })?;

        self.decode_bytes(&data, preset).map_err(|e| match e {
            ForecastError::DecodeFailure(msg) => {
                ForecastError::DecodeFailure(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }
}

fn grib_error(context: &str, err: impl std::fmt::Display) -> ForecastError {
    ForecastError::DecodeFailure(format!("{}: {}", context, err))
}

fn decode_submessage(data: &[u8], preset: VariablePreset) -> ForecastResult<Field> {
    let grib2 = grib::from_reader(Cursor::new(data)).map_err(|e| grib_error("parse", e))?;

    let wanted = ParameterCode::for_variable(preset.variable());
    let level = preset.level();

    for ((message_no, submessage_no), submessage) in grib2.iter() {
        let discipline = submessage.indicator().discipline;
        let prod_def = submessage.prod_def();
        let (Some(category), Some(number)) =
            (prod_def.parameter_category(), prod_def.parameter_number())
        else {
            continue;
        };

        if !wanted.matches(discipline, category, number) {
            continue;
        }

        let Some((first, _second)) = prod_def.fixed_surfaces() else {
            continue;
        };
        let surface = SurfaceCode::new(first.surface_type, first.scale_factor, first.scaled_value);
        if !surface.is_level(level) {
            debug!(
                message_no,
                submessage_no,
                level = %surface.describe(),
                "Skipping submessage on another level"
            );
            continue;
        }

        debug!(
            message_no,
            submessage_no,
            parameter = %wanted.short_name(),
            level = %surface.describe(),
            "Decoding submessage"
        );

        let (width, height) = submessage.grid_shape().map_err(|e| grib_error("grid shape", e))?;
        let latlons: Vec<(f32, f32)> = submessage
            .latlons()
            .map_err(|e| grib_error("grid coordinates", e))?
            .collect();

        let decoder = grib::Grib2SubmessageDecoder::from(submessage)
            .map_err(|e| grib_error("decoder", e))?;
        let values: Vec<f32> = decoder
            .dispatch()
            .map_err(|e| grib_error("unpack", e))?
            .collect();

        if values.iter().all(|v| !v.is_finite()) {
            warn!(parameter = %wanted.short_name(), "Decoded field has no finite values");
        }

        return Field::from_latlons(width, height, values, &latlons);
    }

    Err(ForecastError::DecodeFailure(format!(
        "no {} submessage at {}",
        preset.variable(),
        level
    )))
}
