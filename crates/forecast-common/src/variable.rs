//! Variable and vertical-level vocabulary exposed to callers.
//!
//! The set is fixed: each [`VariablePreset`] pairs one archive variable with
//! one level, plus the display conventions used when rendering it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ForecastError;
use crate::time::ModelCycle;

/// Archive variable short codes (NOMADS filter names).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variable {
    /// Geopotential height
    Hgt,
    /// Total accumulated precipitation
    Apcp,
    /// Temperature
    Tmp,
}

impl Variable {
    /// Code used by the archive and in cache filenames.
    pub fn code(&self) -> &'static str {
        match self {
            Variable::Hgt => "HGT",
            Variable::Apcp => "APCP",
            Variable::Tmp => "TMP",
        }
    }

    /// Short name used by GRIB decoders (ecCodes convention).
    pub fn short_name(&self) -> &'static str {
        match self {
            Variable::Hgt => "gh",
            Variable::Apcp => "tp",
            Variable::Tmp => "t",
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Vertical level of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Level {
    /// Constant-pressure surface in hPa
    Isobaric(u32),
    /// Ground or water surface
    Surface,
}

impl Level {
    /// Level key as the NOMADS filter expects it ("500_mb", "surface").
    pub fn filter_key(&self) -> String {
        match self {
            Level::Isobaric(hpa) => format!("{}_mb", hpa),
            Level::Surface => "surface".to_string(),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Isobaric(hpa) => write!(f, "{} hPa", hpa),
            Level::Surface => f.write_str("surface"),
        }
    }
}

/// One selectable (variable, level) combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariablePreset {
    Hgt500,
    Apcp,
    Tmp850,
    Tmp500,
}

impl VariablePreset {
    pub const ALL: [VariablePreset; 4] = [
        VariablePreset::Hgt500,
        VariablePreset::Apcp,
        VariablePreset::Tmp850,
        VariablePreset::Tmp500,
    ];

    pub fn variable(&self) -> Variable {
        match self {
            VariablePreset::Hgt500 => Variable::Hgt,
            VariablePreset::Apcp => Variable::Apcp,
            VariablePreset::Tmp850 | VariablePreset::Tmp500 => Variable::Tmp,
        }
    }

    pub fn level(&self) -> Level {
        match self {
            VariablePreset::Hgt500 | VariablePreset::Tmp500 => Level::Isobaric(500),
            VariablePreset::Tmp850 => Level::Isobaric(850),
            VariablePreset::Apcp => Level::Surface,
        }
    }

    /// Identifier used on the command line and in artifact names.
    pub fn id(&self) -> &'static str {
        match self {
            VariablePreset::Hgt500 => "hgt500",
            VariablePreset::Apcp => "apcp",
            VariablePreset::Tmp850 => "tmp850",
            VariablePreset::Tmp500 => "tmp500",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            VariablePreset::Hgt500 => "Geopotential height 500 hPa",
            VariablePreset::Apcp => "Precipitation",
            VariablePreset::Tmp850 => "Temperature 850 hPa",
            VariablePreset::Tmp500 => "Temperature 500 hPa",
        }
    }

    /// Display unit after any conversion.
    pub fn units(&self) -> &'static str {
        match self.variable() {
            Variable::Hgt => "m",
            Variable::Apcp => "mm",
            Variable::Tmp => "°C",
        }
    }

    /// Temperature fields arrive in Kelvin and are shown in Celsius.
    pub fn converts_kelvin_to_celsius(&self) -> bool {
        self.variable() == Variable::Tmp
    }

    /// Fixed color-scale range (min, max) in display units.
    pub fn value_range(&self) -> (f32, f32) {
        match self.variable() {
            Variable::Hgt => (5400.0, 5880.0),
            Variable::Apcp => (0.0, 50.0),
            Variable::Tmp => (-10.0, 35.0),
        }
    }

    /// Number of contour levels drawn over the color field (0 = none).
    pub fn contour_levels(&self) -> usize {
        match self.variable() {
            Variable::Hgt => 20,
            Variable::Apcp => 0,
            Variable::Tmp => 15,
        }
    }
}

impl fmt::Display for VariablePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for VariablePreset {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        VariablePreset::ALL
            .into_iter()
            .find(|p| p.id() == needle)
            .ok_or_else(|| {
                let known: Vec<&str> = VariablePreset::ALL.iter().map(|p| p.id()).collect();
                ForecastError::invalid_parameter(
                    "variable",
                    format!("unknown preset '{}', expected one of {}", s, known.join(", ")),
                )
            })
    }
}

/// Cache filename for one archive file.
///
/// Format: `gfs_{VAR}_{YYYYMMDD}_{HH}z_f{FFF}.grib2`. The same key always maps
/// to the same name so previously downloaded files are reused.
pub fn cache_file_name(variable: Variable, cycle: &ModelCycle, lead_hours: u32) -> String {
    format!(
        "gfs_{}_{}_{:02}z_f{:03}.grib2",
        variable.code(),
        cycle.date_string(),
        cycle.hour(),
        lead_hours
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_cache_file_name() {
        let cycle = ModelCycle::floor(Utc.with_ymd_and_hms(2024, 1, 9, 18, 0, 0).unwrap());
        assert_eq!(
            cache_file_name(Variable::Hgt, &cycle, 36),
            "gfs_HGT_20240109_18z_f036.grib2"
        );

        let cycle = ModelCycle::floor(Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap());
        assert_eq!(
            cache_file_name(Variable::Apcp, &cycle, 0),
            "gfs_APCP_20240110_00z_f000.grib2"
        );
    }

    #[test]
    fn test_filter_keys() {
        assert_eq!(VariablePreset::Hgt500.level().filter_key(), "500_mb");
        assert_eq!(VariablePreset::Tmp850.level().filter_key(), "850_mb");
        assert_eq!(VariablePreset::Apcp.level().filter_key(), "surface");
    }

    #[test]
    fn test_preset_round_trip_through_id() {
        for preset in VariablePreset::ALL {
            assert_eq!(preset.id().parse::<VariablePreset>().unwrap(), preset);
        }
        assert_eq!("TMP850".parse::<VariablePreset>().unwrap(), VariablePreset::Tmp850);
    }

    #[test]
    fn test_unknown_preset() {
        let err = "wind10m".parse::<VariablePreset>().unwrap_err();
        assert!(err.to_string().contains("hgt500"));
    }

    #[test]
    fn test_display_conventions() {
        assert!(VariablePreset::Tmp500.converts_kelvin_to_celsius());
        assert!(!VariablePreset::Hgt500.converts_kelvin_to_celsius());
        assert_eq!(VariablePreset::Apcp.contour_levels(), 0);
        assert_eq!(VariablePreset::Hgt500.value_range(), (5400.0, 5880.0));
        assert_eq!(VariablePreset::Tmp850.units(), "°C");
    }
}
