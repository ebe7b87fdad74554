//! GRIB2 code tables for the variables and levels this workspace reads.
//!
//! Parameters follow WMO Code Table 4.2 (discipline, category, number) and
//! levels follow Code Table 4.5 (type of first fixed surface).

use forecast_common::{Level, Variable};

/// Meteorological products discipline (Code Table 0.0).
pub const DISCIPLINE_METEOROLOGICAL: u8 = 0;

/// Lookup key for a parameter: (discipline, category, number)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParameterCode {
    pub discipline: u8,
    pub category: u8,
    pub number: u8,
}

impl ParameterCode {
    pub const fn new(discipline: u8, category: u8, number: u8) -> Self {
        Self {
            discipline,
            category,
            number,
        }
    }

    /// Code under which the archive publishes `variable`.
    pub fn for_variable(variable: Variable) -> Self {
        match variable {
            // Mass: geopotential height
            Variable::Hgt => Self::new(DISCIPLINE_METEOROLOGICAL, 3, 5),
            // Moisture: total precipitation
            Variable::Apcp => Self::new(DISCIPLINE_METEOROLOGICAL, 1, 8),
            // Temperature: temperature
            Variable::Tmp => Self::new(DISCIPLINE_METEOROLOGICAL, 0, 0),
        }
    }

    pub fn matches(&self, discipline: u8, category: u8, number: u8) -> bool {
        self.discipline == discipline && self.category == category && self.number == number
    }

    /// Archive short name, or "P{d}_{c}_{n}" for codes not listed here.
    pub fn short_name(&self) -> String {
        [Variable::Hgt, Variable::Apcp, Variable::Tmp]
            .into_iter()
            .find(|v| Self::for_variable(*v) == *self)
            .map(|v| v.code().to_string())
            .unwrap_or_else(|| format!("P{}_{}_{}", self.discipline, self.category, self.number))
    }
}

/// Type of fixed surface (Code Table 4.5) with its scaled value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceCode {
    pub surface_type: u8,
    pub scale_factor: i8,
    pub scaled_value: i32,
}

impl SurfaceCode {
    /// Ground or water surface
    pub const GROUND: u8 = 1;
    /// Isobaric surface, value in Pa
    pub const ISOBARIC: u8 = 100;

    pub fn new(surface_type: u8, scale_factor: i8, scaled_value: i32) -> Self {
        Self {
            surface_type,
            scale_factor,
            scaled_value,
        }
    }

    /// Physical value after applying the scale factor.
    pub fn value(&self) -> f64 {
        self.scaled_value as f64 * 10f64.powi(-(self.scale_factor as i32))
    }

    /// True when this surface is the requested level.
    pub fn is_level(&self, level: Level) -> bool {
        match level {
            Level::Surface => self.surface_type == Self::GROUND,
            Level::Isobaric(hpa) => {
                self.surface_type == Self::ISOBARIC && (self.value() - hpa as f64 * 100.0).abs() < 0.5
            }
        }
    }

    /// Human-readable level, for logs.
    pub fn describe(&self) -> String {
        match self.surface_type {
            Self::GROUND => "surface".to_string(),
            Self::ISOBARIC => format!("{} mb", (self.value() / 100.0).round()),
            other => format!("Level type {} value {}", other, self.value()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_codes() {
        assert!(ParameterCode::for_variable(Variable::Hgt).matches(0, 3, 5));
        assert!(ParameterCode::for_variable(Variable::Tmp).matches(0, 0, 0));
        assert!(ParameterCode::for_variable(Variable::Apcp).matches(0, 1, 8));
        assert!(!ParameterCode::for_variable(Variable::Tmp).matches(0, 0, 2));
    }

    #[test]
    fn test_short_names() {
        assert_eq!(ParameterCode::new(0, 3, 5).short_name(), "HGT");
        assert_eq!(ParameterCode::new(0, 2, 2).short_name(), "P0_2_2");
    }

    #[test]
    fn test_isobaric_level_in_pascals() {
        let surface = SurfaceCode::new(SurfaceCode::ISOBARIC, 0, 50000);
        assert!(surface.is_level(Level::Isobaric(500)));
        assert!(!surface.is_level(Level::Isobaric(850)));
        assert!(!surface.is_level(Level::Surface));
        assert_eq!(surface.describe(), "500 mb");
    }

    #[test]
    fn test_scaled_isobaric_value() {
        // 850 hPa written as 850 * 10^2 with a negative scale factor
        let surface = SurfaceCode::new(SurfaceCode::ISOBARIC, -2, 850);
        assert!(surface.is_level(Level::Isobaric(850)));
    }

    #[test]
    fn test_ground_surface() {
        let surface = SurfaceCode::new(SurfaceCode::GROUND, 0, 0);
        assert!(surface.is_level(Level::Surface));
        assert!(!surface.is_level(Level::Isobaric(500)));
        assert_eq!(surface.describe(), "surface");
    }
}
