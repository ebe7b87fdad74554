//! Common test fixtures for forecast-evolution tests.
//!
//! Pre-defined regions, grids and timestamps shared by the selector,
//! reader, renderer and pipeline tests.

/// Common bounding box definitions for testing, as (min_lon, min_lat, max_lon, max_lat).
pub mod bbox {
    /// Area requested from the archive
    pub const DOWNLOAD_REGION: (f64, f64, f64, f64) = (6.0, 36.0, 19.0, 47.0);

    /// Piemonte map view
    pub const PIEMONTE: (f64, f64, f64, f64) = (6.5, 44.0, 9.3, 46.6);
}

/// Common grid specifications for testing.
pub mod grid {
    /// GFS 0.25 degree subregion covering the download region.
    ///
    /// Rows run north to south as in the archive files.
    pub const GFS_SUBREGION: GridSpec = GridSpec {
        width: 53,
        height: 45,
        lon0: 6.0,
        lat0: 47.0,
        dlon: 0.25,
        dlat: -0.25,
    };

    /// Simple 10x10 one-degree grid anchored at the region corner
    pub const SIMPLE_10X10: GridSpec = GridSpec {
        width: 10,
        height: 10,
        lon0: 6.0,
        lat0: 47.0,
        dlon: 1.0,
        dlat: -1.0,
    };

    /// Grid specification for testing.
    #[derive(Debug, Clone, Copy)]
    pub struct GridSpec {
        pub width: usize,
        pub height: usize,
        /// Longitude of the first grid column
        pub lon0: f64,
        /// Latitude of the first grid row
        pub lat0: f64,
        pub dlon: f64,
        pub dlat: f64,
    }

    impl GridSpec {
        /// Returns the total number of grid cells.
        pub fn size(&self) -> usize {
            self.width * self.height
        }
    }
}

/// Fixed instants for run-selection scenarios.
pub mod time {
    use chrono::{DateTime, TimeZone, Utc};

    /// Build a UTC instant on the hour.
    pub fn utc(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
            .single()
            .expect("valid fixture timestamp")
    }

    /// Wall clock for the reference scenario (2024-01-10T13:00Z).
    pub fn scenario_now() -> DateTime<Utc> {
        utc(2024, 1, 10, 13)
    }

    /// Target for the reference scenario (2024-01-11T06:00Z).
    pub fn scenario_target() -> DateTime<Utc> {
        utc(2024, 1, 11, 6)
    }

    /// GFS model run hours
    pub const GFS_CYCLES: [u32; 4] = [0, 6, 12, 18];
}
