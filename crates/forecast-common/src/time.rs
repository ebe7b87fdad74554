//! Time handling for model cycles and forecast target times.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, ForecastResult};

/// Hours between two consecutive GFS cycles (00Z, 06Z, 12Z, 18Z).
pub const CYCLE_INTERVAL_HOURS: i64 = 6;

/// Model run initialization time.
///
/// Always aligned to a whole hour that is a multiple of
/// [`CYCLE_INTERVAL_HOURS`], with zero minutes, seconds and nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModelCycle(DateTime<Utc>);

impl ModelCycle {
    /// Most recent cycle not later than `instant`.
    pub fn floor(instant: DateTime<Utc>) -> Self {
        let cycle_hour = (instant.hour() as i64 / CYCLE_INTERVAL_HOURS) * CYCLE_INTERVAL_HOURS;
        let midnight = instant.date_naive().and_time(NaiveTime::MIN);
        Self(Utc.from_utc_datetime(&(midnight + Duration::hours(cycle_hour))))
    }

    /// Wrap `instant` if it already sits on a cycle boundary.
    pub fn from_datetime(instant: DateTime<Utc>) -> Option<Self> {
        let aligned = Self::floor(instant);
        (aligned.0 == instant).then_some(aligned)
    }

    /// The cycle `steps` intervals before this one.
    pub fn back(&self, steps: i64) -> Self {
        Self(self.0 - Duration::hours(steps * CYCLE_INTERVAL_HOURS))
    }

    pub fn datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Cycle hour of day (0, 6, 12 or 18).
    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    /// Date component as used in archive paths (YYYYMMDD).
    pub fn date_string(&self) -> String {
        self.0.format("%Y%m%d").to_string()
    }
}

impl fmt::Display for ModelCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %HZ"))
    }
}

impl From<ModelCycle> for DateTime<Utc> {
    fn from(cycle: ModelCycle) -> Self {
        cycle.0
    }
}

/// Parse a target time and truncate it to the hour.
///
/// Accepted forms:
/// - RFC 3339: "2024-01-11T06:00:00Z", "2024-01-11T07:00:00+01:00"
/// - Naive UTC: "2024-01-11T06:00:00", "2024-01-11T06:00", "2024-01-11T06"
/// - Date only: "2024-01-11" (midnight unless `hour` is given)
///
/// `hour`, when present, replaces the parsed hour of day.
pub fn parse_target_time(s: &str, hour: Option<u32>) -> ForecastResult<DateTime<Utc>> {
    let s = s.trim();
    let parsed = parse_instant(s).ok_or_else(|| {
        ForecastError::invalid_parameter(
            "target",
            format!("'{}' is not a recognised date/time", s),
        )
    })?;

    let hour = match hour {
        Some(h) if h >= 24 => {
            return Err(ForecastError::invalid_parameter(
                "target_hour",
                format!("{} is not an hour of day (0-23)", h),
            ))
        }
        Some(h) => h,
        None => parsed.hour(),
    };

    let truncated = parsed.date_naive().and_time(NaiveTime::MIN) + Duration::hours(hour as i64);
    Ok(Utc.from_utc_datetime(&truncated))
}

fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }

    // "YYYY-MM-DDTHH" carries no minutes, which chrono will not parse on its own
    if let Some((date, hour)) = s.split_once('T') {
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
        let hour: u32 = hour.parse().ok()?;
        let time = NaiveTime::from_hms_opt(hour, 0, 0)?;
        return Some(Utc.from_utc_datetime(&date.and_time(time)));
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN)))
}
