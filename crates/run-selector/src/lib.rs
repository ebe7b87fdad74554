//! Run selection for forecast-evolution requests.
//!
//! Given a target time and a lookback window, works out which GFS cycles can
//! have produced a forecast for that exact target and which lead hour has to
//! be requested from the archive for each of them.
//!
//! Everything here is a pure function of its inputs. The wall clock is
//! passed in as `now`; nothing in this crate samples it.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use forecast_common::time::CYCLE_INTERVAL_HOURS;
use forecast_common::{ForecastError, ForecastResult, ModelCycle};

/// Longest lead time the archive publishes (16 days).
pub const MAX_FORECAST_HOUR: i64 = 384;

/// Leads up to and including this value are published every 3 hours,
/// longer ones every 6 hours.
pub const THREE_HOURLY_LIMIT: u32 = 120;

/// Fewest candidate runs that make an evolution worth rendering.
pub const MIN_RUNS: usize = 2;

/// Upper bound on the lookback window, in days.
pub const MAX_LOOKBACK_DAYS: i64 = 365;

const CYCLES_PER_DAY: i64 = 24 / CYCLE_INTERVAL_HOURS;

/// Rule deciding whether a cycle can serve the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum EligibilityMode {
    /// Keep cycles with `0 <= lead <= MAX_FORECAST_HOUR`.
    #[default]
    Strict,
    /// Deprecated: keep every cycle strictly before the target, with no
    /// upper bound on the lead.
    ///
    /// Retained only to reproduce older outputs. Cycles beyond the archive
    /// horizon pass this check but cannot be downloaded.
    Legacy,
}

impl EligibilityMode {
    fn accepts(&self, cycle: &ModelCycle, target: DateTime<Utc>, lead_hours: i64) -> bool {
        match self {
            EligibilityMode::Strict => (0..=MAX_FORECAST_HOUR).contains(&lead_hours),
            EligibilityMode::Legacy => target > cycle.datetime(),
        }
    }
}

/// One cycle paired with the lead hour to request for the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CandidateRun {
    pub cycle: ModelCycle,
    /// Whole hours from cycle to target
    pub lead_hours: u32,
    /// Lead snapped to the archive's output step
    pub resolved_lead_hours: u32,
}

impl CandidateRun {
    /// Valid time of the archive file that will be fetched.
    pub fn valid_time(&self) -> DateTime<Utc> {
        self.cycle.datetime() + Duration::hours(self.resolved_lead_hours as i64)
    }

    /// Hours between the fetched valid time and the target (0 or negative).
    pub fn offset_from_target(&self, target: DateTime<Utc>) -> i64 {
        (self.valid_time() - target).num_hours()
    }
}

/// Outcome of checking a single generated cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CycleEvaluation {
    pub cycle: ModelCycle,
    pub lead_hours: i64,
    pub accepted: bool,
}

/// Snap a lead time down to a lead the archive actually publishes.
///
/// ```
/// use run_selector::resolve_lead_time;
///
/// assert_eq!(resolve_lead_time(20), 18);
/// assert_eq!(resolve_lead_time(120), 120);
/// assert_eq!(resolve_lead_time(125), 120);
/// ```
pub fn resolve_lead_time(lead_hours: u32) -> u32 {
    if lead_hours <= THREE_HOURLY_LIMIT {
        (lead_hours / 3) * 3
    } else {
        (lead_hours / 6) * 6
    }
}

/// Whole hours from `cycle` to `target`, truncated toward zero.
pub fn lead_hours_between(cycle: &ModelCycle, target: DateTime<Utc>) -> i64 {
    (target - cycle.datetime()).num_seconds() / 3600
}

/// Every cycle inside the lookback window, most recent first.
///
/// Always yields `lookback_days * 4` cycles, starting at the last cycle not
/// later than `now`.
///
/// `lookback_days` must be in `1..=MAX_LOOKBACK_DAYS`. The upper bound is an
/// added guard on top of rejecting non-positive windows.
pub fn candidate_cycles(now: DateTime<Utc>, lookback_days: i64) -> ForecastResult<Vec<ModelCycle>> {
    if lookback_days <= 0 {
        return Err(ForecastError::invalid_parameter(
            "lookback_days",
            format!("must be positive, got {}", lookback_days),
        ));
    }
    if lookback_days > MAX_LOOKBACK_DAYS {
        return Err(ForecastError::invalid_parameter(
            "lookback_days",
            format!("must not exceed {}, got {}", MAX_LOOKBACK_DAYS, lookback_days),
        ));
    }

    let base = ModelCycle::floor(now);
    Ok((0..lookback_days * CYCLES_PER_DAY)
        .map(|step| base.back(step))
        .collect())
}

/// Check every generated cycle against `mode`, most recent first.
pub fn evaluate_cycles(
    now: DateTime<Utc>,
    target: DateTime<Utc>,
    lookback_days: i64,
    mode: EligibilityMode,
) -> ForecastResult<Vec<CycleEvaluation>> {
    Ok(candidate_cycles(now, lookback_days)?
        .into_iter()
        .map(|cycle| {
            let lead_hours = lead_hours_between(&cycle, target);
            CycleEvaluation {
                cycle,
                lead_hours,
                accepted: mode.accepts(&cycle, target, lead_hours),
            }
        })
        .collect())
}

/// Select the runs able to forecast `target`, oldest first.
///
/// Uses [`EligibilityMode::Strict`]. Fails with
/// [`ForecastError::InsufficientRuns`] when fewer than [`MIN_RUNS`] survive.
pub fn select_runs(
    now: DateTime<Utc>,
    target: DateTime<Utc>,
    lookback_days: i64,
) -> ForecastResult<Vec<CandidateRun>> {
    select_runs_with(now, target, lookback_days, EligibilityMode::Strict)
}

/// [`select_runs`] with an explicit eligibility rule.
pub fn select_runs_with(
    now: DateTime<Utc>,
    target: DateTime<Utc>,
    lookback_days: i64,
    mode: EligibilityMode,
) -> ForecastResult<Vec<CandidateRun>> {
    let mut runs: Vec<CandidateRun> = evaluate_cycles(now, target, lookback_days, mode)?
        .into_iter()
        .filter(|eval| eval.accepted)
        .filter_map(|eval| {
            let lead_hours = u32::try_from(eval.lead_hours).ok()?;
            Some(CandidateRun {
                cycle: eval.cycle,
                lead_hours,
                resolved_lead_hours: resolve_lead_time(lead_hours),
            })
        })
        .collect();

    // generated newest first; consumers want chronological order
    runs.reverse();

    if runs.len() < MIN_RUNS {
        return Err(ForecastError::InsufficientRuns { found: runs.len() });
    }

    Ok(runs)
}
