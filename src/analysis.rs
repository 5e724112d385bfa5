//! Deterministic analysis layer for race-time predictions
//!
//! Activities from the lookback window are reduced to total distance and
//! moving time, turned into weekly volume and mean pace, and fed through the
//! Tanda regression to estimate marathon and half-marathon times.

use crate::models::{ActivityRecord, AggregateResult, PredictionResult};
use crate::units::{km_to_miles, seconds_to_clock, whole_seconds};
use chrono::{DateTime, Days, NaiveDate, Utc};

/// ---------------------------------------------------------------------------
/// Tanda Model Parameters
/// ---------------------------------------------------------------------------

// Regression constants. Changing any of these is a model version change.
const TANDA_BASE_MINUTES: f64 = 12.0;
const TANDA_VOLUME_COEFFICIENT: f64 = 98.5;
const TANDA_VOLUME_DECAY_KM: f64 = -189.0;
const TANDA_SPEED_COEFFICIENT: f64 = 1390.0;
const SECONDS_PER_MINUTE: f64 = 60.0;

/// Fixed offset between the marathon estimate and the derived half.
const HALF_MARATHON_OFFSET_SECONDS: f64 = 600.0;

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
  #[error("no {activity_type} activities with distance in the last {weeks} weeks")]
  EmptyAggregate { activity_type: String, weeks: u32 },

  #[error("invalid model input: {0}")]
  InvalidInput(String),
}

/// ---------------------------------------------------------------------------
/// Lookback Window
/// ---------------------------------------------------------------------------

/// Half-open date range `[after, before)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookbackWindow {
  pub after: NaiveDate,
  pub before: NaiveDate,
  pub weeks: u32,
}

impl LookbackWindow {
  /// Window of `weeks` weeks ending (exclusively) on `before`.
  pub fn ending_on(before: NaiveDate, weeks: u32) -> Self {
    let after = before
      .checked_sub_days(Days::new(u64::from(weeks) * 7))
      .unwrap_or(NaiveDate::MIN);
    Self { after, before, weeks }
  }

  /// Window that still includes everything recorded on `today`.
  pub fn including(today: NaiveDate, weeks: u32) -> Self {
    let before = today.checked_add_days(Days::new(1)).unwrap_or(today);
    Self::ending_on(before, weeks)
  }

  pub fn after_timestamp(&self) -> i64 {
    midnight_utc(self.after).timestamp()
  }

  pub fn before_timestamp(&self) -> i64 {
    midnight_utc(self.before).timestamp()
  }

  pub fn contains(&self, instant: DateTime<Utc>) -> bool {
    instant >= midnight_utc(self.after) && instant < midnight_utc(self.before)
  }
}

fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
  date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// ---------------------------------------------------------------------------
/// Activity Aggregation
/// ---------------------------------------------------------------------------

/// Sum distance and moving time of the activities matching `activity_type`
/// exactly and starting inside `window`.
///
/// Distance is accumulated as integer millimetres and time as whole seconds so
/// the totals do not depend on input order.
pub fn aggregate(
  records: &[ActivityRecord],
  activity_type: &str,
  window: &LookbackWindow,
) -> AggregateResult {
  let mut total_mm: u64 = 0;
  let mut total_seconds: u64 = 0;
  let mut activity_count = 0;

  for record in records
    .iter()
    .filter(|r| r.activity_type == activity_type && window.contains(r.start_date))
  {
    total_mm = total_mm.saturating_add(millimetres(record.distance_meters));
    total_seconds = total_seconds.saturating_add(record.moving_time.as_secs());
    activity_count += 1;
  }

  AggregateResult {
    total_distance_km: total_mm as f64 / 1_000_000.0,
    total_moving_time_seconds: total_seconds,
    activity_count,
  }
}

fn millimetres(meters: f64) -> u64 {
  if meters.is_finite() && meters > 0.0 {
    (meters * 1000.0).round() as u64
  } else {
    0
  }
}

/// ---------------------------------------------------------------------------
/// Training Volume
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingVolume {
  pub weekly_distance_km: f64,
  pub mean_pace_seconds_per_km: f64,
  pub pace_seconds_per_mile: f64,
}

impl TrainingVolume {
  /// Derive weekly volume and pace. An aggregate with no distance or no
  /// moving time has no defined pace and is reported as `EmptyAggregate`.
  pub fn from_aggregate(
    aggregate: &AggregateResult,
    activity_type: &str,
    weeks: u32,
  ) -> Result<Self, AnalysisError> {
    if weeks == 0 {
      return Err(AnalysisError::InvalidInput("lookback window has zero weeks".into()));
    }
    if aggregate.is_empty() || aggregate.total_moving_time_seconds == 0 {
      return Err(AnalysisError::EmptyAggregate {
        activity_type: activity_type.to_string(),
        weeks,
      });
    }

    let total_km = aggregate.total_distance_km;
    let total_seconds = aggregate.total_moving_time_seconds as f64;

    Ok(Self {
      weekly_distance_km: total_km / f64::from(weeks),
      mean_pace_seconds_per_km: total_seconds / total_km,
      pace_seconds_per_mile: total_seconds / km_to_miles(total_km),
    })
  }

  pub fn weekly_distance_miles(&self) -> f64 {
    km_to_miles(self.weekly_distance_km)
  }
}

/// ---------------------------------------------------------------------------
/// Race-Time Prediction (Tanda)
/// ---------------------------------------------------------------------------

/// Predicted marathon time in seconds.
///
/// Callers must reject a zero pace or zero weekly distance first; use
/// [`RacePrediction::compute`] for the checked form.
pub fn tanda_marathon_seconds(weekly_distance_km: f64, mean_pace_seconds_per_km: f64) -> f64 {
  let speed_kmh = (1.0 / mean_pace_seconds_per_km) * 3600.0;
  (TANDA_BASE_MINUTES
    + TANDA_VOLUME_COEFFICIENT * (weekly_distance_km / TANDA_VOLUME_DECAY_KM).exp()
    + TANDA_SPEED_COEFFICIENT / speed_kmh)
    * SECONDS_PER_MINUTE
}

pub fn half_marathon_from_marathon(marathon_seconds: f64) -> f64 {
  (marathon_seconds - HALF_MARATHON_OFFSET_SECONDS) / 2.0
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RacePrediction {
  pub marathon_seconds: f64,
  pub half_marathon_seconds: f64,
}

impl RacePrediction {
  pub fn compute(
    weekly_distance_km: f64,
    mean_pace_seconds_per_km: f64,
  ) -> Result<Self, AnalysisError> {
    if !(weekly_distance_km.is_finite() && weekly_distance_km > 0.0) {
      return Err(AnalysisError::InvalidInput(format!(
        "weekly distance must be positive, got {}",
        weekly_distance_km
      )));
    }
    if !(mean_pace_seconds_per_km.is_finite() && mean_pace_seconds_per_km > 0.0) {
      return Err(AnalysisError::InvalidInput(format!(
        "mean pace must be positive, got {}",
        mean_pace_seconds_per_km
      )));
    }

    let marathon_seconds = tanda_marathon_seconds(weekly_distance_km, mean_pace_seconds_per_km);
    Ok(Self {
      marathon_seconds,
      half_marathon_seconds: half_marathon_from_marathon(marathon_seconds),
    })
  }
}

/// ---------------------------------------------------------------------------
/// Report Assembly
/// ---------------------------------------------------------------------------

/// Turn one window's aggregate into the user-facing prediction.
pub fn build_prediction(
  aggregate: &AggregateResult,
  activity_type: &str,
  weeks: u32,
) -> Result<PredictionResult, AnalysisError> {
  let volume = TrainingVolume::from_aggregate(aggregate, activity_type, weeks)?;
  let prediction =
    RacePrediction::compute(volume.weekly_distance_km, volume.mean_pace_seconds_per_km)?;

  Ok(PredictionResult {
    predicted_marathon_time: seconds_to_clock(whole_seconds(prediction.marathon_seconds)),
    predicted_half_marathon_time: seconds_to_clock(whole_seconds(
      prediction.half_marathon_seconds,
    )),
    average_weekly_distance: volume.weekly_distance_miles().round() as u32,
    average_pace: seconds_to_clock(whole_seconds(volume.pace_seconds_per_mile)),
  })
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
