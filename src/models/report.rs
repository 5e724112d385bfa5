use serde::{Deserialize, Serialize};

/// Totals over the matching activities of one lookback window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
  pub total_distance_km: f64,
  pub total_moving_time_seconds: u64,
  pub activity_count: usize,
}

impl AggregateResult {
  pub fn is_empty(&self) -> bool {
    self.activity_count == 0 || self.total_distance_km <= 0.0
  }
}

/// Response body of the prediction endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionResult {
  #[serde(rename = "marathon_time")]
  pub predicted_marathon_time: String,
  #[serde(rename = "half_marathon_time")]
  pub predicted_half_marathon_time: String,
  #[serde(rename = "average_mpw")]
  pub average_weekly_distance: u32,
  pub average_pace: String,
}
