use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One recorded workout as delivered by the activity source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
  pub activity_type: String,
  pub distance_meters: f64,
  pub moving_time: Duration,
  pub start_date: DateTime<Utc>,
}

