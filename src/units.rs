//! Distance and duration conversions shared by the analysis layer.

const MILES_PER_KM: f64 = 0.621371;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
  #[error("expected H:MM:SS with three components, got {0:?}")]
  ComponentCount(String),

  #[error("non-numeric clock component {component:?} in {input:?}")]
  NotNumeric { input: String, component: String },
}

pub fn km_to_miles(km: f64) -> f64 {
  km * MILES_PER_KM
}

/// Format whole seconds as `H:MM:SS`, dropping the hour component when it is
/// zero: 531 renders as `8:51`, 12901 as `3:35:01`. Hours do not wrap at 24.
pub fn seconds_to_clock(seconds: u64) -> String {
  let hours = seconds / 3600;
  let minutes = (seconds % 3600) / 60;
  let secs = seconds % 60;
  if hours == 0 {
    format!("{}:{:02}", minutes, secs)
  } else {
    format!("{}:{:02}:{:02}", hours, minutes, secs)
  }
}

/// Parse an `H:MM:SS` string back into seconds.
pub fn clock_to_seconds(clock: &str) -> Result<u64, FormatError> {
  let parts: Vec<&str> = clock.split(':').collect();
  if parts.len() != 3 {
    return Err(FormatError::ComponentCount(clock.to_string()));
  }

  let mut values = [0u64; 3];
  for (slot, part) in values.iter_mut().zip(&parts) {
    let trimmed = part.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
      return Err(FormatError::NotNumeric {
        input: clock.to_string(),
        component: part.to_string(),
      });
    }
    *slot = trimmed.parse().map_err(|_| FormatError::NotNumeric {
      input: clock.to_string(),
      component: part.to_string(),
    })?;
  }

  let [hours, minutes, secs] = values;
  Ok(hours * 3600 + minutes * 60 + secs)
}

/// Truncating conversion used for model output. Negative or non-finite
/// values clamp to zero.
pub fn whole_seconds(seconds: f64) -> u64 {
  if seconds.is_finite() && seconds > 0.0 {
    seconds.trunc() as u64
  } else {
    0
  }
}
