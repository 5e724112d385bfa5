//! Test utilities and helpers for unit testing
//!
//! This module provides common test infrastructure including:
//! - Mock data factories
//! - A manually driven clock
//! - An in-memory activity source
//! - Helper assertions

use crate::config::AppConfig;
use crate::credentials::Clock;
use crate::models::{ActivityRecord, TokenState};
use crate::source::{ActivitySource, TokenGrant};
use crate::strava::{StravaConfig, StravaError};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use reqwest::StatusCode;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use url::Url;

/// ---------------------------------------------------------------------------
/// Mock Data Factories
/// ---------------------------------------------------------------------------

/// Config with an 8-week "Run" window and `kim` as the default athlete
pub fn test_config() -> AppConfig {
  AppConfig {
    strava: StravaConfig::new("4242", "shh"),
    public_url: "http://localhost:5000".into(),
    bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
    lookback_weeks: 8,
    activity_type: "Run".into(),
    default_athlete: Some("kim".into()),
    http_timeout: std::time::Duration::from_secs(5),
  }
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
  NaiveDate::from_ymd_opt(year, month, day).expect("valid test date")
}

/// Activity dated mid-May 2024, inside the windows used by the tests
pub fn mock_activity(
  activity_type: &str,
  distance_meters: f64,
  moving_secs: u64,
) -> ActivityRecord {
  mock_activity_on(activity_type, distance_meters, moving_secs, date(2024, 5, 15))
}

pub fn mock_activity_on(
  activity_type: &str,
  distance_meters: f64,
  moving_secs: u64,
  day: NaiveDate,
) -> ActivityRecord {
  ActivityRecord {
    activity_type: activity_type.to_string(),
    distance_meters,
    moving_time: std::time::Duration::from_secs(moving_secs),
    start_date: day.and_hms_opt(7, 0, 0).expect("valid time").and_utc(),
  }
}

pub fn mock_tokens(access_token: &str, expires_at: DateTime<Utc>) -> TokenState {
  TokenState {
    access_token: access_token.to_string(),
    refresh_token: format!("{}-refresh", access_token),
    expires_at,
  }
}

pub fn mock_grant(
  access_token: &str,
  expires_at: DateTime<Utc>,
  athlete_id: Option<i64>,
) -> TokenGrant {
  TokenGrant {
    tokens: mock_tokens(access_token, expires_at),
    athlete_id,
  }
}

/// ---------------------------------------------------------------------------
/// Manual Clock
/// ---------------------------------------------------------------------------

pub struct ManualClock {
  now: Mutex<DateTime<Utc>>,
}

impl Default for ManualClock {
  fn default() -> Self {
    Self::at(Utc.with_ymd_and_hms(2024, 5, 31, 12, 0, 0).unwrap())
  }
}

impl ManualClock {
  pub fn at(now: DateTime<Utc>) -> Self {
    Self { now: Mutex::new(now) }
  }

  pub fn advance(&self, by: Duration) {
    let mut now = self.now.lock().unwrap();
    *now += by;
  }
}

impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> {
    *self.now.lock().unwrap()
  }
}

/// ---------------------------------------------------------------------------
/// Fake Activity Source
/// ---------------------------------------------------------------------------

/// In-memory stand-in for Strava. Token endpoints fail unless a grant has
/// been configured.
#[derive(Default)]
pub struct FakeSource {
  activities: Mutex<Vec<ActivityRecord>>,
  fail_fetch: AtomicBool,
  exchange: Mutex<Option<TokenGrant>>,
  refresh: Mutex<Option<TokenGrant>>,
  fetch_calls: AtomicUsize,
  exchange_calls: AtomicUsize,
  refresh_calls: AtomicUsize,
  last_access_token: Mutex<Option<String>>,
  last_refresh_token: Mutex<Option<String>>,
  last_range: Mutex<Option<(DateTime<Utc>, DateTime<Utc>)>>,
}

impl FakeSource {
  pub fn with_activities(activities: Vec<ActivityRecord>) -> Self {
    let source = Self::default();
    *source.activities.lock().unwrap() = activities;
    source
  }

  pub fn set_exchange(&self, grant: Option<TokenGrant>) {
    *self.exchange.lock().unwrap() = grant;
  }

  pub fn set_refresh(&self, grant: Option<TokenGrant>) {
    *self.refresh.lock().unwrap() = grant;
  }

  pub fn fail_fetches(&self) {
    self.fail_fetch.store(true, Ordering::SeqCst);
  }

  pub fn fetch_calls(&self) -> usize {
    self.fetch_calls.load(Ordering::SeqCst)
  }

  pub fn exchange_calls(&self) -> usize {
    self.exchange_calls.load(Ordering::SeqCst)
  }

  pub fn refresh_calls(&self) -> usize {
    self.refresh_calls.load(Ordering::SeqCst)
  }

  pub fn last_access_token(&self) -> Option<String> {
    self.last_access_token.lock().unwrap().clone()
  }

  pub fn last_refresh_token(&self) -> Option<String> {
    self.last_refresh_token.lock().unwrap().clone()
  }

  pub fn last_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    *self.last_range.lock().unwrap()
  }
}

#[async_trait]
impl ActivitySource for FakeSource {
  async fn list_activities(
    &self,
    access_token: &str,
    after: DateTime<Utc>,
    before: DateTime<Utc>,
  ) -> Result<Vec<ActivityRecord>, StravaError> {
    self.fetch_calls.fetch_add(1, Ordering::SeqCst);
    *self.last_access_token.lock().unwrap() = Some(access_token.to_string());
    *self.last_range.lock().unwrap() = Some((after, before));

    if self.fail_fetch.load(Ordering::SeqCst) {
      return Err(StravaError::Api {
        status: StatusCode::SERVICE_UNAVAILABLE,
        body: "upstream down".into(),
      });
    }
    Ok(self.activities.lock().unwrap().clone())
  }

  async fn exchange_authorization_code(&self, _code: &str) -> Result<TokenGrant, StravaError> {
    self.exchange_calls.fetch_add(1, Ordering::SeqCst);
    tokio::task::yield_now().await;
    let grant = self.exchange.lock().unwrap().clone();
    grant.ok_or_else(|| StravaError::OAuth("Token exchange failed: invalid code".into()))
  }

  async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, StravaError> {
    self.refresh_calls.fetch_add(1, Ordering::SeqCst);
    *self.last_refresh_token.lock().unwrap() = Some(refresh_token.to_string());
    tokio::task::yield_now().await;
    let grant = self.refresh.lock().unwrap().clone();
    grant.ok_or_else(|| StravaError::OAuth("Token refresh failed: revoked".into()))
  }

  fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<String, StravaError> {
    let mut url = Url::parse("https://auth.example.test/oauth/authorize")
      .map_err(|e| StravaError::OAuth(e.to_string()))?;
    url
      .query_pairs_mut()
      .append_pair("redirect_uri", redirect_uri)
      .append_pair("state", state);
    Ok(url.to_string())
  }
}

/// ---------------------------------------------------------------------------
/// Test Macros
/// ---------------------------------------------------------------------------

/// Assert two floats are approximately equal within a tolerance
#[macro_export]
macro_rules! assert_approx_eq {
  ($left:expr, $right:expr, $tolerance:expr) => {
    let diff = ($left - $right).abs();
    assert!(
      diff < $tolerance,
      "Values not approximately equal: {} vs {} (diff: {}, tolerance: {})",
      $left,
      $right,
      diff,
      $tolerance
    );
  };
}

/// ---------------------------------------------------------------------------
/// Tests for Test Utilities
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_manual_clock_advances() {
    let clock = ManualClock::default();
    let start = clock.now();
    clock.advance(Duration::minutes(90));
    assert_eq!(clock.now() - start, Duration::minutes(90));
  }

  #[tokio::test]
  async fn test_fake_source_records_calls() {
    let source = FakeSource::with_activities(vec![mock_activity("Run", 5000.0, 1500)]);
    let after = Utc.with_ymd_and_hms(2024, 4, 6, 0, 0, 0).unwrap();
    let before = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

    let records = source.list_activities("acc", after, before).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(source.fetch_calls(), 1);
    assert_eq!(source.last_access_token().as_deref(), Some("acc"));
    assert_eq!(source.last_range(), Some((after, before)));

    assert!(source.refresh_token("r").await.is_err());
    assert_eq!(source.refresh_calls(), 1);
  }
}
