//! Request orchestration: credentials, fetch, aggregate, predict.

use crate::analysis::{aggregate, build_prediction, LookbackWindow};
use crate::config::AppConfig;
use crate::credentials::{Clock, CredentialStore};
use crate::error::AppError;
use crate::models::PredictionResult;
use crate::source::ActivitySource;
use crate::strava::StravaError;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, instrument};

pub struct TandaService {
  config: AppConfig,
  credentials: CredentialStore,
  source: Arc<dyn ActivitySource>,
}

impl TandaService {
  pub fn new(config: AppConfig, source: Arc<dyn ActivitySource>, clock: Arc<dyn Clock>) -> Self {
    Self {
      config,
      credentials: CredentialStore::new(clock),
      source,
    }
  }

  pub fn config(&self) -> &AppConfig {
    &self.config
  }

  pub fn credentials(&self) -> &CredentialStore {
    &self.credentials
  }

  /// Lookback window ending with (and including) the current UTC day.
  pub fn current_window(&self) -> LookbackWindow {
    LookbackWindow::including(self.credentials.now().date_naive(), self.config.lookback_weeks)
  }

  /// Compute the race prediction for `user_id`.
  ///
  /// Returns `AuthenticationRequired` when the user has never authorized or
  /// the upstream no longer accepts the cached token.
  #[instrument(skip(self))]
  pub async fn predict(&self, user_id: &str) -> Result<PredictionResult, AppError> {
    let window = self.current_window();
    let access_token = self
      .credentials
      .valid_access_token(user_id, self.source.as_ref())
      .await?;

    let records = self
      .source
      .list_activities(&access_token, utc(window.after_timestamp()), utc(window.before_timestamp()))
      .await
      .map_err(|e| match e {
        StravaError::NotAuthenticated => AppError::AuthenticationRequired {
          user_id: user_id.to_string(),
        },
        other => AppError::UpstreamFetch(other),
      })?;

    let totals = aggregate(&records, &self.config.activity_type, &window);
    info!(
      fetched = records.len(),
      matched = totals.activity_count,
      total_km = totals.total_distance_km,
      after = %window.after,
      before = %window.before,
      "aggregated activities"
    );

    let result = build_prediction(&totals, &self.config.activity_type, window.weeks)?;
    info!(
      average_mpw = result.average_weekly_distance,
      average_pace = %result.average_pace,
      half_marathon = %result.predicted_half_marathon_time,
      marathon = %result.predicted_marathon_time,
      "prediction computed"
    );

    Ok(result)
  }

  /// Start the OAuth handshake and return the upstream authorization URL.
  pub async fn begin_authorization(&self, user_id: &str) -> Result<String, AppError> {
    let state = self.credentials.begin_authorization(user_id).await;
    let redirect_uri = self.config.redirect_uri(user_id);
    self
      .source
      .authorization_url(&redirect_uri, &state)
      .map_err(|e| AppError::Internal(e.to_string()))
  }

  pub async fn complete_authorization(
    &self,
    user_id: &str,
    state: &str,
    code: &str,
  ) -> Result<(), AppError> {
    self
      .credentials
      .complete_authorization(user_id, state, code, self.source.as_ref())
      .await?;
    Ok(())
  }
}

fn utc(timestamp: i64) -> DateTime<Utc> {
  DateTime::from_timestamp(timestamp, 0).unwrap_or(DateTime::UNIX_EPOCH)
}
