use crate::models::{ActivityRecord, TokenState};
use crate::strava::StravaError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Tokens returned by a code exchange or refresh, plus the upstream athlete
/// they belong to when the provider reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
  pub tokens: TokenState,
  pub athlete_id: Option<i64>,
}

/// The upstream fitness API the service reads from.
#[async_trait]
pub trait ActivitySource: Send + Sync {
  /// Activities that started in `[after, before)`.
  async fn list_activities(
    &self,
    access_token: &str,
    after: DateTime<Utc>,
    before: DateTime<Utc>,
  ) -> Result<Vec<ActivityRecord>, StravaError>;

  async fn exchange_authorization_code(&self, code: &str) -> Result<TokenGrant, StravaError>;

  async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, StravaError>;

  fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<String, StravaError>;
}
