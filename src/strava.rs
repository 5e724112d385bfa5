use crate::models::{ActivityRecord, TokenState};
use crate::source::{ActivitySource, TokenGrant};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// ---------------------------------------------------------------------------
/// Configuration Constants
/// ---------------------------------------------------------------------------

const STRAVA_BASE_URL: &str = "https://www.strava.com";
const AUTH_PATH: &str = "/oauth/authorize";
const TOKEN_PATH: &str = "/oauth/token";
const API_PATH: &str = "/api/v3";
const ACTIVITIES_PAGE_SIZE: u32 = 200;

/// ---------------------------------------------------------------------------
/// OAuth Data Structures
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct StravaConfig {
  pub client_id: String,
  pub client_secret: String,
  pub base_url: String,
  pub page_size: u32,
}

impl StravaConfig {
  pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
    Self {
      client_id: client_id.into(),
      client_secret: client_secret.into(),
      base_url: STRAVA_BASE_URL.to_string(),
      page_size: ACTIVITIES_PAGE_SIZE,
    }
  }

  /// Point the client at another host (used against mock servers).
  pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
    self.base_url = base_url.into().trim_end_matches('/').to_string();
    self
  }

  fn auth_url(&self) -> String {
    format!("{}{}", self.base_url, AUTH_PATH)
  }

  fn token_url(&self) -> String {
    format!("{}{}", self.base_url, TOKEN_PATH)
  }

  fn activities_url(&self) -> String {
    format!("{}{}/athlete/activities", self.base_url, API_PATH)
  }
}

/// Response from Strava token endpoint
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
  pub access_token: String,
  pub refresh_token: String,
  pub expires_at: i64,
  #[serde(default)]
  pub athlete: Option<AthleteInfo>,
}

/// Basic athlete info returned with the initial code exchange
#[derive(Debug, Deserialize)]
pub struct AthleteInfo {
  pub id: i64,
}

impl TokenResponse {
  fn into_grant(self) -> TokenGrant {
    TokenGrant {
      tokens: TokenState {
        access_token: self.access_token,
        refresh_token: self.refresh_token,
        // An unrepresentable expiry is treated as already expired.
        expires_at: DateTime::from_timestamp(self.expires_at, 0).unwrap_or(DateTime::UNIX_EPOCH),
      },
      athlete_id: self.athlete.map(|a| a.id),
    }
  }
}

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StravaError {
  #[error("HTTP request failed: {0}")]
  Request(#[from] reqwest::Error),

  #[error("OAuth error: {0}")]
  OAuth(String),

  #[error("Strava API returned {status}: {body}")]
  Api { status: StatusCode, body: String },

  #[error("Failed to parse Strava response: {0}")]
  Parse(String),

  #[error("Not authenticated with Strava")]
  NotAuthenticated,
}

/// ---------------------------------------------------------------------------
/// Strava API - Activity Data
/// ---------------------------------------------------------------------------

/// Activity summary from Strava API
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivity {
  pub id: i64,
  #[serde(default)]
  pub name: String,
  /// Strava uses "type" for legacy and "sport_type" for newer activities
  #[serde(rename = "type", default)]
  pub activity_type: String,
  pub start_date: DateTime<Utc>,
  #[serde(default)]
  pub moving_time: u64,
  #[serde(default)]
  pub distance: Option<f64>,
}

impl StravaActivity {
  pub fn into_record(self) -> ActivityRecord {
    ActivityRecord {
      activity_type: self.activity_type,
      distance_meters: self.distance.unwrap_or(0.0),
      moving_time: Duration::from_secs(self.moving_time),
      start_date: self.start_date,
    }
  }
}

/// ---------------------------------------------------------------------------
/// Client
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct StravaClient {
  http: Client,
  config: StravaConfig,
}

impl StravaClient {
  /// Every request made by the client is bounded by `timeout`.
  pub fn new(config: StravaConfig, timeout: Duration) -> Result<Self, StravaError> {
    let http = Client::builder().timeout(timeout).build()?;
    Ok(Self { http, config })
  }

  async fn post_token_form(
    &self,
    grant: &[(&str, &str)],
    action: &str,
  ) -> Result<TokenGrant, StravaError> {
    let mut form = vec![
      ("client_id", self.config.client_id.as_str()),
      ("client_secret", self.config.client_secret.as_str()),
    ];
    form.extend_from_slice(grant);

    let response = self.http.post(self.config.token_url()).form(&form).send().await?;

    if !response.status().is_success() {
      let status = response.status();
      let error_text = response.text().await.unwrap_or_default();
      return Err(StravaError::OAuth(format!(
        "{} failed ({}): {}",
        action, status, error_text
      )));
    }

    let token_response: TokenResponse = response
      .json()
      .await
      .map_err(|e| StravaError::Parse(e.to_string()))?;
    Ok(token_response.into_grant())
  }

  async fn fetch_page(
    &self,
    access_token: &str,
    after: i64,
    before: i64,
    page: u32,
  ) -> Result<Vec<StravaActivity>, StravaError> {
    let response = self
      .http
      .get(self.config.activities_url())
      .bearer_auth(access_token)
      .query(&[
        ("after", after.to_string()),
        ("before", before.to_string()),
        ("page", page.to_string()),
        ("per_page", self.config.page_size.to_string()),
      ])
      .send()
      .await?;

    if response.status() == StatusCode::UNAUTHORIZED {
      return Err(StravaError::NotAuthenticated);
    }

    if !response.status().is_success() {
      let status = response.status();
      let body = response.text().await.unwrap_or_default();
      return Err(StravaError::Api { status, body });
    }

    let response_text = response.text().await?;
    serde_json::from_str(&response_text).map_err(|e| {
      let raw: String = response_text.chars().take(500).collect();
      debug!(%raw, "unparsable activities page");
      StravaError::Parse(format!("activities page {}: {}", page, e))
    })
  }
}

#[async_trait]
impl ActivitySource for StravaClient {
  /// Walks every page until Strava returns a short one.
  async fn list_activities(
    &self,
    access_token: &str,
    after: DateTime<Utc>,
    before: DateTime<Utc>,
  ) -> Result<Vec<ActivityRecord>, StravaError> {
    let mut records = Vec::new();
    let mut page = 1;

    loop {
      let batch = self
        .fetch_page(access_token, after.timestamp(), before.timestamp(), page)
        .await?;
      let batch_len = batch.len();
      debug!(page, count = batch_len, "fetched activities page");

      records.extend(batch.into_iter().map(StravaActivity::into_record));

      if batch_len == 0 || batch_len < self.config.page_size as usize {
        break;
      }
      page += 1;
    }

    Ok(records)
  }

  async fn exchange_authorization_code(&self, code: &str) -> Result<TokenGrant, StravaError> {
    self
      .post_token_form(
        &[("code", code), ("grant_type", "authorization_code")],
        "Token exchange",
      )
      .await
  }

  async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, StravaError> {
    self
      .post_token_form(
        &[("refresh_token", refresh_token), ("grant_type", "refresh_token")],
        "Token refresh",
      )
      .await
  }

  fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<String, StravaError> {
    let mut url =
      Url::parse(&self.config.auth_url()).map_err(|e| StravaError::OAuth(e.to_string()))?;

    url
      .query_pairs_mut()
      .append_pair("client_id", &self.config.client_id)
      .append_pair("redirect_uri", redirect_uri)
      .append_pair("response_type", "code")
      .append_pair("scope", "activity:read_all")
      .append_pair("approval_prompt", "auto")
      .append_pair("state", state);

    Ok(url.to_string())
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
