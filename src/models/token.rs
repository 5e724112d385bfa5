use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OAuth token state cached per user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenState {
  pub access_token: String,
  pub refresh_token: String,
  pub expires_at: DateTime<Utc>,
}

impl TokenState {
  /// A token is unusable from the instant `expires_at` is reached.
  pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
    now >= self.expires_at
  }
}
