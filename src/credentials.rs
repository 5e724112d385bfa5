//! In-memory OAuth credential cache
//!
//! Tokens live only for the lifetime of the process. Each user has its own
//! lock so that check, refresh and hand-out of an access token happen as one
//! step; concurrent requests for the same user never refresh twice.

use crate::models::TokenState;
use crate::source::ActivitySource;
use crate::strava::StravaError;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

/// ---------------------------------------------------------------------------
/// Clock
/// ---------------------------------------------------------------------------

pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

/// True when there is no token or `now` has reached its expiry.
pub fn is_expired(tokens: Option<&TokenState>, now: DateTime<Utc>) -> bool {
  tokens.map_or(true, |t| t.is_expired_at(now))
}

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
  #[error("no credentials for {user_id}; authorization required")]
  AuthenticationRequired { user_id: String },

  #[error("token refresh for {user_id} failed: {source}")]
  TokenRefresh {
    user_id: String,
    #[source]
    source: StravaError,
  },

  #[error("authorization for {user_id} rejected: {reason}")]
  AuthorizationRejected { user_id: String, reason: String },

  #[error("authorization code exchange for {user_id} failed: {source}")]
  Exchange {
    user_id: String,
    #[source]
    source: StravaError,
  },
}

/// ---------------------------------------------------------------------------
/// Per-User State
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialStatus {
  NoToken,
  Authorizing,
  Authorized,
  Expired,
}

#[derive(Debug, Clone)]
struct PendingAuthorization {
  state: String,
  issued_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct UserCredential {
  tokens: Option<TokenState>,
  athlete_id: Option<i64>,
  pending: Option<PendingAuthorization>,
}

impl UserCredential {
  fn pending_at(&self, now: DateTime<Utc>) -> Option<&PendingAuthorization> {
    self
      .pending
      .as_ref()
      .filter(|p| now - p.issued_at < Duration::seconds(AUTHORIZATION_TTL_SECS))
  }
}

/// An authorization round trip has to finish within this many seconds.
const AUTHORIZATION_TTL_SECS: i64 = 600;

/// ---------------------------------------------------------------------------
/// Credential Store
/// ---------------------------------------------------------------------------

type SharedCredential = Arc<Mutex<UserCredential>>;

pub struct CredentialStore {
  clock: Arc<dyn Clock>,
  users: Mutex<HashMap<String, SharedCredential>>,
}

impl CredentialStore {
  pub fn new(clock: Arc<dyn Clock>) -> Self {
    Self {
      clock,
      users: Mutex::new(HashMap::new()),
    }
  }

  pub fn now(&self) -> DateTime<Utc> {
    self.clock.now()
  }

  /// Entry for `user_id` if one is tracked. Lookups never create entries.
  async fn existing(&self, user_id: &str) -> Option<SharedCredential> {
    self.users.lock().await.get(user_id).cloned()
  }

  async fn entry(&self, user_id: &str) -> SharedCredential {
    let mut users = self.users.lock().await;
    users.entry(user_id.to_string()).or_default().clone()
  }

  /// Drop the entry for `user_id` unless another task still holds it.
  /// The caller must have checked that the entry carries no tokens.
  async fn forget_if_idle(&self, user_id: &str, entry: &SharedCredential) {
    let mut users = self.users.lock().await;
    let idle = users
      .get(user_id)
      .is_some_and(|current| Arc::ptr_eq(current, entry) && Arc::strong_count(entry) == 2);
    if idle {
      users.remove(user_id);
    }
  }

  /// Drop entries that only hold an authorization that has timed out.
  fn sweep_abandoned(users: &mut HashMap<String, SharedCredential>, now: DateTime<Utc>) {
    users.retain(|_, entry| {
      Arc::strong_count(entry) > 1
        || entry.try_lock().map_or(true, |credential| {
          credential.tokens.is_some() || credential.pending_at(now).is_some()
        })
    });
  }

  pub async fn status(&self, user_id: &str) -> CredentialStatus {
    let Some(entry) = self.existing(user_id).await else {
      return CredentialStatus::NoToken;
    };
    let credential = entry.lock().await;
    let now = self.now();

    match (&credential.tokens, credential.pending_at(now)) {
      (Some(tokens), _) if tokens.is_expired_at(now) => CredentialStatus::Expired,
      (Some(_), _) => CredentialStatus::Authorized,
      (None, Some(_)) => CredentialStatus::Authorizing,
      (None, None) => CredentialStatus::NoToken,
    }
  }

  pub async fn tokens(&self, user_id: &str) -> Option<TokenState> {
    let entry = self.existing(user_id).await?;
    let credential = entry.lock().await;
    credential.tokens.clone()
  }

  /// Seed tokens directly, bypassing the authorization handshake.
  pub async fn insert(&self, user_id: &str, tokens: TokenState) {
    let entry = self.entry(user_id).await;
    entry.lock().await.tokens = Some(tokens);
  }

  /// Start an authorization round trip and return the `state` value the
  /// callback has to echo back. A newer round trip replaces an older one.
  pub async fn begin_authorization(&self, user_id: &str) -> String {
    let now = self.now();
    let entry = {
      let mut users = self.users.lock().await;
      Self::sweep_abandoned(&mut users, now);
      users.entry(user_id.to_string()).or_default().clone()
    };

    let state = Uuid::new_v4().to_string();
    entry.lock().await.pending = Some(PendingAuthorization {
      state: state.clone(),
      issued_at: now,
    });
    state
  }

  /// Finish the handshake for `user_id`.
  ///
  /// The `state` must match the one issued by [`Self::begin_authorization`]
  /// within the last ten minutes. It is consumed only when it matches, so a
  /// forged callback does not cancel the real one. If the user is already
  /// bound to an upstream athlete, a code belonging to another athlete is
  /// rejected and the cached tokens stay as they were.
  pub async fn complete_authorization(
    &self,
    user_id: &str,
    state: &str,
    code: &str,
    source: &dyn ActivitySource,
  ) -> Result<(), CredentialError> {
    let rejected = |reason: &str| CredentialError::AuthorizationRejected {
      user_id: user_id.to_string(),
      reason: reason.to_string(),
    };

    let Some(entry) = self.existing(user_id).await else {
      return Err(rejected("no authorization in progress"));
    };
    let mut credential = entry.lock().await;

    let matches = match credential.pending_at(self.now()) {
      Some(pending) => pending.state == state,
      None => {
        credential.pending = None;
        let abandoned = credential.tokens.is_none();
        drop(credential);
        if abandoned {
          self.forget_if_idle(user_id, &entry).await;
        }
        return Err(rejected("no authorization in progress"));
      }
    };
    if !matches {
      warn!(user_id, "callback state does not match the pending authorization");
      return Err(rejected("state does not match the pending authorization"));
    }
    credential.pending = None;

    let result = Self::exchange_locked(user_id, code, &mut credential, source).await;
    let abandoned = result.is_err() && credential.tokens.is_none();
    drop(credential);
    if abandoned {
      self.forget_if_idle(user_id, &entry).await;
    }
    result
  }

  async fn exchange_locked(
    user_id: &str,
    code: &str,
    credential: &mut UserCredential,
    source: &dyn ActivitySource,
  ) -> Result<(), CredentialError> {
    let grant = source
      .exchange_authorization_code(code)
      .await
      .map_err(|source| CredentialError::Exchange {
        user_id: user_id.to_string(),
        source,
      })?;

    if let (Some(bound), Some(granted)) = (credential.athlete_id, grant.athlete_id) {
      if bound != granted {
        warn!(user_id, bound, granted, "authorization code belongs to a different athlete");
        return Err(CredentialError::AuthorizationRejected {
          user_id: user_id.to_string(),
          reason: "code was issued for a different athlete".into(),
        });
      }
    }

    credential.athlete_id = grant.athlete_id.or(credential.athlete_id);
    credential.tokens = Some(grant.tokens);
    info!(user_id, athlete_id = ?credential.athlete_id, "authorization completed");
    Ok(())
  }

  /// Exchange the stored refresh token for a new token state. The cached entry
  /// is only replaced once the new state has been obtained.
  pub async fn refresh(
    &self,
    user_id: &str,
    source: &dyn ActivitySource,
  ) -> Result<TokenState, CredentialError> {
    let Some(entry) = self.existing(user_id).await else {
      return Err(CredentialError::AuthenticationRequired {
        user_id: user_id.to_string(),
      });
    };
    let mut credential = entry.lock().await;
    Self::refresh_locked(user_id, &mut credential, source).await
  }

  async fn refresh_locked(
    user_id: &str,
    credential: &mut UserCredential,
    source: &dyn ActivitySource,
  ) -> Result<TokenState, CredentialError> {
    let refresh_token = credential
      .tokens
      .as_ref()
      .map(|t| t.refresh_token.clone())
      .ok_or_else(|| CredentialError::AuthenticationRequired {
        user_id: user_id.to_string(),
      })?;

    let grant = source.refresh_token(&refresh_token).await.map_err(|source| {
      warn!(user_id, error = %source, "token refresh failed; keeping previous tokens");
      CredentialError::TokenRefresh {
        user_id: user_id.to_string(),
        source,
      }
    })?;

    if grant.athlete_id.is_some() {
      credential.athlete_id = grant.athlete_id;
    }
    credential.tokens = Some(grant.tokens.clone());
    info!(user_id, expires_at = %grant.tokens.expires_at, "tokens refreshed");
    Ok(grant.tokens)
  }

  /// Access token that is valid right now, refreshing first if the cached one
  /// has expired.
  pub async fn valid_access_token(
    &self,
    user_id: &str,
    source: &dyn ActivitySource,
  ) -> Result<String, CredentialError> {
    let required = || CredentialError::AuthenticationRequired {
      user_id: user_id.to_string(),
    };
    let entry = self.existing(user_id).await.ok_or_else(required)?;
    let mut credential = entry.lock().await;

    let Some(tokens) = credential.tokens.as_ref() else {
      return Err(required());
    };

    if !tokens.is_expired_at(self.now()) {
      return Ok(tokens.access_token.clone());
    }

    info!(user_id, "access token expired; refreshing");
    let refreshed = Self::refresh_locked(user_id, &mut credential, source).await?;
    Ok(refreshed.access_token)
  }

  #[cfg(test)]
  async fn tracked_users(&self) -> usize {
    self.users.lock().await.len()
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
