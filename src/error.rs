use crate::analysis::AnalysisError;
use crate::credentials::CredentialError;
use crate::strava::StravaError;
use crate::units::FormatError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

/// Errors surfaced at the request boundary
#[derive(Debug, thiserror::Error)]
pub enum AppError {
  #[error("Malformed duration: {0}")]
  Format(#[from] FormatError),

  #[error("Authorization required for {user_id}")]
  AuthenticationRequired { user_id: String },

  #[error("Token refresh failed: {0}")]
  TokenRefresh(#[source] StravaError),

  #[error("{0}")]
  EmptyAggregate(String),

  #[error("Activity source unavailable: {0}")]
  UpstreamFetch(#[source] StravaError),

  #[error("Authorization rejected: {0}")]
  AuthorizationRejected(String),

  #[error("Not found: {0}")]
  NotFound(String),

  #[error("Internal error: {0}")]
  Internal(String),
}

impl AppError {
  pub fn kind(&self) -> &'static str {
    match self {
      AppError::Format(_) => "format_error",
      AppError::AuthenticationRequired { .. } => "authentication_required",
      AppError::TokenRefresh(_) => "token_refresh_error",
      AppError::EmptyAggregate(_) => "empty_aggregate",
      AppError::UpstreamFetch(_) => "upstream_fetch_error",
      AppError::AuthorizationRejected(_) => "authorization_rejected",
      AppError::NotFound(_) => "not_found",
      AppError::Internal(_) => "internal_error",
    }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      AppError::Format(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
      AppError::AuthenticationRequired { .. } => StatusCode::UNAUTHORIZED,
      AppError::TokenRefresh(_) | AppError::UpstreamFetch(_) => StatusCode::BAD_GATEWAY,
      AppError::EmptyAggregate(_) => StatusCode::UNPROCESSABLE_ENTITY,
      AppError::AuthorizationRejected(_) => StatusCode::BAD_REQUEST,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
    }
  }
}

impl From<CredentialError> for AppError {
  fn from(err: CredentialError) -> Self {
    match err {
      CredentialError::AuthenticationRequired { user_id } => {
        AppError::AuthenticationRequired { user_id }
      }
      CredentialError::TokenRefresh { source, .. } => AppError::TokenRefresh(source),
      CredentialError::AuthorizationRejected { reason, .. } => {
        AppError::AuthorizationRejected(reason)
      }
      CredentialError::Exchange { source, .. } => {
        AppError::AuthorizationRejected(format!("code exchange failed: {}", source))
      }
    }
  }
}

impl From<AnalysisError> for AppError {
  fn from(err: AnalysisError) -> Self {
    match err {
      AnalysisError::EmptyAggregate { .. } => AppError::EmptyAggregate(err.to_string()),
      AnalysisError::InvalidInput(reason) => AppError::Internal(reason),
    }
  }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
  error: &'static str,
  message: String,
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      error!(kind = self.kind(), error = %self, "request failed");
    }

    let body = ErrorBody {
      error: self.kind(),
      message: self.to_string(),
    };
    (status, Json(body)).into_response()
  }
}
