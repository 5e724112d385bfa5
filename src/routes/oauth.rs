use super::{prediction_path, SharedService};
use crate::error::AppError;
use axum::extract::{Query, State};
use axum::response::Redirect;
use serde::Deserialize;
use tracing::warn;

/// Query parameters Strava appends to the redirect URI
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
  pub athlete: String,
  pub code: Option<String>,
  pub state: Option<String>,
  pub error: Option<String>,
}

/// Completes the OAuth handshake and sends the user on to their prediction.
pub async fn authorized(
  State(service): State<SharedService>,
  Query(params): Query<CallbackParams>,
) -> Result<Redirect, AppError> {
  if let Some(error) = params.error {
    warn!(athlete = %params.athlete, %error, "authorization denied upstream");
    return Err(AppError::AuthorizationRejected(error));
  }

  let code = params
    .code
    .ok_or_else(|| AppError::AuthorizationRejected("callback is missing the code".into()))?;
  let state = params
    .state
    .ok_or_else(|| AppError::AuthorizationRejected("callback is missing the state".into()))?;

  service
    .complete_authorization(&params.athlete, &state, &code)
    .await?;

  Ok(Redirect::temporary(&prediction_path(&params.athlete)?))
}
