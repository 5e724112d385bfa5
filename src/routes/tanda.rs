use super::{prediction_path, SharedService};
use crate::error::AppError;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use tracing::info;

/// Redirect to the configured default athlete.
pub async fn index(State(service): State<SharedService>) -> Result<Redirect, AppError> {
  let athlete = service
    .config()
    .default_athlete
    .as_deref()
    .ok_or_else(|| AppError::NotFound("no default athlete configured".into()))?;
  Ok(Redirect::temporary(&prediction_path(athlete)?))
}

/// Prediction for one athlete, or a redirect into the authorization flow
/// when no credentials are cached yet.
pub async fn get_prediction(
  State(service): State<SharedService>,
  Path(user_id): Path<String>,
) -> Result<Response, AppError> {
  match service.predict(&user_id).await {
    Ok(result) => Ok(Json(result).into_response()),
    Err(AppError::AuthenticationRequired { .. }) => {
      info!(user_id = %user_id, "authorization required; redirecting to Strava");
      let authorize_url = service.begin_authorization(&user_id).await?;
      Ok(Redirect::temporary(&authorize_url).into_response())
    }
    Err(e) => Err(e),
  }
}
