pub mod oauth;
pub mod tanda;

use crate::error::AppError;
use crate::service::TandaService;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use url::Url;

pub type SharedService = Arc<TandaService>;

pub fn router(service: SharedService) -> Router {
  Router::new()
    .route("/", get(tanda::index))
    .route("/tanda/{user_id}", get(tanda::get_prediction))
    .route("/authorized", get(oauth::authorized))
    .layer(TraceLayer::new_for_http())
    .with_state(service)
}

/// Percent-encoded path of the prediction endpoint for `user_id`.
pub(crate) fn prediction_path(user_id: &str) -> Result<String, AppError> {
  let mut url = Url::parse("http://localhost/").map_err(|e| AppError::Internal(e.to_string()))?;
  url
    .path_segments_mut()
    .map_err(|_| AppError::Internal("base url cannot hold a path".into()))?
    .extend(["tanda", user_id]);
  Ok(url.path().to_string())
}
