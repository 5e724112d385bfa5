pub mod analysis;
pub mod config;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod models;
pub mod routes;
pub mod service;
pub mod source;
pub mod strava;
pub mod units;

#[cfg(test)]
mod test_utils;

use config::AppConfig;
use credentials::SystemClock;
use service::TandaService;
use std::sync::Arc;
use strava::StravaClient;
use tracing::{info, warn};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
  // Load environment variables from .env file
  dotenvy::dotenv().ok();
  logging::init();

  let config = AppConfig::from_env()?;
  let client = StravaClient::new(config.strava.clone(), config.http_timeout)?;
  let bind_addr = config.bind_addr;
  info!(
    %bind_addr,
    public_url = %config.public_url,
    lookback_weeks = config.lookback_weeks,
    activity_type = %config.activity_type,
    "starting tanda"
  );

  let service = Arc::new(TandaService::new(config, Arc::new(client), Arc::new(SystemClock)));
  let app = routes::router(service);

  let listener = tokio::net::TcpListener::bind(bind_addr).await?;
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;

  info!("server stopped");
  Ok(())
}

async fn shutdown_signal() {
  wait_for_shutdown(tokio::signal::ctrl_c()).await
}

/// Resolves once `signal` fires. When the signal cannot be installed the
/// server keeps running instead of shutting down immediately.
async fn wait_for_shutdown<F>(signal: F)
where
  F: std::future::Future<Output = std::io::Result<()>>,
{
  match signal.await {
    Ok(()) => info!("shutdown signal received"),
    Err(e) => {
      warn!(error = %e, "failed to listen for shutdown signal; running until killed");
      std::future::pending::<()>().await;
    }
  }
}
