//! Tracing subscriber setup.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LEVEL: &str = "info";

/// Filter built from `RUST_LOG`, falling back to `info` for this crate with
/// the HTTP client and server internals kept quiet.
fn env_filter() -> EnvFilter {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));
  ["hyper=warn", "reqwest=warn", "tower_http=info"]
    .into_iter()
    .filter_map(|directive| directive.parse().ok())
    .fold(filter, |filter, directive| filter.add_directive(directive))
}

/// Install the global subscriber. Calling it again is a no-op.
pub fn init() {
  let _ = tracing_subscriber::registry()
    .with(env_filter())
    .with(fmt::layer().with_target(true))
    .try_init();
}
