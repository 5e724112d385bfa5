use crate::strava::StravaConfig;
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// ---------------------------------------------------------------------------
/// Defaults
/// ---------------------------------------------------------------------------

const DEFAULT_PUBLIC_URL: &str = "http://localhost:5000";
const DEFAULT_LOOKBACK_WEEKS: u32 = 8;
const DEFAULT_ACTIVITY_TYPE: &str = "Run";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("Missing configuration: {0}")]
  MissingVar(String),

  #[error("Invalid value for {name}: {reason}")]
  Invalid { name: String, reason: String },
}

/// Settings read once at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
  pub strava: StravaConfig,
  pub public_url: String,
  pub bind_addr: SocketAddr,
  pub lookback_weeks: u32,
  pub activity_type: String,
  pub default_athlete: Option<String>,
  pub http_timeout: Duration,
}

impl AppConfig {
  pub fn from_env() -> Result<Self, ConfigError> {
    let client_id = required("STRAVA_CLIENT_ID")?;
    let client_secret = required("STRAVA_CLIENT_SECRET")?;

    let lookback_weeks = parsed("TANDA_LOOKBACK_WEEKS", DEFAULT_LOOKBACK_WEEKS)?;
    if lookback_weeks == 0 {
      return Err(ConfigError::Invalid {
        name: "TANDA_LOOKBACK_WEEKS".into(),
        reason: "must be at least 1".into(),
      });
    }

    let activity_type =
      optional("TANDA_ACTIVITY_TYPE").unwrap_or_else(|| DEFAULT_ACTIVITY_TYPE.into());

    Ok(Self {
      strava: StravaConfig::new(client_id, client_secret),
      public_url: optional("TANDA_PUBLIC_URL")
        .unwrap_or_else(|| DEFAULT_PUBLIC_URL.into())
        .trim_end_matches('/')
        .to_string(),
      bind_addr: parsed("TANDA_BIND_ADDR", default_bind_addr())?,
      lookback_weeks,
      activity_type,
      default_athlete: optional("TANDA_DEFAULT_ATHLETE"),
      http_timeout: Duration::from_secs(parsed(
        "TANDA_HTTP_TIMEOUT_SECS",
        DEFAULT_HTTP_TIMEOUT_SECS,
      )?),
    })
  }

  /// Where Strava sends the user back to after authorizing `user_id`.
  pub fn redirect_uri(&self, user_id: &str) -> String {
    let mut url = format!("{}/authorized", self.public_url);
    url.push_str("?athlete=");
    url.push_str(&url::form_urlencoded::byte_serialize(user_id.as_bytes()).collect::<String>());
    url
  }
}

fn default_bind_addr() -> SocketAddr {
  SocketAddr::from(([127, 0, 0, 1], 5000))
}

fn optional(name: &str) -> Option<String> {
  env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn required(name: &str) -> Result<String, ConfigError> {
  optional(name).ok_or_else(|| ConfigError::MissingVar(name.into()))
}

fn parsed<T>(name: &str, default: T) -> Result<T, ConfigError>
where
  T: FromStr,
  T::Err: std::fmt::Display,
{
  match optional(name) {
    Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
      name: name.into(),
      reason: format!("{:?}: {}", raw, e),
    }),
    None => Ok(default),
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;

  const ALL_VARS: [&str; 8] = [
    "STRAVA_CLIENT_ID",
    "STRAVA_CLIENT_SECRET",
    "TANDA_PUBLIC_URL",
    "TANDA_BIND_ADDR",
    "TANDA_LOOKBACK_WEEKS",
    "TANDA_ACTIVITY_TYPE",
    "TANDA_DEFAULT_ATHLETE",
    "TANDA_HTTP_TIMEOUT_SECS",
  ];

  fn with_env<F: FnOnce()>(vars: &[(&str, &str)], f: F) {
    let mut all: Vec<(&str, Option<&str>)> = ALL_VARS.iter().map(|name| (*name, None)).collect();
    for (name, value) in vars {
      all.retain(|(n, _)| n != name);
      all.push((*name, Some(*value)));
    }
    temp_env::with_vars(all, f);
  }

  #[test]
  #[serial]
  fn test_defaults() {
    with_env(&[("STRAVA_CLIENT_ID", "4242"), ("STRAVA_CLIENT_SECRET", "shh")], || {
      let config = AppConfig::from_env().unwrap();
      assert_eq!(config.strava.client_id, "4242");
      assert_eq!(config.strava.client_secret, "shh");
      assert_eq!(config.public_url, DEFAULT_PUBLIC_URL);
      assert_eq!(config.bind_addr.to_string(), "127.0.0.1:5000");
      assert_eq!(config.lookback_weeks, 8);
      assert_eq!(config.activity_type, "Run");
      assert_eq!(config.default_athlete, None);
      assert_eq!(config.http_timeout, Duration::from_secs(15));
    });
  }

  #[test]
  #[serial]
  fn test_overrides() {
    with_env(
      &[
        ("STRAVA_CLIENT_ID", "4242"),
        ("STRAVA_CLIENT_SECRET", "shh"),
        ("TANDA_PUBLIC_URL", "https://tanda.example.com/"),
        ("TANDA_BIND_ADDR", "0.0.0.0:8080"),
        ("TANDA_LOOKBACK_WEEKS", "12"),
        ("TANDA_ACTIVITY_TYPE", "TrailRun"),
        ("TANDA_DEFAULT_ATHLETE", "kim"),
        ("TANDA_HTTP_TIMEOUT_SECS", "3"),
      ],
      || {
        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.public_url, "https://tanda.example.com");
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.lookback_weeks, 12);
        assert_eq!(config.activity_type, "TrailRun");
        assert_eq!(config.default_athlete.as_deref(), Some("kim"));
        assert_eq!(config.http_timeout, Duration::from_secs(3));
      },
    );
  }

  #[test]
  #[serial]
  fn test_missing_client_secret() {
    with_env(&[("STRAVA_CLIENT_ID", "4242")], || {
      let err = AppConfig::from_env().unwrap_err();
      assert!(matches!(err, ConfigError::MissingVar(ref name) if name == "STRAVA_CLIENT_SECRET"));
    });
  }

  #[test]
  #[serial]
  fn test_invalid_lookback() {
    for bad in ["zero", "0", "-3"] {
      with_env(
        &[
          ("STRAVA_CLIENT_ID", "4242"),
          ("STRAVA_CLIENT_SECRET", "shh"),
          ("TANDA_LOOKBACK_WEEKS", bad),
        ],
        || {
          let err = AppConfig::from_env().unwrap_err();
          assert!(matches!(
            err,
            ConfigError::Invalid { ref name, .. } if name == "TANDA_LOOKBACK_WEEKS"
          ));
        },
      );
    }
  }

  #[test]
  #[serial]
  fn test_redirect_uri_encodes_user() {
    with_env(&[("STRAVA_CLIENT_ID", "4242"), ("STRAVA_CLIENT_SECRET", "shh")], || {
      let config = AppConfig::from_env().unwrap();
      assert_eq!(config.redirect_uri("kim"), "http://localhost:5000/authorized?athlete=kim");
      assert_eq!(
        config.redirect_uri("kim lee&x"),
        "http://localhost:5000/authorized?athlete=kim+lee%26x"
      );
    });
  }
}
