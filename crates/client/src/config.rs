//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BOOKHUB_API_URL` - Base URL of the BookHub REST API (e.g., `https://bookhub.example/api`)
//!
//! ## Optional
//! - `BOOKHUB_STORAGE_PATH` - Durable storage file (default: `.bookhub/storage.json`)
//! - `BOOKHUB_HTTP_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `BOOKHUB_MAX_ATTEMPTS` - Attempts per request when a 401 can be recovered (default: 2)
//! - `BOOKHUB_VALIDATE_ADMIN_SESSIONS` - Validate restored admin sessions with the server (default: false)
//! - `BOOKHUB_RECOMMENDATIONS_TTL_SECS` - Lifetime of cached recommendations (default: 1800)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_STORAGE_PATH: &str = ".bookhub/storage.json";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_ATTEMPTS: u32 = 2;
const DEFAULT_RECOMMENDATIONS_TTL_SECS: u64 = 30 * 60;

/// Hosts allowed to be reached over plain HTTP.
const LOOPBACK_HOSTS: &[&str] = &["localhost", "127.0.0.1", "[::1]"];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure API URL {0}: tokens would be sent in plain text")]
    InsecureUrl(String),
}

/// How restored admin sessions are treated at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdminSessionPolicy {
    /// Trust the stored admin session without asking the server.
    #[default]
    TrustLocal,
    /// Validate the stored admin token like a regular session.
    Validate,
}

/// BookHub client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the REST API, without a trailing slash
    pub api_url: Url,
    /// Durable storage file used by the CLI
    pub storage_path: PathBuf,
    /// Per-request timeout
    pub http_timeout: Duration,
    /// Attempts per request when a 401 can be recovered by refreshing
    pub max_attempts: u32,
    /// Startup handling of stored admin sessions
    pub admin_session_policy: AdminSessionPolicy,
    /// How long cached recommendations stay fresh
    pub recommendations_ttl: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl ClientConfig {
    /// Configuration for `api_url` with every optional setting at its default.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the URL is invalid or insecure.
    pub fn new(api_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: parse_api_url("BOOKHUB_API_URL", api_url)?,
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            http_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            admin_session_policy: AdminSessionPolicy::default(),
            recommendations_ttl: Duration::from_secs(DEFAULT_RECOMMENDATIONS_TTL_SECS),
            sentry_dsn: None,
            sentry_environment: None,
        })
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = lookup("BOOKHUB_API_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("BOOKHUB_API_URL".to_string()))?;
        let mut config = Self::new(&api_url)?;

        if let Some(path) = lookup("BOOKHUB_STORAGE_PATH") {
            config.storage_path = PathBuf::from(path);
        }
        if let Some(secs) = lookup("BOOKHUB_HTTP_TIMEOUT_SECS") {
            config.http_timeout = Duration::from_secs(parse_var("BOOKHUB_HTTP_TIMEOUT_SECS", &secs)?);
        }
        if let Some(attempts) = lookup("BOOKHUB_MAX_ATTEMPTS") {
            let attempts: u32 = parse_var("BOOKHUB_MAX_ATTEMPTS", &attempts)?;
            if attempts == 0 {
                return Err(ConfigError::InvalidEnvVar(
                    "BOOKHUB_MAX_ATTEMPTS".to_string(),
                    "must be at least 1".to_string(),
                ));
            }
            config.max_attempts = attempts;
        }
        if let Some(flag) = lookup("BOOKHUB_VALIDATE_ADMIN_SESSIONS") {
            config.admin_session_policy = if parse_flag("BOOKHUB_VALIDATE_ADMIN_SESSIONS", &flag)? {
                AdminSessionPolicy::Validate
            } else {
                AdminSessionPolicy::TrustLocal
            };
        }
        if let Some(secs) = lookup("BOOKHUB_RECOMMENDATIONS_TTL_SECS") {
            config.recommendations_ttl =
                Duration::from_secs(parse_var("BOOKHUB_RECOMMENDATIONS_TTL_SECS", &secs)?);
        }
        config.sentry_dsn = lookup("SENTRY_DSN").filter(|dsn| !dsn.is_empty());
        config.sentry_environment = lookup("SENTRY_ENVIRONMENT");

        Ok(config)
    }

    /// Absolute URL for an API path such as `/auth/login`.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse the API base URL, refusing plain HTTP to anything but loopback.
fn parse_api_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;

    match url.scheme() {
        "https" => Ok(url),
        "http" => {
            let host = url.host_str().unwrap_or_default();
            if LOOPBACK_HOSTS.contains(&host) {
                Ok(url)
            } else {
                Err(ConfigError::InsecureUrl(value.to_string()))
            }
        }
        other => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{other}'"),
        )),
    }
}

fn parse_var<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("expected a boolean, got '{other}'"),
        )),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_lookup(lookup_from(&[(
            "BOOKHUB_API_URL",
            "https://bookhub.example/api",
        )]))
        .unwrap();

        assert_eq!(config.max_attempts, 2);
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.admin_session_policy, AdminSessionPolicy::TrustLocal);
        assert_eq!(config.recommendations_ttl, Duration::from_secs(1800));
        assert_eq!(config.storage_path, PathBuf::from(".bookhub/storage.json"));
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_missing_api_url() {
        let err = ClientConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref key) if key == "BOOKHUB_API_URL"));
    }

    #[test]
    fn test_plain_http_only_for_loopback() {
        assert!(ClientConfig::new("http://127.0.0.1:5000/api").is_ok());
        assert!(ClientConfig::new("http://localhost:5000/api").is_ok());
        assert!(matches!(
            ClientConfig::new("http://bookhub.example/api"),
            Err(ConfigError::InsecureUrl(_))
        ));
        assert!(matches!(
            ClientConfig::new("ftp://bookhub.example"),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
    }

    #[test]
    fn test_overrides() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("BOOKHUB_API_URL", "https://bookhub.example/api"),
            ("BOOKHUB_MAX_ATTEMPTS", "3"),
            ("BOOKHUB_HTTP_TIMEOUT_SECS", "5"),
            ("BOOKHUB_VALIDATE_ADMIN_SESSIONS", "true"),
            ("BOOKHUB_STORAGE_PATH", "/tmp/bookhub.json"),
            ("SENTRY_DSN", ""),
        ]))
        .unwrap();

        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.http_timeout, Duration::from_secs(5));
        assert_eq!(config.admin_session_policy, AdminSessionPolicy::Validate);
        assert_eq!(config.storage_path, PathBuf::from("/tmp/bookhub.json"));
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let err = ClientConfig::from_lookup(lookup_from(&[
            ("BOOKHUB_API_URL", "https://bookhub.example/api"),
            ("BOOKHUB_MAX_ATTEMPTS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));
    }

    #[test]
    fn test_invalid_flag_rejected() {
        let err = ClientConfig::from_lookup(lookup_from(&[
            ("BOOKHUB_API_URL", "https://bookhub.example/api"),
            ("BOOKHUB_VALIDATE_ADMIN_SESSIONS", "maybe"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let config = ClientConfig::new("https://bookhub.example/api/").unwrap();
        assert_eq!(
            config.endpoint("/auth/login"),
            "https://bookhub.example/api/auth/login"
        );
    }
}
